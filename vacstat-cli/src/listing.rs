//! Vacancy listing
//!
//! Prints the vacancies of a dataset as a text table. Rows can be filtered
//! on one column (`param: value`), sorted on one column, cut to a range of
//! row numbers and shown with a chosen set of columns. Rows are numbered
//! after filtering and sorting, so a range refers to the numbers shown.
//!
//! ```text
//! +---+----------------+----------------------+
//! | # | Name           | Salary               |
//! +---+----------------+----------------------+
//! | 1 | Rust developer | 100 000 - 150 000    |
//! |   |                | (Rubles) (after tax) |
//! +---+----------------+----------------------+
//! ```

use crate::dataset::{VacancyRow, VacancyRows};
use crate::error::{CliError, Result};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use vacstat_common::normalizer::SalaryNormalizer;
use vacstat_common::RateLookup;

/// Cells longer than this are cut and marked with `...`
const MAX_CELL_CHARS: usize = 100;

/// Column width at which cell text wraps
const MAX_COLUMN_WIDTH: usize = 20;

const NUMBER_HEADER: &str = "#";

const CURRENCY_LABELS: [(&str, &str); 10] = [
    ("AZN", "Manats"),
    ("BYR", "Belarusian rubles"),
    ("EUR", "Euro"),
    ("GEL", "Georgian lari"),
    ("KGS", "Kyrgyz som"),
    ("KZT", "Tenge"),
    ("RUR", "Rubles"),
    ("UAH", "Hryvnias"),
    ("USD", "Dollars"),
    ("UZS", "Uzbek sum"),
];

/// Experience ids in ascending order, with their labels
const EXPERIENCE_LEVELS: [(&str, &str); 4] = [
    ("noExperience", "No experience"),
    ("between1And3", "1 to 3 years"),
    ("between3And6", "3 to 6 years"),
    ("moreThan6", "More than 6 years"),
];

/// Listable column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Description,
    KeySkills,
    Experience,
    Premium,
    Employer,
    Salary,
    Currency,
    Region,
    PublishedAt,
}

impl Field {
    /// Columns shown when none are chosen, in display order
    pub const TABLE: [Field; 9] = [
        Field::Name,
        Field::Description,
        Field::KeySkills,
        Field::Experience,
        Field::Premium,
        Field::Employer,
        Field::Salary,
        Field::Region,
        Field::PublishedAt,
    ];

    const ALL: [Field; 10] = [
        Field::Name,
        Field::Description,
        Field::KeySkills,
        Field::Experience,
        Field::Premium,
        Field::Employer,
        Field::Salary,
        Field::Currency,
        Field::Region,
        Field::PublishedAt,
    ];

    /// Name used on the command line (the dataset column it reads)
    pub fn key(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Description => "description",
            Field::KeySkills => "key_skills",
            Field::Experience => "experience_id",
            Field::Premium => "premium",
            Field::Employer => "employer_name",
            Field::Salary => "salary",
            Field::Currency => "salary_currency",
            Field::Region => "area_name",
            Field::PublishedAt => "published_at",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Description => "Description",
            Field::KeySkills => "Skills",
            Field::Experience => "Experience",
            Field::Premium => "Premium",
            Field::Employer => "Employer",
            Field::Salary => "Salary",
            Field::Currency => "Currency",
            Field::Region => "Region",
            Field::PublishedAt => "Published",
        }
    }

    /// Non-core dataset column backing the field
    fn extra_column(self) -> Option<&'static str> {
        match self {
            Field::Description
            | Field::KeySkills
            | Field::Experience
            | Field::Premium
            | Field::Employer => Some(self.key()),
            _ => None,
        }
    }

    fn is_available(self, rows: &VacancyRows) -> bool {
        match self.extra_column() {
            Some(column) => rows.extra_columns.iter().any(|c| c == column),
            None => true,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Field {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim();
        Field::ALL
            .into_iter()
            .find(|field| field.key() == key)
            .ok_or_else(|| {
                let known: Vec<&str> = Field::ALL.iter().map(|f| f.key()).collect();
                CliError::InvalidArgument(format!(
                    "unknown column '{}' (expected one of: {})",
                    key,
                    known.join(", ")
                ))
            })
    }
}

fn currency_label(code: &str) -> &str {
    CURRENCY_LABELS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| *label)
        .unwrap_or(code)
}

fn experience_rank(id: &str) -> usize {
    EXPERIENCE_LEVELS
        .iter()
        .position(|(level, _)| *level == id)
        .unwrap_or(EXPERIENCE_LEVELS.len())
}

fn experience_label(id: &str) -> &str {
    EXPERIENCE_LEVELS
        .iter()
        .find(|(level, _)| *level == id)
        .map(|(_, label)| *label)
        .unwrap_or(id)
}

/// `True`/`False` cells as booleans
fn flag(cell: &str) -> Option<bool> {
    match cell.to_ascii_lowercase().as_str() {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    }
}

fn skills(cell: &str) -> Vec<&str> {
    cell.split('\n').map(str::trim).filter(|s| !s.is_empty()).collect()
}

fn publication_date(published_at: &str) -> Option<NaiveDate> {
    let day = published_at.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn extra<'a>(row: &'a VacancyRow, field: Field) -> &'a str {
    field
        .extra_column()
        .and_then(|column| row.extra.get(column))
        .map(String::as_str)
        .unwrap_or_default()
}

/// Row condition on one column
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Exact cell text
    Equals(Field, String),
    /// Every listed skill is among the vacancy's skills
    Skills(Vec<String>),
    /// Experience id
    Experience(String),
    Premium(bool),
    /// Amount within the salary bounds, in the listed currency
    Salary(f64),
    /// Currency code
    Currency(String),
    /// Publication day
    Published(NaiveDate),
}

impl FromStr for Filter {
    type Err = CliError;

    /// Parse `param: value`
    fn from_str(s: &str) -> Result<Self> {
        let (param, value) = s.split_once(": ").ok_or_else(|| {
            CliError::InvalidArgument(format!("filter {:?} must look like 'param: value'", s))
        })?;
        let value = value.trim();
        if value.is_empty() {
            return Err(CliError::InvalidArgument(format!("filter {:?} has no value", s)));
        }
        let invalid = |what: &str| {
            CliError::InvalidArgument(format!("filter {:?}: {} expected", s, what))
        };

        let filter = match param.parse::<Field>()? {
            Field::KeySkills => Filter::Skills(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            Field::Experience => {
                let id = EXPERIENCE_LEVELS
                    .iter()
                    .find(|(id, label)| id.eq_ignore_ascii_case(value) || *label == value)
                    .map(|(id, _)| id.to_string())
                    .ok_or_else(|| invalid("an experience id or label"))?;
                Filter::Experience(id)
            }
            Field::Premium => Filter::Premium(flag(value).ok_or_else(|| invalid("yes or no"))?),
            Field::Salary => {
                let amount: f64 = value.parse().map_err(|_| invalid("a number"))?;
                Filter::Salary(amount)
            }
            Field::Currency => {
                let code = CURRENCY_LABELS
                    .iter()
                    .find(|(_, label)| *label == value)
                    .map(|(code, _)| code.to_string())
                    .unwrap_or_else(|| value.to_ascii_uppercase());
                Filter::Currency(code)
            }
            Field::PublishedAt => {
                let day = NaiveDate::parse_from_str(value, "%d.%m.%Y")
                    .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
                    .map_err(|_| invalid("a date (DD.MM.YYYY)"))?;
                Filter::Published(day)
            }
            field => Filter::Equals(field, value.to_string()),
        };
        Ok(filter)
    }
}

impl Filter {
    fn field(&self) -> Field {
        match self {
            Filter::Equals(field, _) => *field,
            Filter::Skills(_) => Field::KeySkills,
            Filter::Experience(_) => Field::Experience,
            Filter::Premium(_) => Field::Premium,
            Filter::Salary(_) => Field::Salary,
            Filter::Currency(_) => Field::Currency,
            Filter::Published(_) => Field::PublishedAt,
        }
    }

    pub fn matches(&self, row: &VacancyRow) -> bool {
        let vacancy = &row.vacancy;
        match self {
            Filter::Equals(Field::Name, value) => vacancy.name == *value,
            Filter::Equals(Field::Region, value) => vacancy.region == *value,
            Filter::Equals(field, value) => extra(row, *field) == value.as_str(),
            Filter::Skills(wanted) => {
                let have = skills(extra(row, Field::KeySkills));
                wanted.iter().all(|skill| have.contains(&skill.as_str()))
            }
            Filter::Experience(id) => extra(row, Field::Experience) == id.as_str(),
            Filter::Premium(wanted) => flag(extra(row, Field::Premium)) == Some(*wanted),
            Filter::Salary(amount) => match (vacancy.salary_from, vacancy.salary_to) {
                (Some(from), Some(to)) => from <= *amount && *amount <= to,
                _ => false,
            },
            Filter::Currency(code) => vacancy.salary_currency.as_deref() == Some(code.as_str()),
            Filter::Published(day) => publication_date(&vacancy.published_at) == Some(*day),
        }
    }
}

/// Sort column and direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: Field,
    pub descending: bool,
}

enum SortKey<'a> {
    Text(&'a str),
    Count(usize),
    Amount(Option<f64>),
}

fn compare_keys(a: &SortKey<'_>, b: &SortKey<'_>) -> Ordering {
    match (a, b) {
        (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
        (SortKey::Count(x), SortKey::Count(y)) => x.cmp(y),
        (SortKey::Amount(x), SortKey::Amount(y)) => match (x, y) {
            (Some(x), Some(y)) => x.total_cmp(y),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        _ => Ordering::Equal,
    }
}

fn sort_key<'a>(row: &'a VacancyRow, field: Field, salary: Option<f64>) -> SortKey<'a> {
    let vacancy = &row.vacancy;
    match field {
        Field::Name => SortKey::Text(&vacancy.name),
        Field::Region => SortKey::Text(&vacancy.region),
        Field::PublishedAt => SortKey::Text(&vacancy.published_at),
        Field::Currency => SortKey::Text(vacancy.salary_currency.as_deref().unwrap_or_default()),
        Field::KeySkills => SortKey::Count(skills(extra(row, field)).len()),
        Field::Experience => SortKey::Count(experience_rank(extra(row, field))),
        Field::Salary => SortKey::Amount(salary),
        Field::Description | Field::Premium | Field::Employer => SortKey::Text(extra(row, field)),
    }
}

/// First and optional end row number, 1-based, end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl Default for RowRange {
    fn default() -> Self {
        Self {
            start: 1,
            end: None,
        }
    }
}

impl FromStr for RowRange {
    type Err = CliError;

    /// Parse `FROM` or `FROM TO`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            CliError::InvalidArgument(format!(
                "row range {:?} must be 'FROM' or 'FROM TO' with 1 <= FROM <= TO",
                s
            ))
        };
        let numbers = s
            .split_whitespace()
            .map(|n| n.parse::<usize>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>>>()?;

        let range = match numbers.as_slice() {
            [start] => RowRange {
                start: *start,
                end: None,
            },
            [start, end] => RowRange {
                start: *start,
                end: Some(*end),
            },
            _ => return Err(invalid()),
        };
        if range.start == 0 || range.end.is_some_and(|end| end < range.start) {
            return Err(invalid());
        }
        Ok(range)
    }
}

impl RowRange {
    fn contains(&self, number: usize) -> bool {
        number >= self.start && self.end.map_or(true, |end| number < end)
    }
}

/// What to list and how
#[derive(Debug, Clone, Default)]
pub struct ListingOptions {
    pub filter: Option<Filter>,
    pub sort: Option<Sort>,
    pub range: RowRange,
    /// Empty means every table column the dataset has
    pub columns: Vec<Field>,
}

fn format_amount(amount: f64) -> String {
    let digits = (amount.trunc() as i64).unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(digit);
    }
    if amount < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

fn salary_text(row: &VacancyRow) -> String {
    let vacancy = &row.vacancy;
    let bounds = match (vacancy.salary_from, vacancy.salary_to) {
        (Some(from), Some(to)) => format!("{} - {}", format_amount(from), format_amount(to)),
        (Some(bound), None) | (None, Some(bound)) => format_amount(bound),
        (None, None) => return String::new(),
    };

    let mut text = bounds;
    if let Some(code) = vacancy.salary_currency.as_deref() {
        text.push_str(&format!(" ({})", currency_label(code)));
    }
    match row.extra.get("salary_gross").map(|cell| flag(cell)) {
        Some(Some(true)) => text.push_str(" (before tax)"),
        Some(Some(false)) => text.push_str(" (after tax)"),
        _ => {}
    }
    text
}

fn cell_text(row: &VacancyRow, field: Field) -> String {
    let vacancy = &row.vacancy;
    let text = match field {
        Field::Name => vacancy.name.clone(),
        Field::Region => vacancy.region.clone(),
        Field::Salary => salary_text(row),
        Field::Currency => vacancy
            .salary_currency
            .as_deref()
            .map(currency_label)
            .unwrap_or_default()
            .to_string(),
        Field::PublishedAt => publication_date(&vacancy.published_at)
            .map(|day| day.format("%d.%m.%Y").to_string())
            .unwrap_or_else(|| vacancy.published_at.clone()),
        Field::Experience => experience_label(extra(row, field)).to_string(),
        Field::Premium => match flag(extra(row, field)) {
            Some(true) => "Yes".to_string(),
            Some(false) => "No".to_string(),
            None => extra(row, field).to_string(),
        },
        Field::Description | Field::KeySkills | Field::Employer => extra(row, field).to_string(),
    };

    if text.chars().count() > MAX_CELL_CHARS {
        let cut: String = text.chars().take(MAX_CELL_CHARS).collect();
        format!("{}...", cut)
    } else {
        text
    }
}

/// Greedy word wrap; words wider than `width` are split
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                lines.push(word.drain(..width).collect());
            }
            if word.is_empty() {
                continue;
            }
            let word: String = word.into_iter().collect();
            let separator = usize::from(!line.is_empty());
            let needed = line.chars().count() + separator + word.chars().count();
            if needed > width && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        lines.push(line);
    }
    lines
}

/// Bordered text table with a rule under every row, left aligned
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let wrapped_headers: Vec<Vec<String>> =
        headers.iter().map(|h| wrap(h, MAX_COLUMN_WIDTH)).collect();
    let wrapped_rows: Vec<Vec<Vec<String>>> = rows
        .iter()
        .map(|row| row.iter().map(|cell| wrap(cell, MAX_COLUMN_WIDTH)).collect())
        .collect();

    let mut widths: Vec<usize> = vec![0; headers.len()];
    for cells in std::iter::once(&wrapped_headers).chain(&wrapped_rows) {
        for (width, lines) in widths.iter_mut().zip(cells) {
            for line in lines {
                *width = (*width).max(line.chars().count());
            }
        }
    }

    let rule: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    let mut table = String::new();
    table.push_str(&rule);
    for cells in std::iter::once(&wrapped_headers).chain(&wrapped_rows) {
        let height = cells.iter().map(Vec::len).max().unwrap_or(1);
        for line_index in 0..height {
            for (width, lines) in widths.iter().zip(cells) {
                let line = lines.get(line_index).map(String::as_str).unwrap_or_default();
                let padding = width - line.chars().count();
                table.push_str(&format!("| {}{} ", line, " ".repeat(padding)));
            }
            table.push_str("|\n");
        }
        table.push_str(&rule);
    }
    table
}

/// Filter, sort, number, cut and render `dataset`
///
/// `rates` is only needed to sort by salary, which compares salaries
/// normalized into the base currency.
///
/// # Errors
/// - [`CliError::InvalidArgument`] for a column the dataset does not have
/// - [`CliError::NoMatches`] when the filter leaves no row
pub fn list(
    dataset: &VacancyRows,
    options: &ListingOptions,
    rates: Option<&dyn RateLookup>,
) -> Result<String> {
    let mut used: Vec<Field> = options.columns.clone();
    used.extend(options.filter.as_ref().map(Filter::field));
    used.extend(options.sort.map(|s| s.field));
    if let Some(missing) = used.iter().find(|f| !f.is_available(dataset)) {
        return Err(CliError::InvalidArgument(format!(
            "column '{}' is not in the dataset",
            missing
        )));
    }

    let mut rows: Vec<&VacancyRow> = match &options.filter {
        Some(filter) => dataset.rows.iter().filter(|row| filter.matches(row)).collect(),
        None => dataset.rows.iter().collect(),
    };
    if rows.is_empty() {
        return Err(CliError::NoMatches);
    }
    debug!(rows = rows.len(), "Rows after filtering");

    if let Some(sort) = options.sort {
        let salaries: Vec<Option<f64>> = if sort.field == Field::Salary {
            let rates = rates.ok_or_else(|| {
                CliError::InvalidArgument("sorting by salary needs exchange rates".to_string())
            })?;
            let normalizer = SalaryNormalizer::new(rates);
            rows.iter()
                .map(|row| normalizer.normalize(&row.vacancy).value())
                .collect()
        } else {
            vec![None; rows.len()]
        };

        let mut keyed: Vec<(SortKey<'_>, &VacancyRow)> = rows
            .iter()
            .copied()
            .zip(salaries)
            .map(|(row, salary)| (sort_key(row, sort.field, salary), row))
            .collect();
        if sort.descending {
            keyed.sort_by(|a, b| compare_keys(&b.0, &a.0));
        } else {
            keyed.sort_by(|a, b| compare_keys(&a.0, &b.0));
        }
        rows = keyed.into_iter().map(|(_, row)| row).collect();
    }

    let columns: Vec<Field> = if options.columns.is_empty() {
        Field::TABLE
            .into_iter()
            .filter(|f| f.is_available(dataset))
            .collect()
    } else {
        options.columns.clone()
    };

    let mut headers = vec![NUMBER_HEADER];
    headers.extend(columns.iter().map(|f| f.header()));

    let body: Vec<Vec<String>> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| (index + 1, row))
        .filter(|(number, _)| options.range.contains(*number))
        .map(|(number, row)| {
            let mut cells = vec![number.to_string()];
            cells.extend(columns.iter().map(|f| cell_text(row, *f)));
            cells
        })
        .collect();

    Ok(render_table(&headers, &body))
}

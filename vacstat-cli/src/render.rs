//! Statistics rendering: plain text, JSON and a self-contained HTML report

use crate::error::Result;
use clap::ValueEnum;
use serde::Serialize;
use std::fmt::Display;
use vacstat_common::Statistics;

/// Output format of the `stats` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
}

/// Statistics together with the filter they were computed for
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub profession: &'a str,
    pub region: Option<&'a str>,
    #[serde(flatten)]
    pub stats: &'a Statistics,
}

impl<'a> Report<'a> {
    pub fn new(profession: &'a str, region: Option<&'a str>, stats: &'a Statistics) -> Self {
        Self {
            profession,
            region,
            stats,
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Text => Ok(render_text(self)),
            OutputFormat::Json => render_json(self),
            OutputFormat::Html => Ok(render_html(self)),
        }
    }
}

fn mapping<K: Display, V: Display>(entries: impl IntoIterator<Item = (K, V)>) -> String {
    let body = entries
        .into_iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", body)
}

fn round4(share: f64) -> f64 {
    (share * 10_000.0).round() / 10_000.0
}

/// Six labelled lines
pub fn render_text(report: &Report<'_>) -> String {
    let stats = report.stats;
    let mut out = String::new();
    out.push_str(&format!("Salary by year: {}\n", mapping(&stats.year_salary)));
    out.push_str(&format!("Vacancies by year: {}\n", mapping(&stats.year_count)));
    out.push_str(&format!(
        "Salary by year for '{}': {}\n",
        report.profession,
        mapping(&stats.job_year_salary)
    ));
    out.push_str(&format!(
        "Vacancies by year for '{}': {}\n",
        report.profession,
        mapping(&stats.job_year_count)
    ));
    out.push_str(&format!(
        "Salary by region (top {}): {}\n",
        stats.region_salary.len(),
        mapping(stats.region_salary.iter().map(|(r, v)| (r, *v)))
    ));
    out.push_str(&format!(
        "Vacancy share by region (top {}): {}\n",
        stats.region_share.len(),
        mapping(stats.region_share.iter().map(|(r, s)| (r, round4(*s))))
    ));
    out
}

/// Pretty-printed JSON document
pub fn render_json(report: &Report<'_>) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn percent(share: f64) -> String {
    format!("{:.2}%", share * 100.0)
}

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse;margin-bottom:2em}\
th,td{border:1px solid #444;padding:4px 10px;text-align:right}\
th{background:#eee}td:first-child{text-align:left}";

/// Self-contained HTML report with the by-year and by-region tables
pub fn render_html(report: &Report<'_>) -> String {
    let stats = report.stats;
    let profession = escape(report.profession);
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>Vacancy statistics: {}</title>\n", profession));
    html.push_str(&format!("<style>{}</style>\n</head>\n<body>\n", STYLE));
    html.push_str(&format!("<h1>Vacancy statistics: {}</h1>\n", profession));
    if let Some(region) = report.region {
        html.push_str(&format!("<p>Region: {}</p>\n", escape(region)));
    }

    // By year
    html.push_str("<h2>By year</h2>\n<table>\n");
    html.push_str(&format!(
        "<tr><th>Year</th><th>Average salary</th><th>Average salary: {p}</th>\
         <th>Vacancies</th><th>Vacancies: {p}</th></tr>\n",
        p = profession
    ));
    for (year, salary) in &stats.year_salary {
        let count = stats.year_count.get(year).copied().unwrap_or(0);
        let job_salary = stats.job_year_salary.get(year).copied().unwrap_or(0);
        let job_count = stats.job_year_count.get(year).copied().unwrap_or(0);
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            year, salary, job_salary, count, job_count
        ));
    }
    html.push_str("</table>\n");

    // By region
    html.push_str("<h2>Salary by region</h2>\n<table>\n");
    html.push_str("<tr><th>Region</th><th>Average salary</th></tr>\n");
    for (region, salary) in &stats.region_salary {
        html.push_str(&format!("<tr><td>{}</td><td>{}</td></tr>\n", escape(region), salary));
    }
    html.push_str("</table>\n");

    html.push_str("<h2>Vacancy share by region</h2>\n<table>\n");
    html.push_str("<tr><th>Region</th><th>Share</th></tr>\n");
    for (region, share) in &stats.region_share {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>\n",
            escape(region),
            percent(*share)
        ));
    }
    html.push_str(&format!(
        "<tr><td>Other</td><td>{}</td></tr>\n",
        percent(stats.other_region_share())
    ));
    html.push_str("</table>\n</body>\n</html>\n");
    html
}

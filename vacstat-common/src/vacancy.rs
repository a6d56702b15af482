//! Vacancy record model
//!
//! A `RawVacancy` is one job-posting row as produced by the dataset reader.
//! The core only ever looks at the first 4 (year) or 7 (year-month)
//! characters of `published_at`.

use serde::{Deserialize, Serialize};

/// One job-posting row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVacancy {
    /// Vacancy title
    pub name: String,
    /// Lower salary bound, if given
    pub salary_from: Option<f64>,
    /// Upper salary bound, if given
    pub salary_to: Option<f64>,
    /// Currency code of the salary bounds (e.g. "RUR", "USD")
    pub salary_currency: Option<String>,
    /// Region (area) name
    pub region: String,
    /// ISO-8601-like publication timestamp, e.g. `2019-08-14T10:21:00+0300`
    pub published_at: String,
}

impl RawVacancy {
    /// Year-month prefix of the publication date ("2019-08")
    ///
    /// Returns `None` when the date is shorter than seven characters.
    pub fn period(&self) -> Option<&str> {
        self.published_at.get(..7)
    }

    /// Publication year parsed from the first four characters
    pub fn year(&self) -> Option<i32> {
        self.published_at
            .get(..4)
            .filter(|y| y.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|y| y.parse().ok())
    }
}

/// Profession (and optional region) selector for the profession-specific
/// statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacancyFilter {
    /// Case-sensitive substring matched against the vacancy name
    pub profession: String,
    /// Exact region name; `None` matches every region
    pub region: Option<String>,
}

impl VacancyFilter {
    pub fn new(profession: impl Into<String>) -> Self {
        Self {
            profession: profession.into(),
            region: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Whether the vacancy counts towards the profession statistics
    pub fn matches(&self, vacancy: &RawVacancy) -> bool {
        if !vacancy.name.contains(self.profession.as_str()) {
            return false;
        }
        match &self.region {
            Some(region) => vacancy.region == *region,
            None => true,
        }
    }
}

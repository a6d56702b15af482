//! Currency census over a vacancy dataset
//!
//! Decides which currencies need rates and for which months: every
//! non-base currency seen more than `min_occurrences` times, over the span
//! between the earliest and latest record priced in a selected currency or
//! in the base currency.

use crate::months::{month_range, YearMonth};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info};
use vacstat_common::RawVacancy;

/// Currency frequencies and the date span they cover
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrencyCensus {
    /// Occurrences of every non-base currency
    pub counts: BTreeMap<String, usize>,
    /// Currencies above the cut-off, ascending by code
    pub selected: Vec<String>,
    /// Earliest publication date among relevant records
    pub start: Option<NaiveDate>,
    /// Latest publication date among relevant records
    pub end: Option<NaiveDate>,
}

/// Publication date from the leading `YYYY-MM-DD` of `published_at`
pub fn publication_date(published_at: &str) -> Option<NaiveDate> {
    let day = published_at.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

impl CurrencyCensus {
    pub fn survey(records: &[RawVacancy], base_currency: &str, min_occurrences: usize) -> Self {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in records {
            match record.salary_currency.as_deref() {
                Some(code) if !code.is_empty() && code != base_currency => {
                    *counts.entry(code.to_string()).or_insert(0) += 1;
                }
                _ => {}
            }
        }
        debug!(?counts, "Currency frequencies");

        let selected: Vec<String> = counts
            .iter()
            .filter(|(_, count)| **count > min_occurrences)
            .map(|(code, _)| code.clone())
            .collect();

        let mut start: Option<NaiveDate> = None;
        let mut end: Option<NaiveDate> = None;
        for record in records {
            let relevant = match record.salary_currency.as_deref() {
                Some(code) => code == base_currency || selected.iter().any(|s| s == code),
                None => false,
            };
            if !relevant {
                continue;
            }
            if let Some(date) = publication_date(&record.published_at) {
                start = Some(start.map_or(date, |s| s.min(date)));
                end = Some(end.map_or(date, |e| e.max(date)));
            }
        }

        info!(
            currencies = counts.len(),
            selected = selected.len(),
            start = ?start,
            end = ?end,
            "Currency census completed"
        );

        Self {
            counts,
            selected,
            start,
            end,
        }
    }

    /// Months to fetch rates for
    pub fn months(&self) -> Vec<YearMonth> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => month_range(start, end),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priced(currency: Option<&str>, published_at: &str) -> RawVacancy {
        RawVacancy {
            name: "Dev".to_string(),
            salary_from: Some(1.0),
            salary_to: None,
            salary_currency: currency.map(str::to_string),
            region: "Moscow".to_string(),
            published_at: published_at.to_string(),
        }
    }

    #[test]
    fn test_only_frequent_foreign_currencies_selected() {
        let mut records = Vec::new();
        for _ in 0..3 {
            records.push(priced(Some("USD"), "2010-05-01T00:00:00+0400"));
        }
        records.push(priced(Some("EUR"), "2010-05-01T00:00:00+0400"));
        for _ in 0..5 {
            records.push(priced(Some("RUR"), "2010-05-01T00:00:00+0400"));
        }
        records.push(priced(None, "2010-05-01T00:00:00+0400"));

        let census = CurrencyCensus::survey(&records, "RUR", 2);
        assert_eq!(census.counts.get("USD"), Some(&3));
        assert_eq!(census.counts.get("EUR"), Some(&1));
        assert!(!census.counts.contains_key("RUR"));
        assert_eq!(census.selected, vec!["USD".to_string()]);
    }

    #[test]
    fn test_cut_off_is_strict() {
        let records = vec![priced(Some("KZT"), "2011-01-01"), priced(Some("KZT"), "2011-01-02")];
        assert!(CurrencyCensus::survey(&records, "RUR", 2).selected.is_empty());
        assert_eq!(CurrencyCensus::survey(&records, "RUR", 1).selected, vec!["KZT".to_string()]);
    }

    #[test]
    fn test_span_ignores_unselected_currencies() {
        let records = vec![
            priced(Some("EUR"), "2003-01-10T10:00:00+0300"),
            priced(Some("RUR"), "2005-03-10T10:00:00+0300"),
            priced(Some("USD"), "2005-07-01T10:00:00+0300"),
            priced(Some("USD"), "2004-12-31T10:00:00+0300"),
            priced(Some("KZT"), "2009-01-10T10:00:00+0300"),
        ];

        let census = CurrencyCensus::survey(&records, "RUR", 1);
        assert_eq!(census.selected, vec!["USD".to_string()]);
        assert_eq!(census.start, NaiveDate::from_ymd_opt(2004, 12, 31));
        assert_eq!(census.end, NaiveDate::from_ymd_opt(2005, 7, 1));
        assert_eq!(census.months().len(), 8);
    }

    #[test]
    fn test_publication_date_parsing() {
        assert_eq!(
            publication_date("2022-07-05T18:19:30+0300"),
            NaiveDate::from_ymd_opt(2022, 7, 5)
        );
        assert_eq!(publication_date("2022-07"), None);
        assert_eq!(publication_date("yesterday!"), None);
    }
}

//! Monthly rate collection
//!
//! One observation per month: the feed document of day 28, or the closest
//! earlier day with a document, at most [`MAX_FALLBACK_DAYS`] days back.

use crate::error::Result;
use crate::feed::RateFeed;
use crate::months::YearMonth;
use chrono::Duration;
use tracing::{info, warn};
use vacstat_common::CurrencyTable;

/// Day of the month rates are observed on
pub const OBSERVATION_DAY: u32 = 28;

/// Earlier days tried when the observation day has no document
pub const MAX_FALLBACK_DAYS: i64 = 7;

/// Monthly rates in sheet form: one row per month, one column per currency
///
/// Cells are empty where the feed had no rate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateSheet {
    /// Currency codes, ascending
    pub currencies: Vec<String>,
    /// `(YYYY-MM, rate per currency column)`, ascending by period
    pub rows: Vec<(String, Vec<Option<f64>>)>,
}

impl RateSheet {
    pub fn new(mut currencies: Vec<String>) -> Self {
        currencies.sort();
        currencies.dedup();
        Self {
            currencies,
            rows: Vec::new(),
        }
    }

    /// Number of filled cells
    pub fn filled(&self) -> usize {
        self.rows
            .iter()
            .map(|(_, cells)| cells.iter().filter(|c| c.is_some()).count())
            .sum()
    }

    /// Build the lookup table used by the pipeline
    pub fn to_table(&self, base_currency: &str) -> Result<CurrencyTable> {
        let mut table = CurrencyTable::new(base_currency);
        for (period, cells) in &self.rows {
            for (currency, cell) in self.currencies.iter().zip(cells) {
                if let Some(rate) = cell {
                    table.insert(period, currency, *rate)?;
                }
            }
        }
        Ok(table)
    }
}

/// Fetch one observation per month for `currencies`
///
/// A month with no document within the fallback window keeps an empty row.
/// Feed errors other than a missing document abort the collection.
pub async fn collect_rates(
    feed: &dyn RateFeed,
    months: &[YearMonth],
    currencies: Vec<String>,
) -> Result<RateSheet> {
    let mut sheet = RateSheet::new(currencies);
    info!(
        months = months.len(),
        currencies = sheet.currencies.len(),
        "Collecting monthly rates"
    );

    for month in months {
        let mut cells = vec![None; sheet.currencies.len()];

        if let Some(observation) = month.day(OBSERVATION_DAY) {
            let mut found = false;
            for back in 0..=MAX_FALLBACK_DAYS {
                let date = observation - Duration::days(back);
                if let Some(daily) = feed.daily_rates(date).await? {
                    for (cell, currency) in cells.iter_mut().zip(&sheet.currencies) {
                        *cell = daily.rates.get(currency).copied();
                    }
                    found = true;
                    break;
                }
            }
            if !found {
                warn!(period = %month, "No rates document near the observation day");
            }
        }

        let missing: Vec<&str> = sheet
            .currencies
            .iter()
            .zip(&cells)
            .filter(|(_, cell)| cell.is_none())
            .map(|(code, _)| code.as_str())
            .collect();
        if !missing.is_empty() {
            warn!(period = %month, ?missing, "Rates missing for period");
        }

        sheet.rows.push((month.to_string(), cells));
    }

    info!(filled = sheet.filled(), "Rate collection completed");
    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::DailyRates;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;
    use vacstat_common::RateLookup;

    /// Feed serving fixed documents and recording every requested day
    struct FakeFeed {
        documents: HashMap<NaiveDate, BTreeMap<String, f64>>,
        requested: Mutex<Vec<NaiveDate>>,
    }

    impl FakeFeed {
        fn new(documents: Vec<(NaiveDate, Vec<(&str, f64)>)>) -> Self {
            Self {
                documents: documents
                    .into_iter()
                    .map(|(date, rates)| {
                        (date, rates.into_iter().map(|(c, r)| (c.to_string(), r)).collect())
                    })
                    .collect(),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RateFeed for FakeFeed {
        async fn daily_rates(&self, date: NaiveDate) -> Result<Option<DailyRates>> {
            self.requested.lock().unwrap().push(date);
            Ok(self.documents.get(&date).map(|rates| DailyRates {
                date,
                rates: rates.clone(),
            }))
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_observes_day_28_and_falls_back() {
        let feed = FakeFeed::new(vec![
            (date(2019, 8, 28), vec![("USD", 66.1441), ("EUR", 73.3)]),
            // 2019-09-28 is a Saturday: the Friday document is used
            (date(2019, 9, 27), vec![("USD", 64.6)]),
        ]);
        let months = [YearMonth::new(2019, 8).unwrap(), YearMonth::new(2019, 9).unwrap()];

        let sheet = collect_rates(&feed, &months, vec!["USD".into(), "EUR".into()])
            .await
            .unwrap();

        assert_eq!(sheet.currencies, vec!["EUR", "USD"]);
        assert_eq!(
            sheet.rows,
            vec![
                ("2019-08".to_string(), vec![Some(73.3), Some(66.1441)]),
                ("2019-09".to_string(), vec![None, Some(64.6)]),
            ]
        );
        assert_eq!(
            *feed.requested.lock().unwrap(),
            vec![date(2019, 8, 28), date(2019, 9, 28), date(2019, 9, 27)]
        );
    }

    #[tokio::test]
    async fn test_month_without_documents_keeps_empty_row() {
        let feed = FakeFeed::new(vec![]);
        let months = [YearMonth::new(2020, 1).unwrap()];

        let sheet = collect_rates(&feed, &months, vec!["USD".into()]).await.unwrap();

        assert_eq!(sheet.rows, vec![("2020-01".to_string(), vec![None])]);
        assert_eq!(feed.requested.lock().unwrap().len(), (MAX_FALLBACK_DAYS + 1) as usize);
        assert_eq!(sheet.filled(), 0);
    }

    #[test]
    fn test_sheet_to_table_skips_empty_cells() {
        let sheet = RateSheet {
            currencies: vec!["EUR".into(), "USD".into()],
            rows: vec![
                ("2019-08".into(), vec![Some(73.3), Some(66.1441)]),
                ("2019-09".into(), vec![None, Some(64.6)]),
            ],
        };

        let table = sheet.to_table("RUR").unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.rate_for("2019-09", "USD").unwrap(), 64.6);
        assert!(table.rate_for("2019-09", "EUR").is_err());
    }
}

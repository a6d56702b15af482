//! Central bank daily rates feed
//!
//! The archive publishes one JSON document per business day:
//! `<base>/YYYY/MM/DD/daily_json.js`. Each currency entry carries a
//! `Nominal` (units quoted) and a `Value` (roubles for `Nominal` units);
//! the rate for one unit is `Value / Nominal`, rounded to 4 decimals.
//! Days without a document (weekends, holidays) return 404.

use crate::error::{RatesError, Result};
use crate::http::{build_client, RateLimiter};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const RATE_LIMIT_MS: u64 = 250;

/// Rates published for one day, per currency code
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRates {
    pub date: NaiveDate,
    pub rates: BTreeMap<String, f64>,
}

/// Source of daily exchange rates
#[async_trait]
pub trait RateFeed: Send + Sync {
    /// Rates published on `date`
    ///
    /// `Ok(None)` when the feed has no document for that day.
    async fn daily_rates(&self, date: NaiveDate) -> Result<Option<DailyRates>>;
}

#[derive(Debug, Deserialize)]
struct CbrDocument {
    #[serde(rename = "Valute")]
    valute: HashMap<String, CbrValute>,
}

#[derive(Debug, Deserialize)]
struct CbrValute {
    #[serde(rename = "CharCode")]
    char_code: String,
    #[serde(rename = "Nominal")]
    nominal: f64,
    #[serde(rename = "Value")]
    value: f64,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Parse one archive document
pub fn parse_daily_document(date: NaiveDate, body: &str) -> Result<DailyRates> {
    let document: CbrDocument = serde_json::from_str(body)
        .map_err(|e| RatesError::Parse(format!("daily rates for {}: {}", date, e)))?;

    let mut rates = BTreeMap::new();
    for entry in document.valute.into_values() {
        if entry.nominal <= 0.0 {
            tracing::warn!(
                currency = %entry.char_code,
                nominal = entry.nominal,
                "Skipping entry with non-positive nominal"
            );
            continue;
        }
        rates.insert(entry.char_code, round4(entry.value / entry.nominal));
    }
    Ok(DailyRates { date, rates })
}

/// HTTP client for the central bank rates archive
pub struct CbrClient {
    http_client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<RateLimiter>,
}

impl CbrClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http_client: build_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
        })
    }

    pub fn document_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/{:04}/{:02}/{:02}/daily_json.js",
            self.base_url,
            date.year(),
            date.month(),
            date.day()
        )
    }
}

#[async_trait]
impl RateFeed for CbrClient {
    async fn daily_rates(&self, date: NaiveDate) -> Result<Option<DailyRates>> {
        self.rate_limiter.wait().await;

        let url = self.document_url(date);
        tracing::debug!(%date, url = %url, "Requesting daily rates");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| RatesError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(%date, "No rates document for this day");
            return Ok(None);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RatesError::Api(status.as_u16(), error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RatesError::Network(e.to_string()))?;
        parse_daily_document(date, &body).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Date": "2019-08-28T11:30:00+03:00",
        "Valute": {
            "USD": {"ID": "R01235", "NumCode": "840", "CharCode": "USD", "Nominal": 1,
                    "Name": "Доллар США", "Value": 66.1441, "Previous": 66.0362},
            "KZT": {"ID": "R01335", "NumCode": "398", "CharCode": "KZT", "Nominal": 100,
                    "Name": "Тенге", "Value": 17.0653, "Previous": 17.0318},
            "UZS": {"ID": "R01717", "NumCode": "860", "CharCode": "UZS", "Nominal": 10000,
                    "Name": "Сумов", "Value": 74.5389, "Previous": 74.4567}
        }
    }"#;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 8, 28).unwrap()
    }

    #[test]
    fn test_rate_is_value_over_nominal_rounded() {
        let daily = parse_daily_document(day(), SAMPLE).unwrap();
        assert_eq!(daily.rates["USD"], 66.1441);
        assert_eq!(daily.rates["KZT"], 0.1707);
        assert_eq!(daily.rates["UZS"], 0.0075);
        assert_eq!(daily.date, day());
    }

    #[test]
    fn test_malformed_document_is_parse_error() {
        assert!(matches!(
            parse_daily_document(day(), "<html>not json</html>"),
            Err(RatesError::Parse(_))
        ));
    }

    #[test]
    fn test_document_url_layout() {
        let client = CbrClient::new("https://example.test/archive/").unwrap();
        assert_eq!(
            client.document_url(NaiveDate::from_ymd_opt(2005, 3, 7).unwrap()),
            "https://example.test/archive/2005/03/07/daily_json.js"
        );
    }
}

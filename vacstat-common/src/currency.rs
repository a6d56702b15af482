//! Exchange-rate lookup
//!
//! The core never owns a global rate table. Every consumer receives a
//! read-only [`RateLookup`], built once before the pipeline starts:
//! - [`CurrencyTable`]: rates that vary by year-month period
//! - [`StaticRates`]: one rate per currency regardless of period
//!
//! The base currency always converts at 1.0 and is never stored.

use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Default base currency of the observed data
pub const DEFAULT_BASE_CURRENCY: &str = "RUR";

/// Read-only rate lookup
///
/// `rate × amount-in-currency = amount-in-base-currency`
pub trait RateLookup: Send + Sync {
    /// Code of the currency every rate converts into
    fn base_currency(&self) -> &str;

    /// Rate for `currency` in `period` ("YYYY-MM")
    ///
    /// # Errors
    /// [`Error::RateNotFound`] when the table has no entry for the pair.
    fn rate_for(&self, period: &str, currency: &str) -> Result<f64>;
}

fn validate_rate(currency: &str, rate: f64) -> Result<()> {
    if rate.is_finite() && rate > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "rate for {} must be positive, got {}",
            currency, rate
        )))
    }
}

/// Period-varying rate table: period → currency → rate
#[derive(Debug, Clone)]
pub struct CurrencyTable {
    base: String,
    rates: BTreeMap<String, BTreeMap<String, f64>>,
}

impl CurrencyTable {
    /// Create an empty table converting into `base`
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            rates: BTreeMap::new(),
        }
    }

    /// Record the rate of `currency` for `period`
    ///
    /// Entries for the base currency are ignored (it is implicitly 1.0).
    /// A later insert for the same pair replaces the earlier one.
    pub fn insert(&mut self, period: &str, currency: &str, rate: f64) -> Result<()> {
        if period.len() != 7 {
            return Err(Error::InvalidInput(format!(
                "period must be YYYY-MM, got {:?}",
                period
            )));
        }
        if currency == self.base {
            return Ok(());
        }
        validate_rate(currency, rate)?;
        self.rates
            .entry(period.to_string())
            .or_default()
            .insert(currency.to_string(), rate);
        Ok(())
    }

    /// Periods with at least one rate, ascending
    pub fn periods(&self) -> impl Iterator<Item = &str> {
        self.rates.keys().map(String::as_str)
    }

    /// Every currency that has a rate in some period, ascending
    pub fn currencies(&self) -> BTreeSet<&str> {
        self.rates
            .values()
            .flat_map(|per_period| per_period.keys().map(String::as_str))
            .collect()
    }

    /// Number of stored (period, currency) entries
    pub fn len(&self) -> usize {
        self.rates.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl RateLookup for CurrencyTable {
    fn base_currency(&self) -> &str {
        &self.base
    }

    fn rate_for(&self, period: &str, currency: &str) -> Result<f64> {
        if currency == self.base {
            return Ok(1.0);
        }
        self.rates
            .get(period)
            .and_then(|per_period| per_period.get(currency))
            .copied()
            .ok_or_else(|| Error::RateNotFound {
                period: period.to_string(),
                currency: currency.to_string(),
            })
    }
}

/// Period-independent rates
#[derive(Debug, Clone)]
pub struct StaticRates {
    base: String,
    rates: BTreeMap<String, f64>,
}

impl StaticRates {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            rates: BTreeMap::new(),
        }
    }

    /// Add a constant rate for `currency`
    pub fn with_rate(mut self, currency: &str, rate: f64) -> Result<Self> {
        if currency != self.base {
            validate_rate(currency, rate)?;
            self.rates.insert(currency.to_string(), rate);
        }
        Ok(self)
    }

    /// Reference table of ten currency codes against RUR
    pub fn reference() -> Self {
        const REFERENCE: [(&str, f64); 9] = [
            ("AZN", 35.68),
            ("BYR", 23.91),
            ("EUR", 59.90),
            ("GEL", 21.74),
            ("KGS", 0.76),
            ("KZT", 0.13),
            ("UAH", 1.64),
            ("USD", 60.66),
            ("UZS", 0.0055),
        ];

        Self {
            base: DEFAULT_BASE_CURRENCY.to_string(),
            rates: REFERENCE
                .iter()
                .map(|(code, rate)| (code.to_string(), *rate))
                .collect(),
        }
    }
}

impl RateLookup for StaticRates {
    fn base_currency(&self) -> &str {
        &self.base
    }

    fn rate_for(&self, period: &str, currency: &str) -> Result<f64> {
        if currency == self.base {
            return Ok(1.0);
        }
        self.rates
            .get(currency)
            .copied()
            .ok_or_else(|| Error::RateNotFound {
                period: period.to_string(),
                currency: currency.to_string(),
            })
    }
}

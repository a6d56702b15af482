//! Salary normalization
//!
//! Converts the salary fields of one vacancy into a single value in the base
//! currency:
//! 1. No currency → unconvertible
//! 2. Both bounds → their mean; one bound → that bound; none → unconvertible
//! 3. Base currency → value as-is
//! 4. Otherwise value × rate for the publication year-month; no rate →
//!    unconvertible
//!
//! Unconvertible is an ordinary return value. A large share of real rows
//! take that path and callers skip them silently.

use crate::currency::RateLookup;
use crate::vacancy::RawVacancy;
use serde::Serialize;

/// Why a salary could not be normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Unconvertible {
    /// No currency code on the record
    MissingCurrency,
    /// Neither salary bound present
    MissingBounds,
    /// No rate for the currency in the publication period
    RateNotFound,
}

/// Normalized salary of one record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NormalizedSalary {
    /// Salary in the base currency
    Value(f64),
    /// Record contributes to no statistic
    Unconvertible(Unconvertible),
}

impl NormalizedSalary {
    pub fn value(&self) -> Option<f64> {
        match self {
            NormalizedSalary::Value(v) => Some(*v),
            NormalizedSalary::Unconvertible(_) => None,
        }
    }
}

/// Salary normalizer over a borrowed rate lookup
pub struct SalaryNormalizer<'a> {
    rates: &'a dyn RateLookup,
}

impl<'a> SalaryNormalizer<'a> {
    pub fn new(rates: &'a dyn RateLookup) -> Self {
        Self { rates }
    }

    /// Normalize the salary of `vacancy`
    pub fn normalize(&self, vacancy: &RawVacancy) -> NormalizedSalary {
        let currency = match vacancy.salary_currency.as_deref() {
            Some(code) if !code.is_empty() => code,
            _ => return NormalizedSalary::Unconvertible(Unconvertible::MissingCurrency),
        };

        let midpoint = match (vacancy.salary_from, vacancy.salary_to) {
            (Some(from), Some(to)) => (from + to) / 2.0,
            (Some(bound), None) | (None, Some(bound)) => bound,
            (None, None) => return NormalizedSalary::Unconvertible(Unconvertible::MissingBounds),
        };

        if currency == self.rates.base_currency() {
            return NormalizedSalary::Value(midpoint);
        }

        let Some(period) = vacancy.period() else {
            return NormalizedSalary::Unconvertible(Unconvertible::RateNotFound);
        };

        match self.rates.rate_for(period, currency) {
            Ok(rate) => NormalizedSalary::Value(midpoint * rate),
            Err(_) => {
                tracing::trace!(period, currency, "no rate, salary unconvertible");
                NormalizedSalary::Unconvertible(Unconvertible::RateNotFound)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::{CurrencyTable, StaticRates};
    use crate::vacancy::test_support::vacancy;

    fn table() -> CurrencyTable {
        let mut table = CurrencyTable::new("RUR");
        table.insert("2019-08", "USD", 60.0).unwrap();
        table.insert("2019-08", "EUR", 70.5).unwrap();
        table
    }

    #[test]
    fn test_both_bounds_in_base_currency_is_mean() {
        let rates = table();
        let normalizer = SalaryNormalizer::new(&rates);
        let cases = [(40000.0, 55000.0, 47500.0), (1000.0, 2000.0, 1500.0), (1.0, 2.0, 1.5)];

        for (from, to, expected) in cases {
            let v = vacancy("Dev", Some(from), Some(to), Some("RUR"), "Moscow", "2019-08-01");
            assert_eq!(normalizer.normalize(&v), NormalizedSalary::Value(expected));
        }
    }

    #[test]
    fn test_single_bound_is_used_as_is() {
        let rates = table();
        let normalizer = SalaryNormalizer::new(&rates);

        let only_from = vacancy("Dev", Some(30000.0), None, Some("RUR"), "Moscow", "2019-08-01");
        let only_to = vacancy("Dev", None, Some(90000.0), Some("RUR"), "Moscow", "2019-08-01");

        assert_eq!(normalizer.normalize(&only_from).value(), Some(30000.0));
        assert_eq!(normalizer.normalize(&only_to).value(), Some(90000.0));
    }

    #[test]
    fn test_missing_bounds_is_unconvertible() {
        let rates = table();
        let normalizer = SalaryNormalizer::new(&rates);
        let v = vacancy("Dev", None, None, Some("RUR"), "Moscow", "2019-08-01");

        assert_eq!(
            normalizer.normalize(&v),
            NormalizedSalary::Unconvertible(Unconvertible::MissingBounds)
        );
    }

    #[test]
    fn test_missing_currency_is_unconvertible() {
        let rates = table();
        let normalizer = SalaryNormalizer::new(&rates);
        let absent = vacancy("Dev", Some(1.0), Some(2.0), None, "Moscow", "2019-08-01");
        let empty = vacancy("Dev", Some(1.0), Some(2.0), Some(""), "Moscow", "2019-08-01");

        for v in [absent, empty] {
            assert_eq!(
                normalizer.normalize(&v),
                NormalizedSalary::Unconvertible(Unconvertible::MissingCurrency)
            );
        }
    }

    #[test]
    fn test_foreign_currency_uses_period_rate() {
        let rates = table();
        let normalizer = SalaryNormalizer::new(&rates);
        let published = "2019-08-28T12:00:00+0300";
        let v = vacancy("Dev", Some(1000.0), None, Some("USD"), "Moscow", published);

        assert_eq!(normalizer.normalize(&v).value(), Some(60000.0));
    }

    #[test]
    fn test_rate_gap_is_unconvertible() {
        let rates = table();
        let normalizer = SalaryNormalizer::new(&rates);
        let other_month = vacancy("Dev", Some(1000.0), None, Some("USD"), "Moscow", "2019-09-01");
        let exotic = vacancy("Dev", Some(1000.0), None, Some("GEL"), "Moscow", "2019-08-01");
        let short_date = vacancy("Dev", Some(1000.0), None, Some("USD"), "Moscow", "2019");

        for v in [other_month, exotic, short_date] {
            assert_eq!(
                normalizer.normalize(&v),
                NormalizedSalary::Unconvertible(Unconvertible::RateNotFound)
            );
        }
    }

    #[test]
    fn test_conversion_is_linear_in_rate() {
        let rate = 70.5;
        let base_rates = StaticRates::new("RUR");
        let eur_rates = StaticRates::new("RUR").with_rate("EUR", rate).unwrap();

        let in_base =
            vacancy("Dev", Some(141000.0), Some(211500.0), Some("RUR"), "Moscow", "2019-08-01");
        let in_eur = vacancy(
            "Dev",
            Some(141000.0 / rate),
            Some(211500.0 / rate),
            Some("EUR"),
            "Moscow",
            "2019-08-01",
        );

        let base_value = SalaryNormalizer::new(&base_rates).normalize(&in_base).value().unwrap();
        let eur_value = SalaryNormalizer::new(&eur_rates).normalize(&in_eur).value().unwrap();
        assert!((base_value - eur_value).abs() < 1e-6);
    }
}

//! Analysis pipeline
//!
//! One pass over the vacancy records: every record is normalized, then
//! routed into the year, region and profession accumulators. After the pass
//! all accumulators are finalized exactly once and turned into ordered,
//! presentation-ready mappings.
//!
//! # Architecture
//!
//! ```text
//! RawVacancy ─→ SalaryNormalizer ─→ (value, year, region, matches filter)
//!                                         │
//!             ┌───────────────────────────┼─────────────────────────┐
//!             ↓                           ↓                         ↓
//!   year salary / count       job-year salary / count     region salary / count
//!             ↓                           ↓                         ↓
//!      averages (asc)              averages (asc)       threshold → top N (desc)
//! ```
//!
//! The year half and the region half can run separately: partitioned mode
//! runs [`Pipeline::run_years`] once per year partition and
//! [`Pipeline::run_regions`] once over the whole dataset.

use crate::accumulators::{CountAccumulator, SumAverageAccumulator};
use crate::config::AnalysisSettings;
use crate::currency::RateLookup;
use crate::normalizer::{NormalizedSalary, SalaryNormalizer, Unconvertible};
use crate::vacancy::{RawVacancy, VacancyFilter};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Per-year statistics, ascending by year
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct YearStatistics {
    /// Average salary per year over all convertible records
    pub year_salary: BTreeMap<i32, i64>,
    /// Convertible records per year
    pub year_count: BTreeMap<i32, u64>,
    /// Average salary per year over records matching the filter
    pub job_year_salary: BTreeMap<i32, i64>,
    /// Matching records per year
    pub job_year_count: BTreeMap<i32, u64>,
}

impl YearStatistics {
    /// Union of per-partition statistics
    ///
    /// # Errors
    /// [`Error::OverlappingPartitions`] when two parts report the same year.
    pub fn merge(parts: impl IntoIterator<Item = YearStatistics>) -> Result<Self> {
        let mut merged = YearStatistics::default();
        for part in parts {
            if let Some(year) = part
                .year_count
                .keys()
                .chain(part.job_year_count.keys())
                .find(|year| {
                    merged.year_count.contains_key(*year)
                        || merged.job_year_count.contains_key(*year)
                })
            {
                return Err(Error::OverlappingPartitions(*year));
            }
            merged.year_salary.extend(part.year_salary);
            merged.year_count.extend(part.year_count);
            merged.job_year_salary.extend(part.job_year_salary);
            merged.job_year_count.extend(part.job_year_count);
        }
        Ok(merged)
    }
}

fn other_share(listed: &[(String, f64)]) -> f64 {
    (1.0 - listed.iter().map(|(_, share)| share).sum::<f64>()).max(0.0)
}

/// Top-N region statistics, descending by value
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegionStatistics {
    /// Average salary of the best-paid representative regions
    pub region_salary: Vec<(String, i64)>,
    /// Share of all convertible vacancies for the largest regions
    pub region_share: Vec<(String, f64)>,
}

impl RegionStatistics {
    /// Share of vacancies outside the listed regions
    pub fn other_share(&self) -> f64 {
        other_share(&self.region_share)
    }
}

/// The six output mappings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub year_salary: BTreeMap<i32, i64>,
    pub year_count: BTreeMap<i32, u64>,
    pub job_year_salary: BTreeMap<i32, i64>,
    pub job_year_count: BTreeMap<i32, u64>,
    pub region_salary: Vec<(String, i64)>,
    pub region_share: Vec<(String, f64)>,
}

impl Statistics {
    pub fn from_parts(years: YearStatistics, regions: RegionStatistics) -> Self {
        Self {
            year_salary: years.year_salary,
            year_count: years.year_count,
            job_year_salary: years.job_year_salary,
            job_year_count: years.job_year_count,
            region_salary: regions.region_salary,
            region_share: regions.region_share,
        }
    }

    /// Share of vacancies outside the listed regions
    pub fn other_region_share(&self) -> f64 {
        other_share(&self.region_share)
    }
}

/// Tally of records skipped during a pass
#[derive(Debug, Default)]
struct SkipTally {
    converted: usize,
    undated: usize,
    unconvertible: HashMap<Unconvertible, usize>,
}

impl SkipTally {
    fn skip(&mut self, reason: Unconvertible) {
        *self.unconvertible.entry(reason).or_insert(0) += 1;
    }

    fn skipped(&self) -> usize {
        self.undated + self.unconvertible.values().sum::<usize>()
    }
}

/// Analysis pipeline driver
#[derive(Debug, Clone)]
pub struct Pipeline {
    settings: AnalysisSettings,
}

impl Pipeline {
    pub fn new(settings: AnalysisSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Full analysis over one record set
    ///
    /// # Errors
    /// [`Error::EmptyInput`] when `records` is empty; nothing is aggregated.
    pub fn run(
        &self,
        records: &[RawVacancy],
        filter: &VacancyFilter,
        rates: &dyn RateLookup,
    ) -> Result<Statistics> {
        let years = self.run_years(records, filter, rates)?;
        let regions = self.run_regions(records, rates)?;
        Ok(Statistics::from_parts(years, regions))
    }

    /// Year half of the pass: overall and profession statistics per year
    pub fn run_years(
        &self,
        records: &[RawVacancy],
        filter: &VacancyFilter,
        rates: &dyn RateLookup,
    ) -> Result<YearStatistics> {
        if records.is_empty() {
            return Err(Error::EmptyInput);
        }

        let normalizer = SalaryNormalizer::new(rates);
        let mut tally = SkipTally::default();

        let mut year_salary = SumAverageAccumulator::new();
        let mut year_count = CountAccumulator::new();
        let mut job_year_salary = SumAverageAccumulator::new();
        let mut job_year_count = CountAccumulator::new();

        for record in records {
            let Some((salary, year)) = Self::convert(&normalizer, record, &mut tally) else {
                continue;
            };

            year_salary.add(year, salary);
            year_count.increment(year);

            if filter.matches(record) {
                job_year_salary.add(year, salary);
                job_year_count.increment(year);
            } else {
                job_year_salary.ensure_present(year);
                job_year_count.ensure_present(year);
            }
        }

        info!(
            records = records.len(),
            converted = tally.converted,
            skipped = tally.skipped(),
            profession = %filter.profession,
            "Year statistics computed"
        );
        debug!(undated = tally.undated, unconvertible = ?tally.unconvertible, "Skipped records");

        Ok(YearStatistics {
            year_salary: year_salary.finalize_averages().into_map(),
            year_count: year_count.finalize_counts(),
            job_year_salary: job_year_salary.finalize_averages().into_map(),
            job_year_count: job_year_count.finalize_counts(),
        })
    }

    /// Region half of the pass: representative regions by salary and share
    ///
    /// Sparse regions are removed using their raw counts, then the averages
    /// are restricted to the same regions before ranking.
    pub fn run_regions(
        &self,
        records: &[RawVacancy],
        rates: &dyn RateLookup,
    ) -> Result<RegionStatistics> {
        if records.is_empty() {
            return Err(Error::EmptyInput);
        }

        let normalizer = SalaryNormalizer::new(rates);
        let mut tally = SkipTally::default();

        let mut region_salary = SumAverageAccumulator::new();
        let mut region_count = CountAccumulator::new();

        for record in records {
            let Some((salary, _)) = Self::convert(&normalizer, record, &mut tally) else {
                continue;
            };
            region_salary.add(record.region.clone(), salary);
            region_count.increment(record.region.clone());
        }

        let shares = region_count.finalize_percentages(self.settings.share_threshold);
        let averages = region_salary.finalize_averages().restrict_to(&shares);

        info!(
            regions = shares.len() + shares.dropped(),
            representative = shares.len(),
            dropped = shares.dropped(),
            "Region statistics computed"
        );

        Ok(RegionStatistics {
            region_salary: averages.top(self.settings.top_regions),
            region_share: shares.top(self.settings.top_regions),
        })
    }

    fn convert(
        normalizer: &SalaryNormalizer<'_>,
        record: &RawVacancy,
        tally: &mut SkipTally,
    ) -> Option<(f64, i32)> {
        let salary = match normalizer.normalize(record) {
            NormalizedSalary::Value(salary) => salary,
            NormalizedSalary::Unconvertible(reason) => {
                tally.skip(reason);
                return None;
            }
        };
        let Some(year) = record.year() else {
            tally.undated += 1;
            return None;
        };
        tally.converted += 1;
        Some((salary, year))
    }
}

//! Partitioned processing
//!
//! A dataset split into per-year partitions is processed concurrently: every
//! partition is loaded and aggregated on the blocking pool, a bounded number
//! at a time, and the per-year results are merged once all workers finish.
//!
//! A failed partition is reported by label. The merged statistics are only
//! handed out when every partition succeeded, so a silently incomplete year
//! series is impossible.

use crate::currency::RateLookup;
use crate::error::PartitionFailure;
use crate::pipeline::{Pipeline, YearStatistics};
use crate::vacancy::{RawVacancy, VacancyFilter};
use crate::{Error, Result};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One independently loadable slice of the dataset
pub trait PartitionSource: Send + Sync + 'static {
    /// Human-readable name used in logs and failure reports
    fn label(&self) -> String;

    /// Load every record of the partition
    fn load(&self) -> Result<Vec<RawVacancy>>;
}

impl PartitionSource for Box<dyn PartitionSource> {
    fn label(&self) -> String {
        (**self).label()
    }

    fn load(&self) -> Result<Vec<RawVacancy>> {
        (**self).load()
    }
}

/// Partition whose records are already in memory
#[derive(Debug, Clone)]
pub struct InMemoryPartition {
    label: String,
    records: Vec<RawVacancy>,
}

impl InMemoryPartition {
    pub fn new(label: impl Into<String>, records: Vec<RawVacancy>) -> Self {
        Self {
            label: label.into(),
            records,
        }
    }
}

impl PartitionSource for InMemoryPartition {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn load(&self) -> Result<Vec<RawVacancy>> {
        Ok(self.records.clone())
    }
}

/// Group records by publication year, ascending
///
/// Records without a readable year belong to no partition and are returned
/// separately.
pub fn partition_by_year(
    records: Vec<RawVacancy>,
) -> (BTreeMap<i32, Vec<RawVacancy>>, Vec<RawVacancy>) {
    let mut by_year: BTreeMap<i32, Vec<RawVacancy>> = BTreeMap::new();
    let mut undated = Vec::new();
    for record in records {
        match record.year() {
            Some(year) => by_year.entry(year).or_default().push(record),
            None => undated.push(record),
        }
    }
    (by_year, undated)
}

/// Outcome of a partitioned run
#[derive(Debug, Default)]
pub struct PartitionReport {
    /// Statistics of every successful partition, by label
    pub years: Vec<(String, YearStatistics)>,
    /// Every partition that failed to load or aggregate
    pub failures: Vec<PartitionFailure>,
}

impl PartitionReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Merge the per-partition statistics
    ///
    /// # Errors
    /// - [`Error::PartitionFailures`] if any partition failed
    /// - [`Error::OverlappingPartitions`] if two partitions cover the same year
    pub fn into_complete(self) -> Result<YearStatistics> {
        if !self.failures.is_empty() {
            return Err(Error::PartitionFailures(self.failures));
        }
        YearStatistics::merge(self.years.into_iter().map(|(_, stats)| stats))
    }
}

/// Run the year half of the pipeline over every partition
///
/// At most `workers` partitions are in flight. Failures never abort the
/// other partitions; they are collected in the report.
pub async fn run_partitions<S: PartitionSource>(
    sources: Vec<S>,
    pipeline: &Pipeline,
    filter: &VacancyFilter,
    rates: Arc<dyn RateLookup>,
    workers: usize,
) -> PartitionReport {
    let total = sources.len();
    let workers = workers.max(1);
    info!(partitions = total, workers, "Starting partitioned run");

    let outcomes: Vec<(String, Result<YearStatistics>)> = stream::iter(sources)
        .map(|source| {
            let pipeline = pipeline.clone();
            let filter = filter.clone();
            let rates = Arc::clone(&rates);
            let label = source.label();

            async move {
                debug!(partition = %label, "Worker starting partition");
                let task = tokio::task::spawn_blocking(move || {
                    let records = source.load()?;
                    pipeline.run_years(&records, &filter, rates.as_ref())
                });
                let outcome = match task.await {
                    Ok(result) => result,
                    Err(e) => Err(Error::Internal(format!("partition task failed: {}", e))),
                };
                (label, outcome)
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    let mut report = PartitionReport::default();
    for (label, outcome) in outcomes {
        match outcome {
            Ok(stats) => report.years.push((label, stats)),
            Err(e) => {
                error!(partition = %label, error = %e, "Partition failed");
                report.failures.push(PartitionFailure {
                    partition: label,
                    reason: e.to_string(),
                });
            }
        }
    }
    report.years.sort_by(|a, b| a.0.cmp(&b.0));
    report.failures.sort_by(|a, b| a.partition.cmp(&b.partition));

    if report.is_complete() {
        info!(partitions = total, "Partitioned run completed");
    } else {
        warn!(
            partitions = total,
            failed = report.failures.len(),
            "Partitioned run incomplete"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisSettings;
    use crate::currency::StaticRates;
    use crate::vacancy::test_support::vacancy;

    struct BrokenPartition(&'static str);

    impl PartitionSource for BrokenPartition {
        fn label(&self) -> String {
            self.0.to_string()
        }

        fn load(&self) -> Result<Vec<RawVacancy>> {
            Err(Error::InvalidInput("unreadable header".to_string()))
        }
    }

    fn records() -> Vec<RawVacancy> {
        vec![
            vacancy("Engineer", Some(100.0), None, Some("RUR"), "Moscow", "2019-03-01"),
            vacancy("Cook", Some(300.0), None, Some("RUR"), "Moscow", "2019-04-01"),
            vacancy("Engineer", Some(500.0), None, Some("RUR"), "Kazan", "2020-01-01"),
            vacancy("Engineer", Some(700.0), None, Some("RUR"), "Kazan", "2021-01-01"),
            vacancy("Cook", Some(900.0), None, Some("RUR"), "Kazan", "n/a"),
        ]
    }

    fn rates() -> Arc<dyn RateLookup> {
        Arc::new(StaticRates::new("RUR"))
    }

    #[test]
    fn test_partition_by_year_groups_and_separates_undated() {
        let (by_year, undated) = partition_by_year(records());
        assert_eq!(by_year.keys().copied().collect::<Vec<_>>(), vec![2019, 2020, 2021]);
        assert_eq!(by_year[&2019].len(), 2);
        assert_eq!(undated.len(), 1);
    }

    #[tokio::test]
    async fn test_partitioned_run_matches_single_pass() {
        let pipeline = Pipeline::new(AnalysisSettings::default());
        let filter = VacancyFilter::new("Engineer");
        let rates = rates();

        let single = pipeline.run_years(&records(), &filter, rates.as_ref()).unwrap();

        let (by_year, _) = partition_by_year(records());
        let sources: Vec<_> = by_year
            .into_iter()
            .map(|(year, records)| InMemoryPartition::new(year.to_string(), records))
            .collect();

        let report = run_partitions(sources, &pipeline, &filter, rates, 2).await;
        assert!(report.is_complete());
        assert_eq!(report.years.len(), 3);

        let merged = report.into_complete().unwrap();
        assert_eq!(merged, single);
    }

    #[tokio::test]
    async fn test_failed_partition_blocks_merge() {
        let pipeline = Pipeline::new(AnalysisSettings::default());
        let filter = VacancyFilter::new("Engineer");

        let sources: Vec<Box<dyn PartitionSource>> = vec![
            Box::new(InMemoryPartition::new("2019", records())),
            Box::new(BrokenPartition("2020")),
            Box::new(InMemoryPartition::new("2021", Vec::new())),
        ];

        let report = run_partitions(sources, &pipeline, &filter, rates(), 4).await;
        assert_eq!(report.years.len(), 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].partition, "2020");
        assert!(report.failures[0].reason.contains("unreadable header"));
        assert_eq!(report.failures[1].partition, "2021");

        match report.into_complete() {
            Err(Error::PartitionFailures(failures)) => assert_eq!(failures.len(), 2),
            other => panic!("expected PartitionFailures, got {:?}", other),
        }
    }
}

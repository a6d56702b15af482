//! End-to-end pipeline behaviour over the public API

use std::sync::Arc;
use vacstat_common::accumulators::CountAccumulator;
use vacstat_common::config::AnalysisSettings;
use vacstat_common::partition::{partition_by_year, run_partitions, InMemoryPartition};
use vacstat_common::{CurrencyTable, Pipeline, RateLookup, RawVacancy, StaticRates, VacancyFilter};

fn record(
    name: &str,
    from: Option<f64>,
    to: Option<f64>,
    currency: &str,
    region: &str,
    published_at: &str,
) -> RawVacancy {
    RawVacancy {
        name: name.to_string(),
        salary_from: from,
        salary_to: to,
        salary_currency: Some(currency.to_string()),
        region: region.to_string(),
        published_at: published_at.to_string(),
    }
}

fn dataset() -> Vec<RawVacancy> {
    let regions = ["Moscow", "Moscow", "Moscow", "Kazan", "Kazan", "Omsk"];
    let mut records = Vec::new();
    for (i, year) in (2018..=2022).enumerate() {
        for (j, region) in regions.iter().enumerate() {
            let name = if j % 2 == 0 { "Python developer" } else { "Accountant" };
            let salary = 10000.0 * (i + 1) as f64 + 1000.0 * j as f64;
            records.push(record(
                name,
                Some(salary),
                Some(salary + 2000.0),
                "RUR",
                region,
                &format!("{}-0{}-15T09:30:00+0300", year, j + 1),
            ));
        }
        let published = format!("{}-03-01", year);
        records.push(record("Python developer", Some(100.0), None, "USD", "Moscow", &published));
    }
    records
}

fn usd_table() -> CurrencyTable {
    let mut table = CurrencyTable::new("RUR");
    for year in 2018..=2022 {
        table.insert(&format!("{}-03", year), "USD", 70.0).unwrap();
    }
    table
}

#[test]
fn test_profession_years_are_subset_of_overall_years() {
    let stats = Pipeline::new(AnalysisSettings::default())
        .run(&dataset(), &VacancyFilter::new("Python"), &usd_table())
        .unwrap();

    assert_eq!(stats.year_salary.len(), 5);
    assert_eq!(
        stats.year_count.keys().collect::<Vec<_>>(),
        stats.job_year_count.keys().collect::<Vec<_>>()
    );
    for (year, count) in &stats.job_year_count {
        assert!(count <= &stats.year_count[year]);
    }
    // 6 RUR records + 1 USD record per year
    assert!(stats.year_count.values().all(|c| *c == 7));
    assert!(stats.job_year_count.values().all(|c| *c == 4));
}

#[test]
fn test_missing_rates_only_shrink_counts() {
    let pipeline = Pipeline::new(AnalysisSettings::default());
    let filter = VacancyFilter::new("Python");

    let with_usd = pipeline.run(&dataset(), &filter, &usd_table()).unwrap();
    let without_usd = pipeline.run(&dataset(), &filter, &StaticRates::new("RUR")).unwrap();

    for (year, count) in &without_usd.year_count {
        assert_eq!(count + 1, with_usd.year_count[year]);
    }
}

#[test]
fn test_region_shares_over_all_regions_sum_to_one() {
    let settings = AnalysisSettings {
        share_threshold: 0.0,
        top_regions: 100,
    };
    let stats = Pipeline::new(settings)
        .run(&dataset(), &VacancyFilter::new("Python"), &usd_table())
        .unwrap();

    let sum: f64 = stats.region_share.iter().map(|(_, s)| s).sum();
    assert!((sum - 1.0).abs() < 1e-9);
    assert!(stats.other_region_share() < 1e-9);
    assert_eq!(stats.region_share[0].0, "Moscow");
}

#[test]
fn test_threshold_uses_raw_counts() {
    let mut counts = CountAccumulator::new();
    for _ in 0..981 {
        counts.increment("big".to_string());
    }
    for _ in 0..10 {
        counts.increment("kept".to_string());
    }
    for _ in 0..9 {
        counts.increment("dropped".to_string());
    }

    let shares = counts.finalize_percentages(0.01);
    assert_eq!(shares.total(), 1000);
    assert!(shares.contains(&"kept".to_string()));
    assert!(!shares.contains(&"dropped".to_string()));
}

#[test]
fn test_statistics_serialize_as_ordered_mappings() {
    let records = vec![
        record("Engineer", Some(1000.0), Some(2000.0), "RUR", "Moscow", "2020-03-01"),
        record("Engineer", Some(3000.0), None, "RUR", "Moscow", "2019-03-01"),
    ];
    let stats = Pipeline::new(AnalysisSettings::default())
        .run(&records, &VacancyFilter::new("Engineer"), &StaticRates::new("RUR"))
        .unwrap();

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["year_salary"]["2019"], 3000);
    assert_eq!(json["year_salary"]["2020"], 1500);
    assert_eq!(json["region_share"][0][0], "Moscow");
    assert_eq!(json["region_share"][0][1], 1.0);
}

#[tokio::test]
async fn test_partitioned_run_equals_single_pass() {
    let pipeline = Pipeline::new(AnalysisSettings::default());
    let filter = VacancyFilter::new("Python").with_region("Moscow");
    let rates: Arc<dyn RateLookup> = Arc::new(usd_table());

    let single = pipeline.run(&dataset(), &filter, rates.as_ref()).unwrap();

    let (by_year, undated) = partition_by_year(dataset());
    assert!(undated.is_empty());
    let sources: Vec<_> = by_year
        .into_iter()
        .map(|(year, records)| InMemoryPartition::new(year.to_string(), records))
        .collect();

    let years = run_partitions(sources, &pipeline, &filter, Arc::clone(&rates), 3)
        .await
        .into_complete()
        .unwrap();

    assert_eq!(years.year_salary, single.year_salary);
    assert_eq!(years.year_count, single.year_count);
    assert_eq!(years.job_year_salary, single.job_year_salary);
    assert_eq!(years.job_year_count, single.job_year_count);
    assert_eq!(
        years.year_count.keys().copied().collect::<Vec<_>>(),
        (2018..=2022).collect::<Vec<_>>()
    );
}

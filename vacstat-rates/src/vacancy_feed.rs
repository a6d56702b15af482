//! Vacancy search API feed
//!
//! The search endpoint returns at most 2000 vacancies per query (`per_page`
//! × `page` depth), so a day is cut into equal time windows and every window
//! is paged separately. Windows are fetched concurrently; pages within a
//! window are fetched in order until the API reports no more pages.
//!
//! ```text
//! GET <api>?date_from=2022-12-29T00:00:00&date_to=2022-12-29T06:00:00&per_page=100&page=0
//! {"items": [{"name": .., "salary": {"from": .., "to": .., "currency": ..},
//!             "area": {"name": ..}, "published_at": ..}, ..],
//!  "pages": 20}
//! ```
//! Items without a salary block are skipped.

use crate::error::{RatesError, Result};
use crate::http::{build_client, RateLimiter};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use vacstat_common::RawVacancy;

const RATE_LIMIT_MS: u64 = 100;
const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Half-open publication time window `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl TimeWindow {
    pub fn date_from(&self) -> String {
        self.from.format(QUERY_TIME_FORMAT).to_string()
    }

    pub fn date_to(&self) -> String {
        self.to.format(QUERY_TIME_FORMAT).to_string()
    }
}

/// Cut `day` into `slices` consecutive windows covering the whole day
pub fn day_windows(day: NaiveDate, slices: u32) -> Vec<TimeWindow> {
    let slices = slices.max(1);
    let start = day.and_hms_opt(0, 0, 0).unwrap_or_default();
    let end = start + Duration::days(1);
    let step = Duration::seconds(86_400 / i64::from(slices));

    (0..slices)
        .map(|i| {
            let from = start + step * i as i32;
            let to = if i + 1 == slices { end } else { from + step };
            TimeWindow { from, to }
        })
        .collect()
}

/// Page request parameters shared by every window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VacancyQuery {
    /// Pages requested per window at most
    pub pages: u32,
    pub per_page: u32,
    /// Search specialization filter, if any
    pub specialization: Option<u32>,
}

/// One page of search results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VacancyPage {
    /// Vacancies with a salary block, in API order
    pub items: Vec<RawVacancy>,
    /// Total pages available for the query
    pub pages: u32,
}

/// Source of vacancy search results
#[async_trait]
pub trait VacancyFeed: Send + Sync {
    /// Page `page` (0-based) of the vacancies published within `window`
    async fn page(
        &self,
        window: &TimeWindow,
        page: u32,
        query: &VacancyQuery,
    ) -> Result<VacancyPage>;
}

#[derive(Debug, Deserialize)]
struct SearchDocument {
    items: Vec<SearchItem>,
    #[serde(default)]
    pages: u32,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    name: String,
    salary: Option<SearchSalary>,
    area: SearchArea,
    published_at: String,
}

#[derive(Debug, Deserialize)]
struct SearchSalary {
    from: Option<f64>,
    to: Option<f64>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchArea {
    name: String,
}

/// Parse one search response
pub fn parse_vacancy_page(body: &str) -> Result<VacancyPage> {
    let document: SearchDocument = serde_json::from_str(body)
        .map_err(|e| RatesError::Parse(format!("vacancy page: {}", e)))?;

    let items = document
        .items
        .into_iter()
        .filter_map(|item| {
            let salary = item.salary?;
            Some(RawVacancy {
                name: item.name,
                salary_from: salary.from,
                salary_to: salary.to,
                salary_currency: salary.currency,
                region: item.area.name,
                published_at: item.published_at,
            })
        })
        .collect();

    Ok(VacancyPage {
        items,
        pages: document.pages,
    })
}

/// HTTP client for the vacancy search API
pub struct HhClient {
    http_client: reqwest::Client,
    api_url: String,
    rate_limiter: Arc<RateLimiter>,
}

impl HhClient {
    pub fn new(api_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http_client: build_client()?,
            api_url: api_url.into(),
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
        })
    }
}

#[async_trait]
impl VacancyFeed for HhClient {
    async fn page(
        &self,
        window: &TimeWindow,
        page: u32,
        query: &VacancyQuery,
    ) -> Result<VacancyPage> {
        self.rate_limiter.wait().await;

        let mut params = vec![
            ("date_from", window.date_from()),
            ("date_to", window.date_to()),
            ("per_page", query.per_page.to_string()),
            ("page", page.to_string()),
        ];
        if let Some(specialization) = query.specialization {
            params.push(("specialization", specialization.to_string()));
        }
        debug!(from = %window.date_from(), page, "Requesting vacancy page");

        let response = self
            .http_client
            .get(&self.api_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| RatesError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RatesError::Api(status.as_u16(), error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RatesError::Network(e.to_string()))?;
        parse_vacancy_page(&body)
    }
}

async fn fetch_window(
    feed: &dyn VacancyFeed,
    window: &TimeWindow,
    query: &VacancyQuery,
) -> Result<Vec<RawVacancy>> {
    let mut vacancies = Vec::new();
    let mut page = 0;
    while page < query.pages {
        let result = feed.page(window, page, query).await?;
        vacancies.extend(result.items);
        page += 1;
        if page >= result.pages {
            break;
        }
    }
    debug!(
        from = %window.date_from(),
        pages = page,
        vacancies = vacancies.len(),
        "Window fetched"
    );
    Ok(vacancies)
}

/// Fetch every window, at most `workers` at a time
///
/// Results keep window order. Any failed request fails the whole fetch.
pub async fn fetch_vacancies(
    feed: &dyn VacancyFeed,
    windows: &[TimeWindow],
    query: &VacancyQuery,
    workers: usize,
) -> Result<Vec<RawVacancy>> {
    info!(windows = windows.len(), workers, "Fetching vacancies");

    let mut outcomes: Vec<(usize, Result<Vec<RawVacancy>>)> =
        stream::iter(windows.iter().enumerate())
            .map(|(index, window)| async move {
                (index, fetch_window(feed, window, query).await)
            })
            .buffer_unordered(workers.max(1))
            .collect()
            .await;
    outcomes.sort_by_key(|(index, _)| *index);

    let mut vacancies = Vec::new();
    for (_, outcome) in outcomes {
        vacancies.extend(outcome?);
    }
    info!(vacancies = vacancies.len(), "Vacancies fetched");
    Ok(vacancies)
}

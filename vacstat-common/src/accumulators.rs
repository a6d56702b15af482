//! Grouping accumulators
//!
//! Two accumulator shapes, both keyed by an ordered group key (year or
//! region):
//! - [`CountAccumulator`]: key → running count
//! - [`SumAverageAccumulator`]: key → (running sum, running count)
//!
//! Finalization consumes the accumulator and returns a read-only snapshot
//! ([`Shares`], [`Averages`] or a plain ordered count map). A finalized
//! accumulator cannot be finalized again:
//!
//! ```compile_fail
//! use vacstat_common::accumulators::SumAverageAccumulator;
//!
//! let mut salaries = SumAverageAccumulator::new();
//! salaries.add(2020, 1000.0);
//! let first = salaries.finalize_averages();
//! let second = salaries.finalize_averages(); // value moved by the first call
//! ```

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Allowed floating-point slack when comparing a raw count against the
/// representation threshold
const THRESHOLD_EPSILON: f64 = 1e-9;

/// Key → running count
#[derive(Debug, Clone)]
pub struct CountAccumulator<K> {
    counts: BTreeMap<K, u64>,
    total: u64,
}

impl<K: Ord + Clone> Default for CountAccumulator<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone> CountAccumulator<K> {
    pub fn new() -> Self {
        Self {
            counts: BTreeMap::new(),
            total: 0,
        }
    }

    /// Count one record under `key`
    pub fn increment(&mut self, key: K) {
        *self.counts.entry(key).or_insert(0) += 1;
        self.total += 1;
    }

    /// Make sure `key` appears in the output, with count 0 if never
    /// incremented
    pub fn ensure_present(&mut self, key: K) {
        self.counts.entry(key).or_insert(0);
    }

    /// Number of increments across all keys
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn get(&self, key: &K) -> Option<u64> {
        self.counts.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Finalize into raw counts, ascending by key
    pub fn finalize_counts(self) -> BTreeMap<K, u64> {
        self.counts
    }

    /// Finalize into shares of the total, dropping sparse keys
    ///
    /// A key is dropped when its raw count is below `threshold × total`.
    /// The decision is taken on the integer count, before it is turned into
    /// a share. With total 1000 and threshold 0.01, a key counted 10 times
    /// is kept and one counted 9 times is dropped. The cut-off is not
    /// rounded: with total 150 it is 1.5, so a single record is dropped.
    pub fn finalize_percentages(self, threshold: f64) -> Shares<K> {
        let total = self.total;
        let min_count = threshold * total as f64;

        let mut shares = BTreeMap::new();
        let mut dropped = 0usize;
        for (key, count) in self.counts {
            if (count as f64) + THRESHOLD_EPSILON < min_count {
                dropped += 1;
                continue;
            }
            let share = if total == 0 {
                0.0
            } else {
                count as f64 / total as f64
            };
            shares.insert(key, share);
        }

        Shares {
            shares,
            total,
            dropped,
        }
    }
}

/// Finalized shares (fraction of all counted records) per key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shares<K: Ord> {
    shares: BTreeMap<K, f64>,
    total: u64,
    dropped: usize,
}

impl<K: Ord + Clone> Shares<K> {
    pub fn get(&self, key: &K) -> Option<f64> {
        self.shares.get(key).copied()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.shares.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &f64)> {
        self.shares.iter()
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// Records counted before filtering
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of keys removed by the threshold
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Sum of the retained shares
    pub fn sum(&self) -> f64 {
        self.shares.values().sum()
    }

    /// Top `limit` keys by share, descending; ties by key ascending
    pub fn top(&self, limit: usize) -> Vec<(K, f64)> {
        let mut ranked: Vec<(K, f64)> = self
            .shares
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }
}

/// Key → (running sum, running count)
#[derive(Debug, Clone)]
pub struct SumAverageAccumulator<K> {
    groups: BTreeMap<K, (f64, u64)>,
}

impl<K: Ord + Clone> Default for SumAverageAccumulator<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone> SumAverageAccumulator<K> {
    pub fn new() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }

    /// Add `value` to the running sum of `key` and count it
    pub fn add(&mut self, key: K, value: f64) {
        let entry = self.groups.entry(key).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    /// Make sure `key` appears in the output, with average 0 if nothing was
    /// added
    pub fn ensure_present(&mut self, key: K) {
        self.groups.entry(key).or_insert((0.0, 0));
    }

    pub fn sum(&self, key: &K) -> Option<f64> {
        self.groups.get(key).map(|(sum, _)| *sum)
    }

    pub fn count(&self, key: &K) -> Option<u64> {
        self.groups.get(key).map(|(_, count)| *count)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Finalize every group into `sum / count`, truncated toward zero
    ///
    /// Groups that only had `ensure_present` finalize to 0.
    pub fn finalize_averages(self) -> Averages<K> {
        let averages = self
            .groups
            .into_iter()
            .map(|(key, (sum, count))| {
                let average = if count > 0 {
                    (sum / count as f64).trunc() as i64
                } else {
                    0
                };
                (key, average)
            })
            .collect();
        Averages(averages)
    }
}

/// Finalized integer averages per key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Averages<K: Ord>(BTreeMap<K, i64>);

impl<K: Ord + Clone> Averages<K> {
    pub fn get(&self, key: &K) -> Option<i64> {
        self.0.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &i64)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keep only the keys retained by a share finalization
    pub fn restrict_to(self, retained: &Shares<K>) -> Self {
        Averages(
            self.0
                .into_iter()
                .filter(|(key, _)| retained.contains(key))
                .collect(),
        )
    }

    /// Top `limit` keys by average, descending; ties by key ascending
    pub fn top(&self, limit: usize) -> Vec<(K, i64)> {
        let mut ranked: Vec<(K, i64)> = self.0.iter().map(|(k, v)| (k.clone(), *v)).collect();
        ranked.sort_by(|a, b| match b.1.cmp(&a.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });
        ranked.truncate(limit);
        ranked
    }

    /// All averages ascending by key
    pub fn into_map(self) -> BTreeMap<K, i64> {
        self.0
    }
}

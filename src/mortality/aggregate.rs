use std::collections::HashMap;

use serde::Serialize;

use super::domain::MortalityRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    /// A missing previous count is read as zero.
    pub fn between(count: usize, previous: Option<usize>) -> Self {
        let previous = previous.unwrap_or(0);
        if count > previous {
            Trend::Up
        } else if count == previous {
            Trend::Flat
        } else {
            Trend::Down
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Flat => "flat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateBucket {
    pub name: String,
    pub count: usize,
    pub previous_count: Option<usize>,
    pub trend: Trend,
}

impl AggregateBucket {
    pub fn new(name: impl Into<String>, count: usize, previous_count: Option<usize>) -> Self {
        Self {
            name: name.into(),
            count,
            previous_count,
            trend: Trend::between(count, previous_count),
        }
    }
}

/// Counts per key in first-seen order, remembering each key's display name.
#[derive(Debug, Default)]
struct Tally {
    order: Vec<(String, String)>,
    counts: HashMap<String, usize>,
}

impl Tally {
    fn add(&mut self, key: &str, name: &str) {
        match self.counts.get_mut(key) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(key.to_string(), 1);
                self.order.push((key.to_string(), name.to_string()));
            }
        }
    }

    fn count(&self, key: &str) -> Option<usize> {
        self.counts.get(key).copied()
    }

    fn into_buckets(self, previous: Option<&Tally>) -> Vec<AggregateBucket> {
        let mut buckets: Vec<AggregateBucket> = self
            .order
            .iter()
            .map(|(key, name)| {
                let count = self.counts.get(key).copied().unwrap_or(0);
                let previous_count = previous.and_then(|tally| tally.count(key));
                AggregateBucket::new(name.clone(), count, previous_count)
            })
            .collect();
        // Stable, so ties keep first-seen order.
        buckets.sort_by_key(|bucket| bucket.count);
        buckets
    }
}

fn tally_categories(records: &[MortalityRecord]) -> Tally {
    let mut tally = Tally::default();
    for (category, _) in records.iter().filter_map(MortalityRecord::tags) {
        tally.add(category, category);
    }
    tally
}

fn tally_organisation_units(records: &[MortalityRecord]) -> Tally {
    let mut tally = Tally::default();
    for (_, unit) in records.iter().filter_map(MortalityRecord::tags) {
        tally.add(&unit.id, &unit.name);
    }
    tally
}

/// Categories ascending by count, keeping the `limit` largest.
pub fn top_categories(
    records: &[MortalityRecord],
    previous: &[MortalityRecord],
    limit: usize,
) -> Vec<AggregateBucket> {
    let previous = tally_categories(previous);
    let mut buckets = tally_categories(records).into_buckets(Some(&previous));
    let keep_from = buckets.len().saturating_sub(limit);
    buckets.split_off(keep_from)
}

/// Organisation units ascending by count, without truncation.
pub fn group_by_organisation_unit(records: &[MortalityRecord]) -> Vec<AggregateBucket> {
    tally_organisation_units(records).into_buckets(None)
}

/// Like [`group_by_organisation_unit`], with counts from a prior period.
pub fn compare_organisation_units(
    records: &[MortalityRecord],
    previous: &[MortalityRecord],
) -> Vec<AggregateBucket> {
    let previous = tally_organisation_units(previous);
    tally_organisation_units(records).into_buckets(Some(&previous))
}

/// Records that would enter aggregation.
pub fn tagged_total(records: &[MortalityRecord]) -> usize {
    records.iter().filter(|record| record.tags().is_some()).count()
}

/// `subset / total` as a percentage rounded to two decimals; zero when `total` is zero.
pub fn percentage(subset: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = subset as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::filter::FilterSpec;
use super::model::{ExamTable, Record};

// ---------------------------------------------------------------------------
// Summary – what the dashboard charts
// ---------------------------------------------------------------------------

/// Aggregates over one filtered record set.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Summary {
    /// Mean score per year, ascending by year. `None` when a year has no
    /// numeric score.
    pub yearly_avg: BTreeMap<i32, Option<f64>>,
    /// Mean score per test group, highest first.
    pub group_avg: Ranked<Option<f64>>,
    /// Percentage of rows per result value, most frequent first.
    pub pass_fail: Ranked<f64>,
    pub total_candidates: usize,
    /// `None` when no row passed the filters.
    pub pass_rate: Option<f64>,
}

/// Ordered key/value pairs, serialized as a JSON object in this order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ranked<V>(pub Vec<(String, V)>);

impl<V> Ranked<V> {
    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.0.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V: Serialize> Serialize for Ranked<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Observability hook
// ---------------------------------------------------------------------------

/// Called at fixed points of [`aggregate_with`].
pub trait AggregateObserver {
    /// After filtering: rows kept out of the table's total.
    fn filtered(&self, _spec: &FilterSpec, _kept: usize, _total: usize) {}

    /// After all aggregates are computed.
    fn aggregated(&self, _summary: &Summary) {}
}

/// Emits the hook points through the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl AggregateObserver for LogObserver {
    fn filtered(&self, spec: &FilterSpec, kept: usize, total: usize) {
        log::debug!("filter kept {kept}/{total} rows ({spec:?})");
    }

    fn aggregated(&self, summary: &Summary) {
        log::debug!(
            "aggregated {} candidates: {} years, groups {:?}, pass_rate {:?}",
            summary.total_candidates,
            summary.yearly_avg.len(),
            summary.group_avg.keys().collect::<Vec<_>>(),
            summary.pass_rate,
        );
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Filter `table` by `spec` and aggregate the remaining rows.
pub fn aggregate(table: &ExamTable, spec: &FilterSpec) -> Summary {
    aggregate_with(table, spec, &LogObserver)
}

/// [`aggregate`] with a caller-supplied observer.
pub fn aggregate_with(
    table: &ExamTable,
    spec: &FilterSpec,
    observer: &dyn AggregateObserver,
) -> Summary {
    let rows = spec.apply(table);
    observer.filtered(spec, rows.len(), table.len());

    let summary = Summary {
        yearly_avg: yearly_average(&rows),
        group_avg: group_average(&rows),
        pass_fail: pass_fail(&rows),
        total_candidates: rows.len(),
        pass_rate: pass_rate(&rows),
    };
    observer.aggregated(&summary);
    summary
}

/// Running sum/count over non-missing scores.
#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, score: Option<f64>) {
        if let Some(s) = score {
            self.sum += s;
            self.count += 1;
        }
    }

    fn rounded(self) -> Option<f64> {
        (self.count > 0).then(|| round2(self.sum / self.count as f64))
    }
}

fn yearly_average(rows: &[&Record]) -> BTreeMap<i32, Option<f64>> {
    let mut by_year: BTreeMap<i32, Mean> = BTreeMap::new();
    for r in rows {
        by_year.entry(r.year).or_default().push(r.score);
    }
    by_year.into_iter().map(|(y, m)| (y, m.rounded())).collect()
}

/// Groups with a missing (empty) name are left out. Ties keep name order and
/// groups without any score sort last.
fn group_average(rows: &[&Record]) -> Ranked<Option<f64>> {
    let mut by_group: BTreeMap<&str, Mean> = BTreeMap::new();
    for r in rows.iter().filter(|r| !r.test_group.is_empty()) {
        by_group.entry(r.test_group.as_str()).or_default().push(r.score);
    }

    let mut ranked: Vec<(String, Option<f64>)> = by_group
        .into_iter()
        .map(|(g, m)| (g.to_string(), m.rounded()))
        .collect();
    ranked.sort_by(|(ga, a), (gb, b)| match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(a).then_with(|| ga.cmp(gb)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => ga.cmp(gb),
    });
    Ranked(ranked)
}

fn pass_fail(rows: &[&Record]) -> Ranked<f64> {
    if rows.is_empty() {
        return Ranked::default();
    }
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for r in rows {
        *counts.entry(r.result.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|(ra, a), (rb, b)| b.cmp(a).then_with(|| ra.cmp(rb)));

    let total = rows.len() as f64;
    Ranked(
        ranked
            .into_iter()
            .map(|(result, n)| (result.to_string(), percent(n, total)))
            .collect(),
    )
}

fn pass_rate(rows: &[&Record]) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let passed = rows.iter().filter(|r| r.is_passed()).count();
    Some(percent(passed, rows.len() as f64))
}

fn percent(n: usize, total: f64) -> f64 {
    round2(n as f64 / total * 100.0)
}

/// Round to 2 decimals, ties to even.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round_ties_even() / 100.0
}

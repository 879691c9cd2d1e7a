//! Duplicate suppression for decoded codes.
//!
//! Two filters run in order: an intra-frame pass that keeps the first
//! reading of each text, then a temporal pass whose rule depends on the
//! active [`DedupPolicy`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::models::Detection;

/// Keep only the first detection of each distinct text, in decode order.
pub fn dedup_within_frame(detections: Vec<Detection>) -> Vec<Detection> {
    let mut seen = HashSet::new();
    detections
        .into_iter()
        .filter(|detection| seen.insert(detection.text.clone()))
        .collect()
}

/// Last time each text was allowed through to reconciliation. Entries are
/// never evicted; only [`DedupCache::reset`] clears them.
#[derive(Debug, Default)]
pub struct DedupCache {
    last_seen: HashMap<String, Instant>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_seen(&self, text: &str) -> Option<Instant> {
        self.last_seen.get(text).copied()
    }

    pub fn record(&mut self, text: &str, at: Instant) {
        self.last_seen.insert(text.to_string(), at);
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }

    pub fn reset(&mut self) {
        self.last_seen.clear();
    }
}

/// Texts confirmed during one run, in first-confirmation order.
#[derive(Debug, Default)]
pub struct RunSeenSet {
    seen: HashSet<String>,
    order: Vec<String>,
}

impl RunSeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `text` was not confirmed before in this run.
    pub fn insert(&mut self, text: &str) -> bool {
        if !self.seen.insert(text.to_string()) {
            return false;
        }
        self.order.push(text.to_string());
        true
    }

    pub fn contains(&self, text: &str) -> bool {
        self.seen.contains(text)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn into_codes(self) -> Vec<String> {
        self.order
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Batch mode: the first sighting in a run is handled, later ones are
    /// dropped regardless of elapsed time.
    RunScoped,
    /// Continuous mode: a text re-triggers reconciliation once `window` has
    /// passed since it was last let through.
    TtlGated {
        window: Duration,
        persist_once_per_run: bool,
    },
}

impl fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupPolicy::RunScoped => write!(f, "run-scoped"),
            DedupPolicy::TtlGated {
                window,
                persist_once_per_run,
            } => {
                let persist = if *persist_once_per_run {
                    "persist once per run"
                } else {
                    "persist every re-trigger"
                };
                write!(f, "ttl-gated ({}s window, {persist})", window.as_secs_f64())
            }
        }
    }
}

/// What the pipeline may do with one surviving detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub reconcile: bool,
    pub persist: bool,
}

impl Verdict {
    const SUPPRESS: Verdict = Verdict {
        reconcile: false,
        persist: false,
    };

    pub fn is_suppressed(&self) -> bool {
        !self.reconcile && !self.persist
    }
}

/// Cross-frame filter. Owns the [`DedupCache`], which outlives single runs.
///
/// Only [`DedupPolicy::TtlGated`] reads or writes the cache; under
/// [`DedupPolicy::RunScoped`] it stays empty and the per-run set decides.
#[derive(Debug)]
pub struct TemporalFilter {
    policy: DedupPolicy,
    cache: DedupCache,
}

impl TemporalFilter {
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            cache: DedupCache::new(),
        }
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    pub fn cache(&self) -> &DedupCache {
        &self.cache
    }

    pub fn reset(&mut self) {
        self.cache.reset();
    }

    pub fn evaluate(&mut self, text: &str, now: Instant, run: &mut RunSeenSet) -> Verdict {
        match self.policy {
            DedupPolicy::RunScoped => {
                if !run.insert(text) {
                    return Verdict::SUPPRESS;
                }
                Verdict {
                    reconcile: true,
                    persist: true,
                }
            }
            DedupPolicy::TtlGated {
                window,
                persist_once_per_run,
            } => {
                let expired = self
                    .cache
                    .last_seen(text)
                    .map_or(true, |last| now.saturating_duration_since(last) >= window);
                if !expired {
                    return Verdict::SUPPRESS;
                }

                self.cache.record(text, now);
                let first_in_run = run.insert(text);
                Verdict {
                    reconcile: true,
                    persist: first_in_run || !persist_once_per_run,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SymbolKind;

    fn ttl(persist_once_per_run: bool) -> TemporalFilter {
        TemporalFilter::new(DedupPolicy::TtlGated {
            window: Duration::from_secs(5),
            persist_once_per_run,
        })
    }

    #[test]
    fn intra_frame_keeps_first_reading_in_order() {
        let detections = vec![
            Detection::new(SymbolKind::QrCode, "A").with_polygon([(0, 0), (1, 0), (1, 1), (0, 1)]),
            Detection::new(SymbolKind::Ean13, "B"),
            Detection::new(SymbolKind::QrCode, "A"),
        ];
        let kept = dedup_within_frame(detections);
        let texts: Vec<_> = kept.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, ["A", "B"]);
        assert!(kept[0].has_quad_outline());
    }

    #[test]
    fn ttl_window_boundary() {
        let mut filter = ttl(true);
        let mut run = RunSeenSet::new();
        let t0 = Instant::now();

        assert!(filter.evaluate("A", t0, &mut run).reconcile);

        let inside = t0 + Duration::from_millis(4_999);
        assert!(filter.evaluate("A", inside, &mut run).is_suppressed());

        let at_window = t0 + Duration::from_secs(5);
        let verdict = filter.evaluate("A", at_window, &mut run);
        assert!(verdict.reconcile);
        assert!(!verdict.persist);

        // The window restarts from the last allowed sighting.
        let shortly_after = at_window + Duration::from_secs(1);
        assert!(filter.evaluate("A", shortly_after, &mut run).is_suppressed());
    }

    #[test]
    fn ttl_without_run_rule_persists_every_retrigger() {
        let mut filter = ttl(false);
        let mut run = RunSeenSet::new();
        let t0 = Instant::now();

        assert!(filter.evaluate("A", t0, &mut run).persist);
        assert!(filter.evaluate("A", t0 + Duration::from_secs(6), &mut run).persist);
        assert_eq!(run.len(), 1);
    }

    #[test]
    fn run_scoped_ignores_elapsed_time() {
        let mut filter = TemporalFilter::new(DedupPolicy::RunScoped);
        let mut run = RunSeenSet::new();
        let t0 = Instant::now();

        let first = filter.evaluate("A", t0, &mut run);
        assert!(first.reconcile && first.persist);
        let much_later = t0 + Duration::from_secs(3_600);
        assert!(filter.evaluate("A", much_later, &mut run).is_suppressed());

        let mut next_run = RunSeenSet::new();
        assert!(filter.evaluate("A", much_later, &mut next_run).reconcile);
    }

    #[test]
    fn run_scoped_leaves_the_cache_empty() {
        let mut filter = TemporalFilter::new(DedupPolicy::RunScoped);
        let t0 = Instant::now();
        assert!(filter.evaluate("A", t0, &mut RunSeenSet::new()).reconcile);
        assert!(filter.cache().is_empty());

        // Same instant, new run: nothing cached can hold the code back.
        assert!(filter.evaluate("A", t0, &mut RunSeenSet::new()).reconcile);
    }

    #[test]
    fn cache_survives_runs_until_reset() {
        let mut filter = ttl(true);
        let t0 = Instant::now();
        filter.evaluate("A", t0, &mut RunSeenSet::new());

        let mut second_run = RunSeenSet::new();
        assert!(filter.evaluate("A", t0, &mut second_run).is_suppressed());

        filter.reset();
        assert!(filter.cache().is_empty());
        assert!(filter.evaluate("A", t0, &mut second_run).persist);
    }

    #[test]
    fn run_set_remembers_confirmation_order() {
        let mut run = RunSeenSet::new();
        assert!(run.insert("B"));
        assert!(run.insert("A"));
        assert!(!run.insert("B"));
        assert!(run.contains("A"));
        assert_eq!(run.into_codes(), ["B", "A"]);
    }

    #[test]
    fn policy_names_itself() {
        assert_eq!(DedupPolicy::RunScoped.to_string(), "run-scoped");
        assert_eq!(
            ttl(true).policy().to_string(),
            "ttl-gated (5s window, persist once per run)"
        );
    }
}

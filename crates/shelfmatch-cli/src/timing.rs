//! Opt-in wall-clock timing for command phases.
//!
//! Samples go to one process-wide buffer, so a phase timed on any thread lands
//! in the same report. Operations are reported in the order they were first
//! seen.

use serde_json::json;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingReport {
    pub operations: Vec<OpTiming>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpTiming {
    pub name: String,
    pub count: usize,
    pub total: Duration,
    pub p50: Duration,
    pub max: Duration,
}

struct Sample {
    name: &'static str,
    elapsed: Duration,
}

static SAMPLES: Mutex<Vec<Sample>> = Mutex::new(Vec::new());
static TIMING_ENABLED: AtomicBool = AtomicBool::new(false);

/// True when `SHELFMATCH_TIMING` is `1`, `true`, `yes`, or `on`.
pub fn timing_enabled_from_env() -> bool {
    std::env::var("SHELFMATCH_TIMING")
        .ok()
        .is_some_and(|value| is_truthy(&value))
}

pub fn set_timing_enabled(enabled: bool) {
    TIMING_ENABLED.store(enabled, Ordering::Relaxed);
    if !enabled {
        clear_timings();
    }
}

pub fn is_timing_enabled() -> bool {
    TIMING_ENABLED.load(Ordering::Relaxed)
}

pub fn clear_timings() {
    SAMPLES.lock().unwrap_or_else(PoisonError::into_inner).clear();
}

/// Run `f`, recording its duration under `name` when timing is enabled.
pub fn timed<R>(name: &'static str, f: impl FnOnce() -> R) -> R {
    if !is_timing_enabled() {
        return f();
    }

    let started = Instant::now();
    let result = f();
    let elapsed = started.elapsed();
    SAMPLES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(Sample { name, elapsed });
    result
}

/// Drain every recorded sample into a report.
pub fn collect_report() -> TimingReport {
    let samples = std::mem::take(&mut *SAMPLES.lock().unwrap_or_else(PoisonError::into_inner));

    let mut grouped: Vec<(&'static str, Vec<Duration>)> = Vec::new();
    for sample in samples {
        match grouped.iter_mut().find(|(name, _)| *name == sample.name) {
            Some((_, values)) => values.push(sample.elapsed),
            None => grouped.push((sample.name, vec![sample.elapsed])),
        }
    }

    let operations = grouped
        .into_iter()
        .map(|(name, mut values)| {
            values.sort_unstable();
            OpTiming {
                name: name.to_string(),
                count: values.len(),
                total: values.iter().sum(),
                p50: values[(values.len() - 1) / 2],
                max: values[values.len() - 1],
            }
        })
        .collect();

    TimingReport { operations }
}

impl TimingReport {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let operations: Vec<_> = self
            .operations
            .iter()
            .map(|op| {
                json!({
                    "name": op.name,
                    "count": op.count,
                    "total_us": op.total.as_micros(),
                    "p50_us": op.p50.as_micros(),
                    "max_us": op.max.as_micros(),
                })
            })
            .collect();

        json!({ "operations": operations })
    }

    pub fn display_table(&self) -> String {
        let mut out = String::new();
        out.push_str("phase                        count     total       p50       max\n");
        out.push_str("-----------------------------------------------------------------\n");
        for op in &self.operations {
            let _ = writeln!(
                out,
                "{:<28} {:>5} {:>9} {:>9} {:>9}",
                op.name,
                op.count,
                format_duration(op.total),
                format_duration(op.p50),
                format_duration(op.max),
            );
        }
        out
    }
}

fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros >= 1_000_000 {
        format!("{}.{:03}s", micros / 1_000_000, (micros % 1_000_000) / 1_000)
    } else if micros >= 1_000 {
        format!("{}.{:03}ms", micros / 1_000, micros % 1_000)
    } else {
        format!("{micros}µs")
    }
}

fn is_truthy(value: &str) -> bool {
    ["1", "true", "yes", "on"]
        .iter()
        .any(|truthy| value.eq_ignore_ascii_case(truthy))
}

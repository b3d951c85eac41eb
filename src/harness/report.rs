//! Sweep results and reporting sinks.

use crate::dispatch::Operation;
use crate::simd::Tier;

/// Timing of one bound (configuration, tier) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Configuration label, e.g. `"quantize 8x8"`
    pub label: String,
    /// Operation under test
    pub operation: Operation,
    /// Tier that provided the kernel
    pub tier: Tier,
    /// Kernel invocations in the timed batch
    pub invocations: u64,
    /// Mean wall-clock time per invocation
    pub nanos_per_call: f64,
    /// Reference time divided by this tier's time; 1.0 for the reference
    pub speedup: f64,
}

/// Event emitted by the harness while sweeping.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepEvent {
    /// A tier ran a configuration
    Measured(Measurement),
    /// A tier's output differed from the reference
    Mismatch {
        /// Configuration label
        label: String,
        /// Tier whose output differed
        tier: Tier,
    },
}

/// Receives sweep events as they happen.
pub trait ReportSink {
    /// Handle one event.
    fn event(&mut self, event: &SweepEvent);
}

/// Forwards events to the `log` facade: measurements at `info`, mismatches
/// at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn event(&mut self, event: &SweepEvent) {
        match event {
            SweepEvent::Measured(m) => log::info!(
                "{} [{}]: {:.1} ns/call over {} calls ({:.2}x)",
                m.label,
                m.tier,
                m.nanos_per_call,
                m.invocations,
                m.speedup
            ),
            SweepEvent::Mismatch { label, tier } => {
                log::warn!("{} [{}]: output differs from reference", label, tier)
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn event(&mut self, _event: &SweepEvent) {}
}

/// Stores every event in order.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    /// Events received so far
    pub events: Vec<SweepEvent>,
}

impl CollectingSink {
    /// Measurement events only.
    pub fn measurements(&self) -> impl Iterator<Item = &Measurement> {
        self.events.iter().filter_map(|e| match e {
            SweepEvent::Measured(m) => Some(m),
            SweepEvent::Mismatch { .. } => None,
        })
    }

    /// Number of mismatch events.
    pub fn mismatch_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SweepEvent::Mismatch { .. }))
            .count()
    }
}

impl ReportSink for CollectingSink {
    fn event(&mut self, event: &SweepEvent) {
        self.events.push(event.clone());
    }
}

/// Run-scoped mismatch counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorAccumulator {
    count: usize,
    failures: Vec<String>,
}

impl ErrorAccumulator {
    /// Record a mismatching (configuration, tier) pair.
    pub fn record(&mut self, label: &str, tier: Tier) {
        self.count += 1;
        self.failures.push(format!("{} [{}]", label, tier));
    }

    /// Mismatches recorded so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Labels of the failing pairs, in discovery order.
    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    /// True if nothing was recorded.
    pub fn is_clean(&self) -> bool {
        self.count == 0
    }
}

/// Aggregate outcome of one or more sweeps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// Number of mismatching (configuration, tier) pairs
    pub errors: usize,
    /// Labels of the mismatching pairs
    pub mismatches: Vec<String>,
    /// Total kernel invocations, reference included
    pub invocations: u64,
    /// One entry per bound (configuration, tier) pair
    pub measurements: Vec<Measurement>,
}

impl SweepReport {
    pub(crate) fn new(accumulator: ErrorAccumulator, invocations: u64, measurements: Vec<Measurement>) -> Self {
        Self {
            errors: accumulator.count,
            mismatches: accumulator.failures,
            invocations,
            measurements,
        }
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: SweepReport) {
        self.errors += other.errors;
        self.mismatches.extend(other.mismatches);
        self.invocations += other.invocations;
        self.measurements.extend(other.measurements);
    }

    /// True if every tier matched the reference.
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }

    /// Measurements of one tier.
    pub fn for_tier(&self, tier: Tier) -> impl Iterator<Item = &Measurement> {
        self.measurements.iter().filter(move |m| m.tier == tier)
    }
}

//! Differential test harness.
//!
//! For every configuration of a sweep, the reference tier runs first and its
//! output becomes the expected result. Every other requested tier is then
//! bound from a table limited to `{reference, tier}`. A tier whose entry
//! for the configuration came from a lower tier does not implement it and
//! is skipped without a measurement.
//!
//! ```no_run
//! use hevc_dsp::harness::{self, Harness, LogSink, Mode};
//! use hevc_dsp::TierMask;
//!
//! let harness = Harness::new(TierMask::detect()).mode(Mode::Benchmark { repeats: 1000 });
//! let report = harness::run_all(&harness, &mut LogSink)?;
//! assert!(report.is_clean());
//! # Ok::<(), hevc_dsp::Error>(())
//! ```

mod report;
mod scenario;

pub use report::{
    CollectingSink, ErrorAccumulator, LogSink, Measurement, NullSink, ReportSink, SweepEvent,
    SweepReport,
};
pub use scenario::{
    configurations, InverseDstScenario, InverseTransformScenario, PredIntraScenario,
    QuantizeInverseScenario, QuantizeScenario, ReconstructScenario, Scenario, Snapshot,
    COEFF_SENTINEL, PIXEL_SENTINEL, SCENARIO_STRIDE,
};

use std::time::Instant;

use crate::dispatch::{KernelTable, Operation};
use crate::error::{Error, Result};
use crate::simd::{Tier, TierMask};

/// Default seed for scenario inputs.
pub const DEFAULT_SEED: u64 = 0x4845_5643;

/// What each bound (configuration, tier) pair does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// One invocation per pair
    #[default]
    Correctness,
    /// `repeats` timed invocations per pair
    Benchmark {
        /// Invocations per pair; 0 is treated as 1
        repeats: u32,
    },
}

impl Mode {
    /// Invocations per bound pair.
    pub const fn repeats(self) -> u32 {
        match self {
            Mode::Correctness => 1,
            Mode::Benchmark { repeats: 0 } => 1,
            Mode::Benchmark { repeats } => repeats,
        }
    }
}

/// Sweep configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Harness {
    mask: TierMask,
    mode: Mode,
    seed: u64,
    check_support: bool,
}

impl Harness {
    /// Sweep the tiers in `mask`. The reference tier is always included.
    pub fn new(mask: TierMask) -> Self {
        Self {
            mask: mask.with(Tier::Reference),
            mode: Mode::default(),
            seed: DEFAULT_SEED,
            check_support: true,
        }
    }

    /// Sweep every tier this machine supports.
    pub fn detected() -> Self {
        Self::new(TierMask::detect())
    }

    /// Set the mode.
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the seed used to generate scenario inputs.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Skip the check that every requested tier is supported by this CPU.
    ///
    /// Only useful with external providers whose kernels need no special
    /// instructions.
    #[must_use]
    pub fn trust_mask(mut self) -> Self {
        self.check_support = false;
        self
    }

    /// Tiers swept, reference included.
    pub fn tiers(&self) -> TierMask {
        self.mask
    }

    /// Current mode.
    pub fn current_mode(&self) -> Mode {
        self.mode
    }

    /// Current seed.
    pub fn current_seed(&self) -> u64 {
        self.seed
    }

    fn validate(&self) -> Result<()> {
        if !self.check_support {
            return Ok(());
        }
        let unsupported = TierMask::from_bits(!TierMask::detect().bits());
        match self.mask.intersection(unsupported).tiers().next() {
            Some(tier) => Err(Error::UnsupportedTier(tier)),
            None => Ok(()),
        }
    }

    /// Sweep `scenarios` with the built-in providers.
    pub fn run(&self, scenarios: &mut [Box<dyn Scenario>], sink: &mut dyn ReportSink) -> Result<SweepReport> {
        self.run_with(scenarios, KernelTable::build, sink)
    }

    /// Sweep `scenarios`, building each per-tier table with `build`.
    ///
    /// `build` receives `{reference, tier}` and must return a table whose
    /// entries are stamped with the tier that provided them, as
    /// [`KernelTable::build_with`] does.
    pub fn run_with(
        &self,
        scenarios: &mut [Box<dyn Scenario>],
        build: impl Fn(TierMask) -> KernelTable,
        sink: &mut dyn ReportSink,
    ) -> Result<SweepReport> {
        if scenarios.is_empty() {
            return Err(Error::EmptySweep);
        }
        self.validate()?;

        let repeats = self.mode.repeats();
        let tables: Vec<(Tier, KernelTable)> = self
            .mask
            .tiers()
            .map(|tier| (tier, build(TierMask::REFERENCE.with(tier))))
            .collect();

        let mut errors = ErrorAccumulator::default();
        let mut invocations = 0u64;
        let mut measurements = Vec::new();

        for scenario in scenarios.iter_mut() {
            let label = scenario.label();
            let mut reference = None;
            let mut reference_nanos = 0.0;

            for (tier, table) in &tables {
                let tier = *tier;
                if !scenario.bind(table, tier) {
                    continue;
                }

                scenario.reset();
                let start = Instant::now();
                scenario.invoke(repeats);
                let nanos = start.elapsed().as_nanos() as f64 / repeats as f64;
                invocations += repeats as u64;

                let speedup = match &reference {
                    None => {
                        reference = Some(scenario.capture());
                        reference_nanos = nanos;
                        1.0
                    }
                    Some(expected) => {
                        if scenario.mismatch(expected) {
                            errors.record(&label, tier);
                            sink.event(&SweepEvent::Mismatch {
                                label: label.clone(),
                                tier,
                            });
                        }
                        if nanos > 0.0 {
                            reference_nanos / nanos
                        } else {
                            1.0
                        }
                    }
                };

                let measurement = Measurement {
                    label: label.clone(),
                    operation: scenario.operation(),
                    tier,
                    invocations: repeats as u64,
                    nanos_per_call: nanos,
                    speedup,
                };
                sink.event(&SweepEvent::Measured(measurement.clone()));
                measurements.push(measurement);
            }

            if reference.is_none() {
                log::debug!("{}: no reference kernel, configuration skipped", label);
            }
        }

        Ok(SweepReport::new(errors, invocations, measurements))
    }

    /// Sweep the standard configurations of one operation.
    pub fn run_operation(&self, operation: Operation, sink: &mut dyn ReportSink) -> Result<SweepReport> {
        let mut scenarios = configurations(operation, self.seed)?;
        self.run(&mut scenarios, sink)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::detected()
    }
}

/// Sweep the standard configurations of every operation and aggregate the
/// results.
pub fn run_all(harness: &Harness, sink: &mut dyn ReportSink) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    for operation in Operation::ALL {
        report.merge(harness.run_operation(operation, sink)?);
    }
    log::debug!(
        "sweep over {} finished: {} invocations, {} mismatches",
        harness.tiers(),
        report.invocations,
        report.errors
    );
    Ok(report)
}

//! # hevc-dsp
//!
//! Bit-exact HEVC signal-processing kernels with tiered, swappable
//! implementations and a differential harness that checks and times them.
//!
//! - **Reference kernels** - DC intra prediction, forward and inverse
//!   quantization, reconstruction, inverse DCT/DST with residual add
//! - **Capability keys** - block size, edge filter and channel packed into a
//!   table index
//! - **Dispatch tables** - per-operation slots layered from the reference
//!   tier up through portable and x86_64 intrinsic tiers
//! - **Differential harness** - sweeps configurations and tiers, compares
//!   every tier with the reference and reports timings
//!
//! ## Quick Start
//!
//! ```no_run
//! use hevc_dsp::{Channel, KernelKey, KernelTable, Neighbours, TierMask};
//!
//! let table = KernelTable::build(TierMask::detect());
//! let key = KernelKey::intra(Channel::Luma, 3);
//!
//! let neighbours = Neighbours::filled(128);
//! let mut block = [0u8; 64];
//! if let Some(entry) = table.pred_intra_dc(key) {
//!     (entry.function)(&mut block, &neighbours, key);
//! }
//! ```
//!
//! ## Checking Every Tier
//!
//! ```no_run
//! use hevc_dsp::harness::{self, Harness, LogSink, Mode};
//!
//! # fn main() -> Result<(), hevc_dsp::Error> {
//! let report = harness::run_all(
//!     &Harness::detected().mode(Mode::Benchmark { repeats: 10_000 }),
//!     &mut LogSink,
//! )?;
//! assert!(report.is_clean(), "{:?}", report.mismatches);
//! # Ok(())
//! # }
//! ```
//!
//! ## Tiers
//!
//! | Tier | Source | Coverage |
//! |------|--------|----------|
//! | [`Tier::Reference`] | scalar | every key |
//! | [`Tier::Optimized`] | `multiversion` + `wide` | every key |
//! | [`Tier::Ssse3`] | intrinsics | 8x8 inverse DCT |
//! | [`Tier::Sse41`] | intrinsics | quantize, reconstruct |
//! | [`Tier::Avx2`] | intrinsics | inverse quantize, 8x8/16x16 DC |

// Intrinsic tiers under simd/x86_64 are the only exceptions.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod buffer;
pub mod consts;
pub mod dispatch;
pub mod error;
pub mod harness;
pub mod key;
pub mod simd;
pub mod types;

pub use buffer::AlignedBuf;
pub use dispatch::{Entry, KernelProvider, KernelTable, Operation, TableBuilder};
pub use error::{Error, Result};
pub use harness::{run_all, Harness, Mode, SweepReport};
pub use key::{KernelKey, KeyParams, KEY_SPACE};
pub use simd::{Tier, TierMask};
pub use types::{Channel, DequantizeParams, Neighbours, QuantizeParams};

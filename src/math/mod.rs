//! Mathematical primitives for fedshap.
//!
//! Provides shared math utilities used by valuation and selection:
//!
//! - [`norms`] — L2 norms and cosine distance
//! - [`combinatorics`] — binomial coefficients and bitmask subsets
//! - [`stats`] — softmax and incremental means

pub mod combinatorics;
pub mod norms;
pub mod stats;

pub use combinatorics::{binomial, mask_members};
pub use norms::{cosine_distance, dot, l2_norm, l2_norm_sq};
pub use stats::{softmax, RunningMean};

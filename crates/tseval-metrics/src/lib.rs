// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod frechet;
pub mod inception;
pub mod outliers;
pub mod projector;

pub use frechet::frechet_distance;
pub use inception::{inception_score, CONCENTRATION_SPLITS};
pub use outliers::remove_outliers;
pub use projector::{AxisBounds, FittedProjector};

// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod extractor;
pub mod fcn;
pub mod rocket;

pub use extractor::FeatureExtractor;
pub use fcn::{ConvBlock, FcnExtractor, FcnWeights};
pub use rocket::{RocketExtractor, RocketKernel};

//! Pre-trade gates between a signal and the venue: the exposure guard, the
//! fixed-risk position sizer and the bracket builder that turns a signal's
//! reference prices into a validated [`common::OrderIntent`].

pub mod bracket;
pub mod exposure;
pub mod sizer;

pub use bracket::BracketBuilder;
pub use exposure::{Exposure, ExposureGuard};
pub use sizer::{PositionSizer, Sizing};

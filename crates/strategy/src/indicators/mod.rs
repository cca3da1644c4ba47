pub mod average;

pub use average::{exponential_moving_average, simple_moving_average, AverageKind};

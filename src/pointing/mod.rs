pub mod ops;
mod state;

pub use state::{AzEl, Bounds, Pointing, PointingError, PointingStore};

/// How close observed and commanded position must be, per axis in degrees,
/// before a pointing operation considers the mount arrived.
pub const ARRIVAL_TOLERANCE_DEG: f64 = 0.5;

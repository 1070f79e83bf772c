pub mod reconcile;
mod sim;

pub use sim::SimMotor;

use std::sync::Arc;
use thiserror::Error;

use crate::config::{Config, MotorKind};
use crate::pointing::AzEl;

#[derive(Debug, Error)]
pub enum MotorError {
    #[error("commanded angles {0} rejected by driver")]
    OutOfRange(AzEl),
    #[error("motor io: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability surface of the motor-positioning collaborator.
///
/// The native wire protocol behind `set`/`get` is out of scope here; the
/// daemon only relies on these three calls.
pub trait MotorDriver: Send + Sync {
    fn angles_within_bounds(&self, position: AzEl) -> bool;
    fn set_azimuth_elevation(&self, position: AzEl) -> Result<(), MotorError>;
    fn get_azimuth_elevation(&self) -> Result<AzEl, MotorError>;
}

pub fn driver_for(config: &Config) -> Arc<dyn MotorDriver> {
    match config.motor.kind {
        MotorKind::None => Arc::new(SimMotor::new(config.stow_position(), config.bounds())),
    }
}

use std::sync::Mutex;
use tokio::time::Instant;

use super::{MotorDriver, MotorError};
use crate::pointing::{AzEl, Bounds};

/// Degrees per second each axis slews in simulation.
const SLEW_RATE_DEG_S: f64 = 5.0;

/// Simulated drive for `motor.kind: none`: slews linearly toward the last
/// commanded position, position advanced lazily on each read.
pub struct SimMotor {
    inner: Mutex<SimState>,
    bounds: Bounds,
}

struct SimState {
    current: AzEl,
    target: AzEl,
    updated: Instant,
}

impl SimMotor {
    pub fn new(initial: AzEl, bounds: Bounds) -> Self {
        Self {
            inner: Mutex::new(SimState {
                current: initial,
                target: initial,
                updated: Instant::now(),
            }),
            bounds,
        }
    }

    fn advance(state: &mut SimState) {
        let now = Instant::now();
        let travel = SLEW_RATE_DEG_S * now.duration_since(state.updated).as_secs_f64();
        state.current.az = step_toward(state.current.az, state.target.az, travel);
        state.current.el = step_toward(state.current.el, state.target.el, travel);
        state.updated = now;
    }
}

fn step_toward(current: f64, target: f64, travel: f64) -> f64 {
    let delta = target - current;
    if delta.abs() <= travel {
        target
    } else {
        current + travel.copysign(delta)
    }
}

impl MotorDriver for SimMotor {
    fn angles_within_bounds(&self, position: AzEl) -> bool {
        self.bounds.contains(position)
    }

    fn set_azimuth_elevation(&self, position: AzEl) -> Result<(), MotorError> {
        if !self.bounds.contains(position) {
            return Err(MotorError::OutOfRange(position));
        }
        let mut state = self.inner.lock().unwrap();
        Self::advance(&mut state);
        state.target = position;
        Ok(())
    }

    fn get_azimuth_elevation(&self) -> Result<AzEl, MotorError> {
        let mut state = self.inner.lock().unwrap();
        Self::advance(&mut state);
        Ok(state.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn motor() -> SimMotor {
        SimMotor::new(
            AzEl::new(90.0, 10.0),
            Bounds {
                az: (0.0, 360.0),
                el: (0.0, 89.0),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn slews_linearly_toward_target() {
        let m = motor();
        m.set_azimuth_elevation(AzEl::new(100.0, 10.0)).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        let pos = m.get_azimuth_elevation().unwrap();
        assert!((pos.az - 95.0).abs() < 1e-6);
        tokio::time::sleep(Duration::from_secs(2)).await;
        let pos = m.get_azimuth_elevation().unwrap();
        assert_eq!(pos, AzEl::new(100.0, 10.0));
    }

    #[test]
    fn rejects_command_outside_bounds() {
        let m = motor();
        let err = m.set_azimuth_elevation(AzEl::new(90.0, 95.0)).unwrap_err();
        assert!(matches!(err, MotorError::OutOfRange(_)));
    }
}

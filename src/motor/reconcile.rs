use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::MotorError;
use crate::daemon::Daemon;
use crate::pointing::ARRIVAL_TOLERANCE_DEG;
use crate::radio::RadioParam;

const IDLE_POLL: Duration = Duration::from_secs(1);
const SETTLE_POLL: Duration = Duration::from_millis(500);
const SETTLE_WINDOW: Duration = Duration::from_secs(10);

/// Rotor reconciliation loop: drives the motor toward the commanded position
/// and writes the observed position back into the shared state. Driver
/// errors are logged and retried on the next pass, never fatal.
pub async fn run(daemon: Arc<Daemon>) {
    loop {
        if let Err(e) = reconcile_once(&daemon).await {
            daemon.events.record(e.to_string());
            // Error passes return before any of the inner sleeps; pace the
            // retry so a dead driver cannot flood the event log.
            tokio::time::sleep(IDLE_POLL).await;
        }
    }
}

/// One pass of the outer check. When off target, commands a move and then
/// follows the motor for a bounded settle window; a persistently unreachable
/// target simply comes back around on the next pass.
pub(crate) async fn reconcile_once(daemon: &Daemon) -> Result<(), MotorError> {
    let commanded = daemon.pointing.commanded();
    if !daemon.pointing.observed().within(commanded, ARRIVAL_TOLERANCE_DEG) {
        daemon.motor.set_azimuth_elevation(commanded)?;
        tokio::time::sleep(IDLE_POLL).await;
        let deadline = Instant::now() + SETTLE_WINDOW;
        while !daemon.pointing.observed().within(commanded, ARRIVAL_TOLERANCE_DEG)
            && Instant::now() < deadline
        {
            observe(daemon)?;
            tokio::time::sleep(SETTLE_POLL).await;
        }
    } else {
        observe(daemon)?;
        tokio::time::sleep(IDLE_POLL).await;
    }
    Ok(())
}

/// Polls the driver, records the position and publishes it outbound.
fn observe(daemon: &Daemon) -> Result<(), MotorError> {
    let position = daemon.motor.get_azimuth_elevation()?;
    daemon.pointing.record_observed(position);
    daemon.send_param(RadioParam::MotorAz(position.az));
    daemon.send_param(RadioParam::MotorEl(position.el));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::test_daemon;
    use crate::pointing::AzEl;

    #[tokio::test(start_paused = true)]
    async fn converges_on_commanded_position() {
        let (daemon, mut rx) = test_daemon();
        daemon.pointing.set_destination(AzEl::new(120.0, 35.0)).unwrap();

        // The simulated drive slews at 5 deg/s; the 42 degree move fits in a
        // handful of bounded passes.
        for _ in 0..10 {
            reconcile_once(&daemon).await.unwrap();
            if daemon.pointing.arrived(ARRIVAL_TOLERANCE_DEG) {
                break;
            }
        }
        assert!(daemon.pointing.arrived(ARRIVAL_TOLERANCE_DEG));

        // Position was published while settling.
        let mut published_az = Vec::new();
        while let Ok(param) = rx.try_recv() {
            if let RadioParam::MotorAz(az) = param {
                published_az.push(az);
            }
        }
        assert!(!published_az.is_empty());
        assert!((published_az.last().unwrap() - 120.0).abs() <= ARRIVAL_TOLERANCE_DEG);
    }

    #[tokio::test(start_paused = true)]
    async fn within_tolerance_just_polls_and_publishes() {
        let (daemon, mut rx) = test_daemon();
        reconcile_once(&daemon).await.unwrap();
        let params: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(params.iter().any(|p| matches!(p, RadioParam::MotorAz(_))));
        assert!(params.iter().any(|p| matches!(p, RadioParam::MotorEl(_))));
    }

    struct DeadMotor;

    impl crate::motor::MotorDriver for DeadMotor {
        fn angles_within_bounds(&self, _position: AzEl) -> bool {
            true
        }

        fn set_azimuth_elevation(&self, _position: AzEl) -> Result<(), MotorError> {
            Err(MotorError::Io(std::io::Error::other("port gone")))
        }

        fn get_azimuth_elevation(&self) -> Result<AzEl, MotorError> {
            Err(MotorError::Io(std::io::Error::other("port gone")))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dead_driver_is_retried_at_poll_rate() {
        let config = crate::config::test_config();
        let ephemeris: std::sync::Arc<dyn crate::ephemeris::EphemerisSource> =
            std::sync::Arc::new(crate::ephemeris::Catalog::from_config(&config));
        let (radio_tx, _radio_rx) = tokio::sync::mpsc::unbounded_channel();
        let daemon = Arc::new(crate::daemon::Daemon::new(
            config,
            Arc::new(DeadMotor),
            ephemeris,
            radio_tx,
        ));

        let loop_task = tokio::spawn(run(Arc::clone(&daemon)));
        tokio::time::sleep(Duration::from_secs(3)).await;
        loop_task.abort();

        // One failure per poll interval, not a busy spin.
        let recorded = daemon.events.len();
        assert!(recorded >= 1, "driver failure never recorded");
        assert!(recorded <= 4, "retries not paced: {} events", recorded);
    }
}

use std::time::Duration;

use super::{AzEl, ARRIVAL_TOLERANCE_DEG};
use crate::daemon::Daemon;
use crate::radio::{CalibrationProfile, RadioParam};

const ARRIVAL_POLL: Duration = Duration::from_millis(100);
const CALIBRATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocks until the mount arrives at the commanded position. Unbounded by
/// design: "point at X" completes only when the mount actually gets there.
/// The state lock is only touched to sample, never held across the sleep.
async fn wait_for_arrival(daemon: &Daemon) {
    while !daemon.pointing.arrived(ARRIVAL_TOLERANCE_DEG) {
        tokio::time::sleep(ARRIVAL_POLL).await;
    }
}

/// Points directly at a catalog object and leaves tracking following it.
pub async fn point_at_object(daemon: &Daemon, id: &str) {
    daemon.send_param(RadioParam::Soutrack(id.to_string()));
    let Some(destination) = daemon.object_position(id) else {
        daemon.events.record(format!("unknown object {}", id));
        return;
    };
    match daemon.pointing.set_tracked_object(id, destination) {
        Ok(()) => wait_for_arrival(daemon).await,
        Err(_) => daemon
            .events
            .record(format!("object {} not in motor bounds", id)),
    }
}

/// Points at a literal azimuth/elevation; no tracking follows.
pub async fn point_at_azel(daemon: &Daemon, az: f64, el: f64) {
    // Debug formatting keeps the trailing `.0` on whole degrees, which is
    // the label shape downstream consumers key on.
    daemon.send_param(RadioParam::Soutrack(format!("azel_{:?}_{:?}", az, el)));
    match daemon.pointing.set_destination(AzEl::new(az, el)) {
        Ok(()) => wait_for_arrival(daemon).await,
        Err(_) => daemon
            .events
            .record(format!("position ({}, {}) not in motor bounds", az, el)),
    }
}

/// Fine adjustment relative to the current destination, e.g. during a track.
pub async fn point_at_offset(daemon: &Daemon, az_off: f64, el_off: f64) {
    match daemon.pointing.set_offset(AzEl::new(az_off, el_off)) {
        Ok(()) => wait_for_arrival(daemon).await,
        Err(_) => daemon
            .events
            .record(format!("offset ({}, {}) out of bounds", az_off, el_off)),
    }
}

/// Returns the antenna to the configured stow position.
pub async fn stow(daemon: &Daemon) {
    daemon.send_param(RadioParam::Soutrack("at_stow".to_string()));
    match daemon.pointing.set_destination(daemon.config.stow_position()) {
        Ok(()) => wait_for_arrival(daemon).await,
        Err(_) => daemon.events.record("stow position not in motor bounds"),
    }
}

/// Grid offset for one n-point scan cell. `i` moves elevation in half
/// beamwidths; the azimuth column is widened by 1/cos(el) to compensate
/// foreshortening away from zenith.
pub(crate) fn scan_cell_offset(i: i32, j: i32, elevation: f64, beamwidth: f64) -> AzEl {
    let el_off = f64::from(i) * beamwidth * 0.5;
    let az_off = f64::from(j) * beamwidth * 0.5 / (elevation + el_off).to_radians().cos();
    AzEl::new(az_off, el_off)
}

/// 5x5 scan about an object: visits every grid cell with a dwell at each,
/// restores zero offset and resumes tracking the object by name.
pub async fn n_point_scan(daemon: &Daemon, id: &str) {
    daemon.pointing.clear_tracking();
    daemon.send_param(RadioParam::Soutrack(id.to_string()));
    let dwell = Duration::from_secs_f64(daemon.config.scan_dwell_s);
    for scan in 0..25i32 {
        let Some(center) = daemon.object_position(id) else {
            daemon.events.record(format!("unknown object {}", id));
            break;
        };
        if !daemon.motor.angles_within_bounds(center) {
            daemon
                .events
                .record(format!("object {} not in motor bounds", id));
            tokio::time::sleep(dwell).await;
            continue;
        }
        let offset = scan_cell_offset(
            scan / 5 - 2,
            scan % 5 - 2,
            center.el,
            daemon.config.beamwidth,
        );
        match daemon.pointing.set_scan_cell(center, offset) {
            Ok(()) => wait_for_arrival(daemon).await,
            Err(_) => daemon
                .events
                .record(format!("scan cell {} about {} out of bounds", scan, id)),
        }
        tokio::time::sleep(dwell).await;
    }
    resume_tracking(daemon, id).await;
}

/// Swings the antenna across an object at azimuth offsets of -1, 0 and +1
/// beamwidths, labelling each leg on the outbound queue so recorded data can
/// be tagged by beam position, then resets the label and resumes tracking.
pub async fn beam_switch(daemon: &Daemon, id: &str) {
    daemon.pointing.clear_tracking();
    daemon.send_param(RadioParam::Soutrack(id.to_string()));
    let dwell = Duration::from_secs_f64(daemon.config.scan_dwell_s);
    for leg in 0..3i32 {
        daemon.send_param(RadioParam::BeamSwitch(leg as u32 + 1));
        let Some(center) = daemon.object_position(id) else {
            daemon.events.record(format!("unknown object {}", id));
            break;
        };
        if !daemon.motor.angles_within_bounds(center) {
            daemon
                .events
                .record(format!("object {} not in motor bounds", id));
            tokio::time::sleep(dwell).await;
            continue;
        }
        let az_off = f64::from(leg - 1) * daemon.config.beamwidth / center.el.to_radians().cos();
        match daemon.pointing.set_scan_cell(center, AzEl::new(az_off, 0.0)) {
            Ok(()) => wait_for_arrival(daemon).await,
            Err(_) => daemon
                .events
                .record(format!("beam-switch leg {} about {} out of bounds", leg, id)),
        }
        tokio::time::sleep(dwell).await;
    }
    daemon.send_param(RadioParam::BeamSwitch(0));
    resume_tracking(daemon, id).await;
}

/// Zeroes the offset and re-enters tracking after a scan pattern.
async fn resume_tracking(daemon: &Daemon, id: &str) {
    if daemon.pointing.zero_offset().is_err() {
        daemon
            .events
            .record(format!("could not restore zero offset after scan of {}", id));
    }
    let Some(destination) = daemon.object_position(id) else {
        return;
    };
    if daemon.pointing.set_tracked_object(id, destination).is_err() {
        daemon
            .events
            .record(format!("object {} not in motor bounds", id));
    }
}

/// Runs the calibration collaborator (bounded by a timeout), reloads the
/// persisted profile and pushes both fields to the signal chain.
pub async fn calibrate(daemon: &Daemon) {
    let template = &daemon.config.radio.calibrate_command;
    if template.is_empty() {
        daemon.events.record("no calibration command configured");
    } else {
        let run = async {
            let mut child = tokio::process::Command::new(&template[0])
                .args(&template[1..])
                .kill_on_drop(true)
                .spawn()?;
            child.wait().await
        };
        match tokio::time::timeout(CALIBRATE_TIMEOUT, run).await {
            Ok(Ok(status)) if status.success() => {}
            Ok(Ok(status)) => daemon
                .events
                .record(format!("calibration exited with {}", status)),
            Ok(Err(e)) => daemon.events.record(format!("calibration failed: {}", e)),
            Err(_) => daemon.events.record("calibration timed out"),
        }
    }

    match CalibrationProfile::load(
        &daemon.config.calibration_path(),
        daemon.config.radio.num_bins,
    ) {
        Ok(profile) => {
            daemon.send_param(RadioParam::CalPwr(profile.power));
            daemon.send_param(RadioParam::CalValues(profile.values.clone()));
            *daemon.calibration.lock().unwrap() = profile;
            log::info!("calibration done");
        }
        Err(e) => daemon
            .events
            .record(format!("could not load calibration results: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::test_daemon;
    use crate::pointing::PointingStore;
    use std::sync::Arc;

    /// Mini reconciler: copies commanded straight into observed so arrival
    /// waits complete without the full rotor loop.
    fn follow_commanded(daemon: &Arc<crate::daemon::Daemon>) -> tokio::task::JoinHandle<()> {
        let daemon = Arc::clone(daemon);
        tokio::spawn(async move {
            loop {
                let commanded = daemon.pointing.commanded();
                daemon.pointing.record_observed(commanded);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
    }

    fn drain(
        rx: &mut tokio::sync::mpsc::UnboundedReceiver<RadioParam>,
    ) -> Vec<RadioParam> {
        let mut out = Vec::new();
        while let Ok(p) = rx.try_recv() {
            out.push(p);
        }
        out
    }

    #[test]
    fn grid_covers_25_distinct_cells() {
        let mut cells = Vec::new();
        for scan in 0..25i32 {
            let offset = scan_cell_offset(scan / 5 - 2, scan % 5 - 2, 40.0, 7.0);
            assert!(
                !cells.contains(&(offset.az.to_bits(), offset.el.to_bits())),
                "duplicate cell at index {}",
                scan
            );
            cells.push((offset.az.to_bits(), offset.el.to_bits()));
        }
        assert_eq!(cells.len(), 25);
        // Center cell is the object itself.
        assert_eq!(scan_cell_offset(0, 0, 40.0, 7.0), AzEl::ZERO);
    }

    #[test]
    fn azimuth_columns_widen_off_zenith() {
        let low = scan_cell_offset(0, 2, 10.0, 7.0);
        let high = scan_cell_offset(0, 2, 70.0, 7.0);
        assert!(high.az > low.az);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_bounds_object_leaves_tracking_unset() {
        let (daemon, _rx) = test_daemon();
        // Elevation limit in the test config is 85 degrees.
        daemon
            .objects
            .write()
            .unwrap()
            .insert("zenith".to_string(), AzEl::new(180.0, 89.0));
        point_at_object(&daemon, "zenith").await;
        assert!(daemon.pointing.tracked_object().is_none());
        assert_eq!(daemon.events.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn point_at_object_tracks_and_arrives() {
        let (daemon, _rx) = test_daemon();
        let follower = follow_commanded(&daemon);
        point_at_object(&daemon, "sun").await;
        follower.abort();
        assert_eq!(daemon.pointing.tracked_object().as_deref(), Some("sun"));
        assert!(daemon
            .pointing
            .observed()
            .within(AzEl::new(180.0, 45.0), ARRIVAL_TOLERANCE_DEG));
    }

    #[tokio::test(start_paused = true)]
    async fn n_point_scan_restores_zero_offset_and_tracking() {
        let (daemon, mut rx) = test_daemon();
        let follower = follow_commanded(&daemon);
        n_point_scan(&daemon, "sun").await;
        follower.abort();
        let p = daemon.pointing.snapshot();
        assert_eq!(p.offset, AzEl::ZERO);
        assert_eq!(p.tracked_object.as_deref(), Some("sun"));
        let soutracks: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|p| matches!(p, RadioParam::Soutrack(_)))
            .collect();
        assert_eq!(soutracks, vec![RadioParam::Soutrack("sun".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn beam_switch_emits_leg_labels_in_order() {
        let (daemon, mut rx) = test_daemon();
        let follower = follow_commanded(&daemon);
        beam_switch(&daemon, "sun").await;
        follower.abort();
        let labels: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|p| match p {
                RadioParam::BeamSwitch(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(labels, vec![1, 2, 3, 0]);
        assert_eq!(daemon.pointing.snapshot().offset, AzEl::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn azel_label_keeps_decimal_on_whole_degrees() {
        let (daemon, mut rx) = test_daemon();
        let follower = follow_commanded(&daemon);
        point_at_azel(&daemon, 180.0, 45.5).await;
        follower.abort();
        let labels: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|p| match p {
                RadioParam::Soutrack(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(labels, vec!["azel_180.0_45.5".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn offset_rejection_is_logged_and_keeps_destination() {
        let (daemon, _rx) = test_daemon();
        let follower = follow_commanded(&daemon);
        point_at_azel(&daemon, 350.0, 45.0).await;
        point_at_offset(&daemon, 20.0, 0.0).await;
        follower.abort();
        assert_eq!(daemon.pointing.snapshot().destination, AzEl::new(350.0, 45.0));
        assert_eq!(daemon.events.len(), 1);
    }

    #[test]
    fn arrival_tolerance_applies_per_axis() {
        let store = PointingStore::new(
            AzEl::new(0.0, 0.0),
            crate::pointing::Bounds {
                az: (0.0, 360.0),
                el: (0.0, 90.0),
            },
        );
        store.set_destination(AzEl::new(0.3, 0.3)).unwrap();
        assert!(store.arrived(ARRIVAL_TOLERANCE_DEG));
        store.set_destination(AzEl::new(0.3, 1.0)).unwrap();
        assert!(!store.arrived(ARRIVAL_TOLERANCE_DEG));
    }
}

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use crate::config::StationConfig;
use crate::daemon::Daemon;

const PUBLISH_INTERVAL: Duration = Duration::from_millis(500);

/// Complete monitoring view, recomputed fresh on every publish tick.
#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub beam_width: f64,
    pub location: StationConfig,
    pub motor_azel: (f64, f64),
    pub motor_cmd_azel: (f64, f64),
    pub object_locs: BTreeMap<String, (f64, f64)>,
    pub az_limits: (f64, f64),
    pub el_limits: (f64, f64),
    pub center_frequency: f64,
    pub bandwidth: f64,
    pub motor_offsets: (f64, f64),
    pub queued_item: String,
    pub queue_size: usize,
    pub emergency_contact: String,
    pub error_logs: Vec<(i64, String)>,
    pub temp_cal: f64,
    pub temp_sys: f64,
    pub cal_power: f64,
}

pub fn snapshot(daemon: &Daemon) -> StatusSnapshot {
    let pointing = daemon.pointing.snapshot();
    let settings = *daemon.settings.lock().unwrap();
    let object_locs = daemon
        .objects
        .read()
        .unwrap()
        .iter()
        .map(|(id, pos)| (id.clone(), pos.pair()))
        .collect();
    StatusSnapshot {
        beam_width: daemon.config.beamwidth,
        location: daemon.config.station.clone(),
        motor_azel: pointing.observed.pair(),
        motor_cmd_azel: pointing.commanded.pair(),
        object_locs,
        az_limits: (daemon.config.az_limits.lower, daemon.config.az_limits.upper),
        el_limits: (daemon.config.el_limits.lower, daemon.config.el_limits.upper),
        center_frequency: settings.center_frequency,
        bandwidth: settings.sample_frequency,
        motor_offsets: pointing.offset.pair(),
        queued_item: daemon.current_item.lock().unwrap().clone(),
        queue_size: daemon.queue_depth(),
        emergency_contact: daemon.config.emergency_contact.clone(),
        error_logs: daemon.events.entries_epoch(),
        temp_cal: daemon.config.tcal,
        temp_sys: daemon.config.tsys,
        cal_power: daemon.calibration.lock().unwrap().power,
    }
}

/// Status publisher loop: one JSON document per tick to every connected
/// subscriber. Publishing never blocks on a slow consumer; a subscriber that
/// falls behind just skips ticks.
pub async fn run(daemon: Arc<Daemon>, listener: TcpListener) {
    if let Ok(addr) = listener.local_addr() {
        log::info!("status publisher listening on {}", addr);
    }

    let (tx, _) = broadcast::channel::<String>(16);
    let accept_tx = tx.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    log::info!("status subscriber connected from {}", peer);
                    tokio::spawn(publish_to(stream, accept_tx.subscribe()));
                }
                Err(e) => log::warn!("status accept failed: {}", e),
            }
        }
    });

    loop {
        match serde_json::to_string(&snapshot(&daemon)) {
            // No subscribers is fine; send only fails when nobody listens.
            Ok(json) => {
                let _ = tx.send(json);
            }
            Err(e) => log::warn!("status serialization failed: {}", e),
        }
        tokio::time::sleep(PUBLISH_INTERVAL).await;
    }
}

async fn publish_to(mut stream: TcpStream, mut rx: broadcast::Receiver<String>) {
    loop {
        match rx.recv().await {
            Ok(mut line) => {
                line.push('\n');
                if stream.write_all(line.as_bytes()).await.is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::debug!("status subscriber lagged, skipped {} ticks", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::Config;
use crate::daemon::Daemon;
use crate::pointing::AzEl;

/// Capability surface of the astronomical-computation collaborator.
///
/// `update_all_az_el` may be expensive; callers pace it separately from
/// table reads.
pub trait EphemerisSource: Send + Sync {
    fn update_all_az_el(&self);
    fn get_all_azimuth_elevation(&self) -> BTreeMap<String, AzEl>;
}

/// Catalog-backed source: positions come straight from the configured object
/// table. The real sky math lives in the collaborator, not here.
pub struct Catalog {
    entries: Mutex<BTreeMap<String, AzEl>>,
}

impl Catalog {
    pub fn from_config(config: &Config) -> Self {
        let entries = config
            .objects
            .iter()
            .map(|o| (o.id.clone(), AzEl::new(o.azimuth, o.elevation)))
            .collect();
        Self {
            entries: Mutex::new(entries),
        }
    }
}

impl EphemerisSource for Catalog {
    fn update_all_az_el(&self) {
        // Static positions; nothing to recompute.
    }

    fn get_all_azimuth_elevation(&self) -> BTreeMap<String, AzEl> {
        self.entries.lock().unwrap().clone()
    }
}

const TABLE_POLL: Duration = Duration::from_secs(1);
const SOURCE_REFRESH: Duration = Duration::from_secs(10);

/// Ephemeris refresh loop: re-reads the object table at 1 Hz, asks the
/// collaborator to recompute at 0.1 Hz, and while tracking re-validates the
/// tracked object against the travel bounds every tick.
pub async fn run_refresh(daemon: Arc<Daemon>) {
    let mut last_refresh: Option<Instant> = None;
    loop {
        if last_refresh.is_none_or(|t| t.elapsed() >= SOURCE_REFRESH) {
            daemon.ephemeris.update_all_az_el();
            last_refresh = Some(Instant::now());
        }
        let table = daemon.ephemeris.get_all_azimuth_elevation();
        *daemon.objects.write().unwrap() = table.clone();

        if let Some(id) = daemon.pointing.tracked_object() {
            match table.get(&id) {
                Some(&destination) => {
                    if daemon.pointing.refresh_destination(destination).is_err() {
                        daemon
                            .events
                            .record(format!("object {} moved out of motor bounds", id));
                    }
                }
                None => {
                    daemon.pointing.clear_tracking();
                    daemon
                        .events
                        .record(format!("tracked object {} disappeared from ephemeris", id));
                }
            }
        }
        tokio::time::sleep(TABLE_POLL).await;
    }
}

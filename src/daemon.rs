use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use tokio::net::TcpListener;

use crate::command::{interpreter, CommandRecord};
use crate::config::Config;
use crate::ephemeris::{self, Catalog, EphemerisSource};
use crate::events::EventLog;
use crate::motor::{self, MotorDriver};
use crate::net;
use crate::pointing::{self, AzEl, PointingStore};
use crate::radio::recorder::{self, RadioProcess};
use crate::radio::{relay, CalibrationProfile, RadioParam, RadioSettings, Recorder, RpcClient};

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("cannot bind {0} port: {1}")]
    Bind(&'static str, std::io::Error),
}

/// Shared context handed to every control loop.
///
/// `pointing` is the only multi-writer resource; everything else is either
/// single-writer or a channel.
pub struct Daemon {
    pub config: Config,
    pub pointing: PointingStore,
    pub motor: Arc<dyn MotorDriver>,
    pub ephemeris: Arc<dyn EphemerisSource>,
    /// Cached object table, refreshed by the ephemeris loop.
    pub objects: RwLock<BTreeMap<String, AzEl>>,
    pub radio_tx: mpsc::UnboundedSender<RadioParam>,
    pub events: EventLog,
    pub settings: Mutex<RadioSettings>,
    pub calibration: Mutex<CalibrationProfile>,
    pub recorder: Mutex<Option<Recorder>>,
    /// Command currently being interpreted, for the status snapshot.
    pub current_item: Mutex<String>,
    /// Commands queued but not yet consumed.
    pub queue_depth: AtomicUsize,
}

impl Daemon {
    pub fn new(
        config: Config,
        motor: Arc<dyn MotorDriver>,
        ephemeris: Arc<dyn EphemerisSource>,
        radio_tx: mpsc::UnboundedSender<RadioParam>,
    ) -> Self {
        let calibration = CalibrationProfile::load_or_neutral(
            &config.calibration_path(),
            config.radio.num_bins,
            config.tsys,
            config.tcal,
        );
        let settings = RadioSettings {
            center_frequency: config.radio.center_frequency,
            sample_frequency: config.radio.sample_frequency,
        };
        let objects = ephemeris.get_all_azimuth_elevation();
        let pointing = PointingStore::new(config.stow_position(), config.bounds());
        Self {
            pointing,
            motor,
            ephemeris,
            objects: RwLock::new(objects),
            radio_tx,
            events: EventLog::new(),
            settings: Mutex::new(settings),
            calibration: Mutex::new(calibration),
            recorder: Mutex::new(None),
            current_item: Mutex::new("None".to_string()),
            queue_depth: AtomicUsize::new(0),
            config,
        }
    }

    pub fn object_position(&self, id: &str) -> Option<AzEl> {
        self.objects.read().unwrap().get(id).copied()
    }

    /// Fire-and-forget enqueue for the parameter relay.
    pub fn send_param(&self, param: RadioParam) {
        if self.radio_tx.send(param).is_err() {
            log::debug!("parameter relay gone, dropping update");
        }
    }

    pub fn start_recording(&self, name: Option<&str>) {
        let mut recorder = self.recorder.lock().unwrap();
        if recorder.is_some() {
            self.events.record("cannot start recording - already recording");
            return;
        }
        let (kind, name) = recorder::select_kind(name);
        let template = match kind {
            recorder::RecorderKind::Raw => &self.config.radio.save_raw_command,
            recorder::RecorderKind::Spectrum => &self.config.radio.save_spec_command,
        };
        let settings = *self.settings.lock().unwrap();
        match Recorder::spawn(
            kind,
            template,
            settings.sample_frequency,
            self.config.radio.num_bins,
            &self.config.save_directory,
            name.as_deref(),
        ) {
            Ok(task) => *recorder = Some(task),
            Err(e) => self.events.record(e.to_string()),
        }
    }

    pub fn stop_recording(&self) {
        if let Some(mut task) = self.recorder.lock().unwrap().take() {
            task.terminate();
        }
    }

    /// Sample-rate changes invalidate an in-progress raw capture.
    pub fn stop_raw_recorder(&self) {
        let mut recorder = self.recorder.lock().unwrap();
        if matches!(
            recorder.as_ref().map(|r| r.kind),
            Some(recorder::RecorderKind::Raw)
        ) {
            if let Some(mut task) = recorder.take() {
                task.terminate();
            }
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::SeqCst)
    }
}

/// Wires up all control loops and runs the command interpreter until `quit`.
pub async fn run(config: Config) -> Result<(), DaemonError> {
    let motor = motor::driver_for(&config);
    let ephemeris: Arc<dyn EphemerisSource> = Arc::new(Catalog::from_config(&config));
    let (radio_tx, radio_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<CommandRecord>();

    let daemon = Arc::new(Daemon::new(config, motor, ephemeris, radio_tx));
    let rpc = RpcClient::new(daemon.config.ports.rpc);

    // A daemon that cannot accept commands or publish status is useless, so
    // port binding is the one fail-fast step after config load.
    let command_listener = TcpListener::bind(("0.0.0.0", daemon.config.ports.command))
        .await
        .map_err(|e| DaemonError::Bind("command", e))?;
    let status_listener = TcpListener::bind(("0.0.0.0", daemon.config.ports.status))
        .await
        .map_err(|e| DaemonError::Bind("status", e))?;

    // Autostarted signal-processing chain, if configured.
    let mut radio_process = None;
    if daemon.config.radio.autostart {
        match RadioProcess::spawn(&daemon.config.radio.process_command) {
            Ok(process) => {
                radio_process = Some(process);
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Err(e) => daemon.events.record(e.to_string()),
        }
    }

    match rpc.missing_methods().await {
        Ok(missing) if missing.is_empty() => {
            log::info!("rpc endpoint exposes all known setters")
        }
        Ok(missing) => daemon
            .events
            .record(format!("rpc endpoint missing setters: {:?}", missing)),
        Err(e) => daemon
            .events
            .record(format!("rpc endpoint not reachable at startup: {}", e)),
    }

    push_initial_params(&daemon);

    tokio::spawn(net::intake::run(
        command_listener,
        cmd_tx,
        Arc::clone(&daemon),
    ));
    tokio::spawn(net::status::run(Arc::clone(&daemon), status_listener));
    tokio::spawn(motor::reconcile::run(Arc::clone(&daemon)));
    tokio::spawn(ephemeris::run_refresh(Arc::clone(&daemon)));
    tokio::spawn(relay::run(Arc::clone(&daemon), rpc, radio_rx));

    interpreter::run(Arc::clone(&daemon), cmd_rx).await;

    // Shutdown: restore stow, halt collaborators, then exit.
    log::info!("shutting down, returning to stow");
    pointing::ops::stow(&daemon).await;
    daemon.stop_recording();
    if let Some(mut process) = radio_process {
        process.terminate();
    }
    Ok(())
}

/// Initial parameter push so the signal chain starts from the configured
/// state, mirroring the settings handed out at every later change.
fn push_initial_params(daemon: &Daemon) {
    let settings = *daemon.settings.lock().unwrap();
    let calibration = daemon.calibration.lock().unwrap().clone();
    let observed = daemon.pointing.observed();
    let params = [
        ("frequency", RadioParam::Freq(settings.center_frequency)),
        ("sample rate", RadioParam::SampRate(settings.sample_frequency)),
        ("motor azimuth", RadioParam::MotorAz(observed.az)),
        ("motor elevation", RadioParam::MotorEl(observed.el)),
        ("object tracking", RadioParam::Soutrack("at_stow".to_string())),
        ("system temp", RadioParam::Tsys(daemon.config.tsys)),
        ("calibration temp", RadioParam::Tcal(daemon.config.tcal)),
        ("calibration power", RadioParam::CalPwr(calibration.power)),
        ("calibration values", RadioParam::CalValues(calibration.values)),
        ("is running", RadioParam::IsRunning(true)),
    ];
    for (name, param) in params {
        log::info!("setting {}", name);
        daemon.send_param(param);
    }
}

#[cfg(test)]
pub(crate) fn test_daemon() -> (Arc<Daemon>, mpsc::UnboundedReceiver<RadioParam>) {
    test_daemon_with(crate::config::test_config())
}

#[cfg(test)]
pub(crate) fn test_daemon_with(
    config: Config,
) -> (Arc<Daemon>, mpsc::UnboundedReceiver<RadioParam>) {
    let motor = motor::driver_for(&config);
    let ephemeris: Arc<dyn EphemerisSource> = Arc::new(Catalog::from_config(&config));
    let (radio_tx, radio_rx) = mpsc::unbounded_channel();
    (
        Arc::new(Daemon::new(config, motor, ephemeris, radio_tx)),
        radio_rx,
    )
}

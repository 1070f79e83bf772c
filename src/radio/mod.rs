pub mod calibration;
pub mod recorder;
pub mod relay;
pub mod rpc;

pub use calibration::CalibrationProfile;
pub use recorder::{Recorder, RecorderKind};
pub use rpc::RpcClient;

/// One outbound setting update for the signal-processing subsystem.
///
/// Each variant maps to exactly one remote `set_<name>` call; the mapping is
/// fixed at compile time and checked against the endpoint at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum RadioParam {
    Freq(f64),
    SampRate(f64),
    MotorAz(f64),
    MotorEl(f64),
    Soutrack(String),
    Tsys(f64),
    Tcal(f64),
    CalPwr(f64),
    CalValues(Vec<f64>),
    IsRunning(bool),
    BeamSwitch(u32),
}

impl RadioParam {
    pub fn method(&self) -> &'static str {
        match self {
            RadioParam::Freq(_) => "set_freq",
            RadioParam::SampRate(_) => "set_samp_rate",
            RadioParam::MotorAz(_) => "set_motor_az",
            RadioParam::MotorEl(_) => "set_motor_el",
            RadioParam::Soutrack(_) => "set_soutrack",
            RadioParam::Tsys(_) => "set_tsys",
            RadioParam::Tcal(_) => "set_tcal",
            RadioParam::CalPwr(_) => "set_cal_pwr",
            RadioParam::CalValues(_) => "set_cal_values",
            RadioParam::IsRunning(_) => "set_is_running",
            RadioParam::BeamSwitch(_) => "set_beam_switch",
        }
    }

    /// The full remote setter surface, for startup validation.
    pub const METHODS: [&'static str; 11] = [
        "set_freq",
        "set_samp_rate",
        "set_motor_az",
        "set_motor_el",
        "set_soutrack",
        "set_tsys",
        "set_tcal",
        "set_cal_pwr",
        "set_cal_values",
        "set_is_running",
        "set_beam_switch",
    ];
}

/// Live radio settings mutated by `freq`/`samp` commands and published in
/// the status snapshot.
#[derive(Debug, Clone, Copy)]
pub struct RadioSettings {
    pub center_frequency: f64,
    pub sample_frequency: f64,
}

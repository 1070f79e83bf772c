use std::path::Path;
use thiserror::Error;
use tokio::process::{Child, Command};

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("no command configured for {0}")]
    NotConfigured(&'static str),
    #[error("recorder spawn failed: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderKind {
    Raw,
    Spectrum,
}

impl RecorderKind {
    fn label(self) -> &'static str {
        match self {
            RecorderKind::Raw => "raw recording",
            RecorderKind::Spectrum => "spectrum recording",
        }
    }
}

/// Picks the recording path from the operator-supplied file name.
///
/// `.rad` names go to the spectral recorder, with `*.rad` meaning "spectral,
/// auto-named"; anything else (including no name) is a raw capture.
pub fn select_kind(name: Option<&str>) -> (RecorderKind, Option<String>) {
    match name {
        Some(n) if n.ends_with(".rad") => {
            let name = if n == "*.rad" { None } else { Some(n.to_string()) };
            (RecorderKind::Spectrum, name)
        }
        other => (RecorderKind::Raw, other.map(str::to_string)),
    }
}

/// Running recording collaborator. Lifecycle only; the daemon never looks at
/// what the process writes.
pub struct Recorder {
    pub kind: RecorderKind,
    child: Child,
}

impl Recorder {
    pub fn spawn(
        kind: RecorderKind,
        template: &[String],
        sample_frequency: f64,
        num_bins: usize,
        save_dir: &Path,
        name: Option<&str>,
    ) -> Result<Self, RecorderError> {
        if template.is_empty() {
            return Err(RecorderError::NotConfigured(kind.label()));
        }
        let argv: Vec<String> = template
            .iter()
            .map(|arg| {
                arg.replace("{rate}", &sample_frequency.to_string())
                    .replace("{bins}", &num_bins.to_string())
                    .replace("{dir}", &save_dir.to_string_lossy())
                    .replace("{name}", name.unwrap_or(""))
            })
            .collect();
        let child = Command::new(&argv[0])
            .args(&argv[1..])
            .kill_on_drop(true)
            .spawn()?;
        log::info!("started {:?} recorder: {:?}", kind, argv);
        Ok(Self { kind, child })
    }

    pub fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            log::warn!("failed to terminate recorder: {}", e);
        }
    }
}

/// Handle on the autostarted signal-processing chain itself.
pub struct RadioProcess {
    child: Child,
}

impl RadioProcess {
    pub fn spawn(template: &[String]) -> Result<Self, RecorderError> {
        if template.is_empty() {
            return Err(RecorderError::NotConfigured("radio process"));
        }
        let child = Command::new(&template[0])
            .args(&template[1..])
            .kill_on_drop(true)
            .spawn()?;
        log::info!("started radio process: {:?}", template);
        Ok(Self { child })
    }

    pub fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            log::warn!("failed to terminate radio process: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rad_suffix_selects_spectral_recorder() {
        assert_eq!(
            select_kind(Some("test.rad")),
            (RecorderKind::Spectrum, Some("test.rad".to_string()))
        );
    }

    #[test]
    fn wildcard_rad_is_spectral_and_unnamed() {
        assert_eq!(select_kind(Some("*.rad")), (RecorderKind::Spectrum, None));
    }

    #[test]
    fn other_names_select_raw_recorder() {
        assert_eq!(
            select_kind(Some("test.raw")),
            (RecorderKind::Raw, Some("test.raw".to_string()))
        );
        assert_eq!(select_kind(None), (RecorderKind::Raw, None));
    }
}

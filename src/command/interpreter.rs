use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::parser::{self, Command};
use super::CommandRecord;
use crate::daemon::Daemon;
use crate::pointing::ops;
use crate::radio::RadioParam;

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Command interpreter: consumes operator commands strictly in arrival order
/// and runs each to completion before looking at the next. A bad command is
/// logged and skipped; only `quit` ends the loop.
pub async fn run(daemon: Arc<Daemon>, mut rx: mpsc::UnboundedReceiver<CommandRecord>) {
    while let Some(record) = rx.recv().await {
        daemon.queue_depth.fetch_sub(1, Ordering::SeqCst);
        let text = record.text.trim().to_string();
        log::info!(
            "running command '{}' (received {})",
            text,
            record.timestamp.format("%H:%M:%S")
        );
        *daemon.current_item.lock().unwrap() = text.clone();

        let flow = {
            let objects = daemon.objects.read().unwrap().clone();
            match parser::parse(&text, &objects) {
                Ok(command) => dispatch(&daemon, command).await,
                Err(e) => {
                    daemon.events.record(e.to_string());
                    Flow::Continue
                }
            }
        };

        *daemon.current_item.lock().unwrap() = "None".to_string();
        if flow == Flow::Quit {
            break;
        }
    }
}

async fn dispatch(daemon: &Daemon, command: Command) -> Flow {
    match command {
        Command::Nop => {}
        Command::Track(id) => ops::point_at_object(daemon, &id).await,
        Command::NPointScan(id) => ops::n_point_scan(daemon, &id).await,
        Command::BeamSwitch(id) => ops::beam_switch(daemon, &id).await,
        Command::Stow => ops::stow(daemon).await,
        Command::CalPosition => {
            let cal = daemon.config.cal_position();
            ops::point_at_azel(daemon, cal.az, cal.el).await;
        }
        Command::Calibrate => ops::calibrate(daemon).await,
        Command::Quit => {
            daemon.send_param(RadioParam::IsRunning(false));
            return Flow::Quit;
        }
        Command::Record(name) => daemon.start_recording(name.as_deref()),
        Command::RecordOff => daemon.stop_recording(),
        Command::Freq(hz) => {
            daemon.settings.lock().unwrap().center_frequency = hz;
            daemon.send_param(RadioParam::Freq(hz));
        }
        Command::SampRate(hz) => {
            daemon.stop_raw_recorder();
            daemon.settings.lock().unwrap().sample_frequency = hz;
            daemon.send_param(RadioParam::SampRate(hz));
        }
        Command::AzEl(az, el) => ops::point_at_azel(daemon, az, el).await,
        Command::Offset(az, el) => ops::point_at_offset(daemon, az, el).await,
        Command::Wait(seconds) => {
            // Operator input; infinities and absurd magnitudes must not be
            // able to take the interpreter down.
            match Duration::try_from_secs_f64(seconds.max(0.0)) {
                Ok(dur) => tokio::time::sleep(dur).await,
                Err(_) => daemon
                    .events
                    .record(format!("cannot wait {} seconds", seconds)),
            }
        }
        Command::WaitUntilTimeOfDay(target) => {
            let dur = parser::duration_until_time_of_day(target, chrono::Utc::now());
            tokio::time::sleep(dur).await;
        }
        Command::WaitUntil(target) => {
            let dur = parser::duration_until(target, chrono::Utc::now());
            tokio::time::sleep(dur).await;
        }
    }
    Flow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::test_daemon;

    fn drain(rx: &mut mpsc::UnboundedReceiver<RadioParam>) -> Vec<RadioParam> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn freq_updates_settings_and_enqueues() {
        let (daemon, mut rx) = test_daemon();
        let flow = dispatch(&daemon, Command::Freq(1_420_000_000.0)).await;
        assert_eq!(flow, Flow::Continue);
        assert_eq!(
            daemon.settings.lock().unwrap().center_frequency,
            1_420_000_000.0
        );
        assert_eq!(drain(&mut rx), vec![RadioParam::Freq(1_420_000_000.0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn quit_enqueues_stop_and_breaks() {
        let (daemon, mut rx) = test_daemon();
        let flow = dispatch(&daemon, Command::Quit).await;
        assert_eq!(flow, Flow::Quit);
        assert_eq!(drain(&mut rx), vec![RadioParam::IsRunning(false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_command_is_logged_and_loop_continues() {
        let (daemon, _rx) = test_daemon();
        let (tx, rx) = mpsc::unbounded_channel();
        daemon.queue_depth.fetch_add(3, Ordering::SeqCst);
        tx.send(CommandRecord::now("freq notanumber".into())).unwrap();
        tx.send(CommandRecord::now("frobnicate".into())).unwrap();
        tx.send(CommandRecord::now("quit".into())).unwrap();
        drop(tx);

        run(Arc::clone(&daemon), rx).await;
        assert_eq!(daemon.events.len(), 2);
        assert_eq!(daemon.queue_depth(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_wait_is_rejected_not_fatal() {
        let (daemon, _rx) = test_daemon();
        let (tx, rx) = mpsc::unbounded_channel();
        daemon.queue_depth.fetch_add(3, Ordering::SeqCst);
        tx.send(CommandRecord::now("wait 1e300".into())).unwrap();
        tx.send(CommandRecord::now("inf".into())).unwrap();
        tx.send(CommandRecord::now("quit".into())).unwrap();
        drop(tx);

        run(Arc::clone(&daemon), rx).await;
        assert_eq!(daemon.events.len(), 2);
        assert_eq!(daemon.queue_depth(), 0);
    }
}

use chrono::{DateTime, Days, NaiveDateTime, NaiveTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::pointing::AzEl;

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("missing argument for '{0}'")]
    MissingArgument(&'static str),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("invalid time '{0}'")]
    InvalidTime(String),
    #[error("command not identified '{0}'")]
    Unrecognized(String),
}

/// A fully parsed operator command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Blank or comment line.
    Nop,
    Track(String),
    NPointScan(String),
    BeamSwitch(String),
    Stow,
    /// Point at the configured calibration position.
    CalPosition,
    Calibrate,
    Quit,
    Record(Option<String>),
    RecordOff,
    /// Center frequency in Hz (operator speaks MHz).
    Freq(f64),
    /// Sample rate in Hz (operator speaks MHz).
    SampRate(f64),
    AzEl(f64, f64),
    Offset(f64, f64),
    /// Sleep for this many seconds.
    Wait(f64),
    /// Sleep until the next UTC occurrence of this time of day.
    WaitUntilTimeOfDay(NaiveTime),
    /// Sleep until this absolute UTC timestamp.
    WaitUntil(NaiveDateTime),
}

/// Parses one command line against the current object table. Keyword
/// matching is case-insensitive; object names are matched verbatim.
pub fn parse(line: &str, objects: &BTreeMap<String, AzEl>) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.len() < 2 || line.starts_with('*') {
        return Ok(Command::Nop);
    }
    let line = line.strip_prefix(':').map(str::trim).unwrap_or(line);
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(&first) = parts.first() else {
        return Ok(Command::Nop);
    };

    if objects.contains_key(first) {
        return Ok(match parts.last() {
            Some(&"n") => Command::NPointScan(first.to_string()),
            Some(&"b") => Command::BeamSwitch(first.to_string()),
            _ => Command::Track(first.to_string()),
        });
    }

    let keyword = first.to_ascii_lowercase();
    match keyword.as_str() {
        "stow" => Ok(Command::Stow),
        "cal" => Ok(Command::CalPosition),
        "calibrate" => Ok(Command::Calibrate),
        "quit" => Ok(Command::Quit),
        "record" => Ok(Command::Record(parts.get(1).map(|s| s.to_string()))),
        "roff" => Ok(Command::RecordOff),
        "freq" => Ok(Command::Freq(number(&parts, 1, "freq")? * 1e6)),
        "samp" => Ok(Command::SampRate(number(&parts, 1, "samp")? * 1e6)),
        "azel" => Ok(Command::AzEl(
            number(&parts, 1, "azel")?,
            number(&parts, 2, "azel")?,
        )),
        "offset" => Ok(Command::Offset(
            number(&parts, 1, "offset")?,
            number(&parts, 2, "offset")?,
        )),
        "wait" => Ok(Command::Wait(number(&parts, 1, "wait")?)),
        "lst" => {
            let arg = parts
                .get(1)
                .ok_or(CommandError::MissingArgument("lst"))?;
            Ok(Command::WaitUntilTimeOfDay(time_of_day(arg)?))
        }
        _ => {
            if let Ok(seconds) = keyword.parse::<f64>() {
                return Ok(Command::Wait(seconds));
            }
            if let Some(rest) = keyword.strip_prefix("lst:") {
                return Ok(Command::WaitUntilTimeOfDay(time_of_day(rest)?));
            }
            if keyword.split(':').count() == 5 {
                // <Year>:<DayOfYear>:<H>:<M>:<S>
                return NaiveDateTime::parse_from_str(&keyword, "%Y:%j:%H:%M:%S")
                    .map(Command::WaitUntil)
                    .map_err(|_| CommandError::InvalidTime(keyword.clone()));
            }
            Err(CommandError::Unrecognized(line.to_string()))
        }
    }
}

fn number(parts: &[&str], index: usize, keyword: &'static str) -> Result<f64, CommandError> {
    let raw = parts
        .get(index)
        .ok_or(CommandError::MissingArgument(keyword))?;
    raw.parse()
        .map_err(|_| CommandError::InvalidNumber((*raw).to_string()))
}

fn time_of_day(s: &str) -> Result<NaiveTime, CommandError> {
    NaiveTime::parse_from_str(s, "%H:%M:%S").map_err(|_| CommandError::InvalidTime(s.to_string()))
}

/// Sleep length until the next future occurrence of `target` on the UTC wall
/// clock. Rolls to the next calendar day when the time has already passed.
pub fn duration_until_time_of_day(target: NaiveTime, now: DateTime<Utc>) -> Duration {
    let mut candidate = now.date_naive().and_time(target).and_utc();
    while candidate <= now {
        candidate = candidate + Days::new(1);
    }
    (candidate - now).to_std().unwrap_or(Duration::ZERO)
}

/// Sleep length until an absolute UTC timestamp; zero when already past.
pub fn duration_until(target: NaiveDateTime, now: DateTime<Utc>) -> Duration {
    (target.and_utc() - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn objects() -> BTreeMap<String, AzEl> {
        let mut map = BTreeMap::new();
        map.insert("sun".to_string(), AzEl::new(180.0, 45.0));
        map.insert("crab".to_string(), AzEl::new(120.0, 30.0));
        map
    }

    #[test]
    fn comments_and_blanks_are_nops() {
        assert_eq!(parse("", &objects()).unwrap(), Command::Nop);
        assert_eq!(parse("* a comment", &objects()).unwrap(), Command::Nop);
        assert_eq!(parse("x", &objects()).unwrap(), Command::Nop);
    }

    #[test]
    fn leading_colon_is_stripped() {
        assert_eq!(parse(": stow", &objects()).unwrap(), Command::Stow);
    }

    #[test]
    fn object_suffix_selects_scan_kind() {
        assert_eq!(
            parse("sun", &objects()).unwrap(),
            Command::Track("sun".to_string())
        );
        assert_eq!(
            parse("sun n", &objects()).unwrap(),
            Command::NPointScan("sun".to_string())
        );
        assert_eq!(
            parse("crab b", &objects()).unwrap(),
            Command::BeamSwitch("crab".to_string())
        );
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(parse("STOW", &objects()).unwrap(), Command::Stow);
        assert_eq!(parse("Roff", &objects()).unwrap(), Command::RecordOff);
    }

    #[test]
    fn freq_converts_mhz_to_hz() {
        assert_eq!(
            parse("freq 1420.0", &objects()).unwrap(),
            Command::Freq(1_420_000_000.0)
        );
    }

    #[test]
    fn samp_converts_mhz_to_hz() {
        assert_eq!(
            parse("samp 2.4", &objects()).unwrap(),
            Command::SampRate(2_400_000.0)
        );
    }

    #[test]
    fn azel_and_offset_take_two_numbers() {
        assert_eq!(
            parse("azel 180.0 45.0", &objects()).unwrap(),
            Command::AzEl(180.0, 45.0)
        );
        assert_eq!(
            parse("offset -1.5 0.5", &objects()).unwrap(),
            Command::Offset(-1.5, 0.5)
        );
        assert_eq!(
            parse("azel 180.0", &objects()).unwrap_err(),
            CommandError::MissingArgument("azel")
        );
        assert_eq!(
            parse("freq x", &objects()).unwrap_err(),
            CommandError::InvalidNumber("x".to_string())
        );
    }

    #[test]
    fn record_name_is_optional() {
        assert_eq!(
            parse("record", &objects()).unwrap(),
            Command::Record(None)
        );
        assert_eq!(
            parse("record test.rad", &objects()).unwrap(),
            Command::Record(Some("test.rad".to_string()))
        );
    }

    #[test]
    fn bare_number_and_wait_sleep() {
        assert_eq!(parse("30", &objects()).unwrap(), Command::Wait(30.0));
        assert_eq!(parse("wait 5", &objects()).unwrap(), Command::Wait(5.0));
    }

    #[test]
    fn lst_parses_both_spellings() {
        let t = NaiveTime::from_hms_opt(21, 30, 0).unwrap();
        assert_eq!(
            parse("lst 21:30:00", &objects()).unwrap(),
            Command::WaitUntilTimeOfDay(t)
        );
        assert_eq!(
            parse("LST:21:30:00", &objects()).unwrap(),
            Command::WaitUntilTimeOfDay(t)
        );
    }

    #[test]
    fn five_colon_token_is_absolute() {
        let cmd = parse("2026:040:12:30:00", &objects()).unwrap();
        let Command::WaitUntil(dt) = cmd else {
            panic!("expected absolute wait, got {:?}", cmd);
        };
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2026-02-09 12:30:00");
    }

    #[test]
    fn garbage_is_unrecognized() {
        assert!(matches!(
            parse("frobnicate 1 2", &objects()),
            Err(CommandError::Unrecognized(_))
        ));
    }

    #[test]
    fn lst_rolls_to_next_day() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 23, 59, 59).unwrap();
        let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        let dur = duration_until_time_of_day(midnight, now);
        assert_eq!(dur, Duration::from_secs(1));

        // Already-future time today does not roll.
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 10, 0, 0).unwrap();
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        assert_eq!(
            duration_until_time_of_day(noon, now),
            Duration::from_secs(2 * 3600)
        );
    }

    #[test]
    fn past_absolute_timestamp_sleeps_zero() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap();
        let past = NaiveDateTime::parse_from_str("2026:001:00:00:00", "%Y:%j:%H:%M:%S").unwrap();
        assert_eq!(duration_until(past, now), Duration::ZERO);
    }
}

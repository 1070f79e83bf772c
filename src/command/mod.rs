pub mod interpreter;
pub mod parser;

pub use parser::{Command, CommandError};

use chrono::{DateTime, Utc};

/// One raw operator command as received by the network intake.
#[derive(Debug, Clone)]
pub struct CommandRecord {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

impl CommandRecord {
    pub fn now(text: String) -> Self {
        Self {
            timestamp: Utc::now(),
            text,
        }
    }
}

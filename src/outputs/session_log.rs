use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::MeetingEvent;

const TIMESTAMP_FORMAT: &str = "%m/%d %-H:%M:%S";

/// Append-only text log with one line per started or ended meeting
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, event: &MeetingEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open session log {}", self.path.display()))?;

        writeln!(file, "{}", format_entry(event))
            .with_context(|| format!("Failed to write session log {}", self.path.display()))?;
        Ok(())
    }
}

/// `MM/dd H:mm:ss: Started - <ip> <platform>`, with `Ended` padded to the same width
pub fn format_entry(event: &MeetingEvent) -> String {
    let label = if event.is_started() { "Started" } else { "Ended" };
    format!(
        "{}: {:<7} - {} {}",
        event.at().format(TIMESTAMP_FORMAT),
        label,
        event.remote(),
        event.platform()
    )
}

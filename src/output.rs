use std::cell::RefCell;
use std::io::{self, Write};

use serde::Serialize;

use crate::app::{
    FetchResult, ListResult, MappingResult, OutputDirResult, ProgressEvent, ProgressSink, Severity,
};

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(result: &FetchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_mapping(result: &MappingResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_list(result: &ListResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_output_dir(result: &OutputDirResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Forwards progress to the `tracing` subscriber.
#[derive(Default)]
pub struct TracingSink {
    // Label and step of the last transfer line logged.
    last_transfer: RefCell<Option<(String, u64)>>,
}

// Report transfers roughly every 64 MiB so large assemblies do not flood the log.
const TRANSFER_LOG_STEP: u64 = 64 * 1_048_576;

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn should_log_transfer(&self, label: &str, written: u64, total: Option<u64>) -> bool {
        let step = written / TRANSFER_LOG_STEP;
        let mut last = self.last_transfer.borrow_mut();
        let advanced = match last.as_ref() {
            Some((last_label, last_step)) => last_label != label || *last_step != step,
            None => true,
        };
        if advanced {
            *last = Some((label.to_string(), step));
        }
        advanced || total.is_some_and(|total| written >= total)
    }
}

impl ProgressSink for TracingSink {
    fn event(&self, event: ProgressEvent) {
        let elapsed_ms = event.elapsed.map(|elapsed| elapsed.as_millis() as u64);
        match event.severity {
            Severity::Info => tracing::info!(elapsed_ms, "{}", event.message),
            Severity::Warning => tracing::warn!(elapsed_ms, "{}", event.message),
            Severity::Error => tracing::error!(elapsed_ms, "{}", event.message),
        }
    }

    fn transfer(&self, label: &str, written: u64, total: Option<u64>) {
        if self.should_log_transfer(label, written, total) {
            tracing::debug!(written, total, "downloading {label}");
        }
    }
}

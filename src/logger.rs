use crate::cli::{OutputConfig, OutputFormat};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::path::Path;

#[derive(Clone)]
pub struct Logger {
    config: OutputConfig,
}

#[derive(Serialize)]
struct JsonEvent {
    #[serde(rename = "type")]
    event_type: String,
    timestamp: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

impl Logger {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Warnings and errors only; keeps test output short.
    #[cfg(test)]
    pub fn quiet() -> Self {
        Self::new(OutputConfig {
            quiet: true,
            verbose: false,
            output_format: OutputFormat::Text,
        })
    }

    pub fn info(&self, message: &str) {
        self.output("info", message, None);
    }

    pub fn progress(&self, message: &str) {
        self.output("progress", message, None);
    }

    pub fn success(&self, message: &str) {
        self.output("success", message, None);
    }

    pub fn warn(&self, message: &str) {
        self.output("warn", message, None);
    }

    pub fn error(&self, message: &str) {
        self.output("error", message, None);
    }

    pub fn debug(&self, message: &str) {
        self.output("debug", message, None);
    }

    pub fn phase_start(&self, phase: &str) {
        let data = serde_json::json!({ "phase": phase });
        self.output("phase_start", &format!("{}...", phase), Some(data));
    }

    pub fn phase_complete(&self, phase: &str, elapsed_ms: u128) {
        let data = serde_json::json!({ "phase": phase, "elapsed_ms": elapsed_ms });
        self.output(
            "phase_complete",
            &format!("{} finished in {} ms", phase, elapsed_ms),
            Some(data),
        );
    }

    pub fn album_found(&self, album: &str, file_count: usize) {
        let data = serde_json::json!({ "album": album, "files": file_count });
        self.output(
            "album_found",
            &format!("Album '{}' has {} files", album, file_count),
            Some(data),
        );
    }

    pub fn file_copied(&self, file: &str, dest: &Path) {
        let data = serde_json::json!({ "file": file, "dest": dest.display().to_string() });
        self.output(
            "file_copied",
            &format!("Copied {} to {}", file, dest.display()),
            Some(data),
        );
    }

    pub fn file_removed(&self, file: &str, dir: &Path) {
        let data = serde_json::json!({ "file": file, "dir": dir.display().to_string() });
        self.output(
            "file_removed",
            &format!("Removed {} from {}", file, dir.display()),
            Some(data),
        );
    }

    pub fn file_missing(&self, file: &str, dir: &Path) {
        let data = serde_json::json!({ "file": file, "dir": dir.display().to_string() });
        self.output(
            "file_missing",
            &format!("{} not found in {}", file, dir.display()),
            Some(data),
        );
    }

    pub fn run_complete(&self, summary: serde_json::Value) {
        self.output("run_complete", "Migration finished.", Some(summary));
    }

    fn output(&self, event_type: &str, message: &str, data: Option<serde_json::Value>) {
        if let Some(line) = self.render(event_type, message, data) {
            println!("{}", line);
        }
    }

    /// Format one event, or `None` when the configured verbosity hides it.
    fn render(&self, event_type: &str, message: &str, data: Option<serde_json::Value>) -> Option<String> {
        match event_type {
            "warn" | "error" => {}
            "debug" | "phase_complete" => {
                if !self.config.verbose {
                    return None;
                }
            }
            _ => {
                if self.config.quiet {
                    return None;
                }
            }
        }

        match self.config.output_format {
            OutputFormat::Json => {
                let event = JsonEvent {
                    event_type: event_type.to_string(),
                    timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                    message: message.to_string(),
                    data,
                };
                serde_json::to_string(&event).ok()
            }
            OutputFormat::Text => {
                let prefix = match event_type {
                    "error" => "[ERROR]",
                    "warn" => "[WARN]",
                    "debug" | "phase_complete" => "[DEBUG]",
                    "progress" | "phase_start" => "[...]",
                    "success" | "file_copied" | "file_removed" | "run_complete" => "[OK]",
                    "file_missing" => "[SKIP]",
                    _ => "[INFO]",
                };
                Some(format!("{} {}", prefix, message))
            }
        }
    }
}

pub mod check;
pub mod collect;
pub mod gallery;
pub mod latex;
pub mod rename;
pub mod select;
pub mod status;
pub mod watch;

use crate::bib::warn::{self, WarnEvent};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }
}

/// Malformed asset names are skipped, not fatal: a warn line plus a detail.
pub fn note_malformed_asset(report: &mut CommandReport, stage: &str, category: &str, name: &str) {
    warn::emit(WarnEvent {
        code: "MALFORMED_ASSET",
        stage,
        category,
        target: name,
        reason: "expected `<code> <title>.<ext>`",
        err: "",
    });
    report.detail(format!("skipped malformed asset name in {category}: {name}"));
}

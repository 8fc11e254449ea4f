//! Colored terminal rendering for sync operations.

use owo_colors::OwoColorize;
use routine_core::{DiffKind, OperationKind, SyncReport};

pub trait Render {
    fn render(&self) -> String;
}

fn colorize_diff(kind: DiffKind, text: &str) -> String {
    match kind {
        DiffKind::Create => text.green().to_string(),
        DiffKind::Update => text.yellow().to_string(),
        DiffKind::Delete => text.red().to_string(),
    }
}

impl Render for DiffKind {
    fn render(&self) -> String {
        colorize_diff(*self, &self.to_string())
    }
}

impl Render for OperationKind {
    fn render(&self) -> String {
        colorize_diff(self.diff_kind(), &self.to_string())
    }
}

impl Render for SyncReport {
    fn render(&self) -> String {
        if self.is_clean() {
            self.to_string()
        } else {
            self.to_string().red().to_string()
        }
    }
}

//! The three kinds of change a sync can make to a remote calendar.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Create,
    Update,
    Delete,
}

impl DiffKind {
    /// Plural noun for log lines and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            DiffKind::Create => "creates",
            DiffKind::Update => "updates",
            DiffKind::Delete => "deletes",
        }
    }
}

/// `+`, `~` or `-`
impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            DiffKind::Create => '+',
            DiffKind::Update => '~',
            DiffKind::Delete => '-',
        };
        write!(f, "{symbol}")
    }
}

//! Application state composition.
//!
//! ```text
//! AppState
//! ├── registry: FileRegistry       (datasets + selection)
//! ├── chat: ChatOrchestrator       (transcript + request lifecycle)
//! ├── tasks: Tasks                 (task lifecycle state)
//! ├── task_seq: TaskSeq            (async task id generator)
//! ├── pending_selection            (id returned by the last successful add)
//! ├── last_outcome                 (how the most recent question settled)
//! └── notice: Option<Notice>       (dismissible user-facing message)
//! ```
//!
//! Only the reducer in [`crate::update`] mutates this state.

use crate::chat::{ChatOrchestrator, ChatOutcome};
use crate::registry::FileRegistry;
use crate::tasks::{TaskSeq, Tasks};

/// Shown when the file list cannot be fetched.
pub const LOAD_FILES_FAILED: &str = "Failed to load files.";
/// Prefix of the notice shown when an add fails.
pub const ADD_FILE_FAILED: &str = "Failed to add file";
/// Shown when a delete fails.
pub const DELETE_FILE_FAILED: &str = "Failed to delete file.";
/// Confirmation question asked before deleting a file.
pub const REMOVE_CONFIRM_PROMPT: &str = "Are you sure you want to delete this file?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A dismissible message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct AppState {
    pub registry: FileRegistry,
    pub chat: ChatOrchestrator,
    pub tasks: Tasks,
    pub task_seq: TaskSeq,
    /// Selected once the list containing it has been fetched.
    pub pending_selection: Option<String>,
    /// `None` while a question is in flight or after it was cancelled.
    pub last_outcome: Option<ChatOutcome>,
    pub notice: Option<Notice>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while any backend call or the progress ticker is running.
    pub fn is_busy(&self) -> bool {
        self.tasks.is_any_running()
    }
}

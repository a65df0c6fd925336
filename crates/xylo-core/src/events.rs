//! Events consumed by the reducer.
//!
//! `Command`s come from the user. Everything else is a completion sent back
//! by a task the runtime spawned.

use crate::api::{AddSource, AddedFile, ApiResult, ChatReply, FileItem};
use crate::tasks::TaskId;

/// User intents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    RefreshFiles,
    AddFile(AddSource),
    RemoveFile { id: String },
    SelectFile { id: String },
    Send { query: String },
    CancelChat,
    DismissNotice,
}

/// Why a file list was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListPurpose {
    Refresh,
    AfterAdd { file_id: String },
    AfterRemove { file_id: String },
}

#[derive(Debug)]
pub enum AppEvent {
    Command(Command),

    /// Progress ticker fired.
    ProgressTick { task: TaskId },

    FilesLoaded {
        task: TaskId,
        purpose: ListPurpose,
        result: ApiResult<Vec<FileItem>>,
    },

    FileAdded {
        task: TaskId,
        result: ApiResult<AddedFile>,
    },

    /// Answer to a removal confirmation.
    RemovalConfirmed { id: String, confirmed: bool },

    FileDeleted {
        task: TaskId,
        id: String,
        result: ApiResult<()>,
    },

    ChatCompleted {
        task: TaskId,
        result: ApiResult<ChatReply>,
    },
}

impl From<Command> for AppEvent {
    fn from(command: Command) -> Self {
        AppEvent::Command(command)
    }
}

impl AppEvent {
    /// True for events that settle a spawned backend call.
    pub fn is_completion(&self) -> bool {
        matches!(
            self,
            AppEvent::FilesLoaded { .. }
                | AppEvent::FileAdded { .. }
                | AppEvent::FileDeleted { .. }
                | AppEvent::ChatCompleted { .. }
        )
    }
}

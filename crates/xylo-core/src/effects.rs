//! Effect types.
//!
//! Effects are commands returned by the reducer that the runtime executes.
//! They represent I/O, confirmation prompts and task spawning only.
//!
//! Cancellation is decided by the reducer via `Effect::CancelTask`; the
//! runtime just calls `cancel()` on the provided token.

use tokio_util::sync::CancellationToken;

use crate::api::AddSource;
use crate::events::ListPurpose;
use crate::tasks::{TaskId, TaskKind};

#[derive(Debug)]
pub enum Effect {
    /// `GET /files`.
    FetchFiles { task: TaskId, purpose: ListPurpose },

    /// Upload or link a dataset.
    AddFile { task: TaskId, source: AddSource },

    /// Ask the user before deleting.
    ConfirmRemoval { id: String, filename: String },

    /// `DELETE /files/{id}`.
    DeleteFile { task: TaskId, id: String },

    /// `POST /chat`, abandoned when `cancel` fires.
    SendChat {
        task: TaskId,
        query: String,
        file_id: String,
        cancel: CancellationToken,
    },

    /// Emit `ProgressTick` on an interval until `cancel` fires.
    StartProgressTicker {
        task: TaskId,
        cancel: CancellationToken,
    },

    CancelTask {
        kind: TaskKind,
        token: CancellationToken,
    },
}

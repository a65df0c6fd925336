//! Effect handlers.
//!
//! Handlers are pure async functions that perform one backend call and return
//! the `AppEvent` describing its result. They never touch `AppState`; the
//! runtime spawns them and forwards the event to its inbox.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::inbox::EventSender;
use crate::api::{AddSource, ApiClient, ApiError};
use crate::events::{AppEvent, ListPurpose};
use crate::tasks::TaskId;

/// Fetches the file list.
pub async fn fetch_files(client: Arc<ApiClient>, task: TaskId, purpose: ListPurpose) -> AppEvent {
    let result = client.list_files().await;
    AppEvent::FilesLoaded {
        task,
        purpose,
        result,
    }
}

/// Uploads or links a dataset.
pub async fn add_file(client: Arc<ApiClient>, task: TaskId, source: AddSource) -> AppEvent {
    let result = client.add(&source).await;
    AppEvent::FileAdded { task, result }
}

/// Deletes a dataset.
pub async fn delete_file(client: Arc<ApiClient>, task: TaskId, id: String) -> AppEvent {
    let result = client.delete_file(&id).await;
    AppEvent::FileDeleted { task, id, result }
}

/// Asks a question. Resolves early with a `Cancelled` error when `cancel` fires.
pub async fn send_chat(
    client: Arc<ApiClient>,
    task: TaskId,
    query: String,
    file_id: String,
    cancel: CancellationToken,
) -> AppEvent {
    let result = tokio::select! {
        () = cancel.cancelled() => Err(ApiError::cancelled()),
        result = client.chat(&query, &file_id) => result,
    };
    AppEvent::ChatCompleted { task, result }
}

/// Emits `ProgressTick` every `interval` until `cancel` fires.
///
/// The first tick is emitted one full interval after start.
pub async fn progress_ticker(
    tx: EventSender,
    task: TaskId,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if tx.send(AppEvent::ProgressTick { task }).is_err() {
                    break;
                }
            }
        }
    }
    tracing::debug!(?task, "progress ticker stopped");
}

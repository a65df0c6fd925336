//! Reducer (update function).
//!
//! All state mutations happen here. The runtime calls `update(state, event)`
//! and executes the returned effects. Nothing in this module performs I/O.

use crate::api::{AddedFile, ApiResult, FileItem};
use crate::chat::ChatOutcome;
use crate::effects::Effect;
use crate::events::{AppEvent, Command, ListPurpose};
use crate::state::{
    ADD_FILE_FAILED, AppState, DELETE_FILE_FAILED, LOAD_FILES_FAILED, Notice,
};
use crate::tasks::{TaskId, TaskKind};

/// The main reducer function.
pub fn update(state: &mut AppState, event: AppEvent) -> Vec<Effect> {
    match event {
        AppEvent::Command(command) => handle_command(state, command),
        AppEvent::ProgressTick { task } => {
            if state.tasks.progress.active == Some(task) {
                state.chat.tick();
            }
            vec![]
        }
        AppEvent::FilesLoaded {
            task,
            purpose,
            result,
        } => handle_files_loaded(state, task, purpose, result),
        AppEvent::FileAdded { task, result } => handle_file_added(state, task, result),
        AppEvent::RemovalConfirmed { id, confirmed } => {
            if !confirmed {
                tracing::debug!(file_id = %id, "removal declined");
                return vec![];
            }
            let task = state.task_seq.next_id();
            state.tasks.file_remove.begin(task);
            vec![Effect::DeleteFile { task, id }]
        }
        AppEvent::FileDeleted { task, id, result } => {
            if !state.tasks.file_remove.finish_if_active(task) {
                return vec![];
            }
            match result {
                Ok(()) => fetch_files(state, ListPurpose::AfterRemove { file_id: id }),
                Err(error) => {
                    tracing::warn!(file_id = %id, error = %error, "delete failed");
                    state.notice = Some(Notice::error(DELETE_FILE_FAILED));
                    vec![]
                }
            }
        }
        AppEvent::ChatCompleted { task, result } => {
            let Some(outcome) = state.chat.complete(task, result) else {
                return vec![];
            };
            state.tasks.chat.clear();
            if let ChatOutcome::Success { widgets } = &outcome {
                tracing::debug!(widgets, "chat settled");
            }
            state.last_outcome = Some(outcome);
            stop_progress(state).into_iter().collect()
        }
    }
}

fn handle_command(state: &mut AppState, command: Command) -> Vec<Effect> {
    match command {
        Command::RefreshFiles => fetch_files(state, ListPurpose::Refresh),
        Command::AddFile(source) => {
            if state.tasks.file_add.is_running() {
                tracing::debug!("add ignored: another add is in progress");
                return vec![];
            }
            let task = state.task_seq.next_id();
            state.tasks.file_add.begin(task);
            vec![Effect::AddFile { task, source }]
        }
        Command::RemoveFile { id } => {
            if state.tasks.file_remove.is_running() {
                tracing::debug!("remove ignored: another delete is in progress");
                return vec![];
            }
            let Some(file) = state.registry.get(&id) else {
                tracing::debug!(file_id = %id, "remove ignored: unknown file");
                return vec![];
            };
            let filename = file.filename.clone();
            vec![Effect::ConfirmRemoval { id, filename }]
        }
        Command::SelectFile { id } => {
            if state.registry.select(&id) {
                // An explicit choice outranks a selection still waiting on a list load.
                state.pending_selection = None;
            } else {
                tracing::debug!(file_id = %id, "select ignored: unknown file");
            }
            vec![]
        }
        Command::Send { query } => {
            let task = state.task_seq.next_id();
            let selected = state.registry.selected_id().map(str::to_string);
            let Some(request) = state.chat.begin_send(&query, selected.as_deref(), task) else {
                return vec![];
            };
            let cancel = state.tasks.chat.begin_cancelable(task);
            state.last_outcome = None;

            let mut effects = stop_progress(state).into_iter().collect::<Vec<_>>();
            let ticker = state.task_seq.next_id();
            let ticker_cancel = state.tasks.progress.begin_cancelable(ticker);
            effects.push(Effect::SendChat {
                task,
                query: request.query,
                file_id: request.file_id,
                cancel,
            });
            effects.push(Effect::StartProgressTicker {
                task: ticker,
                cancel: ticker_cancel,
            });
            effects
        }
        Command::CancelChat => {
            if state.chat.cancel().is_none() {
                return vec![];
            }
            let mut effects = Vec::new();
            if let Some(token) = state.tasks.chat.take_cancel() {
                effects.push(Effect::CancelTask {
                    kind: TaskKind::Chat,
                    token,
                });
            }
            effects.extend(stop_progress(state));
            effects
        }
        Command::DismissNotice => {
            state.notice = None;
            vec![]
        }
    }
}

fn fetch_files(state: &mut AppState, purpose: ListPurpose) -> Vec<Effect> {
    let task = state.task_seq.next_id();
    // A newer fetch supersedes any in flight; their results are dropped.
    state.tasks.file_list.begin(task);
    vec![Effect::FetchFiles { task, purpose }]
}

fn handle_files_loaded(
    state: &mut AppState,
    task: TaskId,
    purpose: ListPurpose,
    result: ApiResult<Vec<FileItem>>,
) -> Vec<Effect> {
    if !state.tasks.file_list.finish_if_active(task) {
        tracing::debug!(?task, "ignoring superseded file list");
        return vec![];
    }

    let files = match result {
        Ok(files) => files,
        Err(error) => {
            tracing::warn!(error = %error, "file list fetch failed");
            state.notice = Some(Notice::error(LOAD_FILES_FAILED));
            return vec![];
        }
    };

    let registry = &mut state.registry;
    match (purpose, state.pending_selection.take()) {
        (ListPurpose::AfterRemove { file_id }, pending) => {
            registry.apply_removed(files, &file_id);
            if let Some(id) = pending {
                registry.select(&id);
            }
        }
        (ListPurpose::Refresh | ListPurpose::AfterAdd { .. }, Some(id)) => {
            registry.apply_added(files, &id);
        }
        (ListPurpose::Refresh | ListPurpose::AfterAdd { .. }, None) => {
            registry.apply_refresh(files);
        }
    }
    vec![]
}

fn handle_file_added(
    state: &mut AppState,
    task: TaskId,
    result: ApiResult<AddedFile>,
) -> Vec<Effect> {
    if !state.tasks.file_add.finish_if_active(task) {
        return vec![];
    }
    match result {
        Ok(added) => {
            let label = added.filename.clone().unwrap_or_else(|| added.file_id.clone());
            state.notice = Some(Notice::info(format!("Added {label}")));
            state.pending_selection = Some(added.file_id.clone());
            fetch_files(
                state,
                ListPurpose::AfterAdd {
                    file_id: added.file_id,
                },
            )
        }
        Err(error) => {
            tracing::warn!(error = %error, "add failed");
            state.notice = Some(Notice::error(format!("{ADD_FILE_FAILED}: {}", error.message)));
            vec![]
        }
    }
}

/// Cancels the progress ticker if one is running.
fn stop_progress(state: &mut AppState) -> Option<Effect> {
    state
        .tasks
        .progress
        .take_cancel()
        .map(|token| Effect::CancelTask {
            kind: TaskKind::Progress,
            token,
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::{AddSource, ApiError, ChatReply, FileSource};
    use crate::chat::{CHAT_ERROR_MESSAGE, ChatPhase};

    fn file(id: &str) -> FileItem {
        FileItem {
            id: id.to_string(),
            filename: format!("{id}.csv"),
            source: FileSource::Upload,
        }
    }

    fn fetch_task(effects: &[Effect]) -> (TaskId, ListPurpose) {
        match effects {
            [Effect::FetchFiles { task, purpose }] => (*task, purpose.clone()),
            other => panic!("expected FetchFiles, got {other:?}"),
        }
    }

    fn loaded(state: &mut AppState, ids: &[&str]) {
        let (task, purpose) = fetch_task(&update(state, Command::RefreshFiles.into()));
        let files = ids.iter().map(|id| file(id)).collect();
        update(
            state,
            AppEvent::FilesLoaded {
                task,
                purpose,
                result: Ok(files),
            },
        );
    }

    fn added(id: &str) -> AddedFile {
        AddedFile {
            file_id: id.to_string(),
            filename: Some(format!("{id}.csv")),
            columns: Vec::new(),
            message: None,
        }
    }

    #[test]
    fn test_refresh_selects_last() {
        let mut state = AppState::new();
        loaded(&mut state, &["a", "b"]);
        assert_eq!(state.registry.selected_id(), Some("b"));
        assert!(!state.is_busy());
    }

    #[test]
    fn test_refresh_failure_keeps_state_and_notifies() {
        let mut state = AppState::new();
        loaded(&mut state, &["a"]);
        let (task, purpose) = fetch_task(&update(&mut state, Command::RefreshFiles.into()));
        update(
            &mut state,
            AppEvent::FilesLoaded {
                task,
                purpose,
                result: Err(ApiError::http_status(500, "")),
            },
        );
        assert_eq!(state.registry.files().len(), 1);
        assert_eq!(state.notice, Some(Notice::error(LOAD_FILES_FAILED)));

        update(&mut state, Command::DismissNotice.into());
        assert_eq!(state.notice, None);
    }

    #[test]
    fn test_superseded_list_is_ignored() {
        let mut state = AppState::new();
        let (old, _) = fetch_task(&update(&mut state, Command::RefreshFiles.into()));
        let (new, _) = fetch_task(&update(&mut state, Command::RefreshFiles.into()));
        update(
            &mut state,
            AppEvent::FilesLoaded {
                task: new,
                purpose: ListPurpose::Refresh,
                result: Ok(vec![file("new")]),
            },
        );
        update(
            &mut state,
            AppEvent::FilesLoaded {
                task: old,
                purpose: ListPurpose::Refresh,
                result: Ok(vec![file("old")]),
            },
        );
        assert_eq!(state.registry.selected_id(), Some("new"));
        assert_eq!(state.registry.files().len(), 1);
    }

    #[test]
    fn test_add_then_refresh_selects_added_id() {
        let mut state = AppState::new();
        loaded(&mut state, &["a"]);

        let effects = update(
            &mut state,
            Command::AddFile(AddSource::Url {
                url: "https://sheet".into(),
            })
            .into(),
        );
        let [Effect::AddFile { task, .. }] = effects.as_slice() else {
            panic!("expected AddFile");
        };
        let effects = update(
            &mut state,
            AppEvent::FileAdded {
                task: *task,
                result: Ok(added("n")),
            },
        );
        let (task, purpose) = fetch_task(&effects);
        assert_eq!(purpose, ListPurpose::AfterAdd { file_id: "n".into() });
        // Added id is not the last item: it must still win.
        update(
            &mut state,
            AppEvent::FilesLoaded {
                task,
                purpose,
                result: Ok(vec![file("n"), file("a")]),
            },
        );
        assert_eq!(state.registry.selected_id(), Some("n"));
        assert_eq!(state.pending_selection, None);
    }

    #[test]
    fn test_explicit_select_outranks_pending_add() {
        let mut state = AppState::new();
        loaded(&mut state, &["a", "b"]);

        let effects = update(
            &mut state,
            Command::AddFile(AddSource::Url { url: "x".into() }).into(),
        );
        let [Effect::AddFile { task, .. }] = effects.as_slice() else {
            panic!("expected AddFile");
        };
        let effects = update(
            &mut state,
            AppEvent::FileAdded {
                task: *task,
                result: Ok(added("n")),
            },
        );
        let (task, purpose) = fetch_task(&effects);
        update(
            &mut state,
            AppEvent::FilesLoaded {
                task,
                purpose,
                result: Err(ApiError::http_status(503, "")),
            },
        );
        assert_eq!(state.registry.selected_id(), Some("b"));

        update(&mut state, Command::SelectFile { id: "a".into() }.into());
        assert_eq!(state.registry.selected_id(), Some("a"));
        assert_eq!(state.pending_selection, None);

        // The next list load keeps the user's choice.
        loaded(&mut state, &["a", "b", "n"]);
        assert_eq!(state.registry.selected_id(), Some("a"));
    }

    #[test]
    fn test_add_failure_leaves_state() {
        let mut state = AppState::new();
        loaded(&mut state, &["a"]);
        let effects = update(
            &mut state,
            Command::AddFile(AddSource::Url { url: "x".into() }).into(),
        );
        let [Effect::AddFile { task, .. }] = effects.as_slice() else {
            panic!("expected AddFile");
        };
        let effects = update(
            &mut state,
            AppEvent::FileAdded {
                task: *task,
                result: Err(ApiError::http_status(400, r#"{"detail":"Invalid URL"}"#)),
            },
        );
        assert!(effects.is_empty());
        assert_eq!(state.registry.selected_id(), Some("a"));
        assert_eq!(
            state.notice,
            Some(Notice::error("Failed to add file: HTTP 400: Invalid URL"))
        );
    }

    #[test]
    fn test_remove_requires_confirmation() {
        let mut state = AppState::new();
        loaded(&mut state, &["a", "b"]);

        let effects = update(&mut state, Command::RemoveFile { id: "b".into() }.into());
        assert!(matches!(
            effects.as_slice(),
            [Effect::ConfirmRemoval { id, filename }] if id == "b" && filename == "b.csv"
        ));

        let declined = update(
            &mut state,
            AppEvent::RemovalConfirmed {
                id: "b".into(),
                confirmed: false,
            },
        );
        assert!(declined.is_empty());

        let confirmed = update(
            &mut state,
            AppEvent::RemovalConfirmed {
                id: "b".into(),
                confirmed: true,
            },
        );
        let [Effect::DeleteFile { task, id }] = confirmed.as_slice() else {
            panic!("expected DeleteFile");
        };
        assert_eq!(id, "b");

        let effects = update(
            &mut state,
            AppEvent::FileDeleted {
                task: *task,
                id: "b".into(),
                result: Ok(()),
            },
        );
        let (task, purpose) = fetch_task(&effects);
        update(
            &mut state,
            AppEvent::FilesLoaded {
                task,
                purpose,
                result: Ok(vec![file("a")]),
            },
        );
        assert_eq!(state.registry.selected_id(), Some("a"));
    }

    #[test]
    fn test_remove_unknown_file_is_ignored() {
        let mut state = AppState::new();
        assert!(update(&mut state, Command::RemoveFile { id: "zz".into() }.into()).is_empty());
    }

    #[test]
    fn test_delete_failure_notifies() {
        let mut state = AppState::new();
        loaded(&mut state, &["a"]);
        let effects = update(
            &mut state,
            AppEvent::RemovalConfirmed {
                id: "a".into(),
                confirmed: true,
            },
        );
        let [Effect::DeleteFile { task, .. }] = effects.as_slice() else {
            panic!("expected DeleteFile");
        };
        update(
            &mut state,
            AppEvent::FileDeleted {
                task: *task,
                id: "a".into(),
                result: Err(ApiError::http_status(500, "")),
            },
        );
        assert_eq!(state.notice, Some(Notice::error(DELETE_FILE_FAILED)));
        assert_eq!(state.registry.selected_id(), Some("a"));
    }

    #[test]
    fn test_send_spawns_chat_and_ticker() {
        let mut state = AppState::new();
        loaded(&mut state, &["a"]);
        let effects = update(&mut state, Command::Send { query: "why?".into() }.into());
        assert!(matches!(
            effects.as_slice(),
            [
                Effect::SendChat { query, file_id, .. },
                Effect::StartProgressTicker { .. }
            ] if query == "why?" && file_id == "a"
        ));
        assert!(state.chat.is_sending());
        assert!(state.tasks.progress.is_running());
    }

    #[test]
    fn test_send_without_selection_is_noop() {
        let mut state = AppState::new();
        assert!(update(&mut state, Command::Send { query: "q".into() }.into()).is_empty());
        assert!(state.chat.transcript().is_empty());
    }

    #[test]
    fn test_double_send_is_noop() {
        let mut state = AppState::new();
        loaded(&mut state, &["a"]);
        update(&mut state, Command::Send { query: "one".into() }.into());
        let effects = update(&mut state, Command::Send { query: "two".into() }.into());
        assert!(effects.is_empty());
        assert_eq!(state.chat.transcript().len(), 1);
    }

    #[test]
    fn test_completion_stops_ticker() {
        let mut state = AppState::new();
        loaded(&mut state, &["a"]);
        let effects = update(&mut state, Command::Send { query: "q".into() }.into());
        let (task, ticker, ticker_token) = match effects.as_slice() {
            [
                Effect::SendChat { task, .. },
                Effect::StartProgressTicker {
                    task: ticker,
                    cancel,
                },
            ] => (*task, *ticker, cancel.clone()),
            other => panic!("unexpected effects {other:?}"),
        };

        update(&mut state, AppEvent::ProgressTick { task: ticker });
        assert_eq!(state.chat.progress_label(), Some(crate::chat::PROGRESS_STEPS[1]));

        let effects = update(
            &mut state,
            AppEvent::ChatCompleted {
                task,
                result: Err(ApiError::timeout("slow")),
            },
        );
        let [Effect::CancelTask { kind, token }] = effects.as_slice() else {
            panic!("expected CancelTask");
        };
        assert_eq!(*kind, TaskKind::Progress);
        token.cancel();
        assert!(ticker_token.is_cancelled());

        assert_eq!(state.chat.phase(), &ChatPhase::Idle);
        assert_eq!(state.chat.transcript()[1].content, CHAT_ERROR_MESSAGE);
        assert!(matches!(&state.last_outcome, Some(ChatOutcome::Failed(e)) if e.is_timeout()));
        assert!(!state.is_busy());

        // Late tick from the stopped ticker changes nothing.
        update(&mut state, AppEvent::ProgressTick { task: ticker });
        assert_eq!(state.chat.progress_label(), None);
    }

    #[test]
    fn test_cancel_chat_cancels_both_tasks() {
        let mut state = AppState::new();
        loaded(&mut state, &["a"]);
        let effects = update(&mut state, Command::Send { query: "q".into() }.into());
        let [Effect::SendChat { task, cancel, .. }, _] = effects.as_slice() else {
            panic!("expected SendChat");
        };
        let (task, chat_token) = (*task, cancel.clone());

        let effects = update(&mut state, Command::CancelChat.into());
        let kinds: Vec<TaskKind> = effects
            .iter()
            .map(|e| match e {
                Effect::CancelTask { kind, token } => {
                    token.cancel();
                    *kind
                }
                other => panic!("unexpected effect {other:?}"),
            })
            .collect();
        assert_eq!(kinds, vec![TaskKind::Chat, TaskKind::Progress]);
        assert!(chat_token.is_cancelled());
        assert!(!state.is_busy());

        let late = update(
            &mut state,
            AppEvent::ChatCompleted {
                task,
                result: Ok(ChatReply {
                    kind: Some("text".into()),
                    payload: json!("late"),
                }),
            },
        );
        assert!(late.is_empty());
        assert_eq!(state.chat.transcript().len(), 2);
        assert_eq!(state.last_outcome, None);
    }

    #[test]
    fn test_text_reply_matching_error_wording_is_success() {
        let mut state = AppState::new();
        loaded(&mut state, &["a"]);
        let effects = update(&mut state, Command::Send { query: "q".into() }.into());
        let [Effect::SendChat { task, .. }, _] = effects.as_slice() else {
            panic!("expected SendChat");
        };
        update(
            &mut state,
            AppEvent::ChatCompleted {
                task: *task,
                result: Ok(ChatReply {
                    kind: Some("text".into()),
                    payload: json!(CHAT_ERROR_MESSAGE),
                }),
            },
        );
        assert_eq!(state.chat.transcript()[1].content, CHAT_ERROR_MESSAGE);
        assert_eq!(
            state.last_outcome,
            Some(ChatOutcome::Success { widgets: 0 })
        );
    }
}

//! Background task bookkeeping.
//!
//! Every async operation the runtime spawns is identified by a [`TaskId`] and
//! owns a [`CancellationToken`]. Completion events carry the id back, and the
//! reducer only accepts a completion for the task it currently considers active.

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

#[derive(Debug, Default)]
pub struct TaskSeq {
    next: u64,
}

impl TaskSeq {
    pub fn next_id(&mut self) -> TaskId {
        let id = TaskId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    FileList,
    FileAdd,
    FileRemove,
    Chat,
    Progress,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::FileList,
        TaskKind::FileAdd,
        TaskKind::FileRemove,
        TaskKind::Chat,
        TaskKind::Progress,
    ];
}

/// Task lifecycle state (stored in `AppState`, mutated only by the reducer).
#[derive(Debug, Default, Clone)]
pub struct TaskState {
    pub active: Option<TaskId>,
    pub cancel: Option<CancellationToken>,
}

impl TaskState {
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Marks `id` as the active task. It supersedes any previous one.
    pub fn begin(&mut self, id: TaskId) {
        self.active = Some(id);
        self.cancel = None;
    }

    /// Like [`TaskState::begin`], returning the token that cancels the task.
    pub fn begin_cancelable(&mut self, id: TaskId) -> CancellationToken {
        let token = CancellationToken::new();
        self.active = Some(id);
        self.cancel = Some(token.clone());
        token
    }

    pub fn finish_if_active(&mut self, id: TaskId) -> bool {
        let ok = self.active == Some(id);
        if ok {
            self.clear();
        }
        ok
    }

    /// Clears the state and returns the token so the caller can cancel it.
    pub fn take_cancel(&mut self) -> Option<CancellationToken> {
        let token = self.cancel.take();
        self.active = None;
        token
    }

    pub fn clear(&mut self) {
        self.active = None;
        self.cancel = None;
    }
}

#[derive(Debug, Default, Clone)]
pub struct Tasks {
    pub file_list: TaskState,
    pub file_add: TaskState,
    pub file_remove: TaskState,
    pub chat: TaskState,
    pub progress: TaskState,
}

impl Tasks {
    pub fn state(&self, kind: TaskKind) -> &TaskState {
        match kind {
            TaskKind::FileList => &self.file_list,
            TaskKind::FileAdd => &self.file_add,
            TaskKind::FileRemove => &self.file_remove,
            TaskKind::Chat => &self.chat,
            TaskKind::Progress => &self.progress,
        }
    }

    pub fn is_any_running(&self) -> bool {
        TaskKind::ALL
            .iter()
            .any(|kind| self.state(*kind).is_running())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_seq_is_monotonic() {
        let mut seq = TaskSeq::default();
        assert_eq!(seq.next_id(), TaskId(0));
        assert_eq!(seq.next_id(), TaskId(1));
    }

    #[test]
    fn test_finish_only_for_active_id() {
        let mut state = TaskState::default();
        state.begin(TaskId(3));
        assert!(!state.finish_if_active(TaskId(2)));
        assert!(state.is_running());
        assert!(state.finish_if_active(TaskId(3)));
        assert!(!state.is_running());
    }

    #[test]
    fn test_take_cancel_returns_task_token() {
        let mut state = TaskState::default();
        let token = state.begin_cancelable(TaskId(5));
        let taken = state.take_cancel().unwrap();
        taken.cancel();
        assert!(token.is_cancelled());
        assert!(!state.is_running());
        assert!(state.take_cancel().is_none());
    }

    #[test]
    fn test_is_any_running() {
        let mut tasks = Tasks::default();
        assert!(!tasks.is_any_running());
        tasks.progress.begin(TaskId(0));
        assert!(tasks.is_any_running());
    }
}

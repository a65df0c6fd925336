//! Conversation transcript and the one-question-at-a-time request lifecycle.
//!
//! `Idle -> Sending -> (Success | Failed | Cancelled) -> Idle`. The user
//! message is appended when sending starts; the assistant message is appended
//! only once the reply (widgets included) is fully resolved.

use serde::Serialize;
use serde_json::Value;

use crate::api::{ApiError, ApiResult, ChatReply};
use crate::tasks::TaskId;
use crate::widgets::{self, Widget};

/// Progress labels shown in order while a question is in flight.
pub const PROGRESS_STEPS: [&str; 4] = [
    "Analyzing request...",
    "Querying dataset...",
    "Calculating insights...",
    "Rendering visualization...",
];

/// Content of an assistant message that carries widgets.
pub const ANALYSIS_ACK: &str = "Here is the analysis:";
/// Content of an empty text reply.
pub const TEXT_REPLY_DEFAULT: &str = "Analysis complete.";
/// Content appended when a question fails.
pub const CHAT_ERROR_MESSAGE: &str = "Sorry, there was an error processing your request.";
/// Content appended when the user cancels a question.
pub const CANCELLED_MESSAGE: &str = "Request cancelled.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry. Entries are never modified after being appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub widgets: Vec<Widget>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            widgets: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>, widgets: Vec<Widget>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            widgets,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatPhase {
    Idle,
    Sending {
        task: TaskId,
        /// File the question was asked against, captured at send time.
        file_id: String,
        progress: usize,
    },
}

/// A question accepted for sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub task: TaskId,
    pub query: String,
    pub file_id: String,
}

/// How a request settled.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    Success { widgets: usize },
    Failed(ApiError),
}

#[derive(Debug, Clone)]
pub struct ChatOrchestrator {
    transcript: Vec<Message>,
    draft: String,
    phase: ChatPhase,
}

impl Default for ChatOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatOrchestrator {
    pub fn new() -> Self {
        Self {
            transcript: Vec::new(),
            draft: String::new(),
            phase: ChatPhase::Idle,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = draft.into();
    }

    pub fn phase(&self) -> &ChatPhase {
        &self.phase
    }

    pub fn is_sending(&self) -> bool {
        matches!(self.phase, ChatPhase::Sending { .. })
    }

    pub fn active_task(&self) -> Option<TaskId> {
        match self.phase {
            ChatPhase::Sending { task, .. } => Some(task),
            ChatPhase::Idle => None,
        }
    }

    /// Current progress label, or `None` when idle.
    pub fn progress_label(&self) -> Option<&'static str> {
        match self.phase {
            ChatPhase::Sending { progress, .. } => {
                Some(PROGRESS_STEPS[progress % PROGRESS_STEPS.len()])
            }
            ChatPhase::Idle => None,
        }
    }

    /// Starts sending `query` against `selected`.
    ///
    /// No-op (returns `None`) when the query is blank, no file is selected, or
    /// a question is already in flight.
    pub fn begin_send(
        &mut self,
        query: &str,
        selected: Option<&str>,
        task: TaskId,
    ) -> Option<SendRequest> {
        if self.is_sending() {
            tracing::debug!("send ignored: request already in flight");
            return None;
        }
        if query.trim().is_empty() {
            return None;
        }
        let Some(file_id) = selected else {
            tracing::debug!("send ignored: no file selected");
            return None;
        };

        self.transcript.push(Message::user(query));
        self.draft.clear();
        self.phase = ChatPhase::Sending {
            task,
            file_id: file_id.to_string(),
            progress: 0,
        };
        tracing::debug!(?task, file_id, "chat sending");

        Some(SendRequest {
            task,
            query: query.to_string(),
            file_id: file_id.to_string(),
        })
    }

    /// Settles the in-flight request. Results for any other task are dropped.
    pub fn complete(&mut self, task: TaskId, result: ApiResult<ChatReply>) -> Option<ChatOutcome> {
        if self.active_task() != Some(task) {
            tracing::debug!(?task, "ignoring stale chat result");
            return None;
        }
        self.phase = ChatPhase::Idle;

        match result {
            Ok(reply) => {
                let (content, widgets) = resolve_reply(&reply);
                let count = widgets.len();
                self.transcript.push(Message::assistant(content, widgets));
                Some(ChatOutcome::Success { widgets: count })
            }
            Err(error) => {
                tracing::warn!(kind = %error.kind, error = %error, "chat request failed");
                self.transcript
                    .push(Message::assistant(CHAT_ERROR_MESSAGE, Vec::new()));
                Some(ChatOutcome::Failed(error))
            }
        }
    }

    /// Abandons the in-flight request. Returns the cancelled task, if any.
    pub fn cancel(&mut self) -> Option<TaskId> {
        let task = self.active_task()?;
        self.phase = ChatPhase::Idle;
        self.transcript
            .push(Message::assistant(CANCELLED_MESSAGE, Vec::new()));
        tracing::debug!(?task, "chat cancelled");
        Some(task)
    }

    /// Advances the progress label while sending.
    pub fn tick(&mut self) {
        if let ChatPhase::Sending { progress, .. } = &mut self.phase {
            *progress = progress.wrapping_add(1);
        }
    }
}

/// Resolves a chat reply into message content and normalized widgets.
pub fn resolve_reply(reply: &ChatReply) -> (String, Vec<Widget>) {
    match reply.kind.as_deref() {
        Some("dashboard" | "widget") => (
            ANALYSIS_ACK.to_string(),
            widgets::normalize_widget_list(&reply.payload),
        ),
        Some("text") => {
            let content = match &reply.payload {
                Value::Null => None,
                Value::String(s) if s.is_empty() => None,
                other => Some(display_string(other)),
            };
            (
                content.unwrap_or_else(|| TEXT_REPLY_DEFAULT.to_string()),
                Vec::new(),
            )
        }
        _ => (display_string(&reply.payload), Vec::new()),
    }
}

fn display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::ApiErrorKind;

    fn reply(kind: &str, payload: Value) -> ChatReply {
        ChatReply {
            kind: Some(kind.to_string()),
            payload,
        }
    }

    #[test]
    fn test_send_requires_query_and_selection() {
        let mut chat = ChatOrchestrator::new();
        assert!(chat.begin_send("   ", Some("f1"), TaskId(0)).is_none());
        assert!(chat.begin_send("hi", None, TaskId(0)).is_none());
        assert!(chat.transcript().is_empty());
        assert_eq!(chat.phase(), &ChatPhase::Idle);
    }

    #[test]
    fn test_send_appends_user_message_and_clears_draft() {
        let mut chat = ChatOrchestrator::new();
        chat.set_draft("total revenue?");
        let request = chat.begin_send("total revenue?", Some("f1"), TaskId(1)).unwrap();
        assert_eq!(request.file_id, "f1");
        assert_eq!(chat.transcript(), &[Message::user("total revenue?")]);
        assert_eq!(chat.draft(), "");
        assert_eq!(chat.progress_label(), Some(PROGRESS_STEPS[0]));
    }

    #[test]
    fn test_second_send_while_sending_is_noop() {
        let mut chat = ChatOrchestrator::new();
        chat.begin_send("one", Some("f1"), TaskId(1)).unwrap();
        assert!(chat.begin_send("two", Some("f1"), TaskId(2)).is_none());
        assert_eq!(chat.transcript().len(), 1);
        assert_eq!(chat.active_task(), Some(TaskId(1)));
    }

    #[test]
    fn test_failure_appends_one_error_and_returns_idle() {
        let mut chat = ChatOrchestrator::new();
        chat.begin_send("q", Some("f1"), TaskId(1)).unwrap();
        let outcome = chat
            .complete(TaskId(1), Err(ApiError::http_status(500, "")))
            .unwrap();
        assert!(matches!(outcome, ChatOutcome::Failed(e) if e.kind == ApiErrorKind::HttpStatus));
        assert_eq!(chat.transcript().len(), 2);
        assert_eq!(chat.transcript()[1].content, CHAT_ERROR_MESSAGE);
        assert_eq!(chat.phase(), &ChatPhase::Idle);
        assert_eq!(chat.progress_label(), None);
    }

    #[test]
    fn test_stale_result_is_dropped() {
        let mut chat = ChatOrchestrator::new();
        chat.begin_send("q", Some("f1"), TaskId(4)).unwrap();
        assert!(chat.complete(TaskId(3), Ok(reply("text", json!("old")))).is_none());
        assert!(chat.is_sending());
        assert_eq!(chat.transcript().len(), 1);
    }

    #[test]
    fn test_cancel_appends_notice_and_ignores_late_result() {
        let mut chat = ChatOrchestrator::new();
        chat.begin_send("q", Some("f1"), TaskId(2)).unwrap();
        assert_eq!(chat.cancel(), Some(TaskId(2)));
        assert_eq!(chat.transcript()[1].content, CANCELLED_MESSAGE);
        assert!(chat.complete(TaskId(2), Ok(reply("text", json!("late")))).is_none());
        assert_eq!(chat.transcript().len(), 2);
        assert_eq!(chat.cancel(), None);
    }

    #[test]
    fn test_progress_cycles() {
        let mut chat = ChatOrchestrator::new();
        chat.tick();
        assert_eq!(chat.progress_label(), None);
        chat.begin_send("q", Some("f1"), TaskId(0)).unwrap();
        for _ in 0..5 {
            chat.tick();
        }
        assert_eq!(chat.progress_label(), Some(PROGRESS_STEPS[1]));
    }

    #[test]
    fn test_dashboard_reply_normalizes_widgets() {
        let mut chat = ChatOrchestrator::new();
        chat.begin_send("q", Some("f1"), TaskId(0)).unwrap();
        let outcome = chat.complete(
            TaskId(0),
            Ok(reply(
                "dashboard",
                json!([
                    {"vis_type": "kpi", "payload": {"label": "Revenue", "value": 5000}},
                    {"vis_type": "chart", "payload": {"type": "bar", "data": [{"m": "Jan", "v": 1}]}}
                ]),
            )),
        );
        assert_eq!(outcome, Some(ChatOutcome::Success { widgets: 2 }));
        let message = &chat.transcript()[1];
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, ANALYSIS_ACK);
        assert!(matches!(message.widgets[0], Widget::Kpi(_)));
        assert!(matches!(message.widgets[1], Widget::Chart(_)));
    }

    #[test]
    fn test_resolve_text_and_other_replies() {
        assert_eq!(resolve_reply(&reply("text", json!("Hello"))).0, "Hello");
        assert_eq!(resolve_reply(&reply("text", json!(""))).0, TEXT_REPLY_DEFAULT);
        assert_eq!(resolve_reply(&reply("text", Value::Null)).0, TEXT_REPLY_DEFAULT);
        assert_eq!(resolve_reply(&reply("table", json!("raw"))).0, "raw");
        assert_eq!(
            resolve_reply(&reply("table", json!({"a": 1}))).0,
            r#"{"a":1}"#
        );
        let untyped = ChatReply {
            kind: None,
            payload: json!([1, 2]),
        };
        assert_eq!(resolve_reply(&untyped).0, "[1,2]");
        assert!(resolve_reply(&reply("widget", Value::Null)).1.is_empty());
    }
}

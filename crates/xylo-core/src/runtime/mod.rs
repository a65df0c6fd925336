//! Runtime: owns the state, executes effects.
//!
//! This is the boundary where side effects happen. The reducer in
//! [`crate::update`] stays pure and returns effects; this module executes them.
//!
//! ## Inbox Pattern
//!
//! - Spawned handlers send their result `AppEvent` to `inbox_tx`
//! - [`Runtime::step`] takes one event from the inbox and runs the reducer
//! - [`Runtime::settle`] steps until no backend call is in flight
//!
//! Structure:
//! - `mod.rs`: `Runtime`, effect dispatch, convenience operations
//! - `inbox.rs`: inbox channel types
//! - `handlers.rs`: effect handler implementations (backend calls, ticker)

mod handlers;
mod inbox;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use inbox::{EventReceiver, EventSender};
use tokio::sync::mpsc;

use crate::api::{AddSource, ApiClient};
use crate::effects::Effect;
use crate::events::{AppEvent, Command};
use crate::state::{AppState, Notice, REMOVE_CONFIRM_PROMPT};
use crate::update;

/// Default interval between progress label changes.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(2500);

/// Interactive yes/no confirmation used before destructive calls.
pub trait Confirm: Send {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool + Send,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

pub struct Runtime {
    /// Application state. Mutated only through the reducer.
    state: AppState,
    client: Arc<ApiClient>,
    confirm: Box<dyn Confirm>,
    inbox_tx: EventSender,
    inbox_rx: EventReceiver,
    /// Spawned backend calls whose completion has not been reduced yet.
    in_flight: usize,
    progress_interval: Duration,
}

impl Runtime {
    pub fn new(client: Arc<ApiClient>, confirm: impl Confirm + 'static) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            state: AppState::new(),
            client,
            confirm: Box::new(confirm),
            inbox_tx,
            inbox_rx,
            in_flight: 0,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// True while a backend call is in flight.
    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    /// Takes the current notice, dismissing it.
    pub fn take_notice(&mut self) -> Option<Notice> {
        let notice = self.state.notice.clone();
        if notice.is_some() {
            self.dispatch(Command::DismissNotice);
        }
        notice
    }

    /// Feeds a user command to the reducer and starts the resulting effects.
    pub fn dispatch(&mut self, command: Command) {
        self.dispatch_event(AppEvent::Command(command));
    }

    /// Reduces one inbox event.
    ///
    /// Waits for the next event while a backend call is in flight; otherwise
    /// only drains what is already queued. Returns `false` when there was
    /// nothing to do.
    pub async fn step(&mut self) -> bool {
        let event = if self.in_flight == 0 {
            match self.inbox_rx.try_recv() {
                Ok(event) => event,
                Err(_) => return false,
            }
        } else {
            match self.inbox_rx.recv().await {
                Some(event) => event,
                None => return false,
            }
        };
        self.dispatch_event(event);
        true
    }

    /// Steps until every in-flight backend call has been reduced.
    pub async fn settle(&mut self) {
        while self.step().await {}
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Refetches the file list and revalidates the selection.
    pub async fn refresh(&mut self) {
        self.dispatch(Command::RefreshFiles);
        self.settle().await;
    }

    /// Adds a dataset, refetches the list and selects the new file.
    pub async fn add(&mut self, source: AddSource) {
        self.dispatch(Command::AddFile(source));
        self.settle().await;
    }

    /// Deletes a dataset after confirmation and refetches the list.
    pub async fn remove(&mut self, id: impl Into<String>) {
        self.dispatch(Command::RemoveFile { id: id.into() });
        self.settle().await;
    }

    /// Selects a known file. Returns whether it is now selected.
    pub fn select(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        self.dispatch(Command::SelectFile { id: id.clone() });
        self.state.registry.selected_id() == Some(id.as_str())
    }

    /// Asks a question against the selected file and waits for the reply.
    pub async fn send(&mut self, query: impl Into<String>) {
        self.dispatch(Command::Send {
            query: query.into(),
        });
        self.settle().await;
    }

    /// Abandons the in-flight question, if any.
    pub fn cancel_chat(&mut self) {
        self.dispatch(Command::CancelChat);
    }

    // ------------------------------------------------------------------
    // Effect dispatch
    // ------------------------------------------------------------------

    fn dispatch_event(&mut self, event: AppEvent) {
        if event.is_completion() {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
        let effects = update::update(&mut self.state, event);
        for effect in effects {
            self.execute_effect(effect);
        }
    }

    /// Spawns a backend call whose result event goes to the inbox.
    fn spawn_call<Fut>(&mut self, fut: Fut)
    where
        Fut: Future<Output = AppEvent> + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.inbox_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(fut.await);
        });
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::FetchFiles { task, purpose } => {
                let client = Arc::clone(&self.client);
                self.spawn_call(handlers::fetch_files(client, task, purpose));
            }
            Effect::AddFile { task, source } => {
                let client = Arc::clone(&self.client);
                self.spawn_call(handlers::add_file(client, task, source));
            }
            Effect::ConfirmRemoval { id, filename } => {
                let prompt = format!("{REMOVE_CONFIRM_PROMPT} ({filename})");
                let confirmed = self.confirm.confirm(&prompt);
                self.dispatch_event(AppEvent::RemovalConfirmed { id, confirmed });
            }
            Effect::DeleteFile { task, id } => {
                let client = Arc::clone(&self.client);
                self.spawn_call(handlers::delete_file(client, task, id));
            }
            Effect::SendChat {
                task,
                query,
                file_id,
                cancel,
            } => {
                let client = Arc::clone(&self.client);
                self.spawn_call(handlers::send_chat(client, task, query, file_id, cancel));
            }
            Effect::StartProgressTicker { task, cancel } => {
                tokio::spawn(handlers::progress_ticker(
                    self.inbox_tx.clone(),
                    task,
                    self.progress_interval,
                    cancel,
                ));
            }
            Effect::CancelTask { kind, token } => {
                tracing::debug!(?kind, "cancelling task");
                token.cancel();
            }
        }
    }
}

//! Ctrl+C handling for the REPL.
//!
//! While a question is in flight Ctrl+C cancels it. Anywhere else, or a
//! second Ctrl+C before the first was handled, exits with status 130.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tokio::sync::Notify;

#[derive(Clone, Default)]
pub struct Interrupt {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    armed: AtomicBool,
    pending: AtomicBool,
    notify: Notify,
}

impl Interrupt {
    /// Installs the process-wide Ctrl+C handler.
    pub fn install() -> Result<Self> {
        let interrupt = Self::default();
        let handler = interrupt.clone();
        ctrlc::set_handler(move || {
            if !handler.trigger() {
                std::process::exit(130);
            }
        })
        .context("Failed to set Ctrl+C handler")?;
        Ok(interrupt)
    }

    /// Records an interrupt. Returns `false` when nothing is armed to take it
    /// or an earlier one is still pending.
    pub fn trigger(&self) -> bool {
        let inner = &self.inner;
        if !inner.armed.load(Ordering::SeqCst) || inner.pending.swap(true, Ordering::SeqCst) {
            return false;
        }
        inner.notify.notify_one();
        true
    }

    /// Accepts interrupts until the returned guard is dropped.
    pub fn arm(&self) -> Armed<'_> {
        self.inner.pending.store(false, Ordering::SeqCst);
        self.inner.armed.store(true, Ordering::SeqCst);
        Armed(self)
    }

    /// Resolves once an interrupt arrives, consuming it.
    pub async fn wait(&self) {
        loop {
            if self.inner.pending.swap(false, Ordering::SeqCst) {
                return;
            }
            self.inner.notify.notified().await;
        }
    }
}

pub struct Armed<'a>(&'a Interrupt);

impl Drop for Armed<'_> {
    fn drop(&mut self) {
        self.0.inner.armed.store(false, Ordering::SeqCst);
        self.0.inner.pending.store(false, Ordering::SeqCst);
    }
}

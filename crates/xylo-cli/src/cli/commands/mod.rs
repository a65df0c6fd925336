//! CLI command handlers.

pub mod ask;
pub mod auth;
pub mod chat;
pub mod config;
pub mod dashboard;
pub mod files;
pub mod session;

mod console;
mod interrupt;
mod render;

use std::sync::Arc;

use anyhow::{Context, Result};
use xylo_core::api::{ApiClient, Credentials};
use xylo_core::config::Config;
use xylo_core::runtime::{Confirm, Runtime};
use xylo_core::state::NoticeLevel;

/// Loaded configuration plus the credentials every command shares.
pub struct App {
    pub config: Config,
    pub credentials: Arc<Credentials>,
}

impl App {
    pub fn new(config: Config) -> Self {
        let credentials = Arc::new(Credentials::open_default(config.identity));
        Self {
            config,
            credentials,
        }
    }

    pub fn client(&self) -> Result<Arc<ApiClient>> {
        let client = ApiClient::from_config(&self.config, Arc::clone(&self.credentials))
            .context("create API client")?;
        Ok(Arc::new(client))
    }

    pub fn runtime(&self, confirm: impl Confirm + 'static) -> Result<Runtime> {
        Ok(Runtime::new(self.client()?, confirm)
            .with_progress_interval(self.config.progress_interval()))
    }

    /// A runtime with the file list already loaded.
    pub async fn loaded_runtime(&self, confirm: impl Confirm + 'static) -> Result<Runtime> {
        let mut runtime = self.runtime(confirm)?;
        runtime.refresh().await;
        surface_notice(&mut runtime)?;
        Ok(runtime)
    }
}

/// Prints a pending info notice; a pending error notice becomes the error.
pub fn surface_notice(runtime: &mut Runtime) -> Result<()> {
    match runtime.take_notice() {
        Some(notice) if notice.level == NoticeLevel::Error => anyhow::bail!("{}", notice.text),
        Some(notice) => {
            println!("{}", notice.text);
            Ok(())
        }
        None => Ok(()),
    }
}

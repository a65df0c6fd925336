//! One-shot question.

use std::io;

use anyhow::{Context, Result};
use xylo_core::chat::{ChatOutcome, Role};

use super::{App, render, surface_notice};

pub async fn run(app: &App, query: &str, file: Option<&str>, json: bool) -> Result<()> {
    if query.trim().is_empty() {
        anyhow::bail!("Question is empty");
    }

    let mut runtime = app.loaded_runtime(|_: &str| false).await?;
    if let Some(id) = file
        && !runtime.select(id)
    {
        anyhow::bail!("Unknown file: {id}");
    }
    if runtime.state().registry.selected_id().is_none() {
        anyhow::bail!("No files available. Add one with `xylo files add`.");
    }

    runtime.send(query).await;
    surface_notice(&mut runtime)?;

    let reply = runtime
        .state()
        .chat
        .transcript()
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .context("no reply received")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(reply).context("serialize reply")?
        );
    } else {
        render::message(
            &mut io::stdout().lock(),
            reply,
            &app.config.display.number_format(),
        )?;
    }

    match &runtime.state().last_outcome {
        Some(ChatOutcome::Failed(error)) if error.is_timeout() => {
            anyhow::bail!("Question timed out: {error}")
        }
        Some(ChatOutcome::Failed(error)) => anyhow::bail!("Question failed: {error}"),
        Some(ChatOutcome::Success { .. }) | None => Ok(()),
    }
}

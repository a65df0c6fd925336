//! File command handlers.

use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::Result;
use xylo_core::api::AddSource;
use xylo_core::runtime::Runtime;

use super::console::{Console, ConsoleConfirm};
use super::{App, render, surface_notice};

pub async fn list(app: &App) -> Result<()> {
    let runtime = app.loaded_runtime(|_: &str| false).await?;
    let registry = &runtime.state().registry;
    if registry.is_empty() {
        println!("No files found.");
    } else {
        println!("{}", render::files_table(registry));
    }
    Ok(())
}

pub async fn add(app: &App, path: Option<PathBuf>, url: Option<String>) -> Result<()> {
    let source = match (path, url) {
        (_, Some(url)) => AddSource::Url { url },
        (Some(path), None) => AddSource::Upload { path },
        (None, None) => anyhow::bail!("Provide a file path or --url"),
    };

    let mut runtime = app.runtime(|_: &str| false)?;
    runtime.add(source).await;
    surface_notice(&mut runtime)?;
    if let Some(file) = runtime.state().registry.selected_file() {
        println!("Selected {} ({})", file.filename, file.id);
    }
    Ok(())
}

pub async fn remove(app: &App, id: &str, yes: bool) -> Result<()> {
    let mut runtime = if yes {
        app.loaded_runtime(|_: &str| true).await?
    } else {
        let console = Console::shared(BufReader::new(io::stdin()), io::stderr());
        app.loaded_runtime(ConsoleConfirm::new(console)).await?
    };

    if runtime.state().registry.get(id).is_none() {
        anyhow::bail!("Unknown file: {id}");
    }

    runtime.remove(id).await;
    surface_notice(&mut runtime)?;
    report_removal(&runtime, id);
    Ok(())
}

fn report_removal(runtime: &Runtime, id: &str) {
    if runtime.state().registry.get(id).is_some() {
        println!("Cancelled.");
    } else {
        println!("Deleted {id}");
    }
}

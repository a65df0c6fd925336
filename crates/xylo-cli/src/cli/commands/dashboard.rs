//! Saved dashboard handlers.

use std::io;

use anyhow::{Context, Result};
use xylo_core::widgets::normalize_parts;

use super::{App, render};

pub async fn list(app: &App) -> Result<()> {
    let saved = app.client()?.dashboard().await.context("load dashboard")?;
    if saved.is_empty() {
        println!("No saved widgets.");
        return Ok(());
    }

    let format = app.config.display.number_format();
    let mut out = io::stdout().lock();
    for item in saved {
        let widget = normalize_parts(Some(&item.vis_type), &item.payload);
        match &item.id {
            Some(id) => println!("# {} ({id})", item.title),
            None => println!("# {}", item.title),
        }
        render::widget(&mut out, &widget, &format)?;
    }
    Ok(())
}

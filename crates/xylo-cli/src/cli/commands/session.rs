//! Session command handlers.

use anyhow::{Context, Result};
use xylo_core::config::paths;

use super::App;

pub fn show(app: &App) -> Result<()> {
    let credentials = &app.credentials;
    println!("Session:  {}", credentials.session().get_id());
    println!("Identity: {}", credentials.mode().display_name());
    let token = if credentials.token().is_some() {
        "stored"
    } else {
        "none"
    };
    println!("Token:    {token}");
    Ok(())
}

pub fn clear(app: &App) -> Result<()> {
    app.credentials
        .session()
        .clear()
        .with_context(|| format!("clear session at {}", paths::session_path().display()))?;
    println!("Session cleared. A new id is generated on next use.");
    Ok(())
}

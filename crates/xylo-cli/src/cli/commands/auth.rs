//! Account command handlers.

use anyhow::{Context, Result};

use super::App;

pub async fn login(app: &App, username: &str, password: &str) -> Result<()> {
    let token = app
        .client()?
        .login(username, password)
        .await
        .context("log in")?;
    app.credentials.store_token(&token).context("store token")?;
    println!("Logged in as {username}");
    Ok(())
}

pub async fn register(app: &App, email: &str, password: &str) -> Result<()> {
    let token = app
        .client()?
        .register(email, password)
        .await
        .context("register")?;
    app.credentials.store_token(&token).context("store token")?;
    println!("Registered {email}");
    Ok(())
}

pub fn logout(app: &App) -> Result<()> {
    app.credentials.clear_token().context("remove token")?;
    println!("Logged out");
    Ok(())
}

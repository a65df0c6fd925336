//! Interactive chat REPL.
//!
//! Plain lines are questions about the selected dataset. Lines starting with
//! `:` are commands (`:help` lists them). Exits on `:q` or end of input.
//! Ctrl+C while waiting for a reply cancels the question.

use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use xylo_core::api::AddSource;
use xylo_core::chat::Role;
use xylo_core::events::Command;
use xylo_core::runtime::Runtime;
use xylo_core::state::NoticeLevel;
use xylo_core::widgets::NumberFormat;

use super::App;
use super::console::{Console, ConsoleConfirm, SharedConsole, lock};
use super::interrupt::Interrupt;
use super::render;

const QUIT_COMMAND: &str = ":q";
const PROMPT_PREFIX: &str = "you> ";
const ASSISTANT_PREFIX: &str = "assistant> ";

const HELP: &str = "\
Commands:
  :files               list datasets (* marks the selected one)
  :use <id>            select a dataset
  :add <path|url>      upload a file or link a sheet
  :rm [id]             delete a dataset (default: the selected one)
  :save <n> <title>    save widget n of the last reply to the dashboard
  :help                show this help
  :q                   quit";

pub async fn run(app: &App, file: Option<&str>) -> Result<()> {
    let console = Console::shared(BufReader::new(io::stdin()), io::stdout());
    let runtime = app.runtime(ConsoleConfirm::new(Arc::clone(&console)))?;
    let format = app.config.display.number_format();
    let interrupt = Interrupt::install()?;
    run_repl(&console, runtime, &interrupt, file, &format).await
}

/// Runs the chat loop on `console` until `:q` or end of input.
pub async fn run_repl<R, W>(
    console: &SharedConsole<R, W>,
    mut runtime: Runtime,
    interrupt: &Interrupt,
    file: Option<&str>,
    format: &NumberFormat,
) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    runtime.refresh().await;
    report_notice(console, &mut runtime)?;
    if let Some(id) = file
        && !runtime.select(id)
    {
        say(console, &format!("Unknown file: {id}"))?;
    }
    report_selection(console, &runtime)?;
    say(console, "Type a question, :help for commands, :q to quit.")?;

    loop {
        let line = {
            let mut c = lock(console);
            write!(c.out(), "{PROMPT_PREFIX}")?;
            c.out().flush()?;
            c.read_line()?
        };
        let Some(line) = line else {
            say(console, "")?;
            break;
        };
        let trimmed = line.trim();

        if trimmed == QUIT_COMMAND {
            say(console, "Goodbye!")?;
            break;
        }
        if trimmed.is_empty() {
            continue;
        }

        if let Some(command) = trimmed.strip_prefix(':') {
            run_command(console, &mut runtime, command, format).await?;
        } else {
            ask(console, &mut runtime, interrupt, trimmed, format).await?;
        }
    }
    Ok(())
}

async fn ask<R, W>(
    console: &SharedConsole<R, W>,
    runtime: &mut Runtime,
    interrupt: &Interrupt,
    query: &str,
    format: &NumberFormat,
) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    if runtime.state().registry.selected_id().is_none() {
        say(console, "No file selected. Use :add or :use first.")?;
        return Ok(());
    }

    let seen = runtime.state().chat.transcript().len();
    runtime.dispatch(Command::Send {
        query: query.to_string(),
    });

    let armed = interrupt.arm();
    let mut last_label = None;
    while runtime.is_busy() {
        if let Some(label) = runtime.state().chat.progress_label()
            && last_label != Some(label)
        {
            say(console, &format!("... {label}"))?;
            last_label = Some(label);
        }
        let interrupted = tokio::select! {
            () = interrupt.wait() => true,
            _ = runtime.step() => false,
        };
        if interrupted {
            runtime.cancel_chat();
        }
    }
    drop(armed);

    let mut c = lock(console);
    for message in &runtime.state().chat.transcript()[seen..] {
        if message.role == Role::Assistant {
            write!(c.out(), "{ASSISTANT_PREFIX}")?;
            render::message(c.out(), message, format)?;
        }
    }
    Ok(())
}

async fn run_command<R, W>(
    console: &SharedConsole<R, W>,
    runtime: &mut Runtime,
    command: &str,
    format: &NumberFormat,
) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, rest)| (name, rest.trim()));

    match name {
        "help" => say(console, HELP)?,
        "files" => {
            if runtime.state().registry.is_empty() {
                say(console, "No files yet. Use :add <path|url>.")?;
            } else {
                say(console, &render::files_table(&runtime.state().registry))?;
            }
        }
        "use" if !rest.is_empty() => {
            if runtime.select(rest) {
                report_selection(console, runtime)?;
            } else {
                say(console, &format!("Unknown file: {rest}"))?;
            }
        }
        "add" if !rest.is_empty() => {
            runtime.add(parse_source(rest)).await;
            report_notice(console, runtime)?;
            report_selection(console, runtime)?;
        }
        "rm" => {
            let id = if rest.is_empty() {
                runtime.state().registry.selected_id().map(str::to_string)
            } else {
                Some(rest.to_string())
            };
            match id {
                None => say(console, "No file selected.")?,
                Some(id) if runtime.state().registry.get(&id).is_none() => {
                    say(console, &format!("Unknown file: {id}"))?;
                }
                Some(id) => {
                    runtime.remove(id).await;
                    report_notice(console, runtime)?;
                    report_selection(console, runtime)?;
                }
            }
        }
        "save" => save_widget(console, runtime, rest).await?,
        _ => say(console, &format!("Unknown command: :{command}. Type :help."))?,
    }
    Ok(())
}

/// `:save <n> <title>` stores widget `n` (1-based) of the last reply.
async fn save_widget<R, W>(
    console: &SharedConsole<R, W>,
    runtime: &Runtime,
    args: &str,
) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    let Some((index, title)) = args
        .split_once(char::is_whitespace)
        .and_then(|(n, title)| Some((n.parse::<usize>().ok()?, title.trim())))
        .filter(|(n, title)| *n > 0 && !title.is_empty())
    else {
        say(console, "Usage: :save <n> <title>")?;
        return Ok(());
    };

    let last_reply = runtime
        .state()
        .chat
        .transcript()
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant);
    let Some((vis_type, payload)) = last_reply
        .and_then(|m| m.widgets.get(index - 1))
        .and_then(|w| w.to_saved())
    else {
        say(console, &format!("No savable widget #{index} in the last reply."))?;
        return Ok(());
    };

    match runtime.client().save_widget(title, vis_type, &payload).await {
        Ok(Some(id)) => say(console, &format!("Saved \"{title}\" ({id})"))?,
        Ok(None) => say(console, &format!("Saved \"{title}\""))?,
        Err(e) => {
            tracing::warn!(error = %e, title, "widget save failed");
            say(console, &format!("Failed to save widget: {e}"))?;
        }
    }
    Ok(())
}

fn parse_source(arg: &str) -> AddSource {
    if arg.starts_with("http://") || arg.starts_with("https://") {
        AddSource::Url {
            url: arg.to_string(),
        }
    } else {
        AddSource::Upload {
            path: PathBuf::from(arg),
        }
    }
}

fn report_notice<R, W>(console: &SharedConsole<R, W>, runtime: &mut Runtime) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    match runtime.take_notice() {
        Some(notice) if notice.level == NoticeLevel::Error => {
            say(console, &format!("error: {}", notice.text))
        }
        Some(notice) => say(console, &notice.text),
        None => Ok(()),
    }
}

fn report_selection<R, W>(console: &SharedConsole<R, W>, runtime: &Runtime) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    match runtime.state().registry.selected_file() {
        Some(file) => say(console, &format!("Using {} ({})", file.filename, file.id)),
        None => say(console, "No file selected."),
    }
}

fn say<R, W>(console: &SharedConsole<R, W>, text: &str) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    writeln!(lock(console).out(), "{text}")
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use xylo_core::api::{ApiClient, Credentials};
    use xylo_core::session::SessionStore;

    use super::*;

    type TestConsole = SharedConsole<Cursor<Vec<u8>>, Vec<u8>>;

    async fn run_script(server: &MockServer, script: &str) -> String {
        run_with(server, script, &Interrupt::default()).await
    }

    async fn run_with(server: &MockServer, script: &str, interrupt: &Interrupt) -> String {
        let home = tempfile::tempdir().unwrap();
        let credentials = Arc::new(Credentials::session_only(SessionStore::open(
            home.path().join("session_id"),
        )));
        let client = Arc::new(ApiClient::new(server.uri(), credentials).unwrap());
        let console: TestConsole =
            Console::shared(Cursor::new(script.as_bytes().to_vec()), Vec::new());
        let runtime = Runtime::new(client, ConsoleConfirm::new(Arc::clone(&console)))
            .with_progress_interval(Duration::from_millis(10));

        run_repl(&console, runtime, interrupt, None, &NumberFormat::default())
            .await
            .unwrap();
        String::from_utf8(lock(&console).output().clone()).unwrap()
    }

    async fn mount_files(server: &MockServer, files: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(files))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_question_prints_reply_and_widgets() {
        let server = MockServer::start().await;
        mount_files(
            &server,
            json!([{"id": "f1", "filename": "sales.csv", "source": "upload"}]),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(body_json(json!({"query": "total?", "file_id": "f1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "dashboard",
                "payload": [{"vis_type": "kpi", "payload": {"label": "Total", "value": 5000}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let out = run_script(&server, "\ntotal?\n:q\n").await;

        assert!(out.contains("Using sales.csv (f1)"));
        assert!(out.contains("assistant> Here is the analysis:"));
        assert!(out.contains("Total: 5,000"));
        assert!(out.ends_with("Goodbye!\n"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_interrupt_cancels_pending_question() {
        let server = MockServer::start().await;
        mount_files(
            &server,
            json!([{"id": "f1", "filename": "sales.csv", "source": "upload"}]),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"type": "text", "payload": "too late"}))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let interrupt = Interrupt::default();
        let ctrl_c = interrupt.clone();
        tokio::spawn(async move {
            for _ in 0..1000 {
                if ctrl_c.trigger() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let out = tokio::time::timeout(
            Duration::from_secs(10),
            run_with(&server, "slow?\n:q\n", &interrupt),
        )
        .await
        .unwrap();

        assert!(out.contains("assistant> Request cancelled."));
        assert!(!out.contains("too late"));
        assert!(out.ends_with("Goodbye!\n"));
    }

    #[tokio::test]
    async fn test_question_without_files_is_refused() {
        let server = MockServer::start().await;
        mount_files(&server, json!([])).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let out = run_script(&server, "anything?\n").await;
        assert!(out.contains("No file selected. Use :add or :use first."));
    }

    #[tokio::test]
    async fn test_rm_asks_and_honors_decline() {
        let server = MockServer::start().await;
        mount_files(
            &server,
            json!([{"id": "f1", "filename": "sales.csv", "source": "upload"}]),
        )
        .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let out = run_script(&server, ":rm f1\nn\n:files\n:q\n").await;
        assert!(out.contains("Are you sure you want to delete this file? (sales.csv) [y/N] "));
        assert_eq!(out.matches("Using sales.csv (f1)").count(), 2);
    }

    #[tokio::test]
    async fn test_save_posts_last_reply_widget() {
        let server = MockServer::start().await;
        mount_files(
            &server,
            json!([{"id": "f1", "filename": "sales.csv", "source": "upload"}]),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "widget",
                "payload": {"vis_type": "kpi", "payload": {"label": "Users", "value": 42}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/widget/save"))
            .and(body_json(json!({
                "title": "Active users",
                "vis_type": "kpi",
                "payload": {"label": "Users", "value": 42, "trend": null}
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"message": "ok", "id": 7})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let out = run_script(&server, "users?\n:save 1 Active users\n:save 2 Nope\n:q\n").await;
        assert!(out.contains("Saved \"Active users\" (7)"));
        assert!(out.contains("No savable widget #2 in the last reply."));
    }

    #[test]
    fn test_parse_source() {
        assert_eq!(
            parse_source("https://docs.example/sheet"),
            AddSource::Url {
                url: "https://docs.example/sheet".into()
            }
        );
        assert_eq!(
            parse_source("data/sales.csv"),
            AddSource::Upload {
                path: PathBuf::from("data/sales.csv")
            }
        );
    }
}

//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use xylo_core::config;
use xylo_core::logging;

mod commands;

use commands::App;

#[derive(Parser)]
#[command(name = "xylo")]
#[command(version)]
#[command(about = "Ask questions about your datasets")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Backend base URL (overrides XYLO_BASE_URL and config)
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Log to stderr at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Interactive chat about the selected dataset (default)
    Chat {
        /// Start with this file selected
        #[arg(short, long, value_name = "FILE_ID")]
        file: Option<String>,
    },

    /// Ask one question and print the reply
    Ask {
        /// The question
        query: String,

        /// File to ask about (default: most recently added)
        #[arg(short, long, value_name = "FILE_ID")]
        file: Option<String>,

        /// Print the normalized reply as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage uploaded and linked datasets
    Files {
        #[command(subcommand)]
        command: FileCommands,
    },

    /// Show saved dashboard widgets
    Dashboard {
        #[command(subcommand)]
        command: DashboardCommands,
    },

    /// Inspect or reset the client session id
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Log in and store the access token
    Login {
        username: String,

        #[arg(long, env = "XYLO_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and store the access token
    Register {
        email: String,

        #[arg(long, env = "XYLO_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Remove the stored access token
    Logout,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum FileCommands {
    /// Lists datasets (`*` marks the selected one)
    List,
    /// Uploads a local file or links a remote sheet
    Add {
        /// Local CSV/XLSX file to upload
        #[arg(value_name = "PATH", required_unless_present = "url")]
        path: Option<PathBuf>,

        /// Remote sheet or CSV link to connect
        #[arg(long, conflicts_with = "path")]
        url: Option<String>,
    },
    /// Deletes a dataset
    Rm {
        #[arg(value_name = "FILE_ID")]
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(clap::Subcommand)]
enum DashboardCommands {
    /// Lists saved widgets
    List,
}

#[derive(clap::Subcommand)]
enum SessionCommands {
    /// Prints the session id and active identity
    Show,
    /// Forgets the session id; a new one is generated on next use
    Clear,
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Persist the backend base URL
    SetUrl {
        #[arg(value_name = "URL")]
        url: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = logging::init(cli.verbose, &config::paths::logs_dir())?;
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "xylo starting");

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let mut config = config::Config::load().context("load config")?;
    config.base_url_override = cli.base_url;

    // default to chat mode
    let Some(command) = cli.command else {
        return commands::chat::run(&App::new(config), None).await;
    };

    match command {
        Commands::Chat { file } => commands::chat::run(&App::new(config), file.as_deref()).await,
        Commands::Ask { query, file, json } => {
            commands::ask::run(&App::new(config), &query, file.as_deref(), json).await
        }

        Commands::Files { command } => {
            let app = App::new(config);
            match command {
                FileCommands::List => commands::files::list(&app).await,
                FileCommands::Add { path, url } => commands::files::add(&app, path, url).await,
                FileCommands::Rm { id, yes } => commands::files::remove(&app, &id, yes).await,
            }
        }

        Commands::Dashboard { command } => match command {
            DashboardCommands::List => commands::dashboard::list(&App::new(config)).await,
        },

        Commands::Session { command } => match command {
            SessionCommands::Show => commands::session::show(&App::new(config)),
            SessionCommands::Clear => commands::session::clear(&App::new(config)),
        },

        Commands::Login { username, password } => {
            commands::auth::login(&App::new(config), &username, &password).await
        }
        Commands::Register { email, password } => {
            commands::auth::register(&App::new(config), &email, &password).await
        }
        Commands::Logout => commands::auth::logout(&App::new(config)),

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::SetUrl { url } => commands::config::set_url(&url),
        },
    }
}

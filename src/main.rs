mod alerts;
mod client;
mod config;
mod console;
mod dispatch;
mod editor;
mod history;
mod request;
mod session;
mod storage;
mod ui;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use alerts::StderrAlerts;
use client::{ClusterClient, Transport};
use config::Config;
use console::Console;
use dispatch::RequestDispatcher;
use editor::{BodyEditor, Editor};
use session::RestSession;
use storage::FileStore;

#[derive(Parser)]
#[command(name = "kopf-rest")]
#[command(about = "A terminal REST console for Elasticsearch clusters")]
struct Args {
    #[arg(long, env = config::ENV_HOST, default_value = config::DEFAULT_HOST, help = "Cluster base URL")]
    host: String,

    #[arg(long, env = config::ENV_HOME, help = "Directory for history and logs")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Send one request and print the response
    Send {
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        path: String,
        #[arg(short = 'd', long, default_value = "")]
        body: String,
    },
    /// Print the request history, most recent first
    History,
    /// Erase the request history
    ClearHistory,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::new(args.host, args.home)?;
    init_logging(&config)?;

    let store = FileStore::open(config.storage_path())?;
    let mut session: RestSession<FileStore, BodyEditor> = RestSession::new(store);

    match args.command {
        None => {
            let transport: Arc<dyn Transport> = Arc::new(ClusterClient::new(&config.host)?);
            let mut console = Console::new(config.host.clone(), session, transport)?;
            console.run().await?;
        }
        Some(Command::Send { method, path, body }) => {
            send_once(&config, &mut session, method, path, body).await?;
        }
        Some(Command::History) => {
            session.initialize(BodyEditor::new());
            if session.history().is_empty() {
                println!("No requests in history");
            }
            for (i, request) in session.history().list().iter().enumerate() {
                println!("{:>2}. {}", i + 1, request);
                for line in request.body().lines() {
                    println!("      {}", line);
                }
            }
        }
        Some(Command::ClearHistory) => {
            session.clear_history()?;
            println!("Request history cleared");
        }
    }

    Ok(())
}

async fn send_once(
    config: &Config,
    session: &mut RestSession<FileStore, BodyEditor>,
    method: String,
    path: String,
    body: String,
) -> Result<()> {
    let transport: Arc<dyn Transport> = Arc::new(ClusterClient::new(&config.host)?);
    let dispatcher = RequestDispatcher::new(transport, Arc::new(StderrAlerts));

    session.initialize(BodyEditor::new());
    session.set_method(method);
    session.set_path(path);
    if let Some(editor) = session.editor_mut() {
        editor.set_value(&body);
    }

    let (tx, rx) = tokio::sync::oneshot::channel();
    let Some(handle) = session.send_request(&dispatcher, move |outcome| {
        let _ = tx.send(outcome);
    }) else {
        return Err(anyhow!("request was not sent"));
    };
    handle.await.context("request task failed")?;

    let response = rx.await.context("request task dropped its result")??;
    println!("{}", response.body);
    Ok(())
}

fn init_logging(config: &Config) -> Result<()> {
    std::fs::create_dir_all(config.home()).with_context(|| {
        format!(
            "failed to create state directory '{}'",
            config.home().display()
        )
    })?;

    let log_path = config.log_path();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file '{}'", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();

    Ok(())
}

//! `tutorchat`: interactive terminal client for the AI tutor chat.
//!
//! Reads lines from stdin. Plain text is sent to the tutor; slash commands
//! control the session (see `/help`). Conversation changes are printed to
//! stdout as they happen, logs go to stderr.

mod input;
mod render;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tutorchat::identity::identity_channel;
use tutorchat::{ChatSnapshot, ConfigError, Identity, SessionConfig, SessionError, spawn_session};

use crate::input::{HELP, Input, parse_input};
use crate::render::{render_changes, render_connection};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to export transcript: {0}")]
    Export(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "tutorchat", about = "Chat with the AI reading tutor")]
struct Cli {
    /// HTTP(S) base URL of the tutor service.
    #[arg(long, env = "TUTORCHAT_BASE_URL")]
    base_url: String,

    /// Access token from the identity provider.
    #[arg(long, env = "TUTORCHAT_TOKEN")]
    token: Option<String>,

    #[arg(long, env = "TUTORCHAT_USER_ID", default_value = "cli-user")]
    user_id: String,

    /// Chapter or material to discuss.
    #[arg(long)]
    context: String,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let base_url = cli.base_url.clone();
    let config = SessionConfig::from_lookup(|key| {
        if key == "TUTORCHAT_BASE_URL" {
            Some(base_url.clone())
        } else {
            std::env::var(key).ok()
        }
    })?;
    info!(socket = %config.socket_url()?, context = %cli.context, "tutorchat starting");

    let mut token = cli.token.filter(|t| !t.trim().is_empty());
    let mut context = cli.context;
    let (identity_tx, identity_rx) =
        identity_channel(token.as_ref().map(|t| Identity::new(cli.user_id.clone(), t.clone())));
    let session = spawn_session(config, identity_rx);

    match &token {
        Some(_) => session.switch_context(context.clone())?,
        // Surfaces the missing-token state instead of silently idling.
        None => session.start("", context.clone())?,
    }

    let mut snapshots = session.subscribe();
    let mut shown = ChatSnapshot::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = snapshots.borrow_and_update().clone();
                for line in render_changes(&shown, &next) {
                    println!("{line}");
                }
                shown = next;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("stdin closed");
                    break;
                };
                let input = match parse_input(&line) {
                    Ok(input) => input,
                    Err(e) => {
                        eprintln!("{e}");
                        continue;
                    }
                };
                match input {
                    Input::Nothing => {}
                    Input::Send(content) => session.send(content)?,
                    Input::Retry(id) => session.retry(id)?,
                    Input::Context(id) => {
                        context.clone_from(&id);
                        session.switch_context(id)?;
                    }
                    Input::Login(new_token) => {
                        identity_tx.send_replace(Some(Identity::new(cli.user_id.clone(), new_token.clone())));
                        token = Some(new_token);
                    }
                    Input::Logout => {
                        identity_tx.send_replace(None);
                        token = None;
                    }
                    Input::Reconnect => {
                        session.start(token.clone().unwrap_or_default(), context.clone())?;
                    }
                    Input::Export => {
                        let snapshot = session.snapshot();
                        println!("{}", serde_json::to_string_pretty(&snapshot.transcript())?);
                    }
                    Input::Dismiss => session.dismiss_notice()?,
                    Input::Help => {
                        println!("{HELP}");
                        println!("{}", render_connection(&session.snapshot().connection));
                    }
                    Input::Quit => break,
                }
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

//! Courier - A terminal front end for the mailsync engine
//!
//! This is the main entry point: it wires the workspace runtime to the data
//! API, the push channels and a line-oriented prompt on stdin.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use mailsync::channel::topic_url;
use mailsync::{
    Action, HttpMailApi, MailContext, PushChannel, SqliteKvStore, SyncConfig, Topic, Workspace,
    WorkspaceEvent, WorkspaceRuntime,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

mod commands;
mod screen;

use commands::Command;
use screen::Screen;

const DEFAULT_FOLDER: &str = "INBOX";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let mut args = std::env::args().skip(1);
    let account = args
        .next()
        .context("usage: courier <account> [folder]")?;
    let folder = args.next().unwrap_or_else(|| DEFAULT_FOLDER.to_string());

    let settings = match SyncConfig::load() {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Mailsync settings not found: {}", e);
            if let Some(path) = SyncConfig::default_config_path() {
                warn!(
                    "To configure mailsync, either:\n\
                     1. Place your settings at: {}\n\
                     2. Or set environment variables: MAILSYNC_API_URL, MAILSYNC_PUSH_URL and MAILSYNC_TOKEN",
                    path.display()
                );
            }
            return Err(e);
        }
    };

    let store = Arc::new(SqliteKvStore::open_default()?);
    let api = Arc::new(HttpMailApi::new(&settings.api_url, &settings.token));
    let workspace = Workspace::new(store, settings.workspace_options());
    let (handle, mut events, runtime) = WorkspaceRuntime::spawn(workspace, api);

    let (push_tx, mut push_rx) = mpsc::unbounded_channel();
    let mut channels = Vec::new();
    for topic in [Topic::Account(account.clone()), Topic::General] {
        let url = topic_url(&settings.push_url, &topic, &settings.token)?;
        let channel = PushChannel::spawn(url, topic, settings.reconnect_delay(), push_tx.clone());
        channel.connect();
        channels.push(channel);
    }
    drop(push_tx);

    info!("Opening {}/{}", account, folder);
    handle.switch_context(MailContext::new(account.as_str(), folder));
    println!("{}", commands::HELP);

    let mut screen = Screen::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match commands::parse(&line) {
                    Ok(Command::Act(action)) => {
                        handle.send(action);
                    }
                    Ok(Command::Refine(instruction)) => {
                        if let Some(text) = instruction {
                            handle.send(Action::SetInstruction(text));
                        }
                        handle.send(Action::Refine);
                    }
                    Ok(Command::SwitchFolder(folder)) => {
                        handle.switch_context(MailContext::new(account.as_str(), folder));
                    }
                    Ok(Command::Discard) => match screen.active() {
                        Some(id) => {
                            handle.send(Action::CloseCompose(id));
                        }
                        None => println!("! no item is open"),
                    },
                    Ok(Command::Help) => println!("{}", commands::HELP),
                    Ok(Command::Quit) => break,
                    Err(message) if message.is_empty() => {}
                    Err(message) => println!("! {}", message),
                }
            }
            Some(event) = push_rx.recv() => {
                handle.push(event);
            }
            Some(event) = events.recv() => match event {
                WorkspaceEvent::Changed(snapshot) => screen.render(*snapshot),
                WorkspaceEvent::Error(e) => screen.error(&e),
            },
        }
    }

    for channel in channels {
        channel.shutdown().await;
    }
    drop(handle);
    runtime.await?;
    info!("Goodbye");
    Ok(())
}

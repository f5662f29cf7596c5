//! Console client entry point.

mod app;
mod command;
mod console;

use anyhow::{Context, Result};
use app::{App, Flow};
use clap::Parser;
use console::ConsoleDisplay;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use strokeboard_core::{BoardId, ClientConfig, NativeWebSocket};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "strokeboard")]
#[command(version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the server
    #[arg(long, value_name = "URL")]
    server: Option<String>,

    /// Board to draw on
    #[arg(long, value_name = "ID")]
    board: Option<u64>,

    /// Config file (defaults to the user config directory)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = ClientConfig::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(server) = args.server {
        config.server_url = server;
    }
    if let Some(board) = args.board {
        config.board_id = BoardId(board);
    }
    log::info!("Starting Strokeboard on {} via {}", config.board_id, config.server_url);

    let mut ws = NativeWebSocket::new();
    ws.connect(&config.server_url)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Failed to connect to {}", config.server_url))?;

    let mut app = App::new(ws, &config, ConsoleDisplay::new());

    // Stdin is read on its own thread so the session keeps polling between lines.
    let (line_tx, line_rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    println!("type `help` for commands");
    loop {
        app.poll();
        match line_rx.recv_timeout(POLL_INTERVAL) {
            Ok(line) => match command::parse(&line) {
                Ok(Some(cmd)) => {
                    if app.execute(cmd) == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => println!("{:#}", e),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // Let the last writes go out before the socket closes.
    app.poll();
    Ok(())
}

//! Command-line interface.

use crate::app::App;
use crate::config::Config;
use crate::error::SubcastError;
use crate::ipc::client::send_command;
use crate::ipc::server::IpcServer;
use crate::ipc::{Command, Response};
use anyhow::Context;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;

/// Live subtitle broadcasting for streaming overlays.
#[derive(Debug, Parser)]
#[command(name = "subcast", version, about)]
pub struct Cli {
    /// Control socket path (defaults to the runtime directory).
    #[arg(long, global = true)]
    pub socket: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the captioning daemon.
    Run {
        /// Configuration file (defaults to ~/.config/subcast/config.toml).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Capture device name override.
        #[arg(long)]
        device: Option<String>,
        /// Caption a WAV file instead of the microphone.
        #[arg(long)]
        wav: Option<PathBuf>,
        /// Broadcast source-language partials before translation.
        #[arg(long)]
        partials: bool,
    },
    /// Flip captioning on/off.
    Toggle,
    /// Turn captioning on.
    On,
    /// Turn captioning off.
    Off,
    /// Show daemon status.
    Status,
    /// Change a tunable at runtime (silence_threshold_ms, subtitle_ttl_s,
    /// max_lines, toggle_key, translation_engine).
    Set { key: String, value: String },
    /// Stop the daemon.
    Shutdown,
    /// List capture devices.
    Devices,
}

/// Entry point for the parsed CLI.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let socket_path = cli
        .socket
        .clone()
        .unwrap_or_else(IpcServer::default_socket_path);

    match cli.command {
        CliCommand::Run {
            config,
            device,
            wav,
            partials,
        } => {
            let mut config = load_config(config)?;
            if let Some(device) = device {
                config.audio.device = Some(device);
            }
            if partials {
                config.pipeline.emit_partials = true;
            }
            if let Some(socket) = cli.socket {
                config.control.socket_path = Some(socket.display().to_string());
            }
            App::run(config, wav).await.context("daemon failed")?;
            Ok(())
        }
        CliCommand::Toggle => send_and_print(&socket_path, Command::Toggle).await,
        CliCommand::On => send_and_print(&socket_path, Command::On).await,
        CliCommand::Off => send_and_print(&socket_path, Command::Off).await,
        CliCommand::Status => send_and_print(&socket_path, Command::Status).await,
        CliCommand::Set { key, value } => {
            send_and_print(&socket_path, Command::Set { key, value }).await
        }
        CliCommand::Shutdown => send_and_print(&socket_path, Command::Shutdown).await,
        CliCommand::Devices => {
            for name in list_devices() {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load(&path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => Config::default(),
        },
    };
    Ok(config.with_env_overrides())
}

#[cfg(feature = "cpal-audio")]
fn list_devices() -> Vec<String> {
    crate::audio::CpalCaptureSource::list_devices()
}

#[cfg(not(feature = "cpal-audio"))]
fn list_devices() -> Vec<String> {
    eprintln!("subcast: this build has no microphone support (cpal-audio feature)");
    Vec::new()
}

async fn send_and_print(socket_path: &std::path::Path, command: Command) -> anyhow::Result<()> {
    let response = match send_command(socket_path, command).await {
        Ok(response) => response,
        Err(SubcastError::IpcConnection { .. }) => {
            anyhow::bail!(
                "no daemon listening at {} — start one with `subcast run`",
                socket_path.display()
            );
        }
        Err(e) => return Err(e.into()),
    };

    match response {
        Response::Ok => println!("{}", "ok".green()),
        Response::Status {
            mode,
            epoch,
            subscribers,
            dropped_chunks,
            subtitle_ttl_s,
            max_lines,
            toggle_key,
        } => {
            let mode_colored = if mode == "on" {
                mode.green().to_string()
            } else {
                mode.red().to_string()
            };
            println!("mode:            {}", mode_colored);
            println!("epoch:           {}", epoch);
            println!("subscribers:     {}", subscribers);
            println!("dropped chunks:  {}", dropped_chunks);
            println!("subtitle ttl:    {}s", subtitle_ttl_s);
            println!("max lines:       {}", max_lines);
            println!("toggle key:      {}", toggle_key);
        }
        Response::Error { message } => {
            anyhow::bail!("daemon error: {}", message);
        }
    }
    Ok(())
}

#![deny(unsafe_code)]

//! chuuni CLI: voice lines for coding-agent hooks.

mod hook;
mod play;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use chuuni_config::AppConfig;
use chuuni_core::launcher::{self, Launcher, SHUTDOWN_TIMEOUT};
use chuuni_core::{ChuuniEvent, Daemon, IpcClient, logging};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

/// chuuni plays a character's voice clip when your coding agent does things.
#[derive(Parser)]
#[command(name = "chuuni", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file [default: ~/.config/chuuni/config.toml].
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play the active character's clip for EVENT.
    Play {
        /// One of: task_start, coding, bash_run, test_pass, test_fail, error,
        /// task_done, permission_prompt, thinking.
        event: String,
    },

    /// Hook entry point; reads the hook's JSON payload from stdin.
    #[command(name = "on-hook", hide = true)]
    OnHook {
        /// Hook context, e.g. `post-bash`.
        ctx: String,
    },

    /// Manage the playback daemon.
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
enum DaemonAction {
    /// Run the daemon in the foreground.
    Run {
        /// Log to the daemon log file instead of stderr.
        #[arg(long)]
        log_to_file: bool,
    },
    /// Start the daemon in the background if it is not running.
    Start,
    /// Stop a running daemon.
    Stop,
    /// Show queue size and per-event session counts.
    Status,
    /// Reset all session counts.
    Reset,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(chuuni_config::default_config_path);

    // A hook must never fail its caller, not even on a broken config.
    if let Commands::OnHook { ctx } = &cli.command {
        logging::init_stderr(logging::level_for_verbosity("warn", cli.verbose));
        if let Err(e) = cmd_on_hook(&config_path, ctx).await {
            warn!(error = ?e, "hook failed");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = load_config(&config_path).await?;
    let level = logging::level_for_verbosity(&config.logging.level, cli.verbose);
    match &cli.command {
        Commands::Daemon {
            action: DaemonAction::Run { log_to_file: true },
        } => logging::init_file(&config.log_file(), level)
            .with_context(|| format!("cannot open {}", config.log_file().display()))?,
        _ => logging::init_stderr(level),
    }

    match cli.command {
        Commands::Play { event } => cmd_play(&config_path, &config, &event).await,
        Commands::OnHook { .. } => Ok(ExitCode::SUCCESS),
        Commands::Daemon { action } => cmd_daemon(&config_path, &config, action).await,
        Commands::Config { show } => cmd_config(&config_path, &config, show),
    }
}

async fn cmd_play(config_path: &Path, config: &AppConfig, event: &str) -> Result<ExitCode> {
    let event: ChuuniEvent = match event.parse() {
        Ok(event) => event,
        Err(e) => {
            let valid: Vec<_> = ChuuniEvent::ALL.iter().map(|e| e.as_str()).collect();
            eprintln!("{e}\nvalid events: {}", valid.join(", "));
            return Ok(ExitCode::FAILURE);
        }
    };
    if !config.playback.enabled {
        eprintln!("chuuni is disabled; set playback.enabled = true to re-enable");
        return Ok(ExitCode::FAILURE);
    }

    println!("{}", play::banner(event));
    let outcome = play::play_event(config_path, config, event).await?;
    println!("  {outcome}");
    Ok(ExitCode::SUCCESS)
}

async fn cmd_on_hook(config_path: &Path, ctx: &str) -> Result<()> {
    let config = load_config(config_path).await?;
    if !config.playback.enabled {
        return Ok(());
    }

    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("failed to read hook payload")?;
    let payload = hook::parse_payload(&raw);

    let Some(event) = hook::dispatch(ctx, &payload) else {
        return Ok(());
    };
    println!("{}", play::banner(event));
    let outcome = play::play_event(config_path, &config, event).await?;
    println!("  {outcome}");
    Ok(())
}

async fn cmd_daemon(config_path: &Path, config: &AppConfig, action: DaemonAction) -> Result<ExitCode> {
    let client = IpcClient::new(config.socket_path());

    match action {
        DaemonAction::Run { .. } => {
            let daemon = Daemon::new(config);
            daemon.spawn_signal_listener()?;
            info!(config = %config_path.display(), "starting chuuni daemon");
            daemon.run().await?;
        }
        DaemonAction::Start => {
            let exe = std::env::current_exe().context("cannot locate the chuuni executable")?;
            let launcher = Launcher::new(exe, config_path, client);
            if launcher.ensure_running().await? {
                println!("daemon started ({})", config.socket_path().display());
            } else {
                println!("daemon already running");
            }
        }
        DaemonAction::Stop => {
            if launcher::stop_and_wait(&client, SHUTDOWN_TIMEOUT).await? {
                println!("daemon stopped");
            } else {
                println!("daemon is not running");
            }
        }
        DaemonAction::Status => match client.status().await {
            Ok(status) => print_status(&status),
            Err(e) if e.is_unreachable() => {
                println!("daemon is not running");
                return Ok(ExitCode::FAILURE);
            }
            Err(e) => return Err(e.into()),
        },
        DaemonAction::Reset => match client.session_reset().await {
            Ok(_) => println!("session counts reset"),
            Err(e) if e.is_unreachable() => println!("daemon is not running"),
            Err(e) => return Err(e.into()),
        },
    }
    Ok(ExitCode::SUCCESS)
}

fn print_status(status: &chuuni_core::Response) {
    println!("daemon running");
    println!("queue: {}", status.queue_size.unwrap_or(0));

    let counts = status.session_counts.clone().unwrap_or_default();
    let limits = status.session_limits.clone().unwrap_or_default();
    let mut events: Vec<&String> = counts.keys().chain(limits.keys()).collect();
    events.sort();
    events.dedup();
    for event in events {
        let count = counts.get(event).copied().unwrap_or(0);
        match limits.get(event).copied().unwrap_or(0) {
            0 => println!("  {event:<18} {count}"),
            limit => println!("  {event:<18} {count}/{limit}"),
        }
    }
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<ExitCode> {
    if show {
        let toml_str = toml::to_string_pretty(config).context("failed to render config")?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(ExitCode::SUCCESS)
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load_or_default(path)
        .await
        .with_context(|| format!("invalid configuration at {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_daemon_run() {
        let cli = Cli::try_parse_from(["chuuni", "--config", "/tmp/c.toml", "daemon", "run", "--log-to-file"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(matches!(
            cli.command,
            Commands::Daemon {
                action: DaemonAction::Run { log_to_file: true }
            }
        ));
    }

    #[test]
    fn test_parse_hidden_on_hook() {
        let cli = Cli::try_parse_from(["chuuni", "-vv", "on-hook", "post-bash"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::OnHook { ctx } if ctx == "post-bash"));
    }

    #[tokio::test]
    async fn test_load_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("missing.toml")).await.unwrap();
        assert!(config.playback.enabled);
    }

    #[tokio::test]
    async fn test_load_invalid_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[playback]\nvolume = 3.0\n").unwrap();
        assert!(load_config(&path).await.is_err());
    }
}

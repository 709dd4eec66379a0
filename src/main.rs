use anyhow::{Context, Result};
use buddy::app::{self, AudioInput, RunOverrides};
use buddy::cli::{Cli, Commands, ConfigAction};
use buddy::config::Config;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    buddy::logging::init(cli.verbose, cli.quiet);

    let overrides = RunOverrides {
        device: cli.device.clone(),
        max_listen: cli.max_listen,
        continuous: cli.continuous,
    };

    match cli.command {
        None | Some(Commands::Run) => {
            let config = load_config(cli.config.as_deref(), &overrides)?;
            run_until_signal(config, microphone()?).await?;
        }
        Some(Commands::Replay { wav }) => {
            let config = load_config(cli.config.as_deref(), &overrides)?;
            run_until_signal(config, AudioInput::Wav(wav)).await?;
        }
        Some(Commands::Devices) => {
            let config = load_config(cli.config.as_deref(), &overrides)?;
            list_audio_devices(&config)?;
        }
        Some(Commands::Say { text }) => {
            let config = load_config(cli.config.as_deref(), &overrides)?;
            let text = text.join(" ");
            tokio::task::spawn_blocking(move || app::say(&config, &text))
                .await
                .context("Speech task failed")??;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, cli.config.as_deref(), &overrides)?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "buddy", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config), which must exist
/// 2. Default config path (~/.config/buddy/config.toml)
/// 3. Built-in defaults
///
/// Environment variables and then command-line flags are applied on top.
fn load_config(custom_path: Option<&Path>, overrides: &RunOverrides) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        let default_path = Config::default_path();
        Config::load_or_default(&default_path)
            .with_context(|| format!("Failed to load {}", default_path.display()))?
    };

    let mut config = config.with_env_overrides();
    overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[cfg(feature = "cpal-audio")]
fn microphone() -> Result<AudioInput> {
    Ok(AudioInput::Microphone)
}

#[cfg(not(feature = "cpal-audio"))]
fn microphone() -> Result<AudioInput> {
    anyhow::bail!("Microphone capture requires the cpal-audio feature; use `buddy replay <wav>`")
}

/// Run the assistant until it stops on its own or a shutdown signal arrives.
async fn run_until_signal(config: Config, input: AudioInput) -> Result<()> {
    tracing::info!(version = %buddy::version_string(), "starting");
    let running = Arc::new(AtomicBool::new(true));
    let handle = app::spawn_assistant(config, input, Arc::clone(&running))
        .context("Failed to start the conversation thread")?;
    let mut join = tokio::task::spawn_blocking(move || app::join_assistant(handle));

    let finished = tokio::select! {
        result = &mut join => Some(result),
        signal = shutdown_signal() => {
            if let Err(e) = signal {
                tracing::error!(error = %e, "signal handling failed");
            }
            tracing::info!("shutting down");
            running.store(false, Ordering::SeqCst);
            None
        }
    };

    let result = match finished {
        Some(result) => result,
        None => join.await,
    };
    let stats = result
        .context("Conversation task failed")?
        .context("Assistant stopped with an error")?;
    tracing::info!(exchanges = stats.exchanges, "goodbye");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("Failed to wait for Ctrl+C")?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for Ctrl+C")?;
    Ok(())
}

/// List available audio input devices.
#[cfg(feature = "cpal-audio")]
fn list_audio_devices(config: &Config) -> Result<()> {
    let devices = buddy::audio::capture::list_devices(&config.audio.mic_name_hints)?;

    if devices.is_empty() {
        eprintln!("No audio input devices found");
        std::process::exit(1);
    }

    println!("Available audio input devices:");
    for (idx, device) in devices.iter().enumerate() {
        if config.audio.device.as_deref() == Some(device.name.as_str()) {
            println!("  [{}] {} {}", idx, device.name.bold(), "(configured)".green());
        } else if device.preferred {
            println!("  [{}] {} {}", idx, device.name, "(preferred)".dimmed());
        } else {
            println!("  [{}] {}", idx, device.name);
        }
    }

    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
fn list_audio_devices(_config: &Config) -> Result<()> {
    anyhow::bail!("Device listing requires the cpal-audio feature")
}

fn handle_config_command(
    action: ConfigAction,
    custom_path: Option<&Path>,
    overrides: &RunOverrides,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path, overrides)?;
            print!("{}", config.to_toml_string()?);
        }
        ConfigAction::Path => {
            let path = custom_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            if path.exists() {
                println!("{}", path.display());
            } else {
                println!("{} {}", path.display(), "(not found, using defaults)".yellow());
            }
        }
    }
    Ok(())
}

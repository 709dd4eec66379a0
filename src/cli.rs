//! Command-line interface for buddy
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Offline voice assistant
#[derive(Parser, Debug)]
#[command(name = "buddy", version, about = "Offline voice assistant")]
pub struct Cli {
    /// Subcommand to execute (default: run on the microphone)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Audio input device name (overrides the configured device)
    #[arg(long, global = true, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Longest utterance to capture. Examples: 8s, 1500ms
    #[arg(long, global = true, value_name = "DURATION", value_parser = parse_duration)]
    pub max_listen: Option<Duration>,

    /// Accept follow-up requests without the wake word until the cooldown expires
    #[arg(long, global = true)]
    pub continuous: bool,
}

/// Parse a duration: bare numbers are seconds, anything else goes to `humantime`.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Listen on the microphone (the default)
    Run,

    /// Feed a WAV file through the assistant instead of the microphone
    Replay {
        /// WAV file to replay
        wav: PathBuf,
    },

    /// List available audio input devices
    Devices,

    /// Speak text through the configured synthesizer
    Say {
        /// Text to speak
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_command() {
        let cli = Cli::try_parse_from(["buddy"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.device.is_none());
        assert!(cli.max_listen.is_none());
        assert!(!cli.continuous);
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["buddy", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_verbose_repeated_flags() {
        let cli = Cli::try_parse_from(["buddy", "-v", "-v"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_run_with_options() {
        let cli = Cli::try_parse_from([
            "buddy",
            "run",
            "--device",
            "PCM2902",
            "--max-listen",
            "8s",
            "--continuous",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Run)));
        assert_eq!(cli.device.as_deref(), Some("PCM2902"));
        assert_eq!(cli.max_listen, Some(Duration::from_secs(8)));
        assert!(cli.continuous);
    }

    #[test]
    fn test_max_listen_formats() {
        assert_eq!(parse_duration("12"), Ok(Duration::from_secs(12)));
        assert_eq!(parse_duration("1500ms"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration(" 1m30s "), Ok(Duration::from_secs(90)));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_parse_replay() {
        let cli = Cli::try_parse_from(["buddy", "replay", "question.wav"]).unwrap();
        match cli.command {
            Some(Commands::Replay { wav }) => assert_eq!(wav, PathBuf::from("question.wav")),
            _ => panic!("Expected Replay command"),
        }
    }

    #[test]
    fn test_replay_requires_file() {
        let err = Cli::try_parse_from(["buddy", "replay"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_parse_say_joins_words() {
        let cli = Cli::try_parse_from(["buddy", "say", "hello", "there"]).unwrap();
        match cli.command {
            Some(Commands::Say { text }) => assert_eq!(text.join(" "), "hello there"),
            _ => panic!("Expected Say command"),
        }
    }

    #[test]
    fn test_parse_devices() {
        let cli = Cli::try_parse_from(["buddy", "devices"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Devices)));
    }

    #[test]
    fn test_parse_config_actions() {
        let cli = Cli::try_parse_from(["buddy", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Show
            })
        ));
        let cli = Cli::try_parse_from(["buddy", "config", "path"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Path
            })
        ));
    }

    #[test]
    fn test_global_options_after_command() {
        let cli = Cli::try_parse_from(["buddy", "devices", "--config", "/tmp/config.toml", "-q"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.toml")));
        assert!(cli.quiet);
    }

    #[test]
    fn test_invalid_command_returns_error() {
        let err = Cli::try_parse_from(["buddy", "invalid"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["buddy", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_completions_shell() {
        let cli = Cli::try_parse_from(["buddy", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Completions { shell: Shell::Bash })
        ));
    }
}

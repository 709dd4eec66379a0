//! Face display driven by an external renderer command.

use crate::config::DisplayConfig;
use crate::devices::{DisplayCapability, FaceExpression};
use std::process::{Command, Stdio};

/// Runs `command args... <expression>` for every expression shown.
#[derive(Debug, Clone)]
pub struct CommandDisplay {
    command: String,
    args: Vec<String>,
}

impl CommandDisplay {
    pub fn new(config: &DisplayConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }
}

impl DisplayCapability for CommandDisplay {
    fn show(&mut self, expression: FaceExpression) -> bool {
        let status = Command::new(&self.command)
            .args(&self.args)
            .arg(expression.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status();
        match status {
            Ok(status) if status.success() => {
                tracing::debug!(%expression, "face shown");
                true
            }
            Ok(status) => {
                tracing::warn!(%expression, %status, command = %self.command, "face renderer failed");
                false
            }
            Err(e) => {
                tracing::warn!(%expression, error = %e, command = %self.command, "cannot run face renderer");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display(command: &str, args: &[&str]) -> CommandDisplay {
        CommandDisplay::new(&DisplayConfig {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        })
    }

    #[test]
    fn test_successful_command() {
        assert!(display("true", &[]).show(FaceExpression::Happy));
    }

    #[test]
    fn test_failing_command() {
        assert!(!display("false", &[]).show(FaceExpression::Sad));
    }

    #[test]
    fn test_missing_command() {
        assert!(!display("buddy-face-does-not-exist", &[]).show(FaceExpression::Angry));
    }

    #[test]
    fn test_expression_is_last_argument() {
        let script = r#"[ "$1" = "--mode" ] && [ "$2" = "oled" ] && [ "$3" = "angry" ]"#;
        let mut display = display("sh", &["-c", script, "face", "--mode", "oled"]);
        assert!(display.show(FaceExpression::Angry));
        assert!(!display.show(FaceExpression::Happy));
    }
}

use serde::{Deserialize, Serialize};

/// Where the supervisor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumIs)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Stopped,
    Starting,
    Owned,
    Adopted,
    Stopping,
}

impl SupervisorState {
    pub fn style(&self) -> String {
        let s = self.to_string();
        match self {
            SupervisorState::Stopped => console::style(s).dim().to_string(),
            SupervisorState::Starting => console::style(s).yellow().to_string(),
            SupervisorState::Owned => console::style(s).green().to_string(),
            SupervisorState::Adopted => console::style(s).cyan().to_string(),
            SupervisorState::Stopping => console::style(s).yellow().to_string(),
        }
    }
}

/// How the last owned daemon process ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumIs)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExitReport {
    /// Exited with code 0 on its own
    Clean,
    /// Exited with a non-zero code or a signal without being asked to
    Crashed(Option<i32>),
    /// Ended because we stopped it
    Stopped,
}

impl ExitReport {
    pub fn error_message(&self) -> Option<String> {
        match self {
            ExitReport::Crashed(Some(code)) => Some(format!("exit code {code}")),
            ExitReport::Crashed(None) => Some("terminated by signal".to_string()),
            _ => None,
        }
    }
}

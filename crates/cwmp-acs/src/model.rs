//! Domain enums stored as text columns.

use std::fmt;
use std::str::FromStr;

use cwmp_core::cwmp::MessageKind;

/// Reachability of a device as last observed by the ACS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Online,
    Offline,
    Error,
}

impl DeviceStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Error => "error",
        }
    }
}

impl FromStr for DeviceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown device status: {other}")),
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task lifecycle: `pending -> in_progress -> {completed, failed}`.
///
/// A pending task may also fail directly when it cannot be translated
/// into an RPC. Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress | Self::Failed)
                | (Self::InProgress, Self::Completed | Self::Failed)
        )
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task types the engine knows how to turn into an RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    GetParameters,
    SetParameters,
    Reboot,
    FactoryReset,
}

impl TaskKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetParameters => "get_parameters",
            Self::SetParameters => "set_parameters",
            Self::Reboot => "reboot",
            Self::FactoryReset => "factory_reset",
        }
    }

    /// The CPE response that completes a task of this kind.
    pub const fn response_kind(self) -> MessageKind {
        match self {
            Self::GetParameters => MessageKind::GetParameterValuesResponse,
            Self::SetParameters => MessageKind::SetParameterValuesResponse,
            Self::Reboot => MessageKind::RebootResponse,
            Self::FactoryReset => MessageKind::FactoryResetResponse,
        }
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get_parameters" => Ok(Self::GetParameters),
            "set_parameters" => Ok(Self::SetParameters),
            "reboot" => Ok(Self::Reboot),
            "factory_reset" => Ok(Self::FactoryReset),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

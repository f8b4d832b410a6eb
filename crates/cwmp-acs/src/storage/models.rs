//! Data models for ACS storage.

use serde::{Deserialize, Serialize};

use crate::model::TaskKind;

/// A registered CPE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub id: String,
    pub serial_number: String,
    pub device_type: String,
    pub manufacturer: String,
    pub oui: Option<String>,
    pub product_class: String,
    pub software_version: Option<String>,
    pub hardware_version: Option<String>,
    pub ip_address: Option<String>,
    pub connection_request_url: Option<String>,
    pub status: String,
    pub last_inform: Option<i64>,
    pub last_boot: Option<i64>,
    pub registered_at: i64,
    pub updated_at: i64,
}

/// Last known value of one TR-069 parameter on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeviceParameter {
    pub device_id: String,
    pub name: String,
    pub value: String,
    pub value_type: Option<String>,
    pub writable: i64,
    pub updated_at: i64,
}

/// A management task queued for a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: String,
    pub device_id: String,
    pub task_type: String,
    pub status: String,
    pub priority: i64,
    /// JSON payload interpreted per task type.
    pub parameters: Option<String>,
    /// JSON result recorded on completion.
    pub result: Option<String>,
    pub error_message: Option<String>,
    /// `cwmp:ID` of the RPC dispatched for this task.
    pub request_id: Option<String>,
    /// CWMP session the RPC went out in.
    pub session_id: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl Task {
    /// Parsed task type; the error carries the unrecognised name.
    pub fn kind(&self) -> Result<TaskKind, String> {
        self.task_type.parse()
    }
}

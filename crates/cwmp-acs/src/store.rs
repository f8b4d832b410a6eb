//! Device/task store interface used by the CWMP engine.
//!
//! The engine never talks to SQL directly; it sees persistence only through
//! [`AcsStore`]. Every method is one atomic unit of work, so a message's
//! read-modify-write of a device row and its parameters commits together.

use async_trait::async_trait;

use cwmp_core::cwmp::ParameterValue;

use crate::storage::{AcsDatabase, DatabaseError, Device, Task};

/// Everything an Inform tells us about a device.
///
/// `None` fields leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceReport {
    pub serial_number: String,
    pub manufacturer: Option<String>,
    pub oui: Option<String>,
    pub product_class: Option<String>,
    pub software_version: Option<String>,
    pub hardware_version: Option<String>,
    pub ip_address: Option<String>,
    pub connection_request_url: Option<String>,
    /// The Inform carried the boot event; `last_boot` is set to `now`.
    pub booted: bool,
    pub parameters: Vec<ParameterValue>,
}

/// Result of registering a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub device: Device,
    pub created: bool,
}

#[async_trait]
pub trait AcsStore: Send + Sync {
    /// Create or refresh the device keyed by serial number, mark it online,
    /// stamp `last_inform` (and `last_boot` when booted) and upsert the
    /// reported parameters.
    async fn upsert_device(
        &self,
        report: &DeviceReport,
        now: i64,
    ) -> Result<UpsertOutcome, DatabaseError>;

    /// Start a CWMP session for a device, returning its id. Tasks left in
    /// progress by the device's previous session fail.
    async fn open_session(&self, device_id: &str, now: i64) -> Result<String, DatabaseError>;

    /// Device behind a session seen at or after `not_before`; refreshes it.
    async fn session_device(
        &self,
        session_id: &str,
        not_before: i64,
        now: i64,
    ) -> Result<Option<String>, DatabaseError>;

    /// Highest-priority, oldest pending task for a device.
    async fn next_pending_task(&self, device_id: &str) -> Result<Option<Task>, DatabaseError>;

    /// Task whose dispatched RPC carried `request_id`.
    async fn task_by_request(&self, request_id: &str) -> Result<Option<Task>, DatabaseError>;

    /// Oldest task the device still has in progress from `session_id`.
    async fn in_progress_task(
        &self,
        device_id: &str,
        session_id: &str,
    ) -> Result<Option<Task>, DatabaseError>;

    /// `pending -> in_progress`. Returns `false` if the task was not pending.
    async fn start_task(
        &self,
        task_id: &str,
        request_id: &str,
        session_id: &str,
        now: i64,
    ) -> Result<bool, DatabaseError>;

    /// `in_progress -> completed`, upserting returned parameters for the
    /// task's device in the same transaction.
    async fn complete_task(
        &self,
        task_id: &str,
        result: &str,
        parameters: &[ParameterValue],
        now: i64,
    ) -> Result<bool, DatabaseError>;

    /// `{pending, in_progress} -> failed`.
    async fn fail_task(&self, task_id: &str, error: &str, now: i64)
    -> Result<bool, DatabaseError>;
}

#[async_trait]
impl AcsStore for AcsDatabase {
    async fn upsert_device(
        &self,
        report: &DeviceReport,
        now: i64,
    ) -> Result<UpsertOutcome, DatabaseError> {
        Self::upsert_device(self, report, now).await
    }

    async fn open_session(&self, device_id: &str, now: i64) -> Result<String, DatabaseError> {
        Self::open_session(self, device_id, now).await
    }

    async fn session_device(
        &self,
        session_id: &str,
        not_before: i64,
        now: i64,
    ) -> Result<Option<String>, DatabaseError> {
        self.resolve_session(session_id, not_before, now).await
    }

    async fn next_pending_task(&self, device_id: &str) -> Result<Option<Task>, DatabaseError> {
        Self::next_pending_task(self, device_id).await
    }

    async fn task_by_request(&self, request_id: &str) -> Result<Option<Task>, DatabaseError> {
        self.get_task_by_request(request_id).await
    }

    async fn in_progress_task(
        &self,
        device_id: &str,
        session_id: &str,
    ) -> Result<Option<Task>, DatabaseError> {
        Self::in_progress_task(self, device_id, session_id).await
    }

    async fn start_task(
        &self,
        task_id: &str,
        request_id: &str,
        session_id: &str,
        now: i64,
    ) -> Result<bool, DatabaseError> {
        Self::start_task(self, task_id, request_id, session_id, now).await
    }

    async fn complete_task(
        &self,
        task_id: &str,
        result: &str,
        parameters: &[ParameterValue],
        now: i64,
    ) -> Result<bool, DatabaseError> {
        Self::complete_task(self, task_id, result, parameters, now).await
    }

    async fn fail_task(
        &self,
        task_id: &str,
        error: &str,
        now: i64,
    ) -> Result<bool, DatabaseError> {
        Self::fail_task(self, task_id, error, now).await
    }
}

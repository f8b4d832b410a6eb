//! Device, parameter and session queries.

use sqlx::SqliteConnection;

use cwmp_core::cwmp::ParameterValue;

use super::db::{AcsDatabase, DatabaseError};
use super::models::{Device, DeviceParameter};
use crate::model::{DeviceStatus, TaskStatus};
use crate::store::{DeviceReport, UpsertOutcome};

/// Recorded on tasks still in flight when their device starts a new session.
pub const SESSION_ENDED_ERROR: &str = "session ended without response";

/// Insert-or-refresh keyed on serial number. `COALESCE` keeps stored values
/// for every field the Inform did not report.
const UPSERT_DEVICE: &str = "
INSERT INTO devices (
    id, serial_number, device_type, manufacturer, oui, product_class,
    software_version, hardware_version, ip_address, connection_request_url,
    status, last_inform, last_boot, registered_at, updated_at
) VALUES (
    ?1, ?2, 'CPE', COALESCE(?3, 'Unknown'), ?4, COALESCE(?5, 'Unknown'),
    ?6, ?7, ?8, ?9,
    ?10, ?11, ?12, ?11, ?11
)
ON CONFLICT(serial_number) DO UPDATE SET
    manufacturer = COALESCE(?3, manufacturer),
    oui = COALESCE(?4, oui),
    product_class = COALESCE(?5, product_class),
    software_version = COALESCE(?6, software_version),
    hardware_version = COALESCE(?7, hardware_version),
    ip_address = COALESCE(?8, ip_address),
    connection_request_url = COALESCE(?9, connection_request_url),
    status = ?10,
    last_inform = ?11,
    last_boot = COALESCE(?12, last_boot),
    updated_at = ?11
RETURNING *";

impl AcsDatabase {
    // =========================================================================
    // Device queries
    // =========================================================================

    /// Register or refresh a device and its reported parameters atomically.
    pub async fn upsert_device(
        &self,
        report: &DeviceReport,
        now: i64,
    ) -> Result<UpsertOutcome, DatabaseError> {
        let new_id = uuid::Uuid::new_v4().to_string();
        let last_boot = report.booted.then_some(now);

        let mut tx = self.pool().begin().await?;

        let device = sqlx::query_as::<_, Device>(UPSERT_DEVICE)
            .bind(&new_id)
            .bind(&report.serial_number)
            .bind(&report.manufacturer)
            .bind(&report.oui)
            .bind(&report.product_class)
            .bind(&report.software_version)
            .bind(&report.hardware_version)
            .bind(&report.ip_address)
            .bind(&report.connection_request_url)
            .bind(DeviceStatus::Online.as_str())
            .bind(now)
            .bind(last_boot)
            .fetch_one(&mut *tx)
            .await?;

        upsert_parameters_in(&mut *tx, &device.id, &report.parameters, now).await?;

        tx.commit().await?;

        Ok(UpsertOutcome {
            created: device.id == new_id,
            device,
        })
    }

    /// Get a device by ID.
    pub async fn get_device(&self, id: &str) -> Result<Device, DatabaseError> {
        sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Device {id}")))
    }

    /// Get a device by serial number.
    pub async fn get_device_by_serial(&self, serial_number: &str) -> Result<Device, DatabaseError> {
        sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE serial_number = ?")
            .bind(serial_number)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Device with serial {serial_number}")))
    }

    /// Number of registered devices.
    pub async fn count_devices(&self) -> Result<i64, DatabaseError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM devices")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Parameter queries
    // =========================================================================

    /// List a device's parameters ordered by name.
    pub async fn list_parameters(
        &self,
        device_id: &str,
    ) -> Result<Vec<DeviceParameter>, DatabaseError> {
        let params = sqlx::query_as::<_, DeviceParameter>(
            "SELECT * FROM device_parameters WHERE device_id = ? ORDER BY name",
        )
        .bind(device_id)
        .fetch_all(self.pool())
        .await?;
        Ok(params)
    }

    /// Upsert parameter values for a device.
    pub async fn upsert_parameters(
        &self,
        device_id: &str,
        parameters: &[ParameterValue],
        now: i64,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool().begin().await?;
        upsert_parameters_in(&mut *tx, device_id, parameters, now).await?;
        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Session queries
    // =========================================================================

    /// Open a CWMP session, replacing any earlier session of the device.
    ///
    /// Tasks the device left in progress can no longer be answered, so they
    /// fail with [`SESSION_ENDED_ERROR`].
    pub async fn open_session(&self, device_id: &str, now: i64) -> Result<String, DatabaseError> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM cwmp_sessions WHERE device_id = ?")
            .bind(device_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE tasks SET status = ?, error_message = ?, completed_at = ?
             WHERE device_id = ? AND status = ?",
        )
        .bind(TaskStatus::Failed.as_str())
        .bind(SESSION_ENDED_ERROR)
        .bind(now)
        .bind(device_id)
        .bind(TaskStatus::InProgress.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO cwmp_sessions (id, device_id, started_at, last_seen) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(device_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Resolve a live session to its device and bump `last_seen`.
    ///
    /// Sessions last seen before `not_before` are treated as absent.
    pub async fn resolve_session(
        &self,
        session_id: &str,
        not_before: i64,
        now: i64,
    ) -> Result<Option<String>, DatabaseError> {
        let device_id = sqlx::query_scalar::<_, String>(
            "UPDATE cwmp_sessions SET last_seen = ? WHERE id = ? AND last_seen >= ? RETURNING device_id",
        )
        .bind(now)
        .bind(session_id)
        .bind(not_before)
        .fetch_optional(self.pool())
        .await?;
        Ok(device_id)
    }
}

/// Parameter upsert on an open connection, so callers can share their transaction.
pub(super) async fn upsert_parameters_in(
    conn: &mut SqliteConnection,
    device_id: &str,
    parameters: &[ParameterValue],
    now: i64,
) -> Result<(), DatabaseError> {
    for param in parameters {
        sqlx::query(
            "INSERT INTO device_parameters (device_id, name, value, value_type, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(device_id, name) DO UPDATE SET
                value = excluded.value,
                value_type = COALESCE(excluded.value_type, value_type),
                updated_at = excluded.updated_at",
        )
        .bind(device_id)
        .bind(&param.name)
        .bind(&param.value)
        .bind(&param.value_type)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

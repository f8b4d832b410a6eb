//! Task queries and lifecycle transitions.

use cwmp_core::cwmp::ParameterValue;

use super::db::{AcsDatabase, DatabaseError};
use super::models::Task;
use super::queries::upsert_parameters_in;
use crate::model::TaskStatus;

enum Transition<'a> {
    Start {
        request_id: &'a str,
        session_id: &'a str,
    },
    Complete { result: &'a str, parameters: &'a [ParameterValue] },
    Fail { error: &'a str },
}

impl Transition<'_> {
    const fn target(&self) -> TaskStatus {
        match self {
            Self::Start { .. } => TaskStatus::InProgress,
            Self::Complete { .. } => TaskStatus::Completed,
            Self::Fail { .. } => TaskStatus::Failed,
        }
    }
}

impl AcsDatabase {
    // =========================================================================
    // Task queries
    // =========================================================================

    /// Queue a task for a device.
    pub async fn create_task(
        &self,
        id: &str,
        device_id: &str,
        task_type: &str,
        priority: i64,
        parameters: Option<&str>,
    ) -> Result<Task, DatabaseError> {
        let now = cwmp_core::db::unix_timestamp();

        sqlx::query(
            "INSERT INTO tasks (id, device_id, task_type, status, priority, parameters, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(device_id)
        .bind(task_type)
        .bind(TaskStatus::Pending.as_str())
        .bind(priority)
        .bind(parameters)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_task(id).await
    }

    /// Get a task by ID.
    pub async fn get_task(&self, id: &str) -> Result<Task, DatabaseError> {
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Task {id}")))
    }

    /// Highest-priority (lowest number), oldest pending task for a device.
    pub async fn next_pending_task(&self, device_id: &str) -> Result<Option<Task>, DatabaseError> {
        let task = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks
             WHERE device_id = ? AND status = ?
             ORDER BY priority ASC, created_at ASC, rowid ASC
             LIMIT 1",
        )
        .bind(device_id)
        .bind(TaskStatus::Pending.as_str())
        .fetch_optional(self.pool())
        .await?;
        Ok(task)
    }

    /// Task whose dispatched RPC carried `request_id`.
    pub async fn get_task_by_request(&self, request_id: &str) -> Result<Option<Task>, DatabaseError> {
        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE request_id = ?")
            .bind(request_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(task)
    }

    /// Oldest task the device still has in progress from `session_id`.
    pub async fn in_progress_task(
        &self,
        device_id: &str,
        session_id: &str,
    ) -> Result<Option<Task>, DatabaseError> {
        let task = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks
             WHERE device_id = ? AND session_id = ? AND status = ?
             ORDER BY started_at ASC, rowid ASC
             LIMIT 1",
        )
        .bind(device_id)
        .bind(session_id)
        .bind(TaskStatus::InProgress.as_str())
        .fetch_optional(self.pool())
        .await?;
        Ok(task)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Mark a pending task dispatched under `request_id` in `session_id`.
    pub async fn start_task(
        &self,
        task_id: &str,
        request_id: &str,
        session_id: &str,
        now: i64,
    ) -> Result<bool, DatabaseError> {
        self.transition_task(
            task_id,
            Transition::Start {
                request_id,
                session_id,
            },
            now,
        )
        .await
    }

    /// Complete an in-progress task, storing `parameters` for its device.
    pub async fn complete_task(
        &self,
        task_id: &str,
        result: &str,
        parameters: &[ParameterValue],
        now: i64,
    ) -> Result<bool, DatabaseError> {
        self.transition_task(task_id, Transition::Complete { result, parameters }, now)
            .await
    }

    /// Fail a pending or in-progress task.
    pub async fn fail_task(
        &self,
        task_id: &str,
        error: &str,
        now: i64,
    ) -> Result<bool, DatabaseError> {
        self.transition_task(task_id, Transition::Fail { error }, now)
            .await
    }

    /// Apply a transition if the current status allows it.
    ///
    /// Returns `Ok(false)` and leaves the row untouched otherwise.
    async fn transition_task(
        &self,
        task_id: &str,
        transition: Transition<'_>,
        now: i64,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let (status, device_id) = sqlx::query_as::<_, (String, String)>(
            "SELECT status, device_id FROM tasks WHERE id = ?",
        )
        .bind(task_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Task {task_id}")))?;

        let current: TaskStatus = status.parse().map_err(DatabaseError::Query)?;
        let target = transition.target();
        if !current.can_transition_to(target) {
            return Ok(false);
        }

        let updated = match transition {
            Transition::Start {
                request_id,
                session_id,
            } => {
                sqlx::query(
                    "UPDATE tasks SET status = ?, request_id = ?, session_id = ?, started_at = ?
                     WHERE id = ? AND status = ?",
                )
                .bind(target.as_str())
                .bind(request_id)
                .bind(session_id)
                .bind(now)
                .bind(task_id)
                .bind(current.as_str())
                .execute(&mut *tx)
                .await?
            }
            Transition::Complete { result, parameters } => {
                upsert_parameters_in(&mut *tx, &device_id, parameters, now).await?;
                sqlx::query(
                    "UPDATE tasks SET status = ?, result = ?, completed_at = ?
                     WHERE id = ? AND status = ?",
                )
                .bind(target.as_str())
                .bind(result)
                .bind(now)
                .bind(task_id)
                .bind(current.as_str())
                .execute(&mut *tx)
                .await?
            }
            Transition::Fail { error } => {
                sqlx::query(
                    "UPDATE tasks SET status = ?, error_message = ?, completed_at = ?
                     WHERE id = ? AND status = ?",
                )
                .bind(target.as_str())
                .bind(error)
                .bind(now)
                .bind(task_id)
                .bind(current.as_str())
                .execute(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;
        Ok(updated.rows_affected() == 1)
    }
}

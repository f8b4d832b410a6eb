//! Task-to-RPC translation, dispatch, and response correlation.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use cwmp_core::cwmp::{CwmpMessage, ParameterValue, RpcRequest, SetParameter, new_message_id};

use super::{AcsEngine, AcsReply, EngineError, Session};
use crate::model::TaskKind;
use crate::storage::Task;

/// Why a task could not be turned into an RPC.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("Invalid {task_type} payload: {reason}")]
    InvalidPayload {
        task_type: &'static str,
        reason: String,
    },
}

#[derive(Debug, Default, Deserialize)]
struct GetParametersPayload {
    #[serde(default)]
    parameter_names: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SetParametersPayload {
    #[serde(default)]
    parameter_values: Map<String, Value>,
}

/// Build the RPC a task asks for. `now` seeds the `ParameterKey`/`CommandKey`.
pub fn translate(task: &Task, now: i64) -> Result<RpcRequest, TranslateError> {
    let kind = task.kind().map_err(TranslateError::UnknownTaskType)?;
    let request = match kind {
        TaskKind::GetParameters => {
            let payload: GetParametersPayload = payload(task, kind)?;
            RpcRequest::GetParameterValues {
                names: payload.parameter_names,
            }
        }
        TaskKind::SetParameters => {
            let payload: SetParametersPayload = payload(task, kind)?;
            RpcRequest::SetParameterValues {
                parameters: payload
                    .parameter_values
                    .into_iter()
                    .map(|(name, value)| set_parameter(name, value))
                    .collect(),
                parameter_key: format!("key_{now}"),
            }
        }
        TaskKind::Reboot => RpcRequest::Reboot {
            command_key: format!("reboot_{now}"),
        },
        TaskKind::FactoryReset => RpcRequest::FactoryReset,
    };
    Ok(request)
}

/// A missing or blank payload means "use the defaults".
fn payload<T: DeserializeOwned + Default>(task: &Task, kind: TaskKind) -> Result<T, TranslateError> {
    match task.parameters.as_deref().map(str::trim) {
        None | Some("") => Ok(T::default()),
        Some(raw) => serde_json::from_str(raw).map_err(|e| TranslateError::InvalidPayload {
            task_type: kind.as_str(),
            reason: e.to_string(),
        }),
    }
}

fn set_parameter(name: String, value: Value) -> SetParameter {
    let (value, xsd_type) = match value {
        Value::String(s) => (s, "xsd:string"),
        Value::Bool(b) => (b.to_string(), "xsd:boolean"),
        Value::Number(n) => match integer_type(&n) {
            Some(xsd_type) => (n.to_string(), xsd_type),
            None => (n.to_string(), "xsd:string"),
        },
        other => (other.to_string(), "xsd:string"),
    };
    SetParameter {
        name,
        value,
        xsd_type,
    }
}

/// Narrowest XML Schema integer type holding `n`; `None` for non-integers.
fn integer_type(n: &serde_json::Number) -> Option<&'static str> {
    if let Some(i) = n.as_i64() {
        return Some(if i32::try_from(i).is_ok() {
            "xsd:int"
        } else if u32::try_from(i).is_ok() {
            "xsd:unsignedInt"
        } else {
            "xsd:long"
        });
    }
    n.as_u64().map(|_| "xsd:unsignedLong")
}

/// What a CPE response means for the task it answers.
#[derive(Debug, PartialEq, Eq)]
enum Outcome<'a> {
    Complete {
        result: String,
        parameters: &'a [ParameterValue],
    },
    Fail(String),
    /// The response is not the one this task's RPC expects.
    Mismatch,
}

fn outcome<'a>(task: &Task, message: &'a CwmpMessage) -> Outcome<'a> {
    if let CwmpMessage::Fault(fault) = message {
        return Outcome::Fail(fault.to_string());
    }
    let Ok(kind) = task.kind() else {
        return Outcome::Mismatch;
    };
    if kind.response_kind() != message.kind() {
        return Outcome::Mismatch;
    }
    match message {
        CwmpMessage::GetParameterValuesResponse { parameters } => {
            let values: Map<String, Value> = parameters
                .iter()
                .map(|p| (p.name.clone(), Value::String(p.value.clone())))
                .collect();
            Outcome::Complete {
                result: Value::Object(values).to_string(),
                parameters,
            }
        }
        CwmpMessage::SetParameterValuesResponse { status } => Outcome::Complete {
            result: json!({ "status": status }).to_string(),
            parameters: &[],
        },
        CwmpMessage::RebootResponse | CwmpMessage::FactoryResetResponse => Outcome::Complete {
            result: json!({ "acknowledged": true }).to_string(),
            parameters: &[],
        },
        _ => Outcome::Mismatch,
    }
}

impl AcsEngine {
    /// Turn the session device's next pending task into an RPC reply.
    ///
    /// A task that cannot be translated is failed on the spot and the CPE
    /// gets an empty reply.
    pub(super) async fn dispatch_next(
        &self,
        session: &Session<'_>,
        now: i64,
    ) -> Result<AcsReply, EngineError> {
        let device_id = session.device_id.as_str();
        let Some(task) = self.bounded(self.store.next_pending_task(device_id)).await? else {
            debug!(device_id, "No pending tasks");
            return Ok(AcsReply::Empty);
        };

        let request = match translate(&task, now) {
            Ok(request) => request,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Task cannot be dispatched, failing it");
                self.bounded(self.store.fail_task(&task.id, &e.to_string(), now))
                    .await?;
                return Ok(AcsReply::Empty);
            }
        };

        let request_id = new_message_id();
        let body = request.encode(&request_id)?;

        if !self
            .bounded(self.store.start_task(&task.id, &request_id, session.id, now))
            .await?
        {
            debug!(task_id = %task.id, "Task was claimed elsewhere");
            return Ok(AcsReply::Empty);
        }

        info!(
            task_id = %task.id,
            rpc = request.method_name(),
            request_id = %request_id,
            "Dispatching task"
        );
        Ok(AcsReply::Rpc(body))
    }

    /// Apply a CPE response to the task that issued the request.
    ///
    /// The echoed header ID identifies the task; without one the oldest task
    /// still in progress from this session is assumed.
    pub(super) async fn settle(
        &self,
        message: &CwmpMessage,
        header_id: Option<&str>,
        session: Option<&Session<'_>>,
        now: i64,
    ) -> Result<(), EngineError> {
        let kind = message.kind().rpc_name();
        if matches!(message, CwmpMessage::GetRpcMethodsResponse { .. }) {
            debug!(kind, "No task issues GetRPCMethods, nothing to settle");
            return Ok(());
        }

        let by_header = match header_id {
            Some(id) => self.bounded(self.store.task_by_request(id)).await?,
            None => None,
        };
        let task = match (by_header, session) {
            (Some(task), _) => Some(task),
            (None, Some(session)) => {
                self.bounded(self.store.in_progress_task(&session.device_id, session.id))
                    .await?
            }
            (None, None) => None,
        };

        let Some(task) = task else {
            info!(kind, header_id, "Response matches no task");
            return Ok(());
        };
        if session.is_some_and(|s| s.device_id != task.device_id) {
            warn!(kind, task_id = %task.id, "Response belongs to another device's task, ignoring");
            return Ok(());
        }

        match outcome(&task, message) {
            Outcome::Complete { result, parameters } => {
                let done = self
                    .bounded(self.store.complete_task(&task.id, &result, parameters, now))
                    .await?;
                if done {
                    info!(task_id = %task.id, kind, "Task completed");
                } else {
                    warn!(task_id = %task.id, status = %task.status, "Task not in progress, response dropped");
                }
            }
            Outcome::Fail(reason) => {
                let failed = self
                    .bounded(self.store.fail_task(&task.id, &reason, now))
                    .await?;
                if failed {
                    warn!(task_id = %task.id, reason = %reason, "Task failed by CPE fault");
                } else {
                    warn!(task_id = %task.id, status = %task.status, "Fault for finished task ignored");
                }
            }
            Outcome::Mismatch => {
                warn!(
                    task_id = %task.id,
                    task_type = %task.task_type,
                    kind,
                    "Response does not match task type, leaving task untouched"
                );
            }
        }
        Ok(())
    }
}

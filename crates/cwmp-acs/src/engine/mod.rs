//! The CWMP message engine.
//!
//! One call to [`AcsEngine::handle`] processes one CPE HTTP POST: decode the
//! envelope, classify it, apply Inform registration or settle the task an RPC
//! response answers, and decide what goes back on the wire. Every outcome is
//! an [`AcsReply`]; no error escapes to the transport.

mod inform;
mod reply;
mod tasks;


use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument};

use cwmp_core::config::CwmpConfig;
use cwmp_core::cwmp::{CwmpMessage, Decoded, envelope};
use cwmp_core::db::unix_timestamp;
use cwmp_core::FaultCode;

use crate::events::DeviceNotifier;
use crate::storage::DatabaseError;
use crate::store::AcsStore;

pub use reply::AcsReply;
pub use tasks::{TranslateError, translate};

/// Errors raised while processing one CWMP message.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Codec(#[from] cwmp_core::Error),

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),

    #[error("Store call timed out after {0:?}")]
    StoreTimeout(Duration),

    #[error(transparent)]
    Translate(#[from] TranslateError),
}

impl EngineError {
    pub const fn fault_code(&self) -> FaultCode {
        match self {
            Self::Codec(e) => e.fault_code(),
            _ => FaultCode::Server,
        }
    }
}

/// Tunables for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Upper bound on every store call.
    pub store_timeout: Duration,
    /// Sessions idle for longer than this are forgotten.
    pub session_ttl: Duration,
}

impl EngineSettings {
    pub const fn from_config(config: &CwmpConfig) -> Self {
        Self {
            store_timeout: config.store_timeout(),
            session_ttl: config.session_ttl(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&CwmpConfig::default())
    }
}

/// One inbound POST as the transport saw it.
#[derive(Debug, Clone, Copy)]
pub struct AcsRequest<'a> {
    pub body: &'a [u8],
    /// Declared `Content-Length`, if any.
    pub content_length: Option<u64>,
    /// Value of the session cookie, if the CPE sent one.
    pub session_id: Option<&'a str>,
}

/// What to send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcsResponse {
    pub reply: AcsReply,
    /// A session opened by this exchange; the transport hands it to the CPE.
    pub session_id: Option<String>,
}

impl AcsResponse {
    const fn reply(reply: AcsReply) -> Self {
        Self {
            reply,
            session_id: None,
        }
    }
}

/// A live CWMP session and the device it belongs to.
struct Session<'a> {
    id: &'a str,
    device_id: String,
}

pub struct AcsEngine {
    store: Arc<dyn AcsStore>,
    notifier: Arc<dyn DeviceNotifier>,
    settings: EngineSettings,
}

impl AcsEngine {
    pub const fn new(
        store: Arc<dyn AcsStore>,
        notifier: Arc<dyn DeviceNotifier>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            notifier,
            settings,
        }
    }

    /// Process one CPE POST. Failures become SOAP faults.
    #[instrument(skip_all, fields(session = request.session_id.unwrap_or("-"), bytes = request.body.len()))]
    pub async fn handle(&self, request: AcsRequest<'_>) -> AcsResponse {
        match self.process(request).await {
            Ok(response) => response,
            Err(e) => {
                let code = e.fault_code();
                error!(error = %e, faultcode = %code, "CWMP request failed");
                AcsResponse::reply(AcsReply::fault(code, &e.to_string()))
            }
        }
    }

    async fn process(&self, request: AcsRequest<'_>) -> Result<AcsResponse, EngineError> {
        let now = unix_timestamp();

        let envelope = match envelope::decode(request.body, request.content_length)? {
            Decoded::EmptyPoll => {
                debug!("Empty poll");
                let reply = match self.live_session(request.session_id, now).await? {
                    Some(session) => self.dispatch_next(&session, now).await?,
                    None => AcsReply::Empty,
                };
                return Ok(AcsResponse::reply(reply));
            }
            Decoded::Envelope(envelope) => envelope,
        };

        debug!(body = %String::from_utf8_lossy(request.body), "Inbound SOAP body");

        let message = CwmpMessage::decode(&envelope.body);
        debug!(kind = message.kind().rpc_name(), header_id = ?envelope.header_id, "Classified message");

        match message {
            CwmpMessage::Inform(inform) => self.handle_inform(&inform, now).await,
            CwmpMessage::Unknown { name } => {
                info!(element = ?name, "Unrecognised CWMP message, acknowledging");
                Ok(AcsResponse::reply(AcsReply::Empty))
            }
            response => {
                let session = self.live_session(request.session_id, now).await?;
                self.settle(&response, envelope.header_id.as_deref(), session.as_ref(), now)
                    .await?;
                let reply = match session {
                    Some(session) => self.dispatch_next(&session, now).await?,
                    None => AcsReply::Empty,
                };
                Ok(AcsResponse::reply(reply))
            }
        }
    }

    /// Resolve a session cookie that has not idled out.
    async fn live_session<'a>(
        &self,
        session_id: Option<&'a str>,
        now: i64,
    ) -> Result<Option<Session<'a>>, EngineError> {
        let Some(session_id) = session_id else {
            return Ok(None);
        };
        let ttl = i64::try_from(self.settings.session_ttl.as_secs()).unwrap_or(i64::MAX);
        let device_id = self
            .bounded(
                self.store
                    .session_device(session_id, now.saturating_sub(ttl), now),
            )
            .await?;
        if device_id.is_none() {
            debug!(session = session_id, "Unknown or expired session");
        }
        Ok(device_id.map(|device_id| Session {
            id: session_id,
            device_id,
        }))
    }

    /// Run a store call under the configured timeout.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, DatabaseError>> + Send,
    ) -> Result<T, EngineError> {
        let limit = self.settings.store_timeout;
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| EngineError::StoreTimeout(limit))?
            .map_err(EngineError::from)
    }
}

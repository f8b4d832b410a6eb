use tracing::error;

use cwmp_core::FaultCode;
use cwmp_core::cwmp::encode;

/// Last-resort fault body if the writer itself fails.
const FALLBACK_FAULT: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">"#,
    "<soap:Body><soap:Fault><faultcode>Server</faultcode>",
    "<faultstring>Internal error</faultstring></soap:Fault></soap:Body></soap:Envelope>",
);

/// The engine's answer to one POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcsReply {
    /// Nothing to say: HTTP 204 with no body.
    Empty,
    /// A SOAP envelope carrying an `InformResponse` or an ACS request.
    Rpc(String),
    /// An encoded SOAP fault.
    Fault { code: FaultCode, body: String },
}

impl AcsReply {
    pub fn fault(code: FaultCode, message: &str) -> Self {
        match encode::fault(code, message) {
            Ok(body) => Self::Fault { code, body },
            Err(e) => {
                error!(error = %e, "Failed to encode SOAP fault");
                Self::Fault {
                    code: FaultCode::Server,
                    body: FALLBACK_FAULT.to_string(),
                }
            }
        }
    }

    /// HTTP status code for this reply.
    pub const fn status(&self) -> u16 {
        match self {
            Self::Empty => 204,
            Self::Rpc(_) => 200,
            Self::Fault { .. } => 500,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Rpc(body) | Self::Fault { body, .. } => Some(body),
        }
    }
}

//! CWMP (TR-069) protocol handling.
//!
//! Decode side: [`envelope::decode`] turns an HTTP body into a SOAP Body
//! element, [`message::CwmpMessage::decode`] classifies and decodes it.
//! Encode side: [`encode`] builds ACS requests, `InformResponse` and faults.

pub mod encode;
pub mod envelope;
pub mod message;
pub mod xml;

pub use encode::{RpcRequest, SetParameter, new_message_id};
pub use envelope::{Decoded, Envelope};
pub use message::{CpeFault, CwmpMessage, DeviceId, Inform, MessageKind, ParameterValue, classify};

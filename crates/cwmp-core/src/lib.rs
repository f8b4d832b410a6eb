//! CWMP Core Library
//!
//! Shared functionality for the CWMP (TR-069) auto-configuration server:
//! - Namespace-tolerant SOAP envelope decoding and message classification
//! - Structured SOAP/CWMP request and fault encoding
//! - Configuration resolution and hierarchy
//! - Common error and database types

pub mod config;
pub mod cwmp;
pub mod db;
pub mod error;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, FaultCode, Result};

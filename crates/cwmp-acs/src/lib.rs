//! CWMP (TR-069) ACS Library
//!
//! Core functionality for the auto-configuration server:
//! - CWMP engine: Inform registration, task dispatch, response correlation
//! - SQLite storage for devices, parameters, tasks and CWMP sessions
//! - Device-changed event fan-out
//! - axum HTTP endpoint and health probe

pub mod engine;
pub mod events;
pub mod model;
pub mod server;
pub mod storage;
pub mod store;

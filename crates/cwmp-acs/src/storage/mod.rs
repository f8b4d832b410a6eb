//! SQLite storage for the CWMP ACS.
//!
//! Provides persistence for devices, their parameters, management tasks and
//! CWMP sessions.

mod db;
mod models;
mod queries;
mod queries_tasks;

#[cfg(test)]
mod tests;

pub use db::{AcsDatabase, DatabaseError};
pub use models::*;
pub use queries::SESSION_ENDED_ERROR;

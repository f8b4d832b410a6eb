//! Database connection and initialization.

pub use cwmp_core::db::DatabaseError;

cwmp_core::define_database!(AcsDatabase, "ACS database migrations complete");

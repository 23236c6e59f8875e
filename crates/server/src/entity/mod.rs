//! SeaORM entities backing the repository implementation.

pub mod application;
pub mod session;
pub mod user;

//! SQLite storage for civicdesk.
//!
//! Implements the core user and issue store contracts on one database.

mod db;
mod models;
mod queries_issues;
mod queries_users;


pub use db::{CivicDatabase, DatabaseError};
pub use models::*;

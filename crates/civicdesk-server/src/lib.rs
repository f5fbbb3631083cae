//! civicdesk server library
//!
//! Infrastructure behind the `civicdesk` binary:
//! - SQLite user and issue stores
//! - Email notifier with log and webhook transports
//! - Local filesystem image host
//! - Service wiring and command-line subcommands

pub mod app;
pub mod cli;
pub mod images;
pub mod mail;
pub mod storage;

//! Database driver implementations.
//!
//! - [`mysql`]: MySQL/MariaDB connector and dataset store
//!
//! # Architecture
//!
//! Each driver module implements:
//! - [`Connector`](crate::core::Connector): builds one handle per logical service
//! - [`DatasetStore`](crate::core::DatasetStore): full-table reads and appends
//!
//! Staging and every microservice are MySQL-compatible, so a single driver
//! covers both sides of a migration.

pub mod mysql;

pub use mysql::{MysqlConnector, MysqlStore};

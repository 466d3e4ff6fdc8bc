//! Core abstractions shared by every stage of a migration:
//!
//! - [`value`]: owned SQL cell values
//! - [`dataset`]: in-memory tables and transformation output maps
//! - [`traits`]: the connector and dataset-store seams

pub mod dataset;
pub mod traits;
pub mod value;

pub use dataset::{Dataset, Row, TransformationOutput};
pub use traits::{Connector, DatasetStore};
pub use value::SqlValue;

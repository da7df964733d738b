pub mod client;
pub mod dataset;
pub mod error;
pub mod migration;
pub mod report;
pub mod validation;

pub use client::{CozeroClient, Credentials, LocationPayload, RemoteLocation, Session};
pub use dataset::{Cell, Dataset, Record};
pub use error::{Result, SyncError};
pub use migration::{MigrationOptions, MigrationSummary};
pub use validation::ValidationFindings;

//! Time-based one-time passwords and single-use backup codes.

pub mod backup;
mod service;

pub use backup::BackupCodeBatch;
pub use service::TotpEngine;

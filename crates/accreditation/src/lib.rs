//! Accredited-investor verification workflows.
//!
//! Two services make up the core: [`workflows::verification`] owns the request lifecycle and
//! [`workflows::vault`] owns encrypted supporting documents. Both receive their persistence
//! handle and collaborators at construction time.

pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod notify;
pub mod storage;
pub mod telemetry;
pub mod workflows;

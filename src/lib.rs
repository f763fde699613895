//! Rules core for recording medical certificates of cause of death (MCCD).
//!
//! The crate holds the field dependency rules of the certificate form, the
//! editing session that applies them, and the aggregation used by the
//! "top causes of death" views. Remote platform access is expressed as async
//! traits in [`remote`] so the core stays independent of any HTTP client.

pub mod certificate;
pub mod config;
pub mod error;
pub mod mortality;
pub mod remote;
pub mod routes;
pub mod telemetry;

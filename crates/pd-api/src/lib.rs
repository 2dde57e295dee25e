//! Plant diagnosis HTTP service, library half.
//!
//! Exposes the router, state and config so the binary (`main.rs`) and
//! `pd-e2e-tests` can build the service around any `DiagnosisEngine`.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

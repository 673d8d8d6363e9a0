//! HTTP service and load generator around the [`triage`] worker pool.
//!
//! Two binaries share this library:
//!
//! - `triage-server` exposes the pool over HTTP (`/api/v1/patients`,
//!   `/health`, `/metrics`, `/status`).
//! - `triage-loadtest` drives the pool in-process and compares the plain and
//!   recycling variants.

pub mod loadtest;
pub mod server;
pub mod telemetry;

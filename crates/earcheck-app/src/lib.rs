//! Earcheck App Services
//!
//! Progress persistence, settings, and the session controller that drives a
//! screening test from calibration to report.
//! Depends on the `earcheck` engine crate.

pub mod app;
pub mod config;
pub mod data;
pub mod error;

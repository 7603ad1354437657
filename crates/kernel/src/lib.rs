//! Atrium kernel library.
//!
//! Exposes the kernel for the `atrium` binary and for integration tests.

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod file;
pub mod form;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod session;
pub mod state;

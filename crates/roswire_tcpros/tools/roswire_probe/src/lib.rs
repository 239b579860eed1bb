//! roswire_probe: inspect and dump live TCPROS publisher endpoints.
//!
//! The binary lives in main.rs; config parsing is exposed here so the
//! integration tests can exercise it.

pub mod config;

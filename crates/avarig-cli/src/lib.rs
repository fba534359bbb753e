//! Avarig CLI library.
//!
//! Command implementations behind the `avarig` binary: skeleton inspection,
//! slider listing, shape editing and export, and clip encoding.

pub mod commands;
pub mod overrides;

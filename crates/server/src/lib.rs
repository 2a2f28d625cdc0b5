//! Gridgate server: HTTP/WebSocket surface over the session registry.
//!
//! The binary wires three pieces together: the collector (fed by the
//! control plane client in [`control`]), the query handlers in
//! [`service`], and the VNC relay in [`relay`].

pub mod config;
pub mod control;
pub mod logging;
pub mod relay;
pub mod service;

//! Gridgate runtime: the session registry and the machinery that keeps it
//! current.
//!
//! The registry ([`SessionStore`]) is a passive single-writer/multi-reader
//! store. Its one writer is the [`Collector`], a long-lived task that
//! reconciles the control plane's lifecycle event stream into registry
//! state. Session identifiers are derived deterministically from backend
//! addresses by [`ipid`].

pub mod collector;
pub mod error;
pub mod ipid;
pub mod source;
pub mod store;

pub use collector::Collector;
pub use error::{Error, Result};
pub use source::{EventSource, Subscription};
pub use store::SessionStore;

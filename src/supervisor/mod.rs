//! Supervision of derived alerts
//!
//! Gates each alert through its category cooldown and fans it out to the
//! alert sinks.

pub mod alert_dispatcher;

pub use alert_dispatcher::{AlertDispatcher, DispatchOutcome};

//! TCP connection admission gate.
//!
//! Accepts inbound TCP connections and admits or denies each one against
//! a static, ordered rule list matching on exact peer address and port.
//! First match wins; no match is a deny. Admitted connections are handed
//! to a [`handler::ConnectionHandler`]; denied connections are closed
//! immediately.

pub mod bootstrap;
pub mod config;
pub mod firewall;
pub mod handler;
pub mod listener;
pub mod telemetry;

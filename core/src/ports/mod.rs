//! Ports layer - Trait definitions (interfaces).
//!
//! This module defines the capability interfaces that the application layer
//! uses to reach the operating system. Implementations live in `adapters`.

mod resolver;
mod signaller;
mod socket_table;

pub use resolver::ProcessResolver;
pub use signaller::{Signal, Signaller};
pub use socket_table::{pids_for_port, SocketTable};

/// Everything a host OS backend has to provide.
///
/// Blanket-implemented for any type providing all three capabilities, so
/// services can take a single `B: Platform` parameter.
pub trait Platform: SocketTable + ProcessResolver + Signaller {}

impl<T> Platform for T where T: SocketTable + ProcessResolver + Signaller {}

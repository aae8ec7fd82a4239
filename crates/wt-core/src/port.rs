//! Local port selection
//!
//! Picks the port the web server binds when none is configured. The probe
//! binds and immediately releases a loopback listener, so another process
//! may take the port before the web server binds it. A later bind failure
//! surfaces as an ordinary web server error.

use std::net::{Ipv4Addr, TcpListener};

/// First port probed by [`find_available_port`]
pub const DEFAULT_PORT_RANGE_START: u16 = 8080;

/// Number of ports probed by [`find_available_port`]
pub const DEFAULT_PORT_RANGE_SIZE: u16 = 100;

/// Lowest free port in `[8080, 8180)`, or 8080 if none is free.
pub fn find_available_port() -> u16 {
    find_available_port_in(DEFAULT_PORT_RANGE_START, DEFAULT_PORT_RANGE_SIZE)
}

/// Lowest port in `[start, start + size)` that can be bound on loopback.
///
/// Falls back to `start` when every port in the range is taken. The result
/// is best-effort, not a reservation.
pub fn find_available_port_in(start: u16, size: u16) -> u16 {
    let end = start.saturating_add(size);
    if let Some(port) = (start..end).find(|&port| is_port_available(port)) {
        return port;
    }

    tracing::warn!(
        "No free port in {}..{}, falling back to {}",
        start,
        end,
        start
    );
    start
}

fn is_port_available(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
}

//! webssh-tunnel: command-line front end
//!
//! Parses flags, hands them to the configuration resolver and runs the
//! service until it stops.

pub mod cli;
pub mod output;

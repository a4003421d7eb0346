//! Adapters that talk to services outside the process.

pub mod remote;

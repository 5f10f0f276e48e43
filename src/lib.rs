// Skeptic: signal-fusion fake news verdicts.
//
// This is the library root. `signals` holds the independent scorers,
// `detector` fuses them and picks a backend at startup, and the remaining
// modules are the store and the surfaces around it.

pub mod config;
pub mod db;
pub mod detector;
pub mod input;
pub mod output;
pub mod pipeline;
pub mod signals;
pub mod status;

#[cfg(feature = "web")]
pub mod web;

//! mpv-voice-rs library crate
//!
//! Pull-based audio pipeline that plays any source through an external
//! decoder into a virtual sink, captures the sink and serves fixed-size Opus
//! frames, with a side channel for playback control.
//! The player binary is in main.rs.

#[macro_use]
extern crate log;

pub mod config;
pub mod constants;
pub mod control;
pub mod encoder;
pub mod error;
pub mod names;
pub mod pipeline;
pub mod process;
pub mod session;
pub mod sink;
pub mod source;
pub mod stdin;

#[cfg(test)]
mod stdin_tests;

//! Periodic ICMP echo over Ethernet for STM32 boards.
//!
//! The portable core (scheduler, ping workflow, smoltcp stack wrapper) builds
//! and tests on the host; `src/bin/ping.rs` wires it to embassy peripherals.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod app;
pub mod config;
pub mod diag;
pub mod error;
pub mod hardware;
pub mod net;
pub mod ping;
pub mod scheduler;

pub use app::PingApp;
pub use config::{AppConfig, NetConfig, PingConfig};
pub use error::{ConfigError, PingError, SchedulerError};
pub use net::{NetResources, NetStack};
pub use ping::{PingContext, PingOutcome, PingResult};
pub use scheduler::Scheduler;

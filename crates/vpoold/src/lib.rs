//! vpoold — configuration and wiring for the vpool daemon.
//!
//! [`Config`] loads the TOML file; [`Daemon`] builds an in-memory pool from
//! it and drives the scheduler and autoscaler over that pool.

pub mod config;
pub mod daemon;

pub use config::{Config, parse_duration};
pub use daemon::{Daemon, VPodReport};

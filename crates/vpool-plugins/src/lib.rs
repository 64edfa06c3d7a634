//! vpool-plugins — the filter/score extension points of the scheduler.
//!
//! A scheduling policy names an ordered list of filter plugins and a
//! weighted list of score plugins, each with an opaque JSON argument blob.
//! The scheduler resolves those names against a [`PluginRegistry`] that is
//! built once at startup and injected, so there is no global registration.
//!
//! # Components
//!
//! - **`status`** — outcome of a plugin invocation (`Success`, `Unschedulable`, `Error`)
//! - **`framework`** — `FilterPlugin` / `ScorePlugin` traits and `PodScore`
//! - **`args`** — strict argument decoding (unknown fields are rejected)
//! - **`registry`** — name → implementation map and policy validation
//! - **`plugins`** — built-in plugins

pub mod args;
pub mod error;
pub mod framework;
pub mod plugins;
pub mod registry;
pub mod status;

pub use args::{ERR_REASON_INVALID_ARG, SpreadArgs, decode_args};
pub use error::{PluginError, PluginResult};
pub use framework::{FilterPlugin, MAX_SCORE, PodScore, ScorePlugin};
pub use registry::PluginRegistry;
pub use status::{Code, Status};

//! Schema module - Configuration, episode and progress types for maze evolution.

mod config;
mod episode;
mod progress;

pub use config::*;
pub use episode::*;
pub use progress::*;

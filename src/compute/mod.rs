//! Compute module - Geometry, track generation, vehicles, controllers and the
//! evolution environment.

mod environment;
mod geometry;
mod network;
mod track;
mod vehicle;

pub mod evolution;

pub use environment::*;
pub use evolution::Genome;
pub use geometry::*;
pub use network::*;
pub use track::*;
pub use vehicle::*;

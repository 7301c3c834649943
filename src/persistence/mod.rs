//! Saving and loading trained agents.
//!
//! An agent is stored as its controller topology plus the flat genome,
//! which is enough to rebuild a `NeuralController`.
//!
//! # File Format
//!
//! ```text
//! Header (32 bytes):
//!   Magic: "MZAG" (4 bytes)
//!   Version: u16
//!   Flags: u16 (reserved, 0)
//!   Inputs: u32
//!   Hidden 1: u32
//!   Hidden 2: u32
//!   Outputs: u32 (always 2)
//!   Genome length: u64
//!
//! Genome (genome length * 8 bytes):
//!   f64 weights, layer by layer, row-major
//! ```

mod format;
mod record;

pub use format::{
    AGENT_MAGIC, AGENT_VERSION, AgentFormatError, AgentHeader, encode_genome, read_genome,
};
pub use record::{AgentRecord, load_from_file, save_to_file};

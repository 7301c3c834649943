//! Binary format for saved agents.
//!
//! Layout (all little-endian):
//! Magic(4) + Version(2) + Flags(2) + Inputs(4) + Hidden1(4) + Hidden2(4) +
//! Outputs(4) + GenomeLen(8), followed by `GenomeLen` f64 weights in
//! genome order.

use std::io::{self, Read, Write};

use crate::compute::{OUTPUT_SIZE, Topology};
use crate::schema::MAX_LAYER_WIDTH;

/// Magic bytes identifying a saved agent.
pub const AGENT_MAGIC: &[u8; 4] = b"MZAG";

/// Current format version.
pub const AGENT_VERSION: u16 = 1;

/// Errors raised while encoding, decoding or installing a saved agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentFormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid MZAG magic bytes: {0:?}")]
    BadMagic([u8; 4]),
    #[error("Unsupported MZAG version: {0}")]
    UnsupportedVersion(u16),
    #[error("Invalid topology {0:?}")]
    InvalidTopology(Topology),
    #[error("Genome length {actual} does not match topology (expected {expected})")]
    GenomeLength { expected: u64, actual: u64 },
    #[error("Blob truncated")]
    Truncated,
    #[error("{0} trailing bytes after genome")]
    TrailingBytes(usize),
    #[error("Agent topology {found:?} does not match environment topology {expected:?}")]
    TopologyMismatch { expected: Topology, found: Topology },
}

fn read_or_truncated<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), AgentFormatError> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => AgentFormatError::Truncated,
        _ => AgentFormatError::Io(e),
    })
}

/// Header preceding the genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentHeader {
    /// Reserved, written as zero.
    pub flags: u16,
    pub topology: Topology,
    pub genome_len: u64,
}

impl AgentHeader {
    /// Size of header in bytes.
    pub const SIZE: usize = 32;

    pub fn new(topology: Topology) -> Self {
        Self {
            flags: 0,
            topology,
            genome_len: topology.genome_len() as u64,
        }
    }

    /// Write header to output.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let t = &self.topology;
        w.write_all(AGENT_MAGIC)?;
        w.write_all(&AGENT_VERSION.to_le_bytes())?;
        w.write_all(&self.flags.to_le_bytes())?;
        for width in [t.inputs, t.hidden[0], t.hidden[1], t.outputs] {
            w.write_all(&(width as u32).to_le_bytes())?;
        }
        w.write_all(&self.genome_len.to_le_bytes())?;
        Ok(())
    }

    /// Read and validate a header.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, AgentFormatError> {
        let mut magic = [0u8; 4];
        read_or_truncated(r, &mut magic)?;
        if &magic != AGENT_MAGIC {
            return Err(AgentFormatError::BadMagic(magic));
        }

        let mut buf2 = [0u8; 2];
        let mut buf4 = [0u8; 4];
        let mut buf8 = [0u8; 8];

        read_or_truncated(r, &mut buf2)?;
        let version = u16::from_le_bytes(buf2);
        if version != AGENT_VERSION {
            return Err(AgentFormatError::UnsupportedVersion(version));
        }

        read_or_truncated(r, &mut buf2)?;
        let flags = u16::from_le_bytes(buf2);

        let mut widths = [0u32; 4];
        for width in &mut widths {
            read_or_truncated(r, &mut buf4)?;
            *width = u32::from_le_bytes(buf4);
        }
        let [inputs, h1, h2, outputs] = widths;
        let topology = Topology {
            inputs: inputs as usize,
            hidden: [h1 as usize, h2 as usize],
            outputs: outputs as usize,
        };
        let in_range = |w: u32| (1..=MAX_LAYER_WIDTH).contains(&(w as usize));
        if !widths.iter().all(|&w| in_range(w)) || topology.outputs != OUTPUT_SIZE {
            return Err(AgentFormatError::InvalidTopology(topology));
        }

        read_or_truncated(r, &mut buf8)?;
        let genome_len = u64::from_le_bytes(buf8);
        let expected = topology.genome_len() as u64;
        if genome_len != expected {
            return Err(AgentFormatError::GenomeLength {
                expected,
                actual: genome_len,
            });
        }

        Ok(Self {
            flags,
            topology,
            genome_len,
        })
    }
}

/// Encode genome weights to bytes.
pub fn encode_genome(genome: &[f64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(genome.len() * 8);
    for &v in genome {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Read `len` weights from input.
pub fn read_genome<R: Read>(r: &mut R, len: usize) -> Result<Vec<f64>, AgentFormatError> {
    let mut genome = Vec::with_capacity(len.min(1 << 16));
    let mut buf8 = [0u8; 8];
    for _ in 0..len {
        read_or_truncated(r, &mut buf8)?;
        genome.push(f64::from_le_bytes(buf8));
    }
    Ok(genome)
}

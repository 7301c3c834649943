//! Agent records and file helpers.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use super::format::{AgentFormatError, AgentHeader, encode_genome, read_genome};
use crate::compute::{Genome, NeuralController, OutputScale, Topology};

/// A controller reduced to what is needed to rebuild it.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRecord {
    pub topology: Topology,
    pub genome: Genome,
}

impl AgentRecord {
    pub fn from_controller(controller: &NeuralController) -> Self {
        Self {
            topology: controller.topology(),
            genome: controller.to_genome(),
        }
    }

    /// Rebuild a controller with the given output scale.
    pub fn to_controller(&self, scale: OutputScale) -> Result<NeuralController, AgentFormatError> {
        NeuralController::from_genome(self.topology, scale, &self.genome).map_err(|_| {
            AgentFormatError::GenomeLength {
                expected: self.topology.genome_len() as u64,
                actual: self.genome.len() as u64,
            }
        })
    }

    /// Write header and genome.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), AgentFormatError> {
        let header = AgentHeader::new(self.topology);
        if header.genome_len != self.genome.len() as u64 {
            return Err(AgentFormatError::GenomeLength {
                expected: header.genome_len,
                actual: self.genome.len() as u64,
            });
        }
        header.write_to(w)?;
        w.write_all(&encode_genome(&self.genome))?;
        Ok(())
    }

    /// Read header and genome.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, AgentFormatError> {
        let header = AgentHeader::read_from(r)?;
        let genome = read_genome(r, header.genome_len as usize)?;
        Ok(Self {
            topology: header.topology,
            genome,
        })
    }

    /// Encode as an in-memory blob.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AgentFormatError> {
        let mut buf = Vec::with_capacity(AgentHeader::SIZE + self.genome.len() * 8);
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Decode a blob, rejecting anything after the genome.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AgentFormatError> {
        let mut cursor = Cursor::new(bytes);
        let record = Self::read_from(&mut cursor)?;
        let trailing = bytes.len() - cursor.position() as usize;
        if trailing > 0 {
            return Err(AgentFormatError::TrailingBytes(trailing));
        }
        Ok(record)
    }
}

/// Save an agent to `path`.
pub fn save_to_file<P: AsRef<Path>>(path: P, record: &AgentRecord) -> Result<(), AgentFormatError> {
    let mut writer = BufWriter::new(File::create(path)?);
    record.write_to(&mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Load an agent from `path`.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<AgentRecord, AgentFormatError> {
    let mut bytes = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
    AgentRecord::from_bytes(&bytes)
}

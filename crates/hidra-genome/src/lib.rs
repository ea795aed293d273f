//! Gene bytecode data layer for the Hidra simulation engine
//!
//! A genome is a byte stream of gene segments separated by the two-byte
//! ASCII marker `GN`. Each segment decodes independently into a linear
//! instruction list; jump instructions carry a signed relative
//! displacement resolved against instruction starts. This crate owns the
//! opcode table, the decoder, and a programmatic builder; execution lives
//! in `hidra-world`.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod decode;
pub mod error;
pub mod opcode;

use std::sync::Arc;

pub use builder::{GeneBuilder, GenomeBuilder};
pub use decode::{decode_segment, DecodedGene, Instruction, Operand};
pub use error::{GenomeError, Result};
pub use opcode::Opcode;

/// Segment separator bytes: ASCII `GN`
pub const GENE_MARKER: [u8; 2] = [0x47, 0x4E];

/// Gene id of the Genesis gene, run once at world construction
pub const GENE_GENESIS: usize = 0;
/// Gene id of the Gestation gene, run on each newly created neuron
pub const GENE_GESTATION: usize = 1;
/// Gene id of the Mitosis gene, run on parent and child after a split
pub const GENE_MITOSIS: usize = 2;
/// Gene id of the Apoptosis gene, run on downstream neurons of a death
pub const GENE_APOPTOSIS: usize = 3;

/// One compiled gene: the decoded instruction list plus provenance.
#[derive(Debug, Clone)]
pub struct Gene {
    /// Gene id (segment index within the genome)
    pub id: usize,
    /// Decoded instructions, shared so execution can borrow the world
    pub instructions: Arc<[Instruction]>,
    /// Encoded segment length in bytes
    pub byte_len: usize,
}

/// A compiled genome: the raw byte stream plus its decoded gene table.
#[derive(Debug, Clone)]
pub struct Genome {
    bytes: Vec<u8>,
    genes: Vec<Gene>,
}

impl Genome {
    /// Compile a genome byte stream.
    ///
    /// Splits on every non-overlapping occurrence of [`GENE_MARKER`] and
    /// decodes each segment. Decode warnings are logged per gene; only a
    /// stream with no Genesis segment at all is rejected.
    pub fn compile(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(GenomeError::MissingGenesis);
        }

        let mut genes = Vec::new();
        for (id, segment) in split_segments(bytes).into_iter().enumerate() {
            let decoded = decode_segment(segment);
            for warning in &decoded.warnings {
                log::warn!("gene {id}: {warning}");
            }
            genes.push(Gene {
                id,
                instructions: decoded.instructions.into(),
                byte_len: segment.len(),
            });
        }

        Ok(Self {
            bytes: bytes.to_vec(),
            genes,
        })
    }

    /// The raw genome byte stream.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of genes in the genome.
    pub fn gene_count(&self) -> usize {
        self.genes.len()
    }

    /// Look up a gene by id.
    pub fn gene(&self, id: usize) -> Result<&Gene> {
        self.genes.get(id).ok_or(GenomeError::GeneNotFound {
            gene_id: id,
            gene_count: self.genes.len(),
        })
    }

    /// Iterate all genes in id order.
    pub fn genes(&self) -> impl Iterator<Item = &Gene> {
        self.genes.iter()
    }
}

/// Split a genome byte stream into gene segments.
fn split_segments(bytes: &[u8]) -> Vec<&[u8]> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == GENE_MARKER[0] && bytes[i + 1] == GENE_MARKER[1] {
            segments.push(&bytes[start..i]);
            i += 2;
            start = i;
        } else {
            i += 1;
        }
    }
    segments.push(&bytes[start..]);
    segments
}

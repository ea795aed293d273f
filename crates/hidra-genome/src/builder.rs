//! Programmatic genome assembly
//!
//! Tests and the CLI author genomes through this builder instead of a
//! textual assembler. Jumps are written against named labels and patched
//! when the segment is sealed.

use std::collections::HashMap;

use crate::error::GenomeError;
use crate::opcode::Opcode;
use crate::GENE_MARKER;

/// Builder for one gene segment.
#[derive(Debug, Default)]
pub struct GeneBuilder {
    bytes: Vec<u8>,
    labels: HashMap<String, usize>,
    // (patch offset, origin offset after the jump, label)
    fixups: Vec<(usize, usize, String)>,
}

impl GeneBuilder {
    /// Start an empty gene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operand-less opcode.
    pub fn op(mut self, opcode: Opcode) -> Self {
        debug_assert_eq!(opcode.operand_width(), 0, "use push_*/jump_* helpers");
        self.bytes.push(opcode.byte());
        self
    }

    /// Append `PUSH_BYTE value`.
    pub fn push_byte(mut self, value: u8) -> Self {
        self.bytes.push(Opcode::PushByte.byte());
        self.bytes.push(value);
        self
    }

    /// Append `PUSH_FLOAT value`.
    pub fn push_float(mut self, value: f32) -> Self {
        self.bytes.push(Opcode::PushFloat.byte());
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Record a label at the current position.
    pub fn label(mut self, name: impl Into<String>) -> Self {
        self.labels.insert(name.into(), self.bytes.len());
        self
    }

    /// Append a jump opcode targeting a label (forward or backward).
    pub fn jump(mut self, opcode: Opcode, label: impl Into<String>) -> Self {
        debug_assert!(opcode.is_jump(), "jump() requires a jump opcode");
        self.bytes.push(opcode.byte());
        let patch_at = self.bytes.len();
        self.bytes.push(0);
        self.fixups.push((patch_at, self.bytes.len(), label.into()));
        self
    }

    /// Seal the segment, resolving all label fixups.
    pub fn finish(mut self) -> Result<Vec<u8>, GenomeError> {
        for (patch_at, origin, label) in std::mem::take(&mut self.fixups) {
            let target = *self
                .labels
                .get(&label)
                .ok_or_else(|| GenomeError::UnknownLabel {
                    label: label.clone(),
                })?;
            let displacement = target as i64 - origin as i64;
            if displacement < i8::MIN as i64 || displacement > i8::MAX as i64 {
                return Err(GenomeError::JumpOutOfRange {
                    label,
                    displacement,
                });
            }
            self.bytes[patch_at] = (displacement as i8) as u8;
        }
        Ok(self.bytes)
    }
}

/// Builder for a whole genome (segments joined by the `GN` marker).
#[derive(Debug, Default)]
pub struct GenomeBuilder {
    segments: Vec<Vec<u8>>,
}

impl GenomeBuilder {
    /// Start an empty genome.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sealed gene segment.
    pub fn gene(mut self, bytes: Vec<u8>) -> Self {
        self.segments.push(bytes);
        self
    }

    /// Append an empty gene segment (decodes to zero instructions).
    pub fn empty_gene(mut self) -> Self {
        self.segments.push(Vec::new());
        self
    }

    /// Join the segments into the wire genome byte stream.
    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                out.extend_from_slice(&GENE_MARKER);
            }
            out.extend_from_slice(segment);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{decode_segment, Operand};

    #[test]
    fn test_linear_gene() {
        let bytes = GeneBuilder::new()
            .push_byte(2)
            .push_float(0.5)
            .op(Opcode::Mul)
            .op(Opcode::Halt)
            .finish()
            .unwrap();
        let gene = decode_segment(&bytes);
        assert_eq!(gene.len(), 4);
        assert!(gene.warnings.is_empty());
    }

    #[test]
    fn test_backward_label_jump() {
        let bytes = GeneBuilder::new()
            .label("top")
            .push_byte(1)
            .op(Opcode::Pop)
            .jump(Opcode::Jmp, "top")
            .finish()
            .unwrap();
        let gene = decode_segment(&bytes);
        match gene.instructions[2].operand {
            Operand::Jump { target, .. } => assert_eq!(target, Some(0)),
            other => panic!("expected jump, got {other:?}"),
        }
    }

    #[test]
    fn test_forward_label_jump() {
        let bytes = GeneBuilder::new()
            .push_byte(0)
            .jump(Opcode::Jz, "end")
            .push_byte(9)
            .op(Opcode::Pop)
            .label("end")
            .op(Opcode::Halt)
            .finish()
            .unwrap();
        let gene = decode_segment(&bytes);
        assert!(gene.warnings.is_empty());
        match gene.instructions[1].operand {
            Operand::Jump { target, .. } => assert_eq!(target, Some(4)),
            other => panic!("expected jump, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_label_rejected() {
        let result = GeneBuilder::new().jump(Opcode::Jmp, "nowhere").finish();
        assert!(matches!(result, Err(GenomeError::UnknownLabel { .. })));
    }

    #[test]
    fn test_genome_marker_join() {
        let genome = GenomeBuilder::new()
            .gene(vec![Opcode::Halt.byte()])
            .empty_gene()
            .gene(vec![Opcode::Nop.byte()])
            .finish();
        assert_eq!(genome, vec![0x3F, 0x47, 0x4E, 0x47, 0x4E, 0x00]);
    }
}

//! Two-pass instruction decoder for gene segments

use crate::opcode::Opcode;

/// Operand attached to a decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    /// No operand bytes
    None,
    /// Unsigned byte payload (PUSH_BYTE)
    Byte(u8),
    /// Little-endian float payload (PUSH_FLOAT)
    Float(f32),
    /// Signed relative jump displacement, resolved to an instruction
    /// index in pass 2; `target` is None when resolution failed and the
    /// jump executes as a no-op
    Jump {
        /// Raw signed displacement, measured from the next instruction
        displacement: i8,
        /// Index into the instruction list, if the target is valid
        target: Option<usize>,
    },
}

/// One decoded instruction of a gene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instruction {
    /// Byte offset of the opcode within its segment
    pub byte_offset: usize,
    /// The opcode
    pub opcode: Opcode,
    /// Decoded operand
    pub operand: Operand,
    /// Encoded size in bytes (opcode plus operand)
    pub size: usize,
}

/// Outcome of decoding one gene segment.
#[derive(Debug, Clone)]
pub struct DecodedGene {
    /// Instruction list in program order
    pub instructions: Vec<Instruction>,
    /// Human-readable decode warnings (bad jump targets, truncated
    /// operands, unassigned opcode bytes)
    pub warnings: Vec<String>,
}

impl DecodedGene {
    /// Number of instructions in the gene.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the gene decodes to no instructions at all.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Decode a single gene segment.
///
/// Pass 1 walks the bytes linearly, emitting one [`Instruction`] per
/// assigned opcode. Unassigned opcode bytes decode to a warned `Nop` so a
/// malformed byte never desynchronizes the rest of the segment by more
/// than itself. A truncated trailing operand ends the segment with a
/// warning. Pass 2 resolves each jump displacement against the recorded
/// byte offsets; a displacement that does not land on an instruction
/// start leaves the jump unresolved (it executes as a no-op).
pub fn decode_segment(bytes: &[u8]) -> DecodedGene {
    let mut instructions = Vec::new();
    let mut warnings = Vec::new();
    let mut jump_sources = Vec::new();

    // Pass 1: linear walk
    let mut offset = 0;
    while offset < bytes.len() {
        let raw = bytes[offset];
        let opcode = match Opcode::from_byte(raw) {
            Some(op) => op,
            None => {
                warnings.push(format!(
                    "unassigned opcode byte 0x{raw:02X} at offset {offset}, treated as NOP"
                ));
                instructions.push(Instruction {
                    byte_offset: offset,
                    opcode: Opcode::Nop,
                    operand: Operand::None,
                    size: 1,
                });
                offset += 1;
                continue;
            }
        };

        let width = opcode.operand_width();
        if offset + 1 + width > bytes.len() {
            warnings.push(format!(
                "truncated operand for {} at offset {offset}",
                opcode.mnemonic()
            ));
            break;
        }

        let operand = match opcode {
            Opcode::PushByte => Operand::Byte(bytes[offset + 1]),
            Opcode::PushFloat => {
                let raw: [u8; 4] = bytes[offset + 1..offset + 5].try_into().unwrap();
                Operand::Float(f32::from_le_bytes(raw))
            }
            op if op.is_jump() => {
                jump_sources.push(instructions.len());
                Operand::Jump {
                    displacement: bytes[offset + 1] as i8,
                    target: None,
                }
            }
            _ => Operand::None,
        };

        instructions.push(Instruction {
            byte_offset: offset,
            opcode,
            operand,
            size: opcode.size(),
        });
        offset += opcode.size();
    }

    // Pass 2: resolve jump targets by byte offset
    for &idx in &jump_sources {
        let instr = instructions[idx];
        let displacement = match instr.operand {
            Operand::Jump { displacement, .. } => displacement,
            _ => continue,
        };
        let origin = instr.byte_offset as i64 + instr.size as i64;
        let target_offset = origin + displacement as i64;

        let resolved = if target_offset < 0 {
            None
        } else if target_offset as usize == offset {
            // Jumping to the end of the segment is an explicit halt
            Some(instructions.len())
        } else {
            instructions
                .binary_search_by_key(&(target_offset as usize), |i| i.byte_offset)
                .ok()
        };

        if resolved.is_none() {
            warnings.push(format!(
                "{} at offset {} jumps to invalid byte offset {}, treated as NOP",
                instr.opcode.mnemonic(),
                instr.byte_offset,
                target_offset
            ));
        }
        if let Operand::Jump { target, .. } = &mut instructions[idx].operand {
            *target = resolved;
        }
    }

    DecodedGene {
        instructions,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_linear_segment() {
        // PUSH_BYTE 3, PUSH_BYTE 4, ADD, HALT
        let bytes = [0x01, 3, 0x01, 4, 0x10, 0x3F];
        let gene = decode_segment(&bytes);
        assert!(gene.warnings.is_empty());
        assert_eq!(gene.len(), 4);
        assert_eq!(gene.instructions[0].operand, Operand::Byte(3));
        assert_eq!(gene.instructions[2].opcode, Opcode::Add);
        assert_eq!(gene.instructions[2].byte_offset, 4);
    }

    #[test]
    fn test_decode_push_float() {
        let mut bytes = vec![0x02];
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        let gene = decode_segment(&bytes);
        assert_eq!(gene.len(), 1);
        assert_eq!(gene.instructions[0].operand, Operand::Float(1.5));
        assert_eq!(gene.instructions[0].size, 5);
    }

    #[test]
    fn test_forward_jump_resolution() {
        // JMP +1 (skips the NOP), NOP, HALT
        let bytes = [0x32, 1, 0x00, 0x3F];
        let gene = decode_segment(&bytes);
        assert!(gene.warnings.is_empty());
        match gene.instructions[0].operand {
            Operand::Jump { target, .. } => assert_eq!(target, Some(2)),
            other => panic!("expected jump operand, got {other:?}"),
        }
    }

    #[test]
    fn test_backward_jump_resolution() {
        // NOP, NOP, JMP -4 (back to first NOP)
        let bytes = [0x00, 0x00, 0x32, 0xFC];
        let gene = decode_segment(&bytes);
        assert!(gene.warnings.is_empty());
        match gene.instructions[2].operand {
            Operand::Jump { target, .. } => assert_eq!(target, Some(0)),
            other => panic!("expected jump operand, got {other:?}"),
        }
    }

    #[test]
    fn test_jump_to_segment_end_is_halt() {
        // JMP +1 past the final NOP
        let bytes = [0x32, 1, 0x00];
        let gene = decode_segment(&bytes);
        match gene.instructions[0].operand {
            Operand::Jump { target, .. } => assert_eq!(target, Some(2)),
            other => panic!("expected jump operand, got {other:?}"),
        }
    }

    #[test]
    fn test_jump_into_operand_is_warned_noop() {
        // JMP +2 would land inside the PUSH_FLOAT operand
        let mut bytes = vec![0x32, 2, 0x02];
        bytes.extend_from_slice(&0.0f32.to_le_bytes());
        let gene = decode_segment(&bytes);
        assert_eq!(gene.warnings.len(), 1);
        match gene.instructions[0].operand {
            Operand::Jump { target, .. } => assert_eq!(target, None),
            other => panic!("expected jump operand, got {other:?}"),
        }
    }

    #[test]
    fn test_jump_extreme_displacements() {
        // 126 NOPs then JMP -128 lands exactly on the first NOP
        let mut bytes = vec![0x00; 126];
        bytes.push(0x32);
        bytes.push((-128i8) as u8);
        let gene = decode_segment(&bytes);
        assert!(gene.warnings.is_empty());
        match gene.instructions[126].operand {
            Operand::Jump { target, .. } => assert_eq!(target, Some(0)),
            other => panic!("expected jump operand, got {other:?}"),
        }

        // JMP +127 over exactly 127 NOPs lands on the HALT
        let mut bytes = vec![0x32, 127];
        bytes.extend(vec![0x00; 127]);
        bytes.push(0x3F);
        let gene = decode_segment(&bytes);
        assert!(gene.warnings.is_empty());
        match gene.instructions[0].operand {
            Operand::Jump { target, .. } => assert_eq!(target, Some(128)),
            other => panic!("expected jump operand, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_operand() {
        let bytes = [0x00, 0x02, 0x01];
        let gene = decode_segment(&bytes);
        assert_eq!(gene.len(), 1);
        assert_eq!(gene.warnings.len(), 1);
        assert!(gene.warnings[0].contains("truncated"));
    }

    #[test]
    fn test_unassigned_byte_becomes_nop() {
        let bytes = [0xEE, 0x3F];
        let gene = decode_segment(&bytes);
        assert_eq!(gene.len(), 2);
        assert_eq!(gene.instructions[0].opcode, Opcode::Nop);
        assert_eq!(gene.warnings.len(), 1);
    }

    #[test]
    fn test_empty_segment() {
        let gene = decode_segment(&[]);
        assert!(gene.is_empty());
        assert!(gene.warnings.is_empty());
    }
}

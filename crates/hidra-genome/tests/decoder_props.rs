//! Property tests for the gene decoder

use hidra_genome::{decode_segment, Genome, Operand};
use proptest::prelude::*;

proptest! {
    #[test]
    fn decoder_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let gene = decode_segment(&bytes);
        // Offsets must be strictly increasing and within the segment
        let mut last_end = 0;
        for instr in &gene.instructions {
            prop_assert_eq!(instr.byte_offset, last_end);
            last_end = instr.byte_offset + instr.size;
        }
        prop_assert!(last_end <= bytes.len());
    }

    #[test]
    fn resolved_jumps_land_on_instruction_starts(
        bytes in proptest::collection::vec(any::<u8>(), 0..512)
    ) {
        let gene = decode_segment(&bytes);
        let len = gene.instructions.len();
        for instr in &gene.instructions {
            if let Operand::Jump { target: Some(t), .. } = instr.operand {
                // A resolved target indexes an instruction or the halt
                // position one past the end
                prop_assert!(t <= len);
            }
        }
    }

    #[test]
    fn compile_accepts_any_nonempty_stream(
        bytes in proptest::collection::vec(any::<u8>(), 1..512)
    ) {
        let genome = Genome::compile(&bytes).unwrap();
        prop_assert!(genome.gene_count() >= 1);
        prop_assert_eq!(genome.bytes(), bytes.as_slice());
    }
}

//! Error types for genome decoding and assembly

use thiserror::Error;

/// Result type for genome operations
pub type Result<T> = std::result::Result<T, GenomeError>;

/// Errors raised while decoding or assembling genomes
#[derive(Error, Debug)]
pub enum GenomeError {
    /// The genome has no Genesis segment (gene 0)
    #[error("Genome is missing the Genesis gene (id 0)")]
    MissingGenesis,

    /// A requested gene id is not present in the genome
    #[error("Gene {gene_id} not found (genome has {gene_count} genes)")]
    GeneNotFound {
        /// Requested gene id
        gene_id: usize,
        /// Number of genes in the genome
        gene_count: usize,
    },

    /// A builder jump references a label that was never defined
    #[error("Jump references unknown label '{label}'")]
    UnknownLabel {
        /// Label name
        label: String,
    },

    /// A builder jump displacement exceeds the signed 8-bit range
    #[error("Jump to label '{label}' needs displacement {displacement}, outside the signed 8-bit range")]
    JumpOutOfRange {
        /// Label name
        label: String,
        /// Required displacement in bytes
        displacement: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GenomeError::GeneNotFound {
            gene_id: 7,
            gene_count: 4,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Gene 7"));
        assert!(msg.contains("4 genes"));
    }
}

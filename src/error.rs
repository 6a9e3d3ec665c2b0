use crate::{GenomeId, NodeId};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("genome {genome} is not part of the graph")]
    InvalidSubset { genome: GenomeId },

    #[error("unknown genome {0:?}")]
    UnknownGenome(String),

    #[error("genome subset is empty")]
    EmptySubset,

    #[error("no genomes found: the graph has no paths, walks or ORI tags")]
    NoGenomes,

    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("node {0} is not a bubble")]
    NotABubble(NodeId),

    #[error("worker failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, Error>;

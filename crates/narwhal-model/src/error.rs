use crate::CellId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("cell handle {0:?} is stale or was never allocated")]
    StaleCell(CellId),
    #[error("{0:?} is not part of the model")]
    NotInModel(CellId),
    #[error("child index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("inserting {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: CellId, child: CellId },
    #[error("{0:?} is not an edge")]
    NotAnEdge(CellId),
    #[error("{0:?} is part of the model; only detached cells can be edited directly")]
    Attached(CellId),
    #[error("{0:?} still has connected edges registered in live terminals")]
    StillConnected(CellId),
    #[error("undo history cannot move while a transaction is open")]
    TransactionOpen,
    #[error("end_update called without a matching begin_update")]
    NoTransaction,
    #[error("clone mapping sends more than one cell to {0:?}")]
    ConflictingMapping(CellId),
    #[error("model invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;

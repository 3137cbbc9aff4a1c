use narwhal_model::CellId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Model(#[from] narwhal_model::Error),
    #[error("invalid graph configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("edge {0:?} would be left without a terminal and dangling edges are not allowed")]
    DanglingEdge(CellId),
    #[error("{0:?} does not accept connections")]
    NotConnectable(CellId),
}

pub type Result<T> = std::result::Result<T, Error>;

use crate::cell::CellId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Routing(#[from] trellis_routing::Error),

    #[error("invalid path: {message}")]
    InvalidPath { message: String },

    #[error("cannot traverse `{segment}` at `{path}`: not an object or array")]
    PathTypeMismatch { path: String, segment: String },

    #[error("attribute `{key}` cannot be changed")]
    ImmutableAttribute { key: String },

    #[error("invalid `{key}` attribute: {message}")]
    InvalidAttribute { key: String, message: String },

    #[error("element {id} has more than one port with id `{port}`")]
    DuplicatePortId { id: CellId, port: String },

    #[error("cell {id} is not in the graph")]
    NotInGraph { id: CellId },

    #[error("cell {id} is not an element")]
    NotAnElement { id: CellId },

    #[error("cell {id} is not a link")]
    NotALink { id: CellId },

    #[error("cannot embed {child} into {parent}: recursive embedding")]
    RecursiveEmbedding { parent: CellId, child: CellId },

    #[error("cannot embed {child}: already embedded in {current}")]
    AlreadyEmbedded { child: CellId, current: CellId },

    #[error("invalid cell type: {message}")]
    InvalidCellType { message: String },

    #[error("invalid cell JSON: {message}")]
    InvalidCell { message: String },

    #[error("graph JSON must contain a `cells` array")]
    MissingCells,

    #[error("link {id} rejected by the `{rule}` validation")]
    ValidationFailed { rule: &'static str, id: CellId },
}

pub type Result<T> = std::result::Result<T, Error>;

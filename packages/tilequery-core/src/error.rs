use thiserror::Error;

/// Failures while turning tile bytes into layers and geometries.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Error decompressing tile data: {0}")]
    Decompress(#[from] std::io::Error),

    #[error("Error decoding vector tile: {0}")]
    Protobuf(String),

    #[error("Missing geometry field in feature")]
    MissingGeometry,

    #[error("Feature has an odd number of tags in layer '{layer}'")]
    UnpairedTags { layer: String },

    #[error("Tag index {index} out of range in layer '{layer}'")]
    TagOutOfRange { layer: String, index: u32 },

    #[error("Property value without a set field in layer '{layer}'")]
    EmptyValue { layer: String },

    #[error("Invalid geometry: {0}")]
    Geometry(String),
}

/// Malformed basic-filter expressions, reported before any feature is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("filters must be of the form [parameter, condition, value]")]
    Shape,

    #[error("parameter filter value must be a string")]
    Parameter,

    #[error("condition filter value must be =, !=, <, <=, >, or >=")]
    Condition,

    #[error("value filter value must be a number or boolean")]
    Value,

    #[error("basic-filters must be of the form ['all' | 'any', [filters]]")]
    Combinator,
}

/// The single structured error a query can produce.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Invalid query options: {0}")]
    Options(#[from] serde_json::Error),

    #[error("Tile worker failed: {0}")]
    Worker(String),
}

impl QueryError {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Decode(_) => "decode",
            QueryError::Filter(_) => "filter",
            QueryError::Options(_) => "options",
            QueryError::Worker(_) => "worker",
        }
    }
}

pub type Result<T, E = QueryError> = std::result::Result<T, E>;

use std::path::PathBuf;

use thiserror::Error;

use postvault_db::DbError;

#[derive(Debug, Error)]
pub enum IngestError {
    /// The record carries no usable identity key in any known shape.
    /// Recoverable: the record is skipped and counted as an error.
    #[error("no usable identity key in record")]
    MissingIdentity,

    /// The allocator kept colliding with existing IDs. Aborts only the
    /// record (or run) being allocated for.
    #[error("could not allocate a unique '{prefix}' id after {attempts} attempts")]
    IdAllocation { prefix: &'static str, attempts: u32 },

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("failed to read records from {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

//! Pipeline error taxonomy.
//!
//! Every stage of the ingestion pipeline fails with a [`PipelineError`]
//! variant; the first failure aborts the remaining stages for that upload.
//! Nothing is retried at this level — HTTP-level backoff lives inside the
//! oracle and embedding clients.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Unpacking produced zero recognized documents. Raised before any
    /// oracle call is made.
    #[error("no recognized documents found under {dir}")]
    NoDocumentsFound { dir: PathBuf },

    /// The oracle's output failed JSON/schema validation. Terminal for the
    /// upload attempt; never substituted with an empty record.
    #[error("oracle returned a malformed payload: {reason}")]
    OracleMalformedResponse { reason: String },

    /// The oracle (or embedding endpoint) could not be reached, timed out,
    /// or kept failing after retries.
    #[error("oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// Building or persisting the semantic index failed. Partial artifacts
    /// are purged so a later load can never see them.
    #[error("index build failed: {0}")]
    IndexBuildFailure(String),

    /// No persisted index exists for the given upload identity.
    #[error("no index found for upload {id}")]
    IndexNotFound { id: String },

    /// An index directory exists but is not loadable.
    #[error("index at {dir} is corrupt: {reason}")]
    IndexCorrupt { dir: PathBuf, reason: String },

    /// The final record insert failed. The already-persisted index is not
    /// rolled back.
    #[error("record store write failed: {0}")]
    RepositoryWriteFailure(#[from] sqlx::Error),

    /// The uploaded file is not a zip bundle, PDF, or supported image.
    #[error("unsupported upload kind: {0}")]
    UnsupportedUpload(PathBuf),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

//! Query engine gateway: ask questions of a persisted index.
//!
//! The gateway never touches staging or extraction state; it only needs
//! the identity's index directory and the retrieval configuration. Free-text
//! questions return the oracle's prose answer, structured queries decode
//! into the property schema.

use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::extract::{decode_property_fields, schema_directive};
use crate::index;
use crate::models::{PropertyFields, UploadIdentity};
use crate::oracle::{Oracle, OracleRequest};

/// Answer to one query.
#[derive(Debug, Clone)]
pub enum QueryAnswer {
    Text(String),
    Structured(PropertyFields),
}

/// Answer `question` against the identity's index.
///
/// With `structured` set, the schema directive is appended and the response
/// is decoded into [`PropertyFields`]; a response that does not decode is
/// [`PipelineError::OracleMalformedResponse`], never a best-effort result.
pub async fn answer(
    config: &Config,
    oracle: &dyn Oracle,
    embedder: &dyn Embedder,
    id: &UploadIdentity,
    question: &str,
    structured: bool,
) -> Result<QueryAnswer, PipelineError> {
    let index = index::load(config, id)?;

    let query_vecs = embedder
        .embed(&[question.to_string()])
        .await
        .map_err(|e| PipelineError::OracleUnavailable(format!("query embedding failed: {}", e)))?;
    let context = index.context_text(&query_vecs[0], config.retrieval.top_k);

    tracing::debug!(
        upload = %id,
        chunks = index.chunk_count(),
        "retrieved context for query"
    );

    let instruction = if structured {
        format!("{}\n\n{}", question, schema_directive())
    } else {
        question.to_string()
    };

    let response = oracle
        .generate(&OracleRequest {
            instruction,
            context: Some(context),
            image: None,
            json_output: structured,
        })
        .await?;

    if structured {
        Ok(QueryAnswer::Structured(decode_property_fields(&response)?))
    } else {
        Ok(QueryAnswer::Text(response))
    }
}

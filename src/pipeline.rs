//! Ingestion pipeline: one uploaded file in, one index and one record out.
//!
//! Stages run strictly in order — stage, unpack, extract, index, persist —
//! and every upload is scoped by a freshly minted [`UploadIdentity`]. The
//! staging copy and the extraction working directory are transient and are
//! removed whether the upload succeeds or fails; only the index directory
//! and the repository row survive.

use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::extract::{
    decode_property_fields, decode_report_fields, image_instruction, property_details_instruction,
};
use crate::index::{self, CorpusDocument};
use crate::models::{
    DocumentKind, ExtractedFields, PropertyFields, StructuredRecord, UploadIdentity,
};
use crate::oracle::{ImageAttachment, Oracle, OracleRequest};
use crate::{repo, unpack};

/// What a successful ingestion produced.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub upload_id: UploadIdentity,
    pub index_dir: PathBuf,
    pub documents: usize,
    pub chunks: usize,
    pub report_type: Option<String>,
}

enum UploadKind {
    Archive,
    Pdf,
    Image,
}

fn classify(file: &Path) -> Result<UploadKind, PipelineError> {
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    if ext.as_deref() == Some("zip") {
        return Ok(UploadKind::Archive);
    }
    match DocumentKind::from_path(file) {
        Some(DocumentKind::Pdf) => Ok(UploadKind::Pdf),
        Some(DocumentKind::Image) => Ok(UploadKind::Image),
        None => Err(PipelineError::UnsupportedUpload(file.to_path_buf())),
    }
}

/// Run the full pipeline for one uploaded file.
///
/// Transient directories are removed on success and on failure. An index
/// built before an extraction failure is torn down again; only a failure
/// of the final record insert leaves the index standing.
pub async fn ingest(
    config: &Config,
    oracle: &dyn Oracle,
    embedder: &dyn Embedder,
    pool: &SqlitePool,
    file: &Path,
) -> Result<IngestReport, PipelineError> {
    let kind = classify(file)?;
    let id = UploadIdentity::mint();

    let staging = config.storage.uploads_root.join("staging").join(id.as_str());
    let workdir = config
        .storage
        .uploads_root
        .join("extracted")
        .join(id.as_str());

    tracing::info!(upload = %id, file = %file.display(), "starting ingestion");

    let result = run(config, oracle, embedder, pool, file, kind, &id, &staging, &workdir).await;

    for dir in [&staging, &workdir] {
        if let Err(e) = unpack::remove_workdir(dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to clean up working directory");
        }
    }

    result
}

#[allow(clippy::too_many_arguments)]
async fn run(
    config: &Config,
    oracle: &dyn Oracle,
    embedder: &dyn Embedder,
    pool: &SqlitePool,
    file: &Path,
    kind: UploadKind,
    id: &UploadIdentity,
    staging: &Path,
    workdir: &Path,
) -> Result<IngestReport, PipelineError> {
    let source_name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| PipelineError::UnsupportedUpload(file.to_path_buf()))?;

    std::fs::create_dir_all(staging)?;
    let staged = staging.join(&source_name);
    std::fs::copy(file, &staged)?;

    // Build the index corpus; image uploads also produce their field set here.
    let (corpus, extracted): (Vec<CorpusDocument>, Option<ExtractedFields>) = match kind {
        UploadKind::Archive => {
            unpack::extract_archive(&staged, workdir)?;
            let documents = unpack::discover_documents(workdir, &config.unpack.include_globs)?;
            tracing::info!(upload = %id, documents = documents.len(), "unpacked archive");
            let corpus = documents
                .iter()
                .filter(|d| d.kind == DocumentKind::Pdf)
                .filter_map(|d| {
                    read_pdf_text(&d.path).map(|text| CorpusDocument {
                        name: d.file_name(),
                        text,
                    })
                })
                .collect();
            (corpus, None)
        }
        UploadKind::Pdf => {
            let text = read_pdf_text(&staged).unwrap_or_default();
            (
                vec![CorpusDocument {
                    name: source_name.clone(),
                    text,
                }],
                None,
            )
        }
        UploadKind::Image => {
            let fields = extract_image_fields(oracle, &staged).await?;
            tracing::info!(
                upload = %id,
                report_type = fields.report_type().unwrap_or("?"),
                fields = fields.len(),
                "extracted fields from image"
            );
            let corpus = vec![CorpusDocument {
                name: source_name.clone(),
                text: fields.corpus_text(),
            }];
            (corpus, Some(fields))
        }
    };

    let documents = corpus.len();
    let summary = index::build(config, embedder, id, &corpus).await?;

    // Structured extraction for document-set uploads runs against the index
    // just built; a failure here tears the index back down. A failure of
    // the final insert does not — the index stays valid either way.
    let extraction = match extracted {
        Some(fields) => Ok((
            fields.report_type().map(str::to_string),
            PropertyFields::from_map(fields.as_map()),
            fields.to_json_string(),
        )),
        None => structured_extraction(config, oracle, embedder, id)
            .await
            .map(|fields| {
                let json = serde_json::to_string(&fields).unwrap_or_else(|_| "{}".to_string());
                (None, fields, json)
            }),
    };

    let (report_type, fields, fields_json) = match extraction {
        Ok(parts) => parts,
        Err(e) => {
            if let Err(cleanup) = std::fs::remove_dir_all(&summary.dir) {
                tracing::warn!(dir = %summary.dir.display(), error = %cleanup, "failed to remove index after extraction failure");
            }
            return Err(e);
        }
    };

    let record = StructuredRecord {
        upload_id: id.as_str().to_string(),
        index_dir: summary.dir.display().to_string(),
        source_file: source_name.to_string(),
        report_type: report_type.clone(),
        fields,
        fields_json,
        created_at: chrono::Utc::now().timestamp(),
    };

    repo::save(pool, &record).await?;
    tracing::info!(upload = %id, "saved structured record");

    Ok(IngestReport {
        upload_id: id.clone(),
        index_dir: summary.dir,
        documents,
        chunks: summary.chunks,
        report_type,
    })
}

/// Document-set mode: retrieve context from the freshly built index and ask
/// the oracle for the full property schema in one structured call.
async fn structured_extraction(
    config: &Config,
    oracle: &dyn Oracle,
    embedder: &dyn Embedder,
    id: &UploadIdentity,
) -> Result<PropertyFields, PipelineError> {
    let instruction = property_details_instruction();

    let index = index::load(config, id)?;
    let query_vecs = embedder
        .embed(&[instruction.clone()])
        .await
        .map_err(|e| PipelineError::OracleUnavailable(format!("query embedding failed: {}", e)))?;
    let context = index.context_text(&query_vecs[0], config.retrieval.top_k);

    let response = oracle
        .generate(&OracleRequest {
            instruction,
            context: Some(context),
            image: None,
            json_output: true,
        })
        .await?;

    decode_property_fields(&response)
}

/// Image single-shot mode: one oracle call with the attached image, decoded
/// into the flat field set.
async fn extract_image_fields(
    oracle: &dyn Oracle,
    image_path: &Path,
) -> Result<ExtractedFields, PipelineError> {
    let attachment = ImageAttachment::from_file(image_path)?;
    let response = oracle
        .generate(&OracleRequest {
            instruction: image_instruction(),
            context: None,
            image: Some(attachment),
            json_output: true,
        })
        .await?;
    decode_report_fields(&response)
}

fn read_pdf_text(path: &Path) -> Option<String> {
    match pdf_extract::extract_text(path) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(file = %path.display(), error = %e, "failed to extract PDF text, skipping");
            None
        }
    }
}

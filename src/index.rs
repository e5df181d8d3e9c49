//! Semantic index builder and loader.
//!
//! An index is a self-describing directory — `manifest.json`, `chunks.json`,
//! `vectors.bin` — that a separate process can reload given only the path.
//! The layout is a long-term compatibility contract: anything written here
//! must stay loadable indefinitely, which is why the manifest carries a
//! format version and the embedding model/dims it was built with.
//!
//! Persistence is atomic from the caller's point of view: files are written
//! into a `.tmp-<id>` sibling and renamed into place only once complete, so
//! a partial write can never be mistaken for a valid index.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use crate::error::PipelineError;
use crate::models::{Chunk, UploadIdentity};

pub const FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";
const CHUNKS_FILE: &str = "chunks.json";
const VECTORS_FILE: &str = "vectors.bin";

/// On-disk index metadata. Everything a loader needs to validate the
/// directory without trusting its file sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub embedding_model: String,
    pub dims: usize,
    pub chunk_count: usize,
    pub documents: Vec<String>,
    pub created_at: i64,
}

/// One document of the corpus an index is built over.
#[derive(Debug, Clone)]
pub struct CorpusDocument {
    pub name: String,
    pub text: String,
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub dir: PathBuf,
    pub chunks: usize,
}

/// A loaded, read-only index.
#[derive(Debug)]
pub struct SemanticIndex {
    pub manifest: IndexManifest,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

/// The single trusted identity → path indirection for index storage.
pub fn index_dir(config: &Config, id: &UploadIdentity) -> PathBuf {
    config.storage.indexes_root.join(id.as_str())
}

/// Build and persist the index for one upload.
///
/// Fails with [`PipelineError::IndexBuildFailure`] if the corpus has no
/// extractable text, embedding fails, an index already exists for this
/// identity, or any write fails. On failure the temporary directory is
/// purged; the final path either holds a complete index or nothing.
pub async fn build(
    config: &Config,
    embedder: &dyn Embedder,
    id: &UploadIdentity,
    corpus: &[CorpusDocument],
) -> Result<IndexSummary, PipelineError> {
    let build_err = |reason: String| PipelineError::IndexBuildFailure(reason);

    let mut chunks: Vec<Chunk> = Vec::new();
    for doc in corpus {
        let start = chunks.len() as i64;
        chunks.extend(chunk_text(
            &doc.name,
            &doc.text,
            config.chunking.max_tokens,
            start,
        ));
    }
    if chunks.is_empty() {
        return Err(build_err("corpus contains no extractable text".to_string()));
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder
        .embed(&texts)
        .await
        .map_err(|e| build_err(format!("embedding failed: {}", e)))?;

    if vectors.len() != chunks.len() {
        return Err(build_err(format!(
            "embedder returned {} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != embedder.dims()) {
        return Err(build_err(format!(
            "embedder returned a {}-dim vector, expected {}",
            bad.len(),
            embedder.dims()
        )));
    }

    let final_dir = index_dir(config, id);
    if final_dir.exists() {
        return Err(build_err(format!(
            "index already exists for upload {}",
            id
        )));
    }

    let manifest = IndexManifest {
        format_version: FORMAT_VERSION,
        embedding_model: embedder.model_name().to_string(),
        dims: embedder.dims(),
        chunk_count: chunks.len(),
        documents: corpus.iter().map(|d| d.name.clone()).collect(),
        created_at: chrono::Utc::now().timestamp(),
    };

    let tmp_dir = config
        .storage
        .indexes_root
        .join(format!(".tmp-{}", id.as_str()));

    let write_result = write_index_files(&tmp_dir, &manifest, &chunks, &vectors)
        .and_then(|_| std::fs::rename(&tmp_dir, &final_dir));

    if let Err(e) = write_result {
        let _ = std::fs::remove_dir_all(&tmp_dir);
        return Err(build_err(format!("persisting index failed: {}", e)));
    }

    tracing::info!(
        upload = %id,
        chunks = chunks.len(),
        dir = %final_dir.display(),
        "persisted semantic index"
    );

    Ok(IndexSummary {
        dir: final_dir,
        chunks: chunks.len(),
    })
}

fn write_index_files(
    dir: &Path,
    manifest: &IndexManifest,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;

    let manifest_json = serde_json::to_vec_pretty(manifest)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(dir.join(MANIFEST_FILE), manifest_json)?;

    let chunks_json = serde_json::to_vec(chunks)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(dir.join(CHUNKS_FILE), chunks_json)?;

    let mut blob = Vec::with_capacity(vectors.len() * manifest.dims * 4);
    for vec in vectors {
        blob.extend_from_slice(&vec_to_blob(vec));
    }
    std::fs::write(dir.join(VECTORS_FILE), blob)?;

    Ok(())
}

/// Reload a persisted index. Missing directory → [`PipelineError::IndexNotFound`];
/// anything unreadable or inconsistent → [`PipelineError::IndexCorrupt`].
/// Loading never mutates the directory.
pub fn load(config: &Config, id: &UploadIdentity) -> Result<SemanticIndex, PipelineError> {
    let dir = index_dir(config, id);
    if !dir.exists() {
        return Err(PipelineError::IndexNotFound {
            id: id.as_str().to_string(),
        });
    }

    let corrupt = |reason: String| PipelineError::IndexCorrupt {
        dir: dir.clone(),
        reason,
    };

    let manifest_bytes = std::fs::read(dir.join(MANIFEST_FILE))
        .map_err(|e| corrupt(format!("cannot read manifest: {}", e)))?;
    let manifest: IndexManifest = serde_json::from_slice(&manifest_bytes)
        .map_err(|e| corrupt(format!("cannot parse manifest: {}", e)))?;

    if manifest.format_version != FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported format version {}",
            manifest.format_version
        )));
    }

    let chunks_bytes = std::fs::read(dir.join(CHUNKS_FILE))
        .map_err(|e| corrupt(format!("cannot read chunks: {}", e)))?;
    let chunks: Vec<Chunk> = serde_json::from_slice(&chunks_bytes)
        .map_err(|e| corrupt(format!("cannot parse chunks: {}", e)))?;

    if chunks.len() != manifest.chunk_count {
        return Err(corrupt(format!(
            "manifest declares {} chunks, found {}",
            manifest.chunk_count,
            chunks.len()
        )));
    }

    let blob = std::fs::read(dir.join(VECTORS_FILE))
        .map_err(|e| corrupt(format!("cannot read vectors: {}", e)))?;
    let expected_len = manifest.chunk_count * manifest.dims * 4;
    if blob.len() != expected_len {
        return Err(corrupt(format!(
            "vectors file is {} bytes, expected {}",
            blob.len(),
            expected_len
        )));
    }

    let vectors: Vec<Vec<f32>> = blob
        .chunks_exact(manifest.dims * 4)
        .map(blob_to_vec)
        .collect();

    Ok(SemanticIndex {
        manifest,
        chunks,
        vectors,
    })
}

impl SemanticIndex {
    /// Top-k chunks by cosine similarity to the query vector. Ties break on
    /// chunk position, so retrieval is deterministic for a fixed index.
    pub fn top_chunks(&self, query: &[f32], k: usize) -> Vec<(&Chunk, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query, v)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| (&self.chunks[i], score))
            .collect()
    }

    /// Retrieved excerpts rendered as oracle context, best match first.
    pub fn context_text(&self, query: &[f32], k: usize) -> String {
        self.top_chunks(query, k)
            .into_iter()
            .map(|(chunk, _)| format!("[{}]\n{}", chunk.document, chunk.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

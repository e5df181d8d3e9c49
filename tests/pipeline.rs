//! End-to-end pipeline tests with scripted oracle and embedder doubles.
//!
//! Everything runs hermetically: the oracle returns canned responses, the
//! embedder derives vectors from text bytes, and SQLite runs in memory.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

use report_harness::config::{Config, DbConfig, StorageConfig};
use report_harness::db;
use report_harness::embedding::Embedder;
use report_harness::error::PipelineError;
use report_harness::models::UploadIdentity;
use report_harness::oracle::{Oracle, OracleRequest};
use report_harness::query::{self, QueryAnswer};
use report_harness::{pipeline, repo};

/// Scripted oracle: image requests, structured (JSON) requests, and prose
/// requests each return their canned response.
struct MockOracle {
    image_response: Option<String>,
    structured_response: Option<String>,
    text_response: String,
}

impl MockOracle {
    fn structured(response: &str) -> Self {
        Self {
            image_response: None,
            structured_response: Some(response.to_string()),
            text_response: String::new(),
        }
    }

    fn for_image(response: &str) -> Self {
        Self {
            image_response: Some(response.to_string()),
            structured_response: None,
            text_response: String::new(),
        }
    }
}

#[async_trait]
impl Oracle for MockOracle {
    async fn generate(&self, request: &OracleRequest) -> Result<String, PipelineError> {
        if request.image.is_some() {
            return self
                .image_response
                .clone()
                .ok_or_else(|| PipelineError::OracleUnavailable("no image response".to_string()));
        }
        if request.json_output {
            return self.structured_response.clone().ok_or_else(|| {
                PipelineError::OracleUnavailable("no structured response".to_string())
            });
        }
        Ok(self.text_response.clone())
    }
}

/// Deterministic embedder: a text's vector depends only on its bytes.
struct MockEmbedder;

#[async_trait]
impl Embedder for MockEmbedder {
    fn model_name(&self) -> &str {
        "mock-embedder"
    }

    fn dims(&self) -> usize {
        8
    }

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                (0..self.dims())
                    .map(|i| {
                        let byte = t.as_bytes().get(i % t.len().max(1)).copied().unwrap_or(0);
                        (byte as f32 + i as f32) / 255.0
                    })
                    .collect()
            })
            .collect())
    }
}

fn test_config(root: &Path) -> Config {
    Config {
        db: DbConfig {
            path: root.join("reports.sqlite"),
        },
        storage: StorageConfig {
            uploads_root: root.join("uploads"),
            indexes_root: root.join("indexes"),
        },
        oracle: Default::default(),
        embedding: Default::default(),
        chunking: Default::default(),
        retrieval: Default::default(),
        unpack: Default::default(),
    }
}

async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

/// Minimal valid PDF containing `text`. Builds the body then the xref with
/// correct byte offsets so pdf-extract can parse it.
fn minimal_pdf_with_text(text: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET\n", text);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(format!("4 0 obj << /Length {} >> stream\n", stream.len()).as_bytes());
    out.extend_from_slice(stream.as_bytes());
    out.extend_from_slice(b"endstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn write_zip(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let file = File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (name, bytes) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
}

fn no_transient_residue(config: &Config) -> bool {
    for sub in ["staging", "extracted"] {
        let dir = config.storage.uploads_root.join(sub);
        if dir.exists() && std::fs::read_dir(&dir).unwrap().next().is_some() {
            return false;
        }
    }
    true
}

const STRUCTURED_RESPONSE: &str = r#"{
    "address": "12 Elm St",
    "bedrooms": "3",
    "bathrooms": "2",
    "built_year": "1998"
}"#;

#[tokio::test]
async fn zip_upload_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = test_pool().await;
    let oracle = MockOracle::structured(STRUCTURED_RESPONSE);
    let embedder = MockEmbedder;

    let archive = tmp.path().join("disclosures.zip");
    write_zip(
        &archive,
        &[
            (
                "reports/inspection.pdf",
                minimal_pdf_with_text("3 bed 2 bath built 1998 at 12 Elm St"),
            ),
            (
                "reports/title.pdf",
                minimal_pdf_with_text("Preliminary title, no liens"),
            ),
        ],
    );

    let report = pipeline::ingest(&config, &oracle, &embedder, &pool, &archive)
        .await
        .unwrap();

    assert_eq!(report.documents, 2);
    assert!(report.chunks >= 2);
    assert!(report.report_type.is_none());
    assert!(report.index_dir.exists());
    assert!(no_transient_residue(&config));

    let record = repo::find(&pool, &report.upload_id).await.unwrap().unwrap();
    assert_eq!(record.fields.address.as_deref(), Some("12 Elm St"));
    assert_eq!(record.fields.bedrooms.as_deref(), Some("3"));
    assert_eq!(record.fields.bathrooms.as_deref(), Some("2"));
    assert_eq!(record.fields.built_year.as_deref(), Some("1998"));
    assert_eq!(record.source_file, "disclosures.zip");
    assert!(record.report_type.is_none());
}

#[tokio::test]
async fn query_answers_from_persisted_index() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = test_pool().await;
    let embedder = MockEmbedder;

    let pdf = tmp.path().join("inspection.pdf");
    std::fs::write(
        &pdf,
        minimal_pdf_with_text("The house was built in 1998 and has a composition roof"),
    )
    .unwrap();

    let ingest_oracle = MockOracle::structured(r#"{"built_year": "1998"}"#);
    let report = pipeline::ingest(&config, &ingest_oracle, &embedder, &pool, &pdf)
        .await
        .unwrap();

    let query_oracle = MockOracle {
        image_response: None,
        structured_response: Some(STRUCTURED_RESPONSE.to_string()),
        text_response: "1998".to_string(),
    };

    let answer = query::answer(
        &config,
        &query_oracle,
        &embedder,
        &report.upload_id,
        "What year was the house built?",
        false,
    )
    .await
    .unwrap();
    match answer {
        QueryAnswer::Text(text) => assert_eq!(text, "1998"),
        other => panic!("expected text answer, got {:?}", other),
    }

    let answer = query::answer(
        &config,
        &query_oracle,
        &embedder,
        &report.upload_id,
        "Extract the property details",
        true,
    )
    .await
    .unwrap();
    match answer {
        QueryAnswer::Structured(fields) => {
            assert_eq!(fields.built_year.as_deref(), Some("1998"));
            assert_eq!(fields.address.as_deref(), Some("12 Elm St"));
        }
        other => panic!("expected structured answer, got {:?}", other),
    }
}

#[tokio::test]
async fn image_upload_single_shot() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = test_pool().await;
    let embedder = MockEmbedder;
    let oracle = MockOracle::for_image(
        r#"{"report_type": "termite_report", "termite_status": "active infestation"}"#,
    );

    let image = tmp.path().join("scan.png");
    std::fs::write(&image, b"not really a png, never decoded locally").unwrap();

    let report = pipeline::ingest(&config, &oracle, &embedder, &pool, &image)
        .await
        .unwrap();

    assert_eq!(report.report_type.as_deref(), Some("termite_report"));
    assert!(report.index_dir.exists());

    let record = repo::find(&pool, &report.upload_id).await.unwrap().unwrap();
    assert_eq!(record.report_type.as_deref(), Some("termite_report"));
    assert!(record.fields_json.contains("termite_status"));
    assert!(no_transient_residue(&config));
}

#[tokio::test]
async fn malformed_image_extraction_leaves_nothing() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = test_pool().await;
    let embedder = MockEmbedder;
    let oracle = MockOracle::for_image("I could not read this image, sorry!");

    let image = tmp.path().join("scan.jpg");
    std::fs::write(&image, b"jpeg bytes").unwrap();

    let err = pipeline::ingest(&config, &oracle, &embedder, &pool, &image)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::OracleMalformedResponse { .. }));

    assert!(repo::list_all(&pool).await.unwrap().is_empty());
    assert!(no_transient_residue(&config));
    if config.storage.indexes_root.exists() {
        assert!(std::fs::read_dir(&config.storage.indexes_root)
            .unwrap()
            .next()
            .is_none());
    }
}

#[tokio::test]
async fn archive_without_documents_fails_cleanly() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = test_pool().await;
    let embedder = MockEmbedder;
    let oracle = MockOracle::structured(STRUCTURED_RESPONSE);

    let archive = tmp.path().join("notes.zip");
    write_zip(&archive, &[("readme.txt", b"no documents here".to_vec())]);

    let err = pipeline::ingest(&config, &oracle, &embedder, &pool, &archive)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoDocumentsFound { .. }));

    assert!(repo::list_all(&pool).await.unwrap().is_empty());
    assert!(no_transient_residue(&config));
}

#[tokio::test]
async fn unsupported_upload_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = test_pool().await;
    let embedder = MockEmbedder;
    let oracle = MockOracle::structured(STRUCTURED_RESPONSE);

    let file = tmp.path().join("notes.txt");
    std::fs::write(&file, b"plain text").unwrap();

    let err = pipeline::ingest(&config, &oracle, &embedder, &pool, &file)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnsupportedUpload(_)));
}

#[tokio::test]
async fn repeated_uploads_get_distinct_identities() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let pool = test_pool().await;
    let embedder = MockEmbedder;
    let oracle = MockOracle::structured(STRUCTURED_RESPONSE);

    let pdf = tmp.path().join("inspection.pdf");
    std::fs::write(&pdf, minimal_pdf_with_text("built 1998")).unwrap();

    let first = pipeline::ingest(&config, &oracle, &embedder, &pool, &pdf)
        .await
        .unwrap();
    let second = pipeline::ingest(&config, &oracle, &embedder, &pool, &pdf)
        .await
        .unwrap();

    assert_ne!(first.upload_id, second.upload_id);
    assert_ne!(first.index_dir, second.index_dir);
    assert!(first.index_dir.exists() && second.index_dir.exists());
    assert_eq!(repo::list_all(&pool).await.unwrap().len(), 2);
}

#[tokio::test]
async fn query_unknown_identity_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let embedder = MockEmbedder;
    let oracle = MockOracle::structured(STRUCTURED_RESPONSE);

    let id = UploadIdentity::mint();
    let err = query::answer(&config, &oracle, &embedder, &id, "anything", false)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::IndexNotFound { .. }));
}

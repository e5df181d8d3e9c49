//! Structured record repository.
//!
//! One row per upload identity, written exactly once after extraction and
//! indexing both succeed. The pipeline never updates or deletes rows, so
//! concurrent uploads only ever append.

use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

use crate::error::PipelineError;
use crate::models::{PropertyFields, StructuredRecord, UploadIdentity};

/// Insert the record. The upload-id primary key makes a second save for the
/// same identity fail with [`PipelineError::RepositoryWriteFailure`].
pub async fn save(pool: &SqlitePool, record: &StructuredRecord) -> Result<(), PipelineError> {
    let columns = PropertyFields::NAMES.join(", ");
    let placeholders = PropertyFields::NAMES
        .iter()
        .map(|_| "?")
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "INSERT INTO records (upload_id, index_dir, source_file, report_type, {}, fields_json, created_at) \
         VALUES (?, ?, ?, ?, {}, ?, ?)",
        columns, placeholders
    );

    let mut query = sqlx::query(&sql)
        .bind(&record.upload_id)
        .bind(&record.index_dir)
        .bind(&record.source_file)
        .bind(&record.report_type);
    for (_, value) in record.fields.iter() {
        query = query.bind(value.clone());
    }
    query
        .bind(&record.fields_json)
        .bind(record.created_at)
        .execute(pool)
        .await?;

    Ok(())
}

/// All records, oldest first (stable listing order for the dashboard).
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<StructuredRecord>, PipelineError> {
    let rows = sqlx::query("SELECT * FROM records ORDER BY created_at, upload_id")
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_record).collect()
}

pub async fn find(
    pool: &SqlitePool,
    id: &UploadIdentity,
) -> Result<Option<StructuredRecord>, PipelineError> {
    let row = sqlx::query("SELECT * FROM records WHERE upload_id = ?")
        .bind(id.as_str())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_record).transpose()
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<StructuredRecord, PipelineError> {
    let mut map = BTreeMap::new();
    for name in PropertyFields::NAMES {
        if let Some(value) = row.try_get::<Option<String>, _>(name)? {
            map.insert(name.to_string(), value);
        }
    }

    Ok(StructuredRecord {
        upload_id: row.try_get("upload_id")?,
        index_dir: row.try_get("index_dir")?,
        source_file: row.try_get("source_file")?,
        report_type: row.try_get("report_type")?,
        fields: PropertyFields::from_map(&map),
        fields_json: row.try_get("fields_json")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        pool
    }

    fn sample_record(id: &UploadIdentity) -> StructuredRecord {
        let fields = PropertyFields {
            address: Some("12 Elm St".to_string()),
            bedrooms: Some("3".to_string()),
            bathrooms: Some("2".to_string()),
            built_year: Some("1998".to_string()),
            ..Default::default()
        };
        StructuredRecord {
            upload_id: id.as_str().to_string(),
            index_dir: format!("indexes/{}", id),
            source_file: "bundle.zip".to_string(),
            report_type: None,
            fields_json: serde_json::to_string(&fields).unwrap(),
            fields,
            created_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn save_and_find_roundtrip() {
        let pool = test_pool().await;
        let id = UploadIdentity::mint();
        save(&pool, &sample_record(&id)).await.unwrap();

        let found = find(&pool, &id).await.unwrap().unwrap();
        assert_eq!(found.fields.bedrooms.as_deref(), Some("3"));
        assert_eq!(found.fields.built_year.as_deref(), Some("1998"));
        assert_eq!(found.fields.address.as_deref(), Some("12 Elm St"));
        assert_eq!(found.index_dir, format!("indexes/{}", id));
        assert!(found.fields.plumbing.is_none());
    }

    #[tokio::test]
    async fn second_save_for_same_identity_fails() {
        let pool = test_pool().await;
        let id = UploadIdentity::mint();
        save(&pool, &sample_record(&id)).await.unwrap();

        let err = save(&pool, &sample_record(&id)).await.unwrap_err();
        assert!(matches!(err, PipelineError::RepositoryWriteFailure(_)));

        // Still exactly one row
        assert_eq!(list_all(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_all_orders_by_created_at() {
        let pool = test_pool().await;
        let first = UploadIdentity::mint();
        let second = UploadIdentity::mint();

        let mut a = sample_record(&second);
        a.created_at = 2_000_000_000;
        let mut b = sample_record(&first);
        b.created_at = 1_000_000_000;

        save(&pool, &a).await.unwrap();
        save(&pool, &b).await.unwrap();

        let all = list_all(&pool).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].upload_id, first.as_str());
        assert_eq!(all[1].upload_id, second.as_str());
    }

    #[tokio::test]
    async fn find_unknown_identity_is_none() {
        let pool = test_pool().await;
        let missing = UploadIdentity::mint();
        assert!(find(&pool, &missing).await.unwrap().is_none());
    }
}

//! Dashboard summary over the structured record repository.
//!
//! Records are bucketed by their stored report type. Known classifications
//! keep their canonical name; anything else — unknown values and document-set
//! uploads with no classification — lands in the "Other Reports" bucket.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{ReportType, StructuredRecord};

pub const OTHER_BUCKET: &str = "Other Reports";

#[derive(Debug, Clone)]
pub struct DashboardEntry {
    pub upload_id: String,
    pub source_file: String,
    pub created_at: i64,
}

/// Grouped view plus the headline totals.
#[derive(Debug, Clone)]
pub struct Dashboard {
    /// Bucket name → entries, bucket names sorted, entries in listing order.
    pub buckets: BTreeMap<String, Vec<DashboardEntry>>,
    pub total_records: usize,
    pub report_type_count: usize,
    /// Distinct field names seen across all raw extractions, not counting
    /// the classification discriminator itself.
    pub unique_field_count: usize,
}

impl Dashboard {
    pub fn from_records(records: &[StructuredRecord]) -> Self {
        let mut buckets: BTreeMap<String, Vec<DashboardEntry>> = BTreeMap::new();
        let mut fields: BTreeSet<String> = BTreeSet::new();

        for record in records {
            let bucket = match &record.report_type {
                Some(raw) if ReportType::from_raw(raw).is_known() => raw.clone(),
                _ => OTHER_BUCKET.to_string(),
            };

            buckets.entry(bucket).or_default().push(DashboardEntry {
                upload_id: record.upload_id.clone(),
                source_file: record.source_file.clone(),
                created_at: record.created_at,
            });

            if let Ok(serde_json::Value::Object(map)) =
                serde_json::from_str::<serde_json::Value>(&record.fields_json)
            {
                for key in map.keys() {
                    if key != "report_type" {
                        fields.insert(key.clone());
                    }
                }
            }
        }

        Dashboard {
            total_records: records.len(),
            report_type_count: buckets.len(),
            unique_field_count: fields.len(),
            buckets,
        }
    }
}

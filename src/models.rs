//! Core data models used throughout Report Harness.
//!
//! These types represent the upload identities, raw documents, extracted
//! field sets, and structured records that flow through the ingestion and
//! query pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque per-upload identity minted server-side.
///
/// Scopes the staging directory, the extraction working directory, the
/// index directory, and the repository row. Storage paths are always
/// derived from this identity, never from user-controlled filenames.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadIdentity(String);

impl UploadIdentity {
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse an identity supplied by a caller (e.g. on the query path).
    /// Only well-formed UUIDs are accepted, so an identity can never smuggle
    /// path components into storage lookups.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(|u| Self(u.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploadIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Media kind of a single input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "png" | "jpg" | "jpeg" | "webp" => Some(DocumentKind::Image),
            _ => None,
        }
    }
}

/// MIME type for an image file, by extension.
pub fn image_media_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

/// A single input file discovered during unpacking. Ephemeral — deleted
/// with the working directory once indexing succeeds or fails terminally.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub path: PathBuf,
    pub kind: DocumentKind,
}

impl RawDocument {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Flat field mapping produced by the image single-shot extraction mode.
///
/// Always a valid flat mapping by construction — [`crate::extract`] rejects
/// anything else before this type is built, and guarantees the
/// `report_type` discriminator is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields(BTreeMap<String, String>);

impl ExtractedFields {
    pub const DISCRIMINATOR: &'static str = "report_type";

    pub fn new(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn report_type(&self) -> Option<&str> {
        self.get(Self::DISCRIMINATOR)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render the field set as plain text, one `key: value` line per field.
    /// Used as the index corpus for single-image uploads.
    pub fn corpus_text(&self) -> String {
        let mut out = String::new();
        for (k, v) in &self.0 {
            out.push_str(k);
            out.push_str(": ");
            out.push_str(v);
            out.push('\n');
        }
        out
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Closed report classification, plus an open-ended fallback preserving the
/// raw oracle value. The stored record always keeps the raw value; bucketing
/// happens only at the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportType {
    TermiteReport,
    NaturalHazardDisclosure,
    TransferDisclosureStatement,
    HoaDocuments,
    PreliminaryTitleReport,
    LeadBasedPaintDisclosure,
    WaterHeaterSmokeDetectorCompliance,
    ClosingStatement,
    HomeInspectionReport,
    Other(String),
}

impl ReportType {
    /// Canonical names admissible in the extraction instruction.
    pub const KNOWN: [&'static str; 9] = [
        "termite_report",
        "natural_hazard_disclosure",
        "transfer_disclosure_statement",
        "hoa_documents",
        "preliminary_title_report",
        "lead_based_paint_disclosure",
        "water_heater_smoke_detector_compliance",
        "closing_statement",
        "home_inspection_report",
    ];

    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "termite_report" => ReportType::TermiteReport,
            "natural_hazard_disclosure" => ReportType::NaturalHazardDisclosure,
            "transfer_disclosure_statement" => ReportType::TransferDisclosureStatement,
            "hoa_documents" => ReportType::HoaDocuments,
            "preliminary_title_report" => ReportType::PreliminaryTitleReport,
            "lead_based_paint_disclosure" => ReportType::LeadBasedPaintDisclosure,
            "water_heater_smoke_detector_compliance" => {
                ReportType::WaterHeaterSmokeDetectorCompliance
            }
            "closing_statement" => ReportType::ClosingStatement,
            "home_inspection_report" => ReportType::HomeInspectionReport,
            other => ReportType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ReportType::TermiteReport => "termite_report",
            ReportType::NaturalHazardDisclosure => "natural_hazard_disclosure",
            ReportType::TransferDisclosureStatement => "transfer_disclosure_statement",
            ReportType::HoaDocuments => "hoa_documents",
            ReportType::PreliminaryTitleReport => "preliminary_title_report",
            ReportType::LeadBasedPaintDisclosure => "lead_based_paint_disclosure",
            ReportType::WaterHeaterSmokeDetectorCompliance => {
                "water_heater_smoke_detector_compliance"
            }
            ReportType::ClosingStatement => "closing_statement",
            ReportType::HomeInspectionReport => "home_inspection_report",
            ReportType::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ReportType::Other(_))
    }
}

/// The closed structured schema describing a property. All fields optional:
/// `None` means the oracle abstained, never "extracted as empty".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyFields {
    pub address: Option<String>,
    pub exterior_walls: Option<String>,
    pub exterior_windows: Option<String>,
    pub exterior_doors: Option<String>,
    pub roof_type_and_age: Option<String>,
    pub rain_gutters: Option<String>,
    pub fencing_type: Option<String>,
    pub fencing_location: Option<String>,
    pub garage_type: Option<String>,
    pub garage_door_type: Option<String>,
    pub garage_opener_status: Option<String>,
    pub lot_topography: Option<String>,
    pub driveway: Option<String>,
    pub walkway_and_sidewalks: Option<String>,
    pub porch_deck_and_patio_covers: Option<String>,
    pub fascia_eaves_and_rafters: Option<String>,
    pub built_year: Option<String>,
    pub lot_size: Option<String>,
    pub house_size: Option<String>,
    pub bedrooms: Option<String>,
    pub bathrooms: Option<String>,
    pub interior_details: Option<String>,
    pub electrical_panel_rating: Option<String>,
    pub heating_and_cooling: Option<String>,
    pub fireplace_or_chimney: Option<String>,
    pub plumbing: Option<String>,
    pub utilities: Option<String>,
    pub appliances: Option<String>,
}

impl PropertyFields {
    /// Field names in declaration order. Doubles as the schema listing in
    /// the structured extraction instruction and the repository columns.
    pub const NAMES: [&'static str; 28] = [
        "address",
        "exterior_walls",
        "exterior_windows",
        "exterior_doors",
        "roof_type_and_age",
        "rain_gutters",
        "fencing_type",
        "fencing_location",
        "garage_type",
        "garage_door_type",
        "garage_opener_status",
        "lot_topography",
        "driveway",
        "walkway_and_sidewalks",
        "porch_deck_and_patio_covers",
        "fascia_eaves_and_rafters",
        "built_year",
        "lot_size",
        "house_size",
        "bedrooms",
        "bathrooms",
        "interior_details",
        "electrical_panel_rating",
        "heating_and_cooling",
        "fireplace_or_chimney",
        "plumbing",
        "utilities",
        "appliances",
    ];

    /// Build from a flat string mapping, taking recognized keys and
    /// silently dropping the rest. Absent keys stay `None`.
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        let take = |key: &str| map.get(key).cloned();
        Self {
            address: take("address"),
            exterior_walls: take("exterior_walls"),
            exterior_windows: take("exterior_windows"),
            exterior_doors: take("exterior_doors"),
            roof_type_and_age: take("roof_type_and_age"),
            rain_gutters: take("rain_gutters"),
            fencing_type: take("fencing_type"),
            fencing_location: take("fencing_location"),
            garage_type: take("garage_type"),
            garage_door_type: take("garage_door_type"),
            garage_opener_status: take("garage_opener_status"),
            lot_topography: take("lot_topography"),
            driveway: take("driveway"),
            walkway_and_sidewalks: take("walkway_and_sidewalks"),
            porch_deck_and_patio_covers: take("porch_deck_and_patio_covers"),
            fascia_eaves_and_rafters: take("fascia_eaves_and_rafters"),
            built_year: take("built_year"),
            lot_size: take("lot_size"),
            house_size: take("house_size"),
            bedrooms: take("bedrooms"),
            bathrooms: take("bathrooms"),
            interior_details: take("interior_details"),
            electrical_panel_rating: take("electrical_panel_rating"),
            heating_and_cooling: take("heating_and_cooling"),
            fireplace_or_chimney: take("fireplace_or_chimney"),
            plumbing: take("plumbing"),
            utilities: take("utilities"),
            appliances: take("appliances"),
        }
    }

    /// Number of populated fields.
    pub fn populated(&self) -> usize {
        self.iter().filter(|(_, v)| v.is_some()).count()
    }

    /// Iterate `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Option<String>)> {
        [
            ("address", &self.address),
            ("exterior_walls", &self.exterior_walls),
            ("exterior_windows", &self.exterior_windows),
            ("exterior_doors", &self.exterior_doors),
            ("roof_type_and_age", &self.roof_type_and_age),
            ("rain_gutters", &self.rain_gutters),
            ("fencing_type", &self.fencing_type),
            ("fencing_location", &self.fencing_location),
            ("garage_type", &self.garage_type),
            ("garage_door_type", &self.garage_door_type),
            ("garage_opener_status", &self.garage_opener_status),
            ("lot_topography", &self.lot_topography),
            ("driveway", &self.driveway),
            ("walkway_and_sidewalks", &self.walkway_and_sidewalks),
            (
                "porch_deck_and_patio_covers",
                &self.porch_deck_and_patio_covers,
            ),
            ("fascia_eaves_and_rafters", &self.fascia_eaves_and_rafters),
            ("built_year", &self.built_year),
            ("lot_size", &self.lot_size),
            ("house_size", &self.house_size),
            ("bedrooms", &self.bedrooms),
            ("bathrooms", &self.bathrooms),
            ("interior_details", &self.interior_details),
            ("electrical_panel_rating", &self.electrical_panel_rating),
            ("heating_and_cooling", &self.heating_and_cooling),
            ("fireplace_or_chimney", &self.fireplace_or_chimney),
            ("plumbing", &self.plumbing),
            ("utilities", &self.utilities),
            ("appliances", &self.appliances),
        ]
        .into_iter()
    }
}

/// A chunk of a corpus document's text, positionally addressed within its
/// upload's index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_index: i64,
    pub document: String,
    pub text: String,
    pub hash: String,
}

/// One row per upload in the structured record repository. Created exactly
/// once after extraction and indexing both succeed; never updated.
#[derive(Debug, Clone)]
pub struct StructuredRecord {
    pub upload_id: String,
    pub index_dir: String,
    pub source_file: String,
    pub report_type: Option<String>,
    pub fields: PropertyFields,
    /// Raw extracted mapping, kept verbatim for the dashboard field census.
    pub fields_json: String,
    pub created_at: i64,
}

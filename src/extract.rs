//! Extraction instructions and oracle-output decoding.
//!
//! This is the validating half of the oracle adapter: [`crate::oracle`]
//! moves bytes, this module fixes the contract. Decoding produces either a
//! typed value or [`PipelineError::OracleMalformedResponse`] — never a
//! partial or best-effort record.

use std::collections::BTreeMap;

use crate::error::PipelineError;
use crate::models::{ExtractedFields, PropertyFields, ReportType};

/// Candidate optional keys for the image single-shot mode. The instruction
/// asks the oracle to pick the handful that match the report type.
pub const CANDIDATE_KEYS: [&str; 43] = [
    "flood_zone",
    "earthquake_zone",
    "fire_zone",
    "landslide_risk",
    "radon_gas_presence",
    "other_natural_hazards",
    "known_defects",
    "plumbing_issues",
    "electrical_issues",
    "structural_problems",
    "appliances_condition",
    "roof_condition",
    "hvac_condition",
    "repairs_done",
    "remodels_done",
    "neighborhood_issues",
    "zoning_violations",
    "disputes_with_neighbors",
    "hoa_fees",
    "cc_and_rs",
    "hoa_rules",
    "pending_assessments",
    "financial_status_of_hoa",
    "liens_on_property",
    "easements",
    "encumbrances",
    "ownership_history",
    "lead_paint_presence",
    "areas_with_lead_paint",
    "water_heater_strapped",
    "smoke_detectors_installed",
    "final_sale_price",
    "closing_costs",
    "credits_or_debits_to_buyer_or_seller",
    "general_property_condition",
    "recommended_repairs",
    "major_deficiencies",
    "safety_hazards",
    "estimated_repair_costs",
    "wall_type",
    "material_used",
    "termite_status",
    "water_line_type",
];

/// Fixed instruction for the image single-shot mode: a flat JSON object
/// with a mandatory `report_type` from the closed set, plus any matching
/// candidate keys. Values the document does not state must be omitted.
pub fn image_instruction() -> String {
    format!(
        "Extract details from this property report image and return a flat JSON object of \
         key-value string pairs. The key \"report_type\" is mandatory and its value must be \
         one of: {}. Then extract values for up to 5 of the following keys that match the \
         report type: {}. Omit any key the document does not state a value for; never invent \
         values and never use empty strings.",
        ReportType::KNOWN.join(", "),
        CANDIDATE_KEYS.join(", "),
    )
}

/// Fixed question for the document-set structured mode, issued against
/// retrieved index context.
pub fn property_details_instruction() -> String {
    format!(
        "Extract the details for the property including address, built year, lot size (sqft), \
         house size (sqft), number of bedrooms, bathrooms, areas (kitchen, dining room, living \
         room, laundry room, garage with type, garage door type, and opener status, deck, \
         gazebo, pool), construction type, foundation, walls, ceiling, attic, crawl space or \
         basement, exterior (walls, windows, doors, roof type and age, rain gutters, fencing \
         type and location), interior details, electrical panel rating, heating and cooling \
         systems, fireplace or chimney, plumbing (water heater details, supply piping, main \
         valve location), utilities (electricity, gas, water, sewer, provider names), and \
         appliances (cooktop type, refrigerator, dishwasher, microwave, oven, washer, dryer \
         details).\n\n{}",
        schema_directive()
    )
}

/// Directive appended to structured-mode requests, pinning the output to
/// the [`PropertyFields`] schema.
pub fn schema_directive() -> String {
    format!(
        "Return a JSON object with exactly these keys: {}. Each value must be a string, or \
         null when the documents do not state it. Do not invent values.",
        PropertyFields::NAMES.join(", ")
    )
}

/// Decode the image single-shot response: a flat JSON object with the
/// mandatory `report_type` discriminator. Scalar values are coerced to
/// their JSON text, nulls are dropped, and nested values poison the whole
/// payload.
pub fn decode_report_fields(text: &str) -> Result<ExtractedFields, PipelineError> {
    let map = flatten_object(text)?;
    if !map.contains_key(ExtractedFields::DISCRIMINATOR) {
        return Err(PipelineError::OracleMalformedResponse {
            reason: format!("missing mandatory field '{}'", ExtractedFields::DISCRIMINATOR),
        });
    }
    Ok(ExtractedFields::new(map))
}

/// Decode a structured-mode response into [`PropertyFields`]: unknown keys
/// are dropped, absent keys stay `None`.
pub fn decode_property_fields(text: &str) -> Result<PropertyFields, PipelineError> {
    let map = flatten_object(text)?;
    Ok(PropertyFields::from_map(&map))
}

fn flatten_object(text: &str) -> Result<BTreeMap<String, String>, PipelineError> {
    let malformed = |reason: String| PipelineError::OracleMalformedResponse { reason };

    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| malformed(format!("response is not valid JSON: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| malformed("top-level value is not an object".to_string()))?;

    let mut map = BTreeMap::new();
    for (key, val) in object {
        match val {
            serde_json::Value::String(s) => {
                map.insert(key.clone(), s.clone());
            }
            serde_json::Value::Number(n) => {
                map.insert(key.clone(), n.to_string());
            }
            serde_json::Value::Bool(b) => {
                map.insert(key.clone(), b.to_string());
            }
            // An abstained field is absent, not empty
            serde_json::Value::Null => {}
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                return Err(malformed(format!("field '{}' is not a flat value", key)));
            }
        }
    }
    Ok(map)
}

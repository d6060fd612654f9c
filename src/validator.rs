use crate::schema::{FieldSchema, Tier};
use crate::value::RawExtraction;
use serde::Serialize;
use utoipa::ToSchema;

/// Outcome of checking a raw extraction against the schema's tiers.
///
/// Field names are listed in schema declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// True when no `required` field is missing.
    pub overall_valid: bool,
    /// Weighted completeness, 0-100.
    pub score: u8,
    pub missing_required: Vec<String>,
    pub missing_important: Vec<String>,
    pub extracted_fields: Vec<String>,
    pub missing_fields: Vec<String>,
}

fn weight(tier: Tier) -> u32 {
    match tier {
        Tier::Required => 3,
        Tier::Important => 2,
        Tier::Optional => 1,
    }
}

/// Pure function of its inputs: same extraction and schema, same report.
pub fn validate(raw: &RawExtraction, schema: &FieldSchema) -> ValidationReport {
    let mut report = ValidationReport {
        overall_valid: true,
        score: 0,
        missing_required: Vec::new(),
        missing_important: Vec::new(),
        extracted_fields: Vec::new(),
        missing_fields: Vec::new(),
    };
    let (mut earned, mut possible) = (0u32, 0u32);

    for spec in schema.specs() {
        let name = spec.name().to_string();
        possible += weight(spec.tier);
        if raw.contains(spec.field) {
            earned += weight(spec.tier);
            report.extracted_fields.push(name);
            continue;
        }
        match spec.tier {
            Tier::Required => report.missing_required.push(name.clone()),
            Tier::Important => report.missing_important.push(name.clone()),
            Tier::Optional => {}
        }
        report.missing_fields.push(name);
    }

    report.overall_valid = report.missing_required.is_empty();
    report.score = if possible == 0 {
        0
    } else {
        (earned * 100 / possible) as u8
    };
    report
}

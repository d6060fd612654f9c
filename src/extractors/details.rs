use super::json::{find_key, scalar_text, str_field};
use super::normalize::{clean_text, dedup, humanize, in_range, number_from_json, parse_number};
use super::page::PageView;
use super::Matcher;
use crate::value::FieldValue;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static YEAR_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:built in|year built:?)\s*(\d{4})\b").unwrap());
static MLS_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bMLS\s*(?:#|number|no\.?|id)?\s*:?\s*#?\s*([A-Z0-9][A-Z0-9-]{3,19})\b").unwrap()
});
static TYPE_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(single[- ]family(?: home| residence)?|condominium|condo|townhouse|townhome|multi[- ]family|manufactured home|mobile home|co-?op)\b").unwrap()
});

const MIN_YEAR: f64 = 1700.0;
const MAX_YEAR: f64 = 2100.0;
const MIN_DESCRIPTION: usize = 20;
const MAX_FEATURES: usize = 40;

pub(super) const YEAR_BUILT: &[Matcher] = &[year_from_json_ld, year_from_state, year_from_facts, year_from_text];
pub(super) const PROPERTY_TYPE: &[Matcher] = &[type_from_json_ld, type_from_state, type_from_facts, type_from_text];
pub(super) const DESCRIPTION: &[Matcher] = &[description_from_json_ld, description_from_state, description_from_meta];
pub(super) const MLS_ID: &[Matcher] = &[mls_from_json_ld, mls_from_state, mls_from_facts, mls_from_text];
pub(super) const FEATURES: &[Matcher] = &[features_from_json_ld, features_from_state, features_from_markup];

fn year(value: &Value) -> Option<f64> {
    number_from_json(value).and_then(|n| in_range(n.trunc(), MIN_YEAR, MAX_YEAR))
}

// ----------------------------------------------------------------------------
// Year built
// ----------------------------------------------------------------------------

fn year_from_json_ld(page: &PageView) -> Option<FieldValue> {
    find_key(page.listing_nodes(), &["yearBuilt"], year).map(FieldValue::Number)
}

fn year_from_state(page: &PageView) -> Option<FieldValue> {
    find_key(&page.embedded, &["yearBuilt", "builtYear"], year).map(FieldValue::Number)
}

fn year_from_facts(page: &PageView) -> Option<FieldValue> {
    page.fact(&["year built", "built in", "built"])
        .and_then(parse_number)
        .and_then(|n| in_range(n, MIN_YEAR, MAX_YEAR))
        .map(FieldValue::Number)
}

fn year_from_text(page: &PageView) -> Option<FieldValue> {
    YEAR_TEXT
        .captures_iter(&page.text)
        .find_map(|c| parse_number(&c[1]).and_then(|n| in_range(n, MIN_YEAR, MAX_YEAR)))
        .map(FieldValue::Number)
}

// ----------------------------------------------------------------------------
// Property type
// ----------------------------------------------------------------------------

const RESIDENCE_TYPES: [&str; 6] = [
    "singlefamilyresidence",
    "house",
    "apartment",
    "townhouse",
    "condominium",
    "apartmentcomplex",
];

fn type_from_json_ld(page: &PageView) -> Option<FieldValue> {
    page.json_ld
        .iter()
        .flat_map(|node| {
            node.get("@type")
                .map(|t| match t {
                    Value::String(s) => vec![s.as_str()],
                    Value::Array(ts) => ts.iter().filter_map(Value::as_str).collect(),
                    _ => Vec::new(),
                })
                .unwrap_or_default()
        })
        .find(|t| RESIDENCE_TYPES.contains(&t.to_ascii_lowercase().as_str()))
        .and_then(humanize)
        .map(FieldValue::Text)
}

fn type_from_state(page: &PageView) -> Option<FieldValue> {
    find_key(&page.embedded, &["homeType", "propertyType", "propertySubType"], |v| {
        v.as_str().and_then(humanize)
    })
    .map(FieldValue::Text)
}

fn type_from_facts(page: &PageView) -> Option<FieldValue> {
    page.fact(&["property type", "home type", "style"])
        .and_then(humanize)
        .map(FieldValue::Text)
}

fn type_from_text(page: &PageView) -> Option<FieldValue> {
    TYPE_TEXT
        .captures(&page.text)
        .and_then(|c| humanize(&c[1]))
        .map(FieldValue::Text)
}

// ----------------------------------------------------------------------------
// Description
// ----------------------------------------------------------------------------

fn description(raw: &str) -> Option<String> {
    clean_text(raw).filter(|d| d.chars().count() >= MIN_DESCRIPTION)
}

fn description_from_json_ld(page: &PageView) -> Option<FieldValue> {
    find_key(page.listing_nodes(), &["description"], |v| v.as_str().and_then(description)).map(FieldValue::Text)
}

fn description_from_state(page: &PageView) -> Option<FieldValue> {
    find_key(&page.embedded, &["description", "remarks", "publicRemarks"], |v| {
        v.as_str().and_then(description)
    })
    .map(FieldValue::Text)
}

fn description_from_meta(page: &PageView) -> Option<FieldValue> {
    ["og:description", "description", "twitter:description"]
        .iter()
        .filter_map(|k| page.meta(k))
        .chain(page.item_prop("description"))
        .find_map(description)
        .map(FieldValue::Text)
}

// ----------------------------------------------------------------------------
// MLS id
// ----------------------------------------------------------------------------

fn mls_id(raw: &str) -> Option<String> {
    let id = raw.trim().trim_start_matches('#').trim();
    let plausible = (4..=20).contains(&id.len())
        && id.chars().any(|c| c.is_ascii_digit())
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    plausible.then(|| id.to_ascii_uppercase())
}

fn mls_from_json_ld(page: &PageView) -> Option<FieldValue> {
    find_key(page.listing_nodes(), &["identifier", "mlsId"], |v| match v {
        // PropertyValue {"propertyID": "MLS", "value": "..."}
        Value::Object(obj) => str_field(obj, &["propertyID", "name"])
            .filter(|id| id.to_ascii_lowercase().contains("mls"))
            .and_then(|_| obj.get("value"))
            .and_then(scalar_text)
            .and_then(|s| mls_id(&s)),
        other => scalar_text(other).and_then(|s| mls_id(&s)),
    })
    .map(FieldValue::Text)
}

fn mls_from_state(page: &PageView) -> Option<FieldValue> {
    find_key(&page.embedded, &["mlsId", "mlsid", "mls_id", "mlsNumber", "listingMlsId"], |v| {
        scalar_text(v).and_then(|s| mls_id(&s))
    })
    .map(FieldValue::Text)
}

fn mls_from_facts(page: &PageView) -> Option<FieldValue> {
    page.fact(&["mls"]).and_then(mls_id).map(FieldValue::Text)
}

fn mls_from_text(page: &PageView) -> Option<FieldValue> {
    MLS_TEXT
        .captures_iter(&page.text)
        .find_map(|c| mls_id(&c[1]))
        .map(FieldValue::Text)
}

// ----------------------------------------------------------------------------
// Features
// ----------------------------------------------------------------------------

fn feature_list(items: Vec<String>) -> Option<FieldValue> {
    let items: Vec<String> = dedup(items.iter().filter_map(|i| clean_text(i)).collect())
        .into_iter()
        .take(MAX_FEATURES)
        .collect();
    (!items.is_empty()).then_some(FieldValue::TextList(items))
}

fn labelled(obj: &serde_json::Map<String, Value>, label_keys: &[&str], value_keys: &[&str]) -> Option<String> {
    let label = str_field(obj, label_keys)?;
    match obj.get(value_keys[0]).or_else(|| value_keys.get(1).and_then(|k| obj.get(*k))) {
        Some(Value::Bool(true)) | None | Some(Value::Null) => Some(label.to_string()),
        Some(Value::Bool(false)) => None,
        Some(v) => scalar_text(v).map(|s| format!("{label}: {s}")).or_else(|| Some(label.to_string())),
    }
}

fn features_from_json_ld(page: &PageView) -> Option<FieldValue> {
    let items = page
        .listing_nodes()
        .filter_map(|node| node.get("amenityFeature"))
        .flat_map(|v| match v {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => labelled(obj, &["name"], &["value"]),
            _ => None,
        })
        .collect();
    feature_list(items)
}

fn features_from_state(page: &PageView) -> Option<FieldValue> {
    find_key(&page.embedded, &["atAGlanceFacts", "amenities", "features"], |v| {
        let items: Vec<String> = v
            .as_array()?
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(obj) => labelled(obj, &["factLabel", "label", "name"], &["factValue", "value"]),
                _ => None,
            })
            .collect();
        feature_list(items)
    })
}

fn features_from_markup(page: &PageView) -> Option<FieldValue> {
    feature_list(page.feature_items.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> PageView {
        PageView::parse(html, None)
    }

    fn text(s: &str) -> Option<FieldValue> {
        Some(FieldValue::Text(s.into()))
    }

    #[test]
    fn year_built_sources() {
        let p = page(r#"<script type="application/ld+json">{"@type":"House","yearBuilt":"1927"}</script>"#);
        assert_eq!(year_from_json_ld(&p), Some(FieldValue::Number(1927.0)));
        let p = page("<body><p>Charming colonial built in 1890 on a quiet street.</p></body>");
        assert_eq!(year_from_text(&p), Some(FieldValue::Number(1890.0)));
        let p = page("<body><p>Built in 3021 according to the sci-fi brochure.</p></body>");
        assert_eq!(year_from_text(&p), None);
    }

    #[test]
    fn property_type_sources() {
        let p = page(r#"<script type="application/ld+json">{"@type":["Product","SingleFamilyResidence"]}</script>"#);
        assert_eq!(type_from_json_ld(&p), text("Single Family Residence"));
        let p = page(r#"<script id="__NEXT_DATA__" type="application/json">{"p":{"homeType":"TOWNHOUSE"}}</script>"#);
        assert_eq!(type_from_state(&p), text("Townhouse"));
        let p = page("<body>A bright condo near downtown</body>");
        assert_eq!(type_from_text(&p), text("Condo"));
    }

    #[test]
    fn description_prefers_structured_then_meta() {
        let p = page(r#"<meta property="og:description" content="  Sunny   three bedroom with a big yard. ">"#);
        assert_eq!(description_from_meta(&p), text("Sunny three bedroom with a big yard."));
        let p = page(r#"<meta name="description" content="Home">"#);
        assert_eq!(description_from_meta(&p), None);
    }

    #[test]
    fn mls_id_sources() {
        let p = page(
            r#"<script type="application/ld+json">{"@type":"RealEstateListing","identifier":{"@type":"PropertyValue","propertyID":"MLS","value":"a-2215"}}</script>"#,
        );
        assert_eq!(mls_from_json_ld(&p), text("A-2215"));
        let p = page(r#"<script id="__NEXT_DATA__" type="application/json">{"mlsid":40221987}</script>"#);
        assert_eq!(mls_from_state(&p), text("40221987"));
        let p = page("<body><p>Listing courtesy of Acme Realty. MLS #: 22-0417</p></body>");
        assert_eq!(mls_from_text(&p), text("22-0417"));
        let p = page("<body><p>MLS listing data provided by the board</p></body>");
        assert_eq!(mls_from_text(&p), None);
    }

    #[test]
    fn features_from_state_facts() {
        let p = page(
            r#"<script id="__NEXT_DATA__" type="application/json">{"atAGlanceFacts":[{"factLabel":"Heating","factValue":"Forced air"},{"factLabel":"Cooling","factValue":null},{"factLabel":"Heating","factValue":"Forced air"}]}</script>"#,
        );
        assert_eq!(
            features_from_state(&p),
            Some(FieldValue::TextList(vec!["Heating: Forced air".into(), "Cooling".into()]))
        );
    }

    #[test]
    fn features_from_amenities() {
        let p = page(
            r#"<script type="application/ld+json">{"@type":"Apartment","amenityFeature":[{"name":"Pool","value":true},{"name":"Gym","value":false},"Parking"]}</script>"#,
        );
        assert_eq!(
            features_from_json_ld(&p),
            Some(FieldValue::TextList(vec!["Pool".into(), "Parking".into()]))
        );
    }
}

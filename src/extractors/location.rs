use super::json::{find_key, find_object, str_field};
use super::normalize::clean_text;
use super::page::PageView;
use super::Matcher;
use crate::value::FieldValue;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static FULL_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b\d{1,6}\s+[\w.' -]{2,60}?,?\s*(?:(?:#|apt|unit|ste|suite)\.?\s*[\w-]+,?\s*)?[A-Za-z .'-]{2,40},\s*[A-Z]{2}\s+\d{5}(?:-\d{4})?\b",
    )
    .unwrap()
});

pub(super) const ADDRESS: &[Matcher] = &[
    address_from_json_ld,
    address_from_state,
    address_from_meta,
    address_from_headings,
    address_from_text,
];

/// `street, city, REGION postal` from the usual key spellings.
fn format_address(obj: &Map<String, Value>) -> Option<String> {
    let street = str_field(obj, &["streetAddress", "street", "addressLine1", "line1"])?;
    let unit = str_field(obj, &["unit", "unitNumber"]);
    let city = str_field(obj, &["addressLocality", "city", "locality"]);
    let region = str_field(obj, &["addressRegion", "state", "stateCode", "region"]);
    let postal = str_field(obj, &["postalCode", "zipcode", "zipCode", "zip"]);

    let mut out = street.to_string();
    if let Some(unit) = unit.filter(|u| !street.contains(u)) {
        out.push_str(&format!(" #{unit}"));
    }
    if let Some(city) = city {
        out.push_str(&format!(", {city}"));
    }
    match (region, postal) {
        (Some(r), Some(p)) => out.push_str(&format!(", {r} {p}")),
        (Some(r), None) => out.push_str(&format!(", {r}")),
        (None, Some(p)) => out.push_str(&format!(" {p}")),
        (None, None) => {}
    }
    clean_text(&out)
}

fn address_value(value: &Value) -> Option<String> {
    match value {
        Value::Object(obj) => format_address(obj),
        Value::String(s) => clean_text(s),
        _ => None,
    }
}

fn address_from_json_ld(page: &PageView) -> Option<FieldValue> {
    find_key(page.listing_nodes(), &["address"], address_value).map(FieldValue::Text)
}

fn address_from_state(page: &PageView) -> Option<FieldValue> {
    find_key(&page.embedded, &["address"], |v| v.as_object().and_then(format_address))
        // Flattened layouts keep the street next to the other property keys.
        .or_else(|| find_object(&page.embedded, format_address))
        .map(FieldValue::Text)
}

fn match_address(text: &str) -> Option<String> {
    FULL_ADDRESS.find(text).and_then(|m| clean_text(m.as_str()))
}

fn address_from_meta(page: &PageView) -> Option<FieldValue> {
    ["og:title", "twitter:title"]
        .iter()
        .filter_map(|k| page.meta(k))
        .chain(page.title.as_deref())
        .find_map(match_address)
        .map(FieldValue::Text)
}

fn address_from_headings(page: &PageView) -> Option<FieldValue> {
    page.headings
        .iter()
        .find_map(|h| match_address(h))
        .map(FieldValue::Text)
}

fn address_from_text(page: &PageView) -> Option<FieldValue> {
    match_address(&page.text).map(FieldValue::Text)
}

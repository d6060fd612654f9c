use super::json::{find_key, find_object, str_field};
use super::normalize::{clean_text, in_range, number_from_json, parse_number};
use super::page::PageView;
use super::Matcher;
use crate::value::FieldValue;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static BEDS_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2}(?:\.\d)?)\s*(?:bd|bds|beds?|bedrooms?|br)\b").unwrap());
static BATHS_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2}(?:\.\d{1,2})?)\s*(?:ba|baths?|bathrooms?)\b").unwrap());
static SQFT_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,3}(?:,\d{3})+|\d{3,6})\s*(?:sq\.?\s*ft\.?|sqft|square\s+feet|sf)\b").unwrap()
});
static LOT_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)\s*(acres?|ac|sq\.?\s*ft\.?|sqft)\s+lot\b").unwrap()
});

const MAX_ROOMS: f64 = 99.0;
const MIN_SQFT: f64 = 100.0;
const MAX_SQFT: f64 = 100_000.0;

pub(super) const BEDROOMS: &[Matcher] = &[beds_from_json_ld, beds_from_state, beds_from_facts, beds_from_text];
pub(super) const BATHROOMS: &[Matcher] = &[baths_from_json_ld, baths_from_state, baths_from_facts, baths_from_text];
pub(super) const SQUARE_FEET: &[Matcher] = &[sqft_from_json_ld, sqft_from_state, sqft_from_facts, sqft_from_text];
pub(super) const LOT_SIZE: &[Matcher] = &[lot_from_json_ld, lot_from_state, lot_from_facts, lot_from_text];

fn count(value: &Value) -> Option<f64> {
    number_from_json(value).and_then(|n| in_range(n, 0.0, MAX_ROOMS))
}

fn area(value: &Value) -> Option<f64> {
    number_from_json(value).and_then(|n| in_range(n, MIN_SQFT, MAX_SQFT))
}

fn first_capture(re: &Regex, text: &str) -> Option<f64> {
    re.captures_iter(text).find_map(|c| parse_number(&c[1]))
}

// ----------------------------------------------------------------------------
// Bedrooms
// ----------------------------------------------------------------------------

fn beds_from_json_ld(page: &PageView) -> Option<FieldValue> {
    find_key(page.listing_nodes(), &["numberOfBedrooms", "numberOfBedroomsTotal"], count).map(FieldValue::Number)
}

fn beds_from_state(page: &PageView) -> Option<FieldValue> {
    find_key(&page.embedded, &["bedrooms", "beds", "bedroomCount"], count).map(FieldValue::Number)
}

fn beds_from_facts(page: &PageView) -> Option<FieldValue> {
    page.fact(&["bedroom", "beds"])
        .and_then(parse_number)
        .and_then(|n| in_range(n, 0.0, MAX_ROOMS))
        .map(FieldValue::Number)
}

fn beds_from_text(page: &PageView) -> Option<FieldValue> {
    first_capture(&BEDS_TEXT, &page.text).map(FieldValue::Number)
}

// ----------------------------------------------------------------------------
// Bathrooms
// ----------------------------------------------------------------------------

fn baths_from_json_ld(page: &PageView) -> Option<FieldValue> {
    find_key(page.listing_nodes(), &["numberOfBathroomsTotal"], count)
        .or_else(|| {
            // Full baths plus half credit for partials.
            find_object(page.listing_nodes(), |obj| {
                let full = obj.get("numberOfFullBathrooms").and_then(count)?;
                let partial = obj.get("numberOfPartialBathrooms").and_then(count).unwrap_or(0.0);
                Some(full + partial * 0.5)
            })
        })
        .map(FieldValue::Number)
}

fn baths_from_state(page: &PageView) -> Option<FieldValue> {
    find_key(&page.embedded, &["bathrooms", "bathroomsFloat", "baths", "bathroomCount"], count).map(FieldValue::Number)
}

fn baths_from_facts(page: &PageView) -> Option<FieldValue> {
    page.fact(&["bathroom", "baths"])
        .and_then(parse_number)
        .and_then(|n| in_range(n, 0.0, MAX_ROOMS))
        .map(FieldValue::Number)
}

fn baths_from_text(page: &PageView) -> Option<FieldValue> {
    first_capture(&BATHS_TEXT, &page.text).map(FieldValue::Number)
}

// ----------------------------------------------------------------------------
// Living area
// ----------------------------------------------------------------------------

fn sqft_from_json_ld(page: &PageView) -> Option<FieldValue> {
    find_key(page.listing_nodes(), &["floorSize"], area).map(FieldValue::Number)
}

fn sqft_from_state(page: &PageView) -> Option<FieldValue> {
    find_key(&page.embedded, &["livingArea", "livingAreaValue", "finishedSqFt", "sqft"], area).map(FieldValue::Number)
}

fn sqft_from_facts(page: &PageView) -> Option<FieldValue> {
    page.fact(&["living area", "square feet", "sqft", "sq ft", "interior area", "finished area"])
        .and_then(parse_number)
        .and_then(|n| in_range(n, MIN_SQFT, MAX_SQFT))
        .map(FieldValue::Number)
}

fn sqft_from_text(page: &PageView) -> Option<FieldValue> {
    SQFT_TEXT
        .captures_iter(&page.text)
        .filter(|c| {
            // "5,000 sqft lot" describes the lot, not the house.
            let rest = &page.text[c.get(0).map_or(0, |m| m.end())..];
            !rest.trim_start().to_ascii_lowercase().starts_with("lot")
        })
        .find_map(|c| parse_number(&c[1]).and_then(|n| in_range(n, MIN_SQFT, MAX_SQFT)))
        .map(FieldValue::Number)
}

// ----------------------------------------------------------------------------
// Lot size
// ----------------------------------------------------------------------------

fn lot_text(amount: f64, unit: &str) -> Option<String> {
    let unit = unit.to_ascii_lowercase();
    let unit = if unit.starts_with("ac") { "acres" } else { "sqft" };
    let amount = if unit == "acres" {
        format!("{}", (amount * 100.0).round() / 100.0)
    } else {
        format!("{}", amount.round())
    };
    (amount != "0").then(|| format!("{amount} {unit}"))
}

fn lot_from_json_ld(page: &PageView) -> Option<FieldValue> {
    find_key(page.listing_nodes(), &["lotSize"], |v| {
        let amount = number_from_json(v)?;
        let unit = v
            .get("unitText")
            .or_else(|| v.get("unitCode"))
            .and_then(Value::as_str)
            .unwrap_or("sqft");
        // UN/CEFACT codes: ACR = acre, FTK = square foot.
        let unit = if unit.eq_ignore_ascii_case("ACR") { "acres" } else { unit };
        lot_text(amount, unit)
    })
    .map(FieldValue::Text)
}

fn lot_from_state(page: &PageView) -> Option<FieldValue> {
    find_object(&page.embedded, |obj| {
        let amount = obj.get("lotAreaValue").and_then(number_from_json)?;
        let unit = str_field(obj, &["lotAreaUnits", "lotAreaUnit"]).unwrap_or("sqft");
        lot_text(amount, unit)
    })
    .or_else(|| find_key(&page.embedded, &["lotSize", "lotSizeSqFt"], |v| lot_text(number_from_json(v)?, "sqft")))
    .map(FieldValue::Text)
}

fn lot_from_facts(page: &PageView) -> Option<FieldValue> {
    page.fact(&["lot size", "lot area", "lot"])
        .and_then(clean_text)
        .map(FieldValue::Text)
}

fn lot_from_text(page: &PageView) -> Option<FieldValue> {
    LOT_TEXT
        .captures(&page.text)
        .and_then(|c| lot_text(parse_number(&c[1])?, &c[2]))
        .map(FieldValue::Text)
}

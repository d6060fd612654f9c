use crate::value::Money;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static MONEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?P<sym>[$€£])?\s*(?P<num>\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)\s*(?P<mult>[km]\b|million\b|thousand\b)?")
        .unwrap()
});
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?").unwrap());

/// Parses free-form price text: `$1,250,000`, `$1.25M`, `850K`, `1250000`.
pub fn parse_money(text: &str, default_currency: &str) -> Option<Money> {
    let caps = MONEY.captures(text)?;
    let mut amount: f64 = caps["num"].replace(',', "").parse().ok()?;
    match caps.name("mult").map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
        Some("k") | Some("thousand") => amount *= 1_000.0,
        Some("m") | Some("million") => amount *= 1_000_000.0,
        _ => {}
    }
    let currency = match caps.name("sym").map(|m| m.as_str()) {
        Some("€") => "EUR",
        Some("£") => "GBP",
        Some("$") => "USD",
        _ => default_currency,
    };
    money(amount, currency)
}

/// Price from a JSON value that is either a number or a price string.
pub fn money_from_json(value: &Value, currency: &str) -> Option<Money> {
    match value {
        Value::Number(n) => money(n.as_f64()?, currency),
        Value::String(s) => parse_money(s, currency),
        _ => None,
    }
}

fn money(amount: f64, currency: &str) -> Option<Money> {
    // Sub-thousand figures are fees or monthly estimates, not list prices.
    (amount.is_finite() && amount >= 1_000.0).then(|| Money {
        amount: amount.round() as u64,
        currency: currency.to_ascii_uppercase(),
    })
}

/// First number in a string, commas stripped: `"2,100 sqft"` → 2100.
pub fn parse_number(text: &str) -> Option<f64> {
    NUMBER
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
        .filter(|n: &f64| n.is_finite())
}

/// Number from a JSON value: a number, a numeric string, or a QuantitativeValue `{value}`.
pub fn number_from_json(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        Value::Object(map) => map.get("value").and_then(number_from_json),
        _ => None,
    }
}

pub fn in_range(n: f64, min: f64, max: f64) -> Option<f64> {
    (n >= min && n <= max).then_some(n)
}

/// Trims, collapses whitespace, and drops empty results.
pub fn clean_text(text: &str) -> Option<String> {
    let cleaned = super::page::collapse_ws(text);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Order-preserving de-duplication.
pub fn dedup<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// `SINGLE_FAMILY` / `SingleFamilyResidence` / `single-family` → `Single Family`.
pub fn humanize(raw: &str) -> Option<String> {
    let mut spaced = String::with_capacity(raw.len() + 8);
    let mut prev_lower = false;
    for c in raw.chars() {
        if c == '_' || c == '-' {
            spaced.push(' ');
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower {
            spaced.push(' ');
        }
        prev_lower = c.is_lowercase();
        spaced.push(c);
    }
    let words: Vec<String> = spaced
        .split_whitespace()
        .map(|w| {
            let lower = w.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    clean_text(&words.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn money_formats() {
        assert_eq!(parse_money("$1,250,000", "USD").unwrap().amount, 1_250_000);
        assert_eq!(parse_money("Listed at $1.25M", "USD").unwrap().amount, 1_250_000);
        assert_eq!(parse_money("850K", "USD").unwrap().amount, 850_000);
        assert_eq!(parse_money("£450,000", "USD").unwrap().currency, "GBP");
        assert_eq!(parse_money("499000", "cad").unwrap().currency, "CAD");
        assert!(parse_money("$250/mo HOA", "USD").is_none());
        assert!(parse_money("call for price", "USD").is_none());
    }

    #[test]
    fn money_from_json_values() {
        assert_eq!(money_from_json(&json!(525000), "USD").unwrap().amount, 525_000);
        assert_eq!(money_from_json(&json!("$525,000"), "USD").unwrap().amount, 525_000);
        assert!(money_from_json(&json!(null), "USD").is_none());
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_number("2,100 sqft"), Some(2100.0));
        assert_eq!(parse_number("2.5 baths"), Some(2.5));
        assert_eq!(parse_number("none"), None);
        assert_eq!(number_from_json(&json!({"value": "1,850", "unitCode": "FTK"})), Some(1850.0));
    }

    #[test]
    fn humanize_type_names() {
        assert_eq!(humanize("SINGLE_FAMILY").as_deref(), Some("Single Family"));
        assert_eq!(humanize("SingleFamilyResidence").as_deref(), Some("Single Family Residence"));
        assert_eq!(humanize("condo").as_deref(), Some("Condo"));
    }

    #[test]
    fn dedup_keeps_first_seen_order() {
        assert_eq!(dedup(vec![3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }
}

//! Parsed, immutable digest of a listing page.
//!
//! `scraper::Html` is neither `Send` nor `Sync`, so the document is walked once
//! and everything the matchers need is copied into plain owned data that can be
//! shared across extractor tasks behind an `Arc`.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashMap;
use url::Url;

static JSON_LD: Lazy<Selector> = Lazy::new(|| sel("script[type='application/ld+json']"));
static EMBEDDED_JSON: Lazy<Selector> =
    Lazy::new(|| sel("script#__NEXT_DATA__, script[type='application/json']"));
static META: Lazy<Selector> = Lazy::new(|| sel("meta[content]"));
static ITEM_PROP: Lazy<Selector> = Lazy::new(|| sel("[itemprop]"));
static DT: Lazy<Selector> = Lazy::new(|| sel("dt"));
static TABLE_ROW: Lazy<Selector> = Lazy::new(|| sel("tr"));
static TH_TD: Lazy<Selector> = Lazy::new(|| sel("th, td"));
static LIST_ITEM: Lazy<Selector> = Lazy::new(|| sel("li"));
static FEATURE_ITEM: Lazy<Selector> =
    Lazy::new(|| sel("[class*='feature'] li, [class*='amenit'] li, [id*='feature'] li"));
static TITLE: Lazy<Selector> = Lazy::new(|| sel("title"));
static HEADING: Lazy<Selector> = Lazy::new(|| sel("h1, h2"));
static BODY: Lazy<Selector> = Lazy::new(|| sel("body"));
static IMG: Lazy<Selector> = Lazy::new(|| sel("img, source[srcset]"));
static SKIP_TEXT: Lazy<Selector> = Lazy::new(|| sel("script, style, noscript, template"));

fn sel(css: &str) -> Selector {
    // Selectors above are literals; a parse failure is a programming error caught by tests.
    Selector::parse(css).unwrap_or_else(|_| panic!("invalid selector literal: {css}"))
}

#[derive(Debug, Clone, Default)]
pub struct PageView {
    pub base_url: Option<Url>,
    /// JSON-LD nodes, `@graph` members flattened, in document order.
    pub json_ld: Vec<Value>,
    /// Application state blobs such as `__NEXT_DATA__`.
    pub embedded: Vec<Value>,
    meta: HashMap<String, Vec<String>>,
    item_props: Vec<(String, String)>,
    /// Labelled pairs from definition lists, tables and `Label: value` items.
    pub facts: Vec<(String, String)>,
    pub feature_items: Vec<String>,
    pub title: Option<String>,
    pub headings: Vec<String>,
    pub image_sources: Vec<String>,
    /// Visible text, whitespace collapsed.
    pub text: String,
}

impl PageView {
    pub fn parse(html: &str, base_url: Option<&Url>) -> Self {
        let document = Html::parse_document(html);

        let json_ld = document
            .select(&JSON_LD)
            .filter_map(|el| serde_json::from_str::<Value>(&el.text().collect::<String>()).ok())
            .flat_map(flatten_ld)
            .collect();

        let embedded = document
            .select(&EMBEDDED_JSON)
            .filter_map(|el| serde_json::from_str::<Value>(el.text().collect::<String>().trim()).ok())
            .flat_map(expand_nested_json)
            .collect();

        let mut meta: HashMap<String, Vec<String>> = HashMap::new();
        for el in document.select(&META) {
            let key = ["property", "name", "itemprop"]
                .iter()
                .find_map(|attr| el.value().attr(attr));
            if let (Some(key), Some(content)) = (key, el.value().attr("content")) {
                meta.entry(key.to_ascii_lowercase())
                    .or_default()
                    .push(content.trim().to_string());
            }
        }

        let item_props = document
            .select(&ITEM_PROP)
            .filter_map(|el| {
                let name = el.value().attr("itemprop")?.to_string();
                let value = el
                    .value()
                    .attr("content")
                    .map(str::to_string)
                    .unwrap_or_else(|| element_text(&el));
                (!value.is_empty()).then_some((name, value))
            })
            .collect();

        Self {
            base_url: base_url.cloned(),
            json_ld,
            embedded,
            meta,
            item_props,
            facts: collect_facts(&document),
            feature_items: document
                .select(&FEATURE_ITEM)
                .map(|el| element_text(&el))
                .filter(|t| !t.is_empty())
                .collect(),
            title: document
                .select(&TITLE)
                .next()
                .map(|el| element_text(&el))
                .filter(|t| !t.is_empty()),
            headings: document
                .select(&HEADING)
                .map(|el| element_text(&el))
                .filter(|t| !t.is_empty())
                .collect(),
            image_sources: collect_image_sources(&document),
            text: visible_text(&document),
        }
    }

    /// First meta tag value for a `property`/`name`/`itemprop` key.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta_all(key).first().map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn meta_all(&self, key: &str) -> &[String] {
        self.meta
            .get(&key.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn item_prop(&self, name: &str) -> Option<&str> {
        self.item_props
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of the first fact whose label contains any of `needles` (case-insensitive).
    pub fn fact(&self, needles: &[&str]) -> Option<&str> {
        self.facts
            .iter()
            .find(|(label, _)| {
                let label = label.to_lowercase();
                needles.iter().any(|n| label.contains(n))
            })
            .map(|(_, v)| v.as_str())
    }

    /// JSON-LD nodes whose `@type` names a property or listing.
    pub fn listing_nodes(&self) -> impl Iterator<Item = &Value> {
        self.json_ld.iter().filter(|node| is_listing_node(node))
    }

    pub fn resolve_url(&self, raw: &str) -> Option<Url> {
        let raw = raw.trim();
        let url = match &self.base_url {
            Some(base) => base.join(raw).ok()?,
            None => Url::parse(raw).ok()?,
        };
        matches!(url.scheme(), "http" | "https").then_some(url)
    }
}

const LISTING_TYPES: [&str; 12] = [
    "residence",
    "singlefamilyresidence",
    "house",
    "apartment",
    "accommodation",
    "apartmentcomplex",
    "realestatelisting",
    "product",
    "offer",
    "place",
    "townhouse",
    "condominium",
];

fn node_types(node: &Value) -> Vec<String> {
    match node.get("@type") {
        Some(Value::String(t)) => vec![t.to_ascii_lowercase()],
        Some(Value::Array(ts)) => ts
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_ascii_lowercase)
            .collect(),
        _ => Vec::new(),
    }
}

fn is_listing_node(node: &Value) -> bool {
    node_types(node).iter().any(|t| LISTING_TYPES.contains(&t.as_str()))
}

fn flatten_ld(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.into_iter().flat_map(flatten_ld).collect(),
        Value::Object(mut map) => {
            let graph = map.remove("@graph");
            let mut nodes = vec![Value::Object(map)];
            if let Some(graph) = graph {
                nodes.extend(flatten_ld(graph));
            }
            nodes
        }
        _ => Vec::new(),
    }
}

/// Some sites ship their property cache as JSON-encoded strings inside the state
/// blob. Each decodable nested document becomes an extra root.
fn expand_nested_json(value: Value) -> Vec<Value> {
    let mut nested = Vec::new();
    collect_json_strings(&value, 0, &mut nested);
    let mut roots = vec![value];
    for raw in nested {
        if let Ok(inner) = serde_json::from_str::<Value>(&raw) {
            roots.extend(expand_nested_json(inner));
        }
    }
    roots
}

fn collect_json_strings(value: &Value, depth: usize, out: &mut Vec<String>) {
    if depth > 32 {
        return;
    }
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.len() > 2 && s.starts_with('{') && s.ends_with('}') {
                out.push(s.to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_json_strings(v, depth + 1, out)),
        Value::Object(map) => map.values().for_each(|v| collect_json_strings(v, depth + 1, out)),
        _ => {}
    }
}

pub(crate) fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(el: &ElementRef) -> String {
    collapse_ws(&el.text().collect::<Vec<_>>().join(" "))
}

fn collect_facts(document: &Html) -> Vec<(String, String)> {
    let mut facts = Vec::new();

    // 1. <dt>label</dt><dd>value</dd>
    for dt in document.select(&DT) {
        let dd = dt
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() != "dt");
        if let Some(dd) = dd.filter(|el| el.value().name() == "dd") {
            facts.push((element_text(&dt), element_text(&dd)));
        }
    }

    // 2. <tr><th>label</th><td>value</td></tr>
    for row in document.select(&TABLE_ROW) {
        let cells: Vec<String> = row.select(&TH_TD).map(|c| element_text(&c)).collect();
        if let [label, value] = cells.as_slice() {
            facts.push((label.clone(), value.clone()));
        }
    }

    // 3. <li>Label: value</li>
    for li in document.select(&LIST_ITEM) {
        let text = element_text(&li);
        if let Some((label, value)) = text.split_once(':') {
            let (label, value) = (label.trim(), value.trim());
            if !label.is_empty() && label.len() <= 40 && !value.is_empty() {
                facts.push((label.to_string(), value.to_string()));
            }
        }
    }

    facts.retain(|(l, v)| !l.is_empty() && !v.is_empty());
    facts
}

fn collect_image_sources(document: &Html) -> Vec<String> {
    document
        .select(&IMG)
        .filter_map(|el| {
            let attrs = el.value();
            attrs
                .attr("src")
                .or_else(|| attrs.attr("data-src"))
                .map(str::to_string)
                .or_else(|| {
                    // First candidate of a srcset: "url 1x, url2 2x"
                    attrs
                        .attr("srcset")
                        .and_then(|s| s.split(',').next())
                        .and_then(|c| c.split_whitespace().next())
                        .map(str::to_string)
                })
        })
        .filter(|src| !src.starts_with("data:"))
        .collect()
}

fn visible_text(document: &Html) -> String {
    let Some(body) = document.select(&BODY).next() else {
        return String::new();
    };
    let skipped: Vec<_> = body.select(&SKIP_TEXT).map(|el| el.id()).collect();
    let mut parts = Vec::new();
    for node in body.descendants() {
        if let Some(text) = node.value().as_text() {
            let hidden = node
                .ancestors()
                .any(|a| skipped.contains(&a.id()));
            if !hidden {
                parts.push(&**text);
            }
        }
    }
    collapse_ws(&parts.join(" "))
}

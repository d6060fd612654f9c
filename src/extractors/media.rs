use super::json::find_key;
use super::normalize::dedup;
use super::page::PageView;
use super::Matcher;
use crate::value::FieldValue;
use serde_json::Value;
use url::Url;

const MAX_IMAGES: usize = 50;
const IMAGE_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".webp", ".avif", ".gif"];
// Chrome, trackers and placeholders that are never listing photos.
const IGNORED_FRAGMENTS: [&str; 9] = [
    "1x1", "pixel", "logo", "icon", "sprite", "avatar", "placeholder", "badge", ".svg",
];

pub(super) const IMAGES: &[Matcher] = &[images_from_json_ld, images_from_state, images_from_meta, images_from_markup];

fn looks_like_photo(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    let full = url.as_str().to_ascii_lowercase();
    !IGNORED_FRAGMENTS.iter().any(|f| full.contains(f))
        && (IMAGE_EXTENSIONS.iter().any(|e| path.ends_with(e))
            || ["/photo", "/image", "/media/", "/fp/"].iter().any(|s| path.contains(s)))
}

fn url_list(page: &PageView, raw: Vec<&str>) -> Option<FieldValue> {
    let urls: Vec<Url> = raw
        .into_iter()
        .filter_map(|r| page.resolve_url(r))
        .filter(looks_like_photo)
        .collect();
    let urls: Vec<Url> = dedup(urls).into_iter().take(MAX_IMAGES).collect();
    (!urls.is_empty()).then_some(FieldValue::UrlList(urls))
}

/// `"url"`, `["url", ...]`, or ImageObject `{url|contentUrl}` (possibly in an array).
fn ld_image_urls(value: &Value) -> Vec<&str> {
    match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().flat_map(ld_image_urls).collect(),
        Value::Object(obj) => ["contentUrl", "url"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .into_iter()
            .collect(),
        _ => Vec::new(),
    }
}

fn images_from_json_ld(page: &PageView) -> Option<FieldValue> {
    let raw = page
        .listing_nodes()
        .filter_map(|node| node.get("image").or_else(|| node.get("photo")))
        .flat_map(ld_image_urls)
        .collect();
    url_list(page, raw)
}

/// First image-looking string anywhere under `value`.
fn first_image_string(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => {
            let lower = s.to_ascii_lowercase();
            let is_image = lower.starts_with("http")
                && (IMAGE_EXTENSIONS.iter().any(|e| lower.split('?').next().unwrap_or("").ends_with(e))
                    || lower.contains("/photo")
                    || lower.contains("/fp/"));
            is_image.then_some(s.as_str())
        }
        Value::Array(items) => items.iter().find_map(first_image_string),
        Value::Object(obj) => ["url", "src", "href"]
            .iter()
            .filter_map(|k| obj.get(*k))
            .chain(obj.values())
            .find_map(first_image_string),
        _ => None,
    }
}

fn images_from_state(page: &PageView) -> Option<FieldValue> {
    // One URL per gallery entry; entries usually carry several renditions.
    find_key(&page.embedded, &["responsivePhotos", "photos", "images", "media"], |v| {
        let raw: Vec<&str> = v.as_array()?.iter().filter_map(first_image_string).collect();
        url_list(page, raw)
    })
}

fn images_from_meta(page: &PageView) -> Option<FieldValue> {
    let raw = ["og:image", "og:image:url", "twitter:image"]
        .iter()
        .flat_map(|k| page.meta_all(k))
        .map(String::as_str)
        .collect();
    url_list(page, raw)
}

fn images_from_markup(page: &PageView) -> Option<FieldValue> {
    url_list(page, page.image_sources.iter().map(String::as_str).collect())
}

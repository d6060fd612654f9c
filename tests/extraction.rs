use listing_extractor::{
    Extractor, ExtractorConfig, FetchConfig, FieldSchema, PageFetcher,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PARTIAL_LISTING: &str = r#"<!doctype html>
<html>
<head>
  <title>123 Main St, Springfield, IL 62701 | Homes for sale</title>
  <script type="application/ld+json">
  {
    "@context": "https://schema.org",
    "@type": "SingleFamilyResidence",
    "address": {
      "@type": "PostalAddress",
      "streetAddress": "123 Main St",
      "addressLocality": "Springfield",
      "addressRegion": "IL",
      "postalCode": "62701"
    },
    "numberOfBedrooms": 3,
    "numberOfBathroomsTotal": 2,
    "description": "Charming brick home on a quiet street close to parks and schools.",
    "image": ["https://photos.example.com/p/front.jpg", "https://photos.example.com/p/kitchen.jpg"],
    "offers": {"@type": "Offer", "price": "425000", "priceCurrency": "USD"}
  }
  </script>
</head>
<body>
  <h1>123 Main St, Springfield, IL 62701</h1>
  <p>Open house this weekend.</p>
</body>
</html>"#;

fn extractor() -> Extractor {
    let fetcher = PageFetcher::new(&FetchConfig {
        timeout: Duration::from_secs(5),
        max_redirects: 3,
    })
    .unwrap();
    Extractor::new(Arc::new(fetcher), FieldSchema::listing(), ExtractorConfig::default())
}

async fn serve(status: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/homedetails/123-main-st/"))
        .and(header_exists("user-agent"))
        .respond_with(
            ResponseTemplate::new(status).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn partial_listing_is_a_success() {
    let server = serve(200, PARTIAL_LISTING).await;
    let url = format!("{}/homedetails/123-main-st/", server.uri());

    let result = extractor().extract(&url).await;

    assert!(result.success, "{:?}", result.error);
    assert!(result.error.is_none());
    assert!(result.validation.overall_valid);
    assert!(result.validation.missing_required.is_empty());
    assert_eq!(result.validation.missing_important, vec!["mlsId"]);
    assert!(result.missing_fields.contains(&"squareFeet".to_string()));
    assert!(result.missing_fields.contains(&"mlsId".to_string()));
    for name in ["address", "price", "bedrooms", "bathrooms"] {
        assert!(result.extracted_fields.contains(&name.to_string()), "{name} not extracted");
    }
    assert!(result
        .extracted_fields
        .iter()
        .all(|f| !result.missing_fields.contains(f)));
    let mut all: Vec<String> = result
        .extracted_fields
        .iter()
        .chain(&result.missing_fields)
        .cloned()
        .collect();
    all.sort();
    let mut expected = FieldSchema::listing().names();
    expected.sort();
    assert_eq!(all, expected);

    let data = result.data.expect("partial data");
    assert_eq!(data.address.as_deref(), Some("123 Main St, Springfield, IL 62701"));
    assert_eq!(data.price, Some(425_000));
    assert_eq!(data.currency.as_deref(), Some("USD"));
    assert_eq!(data.bedrooms, Some(3.0));
    assert_eq!(data.bathrooms, Some(2.0));
    assert_eq!(data.square_feet, None);
    assert_eq!(data.mls_id, None);
    assert_eq!(data.images.len(), 2);
}

#[tokio::test]
async fn not_found_page_fails_with_every_field_missing() {
    let server = serve(404, "<html><body>Not found</body></html>").await;
    let url = format!("{}/homedetails/123-main-st/", server.uri());

    let result = extractor().extract(&url).await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("404"));
    assert!(result.extracted_fields.is_empty());
    assert_eq!(result.missing_fields, FieldSchema::listing().names());
    assert!(result.data.is_none());
}

#[tokio::test]
async fn challenge_page_is_not_mistaken_for_a_listing() {
    let server = serve(
        200,
        "<html><body><h1>Press &amp; Hold to confirm you are a human</h1><div id=\"px-captcha\"></div></body></html>",
    )
    .await;
    let url = format!("{}/homedetails/123-main-st/", server.uri());

    let result = extractor().extract(&url).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("anti-bot"));
    assert!(result.extracted_fields.is_empty());
}

#[tokio::test]
async fn repeated_extraction_is_deterministic() {
    let server = serve(200, PARTIAL_LISTING).await;
    let url = format!("{}/homedetails/123-main-st/", server.uri());
    let ex = extractor();

    let first = serde_json::to_string(&ex.extract(&url).await).unwrap();
    let second = serde_json::to_string(&ex.extract(&url).await).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn unreachable_host_is_a_failure_not_a_panic() {
    let result = extractor().extract("http://127.0.0.1:1/homedetails/x/").await;
    assert!(!result.success);
    assert!(result.error.is_some());
    assert_eq!(result.validation.score, 0);
}

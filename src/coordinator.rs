use crate::extractors::{self, PageView};
use crate::fetcher::{PageSource, RawContent};
use crate::schema::{Field, FieldSchema, Tier};
use crate::validator::{validate, ValidationReport};
use crate::value::{FieldValue, ListingData, RawExtraction};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// What a caller gets back for one listing URL.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ListingData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub extracted_fields: Vec<String>,
    pub missing_fields: Vec<String>,
    pub validation: ValidationReport,
}

impl ExtractionResult {
    /// Result for an attempt that never got page content.
    pub fn failed(schema: &FieldSchema, error: impl Into<String>) -> Self {
        let validation = validate(&RawExtraction::new(), schema);
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            extracted_fields: Vec::new(),
            missing_fields: schema.names(),
            validation,
        }
    }

    /// Classifies a raw extraction: success iff every required field was recovered.
    pub fn from_raw(raw: &RawExtraction, schema: &FieldSchema) -> Self {
        let validation = validate(raw, schema);
        let error = (!validation.overall_valid).then(|| {
            format!(
                "missing required fields: {}",
                validation.missing_required.join(", ")
            )
        });
        Self {
            success: validation.overall_valid,
            data: (!raw.is_empty()).then(|| raw.to_listing()),
            error,
            extracted_fields: validation.extracted_fields.clone(),
            missing_fields: validation.missing_fields.clone(),
            validation,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Upper bound on the fan-in barrier for one page's field tasks.
    pub field_timeout: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            field_timeout: Duration::from_secs(2),
        }
    }
}

/// Fetch → extract every field → validate.
#[derive(Clone)]
pub struct Extractor {
    source: Arc<dyn PageSource>,
    schema: Arc<FieldSchema>,
    config: ExtractorConfig,
}

impl Extractor {
    pub fn new(source: Arc<dyn PageSource>, schema: FieldSchema, config: ExtractorConfig) -> Self {
        Self {
            source,
            schema: Arc::new(schema),
            config,
        }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub async fn extract(&self, url: &str) -> ExtractionResult {
        let span = tracing::info_span!("extract", request_id = %Uuid::new_v4(), %url);
        async move {
            let content = match self.source.fetch(url).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        transient = e.is_transient(),
                        status_code = e.status_code(),
                        "❌ fetch failed"
                    );
                    return ExtractionResult::failed(&self.schema, e.to_string());
                }
            };
            tracing::debug!(
                status = content.status,
                requested = %content.requested_url,
                final_url = %content.final_url,
                bytes = content.html.len(),
                "page fetched"
            );

            let raw = self.extract_content(&content).await;
            let result = ExtractionResult::from_raw(&raw, &self.schema);
            tracing::info!(
                success = result.success,
                extracted = result.extracted_fields.len(),
                missing = result.missing_fields.len(),
                score = result.validation.score,
                "✅ extraction finished"
            );
            result
        }
        .instrument(span)
        .await
    }

    /// Runs every field's cascade as its own task and waits for all of them.
    pub async fn extract_content(&self, content: &RawContent) -> RawExtraction {
        let page = Arc::new(PageView::parse(&content.html, Some(&content.final_url)));
        self.extract_page(page).await
    }

    pub async fn extract_page(&self, page: Arc<PageView>) -> RawExtraction {
        let mut tasks = JoinSet::new();
        for field in self.schema.fields() {
            let page = Arc::clone(&page);
            tasks.spawn(async move { (field, extractors::extract_field(field, &page)) });
        }

        let mut found: Vec<(Field, FieldValue)> = Vec::new();
        let barrier = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((field, Some(value))) => found.push((field, value)),
                    Ok((_, None)) => {}
                    Err(e) => tracing::error!(error = %e, "field extractor task failed"),
                }
            }
        };
        if tokio::time::timeout(self.config.field_timeout, barrier).await.is_err() {
            tracing::warn!(
                timeout_ms = self.config.field_timeout.as_millis() as u64,
                "field extractors timed out, treating unfinished fields as absent"
            );
        }
        tasks.abort_all();

        let mut raw = RawExtraction::new();
        for (field, value) in found {
            if let Err(e) = raw.insert(field, value) {
                tracing::warn!(error = %e, "discarding mis-shaped value");
            }
        }
        for spec in self.schema.specs() {
            if spec.tier == Tier::Required && !raw.contains(spec.field) {
                tracing::debug!(field = spec.name(), "required field not found");
            }
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchError;
    use async_trait::async_trait;
    use url::Url;

    struct Fixed(Result<RawContent, FetchError>);

    #[async_trait]
    impl PageSource for Fixed {
        async fn fetch(&self, _url: &str) -> Result<RawContent, FetchError> {
            self.0.clone()
        }
    }

    fn content(html: &str) -> RawContent {
        RawContent {
            requested_url: "https://www.example.com/homedetails/1/".into(),
            final_url: Url::parse("https://www.example.com/homedetails/1/").unwrap(),
            status: 200,
            html: html.into(),
        }
    }

    fn extractor(source: Fixed) -> Extractor {
        Extractor::new(Arc::new(source), FieldSchema::listing(), ExtractorConfig::default())
    }

    #[tokio::test]
    async fn fetch_failure_reports_every_field_missing() {
        let ex = extractor(Fixed(Err(FetchError::Status { status_code: 404 })));
        let result = ex.extract("https://www.example.com/gone").await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("listing page returned HTTP 404"));
        assert!(result.extracted_fields.is_empty());
        assert_eq!(result.missing_fields, FieldSchema::listing().names());
        assert!(!result.validation.overall_valid);
        assert!(result.data.is_none());
    }

    #[tokio::test]
    async fn missing_required_field_is_a_failure_with_partial_data() {
        let ex = extractor(Fixed(Ok(content("<body><h1>2 beds 1 bath</h1></body>"))));
        let result = ex.extract("https://www.example.com/homedetails/1/").await;
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("missing required fields: address, price")
        );
        assert_eq!(result.data.unwrap().bedrooms, Some(2.0));
    }

    #[tokio::test]
    async fn parallel_and_sequential_extraction_agree() {
        let html = r#"<body><h1>8 Elm St, Salem, MA 01970</h1><p>$799,000 4 bd 3 ba 2,400 sqft</p></body>"#;
        let ex = extractor(Fixed(Ok(content(html))));
        let page = PageView::parse(html, None);
        let sequential = extractors::extract_all(&page, ex.schema());
        let parallel = ex.extract_page(Arc::new(page)).await;
        assert_eq!(sequential, parallel);
        assert_eq!(parallel.len(), 5);
    }

    #[tokio::test]
    async fn result_fields_partition_the_schema() {
        let html = r#"<body><h1>8 Elm St, Salem, MA 01970</h1><p>$799,000 4 bd 3 ba</p></body>"#;
        let result = extractor(Fixed(Ok(content(html)))).extract("https://www.example.com/homedetails/1/").await;
        assert!(result.success);

        let schema = FieldSchema::listing();
        let extracted: Vec<String> = schema
            .names()
            .into_iter()
            .filter(|n| result.extracted_fields.contains(n))
            .collect();
        let missing: Vec<String> = schema
            .names()
            .into_iter()
            .filter(|n| result.missing_fields.contains(n))
            .collect();
        // Same members, schema order, nothing in both.
        assert_eq!(extracted, result.extracted_fields);
        assert_eq!(missing, result.missing_fields);
        assert_eq!(extracted.len() + missing.len(), schema.specs().len());
        assert_eq!(result.extracted_fields[..4], ["address", "price", "bedrooms", "bathrooms"]);
    }

    #[test]
    fn serializes_with_camel_case_and_omits_absent_parts() {
        let result = ExtractionResult::failed(&FieldSchema::listing(), "boom");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "boom");
        assert!(json.get("data").is_none());
        assert_eq!(json["validation"]["overallValid"], false);
        assert_eq!(json["missingFields"][4], "squareFeet");
    }
}

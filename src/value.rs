use crate::schema::{Field, Shape};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;
use utoipa::ToSchema;

/// Price in whole currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Money {
    pub amount: u64,
    pub currency: String,
}

/// A recovered value. Each variant corresponds to exactly one `Shape`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Money(Money),
    TextList(Vec<String>),
    UrlList(Vec<Url>),
}

impl FieldValue {
    pub fn shape(&self) -> Shape {
        match self {
            FieldValue::Text(_) => Shape::Scalar,
            FieldValue::Number(_) => Shape::Numeric,
            FieldValue::Money(_) => Shape::Currency,
            FieldValue::TextList(_) => Shape::TextList,
            FieldValue::UrlList(_) => Shape::UrlList,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("field `{field}` expects a {expected:?} value, got {actual:?}")]
pub struct ShapeMismatch {
    pub field: Field,
    pub expected: Shape,
    pub actual: Shape,
}

// ============================================================================
// Raw Extraction
// ============================================================================

/// Field → recovered value for one extraction attempt. Fields not present are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawExtraction {
    values: BTreeMap<Field, FieldValue>,
}

impl RawExtraction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a value, refusing anything that does not match the field's shape.
    pub fn insert(&mut self, field: Field, value: FieldValue) -> Result<(), ShapeMismatch> {
        if value.shape() != field.shape() {
            return Err(ShapeMismatch {
                field,
                expected: field.shape(),
                actual: value.shape(),
            });
        }
        self.values.insert(field, value);
        Ok(())
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.values.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Normalized record view of the recovered values.
    pub fn to_listing(&self) -> ListingData {
        let text = |f: Field| self.get(f).and_then(FieldValue::as_text).map(str::to_string);
        let number = |f: Field| self.get(f).and_then(FieldValue::as_number);

        let (price, currency) = match self.get(Field::Price) {
            Some(FieldValue::Money(m)) => (Some(m.amount), Some(m.currency.clone())),
            _ => (None, None),
        };
        let images = match self.get(Field::Images) {
            Some(FieldValue::UrlList(urls)) => urls.iter().map(Url::to_string).collect(),
            _ => Vec::new(),
        };
        let features = match self.get(Field::Features) {
            Some(FieldValue::TextList(items)) => items.clone(),
            _ => Vec::new(),
        };

        ListingData {
            address: text(Field::Address),
            price,
            currency,
            bedrooms: number(Field::Bedrooms),
            bathrooms: number(Field::Bathrooms),
            square_feet: number(Field::SquareFeet).map(|n| n.round() as u64),
            lot_size: text(Field::LotSize),
            year_built: number(Field::YearBuilt).map(|n| n as u16),
            property_type: text(Field::PropertyType),
            description: text(Field::Description),
            images,
            mls_id: text(Field::MlsId),
            features,
        }
    }
}

/// The normalized property record handed back to callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListingData {
    pub address: Option<String>,
    pub price: Option<u64>,
    pub currency: Option<String>,
    pub bedrooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub square_feet: Option<u64>,
    pub lot_size: Option<String>,
    pub year_built: Option<u16>,
    pub property_type: Option<String>,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub mls_id: Option<String>,
    pub features: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_wrong_shape() {
        let mut raw = RawExtraction::new();
        let err = raw
            .insert(Field::Price, FieldValue::Text("$500,000".into()))
            .unwrap_err();
        assert_eq!(err.expected, Shape::Currency);
        assert_eq!(err.actual, Shape::Scalar);
        assert!(raw.is_empty());
    }

    #[test]
    fn listing_view_maps_each_variant() {
        let mut raw = RawExtraction::new();
        raw.insert(Field::Address, FieldValue::Text("1 Elm St, Austin, TX 78701".into()))
            .unwrap();
        raw.insert(
            Field::Price,
            FieldValue::Money(Money {
                amount: 425_000,
                currency: "USD".into(),
            }),
        )
        .unwrap();
        raw.insert(Field::Bathrooms, FieldValue::Number(2.5)).unwrap();
        raw.insert(Field::SquareFeet, FieldValue::Number(1849.6)).unwrap();
        raw.insert(
            Field::Images,
            FieldValue::UrlList(vec![Url::parse("https://photos.example.com/a.jpg").unwrap()]),
        )
        .unwrap();

        let listing = raw.to_listing();
        assert_eq!(listing.price, Some(425_000));
        assert_eq!(listing.currency.as_deref(), Some("USD"));
        assert_eq!(listing.bathrooms, Some(2.5));
        assert_eq!(listing.square_feet, Some(1850));
        assert_eq!(listing.images, vec!["https://photos.example.com/a.jpg"]);
        assert_eq!(listing.bedrooms, None);
        assert!(listing.features.is_empty());
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Field Catalogue
// ============================================================================

/// Every attribute the extractor knows how to recover from a listing page.
///
/// Declaration order is the order fields appear in results and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Address,
    Price,
    Bedrooms,
    Bathrooms,
    SquareFeet,
    LotSize,
    YearBuilt,
    PropertyType,
    Description,
    Images,
    MlsId,
    Features,
}

impl Field {
    pub const ALL: [Field; 12] = [
        Field::Address,
        Field::Price,
        Field::Bedrooms,
        Field::Bathrooms,
        Field::SquareFeet,
        Field::LotSize,
        Field::YearBuilt,
        Field::PropertyType,
        Field::Description,
        Field::Images,
        Field::MlsId,
        Field::Features,
    ];

    /// Wire name, matching the key used in `ListingData`.
    pub fn name(self) -> &'static str {
        match self {
            Field::Address => "address",
            Field::Price => "price",
            Field::Bedrooms => "bedrooms",
            Field::Bathrooms => "bathrooms",
            Field::SquareFeet => "squareFeet",
            Field::LotSize => "lotSize",
            Field::YearBuilt => "yearBuilt",
            Field::PropertyType => "propertyType",
            Field::Description => "description",
            Field::Images => "images",
            Field::MlsId => "mlsId",
            Field::Features => "features",
        }
    }

    /// The value shape is a property of the field itself, not of configuration.
    pub fn shape(self) -> Shape {
        match self {
            Field::Address | Field::LotSize | Field::PropertyType | Field::Description | Field::MlsId => {
                Shape::Scalar
            }
            Field::Price => Shape::Currency,
            Field::Bedrooms | Field::Bathrooms | Field::SquareFeet | Field::YearBuilt => Shape::Numeric,
            Field::Images => Shape::UrlList,
            Field::Features => Shape::TextList,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SchemaError::UnknownField(s.trim().to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Required,
    Important,
    Optional,
}

impl FromStr for Tier {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "required" => Ok(Tier::Required),
            "important" => Ok(Tier::Important),
            "optional" => Ok(Tier::Optional),
            other => Err(SchemaError::UnknownTier(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Shape {
    Scalar,
    Numeric,
    Currency,
    TextList,
    UrlList,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("field `{0}` is declared more than once")]
    DuplicateField(Field),
    #[error("field `{0}` has no spec")]
    MissingField(Field),
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("unknown tier `{0}` (expected required, important or optional)")]
    UnknownTier(String),
    #[error("malformed tier override `{0}` (expected name=tier)")]
    MalformedOverride(String),
}

// ============================================================================
// Field Schema
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub field: Field,
    pub tier: Tier,
    pub shape: Shape,
}

impl FieldSpec {
    pub fn new(field: Field, tier: Tier) -> Self {
        Self {
            field,
            tier,
            shape: field.shape(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.field.name()
    }
}

/// Ordered, validated set of field specs. Exactly one spec per `Field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    specs: Vec<FieldSpec>,
}

impl FieldSchema {
    pub fn new(specs: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.field) {
                return Err(SchemaError::DuplicateField(spec.field));
            }
        }
        if let Some(missing) = Field::ALL.into_iter().find(|f| !seen.contains(f)) {
            return Err(SchemaError::MissingField(missing));
        }
        Ok(Self { specs })
    }

    /// Default tiers for residential listings. Only the address/price/beds/baths
    /// requirement and the MLS id and square footage tiers are fixed by product;
    /// the rest can be moved with `with_overrides`.
    pub fn listing() -> Self {
        use Field::*;
        let tier = |field: Field| match field {
            Address | Price | Bedrooms | Bathrooms => Tier::Required,
            Description | Images | MlsId => Tier::Important,
            SquareFeet | LotSize | YearBuilt | PropertyType | Features => Tier::Optional,
        };
        Self {
            specs: Field::ALL.into_iter().map(|f| FieldSpec::new(f, tier(f))).collect(),
        }
    }

    /// Applies `name=tier` pairs separated by commas, e.g. `squareFeet=important,mlsId=optional`.
    pub fn with_overrides(mut self, overrides: &str) -> Result<Self, SchemaError> {
        for pair in overrides.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, tier) = pair
                .split_once('=')
                .ok_or_else(|| SchemaError::MalformedOverride(pair.to_string()))?;
            let field: Field = name.parse()?;
            let tier: Tier = tier.parse()?;
            if let Some(spec) = self.specs.iter_mut().find(|s| s.field == field) {
                spec.tier = tier;
            }
        }
        Ok(self)
    }

    pub fn specs(&self) -> &[FieldSpec] {
        &self.specs
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.specs.iter().map(|s| s.field)
    }

    pub fn tier_of(&self, field: Field) -> Option<Tier> {
        self.specs.iter().find(|s| s.field == field).map(|s| s.tier)
    }

    pub fn with_tier(&self, tier: Tier) -> impl Iterator<Item = Field> + '_ {
        self.specs.iter().filter(move |s| s.tier == tier).map(|s| s.field)
    }

    pub fn names(&self) -> Vec<String> {
        self.fields().map(|f| f.name().to_string()).collect()
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::listing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_schema_covers_every_field_once() {
        let schema = FieldSchema::listing();
        assert_eq!(schema.specs().len(), Field::ALL.len());
        assert!(FieldSchema::new(schema.specs().to_vec()).is_ok());
    }

    #[test]
    fn scenario_tiers_are_fixed() {
        let schema = FieldSchema::listing();
        for f in [Field::Address, Field::Price, Field::Bedrooms, Field::Bathrooms] {
            assert_eq!(schema.tier_of(f), Some(Tier::Required));
        }
        assert_eq!(schema.tier_of(Field::MlsId), Some(Tier::Important));
        assert_eq!(schema.tier_of(Field::SquareFeet), Some(Tier::Optional));
    }

    #[test]
    fn rejects_duplicates_and_gaps() {
        let mut specs = FieldSchema::listing().specs().to_vec();
        specs.push(FieldSpec::new(Field::Price, Tier::Optional));
        assert_eq!(FieldSchema::new(specs), Err(SchemaError::DuplicateField(Field::Price)));

        let specs: Vec<_> = FieldSchema::listing()
            .specs()
            .iter()
            .copied()
            .filter(|s| s.field != Field::Images)
            .collect();
        assert_eq!(FieldSchema::new(specs), Err(SchemaError::MissingField(Field::Images)));
    }

    #[test]
    fn overrides_move_tiers_but_not_shapes() {
        let schema = FieldSchema::listing()
            .with_overrides("squareFeet=important, mlsId = optional")
            .unwrap();
        assert_eq!(schema.tier_of(Field::SquareFeet), Some(Tier::Important));
        assert_eq!(schema.tier_of(Field::MlsId), Some(Tier::Optional));
        assert_eq!(schema.specs()[4].shape, Shape::Numeric);
    }

    #[test]
    fn bad_overrides_are_reported() {
        assert!(matches!(
            FieldSchema::listing().with_overrides("garage=required"),
            Err(SchemaError::UnknownField(_))
        ));
        assert!(matches!(
            FieldSchema::listing().with_overrides("price=critical"),
            Err(SchemaError::UnknownTier(_))
        ));
        assert!(matches!(
            FieldSchema::listing().with_overrides("price"),
            Err(SchemaError::MalformedOverride(_))
        ));
    }
}

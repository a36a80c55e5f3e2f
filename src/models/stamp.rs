//! Represents a stamp record in the catalog.

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A single catalog entry for a philatelic item.
///
/// Textual attributes are free text with no enforced format. `image` holds the
/// reference returned by the image store, or an empty string when the stamp
/// was created without an image.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct Stamp {
    /// Identifier assigned at creation. Never changes.
    pub id: Uuid,

    pub title: Option<String>,

    pub year: Option<String>,

    pub description: Option<String>,

    pub country: Option<String>,

    /// Face or market value as entered by the collector (e.g. "1d", "$40").
    pub value: Option<String>,

    /// Classification tag; the only key listing can filter on.
    pub category: Option<String>,

    /// Relative path (`/uploads/...`) or absolute URL of the stored image.
    pub image: String,
}

/// Textual fields supplied when creating a stamp.
///
/// JSON numbers and booleans are accepted and stored as their text form.
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct NewStamp {
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub value: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub category: Option<String>,
}

/// Partial update of a stamp's textual fields.
///
/// Absent fields are left unchanged. There is deliberately no `image` field:
/// an `image` key in an update body is dropped during deserialization.
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct StampPatch {
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub value: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub category: Option<String>,
}

/// One entry of a bulk-import file. Unlike [`NewStamp`] it may carry an
/// already-hosted image reference.
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportedStamp {
    #[serde(flatten)]
    pub fields: NewStamp,

    #[serde(default)]
    pub image: Option<String>,
}

/// Read a string, number or boolean as text. `null` reads as absent.
fn scalar_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Number(serde_json::Number),
        Bool(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
        Scalar::Text(text) => text,
        Scalar::Number(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}

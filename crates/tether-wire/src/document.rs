use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{WireError, WireResult};
use crate::resource::RawResource;

/// The JSON:API media type.
pub const MEDIA_TYPE: &str = "application/vnd.api+json";

/// Primary data of a document: a single resource (possibly `null`) or a
/// collection. Untagged -- the JSON shape is the discriminant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Many(Vec<RawResource>),
    Single(Option<RawResource>),
}

impl PrimaryData {
    /// Primary resources in document order, skipping a `null` single.
    pub fn resources(&self) -> Vec<&RawResource> {
        match self {
            Self::Many(resources) => resources.iter().collect(),
            Self::Single(Some(resource)) => vec![resource],
            Self::Single(None) => Vec::new(),
        }
    }
}

/// A JSON:API error object. `source.pointer` is preserved verbatim so
/// callers can map errors back to the fields they refer to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
}

impl ErrorObject {
    pub fn new(status: u16, title: impl Into<String>) -> Self {
        Self {
            status: Some(status.to_string()),
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.source = Some(ErrorSource {
            pointer: Some(pointer.into()),
        });
        self
    }

    /// The field name a `/data/attributes/...` pointer refers to, if any.
    pub fn attribute_field(&self) -> Option<&str> {
        let pointer = self.source.as_ref()?.pointer.as_deref()?;
        pointer.strip_prefix("/data/attributes/")
    }
}

/// A top-level JSON:API document.
///
/// Response documents carry `data` (with optional `included` side-loads) or
/// `errors`, never both. Request documents carry `data` only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(
        default,
        deserialize_with = "deserialize_data",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<PrimaryData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<RawResource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Distinguish `"data": null` (an explicitly empty to-one, decoded as
/// `Single(None)`) from an absent `data` member (the field default, `None`).
fn deserialize_data<'de, D>(deserializer: D) -> Result<Option<PrimaryData>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let data = Option::<PrimaryData>::deserialize(deserializer)?;
    Ok(Some(data.unwrap_or(PrimaryData::Single(None))))
}

impl Document {
    /// A document with a single primary resource.
    pub fn single(resource: RawResource) -> Self {
        Self {
            data: Some(PrimaryData::Single(Some(resource))),
            ..Self::default()
        }
    }

    /// A document with a resource collection as primary data.
    pub fn collection(resources: Vec<RawResource>) -> Self {
        Self {
            data: Some(PrimaryData::Many(resources)),
            ..Self::default()
        }
    }

    /// An error document.
    pub fn from_errors(errors: Vec<ErrorObject>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }

    /// A document with no content (e.g. a successful `DELETE`).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Primary resources in document order.
    pub fn primary(&self) -> Vec<&RawResource> {
        self.data.as_ref().map(|d| d.resources()).unwrap_or_default()
    }

    /// The single primary resource, or an error for empty/collection data.
    pub fn single_resource(&self) -> WireResult<&RawResource> {
        match &self.data {
            Some(PrimaryData::Single(Some(resource))) => Ok(resource),
            _ => Err(WireError::NoPrimaryData),
        }
    }

    /// Decode a document from JSON text, rejecting shapes JSON:API forbids.
    pub fn from_json(text: &str) -> WireResult<Self> {
        let document: Self = serde_json::from_str(text)
            .map_err(|e| WireError::MalformedDocument(e.to_string()))?;
        if document.data.is_some() && document.has_errors() {
            return Err(WireError::DataAndErrors);
        }
        Ok(document)
    }

    /// Encode to JSON text.
    pub fn to_json(&self) -> WireResult<String> {
        serde_json::to_string(self).map_err(|e| WireError::MalformedDocument(e.to_string()))
    }
}

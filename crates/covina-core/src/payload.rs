//! The processor payload sum type.
//!
//! The original system passed processors' results around as an untyped
//! dictionary and let the distributor probe for keys like `"embedding"` or
//! `"coordinates"`. Here each processor kind gets its own struct; the
//! distributor matches on the enum variant instead of guessing at key
//! presence.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A heterogeneous metadata bag, shared by every payload variant.
pub type Record = HashMap<String, Value>;

/// Which kind of processor produced a [`ProcessorResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessorKind {
    /// Plain-text extraction.
    Text,
    /// Image analysis.
    Image,
    /// Geospatial/coordinate extraction.
    Geospatial,
    /// Audio or video analysis.
    AudioVideo,
    /// Office document (docx/xlsx/pptx) ingestion.
    OfficeDoc,
    /// Email (.eml) ingestion.
    Email,
    /// PDF extraction.
    Pdf,
    /// Archive (zip/tar) inspection.
    Archive,
    /// Web page ingestion.
    Web,
    /// Anything that doesn't fit a specialized kind.
    Generic,
}

/// A relation detected by an upstream processor, prior to validation against
/// a relation definition (see `covina-relations`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedRelation {
    /// Name of the relation type, e.g. `"REFERS_TO"`.
    pub relation_type: String,
    /// Source document/entity id.
    pub source_id: String,
    /// Target document/entity id.
    pub target_id: String,
    /// Relation-specific properties.
    pub properties: Record,
}

/// Geographic coordinates attached to a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoCoordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// Fields common to every payload variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommonFields {
    /// Free-form metadata (file path, mime type, model name, ...).
    pub metadata: Record,
}

macro_rules! payload_variant {
    ($name:ident { $($field:ident: $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone, Default, Serialize, Deserialize)]
        pub struct $name {
            $(
                #[doc = "Variant-specific field."]
                pub $field: $ty,
            )*
            /// Fields every payload variant carries.
            pub common: CommonFields,
        }
    };
}

payload_variant!(TextPayload {
    text_content: String,
    embedding: Option<Vec<f32>>,
    relations: Vec<DetectedRelation>,
});

payload_variant!(ImagePayload {
    embedding: Option<Vec<f32>>,
    exif: Record,
});

payload_variant!(GeospatialPayload {
    coordinates: Option<GeoCoordinates>,
    coordinate_system: String,
    relations: Vec<DetectedRelation>,
});

payload_variant!(AudioVideoPayload {
    transcript: Option<String>,
    embedding: Option<Vec<f32>>,
});

payload_variant!(OfficeDocPayload {
    text_content: Option<String>,
    structured_extract: Record,
    relations: Vec<DetectedRelation>,
});

payload_variant!(EmailPayload {
    text_content: Option<String>,
    headers: Record,
    relations: Vec<DetectedRelation>,
});

payload_variant!(PdfPayload {
    text_content: Option<String>,
    embedding: Option<Vec<f32>>,
    relations: Vec<DetectedRelation>,
});

payload_variant!(ArchivePayload {
    entry_count: usize,
});

payload_variant!(WebPayload {
    text_content: Option<String>,
    embedding: Option<Vec<f32>>,
});

payload_variant!(GenericPayload {});

/// The payload produced by a content processor, tagged by processor kind.
///
/// The distributor's content-category analysis (`covina-distributor`)
/// matches on this enum — it never probes arbitrary keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProcessorPayload {
    /// See [`TextPayload`].
    Text(TextPayload),
    /// See [`ImagePayload`].
    Image(ImagePayload),
    /// See [`GeospatialPayload`].
    Geospatial(GeospatialPayload),
    /// See [`AudioVideoPayload`].
    AudioVideo(AudioVideoPayload),
    /// See [`OfficeDocPayload`].
    OfficeDoc(OfficeDocPayload),
    /// See [`EmailPayload`].
    Email(EmailPayload),
    /// See [`PdfPayload`].
    Pdf(PdfPayload),
    /// See [`ArchivePayload`].
    Archive(ArchivePayload),
    /// See [`WebPayload`].
    Web(WebPayload),
    /// See [`GenericPayload`].
    Generic(GenericPayload),
}

impl ProcessorPayload {
    /// The processor kind tag for this payload.
    #[must_use]
    pub fn kind(&self) -> ProcessorKind {
        match self {
            ProcessorPayload::Text(_) => ProcessorKind::Text,
            ProcessorPayload::Image(_) => ProcessorKind::Image,
            ProcessorPayload::Geospatial(_) => ProcessorKind::Geospatial,
            ProcessorPayload::AudioVideo(_) => ProcessorKind::AudioVideo,
            ProcessorPayload::OfficeDoc(_) => ProcessorKind::OfficeDoc,
            ProcessorPayload::Email(_) => ProcessorKind::Email,
            ProcessorPayload::Pdf(_) => ProcessorKind::Pdf,
            ProcessorPayload::Archive(_) => ProcessorKind::Archive,
            ProcessorPayload::Web(_) => ProcessorKind::Web,
            ProcessorPayload::Generic(_) => ProcessorKind::Generic,
        }
    }

    /// Extracted text content, if this variant carries any.
    #[must_use]
    pub fn text_content(&self) -> Option<&str> {
        match self {
            ProcessorPayload::Text(p) => Some(p.text_content.as_str()),
            ProcessorPayload::OfficeDoc(p) => p.text_content.as_deref(),
            ProcessorPayload::Email(p) => p.text_content.as_deref(),
            ProcessorPayload::Pdf(p) => p.text_content.as_deref(),
            ProcessorPayload::Web(p) => p.text_content.as_deref(),
            ProcessorPayload::AudioVideo(p) => p.transcript.as_deref(),
            _ => None,
        }
    }

    /// Dense embedding vector, if this variant carries one.
    #[must_use]
    pub fn embedding(&self) -> Option<&[f32]> {
        match self {
            ProcessorPayload::Text(p) => p.embedding.as_deref(),
            ProcessorPayload::Image(p) => p.embedding.as_deref(),
            ProcessorPayload::AudioVideo(p) => p.embedding.as_deref(),
            ProcessorPayload::Pdf(p) => p.embedding.as_deref(),
            ProcessorPayload::Web(p) => p.embedding.as_deref(),
            _ => None,
        }
    }

    /// Relations detected by the processor, if any.
    #[must_use]
    pub fn relations(&self) -> &[DetectedRelation] {
        match self {
            ProcessorPayload::Text(p) => &p.relations,
            ProcessorPayload::Geospatial(p) => &p.relations,
            ProcessorPayload::OfficeDoc(p) => &p.relations,
            ProcessorPayload::Email(p) => &p.relations,
            ProcessorPayload::Pdf(p) => &p.relations,
            _ => &[],
        }
    }

    /// Geospatial coordinates, if this variant carries any.
    #[must_use]
    pub fn coordinates(&self) -> Option<GeoCoordinates> {
        match self {
            ProcessorPayload::Geospatial(p) => p.coordinates,
            _ => None,
        }
    }

    /// The common metadata map, present on every variant.
    #[must_use]
    pub fn metadata(&self) -> &Record {
        match self {
            ProcessorPayload::Text(p) => &p.common.metadata,
            ProcessorPayload::Image(p) => &p.common.metadata,
            ProcessorPayload::Geospatial(p) => &p.common.metadata,
            ProcessorPayload::AudioVideo(p) => &p.common.metadata,
            ProcessorPayload::OfficeDoc(p) => &p.common.metadata,
            ProcessorPayload::Email(p) => &p.common.metadata,
            ProcessorPayload::Pdf(p) => &p.common.metadata,
            ProcessorPayload::Archive(p) => &p.common.metadata,
            ProcessorPayload::Web(p) => &p.common.metadata,
            ProcessorPayload::Generic(p) => &p.common.metadata,
        }
    }
}

/// An error surfaced by a processor, attached to its (possibly partial)
/// result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorError {
    /// Human-readable error message.
    pub message: String,
    /// Optional machine-readable error code.
    pub code: Option<String>,
}

/// A unit of content produced by an upstream processor and submitted to the
/// distributor. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorResult {
    /// Identifier of the processor that produced this result.
    pub processor_id: String,
    /// Globally unique, stable document identifier.
    pub document_id: String,
    /// The heterogeneous payload.
    pub payload: ProcessorPayload,
    /// Confidence score in `[0, 1]`.
    pub confidence: f64,
    /// Processor execution duration.
    pub duration: std::time::Duration,
    /// Error surfaced by the processor, if any. A result may carry both
    /// partial data and an error.
    pub error: Option<ProcessorError>,
}

impl ProcessorResult {
    /// Construct a new result, clamping `confidence` into `[0, 1]`.
    pub fn new(
        processor_id: impl Into<String>,
        document_id: impl Into<String>,
        payload: ProcessorPayload,
        confidence: f64,
        duration: std::time::Duration,
    ) -> Self {
        Self {
            processor_id: processor_id.into(),
            document_id: document_id.into(),
            payload,
            confidence: confidence.clamp(0.0, 1.0),
            duration,
            error: None,
        }
    }

    /// The processor kind tag, delegated to the payload.
    #[must_use]
    pub fn processor_kind(&self) -> ProcessorKind {
        self.payload.kind()
    }
}

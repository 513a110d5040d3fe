//! Document reference types produced by link resolution

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use super::parser::extract_base_url;

/// Classification of a SharePoint share link by its type letter.
///
/// Share URLs carry a single letter between colons (`/:x:/`, `/:w:/`) that
/// identifies what the link points at. Letters without a known mapping are
/// kept as their own label so nothing is lost on round trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    Excel,
    Powerpoint,
    Word,
    Pdf,
    Folder,
    Generic,
    Other(String),
}

impl FileKind {
    /// Maps a share-type letter to its kind. Unknown letters pass through.
    #[must_use]
    pub fn from_share_letter(letter: &str) -> Self {
        match letter {
            "x" => Self::Excel,
            "p" => Self::Powerpoint,
            "w" => Self::Word,
            "b" => Self::Pdf,
            "f" => Self::Folder,
            "u" => Self::Generic,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "excel" => Self::Excel,
            "powerpoint" => Self::Powerpoint,
            "word" => Self::Word,
            "pdf" => Self::Pdf,
            "folder" => Self::Folder,
            "generic" => Self::Generic,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Excel => "excel",
            Self::Powerpoint => "powerpoint",
            Self::Word => "word",
            Self::Pdf => "pdf",
            Self::Folder => "folder",
            Self::Generic => "generic",
            Self::Other(label) => label,
        }
    }

    /// Only spreadsheets and presentations render in the embed frame.
    #[must_use]
    pub fn supports_embed(&self) -> bool {
        matches!(self, Self::Excel | Self::Powerpoint)
    }
}

impl Serialize for FileKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for FileKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Self::from_label(&label))
    }
}

/// Canonical reference to a SharePoint/OneDrive document.
///
/// The guid is the stable identifier; the remaining fields are best-effort
/// context captured from the share URL at resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<FileKind>,
}

impl DocumentRef {
    /// A reference carrying nothing but the guid. Legacy stored entries and
    /// direct guid lookups land here.
    #[must_use]
    pub fn from_guid(guid: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            site_id: None,
            source_url: None,
            file_type: None,
        }
    }

    /// True when the document kind renders in an embed frame.
    #[must_use]
    pub fn supports_embed(&self) -> bool {
        self.file_type
            .as_ref()
            .is_some_and(FileKind::supports_embed)
    }

    /// Reconstructs the host's embed URL for this document.
    ///
    /// The base is taken from the original share URL when one was captured,
    /// then derived from the site id under `default_site_base`, then the
    /// default base alone. Returns `None` when no base can be determined.
    #[must_use]
    pub fn embed_url(&self, default_site_base: Option<&str>) -> Option<String> {
        let mut base = self.source_url.as_deref().and_then(extract_base_url);
        if base.is_none() {
            base = match (self.site_id.as_deref(), default_site_base) {
                (Some(site), Some(default)) => {
                    Some(format!("{}/sites/{}", default.trim_end_matches('/'), site))
                }
                (None, Some(default)) => Some(default.trim_end_matches('/').to_string()),
                _ => None,
            };
        }
        let base = base?;
        Some(format!(
            "{}/_layouts/15/Doc.aspx?sourcedoc=%7B{}%7D&action=embedview",
            base, self.guid
        ))
    }
}

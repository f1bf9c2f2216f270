//! Output formats and input-format detection.
//!
//! The remote service identifies formats by lowercase file extension
//! (`"pdf"`, `"docx"`, …). Output formats are a closed set so requests are
//! checked at compile time; input formats stay free-form strings because the
//! service accepts far more sources (heic, odt, rtf, …) than we ever
//! produce.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A format the client can ask the remote service to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionFormat {
    Pdf,
    Jpg,
    Png,
    Docx,
    Xlsx,
    Pptx,
    Txt,
}

impl ConversionFormat {
    /// Every supported output format, in display order.
    pub const ALL: [ConversionFormat; 7] = [
        ConversionFormat::Pdf,
        ConversionFormat::Jpg,
        ConversionFormat::Png,
        ConversionFormat::Docx,
        ConversionFormat::Xlsx,
        ConversionFormat::Pptx,
        ConversionFormat::Txt,
    ];

    /// The wire name, which is also the file extension.
    pub fn extension(self) -> &'static str {
        match self {
            ConversionFormat::Pdf => "pdf",
            ConversionFormat::Jpg => "jpg",
            ConversionFormat::Png => "png",
            ConversionFormat::Docx => "docx",
            ConversionFormat::Xlsx => "xlsx",
            ConversionFormat::Pptx => "pptx",
            ConversionFormat::Txt => "txt",
        }
    }

    /// Upper-case label for user-facing lists.
    pub fn display_name(self) -> String {
        self.extension().to_ascii_uppercase()
    }
}

impl fmt::Display for ConversionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ConversionFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().trim_start_matches('.').to_ascii_lowercase();
        match lower.as_str() {
            "pdf" => Ok(ConversionFormat::Pdf),
            "jpg" | "jpeg" => Ok(ConversionFormat::Jpg),
            "png" => Ok(ConversionFormat::Png),
            "docx" => Ok(ConversionFormat::Docx),
            "xlsx" => Ok(ConversionFormat::Xlsx),
            "pptx" => Ok(ConversionFormat::Pptx),
            "txt" => Ok(ConversionFormat::Txt),
            _ => Err(ConvertError::InvalidConfig(format!(
                "unsupported output format '{s}'"
            ))),
        }
    }
}

/// Broad document family of a file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
    Document,
    Spreadsheet,
    Presentation,
    Text,
    Unknown,
}

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => DocumentKind::Pdf,
            "jpg" | "jpeg" | "png" | "heic" | "heif" | "gif" | "bmp" | "tiff" => {
                DocumentKind::Image
            }
            "doc" | "docx" | "odt" | "rtf" => DocumentKind::Document,
            "xls" | "xlsx" | "ods" | "csv" => DocumentKind::Spreadsheet,
            "ppt" | "pptx" | "odp" => DocumentKind::Presentation,
            "txt" | "md" => DocumentKind::Text,
            _ => DocumentKind::Unknown,
        }
    }

    /// Whether the service can render this kind to PDF. A PDF itself is
    /// not a conversion; unknown extensions are refused up front.
    pub fn converts_to_pdf(self) -> bool {
        !matches!(self, DocumentKind::Pdf | DocumentKind::Unknown)
    }

    pub fn from_filename(name: &str) -> Self {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(DocumentKind::Unknown)
    }
}

/// The remote `input_format` for a file: its lowercased extension.
pub fn input_format_for(filename: &str) -> Result<String, ConvertError> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| {
            ConvertError::InvalidConfig(format!(
                "cannot infer input format of '{filename}': no file extension"
            ))
        })
}

/// Replace the extension of `source` with the extension of `format`.
///
/// `report.docx` + pdf → `report.pdf`; `notes` + txt → `notes.txt`.
pub fn output_filename(source: &str, format: ConversionFormat) -> String {
    let stem = Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("converted");
    format!("{stem}.{}", format.extension())
}

//! Vendor scan-report parsers producing normalized findings.
//!
//! Each parser implements the `ScanParser` trait and turns one vendor XML
//! report into a vendor-agnostic `Vec<Finding>`. Schema dispatch looks at the
//! document's root element, never the file extension.

pub mod nessus;
pub mod zap;

use std::fs;
use std::path::Path;

use quick_xml::events::BytesRef;

use crate::errors::EngineError;
use crate::models::Finding;

/// Recognized vendor report schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSchema {
    /// Host scanner export (`NessusClientData_v2` root).
    Nessus,
    /// Web scanner export (`OWASPZAPReport` root).
    Zap,
}

/// Trait for pluggable scan-report parsers.
pub trait ScanParser {
    /// Parse raw report bytes into normalized findings. Pure: no side
    /// effects beyond the returned records.
    fn parse(&self, data: &[u8], path: &Path) -> Result<Vec<Finding>, EngineError>;

    /// The scanner tool name this parser handles.
    fn source_tool(&self) -> &str;
}

/// Sniff the report schema from the first XML start element.
pub fn detect_schema(data: &[u8]) -> Option<ReportSchema> {
    let mut reader = quick_xml::Reader::from_reader(data);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                return match e.name().as_ref() {
                    b"NessusClientData_v2" => Some(ReportSchema::Nessus),
                    b"OWASPZAPReport" => Some(ReportSchema::Zap),
                    // Some exports wrap sites without the vendor root.
                    b"site" => Some(ReportSchema::Zap),
                    b"Report" => Some(ReportSchema::Nessus),
                    _ => None,
                };
            }
            Ok(quick_xml::events::Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

/// Resolve a character or predefined entity reference found in text content.
///
/// Unknown custom entities (no DTD support) resolve to `None` and are logged.
pub(crate) fn resolve_reference(
    r: &BytesRef<'_>,
    path: &Path,
) -> Result<Option<String>, EngineError> {
    if let Some(ch) = r
        .resolve_char_ref()
        .map_err(|e| EngineError::parse(path, format!("bad character reference: {e}")))?
    {
        return Ok(Some(ch.to_string()));
    }
    let name = r
        .decode()
        .map_err(|e| EngineError::parse(path, format!("bad entity reference: {e}")))?;
    match quick_xml::escape::resolve_predefined_entity(&name) {
        Some(text) => Ok(Some(text.to_string())),
        None => {
            tracing::warn!(file = %path.display(), entity = %name, "Skipping unknown entity reference");
            Ok(None)
        }
    }
}

/// Ingest one report file: read, sniff the schema, dispatch to its parser.
///
/// A missing path, malformed XML, or unrecognized schema yields an error for
/// this file only; batch callers log it and continue.
pub fn ingest_path(path: &Path) -> Result<Vec<Finding>, EngineError> {
    if !path.exists() {
        return Err(EngineError::InputNotFound(path.to_path_buf()));
    }
    let data = fs::read(path)?;

    let schema = detect_schema(&data)
        .ok_or_else(|| EngineError::parse(path, "unrecognized report schema"))?;

    let parser: Box<dyn ScanParser> = match schema {
        ReportSchema::Nessus => Box::new(nessus::NessusParser::new()),
        ReportSchema::Zap => Box::new(zap::ZapParser::new()),
    };

    let findings = parser.parse(&data, path)?;
    tracing::debug!(
        file = %path.display(),
        tool = parser.source_tool(),
        findings = findings.len(),
        "Parsed report file"
    );
    Ok(findings)
}

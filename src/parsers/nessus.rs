//! Host-scanner XML parser (`NessusClientData_v2` schema).
//!
//! Emits one finding per (ReportHost, ReportItem). Plugin id/name/severity
//! ride as attributes on `ReportItem`; the CVSS v3 base score and plugin
//! output are child elements. Items with an unusable plugin id are logged
//! and skipped; the file keeps parsing.

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::errors::EngineError;
use crate::models::Finding;
use crate::parsers::{resolve_reference, ScanParser};

#[derive(Debug, Default)]
pub struct NessusParser;

impl NessusParser {
    pub fn new() -> Self {
        Self
    }
}

/// Child element of `ReportItem` currently being captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    None,
    Cvss,
    Output,
}

/// Attribute fields of one `ReportItem` plus captured child text.
#[derive(Debug, Default)]
struct ItemBuilder {
    plugin_id_raw: String,
    plugin_name: String,
    severity_raw: Option<u8>,
    cvss_text: String,
    output_text: String,
}

impl ScanParser for NessusParser {
    fn parse(&self, data: &[u8], path: &Path) -> Result<Vec<Finding>, EngineError> {
        let mut reader = Reader::from_reader(data);
        let mut buf = Vec::new();

        let mut findings = Vec::new();
        let mut current_host = String::new();
        let mut item: Option<ItemBuilder> = None;
        let mut capture = Capture::None;
        let mut saw_report = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Err(e) => {
                    return Err(EngineError::parse(
                        path,
                        format!("XML error at byte {}: {e}", reader.buffer_position()),
                    ));
                }
                Ok(Event::Eof) => break,
                Ok(Event::Start(ref e)) => match e.name().as_ref() {
                    b"Report" => saw_report = true,
                    b"ReportHost" => {
                        current_host = attr(e, b"name", path)?.unwrap_or_default();
                    }
                    b"ReportItem" => {
                        item = Some(ItemBuilder {
                            plugin_id_raw: attr(e, b"pluginID", path)?.unwrap_or_default(),
                            plugin_name: attr(e, b"pluginName", path)?.unwrap_or_default(),
                            severity_raw: attr(e, b"severity", path)?
                                .and_then(|s| s.parse().ok()),
                            ..ItemBuilder::default()
                        });
                    }
                    b"cvss3_base_score" if item.is_some() => capture = Capture::Cvss,
                    b"plugin_output" if item.is_some() => capture = Capture::Output,
                    _ => {}
                },
                Ok(Event::Text(ref t)) if capture != Capture::None => {
                    let text = t.decode().map_err(|e| {
                        EngineError::parse(path, format!("bad text node: {e}"))
                    })?;
                    if let Some(it) = item.as_mut() {
                        match capture {
                            Capture::Cvss => it.cvss_text.push_str(&text),
                            Capture::Output => it.output_text.push_str(&text),
                            Capture::None => {}
                        }
                    }
                }
                // Entity references split the surrounding text event in two.
                Ok(Event::GeneralRef(ref r)) if capture != Capture::None => {
                    if let Some(text) = resolve_reference(r, path)? {
                        if let Some(it) = item.as_mut() {
                            match capture {
                                Capture::Cvss => it.cvss_text.push_str(&text),
                                Capture::Output => it.output_text.push_str(&text),
                                Capture::None => {}
                            }
                        }
                    }
                }
                Ok(Event::End(ref e)) => match e.name().as_ref() {
                    b"cvss3_base_score" | b"plugin_output" => capture = Capture::None,
                    b"ReportItem" => {
                        if let Some(it) = item.take() {
                            match build_finding(&current_host, it) {
                                Some(f) => findings.push(f),
                                None => tracing::warn!(
                                    file = %path.display(),
                                    host = %current_host,
                                    "Skipping ReportItem with unusable pluginID"
                                ),
                            }
                        }
                    }
                    b"ReportHost" => current_host.clear(),
                    _ => {}
                },
                _ => {}
            }
            buf.clear();
        }

        if !saw_report && findings.is_empty() {
            return Err(EngineError::parse(path, "no Report element found"));
        }
        Ok(findings)
    }

    fn source_tool(&self) -> &str {
        "Nessus"
    }
}

/// Decode one attribute value off a start tag.
fn attr(e: &BytesStart<'_>, name: &[u8], path: &Path) -> Result<Option<String>, EngineError> {
    let found = e
        .try_get_attribute(name)
        .map_err(|err| EngineError::parse(path, format!("bad attribute: {err}")))?;
    match found {
        Some(a) => {
            let value = a
                .unescape_value()
                .map_err(|err| EngineError::parse(path, format!("bad attribute value: {err}")))?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

fn build_finding(host: &str, item: ItemBuilder) -> Option<Finding> {
    let plugin_id: u32 = item.plugin_id_raw.trim().parse().ok()?;
    let cvss_score = match item.cvss_text.trim() {
        "" => None,
        text => text.parse::<f32>().ok(),
    };
    Some(Finding {
        host: host.to_string(),
        plugin_id,
        plugin_name: item.plugin_name,
        raw_output: item.output_text,
        severity_raw: item.severity_raw,
        cvss_score,
    })
}

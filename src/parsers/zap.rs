//! Web-scanner XML parser (`OWASPZAPReport` schema).
//!
//! Alert items are aggregated by (plugin id, alert name, risk code) with the
//! set of affected instance URIs substituting for hosts; one finding is
//! emitted per aggregated URI. An alert with no instances falls back to the
//! enclosing site name.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::errors::EngineError;
use crate::models::Finding;
use crate::parsers::{resolve_reference, ScanParser};

#[derive(Debug, Default)]
pub struct ZapParser;

impl ZapParser {
    pub fn new() -> Self {
        Self
    }
}

/// Text-bearing child of `alertitem` currently being captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    None,
    PluginId,
    Alert,
    RiskCode,
    RiskDesc,
    Uri,
}

#[derive(Debug, Default)]
struct AlertBuilder {
    plugin_id: String,
    alert: String,
    risk_code: String,
    risk_desc: String,
    /// Accumulates the current `<uri>` text; inserted into `uris` on the
    /// closing tag so references inside a URI don't split it.
    current_uri: String,
    uris: BTreeSet<String>,
}

impl AlertBuilder {
    fn append(&mut self, capture: Capture, text: &str) {
        match capture {
            Capture::PluginId => self.plugin_id.push_str(text),
            Capture::Alert => self.alert.push_str(text),
            Capture::RiskCode => self.risk_code.push_str(text),
            Capture::RiskDesc => self.risk_desc.push_str(text),
            Capture::Uri => self.current_uri.push_str(text),
            Capture::None => {}
        }
    }

    fn finish_uri(&mut self) {
        let uri = self.current_uri.trim();
        if !uri.is_empty() {
            self.uris.insert(uri.to_string());
        }
        self.current_uri.clear();
    }
}

/// Aggregation key mirroring the vendor's alert identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct AlertKey {
    plugin_id: u32,
    alert: String,
    risk_code: u8,
    risk_desc: String,
}

impl ScanParser for ZapParser {
    fn parse(&self, data: &[u8], path: &Path) -> Result<Vec<Finding>, EngineError> {
        let mut reader = Reader::from_reader(data);
        let mut buf = Vec::new();

        let mut aggregated: BTreeMap<AlertKey, (String, BTreeSet<String>)> = BTreeMap::new();
        let mut current_site = String::new();
        let mut alert: Option<AlertBuilder> = None;
        let mut capture = Capture::None;
        let mut saw_site = false;

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
                    b"site" => {
                        saw_site = true;
                        current_site = e
                            .try_get_attribute(b"name")
                            .map_err(|err| {
                                EngineError::parse(path, format!("bad attribute: {err}"))
                            })?
                            .and_then(|a| a.unescape_value().ok())
                            .map(|v| v.into_owned())
                            .unwrap_or_default();
                    }
                    b"alertitem" => alert = Some(AlertBuilder::default()),
                    b"pluginid" if alert.is_some() => capture = Capture::PluginId,
                    b"alert" if alert.is_some() => capture = Capture::Alert,
                    b"riskcode" if alert.is_some() => capture = Capture::RiskCode,
                    b"riskdesc" if alert.is_some() => capture = Capture::RiskDesc,
                    b"uri" if alert.is_some() => capture = Capture::Uri,
                    _ => {}
                },
                Ok(Event::Text(ref t)) if capture != Capture::None => {
                    let text = t.decode().map_err(|e| {
                        EngineError::parse(path, format!("bad text node: {e}"))
                    })?;
                    if let Some(a) = alert.as_mut() {
                        a.append(capture, &text);
                    }
                }
                // Entity references split the surrounding text event in two.
                Ok(Event::GeneralRef(ref r)) if capture != Capture::None => {
                    if let Some(text) = resolve_reference(r, path)? {
                        if let Some(a) = alert.as_mut() {
                            a.append(capture, &text);
                        }
                    }
                }
                Ok(Event::End(ref e)) => match e.name().as_ref() {
                    b"uri" => {
                        capture = Capture::None;
                        if let Some(a) = alert.as_mut() {
                            a.finish_uri();
                        }
                    }
                    b"pluginid" | b"alert" | b"riskcode" | b"riskdesc" => {
                        capture = Capture::None;
                    }
                    b"alertitem" => {
                        if let Some(a) = alert.take() {
                            fold_alert(&mut aggregated, a, &current_site, path);
                        }
                    }
                    b"site" => current_site.clear(),
                    _ => {}
                },
                _ => {}
            }
            buf.clear();
        }

        if !saw_site {
            return Err(EngineError::parse(path, "no site element found"));
        }

        let mut findings = Vec::new();
        for (key, (alert_name, uris)) in aggregated {
            for uri in uris {
                findings.push(Finding {
                    host: uri,
                    plugin_id: key.plugin_id,
                    plugin_name: alert_name.clone(),
                    raw_output: String::new(),
                    severity_raw: Some(key.risk_code),
                    cvss_score: None,
                });
            }
        }
        Ok(findings)
    }

    fn source_tool(&self) -> &str {
        "OWASP ZAP"
    }
}

/// Merge one parsed alert into the aggregation map, deduplicating URIs.
fn fold_alert(
    aggregated: &mut BTreeMap<AlertKey, (String, BTreeSet<String>)>,
    a: AlertBuilder,
    site: &str,
    path: &Path,
) {
    let Ok(plugin_id) = a.plugin_id.trim().parse::<u32>() else {
        tracing::warn!(
            file = %path.display(),
            site,
            alert = %a.alert,
            "Skipping alertitem with unusable pluginid"
        );
        return;
    };
    let Ok(risk_code) = a.risk_code.trim().parse::<u8>() else {
        tracing::warn!(
            file = %path.display(),
            site,
            alert = %a.alert,
            "Skipping alertitem with unusable riskcode"
        );
        return;
    };

    let mut uris = a.uris;
    if uris.is_empty() && !site.is_empty() {
        uris.insert(site.to_string());
    }

    let key = AlertKey {
        plugin_id,
        alert: a.alert.trim().to_string(),
        risk_code,
        risk_desc: a.risk_desc.trim().to_string(),
    };
    let slot = aggregated
        .entry(key)
        .or_insert_with(|| (a.alert.trim().to_string(), BTreeSet::new()));
    slot.1.extend(uris);
}

//! Rendering cached values as JSON, XML or YAML.
//!
//! All three encoders are serde-driven, so any value type that can sit in a
//! cache can be rendered. XML needs a root element name; caches default to
//! [`DEFAULT_XML_ROOT`] and can override it on their builder.
//!
//! XML decoders trim text content, so text with leading or trailing
//! whitespace is written as CDATA, which they pass through untouched.

use std::fmt;

use quick_xml::events::{BytesCData, Event};
use quick_xml::{Reader, Writer};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{MimirError, Result};

/// Root element used when rendering values as XML.
pub const DEFAULT_XML_ROOT: &str = "value";

/// Output encodings supported by the cache rendering operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Xml,
    Yaml,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Json => "JSON",
            Format::Xml => "XML",
            Format::Yaml => "YAML",
        })
    }
}

fn serialization_error(format: Format, err: impl fmt::Display) -> MimirError {
    MimirError::Serialization {
        format,
        message: err.to_string(),
    }
}

/// Render a value as compact JSON.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| serialization_error(Format::Json, e))
}

/// Render a value as XML wrapped in a `root` element.
pub fn to_xml<T: Serialize + ?Sized>(value: &T, root: &str) -> Result<String> {
    let xml = quick_xml::se::to_string_with_root(root, value)
        .map_err(|e| serialization_error(Format::Xml, e))?;
    if !xml.contains(|c: char| c.is_whitespace()) {
        return Ok(xml);
    }
    keep_edge_whitespace(&xml)
}

/// Re-emit text nodes that start or end with whitespace as CDATA sections.
fn keep_edge_whitespace(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 16));

    loop {
        let event = match reader
            .read_event()
            .map_err(|e| serialization_error(Format::Xml, e))?
        {
            Event::Eof => break,
            Event::Text(text) => {
                let content = text
                    .unescape()
                    .map_err(|e| serialization_error(Format::Xml, e))?
                    .into_owned();
                if has_edge_whitespace(&content) {
                    // "]]>" cannot appear inside a section; split it across two.
                    Event::CData(BytesCData::new(content.replace("]]>", "]]]]><![CDATA[>")))
                } else {
                    Event::Text(text)
                }
            }
            event => event,
        };
        writer
            .write_event(event)
            .map_err(|e| serialization_error(Format::Xml, e))?;
    }

    String::from_utf8(writer.into_inner()).map_err(|e| serialization_error(Format::Xml, e))
}

fn has_edge_whitespace(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}

/// Render a value as a YAML document.
pub fn to_yaml<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_yaml::to_string(value).map_err(|e| serialization_error(Format::Yaml, e))
}

/// Render a value in the requested format.
pub fn render<T: Serialize + ?Sized>(value: &T, format: Format, xml_root: &str) -> Result<String> {
    match format {
        Format::Json => to_json(value),
        Format::Xml => to_xml(value, xml_root),
        Format::Yaml => to_yaml(value),
    }
}

/// Parse a JSON document into a value.
pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T> {
    Ok(serde_json::from_str(json)?)
}

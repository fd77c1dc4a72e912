//! Markup helpers shared by the tree builder and data-source setup.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::WriterError;

fn utf8(bytes: &[u8]) -> Result<&str, WriterError> {
    std::str::from_utf8(bytes).map_err(|e| WriterError::Markup(e.to_string()))
}

/// Resolve entity and character references in raw markup text.
pub fn unescape_text(raw: &[u8]) -> Result<String, WriterError> {
    let text = utf8(raw)?;
    quick_xml::escape::unescape(text)
        .map(|c| c.into_owned())
        .map_err(|e| WriterError::Markup(e.to_string()))
}

/// Text an entity or character reference (`&name;`) stands for.
pub fn reference_text(name: &[u8]) -> Result<String, WriterError> {
    unescape_text(format!("&{};", utf8(name)?).as_bytes())
}

/// Tag name of a start or empty element.
pub fn tag_name(e: &BytesStart<'_>) -> Result<String, WriterError> {
    utf8(e.name().as_ref()).map(str::to_string)
}

/// Unescaped attributes of a start or empty element.
pub fn attributes(e: &BytesStart<'_>) -> Result<BTreeMap<String, String>, WriterError> {
    let mut out = BTreeMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| WriterError::Markup(e.to_string()))?;
        let key = utf8(attr.key.as_ref())?.to_string();
        let value = unescape_text(&attr.value)?;
        out.insert(key, value);
    }
    Ok(out)
}

/// Accumulates the exact markup of a sub-tree, entities left escaped.
#[derive(Debug, Default)]
pub struct RawCapture {
    tag: String,
    depth: usize,
    text: String,
}

impl RawCapture {
    /// Start capturing at the opening tag `e`.
    pub fn open(e: &BytesStart<'_>, empty: bool) -> Result<Self, WriterError> {
        let mut capture = Self {
            tag: tag_name(e)?,
            depth: 0,
            text: String::new(),
        };
        capture.push(&if empty {
            Event::Empty(e.clone())
        } else {
            Event::Start(e.clone())
        })?;
        Ok(capture)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Append one event. Returns `true` once the sub-tree is closed.
    pub fn push(&mut self, event: &Event<'_>) -> Result<bool, WriterError> {
        match event {
            Event::Start(e) => {
                self.depth += 1;
                self.text.push('<');
                self.text.push_str(utf8(e)?);
                self.text.push('>');
            }
            Event::Empty(e) => {
                self.text.push('<');
                self.text.push_str(utf8(e)?);
                self.text.push_str("/>");
            }
            Event::End(e) => {
                self.depth = self.depth.saturating_sub(1);
                self.text.push_str("</");
                self.text.push_str(utf8(e.name().as_ref())?);
                self.text.push('>');
            }
            Event::Text(t) => self.text.push_str(utf8(t)?),
            Event::GeneralRef(r) => {
                self.text.push('&');
                self.text.push_str(utf8(r)?);
                self.text.push(';');
            }
            Event::CData(c) => {
                self.text.push_str("<![CDATA[");
                self.text.push_str(utf8(c)?);
                self.text.push_str("]]>");
            }
            Event::Comment(c) => {
                self.text.push_str("<!--");
                self.text.push_str(utf8(c)?);
                self.text.push_str("-->");
            }
            _ => {}
        }
        Ok(self.depth == 0)
    }

    pub fn finish(self) -> String {
        self.text
    }
}

/// Raw markup of every direct child of the root element named `tag`.
pub fn capture_children(xml: &str, tag: &str) -> Result<Vec<String>, WriterError> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut current: Option<RawCapture> = None;
    let mut found = Vec::new();
    loop {
        let event = reader.read_event()?;
        if let Some(capture) = current.as_mut() {
            if capture.push(&event)? {
                if let Some(done) = current.take() {
                    found.push(done.finish());
                }
                if matches!(event, Event::End(_)) {
                    depth -= 1;
                }
            }
            continue;
        }
        match &event {
            Event::Start(e) => {
                if depth == 1 && e.name().as_ref() == tag.as_bytes() {
                    current = Some(RawCapture::open(e, false)?);
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 1 && e.name().as_ref() == tag.as_bytes() {
                    found.push(RawCapture::open(e, true)?.finish());
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(found)
}

/// Text content of the root element, references resolved.
pub fn root_text(xml: &str) -> Result<String, WriterError> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(t) if depth == 1 => text.push_str(&unescape_text(&t)?),
            Event::CData(c) if depth == 1 => text.push_str(utf8(&c)?),
            Event::GeneralRef(r) if depth == 1 => text.push_str(&reference_text(&r)?),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(text)
}

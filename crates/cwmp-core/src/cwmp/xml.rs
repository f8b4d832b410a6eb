//! Namespace-tolerant XML element tree.
//!
//! CPE stacks disagree about namespace prefixes (`soap:`, `SOAP-ENV:`,
//! `soapenv:`, none at all), so every name is split into prefix and local
//! part at parse time and all lookups go by local name only. Namespace
//! declarations are dropped from the attribute list.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};

/// A possibly-prefixed XML name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    prefix: Option<String>,
    local: String,
}

impl QName {
    /// Split a raw `prefix:local` name.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((prefix, local)) => Self {
                prefix: Some(prefix.to_string()),
                local: local.to_string(),
            },
            None => Self {
                prefix: None,
                local: raw.to_string(),
            },
        }
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn is_namespace_declaration(&self) -> bool {
        self.prefix.as_deref() == Some("xmlns") || (self.prefix.is_none() && self.local == "xmlns")
    }
}

/// An element with its attributes, text content and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: QName,
    attributes: Vec<(QName, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    pub const fn name(&self) -> &QName {
        &self.name
    }

    pub fn local_name(&self) -> &str {
        self.name.local()
    }

    /// Text content with surrounding whitespace removed.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Text content, or `None` when it is blank.
    pub fn non_empty_text(&self) -> Option<&str> {
        Some(self.text()).filter(|t| !t.is_empty())
    }

    /// Attribute value by local name (`xsi:type` is found as `type`).
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name.local() == local)
            .map(|(_, value)| value.as_str())
    }

    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// First direct child with the given local name.
    pub fn child(&self, local: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.local_name() == local)
    }

    /// All elements below this one in document order (pre-order), excluding self.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// First element named `local` at any depth, this element included.
    pub fn find(&self, local: &str) -> Option<&Self> {
        if self.local_name() == local {
            return Some(self);
        }
        self.descendants().find(|el| el.local_name() == local)
    }

    /// Every element named `local` below this one, in document order.
    pub fn find_all<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.descendants().filter(move |el| el.local_name() == local)
    }

    /// Non-blank text of the first element named `local` at any depth.
    pub fn find_text(&self, local: &str) -> Option<String> {
        self.find_all(local)
            .find_map(Self::non_empty_text)
            .map(str::to_string)
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let raw_name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| Error::Parse(format!("element name is not UTF-8: {e}")))?
            .to_string();

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::Parse(format!("bad attribute in <{raw_name}>: {e}")))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| Error::Parse(format!("attribute name is not UTF-8: {e}")))?;
            let key = QName::parse(key);
            if key.is_namespace_declaration() {
                continue;
            }
            let value = attr
                .unescape_value()
                .map_err(|e| Error::Parse(format!("bad attribute value in <{raw_name}>: {e}")))?;
            attributes.push((key, value.into_owned()));
        }

        Ok(Self {
            name: QName::parse(&raw_name),
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }
}

/// Pre-order iterator over an element's descendants.
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

/// Parse a complete XML document into its root element.
///
/// Any well-formedness problem (bad syntax, mismatched or unclosed tags,
/// several roots, stray text) is reported as [`Error::Parse`].
pub fn parse(input: &[u8]) -> Result<Element> {
    let mut reader = Reader::from_reader(input);
    let mut open: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(Error::Parse(format!(
                    "{e} (at byte {})",
                    reader.buffer_position()
                )));
            }
        };

        match event {
            Event::Start(start) => open.push(Element::from_start(&start)?),
            Event::Empty(start) => attach(&mut open, &mut root, Element::from_start(&start)?)?,
            Event::End(_) => {
                let element = open
                    .pop()
                    .ok_or_else(|| Error::Parse("closing tag without opening tag".into()))?;
                attach(&mut open, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| Error::Parse(format!("bad text content: {e}")))?;
                push_text(&mut open, &text)?;
            }
            Event::CData(data) => {
                let data = data.into_inner();
                push_text(&mut open, &String::from_utf8_lossy(&data))?;
            }
            Event::Eof => break,
            Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => {}
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(Error::Parse(format!(
            "unexpected end of document inside <{}>",
            unclosed.local_name()
        )));
    }
    root.ok_or_else(|| Error::Parse("document has no root element".into()))
}

fn attach(open: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = open.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(Error::Parse("more than one root element".into()));
    }
    *root = Some(element);
    Ok(())
}

fn push_text(open: &mut [Element], text: &str) -> Result<()> {
    match open.last_mut() {
        Some(current) => {
            current.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(Error::Parse("text outside the root element".into())),
    }
}

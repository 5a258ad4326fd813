//! A small XML element tree, sized to what eSCL needs.
//!
//! eSCL documents are plain namespaced elements with text content: no
//! CDATA, no processing instructions beyond the declaration, no mixed
//! content that matters. Rather than pull a full XML stack into the
//! dependency tree for that, this module keeps an element tree that can
//! serialize itself (with an XML declaration and stable indentation) and
//! parse documents of the same shape back.
//!
//! Namespace prefixes are carried verbatim in element names
//! (`pwg:Version`); lookups go through [`Element::local_name`] so a
//! client's choice of prefix does not matter.

use std::fmt::Write;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    InvalidData,
    UnexpectedEof,
    MismatchedTag,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Error::InvalidData => "malformed XML",
            Error::UnexpectedEof => "unexpected end of document",
            Error::MismatchedTag => "mismatched closing tag",
        };
        f.write_str(reason)
    }
}

impl std::error::Error for Error {}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_text(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            text: text.to_string(),
            ..Self::default()
        }
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes.push((name.to_string(), value.to_string()));
    }

    /// Appends `child` and returns a reference to it, for nesting.
    pub fn push(&mut self, child: Element) -> &mut Element {
        self.children.push(child);
        self.children.last_mut().unwrap()
    }

    pub fn add_child(&mut self, name: &str) -> &mut Element {
        self.push(Element::new(name))
    }

    pub fn add_text_child(&mut self, name: &str, text: &str) {
        self.children.push(Element::with_text(name, text));
    }

    /// The element name with any namespace prefix removed.
    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    /// First child whose local name is `local`.
    pub fn child(&self, local: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.local_name() == local)
    }

    /// All children whose local name is `local`.
    pub fn children_named<'a>(
        &'a self,
        local: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.local_name() == local)
    }

    /// Serializes the tree as a complete document.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        self.write_into(&mut out, 0);
        out.push('\n');
        out.into_bytes()
    }

    fn write_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = write!(out, "{}<{}", indent, self.name);
        for (name, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", name, escape(value));
        }
        if self.children.is_empty() && self.text.is_empty() {
            out.push_str("/>");
        } else if self.children.is_empty() {
            let _ = write!(out, ">{}</{}>", escape(&self.text), self.name);
        } else {
            out.push('>');
            for child in &self.children {
                out.push('\n');
                child.write_into(out, depth + 1);
            }
            let _ = write!(out, "\n{}</{}>", indent, self.name);
        }
    }

    /// Parses a document and returns its root element.
    pub fn parse(bytes: &[u8]) -> Result<Element, Error> {
        let text = std::str::from_utf8(bytes).map_err(|_| Error::InvalidData)?;
        let mut parser = Parser { rest: text };
        parser.skip_prolog()?;
        let root = parser.parse_element()?;
        parser.skip_whitespace();
        if !parser.rest.is_empty() {
            return Err(Error::InvalidData);
        }
        Ok(root)
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let (replacement, len) = if rest.starts_with("&amp;") {
            ('&', 5)
        } else if rest.starts_with("&lt;") {
            ('<', 4)
        } else if rest.starts_with("&gt;") {
            ('>', 4)
        } else if rest.starts_with("&quot;") {
            ('"', 6)
        } else if rest.starts_with("&apos;") {
            ('\'', 6)
        } else {
            ('&', 1)
        };
        out.push(replacement);
        rest = &rest[len..];
    }
    out.push_str(rest);
    out
}

struct Parser<'a> {
    rest: &'a str,
}

impl<'a> Parser<'a> {
    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }

    /// Skips past a delimiter, requiring it to exist.
    fn skip_past(&mut self, delimiter: &str) -> Result<(), Error> {
        match self.rest.find(delimiter) {
            Some(pos) => {
                self.rest = &self.rest[pos + delimiter.len()..];
                Ok(())
            }
            None => Err(Error::UnexpectedEof),
        }
    }

    /// Skips the XML declaration, comments, and doctype before the root.
    fn skip_prolog(&mut self) -> Result<(), Error> {
        loop {
            self.skip_whitespace();
            if self.rest.starts_with("<?") {
                self.skip_past("?>")?;
            } else if self.rest.starts_with("<!--") {
                self.skip_past("-->")?;
            } else if self.rest.starts_with("<!") {
                self.skip_past(">")?;
            } else {
                return Ok(());
            }
        }
    }

    fn parse_element(&mut self) -> Result<Element, Error> {
        if !self.rest.starts_with('<') {
            return Err(Error::InvalidData);
        }
        self.rest = &self.rest[1..];
        let name_end = self
            .rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .ok_or(Error::UnexpectedEof)?;
        if name_end == 0 {
            return Err(Error::InvalidData);
        }
        let mut element = Element::new(&self.rest[..name_end]);
        self.rest = &self.rest[name_end..];

        // Attributes, then either "/>" (empty element) or ">".
        loop {
            self.skip_whitespace();
            if let Some(rest) = self.rest.strip_prefix("/>") {
                self.rest = rest;
                return Ok(element);
            }
            if let Some(rest) = self.rest.strip_prefix('>') {
                self.rest = rest;
                break;
            }
            let eq = self.rest.find('=').ok_or(Error::InvalidData)?;
            let attr_name = self.rest[..eq].trim().to_string();
            self.rest = &self.rest[eq + 1..];
            self.skip_whitespace();
            let quote = self.rest.chars().next().ok_or(Error::UnexpectedEof)?;
            if quote != '"' && quote != '\'' {
                return Err(Error::InvalidData);
            }
            self.rest = &self.rest[1..];
            let end = self.rest.find(quote).ok_or(Error::UnexpectedEof)?;
            element
                .attributes
                .push((attr_name, unescape(&self.rest[..end])));
            self.rest = &self.rest[end + 1..];
        }

        // Content: text, children, comments, then the closing tag.
        let mut text = String::new();
        loop {
            if let Some(rest) = self.rest.strip_prefix("</") {
                self.rest = rest;
                let end = self.rest.find('>').ok_or(Error::UnexpectedEof)?;
                if self.rest[..end].trim() != element.name {
                    return Err(Error::MismatchedTag);
                }
                self.rest = &self.rest[end + 1..];
                element.text = text.trim().to_string();
                return Ok(element);
            }
            if self.rest.starts_with("<!--") {
                self.skip_past("-->")?;
            } else if self.rest.starts_with('<') {
                element.children.push(self.parse_element()?);
            } else {
                let end = self.rest.find('<').ok_or(Error::UnexpectedEof)?;
                text.push_str(&unescape(&self.rest[..end]));
                self.rest = &self.rest[end..];
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/xml.rs"]
mod tests;

//! Streaming Atom parser.
//!
//! Walks `quick-xml` pull events once and builds an [`Article`] each time an
//! `<entry>` closes. No tree is built. Every accumulator is scoped to the
//! current entry and is reset when the next `<entry>` opens.
//!
//! Element names are compared exactly as written, so a prefixed element such
//! as `<media:title>` never lands in `title`.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::storage::Article;

/// Errors produced while parsing a feed document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The bytes are not a well-formed XML document. No articles are
    /// returned, not even the ones that were complete before the fault.
    #[error("Malformed feed document: {0}")]
    MalformedDocument(String),
}

/// Fields collected for the `<entry>` currently open.
#[derive(Debug, Default)]
struct EntryFields {
    id: String,
    title: String,
    link: String,
    content: String,
    published: String,
    author: Option<String>,
    categories: Vec<String>,
}

impl EntryFields {
    fn into_article(self) -> Article {
        Article {
            id: self.id,
            title: self.title,
            link: self.link,
            content: self.content,
            published: self.published,
            author: self.author,
            categories: self.categories,
        }
    }
}

/// Parser state driven by open/characters/close events.
#[derive(Debug, Default)]
struct AtomState {
    articles: Vec<Article>,
    entry: EntryFields,
    in_author: bool,
    /// Character data since the most recent open tag.
    text: String,
}

impl AtomState {
    fn open(&mut self, element: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<(), String> {
        let attrs = attributes(element, reader)?;
        match element.name().as_ref() {
            b"entry" => self.entry = EntryFields::default(),
            b"link" => {
                if lookup(&attrs, "rel") == Some("alternate") {
                    self.entry.link = lookup(&attrs, "href").unwrap_or_default().to_string();
                }
            }
            b"category" => {
                if let Some(term) = lookup(&attrs, "term") {
                    self.entry.categories.push(term.to_string());
                }
            }
            b"author" => self.in_author = true,
            _ => {}
        }
        self.text.clear();
        Ok(())
    }

    fn characters(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn close(&mut self, name: &[u8]) {
        let value = self.text.trim();
        match name {
            b"id" => self.entry.id = value.to_string(),
            b"title" => self.entry.title = value.to_string(),
            b"content" => self.entry.content = value.to_string(),
            b"published" => self.entry.published = value.to_string(),
            b"name" if self.in_author => self.entry.author = Some(value.to_string()),
            b"author" => self.in_author = false,
            b"entry" => {
                let article = std::mem::take(&mut self.entry).into_article();
                self.articles.push(article);
            }
            _ => {}
        }
    }
}

/// Every attribute of a start tag as `(qualified name, unescaped value)`.
///
/// All of them are checked, read or not: a missing `=`, an unquoted value, a
/// duplicate name, a literal `<` in a value or an unknown entity fails the tag.
fn attributes(
    element: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<Vec<(String, String)>, String> {
    let mut attrs = Vec::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| format!("bad attribute: {e}"))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| format!("bad attribute name: {e}"))?
            .to_string();
        if attr.value.contains(&b'<') {
            return Err(format!("'<' in value of attribute {key}"));
        }
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| format!("bad attribute value: {e}"))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(attrs)
}

fn lookup<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Parses an Atom document into articles, in document order of `<entry>`.
///
/// # Errors
///
/// Returns [`ParseError::MalformedDocument`] when the document has mismatched
/// or unclosed tags, no root element, content after the root element,
/// invalid UTF-8, unknown entity references or malformed attributes.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<Article>, ParseError> {
    // Entity handling stays on quick-xml's default: only the five predefined
    // XML entities resolve, anything else (including DTD-declared ones) is an
    // error.
    let source = std::str::from_utf8(bytes).map_err(|e| {
        ParseError::MalformedDocument(format!("invalid UTF-8 at byte {}", e.valid_up_to()))
    })?;
    let mut reader = Reader::from_str(source);
    reader.config_mut().check_end_names = true;

    let mut state = AtomState::default();
    let mut buf = Vec::new();
    let mut depth: usize = 0;
    let mut root_seen = false;

    let malformed = |reader: &Reader<&[u8]>, reason: String| {
        ParseError::MalformedDocument(format!(
            "at byte {}: {}",
            reader.buffer_position(),
            reason
        ))
    };

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| malformed(&reader, e.to_string()))?;

        match event {
            Event::Start(e) => {
                if depth == 0 && root_seen {
                    return Err(malformed(&reader, "more than one root element".into()));
                }
                root_seen = true;
                depth += 1;
                state.open(&e, &reader).map_err(|r| malformed(&reader, r))?;
            }
            Event::Empty(e) => {
                if depth == 0 && root_seen {
                    return Err(malformed(&reader, "more than one root element".into()));
                }
                root_seen = true;
                state.open(&e, &reader).map_err(|r| malformed(&reader, r))?;
                state.close(e.name().as_ref());
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                state.close(e.name().as_ref());
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(|err| malformed(&reader, err.to_string()))?;
                if depth == 0 {
                    if !text.trim().is_empty() {
                        return Err(malformed(&reader, "text outside the root element".into()));
                    }
                } else {
                    state.characters(&text);
                }
            }
            Event::CData(e) => {
                let text = std::str::from_utf8(&e)
                    .map_err(|err| malformed(&reader, format!("invalid UTF-8 in CDATA: {err}")))?;
                if depth == 0 {
                    return Err(malformed(&reader, "CDATA outside the root element".into()));
                }
                state.characters(text);
            }
            Event::Eof => break,
            // Comments, processing instructions, declarations and DOCTYPE
            // carry no character data.
            _ => {}
        }
        buf.clear();
    }

    if !root_seen {
        return Err(ParseError::MalformedDocument("document has no root element".into()));
    }
    if depth != 0 {
        return Err(ParseError::MalformedDocument(format!(
            "document ended with {} unclosed element(s)",
            depth
        )));
    }

    tracing::debug!(articles = state.articles.len(), "Parsed Atom feed");
    Ok(state.articles)
}

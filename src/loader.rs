//! Builds an [`Element`] tree from OSM XML.

use crate::element::{Attributes, Element, Value};

use log::info;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("element or attribute name is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("document has no root element")]
    Empty,

    #[error("found second root element <{0}>")]
    MultipleRoots(String),

    #[error("element <{0}> is not closed")]
    Unclosed(String),
}

fn read_element(event: &BytesStart<'_>) -> Result<Element, LoadError> {
    let tag = std::str::from_utf8(event.name().as_ref())?.to_string();
    let mut attributes = Attributes::new();
    for attr in event.attributes().with_checks(false) {
        let attr = attr?;
        let name = std::str::from_utf8(attr.key.as_ref())?;
        let value = attr.unescape_value()?;
        attributes.set(name, Value::Str(value.into_owned()));
    }
    Ok(Element {
        tag,
        attributes,
        children: Vec::new(),
    })
}

/// Attaches a finished element to its parent, or makes it the root.
fn attach(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), LoadError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err(LoadError::MultipleRoots(element.tag)),
        None => *root = Some(element),
    }
    Ok(())
}

/// Loads a document from a buffered reader.
pub fn load<R: BufRead>(input: R) -> Result<Element, LoadError> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;
    let mut buf = Vec::new();
    let mut num_elements = 0_usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                stack.push(read_element(&e)?);
            }
            Event::Empty(e) => {
                let element = read_element(&e)?;
                num_elements += 1;
                attach(element, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                // quick-xml verifies that end names match their start tags
                if let Some(element) = stack.pop() {
                    num_elements += 1;
                    attach(element, &mut stack, &mut root)?;
                }
            }
            _ => {}
        }
        buf.clear();
    }

    if let Some(unclosed) = stack.pop() {
        return Err(LoadError::Unclosed(unclosed.tag));
    }
    let root = root.ok_or(LoadError::Empty)?;
    info!("Loaded <{}> with {} elements", root.tag, num_elements);
    Ok(root)
}

pub fn load_slice(data: &[u8]) -> Result<Element, LoadError> {
    load(data)
}

pub fn load_file(path: impl AsRef<Path>) -> Result<Element, LoadError> {
    let file = File::open(path)?;
    load(BufReader::new(file))
}

//! Minimal element tree built on top of the `xml` event reader.
//!
//! Both data documents are small and read once per process, so they are
//! materialized into a tree and walked structurally.

use std::io::Read;

use xml::reader::{EventReader, XmlEvent};

use crate::axis::{parse_bool, parse_f64, parse_vec3};
use crate::error::{DataError, DataResult};
use glam::DVec3;

/// An XML element with its attributes and child elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Local tag name.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order.
    pub children: Vec<Element>,
}

impl Element {
    /// Returns the attribute value, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns a triple attribute, if present.
    pub fn vec3(&self, name: &str) -> DataResult<Option<DVec3>> {
        self.attr(name).map(|v| parse_vec3(name, v)).transpose()
    }

    /// Returns a float attribute, if present.
    pub fn f64(&self, name: &str) -> DataResult<Option<f64>> {
        self.attr(name).map(|v| parse_f64(name, v)).transpose()
    }

    /// Returns a boolean attribute, `false` when absent.
    pub fn flag(&self, name: &str) -> bool {
        self.attr(name).map(parse_bool).unwrap_or(false)
    }

    /// Iterates over direct children with the given tag.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Returns the first direct child with the given tag.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Parses a whole document and returns its root element.
pub fn parse_document<R: Read>(source: R) -> DataResult<Element> {
    let reader = EventReader::new(source);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    for event in reader {
        match event? {
            XmlEvent::StartElement {
                name, attributes, ..
            } => {
                stack.push(Element {
                    name: name.local_name,
                    attributes: attributes
                        .into_iter()
                        .map(|a| (a.name.local_name, a.value))
                        .collect(),
                    children: Vec::new(),
                });
            }
            XmlEvent::EndElement { .. } => {
                let element = match stack.pop() {
                    Some(element) => element,
                    None => continue,
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            _ => {}
        }
    }

    root.ok_or_else(|| DataError::skeleton_parse("document has no root element"))
}

/// Parses a document held in memory.
pub fn parse_str(source: &str) -> DataResult<Element> {
    parse_document(source.as_bytes())
}

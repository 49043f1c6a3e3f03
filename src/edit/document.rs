//! Flow definition document access.
//!
//! The flow is handled as a generic element tree. Only the small
//! `processor -> name / class / property -> name / value` sub-shape is
//! known here; lookups walk the tree by hand.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use xmltree::{Element, EmitterConfig, ParserConfig, XMLNode};

use crate::error::EditError;

const PROCESSOR: &str = "processor";
const PROPERTY: &str = "property";
const NAME: &str = "name";
const VALUE: &str = "value";
const CLASS: &str = "class";

/// Parse a flow definition.
///
/// Whitespace-only text is kept as text so values such as a `"\n"`
/// demarcator survive an edit of some other node.
pub fn parse_document(reader: impl Read) -> Result<Element> {
    let config = ParserConfig::new()
        .trim_whitespace(false)
        .whitespace_to_characters(true);
    Ok(Element::parse_with_config(reader, config)?)
}

/// Parse a flow definition file.
pub fn read_document(path: &Path) -> Result<Element> {
    let file = File::open(path)
        .with_context(|| format!("opening flow definition '{}'", path.display()))?;
    parse_document(BufReader::new(file))
        .with_context(|| format!("parsing flow definition '{}'", path.display()))
}

/// Serialize `document` to `path`, replacing any existing file.
pub fn write_document(document: &Element, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating flow definition '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    let config = EmitterConfig::new().perform_indent(false);
    document
        .write_with_config(&mut writer, config)
        .with_context(|| format!("writing flow definition '{}'", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("flushing flow definition '{}'", path.display()))?;
    Ok(())
}

/// The unique processor element named `processor` anywhere in the tree.
pub(crate) fn single_processor_mut<'a>(
    document: &'a mut Element,
    processor: &str,
) -> Result<&'a mut Element, EditError> {
    let mut matches = Vec::new();
    let mut trail = Vec::new();
    collect_processors(document, processor, &mut trail, &mut matches);

    match matches.len() {
        0 => Err(EditError::ProcessorNotFound {
            processor: processor.to_string(),
        }),
        1 => Ok(element_at_mut(document, &matches[0])),
        count => Err(EditError::AmbiguousProcessor {
            processor: processor.to_string(),
            count,
        }),
    }
}

/// The `value` element of the property named `property`.
pub(crate) fn property_value_mut<'a>(
    processor_element: &'a mut Element,
    processor: &str,
    property: &str,
) -> Result<&'a mut Element, EditError> {
    processor_element
        .children
        .iter_mut()
        .filter_map(XMLNode::as_mut_element)
        .find(|child| child.name == PROPERTY && child_text_equals(child, NAME, property))
        .and_then(|prop| prop.get_mut_child(VALUE))
        .ok_or_else(|| EditError::PropertyNotFound {
            processor: processor.to_string(),
            property: property.to_string(),
        })
}

/// The `class` element of a processor.
pub(crate) fn class_mut<'a>(
    processor_element: &'a mut Element,
    processor: &str,
) -> Result<&'a mut Element, EditError> {
    processor_element
        .get_mut_child(CLASS)
        .ok_or_else(|| EditError::ClassNotFound {
            processor: processor.to_string(),
        })
}

/// Replace all text content of `element` with `text`.
pub(crate) fn set_text(element: &mut Element, text: &str) {
    element
        .children
        .retain(|node| !matches!(node, XMLNode::Text(_) | XMLNode::CData(_)));
    if !text.is_empty() {
        element.children.push(XMLNode::Text(text.to_string()));
    }
}

fn child_text_equals(element: &Element, child: &str, expected: &str) -> bool {
    element
        .get_child(child)
        .and_then(|c| c.get_text())
        .is_some_and(|text| text == expected)
}

/// Record the child-index path of every matching processor below `element`.
fn collect_processors(
    element: &Element,
    processor: &str,
    trail: &mut Vec<usize>,
    matches: &mut Vec<Vec<usize>>,
) {
    for (index, node) in element.children.iter().enumerate() {
        let Some(child) = node.as_element() else {
            continue;
        };
        trail.push(index);
        if child.name == PROCESSOR && child_text_equals(child, NAME, processor) {
            matches.push(trail.clone());
        }
        collect_processors(child, processor, trail, matches);
        trail.pop();
    }
}

fn element_at_mut<'a>(mut element: &'a mut Element, path: &[usize]) -> &'a mut Element {
    for &index in path {
        element = match &mut element.children[index] {
            XMLNode::Element(child) => child,
            // Paths come from collect_processors over the same tree.
            _ => unreachable!("processor path points at a non-element node"),
        };
    }
    element
}

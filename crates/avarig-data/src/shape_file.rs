//! Shape documents: the viewer's "save appearance as XML" format.
//!
//! ```xml
//! <linden_genepool version="1.0">
//!   <archetype name="My Shape">
//!     <param id="33" name="Height" value="0.250"/>
//!   </archetype>
//! </linden_genepool>
//! ```
//!
//! Values are stored in the driver's declared range, not as UI positions.
//! Gender travels as parameter 80 (`male`, 0 or 1).

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use xml::common::XmlVersion;
use xml::writer::{EmitterConfig, XmlEvent};

use crate::appearance::Gender;
use crate::error::{DataError, DataResult};
use crate::xml_tree;

/// Parameter id carrying the gender flag.
pub const GENDER_PARAM_ID: i64 = 80;
const GENDER_PARAM_NAME: &str = "male";

/// One stored slider value.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeEntry {
    pub id: i64,
    pub name: String,
    pub value: f64,
}

/// A parsed or to-be-written shape document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapeDocument {
    pub name: String,
    pub gender: Option<Gender>,
    pub entries: Vec<ShapeEntry>,
}

impl ShapeDocument {
    /// Creates an empty document with a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Value stored for a parameter id.
    pub fn value(&self, id: i64) -> Option<f64> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.value)
    }
}

/// Writes a shape document.
pub fn write_shape<W: Write>(doc: &ShapeDocument, out: W) -> DataResult<()> {
    let mut writer = EmitterConfig::new()
        .perform_indent(true)
        .create_writer(out);
    writer.write(XmlEvent::StartDocument {
        version: XmlVersion::Version10,
        encoding: Some("US-ASCII"),
        standalone: Some(true),
    })?;
    writer.write(XmlEvent::start_element("linden_genepool").attr("version", "1.0"))?;
    writer.write(XmlEvent::start_element("archetype").attr("name", &doc.name))?;

    if let Some(gender) = doc.gender {
        let id = GENDER_PARAM_ID.to_string();
        let value = format!("{:.3}", gender.as_value());
        writer.write(
            XmlEvent::start_element("param")
                .attr("id", &id)
                .attr("name", GENDER_PARAM_NAME)
                .attr("value", &value),
        )?;
        writer.write(XmlEvent::end_element())?;
    }
    for entry in &doc.entries {
        let id = entry.id.to_string();
        let value = format!("{:.6}", entry.value);
        writer.write(
            XmlEvent::start_element("param")
                .attr("id", &id)
                .attr("name", &entry.name)
                .attr("value", &value),
        )?;
        writer.write(XmlEvent::end_element())?;
    }

    writer.write(XmlEvent::end_element())?;
    writer.write(XmlEvent::end_element())?;
    Ok(())
}

/// Reads a shape document. Entries with unparsable ids or values are
/// reported as errors; interpretation against the driver table is left to
/// the caller.
pub fn read_shape<R: Read>(source: R) -> DataResult<ShapeDocument> {
    let root = xml_tree::parse_document(source)?;
    if root.name != "linden_genepool" {
        return Err(DataError::appearance_parse(format!(
            "unexpected shape root <{}>",
            root.name
        )));
    }
    let archetype = root.child("archetype").unwrap_or(&root);
    let mut doc = ShapeDocument::new(archetype.attr("name").unwrap_or(""));
    for param in archetype.children_named("param") {
        let raw_id = param.attr("id").unwrap_or("");
        let id: i64 = raw_id
            .trim()
            .parse()
            .map_err(|_| DataError::invalid_number("id", raw_id))?;
        let value = param.f64("value")?.unwrap_or(0.0);
        if id == GENDER_PARAM_ID {
            doc.gender = Some(if value > 0.5 {
                Gender::Male
            } else {
                Gender::Female
            });
            continue;
        }
        doc.entries.push(ShapeEntry {
            id,
            name: param.attr("name").unwrap_or("").to_string(),
            value,
        });
    }
    Ok(doc)
}

/// Saves a shape document to disk.
pub fn save_shape_file(doc: &ShapeDocument, path: &Path) -> DataResult<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    write_shape(doc, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Loads a shape document from disk.
pub fn load_shape_file(path: &Path) -> DataResult<ShapeDocument> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DataError::AppearanceFileMissing {
            path: path.to_path_buf(),
        },
        _ => DataError::Io(e),
    })?;
    read_shape(BufReader::new(file))
}

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use roxmltree::{Document, ParsingOptions};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::declaration::declared_encoding;
use crate::encoding::{detect_bom, resolve, EncodingTag};
use crate::normalize::normalize;
use crate::scan::{scan_candidates, Verdict, Violation};

/// Why a scan call did not produce a document.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A dangerous construct was detected; the parser was never invoked.
    #[error(transparent)]
    Violation(#[from] Violation),

    /// The input passed the heuristic scan but is not well-formed XML.
    /// Malformed-but-harmless input is common and is not a security signal.
    #[error("malformed XML: {0}")]
    Malformed(#[from] roxmltree::Error),

    /// `scan_file` could not read the input. Not a security signal either.
    #[error("failed reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Builds the caller's preferred document representation from the parsed
/// tree. The gate does not care which representation that is; it only
/// guarantees the parse it hands over came from a buffer that scanned clean
/// and that the parser resolves no external entities.
///
/// Implemented for plain closures, so
/// `scan_with(xml, |doc: &Document| ...)` works directly.
pub trait DocumentSink {
    type Document;

    fn build(&mut self, doc: &Document<'_>) -> Self::Document;
}

impl<T, F> DocumentSink for F
where
    F: for<'a, 'input> FnMut(&'a Document<'input>) -> T,
{
    type Document = T;

    fn build(&mut self, doc: &Document<'_>) -> T {
        self(doc)
    }
}

/// Lightweight owned element tree; the default output carrier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    /// Concatenated direct text content of this element.
    pub text: String,
}

impl Element {
    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let mut el = Element {
            name: node.tag_name().name().to_string(),
            ..Default::default()
        };
        for attr in node.attributes() {
            el.attributes.push((attr.name().to_string(), attr.value().to_string()));
        }
        for child in node.children() {
            if child.is_element() {
                el.children.push(Element::from_node(child));
            } else if child.is_text() {
                el.text.push_str(child.text().unwrap_or_default());
            }
        }
        el
    }

    /// First direct child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Default sink: builds the owned [`Element`] tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementSink;

impl DocumentSink for ElementSink {
    type Document = Element;

    fn build(&mut self, doc: &Document<'_>) -> Element {
        Element::from_node(doc.root_element())
    }
}

/// Scan untrusted XML and, only if it is clean, parse it into the default
/// element-tree representation.
///
/// The pipeline: BOM detection, prolog-declaration extraction, encoding
/// reconciliation, normalization, heuristic scan, and only then the parse.
/// A [`ScanError::Violation`] means the parser never ran on this buffer.
pub fn scan(xml: impl AsRef<[u8]>) -> Result<Element, ScanError> {
    scan_with(xml, ElementSink)
}

/// [`scan`], but the caller picks the parsed-document representation.
pub fn scan_with<S: DocumentSink>(
    xml: impl AsRef<[u8]>,
    mut sink: S,
) -> Result<S::Document, ScanError> {
    let bytes = xml.as_ref();

    let bom = detect_bom(bytes);
    let provisional = bom.unwrap_or(EncodingTag::Utf8);
    let declared = declared_encoding(bytes, provisional);
    let resolution = resolve(bom, declared);

    debug!(
        encoding = resolution.authoritative.name(),
        bom = bom.is_some(),
        declared = declared.map(|d| d.name()),
        mismatch = resolution.mismatch_suspected,
        "resolved input encoding"
    );

    let primary = normalize(bytes, resolution.authoritative);
    let secondary = resolution.fallback().map(|alt| normalize(bytes, alt));

    let candidates = std::iter::once(primary.as_str()).chain(secondary.as_deref());
    if let Verdict::Violation(v) = scan_candidates(candidates) {
        warn!(construct = %v.construct, "blocking XML input before parse");
        return Err(v.into());
    }

    // roxmltree never loads external DTD subsets or external entities and
    // performs no I/O at all, so entity loading is structurally disabled.
    // allow_dtd keeps structure-only internal DTDs parseable; any entity
    // declaration was already rejected above.
    let mut options = ParsingOptions::default();
    options.allow_dtd = true;
    let doc = Document::parse_with_options(&primary, options)?;
    Ok(sink.build(&doc))
}

/// Read a file fully into memory, then [`scan`] it. The read is the only
/// I/O this crate performs.
pub fn scan_file(path: impl AsRef<Path>) -> Result<Element, ScanError> {
    scan_file_with(path, ElementSink)
}

/// [`scan_file`] with a caller-chosen output carrier.
pub fn scan_file_with<S: DocumentSink>(
    path: impl AsRef<Path>,
    sink: S,
) -> Result<S::Document, ScanError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    scan_with(bytes, sink)
}

//! Encoding-aware pre-parse security gate for untrusted XML.
//!
//! Naive `<!ENTITY` filters are bypassable by re-encoding the payload in
//! UTF-16/UTF-32 (with or without a BOM) or by declaring one encoding in
//! the prolog while the bytes use another. This crate resolves the true
//! encoding first (BOM, then declaration, then UTF-8), normalizes the
//! buffer without any entity processing, and only then pattern-scans for
//! DOCTYPE/ENTITY/external-reference constructs. When the BOM and the
//! declaration disagree, both readings are scanned; a match under either
//! blocks the input.
//!
//! Input that scans clean is handed to roxmltree, which performs no I/O
//! and resolves no external entities, as defense in depth.
//!
//! ```no_run
//! let doc = xml_sentry::scan("<results><result>test</result></results>")?;
//! assert_eq!(doc.child("result").unwrap().text, "test");
//! # Ok::<(), xml_sentry::ScanError>(())
//! ```

pub mod declaration;
pub mod encoding;
pub mod gateway;
pub mod normalize;
pub mod scan;

pub use encoding::EncodingTag;
pub use gateway::{
    scan, scan_file, scan_file_with, scan_with, DocumentSink, Element, ElementSink, ScanError,
};
pub use scan::{Construct, Verdict, Violation};

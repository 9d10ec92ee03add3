use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use serde::Serialize;
use thiserror::Error;

use crate::declaration::scannable;

/// Which dangerous construct a violation was raised for. The display names
/// are the literal keywords callers pattern-match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Construct {
    Doctype,
    Entity,
}

impl std::fmt::Display for Construct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Doctype => f.write_str("DOCTYPE"),
            Self::Entity => f.write_str("ENTITY"),
        }
    }
}

/// A dangerous construct was detected before parsing. This is a security
/// decision: it is always surfaced, never swallowed, and retrying on the
/// same buffer will produce it again.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("detected use of {construct} in XML, disabled to prevent XXE/XEE attacks (matched `{matched}`)")]
pub struct Violation {
    pub construct: Construct,
    /// The text the matcher fired on, as it appeared in the scanned candidate.
    pub matched: String,
}

/// Outcome of one heuristic scan. Terminal: produced exactly once per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Clean,
    Violation(Violation),
}

static PATTERNS: &[(&str, &str)] = &[
    // Entity declarations: blocked unconditionally, internal or external.
    ("entity", "<!entity"),
    // DOCTYPE is only blocked when its header references an external
    // subset; the system/public tokens below decide that. Any XML
    // whitespace can precede the keyword.
    ("doctype", "<!doctype"),
    ("system", " system"),
    ("system", "\tsystem"),
    ("system", "\nsystem"),
    ("system", "\rsystem"),
    ("public", " public"),
    ("public", "\tpublic"),
    ("public", "\npublic"),
    ("public", "\rpublic"),
];

static MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    let pats: Vec<&str> = PATTERNS.iter().map(|(_, p)| *p).collect();
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(pats)
        .expect("aho-corasick patterns must compile")
});

/// Scan every candidate decoding of the buffer; the first match on any of
/// them blocks. Over-blocking is always preferred to under-blocking here,
/// which is why a single suspicious candidate is enough.
pub fn scan_candidates<'a, I>(candidates: I) -> Verdict
where
    I: IntoIterator<Item = &'a str>,
{
    for text in candidates {
        if let Some(v) = scan_text(text) {
            return Verdict::Violation(v);
        }
    }
    Verdict::Clean
}

/// Scan one normalized text for XXE/XEE constructs.
///
/// Policy:
/// - any `<!ENTITY` declaration is a violation, no matter how harmless its
///   replacement text looks;
/// - a `<!DOCTYPE` is a violation when its header (before the internal
///   subset `[` or the closing `>`) carries a SYSTEM or PUBLIC external
///   reference;
/// - a DOCTYPE that only declares element structure passes, so ordinary
///   internal DTDs keep working.
pub fn scan_text(text: &str) -> Option<Violation> {
    let text = scannable(text);

    let mut doctypes: Vec<usize> = Vec::new();
    let mut externals: Vec<(usize, usize)> = Vec::new();

    for m in MATCHER.find_iter(text.as_bytes()) {
        let (name, _pat) = PATTERNS[m.pattern().as_usize()];
        match name {
            "entity" => {
                return Some(Violation {
                    construct: Construct::Entity,
                    matched: text[m.start()..m.end()].to_string(),
                });
            }
            "doctype" => doctypes.push(m.start()),
            "system" | "public" => externals.push((m.start(), m.end())),
            _ => {}
        }
    }

    for start in doctypes {
        let header_end = doctype_header_end(&text, start);
        for &(ext_start, ext_end) in &externals {
            if ext_start > start && ext_start < header_end {
                let matched: String = text[start..ext_end].chars().take(80).collect();
                return Some(Violation {
                    construct: Construct::Doctype,
                    matched,
                });
            }
        }
    }

    None
}

// End of the DOCTYPE declaration header: the opening `[` of an internal
// subset or the closing `>`, whichever comes first.
fn doctype_header_end(text: &str, start: usize) -> usize {
    text[start..]
        .find(['[', '>'])
        .map(|i| start + i)
        .unwrap_or(text.len())
}

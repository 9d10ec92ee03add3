use serde::Serialize;

/// Character encodings the gate can resolve and normalize from.
///
/// This is a closed set on purpose: the BOM table and the declaration
/// parser only ever produce one of these, and the normalizer matches on
/// them exhaustively. Anything else decodes as the UTF-8 default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncodingTag {
    /// UTF-8 and its ASCII subset; also the fallback when nothing else matched.
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

impl EncodingTag {
    /// Map a declared encoding label (from `encoding="..."`) to a tag.
    ///
    /// Unknown or unsupported labels are `None`; a bad label is never an
    /// error, the caller just falls back to the default.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        let up = label.to_ascii_uppercase();
        match up.as_str() {
            "UTF-8" | "UTF8" | "ASCII" | "US-ASCII" => Some(Self::Utf8),
            "UTF-16LE" => Some(Self::Utf16Le),
            "UTF-16BE" => Some(Self::Utf16Be),
            // Endianness unspecified: assume LE, the common producer default.
            // The mismatch rescan covers us if that guess is wrong.
            "UTF-16" | "UTF16" => Some(Self::Utf16Le),
            "UTF-32LE" | "UCS-4LE" => Some(Self::Utf32Le),
            "UTF-32BE" | "UCS-4BE" => Some(Self::Utf32Be),
            "UTF-32" | "UTF32" | "UCS-4" | "UCS4" => Some(Self::Utf32Le),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
            Self::Utf32Le => "UTF-32LE",
            Self::Utf32Be => "UTF-32BE",
        }
    }
}

pub const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
pub const UTF16_LE_BOM: [u8; 2] = [0xFF, 0xFE];
pub const UTF16_BE_BOM: [u8; 2] = [0xFE, 0xFF];
pub const UTF32_LE_BOM: [u8; 4] = [0xFF, 0xFE, 0x00, 0x00];
pub const UTF32_BE_BOM: [u8; 4] = [0x00, 0x00, 0xFE, 0xFF];

/// Inspect the leading bytes for a byte-order mark.
///
/// The 4-byte BOMs must be tried first: UTF-32LE's first two bytes are
/// exactly the UTF-16LE BOM, so the longest match has to win.
///
/// A UTF-8 BOM maps to no tag here — UTF-8 is already the default and the
/// normalizer strips the marker itself.
pub fn detect_bom(bytes: &[u8]) -> Option<EncodingTag> {
    if bytes.starts_with(&UTF32_LE_BOM) {
        return Some(EncodingTag::Utf32Le);
    }
    if bytes.starts_with(&UTF32_BE_BOM) {
        return Some(EncodingTag::Utf32Be);
    }
    if bytes.starts_with(&UTF16_LE_BOM) {
        return Some(EncodingTag::Utf16Le);
    }
    if bytes.starts_with(&UTF16_BE_BOM) {
        return Some(EncodingTag::Utf16Be);
    }
    None
}

/// Outcome of reconciling the BOM signal with the prolog declaration.
#[derive(Debug, Clone, Copy)]
pub struct Resolution {
    /// The encoding the buffer is decoded under.
    pub authoritative: EncodingTag,
    /// What the prolog claimed, if it could be read at all.
    pub declared: Option<EncodingTag>,
    /// The two signals disagree, or the prolog was unreadable under the
    /// BOM's encoding. Does not change the decoding choice; it tells the
    /// scanner to also check the non-authoritative reading.
    pub mismatch_suspected: bool,
}

impl Resolution {
    /// The second candidate encoding to scan under when a mismatch is
    /// suspected: the declared one, or the UTF-8 default when the
    /// declaration itself was unreadable.
    pub fn fallback(&self) -> Option<EncodingTag> {
        if !self.mismatch_suspected {
            return None;
        }
        let alt = self.declared.unwrap_or(EncodingTag::Utf8);
        (alt != self.authoritative).then_some(alt)
    }
}

/// Decide the authoritative encoding.
///
/// Policy:
/// - A BOM is a hard signal from the producer and always wins.
/// - Otherwise trust the declaration.
/// - Otherwise UTF-8.
///
/// A declaration that disagrees with the BOM is never trusted for decoding,
/// but it is never ignored either: `mismatch_suspected` makes the scanner
/// re-check under the declared encoding, so a payload that only reads as
/// markup under the lying declaration still gets caught. The same flag is
/// raised when a BOM is present but no declaration could be extracted under
/// it — a BOM stapled onto bytes in some other encoding looks exactly like
/// that.
pub fn resolve(bom: Option<EncodingTag>, declared: Option<EncodingTag>) -> Resolution {
    let authoritative = bom.or(declared).unwrap_or(EncodingTag::Utf8);
    let mismatch_suspected = match (bom, declared) {
        (Some(b), Some(d)) => b != d,
        (Some(_), None) => true,
        _ => false,
    };
    Resolution {
        authoritative,
        declared,
        mismatch_suspected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf32le_bom_wins_over_utf16le_prefix() {
        // FF FE 00 00 starts with FF FE; longest match must win.
        assert_eq!(
            detect_bom(&[0xFF, 0xFE, 0x00, 0x00, 0x3C, 0x00]),
            Some(EncodingTag::Utf32Le)
        );
        assert_eq!(
            detect_bom(&[0xFF, 0xFE, 0x3C, 0x00]),
            Some(EncodingTag::Utf16Le)
        );
    }

    #[test]
    fn detects_all_four_boms() {
        assert_eq!(detect_bom(&[0xFE, 0xFF, 0x00, 0x3C]), Some(EncodingTag::Utf16Be));
        assert_eq!(
            detect_bom(&[0x00, 0x00, 0xFE, 0xFF, 0x00, 0x00, 0x00, 0x3C]),
            Some(EncodingTag::Utf32Be)
        );
        assert_eq!(detect_bom(b"<?xml"), None);
        assert_eq!(detect_bom(&UTF8_BOM), None);
        assert_eq!(detect_bom(&[]), None);
    }

    #[test]
    fn bom_is_authoritative_over_declaration() {
        let r = resolve(Some(EncodingTag::Utf16Le), Some(EncodingTag::Utf8));
        assert_eq!(r.authoritative, EncodingTag::Utf16Le);
        assert!(r.mismatch_suspected);
        assert_eq!(r.fallback(), Some(EncodingTag::Utf8));
    }

    #[test]
    fn declaration_used_when_no_bom() {
        let r = resolve(None, Some(EncodingTag::Utf32Be));
        assert_eq!(r.authoritative, EncodingTag::Utf32Be);
        assert!(!r.mismatch_suspected);
        assert_eq!(r.fallback(), None);
    }

    #[test]
    fn defaults_to_utf8() {
        let r = resolve(None, None);
        assert_eq!(r.authoritative, EncodingTag::Utf8);
        assert!(!r.mismatch_suspected);
    }

    #[test]
    fn bom_without_readable_declaration_is_suspicious() {
        let r = resolve(Some(EncodingTag::Utf16Be), None);
        assert!(r.mismatch_suspected);
        assert_eq!(r.fallback(), Some(EncodingTag::Utf8));
    }

    #[test]
    fn labels_map_case_insensitively() {
        assert_eq!(EncodingTag::from_label("utf-16le"), Some(EncodingTag::Utf16Le));
        assert_eq!(EncodingTag::from_label(" UTF-8 "), Some(EncodingTag::Utf8));
        assert_eq!(EncodingTag::from_label("UCS-4BE"), Some(EncodingTag::Utf32Be));
        assert_eq!(EncodingTag::from_label("Shift_JIS"), None);
        assert_eq!(EncodingTag::from_label(""), None);
    }
}

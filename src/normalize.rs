use crate::encoding::EncodingTag;

/// Decode raw bytes to a UTF-8 `String` under the given encoding.
///
/// Lossy by contract: malformed sequences become U+FFFD instead of failing,
/// so the scanner still runs over partially-broken input — attackers lean on
/// malformed sequences precisely because strict decoders bail out early.
/// A leading BOM for the chosen encoding is stripped. No entity or DTD
/// processing happens here, ever; this is a pure codepoint remapping.
pub fn normalize(bytes: &[u8], encoding: EncodingTag) -> String {
    match encoding {
        EncodingTag::Utf8 => {
            let (text, _had_errors) = encoding_rs::UTF_8.decode_with_bom_removal(bytes);
            text.into_owned()
        }
        EncodingTag::Utf16Le => {
            let (text, _had_errors) = encoding_rs::UTF_16LE.decode_with_bom_removal(bytes);
            text.into_owned()
        }
        EncodingTag::Utf16Be => {
            let (text, _had_errors) = encoding_rs::UTF_16BE.decode_with_bom_removal(bytes);
            text.into_owned()
        }
        EncodingTag::Utf32Le => decode_utf32(bytes, false),
        EncodingTag::Utf32Be => decode_utf32(bytes, true),
    }
}

// encoding_rs has no UTF-32 decoder, so this stays hand-rolled: one code
// unit per 4-byte chunk, out-of-range units and a trailing partial chunk
// map to U+FFFD.
fn decode_utf32(bytes: &[u8], big_endian: bool) -> String {
    let mut out = String::with_capacity(bytes.len() / 4 + 1);
    let mut chunks = bytes.chunks_exact(4);
    let mut first = true;
    for chunk in chunks.by_ref() {
        let unit: [u8; 4] = chunk.try_into().unwrap();
        let code = if big_endian {
            u32::from_be_bytes(unit)
        } else {
            u32::from_le_bytes(unit)
        };
        if first {
            first = false;
            if code == 0xFEFF {
                continue;
            }
        }
        match char::from_u32(code) {
            // Surrogate code points are not valid UTF-32 scalar values.
            Some(c) => out.push(c),
            None => out.push(char::REPLACEMENT_CHARACTER),
        }
    }
    if !chunks.remainder().is_empty() {
        out.push(char::REPLACEMENT_CHARACTER);
    }
    out
}

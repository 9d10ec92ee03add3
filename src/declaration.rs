use crate::encoding::EncodingTag;
use crate::normalize::normalize;

/// How far into the buffer we look for the `<?xml ... ?>` prolog. The
/// declaration sits at the very start of any honest document; 4KB is
/// generous enough to survive BOMs, leading whitespace and wide encodings.
const DECLARATION_WINDOW: usize = 4096;

/// Pull the `encoding="..."` value out of the XML prolog, if there is one.
///
/// This is a text search, not a parse, and it is deliberately tolerant of
/// the provisional encoding being wrong. Decoding UTF-16/32 bytes under a
/// UTF-8 guess interleaves the ASCII-range markers (`<`, `?`, `=`, quotes)
/// with NULs at fixed strides; dropping NULs and replacement characters
/// before matching makes the prolog readable again. That tolerance is the
/// point: a buffer whose declaration only surfaces this way is exactly the
/// kind of mismatched input the gate exists to catch.
///
/// Unknown encoding names and missing prologs both yield `None`.
pub fn declared_encoding(bytes: &[u8], provisional: EncodingTag) -> Option<EncodingTag> {
    let window = &bytes[..bytes.len().min(DECLARATION_WINDOW)];
    let text = scannable(&normalize(window, provisional));
    let label = declared_label(&text)?;
    EncodingTag::from_label(&label)
}

/// Strip NUL and U+FFFD so that pattern matching sees through wide or
/// partially-malformed decodes. Neither character can occur in well-formed
/// XML text, so removing them never hides legitimate markup.
pub fn scannable(text: &str) -> String {
    if !text.contains(['\0', char::REPLACEMENT_CHARACTER]) {
        return text.to_string();
    }
    text.chars()
        .filter(|&c| c != '\0' && c != char::REPLACEMENT_CHARACTER)
        .collect()
}

fn declared_label(text: &str) -> Option<String> {
    let start = text.find("<?xml")?;
    let rest = &text[start..];
    let prolog = match rest.find("?>") {
        Some(end) => &rest[..end],
        None => rest,
    };

    let attr = prolog.find("encoding")?;
    let mut chars = prolog[attr + "encoding".len()..].chars();

    // encoding <ws>* = <ws>* ("value" | 'value')
    let mut c = chars.next()?;
    while c.is_ascii_whitespace() {
        c = chars.next()?;
    }
    if c != '=' {
        return None;
    }
    c = chars.next()?;
    while c.is_ascii_whitespace() {
        c = chars.next()?;
    }
    let quote = c;
    if quote != '"' && quote != '\'' {
        return None;
    }

    let mut label = String::new();
    for c in chars {
        if c == quote {
            return Some(label);
        }
        label.push(c);
    }
    None
}

use xml_sentry::declaration::declared_encoding;
use xml_sentry::encoding::{detect_bom, resolve};
use xml_sentry::normalize::normalize;
use xml_sentry::scan::{scan_candidates, Verdict};
use xml_sentry::{scan, EncodingTag, ScanError};

const MULTIBYTE: &[EncodingTag] = &[
    EncodingTag::Utf16Le,
    EncodingTag::Utf16Be,
    EncodingTag::Utf32Le,
    EncodingTag::Utf32Be,
];

fn encode(text: &str, tag: EncodingTag) -> Vec<u8> {
    match tag {
        EncodingTag::Utf8 => text.as_bytes().to_vec(),
        EncodingTag::Utf16Le => text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect(),
        EncodingTag::Utf16Be => text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect(),
        EncodingTag::Utf32Le => text.chars().flat_map(|c| (c as u32).to_le_bytes()).collect(),
        EncodingTag::Utf32Be => text.chars().flat_map(|c| (c as u32).to_be_bytes()).collect(),
    }
}

fn bom(tag: EncodingTag) -> &'static [u8] {
    match tag {
        EncodingTag::Utf8 => &[0xEF, 0xBB, 0xBF],
        EncodingTag::Utf16Le => &[0xFF, 0xFE],
        EncodingTag::Utf16Be => &[0xFE, 0xFF],
        EncodingTag::Utf32Le => &[0xFF, 0xFE, 0x00, 0x00],
        EncodingTag::Utf32Be => &[0x00, 0x00, 0xFE, 0xFF],
    }
}

fn xxe_payload(declared: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"{declared}\"?>\n\
         <!DOCTYPE methodCall [\n\
         \x20 <!ENTITY pocdata SYSTEM \"file:///etc/passwd\">\n\
         ]>\n\
         <methodCall>\n    <methodName>retrieved: &pocdata;</methodName>\n</methodCall>"
    )
}

fn assert_entity_violation(result: Result<xml_sentry::Element, ScanError>, context: &str) {
    match result {
        Err(ScanError::Violation(v)) => {
            assert!(v.to_string().contains("ENTITY"), "{context}: {v}")
        }
        other => panic!("{context}: expected entity violation, got {other:?}"),
    }
}

#[test]
fn detects_xxe_in_all_multibyte_encodings_without_bom() {
    for &tag in MULTIBYTE {
        let bytes = encode(&xxe_payload(tag.name()), tag);
        assert!(detect_bom(&bytes).is_none(), "{}: unexpected BOM", tag.name());
        assert_entity_violation(scan(&bytes), tag.name());
    }
}

#[test]
fn detects_xxe_in_all_multibyte_encodings_with_bom() {
    for &tag in MULTIBYTE {
        let mut bytes = bom(tag).to_vec();
        bytes.extend_from_slice(&encode(&xxe_payload(tag.name()), tag));
        assert_eq!(detect_bom(&bytes), Some(tag), "{}", tag.name());
        assert_entity_violation(scan(&bytes), tag.name());
    }
}

#[test]
fn declared_encoding_lying_about_the_bytes_is_not_a_bypass() {
    // Prolog claims UTF-8, the bytes (and the BOM) say otherwise.
    for &tag in MULTIBYTE {
        let mut bytes = bom(tag).to_vec();
        bytes.extend_from_slice(&encode(&xxe_payload("UTF-8"), tag));
        assert_entity_violation(scan(&bytes), tag.name());
    }
}

#[test]
fn clean_multibyte_documents_scan_clean_and_parse() {
    let xml = |declared: &str| {
        format!(
            "<?xml version=\"1.0\" encoding=\"{declared}\"?>\n\
             <results>\n    <result>test</result>\n</results>"
        )
    };

    for &tag in MULTIBYTE {
        for with_bom in [false, true] {
            let mut bytes = Vec::new();
            if with_bom {
                bytes.extend_from_slice(bom(tag));
            }
            bytes.extend_from_slice(&encode(&xml(tag.name()), tag));

            let doc = scan(&bytes)
                .unwrap_or_else(|e| panic!("{} (bom={with_bom}): {e:?}", tag.name()));
            assert_eq!(doc.child("result").unwrap().text, "test");
        }
    }
}

// The scanner stage alone, driven the way the gateway drives it. An
// undefined entity *reference* in content must not trip the scan even
// though a full parse of it would fail.
#[test]
fn scanner_stage_passes_clean_payload_with_entity_reference() {
    let xml = |declared: &str| {
        format!(
            "<?xml version=\"1.0\" encoding=\"{declared}\"?>\n\
             <methodCall>\n    <methodName>retrieved: &pocdata;</methodName>\n</methodCall>"
        )
    };

    for &tag in MULTIBYTE {
        let bytes = encode(&xml(tag.name()), tag);

        let bom_tag = detect_bom(&bytes);
        let declared = declared_encoding(&bytes, bom_tag.unwrap_or(EncodingTag::Utf8));
        assert_eq!(declared, Some(tag), "{}", tag.name());

        let resolution = resolve(bom_tag, declared);
        let text = normalize(&bytes, resolution.authoritative);
        assert_eq!(
            scan_candidates([text.as_str()]),
            Verdict::Clean,
            "{}",
            tag.name()
        );
    }
}

#[test]
fn scanner_stage_flags_xxe_under_every_candidate_encoding() {
    for &tag in MULTIBYTE {
        let bytes = encode(&xxe_payload(tag.name()), tag);
        let declared = declared_encoding(&bytes, EncodingTag::Utf8);
        let resolution = resolve(None, declared);
        let text = normalize(&bytes, resolution.authoritative);
        assert!(
            matches!(scan_candidates([text.as_str()]), Verdict::Violation(_)),
            "{}",
            tag.name()
        );
    }
}

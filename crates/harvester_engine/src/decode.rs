use chardetng::EncodingDetector;
use encoding_rs::Encoding;

use crate::PageError;

/// How many leading bytes are scanned for `<meta charset>`.
const META_PRESCAN_BYTES: usize = 1024;

/// Decodes a response body to UTF-8.
///
/// Order: BOM, `Content-Type` charset, `<meta charset>` in the first
/// kilobyte, then chardetng's guess.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> Result<String, PageError> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    let declared = content_type
        .and_then(charset_from_content_type)
        .or_else(|| charset_from_meta(bytes))
        .and_then(|label| Encoding::for_label(label.as_bytes()));
    if let Some(encoding) = declared {
        return decode_with(bytes, encoding);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    decode_with(bytes, detector.guess(None, true))
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']).to_string())
    })
}

fn charset_from_meta(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(META_PRESCAN_BYTES)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    let start = head.find("charset=")? + "charset=".len();
    let label: String = head[start..]
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c: &char| c.is_ascii_alphanumeric() || matches!(*c, '-' | '_' | ':' | '.'))
        .collect();
    (!label.is_empty()).then_some(label)
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> Result<String, PageError> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(PageError::Decode {
            encoding: encoding.name().to_string(),
        });
    }
    Ok(text.into_owned())
}

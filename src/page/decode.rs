use encoding_rs::{Encoding, UTF_8};

/// Bodies shorter than this are never decoded and never evaluated
pub const MIN_TEXT_LENGTH: usize = 100;

/// How far into the body to look for a `<meta charset>` declaration
const SNIFF_WINDOW: usize = 1024;

/// Decodes a page body to text
///
/// Tries, in order: a byte order mark, strict UTF-8, the charset declared in
/// the response headers, and a charset declared in the document head. Every
/// attempt is strict; the first clean decode wins.
///
/// Returns `None` for PDFs, bodies under [`MIN_TEXT_LENGTH`] bytes, and bodies
/// that none of the candidates decode without errors.
pub fn decode_text(content: &[u8], declared_charset: Option<&str>) -> Option<String> {
    if content.starts_with(b"%PDF-") || content.len() < MIN_TEXT_LENGTH {
        return None;
    }

    if let Some((encoding, bom_length)) = Encoding::for_bom(content) {
        if let Some(text) = decode_strict(encoding, &content[bom_length..]) {
            return Some(text);
        }
    }

    if let Some(text) = decode_strict(UTF_8, content) {
        return Some(text);
    }

    if let Some(encoding) = declared_charset.and_then(|c| Encoding::for_label(c.trim().as_bytes())) {
        if let Some(text) = decode_strict(encoding, content) {
            return Some(text);
        }
    }

    let head = &content[..content.len().min(SNIFF_WINDOW)];
    if let Some(encoding) = sniff_meta_charset(head) {
        if let Some(text) = decode_strict(encoding, content) {
            return Some(text);
        }
    }

    None
}

fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|cow| cow.into_owned())
}

/// Finds `charset=...` in the first bytes of an HTML document
fn sniff_meta_charset(head: &[u8]) -> Option<&'static Encoding> {
    let lowered = String::from_utf8_lossy(head).to_ascii_lowercase();
    let start = lowered.find("charset=")? + "charset=".len();
    let label: String = lowered[start..]
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        .collect();
    Encoding::for_label(label.as_bytes())
}

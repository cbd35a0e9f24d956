//! Content-type detection for file parts.

/// Bytes inspected when sniffing.
pub const SNIFF_LEN: usize = 512;

pub const OCTET_STREAM: &str = "application/octet-stream";
const PLAIN_TEXT: &str = "text/plain; charset=utf-8";
const ZIP: &str = "application/zip";

/// Pick the content type for an upload.
///
/// An explicit type always wins. Otherwise the leading bytes are checked for
/// a known signature, then the filename extension is consulted, then the
/// bytes are checked for plain text. Zip signatures defer to the extension so
/// office documents keep their specific type.
pub fn detect_content_type(explicit: Option<&str>, filename: &str, data: &[u8]) -> String {
    if let Some(mime) = explicit.map(str::trim).filter(|m| !m.is_empty()) {
        return mime.to_owned();
    }

    let prefix = &data[..data.len().min(SNIFF_LEN)];
    let by_extension = mime_guess::from_path(filename).first_raw();
    match sniff(prefix) {
        Some(ZIP) => by_extension.unwrap_or(ZIP).to_owned(),
        Some(sniffed) => sniffed.to_owned(),
        None => match by_extension {
            Some(guess) => guess.to_owned(),
            None if looks_like_text(prefix) => PLAIN_TEXT.to_owned(),
            None => OCTET_STREAM.to_owned(),
        },
    }
}

/// Match well-known binary signatures and markup prologues.
pub fn sniff(prefix: &[u8]) -> Option<&'static str> {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"%PDF-", "application/pdf"),
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"BM", "image/bmp"),
        (b"PK\x03\x04", ZIP),
        (b"\x1f\x8b\x08", "application/x-gzip"),
        (b"OggS", "application/ogg"),
        (b"ID3", "audio/mpeg"),
        (b"fLaC", "audio/flac"),
    ];

    if let Some((_, mime)) = SIGNATURES.iter().find(|(magic, _)| prefix.starts_with(magic)) {
        return Some(*mime);
    }

    if prefix.len() >= 12 && prefix.starts_with(b"RIFF") {
        match &prefix[8..12] {
            b"WEBP" => return Some("image/webp"),
            b"WAVE" => return Some("audio/wave"),
            b"AVI " => return Some("video/avi"),
            _ => {}
        }
    }
    if prefix.len() >= 12 && &prefix[4..8] == b"ftyp" {
        return Some("video/mp4");
    }

    let start = prefix.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(prefix.len());
    let markup = &prefix[start..];
    if starts_with_ignore_case(markup, b"<!doctype html") || starts_with_ignore_case(markup, b"<html")
    {
        return Some("text/html; charset=utf-8");
    }
    if markup.starts_with(b"<?xml") {
        return Some("text/xml; charset=utf-8");
    }
    None
}

/// UTF-8 without control characters other than common whitespace. A
/// multi-byte sequence cut off by the sniff window still counts as text.
pub fn looks_like_text(prefix: &[u8]) -> bool {
    if prefix.is_empty() {
        return false;
    }
    let valid = match std::str::from_utf8(prefix) {
        Ok(text) => text,
        Err(err) if err.error_len().is_none() => {
            std::str::from_utf8(&prefix[..err.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => return false,
    };
    valid.chars().all(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t' | '\x0c'))
}

fn starts_with_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack[..needle.len()].eq_ignore_ascii_case(needle)
}

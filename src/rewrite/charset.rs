/// Best-effort text decoding for response bodies of unknown origin.
///
/// Only the first 1024 bytes are sniffed: valid UTF-8 there is taken as
/// UTF-8 for the whole body; anything else falls back to a lossy decode
/// rather than rejecting the body outright.
pub fn decode_text(body: &[u8]) -> String {
    let sniff_len = body.len().min(1024);
    if std::str::from_utf8(&body[..sniff_len]).is_ok() {
        if let Ok(s) = std::str::from_utf8(body) {
            return s.to_string();
        }
    }
    String::from_utf8_lossy(body).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_clean_utf8() {
        assert_eq!(decode_text("hello".as_bytes()), "hello");
    }

    #[test]
    fn falls_back_to_lossy_on_invalid_bytes() {
        let body = vec![0xff, 0xfe, b'x'];
        let decoded = decode_text(&body);
        assert!(decoded.ends_with('x'));
    }
}

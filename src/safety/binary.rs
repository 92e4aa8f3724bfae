/// How many leading bytes are sniffed.
const SNIFF_LEN: usize = 8000;

/// Heuristic binary detection: a NUL byte or invalid UTF-8 in the first
/// few kilobytes.
pub fn is_binary(content: &[u8]) -> bool {
    let head = &content[..content.len().min(SNIFF_LEN)];
    if head.contains(&0) {
        return true;
    }
    match std::str::from_utf8(head) {
        Ok(_) => false,
        // A multi-byte sequence cut off by the sniff window is fine.
        Err(e) => e.error_len().is_some(),
    }
}

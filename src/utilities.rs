//! Fixed-width text helpers.
//!
//! Names, addresses and request bodies travel as fixed-size byte arrays, both on
//! disk and on the wire. Text is stored as UTF-8 followed by at least one NUL byte;
//! everything after the first NUL is padding.

/// Packs `text` into a zero-padded array of `N` bytes.
///
/// Returns `None` if the text contains a NUL byte or does not leave room for the
/// terminating NUL.
pub fn pack_text<const N: usize>(text: &str) -> Option<[u8; N]> {
    let bytes = text.as_bytes();
    if bytes.len() >= N || bytes.contains(&0) {
        return None;
    }

    let mut out = [0_u8; N];
    out[..bytes.len()].copy_from_slice(bytes);
    Some(out)
}

/// Reads the NUL-terminated text at the start of `bytes`.
///
/// Returns `None` if no terminator is present or the content is not valid UTF-8.
pub fn unpack_text(bytes: &[u8]) -> Option<String> {
    let end = bytes.iter().position(|b| *b == 0)?;
    std::str::from_utf8(&bytes[..end]).ok().map(str::to_string)
}

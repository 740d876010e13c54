//! Mailbox-name encoding between UTF-8 and IMAP's modified UTF-7.
//!
//! RFC 3501 section 5.1.3 (and RFC 2060 before it) requires non-ASCII
//! mailbox names on the wire in a modified UTF-7: printable ASCII is
//! direct, `&` escapes as `&-`, and everything else becomes
//! `&<base64(UTF-16BE)>-` with `,` instead of `/` in the base64
//! alphabet and no padding. This is not RFC 2152 UTF-7.
//!
//! Encoding is minimal and normalized; decoding is permissive and
//! passes undecodable chunks through verbatim, since names ultimately
//! live as UTF-8 on our side and are re-encoded on the way out.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

const MUTF7: GeneralPurpose = GeneralPurpose::new(
    &alphabet::IMAP_MUTF7,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Encodes a UTF-8 name into modified UTF-7. Empty input stays empty.
#[must_use]
pub fn encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending = String::new();

    for ch in input.chars() {
        if ch == '&' {
            flush_encoded(&mut out, &mut pending);
            out.push_str("&-");
        } else if is_direct(ch) {
            flush_encoded(&mut out, &mut pending);
            out.push(ch);
        } else {
            pending.push(ch);
        }
    }
    flush_encoded(&mut out, &mut pending);

    out
}

/// Decodes a modified UTF-7 name back to UTF-8.
#[must_use]
pub fn decode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let end = after
            .find(|c: char| !is_base64_char(c))
            .unwrap_or(after.len());
        let chunk = &after[..end];

        if chunk.is_empty() {
            out.push('&');
        } else {
            match MUTF7.decode(chunk) {
                Ok(bytes) => {
                    let units: Vec<u16> = bytes
                        .chunks(2)
                        // A spurious trailing byte is dropped.
                        .filter(|pair| pair.len() == 2)
                        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                        .collect();
                    out.push_str(&String::from_utf16_lossy(&units));
                }
                Err(_) => {
                    out.push('&');
                    out.push_str(chunk);
                }
            }
        }

        let mut consumed = pos + 1 + end;
        if rest[consumed..].starts_with('-') {
            consumed += 1;
        }
        rest = &rest[consumed..];
    }
    out.push_str(rest);

    out
}

fn flush_encoded(out: &mut String, pending: &mut String) {
    if pending.is_empty() {
        return;
    }
    let mut buf = Vec::with_capacity(pending.len() * 2);
    for unit in pending.encode_utf16() {
        buf.extend_from_slice(&unit.to_be_bytes());
    }
    out.push('&');
    out.push_str(&MUTF7.encode(&buf));
    out.push('-');
    pending.clear();
}

const fn is_direct(ch: char) -> bool {
    matches!(ch, ' '..='~') && ch != '&'
}

const fn is_base64_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '+' || ch == ','
}

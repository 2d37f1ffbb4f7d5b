//! Frame decoding for 125 kHz ASCII-hex tag readers.
//!
//! A card pass arrives as a short byte burst. The well-formed shape is a
//! framed `STX .. ETX` sequence whose payload is the ASCII rendering of
//! the tag number, but truncated and marker-less bursts are routine on a
//! noisy line. Decoding always works on the uppercase hex rendering of
//! the burst and tries two strategies:
//!
//! - **Framed**: markers present. Payload hex pairs are mapped back to
//!   the ASCII characters the reader sent, characters outside the
//!   `0-9A-F` tag alphabet dropped, leading zero padding stripped, and
//!   the number re-padded to the minimum tag width.
//! - **Fixed field**: no usable markers. A fixed-offset slice of the hex
//!   text itself is taken, matching the field layout of the common
//!   marker-less burst; short bursts are taken whole.
//!
//! Either way the result must normalize into a [`TagId`]. Anything that
//! does not decodes to `None`; noise is not an error.

use crate::types::TagId;

/// Frame start marker (STX) as it appears in the hex rendering.
pub const FRAME_START: &str = "02";
/// Frame end marker (ETX) as it appears in the hex rendering.
pub const FRAME_END: &str = "03";
/// Shortest hex rendering that can carry both markers and a payload.
pub const MIN_FRAMED_HEX_LEN: usize = 6;
/// Shortest hex rendering the fixed-field path will consider.
pub const FIELD_MIN_HEX_LEN: usize = 8;
/// Longest hex rendering the fixed-field path will consider.
pub const FIELD_MAX_HEX_LEN: usize = 20;
/// Offset of the tag field within a marker-less hex rendering.
pub const FIELD_OFFSET: usize = 6;
/// Width of the tag field within a marker-less hex rendering.
pub const FIELD_WIDTH: usize = 10;

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Decode one raw reader burst into a normalized tag.
///
/// # Rules (in order)
/// 1. Render the burst as uppercase hex text.
/// 2. If the text is framed (`02` prefix, `03` suffix, at least
///    [`MIN_FRAMED_HEX_LEN`] long), map the payload pairs back to
///    printable ASCII, keep the `0-9A-F` digits, strip leading zeros,
///    pad back to [`TagId::MIN_LEN`], and accept a tag-length result. An
///    all-zero payload strips to nothing and carries no number.
/// 3. Otherwise take the hex text whole: reject lengths outside
///    [`FIELD_MIN_HEX_LEN`]`..=`[`FIELD_MAX_HEX_LEN`]; slice the
///    [`FIELD_WIDTH`]-wide field at [`FIELD_OFFSET`] when the text is
///    long enough to carry it (the slice end clamps to the text), else
///    take the whole text.
/// 4. Anything failing tag normalization decodes to `None`.
pub fn decode_frame(raw: &[u8]) -> Option<TagId> {
    if raw.is_empty() {
        return None;
    }
    let hex = render_hex(raw);
    decode_framed(&hex).or_else(|| decode_fixed_field(&hex))
}

// ─── Hex rendering ────────────────────────────────────────────────

fn render_hex(raw: &[u8]) -> String {
    let mut text = String::with_capacity(raw.len() * 2);
    for &byte in raw {
        text.push(HEX_UPPER[(byte >> 4) as usize] as char);
        text.push(HEX_UPPER[(byte & 0x0F) as usize] as char);
    }
    text
}

// ─── Framed path ──────────────────────────────────────────────────

fn decode_framed(hex: &str) -> Option<TagId> {
    if hex.len() < MIN_FRAMED_HEX_LEN
        || !hex.starts_with(FRAME_START)
        || !hex.ends_with(FRAME_END)
    {
        return None;
    }
    let payload = &hex[FRAME_START.len()..hex.len() - FRAME_END.len()];

    // Each payload pair is one ASCII character as the reader sent it.
    // Control bytes are line noise and checksum framing; drop them.
    let mut digits = String::with_capacity(payload.len() / 2);
    for pair in payload.as_bytes().chunks_exact(2) {
        let Ok(text) = std::str::from_utf8(pair) else {
            continue;
        };
        let Ok(byte) = u8::from_str_radix(text, 16) else {
            continue;
        };
        if byte.is_ascii_graphic() || byte == b' ' {
            let ch = byte as char;
            // Tag digits are uppercase; a decoded 'a'..'f' is payload
            // noise, not a digit.
            if ch.is_ascii_digit() || ('A'..='F').contains(&ch) {
                digits.push(ch);
            }
        }
    }

    let number = digits.trim_start_matches('0');
    if number.is_empty() {
        // Zero padding only; there is no tag number in this payload.
        return None;
    }
    let padded = format!("{number:0>width$}", width = TagId::MIN_LEN);
    TagId::new(padded).ok()
}

// ─── Fixed-field path ─────────────────────────────────────────────

fn decode_fixed_field(hex: &str) -> Option<TagId> {
    if hex.len() < FIELD_MIN_HEX_LEN || hex.len() > FIELD_MAX_HEX_LEN {
        return None;
    }
    let field = if hex.len() >= FIELD_WIDTH {
        let end = (FIELD_OFFSET + FIELD_WIDTH).min(hex.len());
        &hex[FIELD_OFFSET..end]
    } else {
        hex
    };
    TagId::new(field).ok()
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a framed burst around an ASCII payload.
    fn framed(payload: &str) -> Vec<u8> {
        let mut raw = vec![0x02];
        raw.extend_from_slice(payload.as_bytes());
        raw.push(0x03);
        raw
    }

    fn tag(s: &str) -> TagId {
        TagId::new(s).expect("valid tag")
    }

    // ── 1. Framed path ──────────────────────────────────────────────

    #[test]
    fn framed_payload_decodes_and_strips_zero_padding() {
        assert_eq!(decode_frame(&framed("02003E98C8")), Some(tag("2003E98C8")));
    }

    #[test]
    fn framed_payload_drops_control_characters() {
        assert_eq!(decode_frame(&framed("0A01583468\r\n")), Some(tag("A01583468")));
    }

    #[test]
    fn framed_payload_keeps_only_hex_characters() {
        // The 'A' of "TAG" survives the filter; the rest does not.
        assert_eq!(decode_frame(&framed("TAG:00FF3C21")), Some(tag("A00FF3C21")));
    }

    #[test]
    fn framed_short_number_pads_to_min_width() {
        assert_eq!(decode_frame(&framed("3")), Some(tag("00000003")));
        assert_eq!(decode_frame(&framed("00C8")), Some(tag("000000C8")));
    }

    #[test]
    fn framed_lowercase_payload_chars_are_dropped() {
        // 'a'..'f' sit outside the tag alphabet; only the decimal
        // digits survive, then strip and re-pad.
        assert_eq!(decode_frame(&framed("00ab12cd")), Some(tag("00000012")));
    }

    #[test]
    fn framed_zero_only_payload_has_no_number() {
        // Strips to nothing; the six-char rendering is also below the
        // fixed-field floor.
        assert_eq!(decode_frame(&framed("0")), None);
    }

    #[test]
    fn framed_zero_payload_can_still_decode_as_raw_field() {
        // Zero payloads strip to nothing in the framed path, but a
        // rendering inside the fixed-field bounds falls through and
        // decodes as raw hex.
        assert_eq!(decode_frame(&framed("00")), Some(tag("02303003")));
        assert_eq!(decode_frame(&framed("00000000")), Some(tag("3030303030")));
    }

    #[test]
    fn framed_overlong_number_rejected_both_ways() {
        // Seventeen digits with no zero padding exceed the tag bound;
        // the rendering is also far past the fixed-field ceiling.
        assert_eq!(decode_frame(&framed("123456789ABCDEF12")), None);
    }

    // ── 2. Fixed-field path ─────────────────────────────────────────

    #[test]
    fn long_markerless_burst_uses_fixed_field() {
        let raw = [0x01, 0x10, 0x2F, 0x3E, 0x98, 0xC8, 0x55, 0xAA];
        assert_eq!(decode_frame(&raw), Some(tag("3E98C855AA")));
    }

    #[test]
    fn fixed_field_end_clamps_to_burst() {
        // Seven bytes render to 14 chars; the field runs 6..14.
        let raw = [0x01, 0x10, 0x2F, 0x3E, 0x98, 0xC8, 0x55];
        assert_eq!(decode_frame(&raw), Some(tag("3E98C855")));
    }

    #[test]
    fn short_markerless_burst_taken_whole() {
        assert_eq!(decode_frame(&[0xAB, 0xCD, 0xEF, 0x01]), Some(tag("ABCDEF01")));
    }

    #[test]
    fn mid_length_burst_field_too_short() {
        // Five or six bytes clear the length gate, but the clamped field
        // is under the minimum tag width.
        assert_eq!(decode_frame(&[0xAB, 0xCD, 0xEF, 0x01, 0x23]), None);
        assert_eq!(decode_frame(&[0xAB, 0xCD, 0xEF, 0x01, 0x23, 0x45]), None);
    }

    #[test]
    fn oversize_burst_rejected() {
        assert_eq!(decode_frame(&[0x5A; 11]), None);
    }

    #[test]
    fn empty_and_tiny_bursts_reject() {
        assert_eq!(decode_frame(&[]), None);
        assert_eq!(decode_frame(&[0x02]), None);
        assert_eq!(decode_frame(&[0x02, 0x30, 0x03]), None);
    }

    // ── 3. Bounds ───────────────────────────────────────────────────

    #[test]
    fn field_constants_stay_inside_tag_bounds() {
        const {
            assert!(FIELD_MIN_HEX_LEN == TagId::MIN_LEN);
            assert!(FIELD_WIDTH <= TagId::MAX_LEN);
            assert!(FIELD_OFFSET + FIELD_WIDTH <= FIELD_MAX_HEX_LEN);
        }
    }
}

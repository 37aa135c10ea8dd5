//! Transport decode stage: base64 text to raw PCM bytes.

use base64::{Engine as _, engine::general_purpose};

use crate::error::DecodeError;

/// Decode a base64 audio payload into raw bytes.
///
/// ASCII whitespace anywhere in the payload is ignored, so line-wrapped or spaced text decodes
/// the same as the compact form. An empty payload decodes to an empty buffer; deciding
/// whether that is enough audio is left to [`crate::pcm::materialize`].
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let compact: String = payload.split_ascii_whitespace().collect();
    if compact.is_empty() {
        return Ok(Vec::new());
    }
    Ok(general_purpose::STANDARD.decode(compact)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_standard_alphabet() {
        let bytes = decode_payload("AAEC/w==").unwrap();
        assert_eq!(bytes, vec![0x00, 0x01, 0x02, 0xff]);
    }

    #[test]
    fn empty_payload_is_empty_buffer() {
        assert!(decode_payload("").unwrap().is_empty());
        assert!(decode_payload("  \n").unwrap().is_empty());
    }

    #[test]
    fn malformed_payload_is_rejected() {
        assert!(decode_payload("AAE").is_err());
        assert!(decode_payload("AA*C").is_err());
    }

    #[test]
    fn line_wrapped_payload_decodes() {
        let bytes = decode_payload("AAEC\r\n/w==\n").unwrap();
        assert_eq!(bytes, vec![0x00, 0x01, 0x02, 0xff]);
    }

    #[test]
    fn interior_spaces_and_tabs_are_ignored() {
        let expected = vec![0x00, 0x01, 0x02, 0xff];
        assert_eq!(decode_payload("AAEC /w==").unwrap(), expected);
        assert_eq!(decode_payload("AAEC\t/w==").unwrap(), expected);
        assert_eq!(decode_payload(" AA EC\t/w =\x0c= ").unwrap(), expected);
    }

    #[test]
    fn decoding_is_repeatable() {
        let payload = "AAABAP9//38AgA==";
        assert_eq!(decode_payload(payload).unwrap(), decode_payload(payload).unwrap());
    }
}

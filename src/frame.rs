use crate::error::Error;
use crate::opcode::Opcode;

/// Largest payload this codec will ever put in a single emitted frame. A message longer than
/// this is split across several `Continuation` frames by the writer.
pub const FRAME_LIMIT: usize = 128 * 1024;

/// A decoded RFC 6455 §5.2 frame header.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub fin: bool,
    pub opcode: Opcode,
    pub masked: bool,
    pub payload_length: u64,
    pub masking_key: Option<[u8; 4]>,
}

/// Attempts to parse one frame header from the front of `bytes`.
///
/// Returns `Ok(None)` if `bytes` doesn't yet hold a complete header (the reader should refill
/// and try again), `Ok(Some((header, header_len)))` on success, or `Err` for malformed input
/// that can never become valid by reading more bytes.
pub fn parse_header(bytes: &[u8]) -> Result<Option<(FrameHeader, usize)>, Error> {
    if bytes.len() < 2 {
        return Ok(None);
    }

    let byte0 = bytes[0];
    let byte1 = bytes[1];

    let fin = byte0 & 0b1000_0000 != 0;
    let rsv1 = byte0 & 0b0100_0000 != 0;
    let rsv2 = byte0 & 0b0010_0000 != 0;
    let rsv3 = byte0 & 0b0001_0000 != 0;
    if rsv1 || rsv2 || rsv3 {
        // No extension is ever negotiated by this codec (permessage-deflate is out of scope),
        // so any RSV bit set is necessarily a protocol violation.
        return Err(Error::ReservedBitsSet);
    }

    let opcode = Opcode::from_byte(byte0 & 0b0000_1111)?;

    if !fin && opcode.is_control() {
        return Err(Error::FragmentedControlFrame);
    }

    let masked = byte1 & 0b1000_0000 != 0;
    let len7 = byte1 & 0b0111_1111;

    if len7 > 125 && opcode.is_control() {
        return Err(Error::ControlFramePayloadTooLarge);
    }

    let (payload_length, len_ext_size): (u64, usize) = match len7 {
        0..=125 => (len7 as u64, 0),
        126 => {
            if bytes.len() < 2 + 2 {
                return Ok(None);
            }
            let value = u16::from_be_bytes([bytes[2], bytes[3]]);
            (value as u64, 2)
        }
        127 => {
            if bytes.len() < 2 + 8 {
                return Ok(None);
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[2..10]);
            let value = u64::from_be_bytes(raw);
            if value & (1 << 63) != 0 {
                return Err(Error::FrameLengthTooLarge);
            }
            (value, 8)
        }
        _ => unreachable!("len7 is masked to 7 bits"),
    };

    let header_len_without_mask = 2 + len_ext_size;
    let total_header_len = header_len_without_mask + if masked { 4 } else { 0 };

    if bytes.len() < total_header_len {
        return Ok(None);
    }

    let masking_key = if masked {
        let mut key = [0u8; 4];
        key.copy_from_slice(&bytes[header_len_without_mask..total_header_len]);
        Some(key)
    } else {
        None
    };

    Ok(Some((
        FrameHeader {
            fin,
            opcode,
            masked,
            payload_length,
            masking_key,
        },
        total_header_len,
    )))
}

/// Encodes a frame header (never masked — this codec only ever emits server-to-client frames)
/// into `out`, appending to whatever is already there.
pub fn write_header(out: &mut Vec<u8>, fin: bool, opcode: Opcode, payload_length: usize) {
    let byte0 = ((fin as u8) << 7) | opcode.as_byte();
    out.push(byte0);

    if payload_length <= 125 {
        out.push(payload_length as u8);
    } else if payload_length <= u16::MAX as usize {
        out.push(126);
        out.extend_from_slice(&(payload_length as u16).to_be_bytes());
    } else {
        out.push(127);
        out.extend_from_slice(&(payload_length as u64).to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_more_bytes_for_an_empty_buffer() {
        assert!(parse_header(&[]).unwrap().is_none());
        assert!(parse_header(&[0x81]).unwrap().is_none());
    }

    #[test]
    fn parses_a_short_masked_text_frame() {
        // FIN=1, opcode=Text, MASK=1, len=2
        let mut bytes = vec![0b1000_0001, 0b1000_0010];
        bytes.extend_from_slice(&[1, 2, 3, 4]); // masking key
        let (header, consumed) = parse_header(&bytes).unwrap().unwrap();
        assert_eq!(consumed, 6);
        assert!(header.fin);
        assert_eq!(header.opcode, Opcode::Text);
        assert!(header.masked);
        assert_eq!(header.payload_length, 2);
        assert_eq!(header.masking_key, Some([1, 2, 3, 4]));
    }

    #[test]
    fn boundary_lengths_pick_the_right_extension() {
        let mut out = Vec::new();
        write_header(&mut out, true, Opcode::Binary, 125);
        assert_eq!(out.len(), 2);

        let mut out = Vec::new();
        write_header(&mut out, true, Opcode::Binary, 126);
        assert_eq!(out.len(), 4);
        let (header, consumed) = parse_header(&out).unwrap().unwrap();
        assert_eq!(consumed, 4);
        assert_eq!(header.payload_length, 126);

        let mut out = Vec::new();
        write_header(&mut out, true, Opcode::Binary, 65536);
        assert_eq!(out.len(), 10);
        let (header, consumed) = parse_header(&out).unwrap().unwrap();
        assert_eq!(consumed, 10);
        assert_eq!(header.payload_length, 65536);
    }

    #[test]
    fn rejects_reserved_bits() {
        let bytes = [0b1100_0001, 0b0000_0000];
        assert!(matches!(
            parse_header(&bytes),
            Err(Error::ReservedBitsSet)
        ));
    }

    #[test]
    fn rejects_a_fragmented_control_frame() {
        // FIN=0, opcode=Ping
        let bytes = [0b0000_1001, 0b0000_0000];
        assert!(matches!(
            parse_header(&bytes),
            Err(Error::FragmentedControlFrame)
        ));
    }

    #[test]
    fn rejects_an_oversized_64_bit_length() {
        let mut bytes = vec![0b1000_0010, 0b0000_0000 | 127];
        bytes.extend_from_slice(&(1u64 << 63).to_be_bytes());
        assert!(matches!(
            parse_header(&bytes),
            Err(Error::FrameLengthTooLarge)
        ));
    }

    #[test]
    fn rejects_an_oversized_control_payload() {
        let bytes = [0b1000_1000, 126]; // Close, len7=126 (>125)
        assert!(matches!(
            parse_header(&bytes),
            Err(Error::ControlFramePayloadTooLarge)
        ));
    }

    #[test]
    fn needs_more_bytes_for_the_extended_length_field() {
        let bytes = [0b1000_0010, 126]; // says 2 more length bytes follow, but none given
        assert!(parse_header(&bytes).unwrap().is_none());
    }
}

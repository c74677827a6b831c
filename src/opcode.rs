use crate::error::Error;

/// RFC 6455 §5.2 opcode values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Result<Self, Error> {
        match byte {
            0x0 => Ok(Opcode::Continuation),
            0x1 => Ok(Opcode::Text),
            0x2 => Ok(Opcode::Binary),
            0x8 => Ok(Opcode::Close),
            0x9 => Ok(Opcode::Ping),
            0xA => Ok(Opcode::Pong),
            other => Err(Error::InvalidOpcode(other)),
        }
    }

    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Ping, Pong and Close are control frames: never fragmented, never host-visible.
    pub fn is_control(&self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_valid_byte() {
        for byte in [0x0, 0x1, 0x2, 0x8, 0x9, 0xA] {
            let opcode = Opcode::from_byte(byte).unwrap();
            assert_eq!(opcode.as_byte(), byte);
        }
    }

    #[test]
    fn rejects_reserved_opcodes() {
        for byte in [0x3, 0x7, 0xB, 0xF] {
            assert!(Opcode::from_byte(byte).is_err());
        }
    }

    #[test]
    fn only_control_frames_are_control() {
        assert!(Opcode::Close.is_control());
        assert!(Opcode::Ping.is_control());
        assert!(Opcode::Pong.is_control());
        assert!(!Opcode::Text.is_control());
        assert!(!Opcode::Binary.is_control());
        assert!(!Opcode::Continuation.is_control());
    }
}

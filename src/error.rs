// Load-time failures. A running emulator never aborts: anomalies after power up are logged and
// absorbed, so the only fallible surface is cartridge loading.
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // The ROM image is too short to contain the 0100-014F information area, or its length does
    // not match the ROM size code at 0148.
    MalformedHeader,
    // The checksum over 0134-014C does not match the byte at 014D. Real hardware locks up on
    // such a cartridge, so the load is rejected.
    ChecksumMismatch { expect: u8, found: u8 },
    // The cartridge type at 0147 names a mapper this implementation does not provide. The type
    // enum is open: new mappers refuse cleanly instead of corrupting memory.
    UnsupportedCartridgeType(u8),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedHeader => write!(f, "malformed cartridge header"),
            Error::ChecksumMismatch { expect, found } => {
                write!(f, "header checksum mismatch: expect 0x{:02x}, found 0x{:02x}", expect, found)
            }
            Error::UnsupportedCartridgeType(n) => write!(f, "unsupported cartridge type: 0x{:02x}", n),
        }
    }
}

impl std::error::Error for Error {}

//! Sensirion I²C framing helpers shared by the STC31 and SHTC3 drivers.
//!
//! Every 16-bit data word travels big-endian followed by a CRC-8
//! (polynomial 0x31, init 0xFF, no final xor).

use crate::error::{HwError, Result};

const CRC8_POLYNOMIAL: u8 = 0x31;
const CRC8_INIT: u8 = 0xFF;

pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = CRC8_INIT;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLYNOMIAL
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Command word followed by optional argument words, each argument carrying its CRC.
pub fn command_frame(command: u16, args: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + args.len() * 3);
    out.extend_from_slice(&command.to_be_bytes());
    for word in args {
        let bytes = word.to_be_bytes();
        out.extend_from_slice(&bytes);
        out.push(crc8(&bytes));
    }
    out
}

/// Decode `[hi, lo, crc]*` triplets into words, verifying every checksum.
pub fn decode_words(buf: &[u8]) -> Result<Vec<u16>> {
    buf.chunks_exact(3)
        .map(|chunk| {
            let word = u16::from_be_bytes([chunk[0], chunk[1]]);
            let expected = crc8(&chunk[..2]);
            if chunk[2] != expected {
                return Err(HwError::Crc {
                    word,
                    got: chunk[2],
                    expected,
                });
            }
            Ok(word)
        })
        .collect()
}

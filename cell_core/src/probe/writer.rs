//! Outbound request framing.

use crate::error::CellError;

/// Highest request id handed out; the generator wraps to 0 after it.
pub const MAX_REQUEST_ID: u16 = 65533;

const SERIAL_PREFIX_LEN: usize = 4;
const CHANNEL_ADDRESS_LEN: usize = 33;
const GET_MEASURE_ACTION: [u8; 2] = [0x10, 0x00];

/// Builds measurement requests for one probe.
#[derive(Debug, Clone)]
pub struct PacketWriter {
    device_id: [u8; 4],
    request_id: u16,
}

/// Device id bytes from a serial-number string such as `"FBX-00423917"`.
///
/// The four-character prefix is dropped and the rest parsed as an integer `v`;
/// the probe expects `[v>>24, v, v>>8, v>>16]` (low three bytes in LE order,
/// preceded by the high byte).
pub fn device_id_from_serial(serial: &str) -> Result<[u8; 4], CellError> {
    let invalid = || CellError::InvalidSerial(serial.to_string());
    let digits = serial
        .get(SERIAL_PREFIX_LEN..)
        .ok_or_else(invalid)?
        .trim_end_matches(['\0', ' ']);
    let v: u32 = digits.parse().map_err(|_| invalid())?;
    let [b0, b1, b2, b3] = v.to_le_bytes();
    Ok([b3, b0, b1, b2])
}

impl PacketWriter {
    pub fn new(device_id: [u8; 4]) -> Self {
        Self {
            device_id,
            request_id: 0,
        }
    }

    pub fn from_serial(serial: &str) -> Result<Self, CellError> {
        Ok(Self::new(device_id_from_serial(serial)?))
    }

    /// Writer whose generator starts at `request_id`.
    pub fn starting_at(device_id: [u8; 4], request_id: u16) -> Self {
        Self {
            device_id,
            request_id,
        }
    }

    pub fn device_id(&self) -> [u8; 4] {
        self.device_id
    }

    /// Id the next request should carry.
    pub fn request_id(&self) -> u16 {
        self.request_id
    }

    fn advance(&mut self) {
        self.request_id = if self.request_id >= MAX_REQUEST_ID {
            0
        } else {
            self.request_id + 1
        };
    }

    /// Request header: `FF 01 01`, device id, 33-byte channel address
    /// (byte 1 set), action `10 00`, `id` LE, 4 padding bytes.
    ///
    /// Also advances the generator, whatever `id` was passed in.
    pub fn header(&mut self, id: u16) -> Vec<u8> {
        let mut p = Vec::with_capacity(3 + 4 + CHANNEL_ADDRESS_LEN + 2 + 2 + 4);
        p.extend_from_slice(&[0xFF, 0x01, 0x01]);
        p.extend_from_slice(&self.device_id);
        let mut channel = [0u8; CHANNEL_ADDRESS_LEN];
        channel[1] = 1;
        p.extend_from_slice(&channel);
        p.extend_from_slice(&GET_MEASURE_ACTION);
        p.extend_from_slice(&id.to_le_bytes());
        p.extend_from_slice(&[0; 4]);
        self.advance();
        p
    }

    /// Request footer: `FF 02` then `id` LE.
    pub fn footer(&self, id: u16) -> Vec<u8> {
        let [lo, hi] = id.to_le_bytes();
        vec![0xFF, 0x02, lo, hi]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_to_device_id() {
        // 423917 = 0x00_06_77_ED
        assert_eq!(
            device_id_from_serial("FBX-00423917").unwrap(),
            [0x00, 0xED, 0x77, 0x06]
        );
        assert_eq!(
            device_id_from_serial("ABCD16909060\0\0").unwrap(),
            [0x01, 0x04, 0x03, 0x02]
        );
    }

    #[test]
    fn bad_serials_are_rejected() {
        for s in ["FBX", "FBX-", "FBX-12ab", "FBX-99999999999"] {
            assert!(matches!(
                device_id_from_serial(s),
                Err(CellError::InvalidSerial(_))
            ));
        }
    }

    #[test]
    fn header_layout() {
        let mut w = PacketWriter::new([0xA1, 0xA2, 0xA3, 0xA4]);
        let h = w.header(0x0102);
        assert_eq!(h.len(), 48);
        assert_eq!(h[..3], [0xFF, 0x01, 0x01]);
        assert_eq!(h[3..7], [0xA1, 0xA2, 0xA3, 0xA4]);
        assert_eq!(h[7], 0);
        assert_eq!(h[8], 1);
        assert!(h[9..40].iter().all(|&b| b == 0));
        assert_eq!(h[40..42], [0x10, 0x00]);
        assert_eq!(h[42..44], [0x02, 0x01]);
        assert_eq!(h[44..], [0, 0, 0, 0]);
    }

    #[test]
    fn footer_layout() {
        let w = PacketWriter::new([0; 4]);
        assert_eq!(w.footer(0xBEEF), vec![0xFF, 0x02, 0xEF, 0xBE]);
    }

    #[test]
    fn header_advances_regardless_of_id() {
        let mut w = PacketWriter::new([0; 4]);
        assert_eq!(w.request_id(), 0);
        w.header(500);
        assert_eq!(w.request_id(), 1);
        w.header(1);
        w.header(1);
        assert_eq!(w.request_id(), 3);
        // footer never touches the generator
        w.footer(7);
        assert_eq!(w.request_id(), 3);
    }

    #[test]
    fn wraps_before_overflow() {
        let mut w = PacketWriter::starting_at([0; 4], MAX_REQUEST_ID);
        w.header(MAX_REQUEST_ID);
        assert_eq!(w.request_id(), 0);
    }
}

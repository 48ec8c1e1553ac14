//! Inbound frame decoding.
//!
//! Every USB transfer from the probe is one frame. The first two bytes select
//! the kind: `FF 01` header, `FF 03` data, `FF 02` footer. A header carries
//! the response type at bytes 40..42 (LE). For a measurement response (type
//! 17) the data frames following it carry, by position `c mod 7` where `c`
//! counts data frames since the header:
//!
//! | c mod 7 | payload                                |
//! |---------|----------------------------------------|
//! | 2       | phase angle, f64, degrees              |
//! | 4       | temperature, f64, kelvin               |
//! | 5       | pressure, f64, hPa                     |
//! | 6       | status bitmask, u32 LE; ends the answer |
//!
//! The device writes doubles as raw IEEE-754 bytes in its own (little-endian)
//! order. They are decoded explicitly as little-endian here so the result
//! does not depend on the host architecture.

use super::errors::{self, SensorFlag};

/// Response type of a measurement answer.
pub const MEASUREMENT_RESPONSE: u16 = 17;
const RESPONSE_TYPE_OFFSET: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFrame<'a> {
    Header { response_type: Option<u16> },
    Data { payload: &'a [u8] },
    Footer { ack_id: Option<u16> },
}

impl<'a> ProbeFrame<'a> {
    /// Classify a raw transfer. `None` for anything without a known prefix.
    pub fn parse(buf: &'a [u8]) -> Option<Self> {
        match buf {
            [0xFF, 0x01, ..] => Some(ProbeFrame::Header {
                response_type: buf
                    .get(RESPONSE_TYPE_OFFSET..RESPONSE_TYPE_OFFSET + 2)
                    .map(|b| u16::from_le_bytes([b[0], b[1]])),
            }),
            [0xFF, 0x03, payload @ ..] => Some(ProbeFrame::Data { payload }),
            [0xFF, 0x02, rest @ ..] => Some(ProbeFrame::Footer {
                ack_id: rest.get(..2).map(|b| u16::from_le_bytes([b[0], b[1]])),
            }),
            _ => None,
        }
    }
}

/// A complete measurement answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeAnswer {
    pub phase: f64,
    pub temperature_c: f64,
    pub pressure_pa: f64,
    pub errors: Vec<SensorFlag>,
}

#[derive(Debug, Default)]
pub struct PacketReader {
    counter: u32,
    response_type: Option<u16>,
    phase: f64,
    temperature_c: f64,
    pressure_pa: f64,
}

fn f64_le(payload: &[u8]) -> Option<f64> {
    let bytes: [u8; 8] = payload.get(..8)?.try_into().ok()?;
    Some(f64::from_le_bytes(bytes))
}

fn u32_le(payload: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = payload.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

impl PacketReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feed one inbound transfer; returns an answer once its status frame arrives.
    pub fn process(&mut self, buf: &[u8]) -> Option<ProbeAnswer> {
        match ProbeFrame::parse(buf)? {
            ProbeFrame::Header { response_type } => {
                if response_type.is_none() {
                    tracing::warn!(len = buf.len(), "probe header too short for a response type");
                }
                self.response_type = response_type;
                self.counter = 0;
                None
            }
            ProbeFrame::Data { payload } => {
                self.counter = self.counter.wrapping_add(1);
                if self.response_type == Some(MEASUREMENT_RESPONSE) {
                    self.measurement(payload)
                } else {
                    None
                }
            }
            ProbeFrame::Footer { ack_id } => {
                tracing::trace!(?ack_id, "probe footer");
                None
            }
        }
    }

    fn measurement(&mut self, payload: &[u8]) -> Option<ProbeAnswer> {
        let slot = self.counter % 7;
        let short = || {
            tracing::warn!(slot, len = payload.len(), "probe data frame too short, ignored");
        };
        match slot {
            2 => match f64_le(payload) {
                Some(v) => self.phase = v,
                None => short(),
            },
            4 => match f64_le(payload) {
                Some(v) => self.temperature_c = v - 273.15,
                None => short(),
            },
            5 => match f64_le(payload) {
                Some(v) => self.pressure_pa = v * 100.0,
                None => short(),
            },
            6 => match u32_le(payload) {
                Some(bits) => {
                    return Some(ProbeAnswer {
                        phase: self.phase,
                        temperature_c: self.temperature_c,
                        pressure_pa: self.pressure_pa,
                        errors: errors::decode(bits),
                    });
                }
                None => short(),
            },
            _ => {}
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(response_type: u16) -> Vec<u8> {
        let mut h = vec![0u8; 64];
        h[0] = 0xFF;
        h[1] = 0x01;
        h[40..42].copy_from_slice(&response_type.to_le_bytes());
        h
    }

    fn data(payload: &[u8]) -> Vec<u8> {
        let mut f = vec![0xFF, 0x03];
        f.extend_from_slice(payload);
        f
    }

    fn feed_measurement(r: &mut PacketReader, bits: u32) -> Option<ProbeAnswer> {
        assert!(r.process(&header(MEASUREMENT_RESPONSE)).is_none());
        let frames = [
            data(&[0; 8]),
            data(&30.5f64.to_le_bytes()),
            data(&[0; 8]),
            data(&298.15f64.to_le_bytes()),
            data(&1013.25f64.to_le_bytes()),
        ];
        for f in &frames {
            assert!(r.process(f).is_none());
        }
        r.process(&data(&bits.to_le_bytes()))
    }

    #[test]
    fn decodes_full_answer() {
        let mut r = PacketReader::new();
        let a = feed_measurement(&mut r, 0).unwrap();
        assert_eq!(a.phase, 30.5);
        assert!((a.temperature_c - 25.0).abs() < 1e-9);
        assert!((a.pressure_pa - 101_325.0).abs() < 1e-9);
        assert!(a.errors.is_empty());
    }

    #[test]
    fn status_bits_are_decoded() {
        let mut r = PacketReader::new();
        let a = feed_measurement(&mut r, 5).unwrap();
        let codes: Vec<u32> = a.errors.iter().map(|f| f.code).collect();
        assert_eq!(codes, vec![1, 4]);
    }

    #[test]
    fn other_response_types_ignore_data() {
        let mut r = PacketReader::new();
        r.process(&header(3));
        for _ in 0..7 {
            assert!(r.process(&data(&[0; 8])).is_none());
        }
    }

    #[test]
    fn unknown_prefix_does_not_advance_counter() {
        let mut r = PacketReader::new();
        r.process(&header(MEASUREMENT_RESPONSE));
        for _ in 0..5 {
            r.process(&data(&[0; 8]));
        }
        assert!(r.process(&[0xAB, 0xCD, 1, 2]).is_none());
        assert!(r.process(&[0xFF]).is_none());
        assert!(r.process(&data(&0u32.to_le_bytes())).is_some());
    }

    #[test]
    fn header_restarts_the_count() {
        let mut r = PacketReader::new();
        r.process(&header(MEASUREMENT_RESPONSE));
        r.process(&data(&[0; 8]));
        r.process(&data(&[0; 8]));
        assert!(feed_measurement(&mut r, 0).is_some());
    }

    #[test]
    fn short_status_frame_is_ignored() {
        let mut r = PacketReader::new();
        r.process(&header(MEASUREMENT_RESPONSE));
        for _ in 0..5 {
            r.process(&data(&[0; 8]));
        }
        assert!(r.process(&data(&[0, 0])).is_none());
    }

    #[test]
    fn reset_forgets_response_type() {
        let mut r = PacketReader::new();
        r.process(&header(MEASUREMENT_RESPONSE));
        r.reset();
        for _ in 0..6 {
            assert!(r.process(&data(&[0; 8])).is_none());
        }
    }

    #[test]
    fn footer_is_acknowledged() {
        assert_eq!(
            ProbeFrame::parse(&[0xFF, 0x02, 0x34, 0x12]),
            Some(ProbeFrame::Footer {
                ack_id: Some(0x1234)
            })
        );
        let mut r = PacketReader::new();
        assert!(r.process(&[0xFF, 0x02, 0x34, 0x12]).is_none());
    }
}

//! In-process stand-in for the USB oxygen probe.
//!
//! The simulated device speaks the same frame protocol as the real one: after a
//! request footer arrives it queues a response header (type 17), six data
//! frames and a footer on the IN side.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cell_traits::{BoxError, OpenedProbe, ProbeConnector, ProbeLink};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use crate::error::HwError;

const MEASUREMENT_RESPONSE: u16 = 17;
const HEADER_LEN: usize = 64;

/// What the simulated probe reports on the next answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeReading {
    /// Phase angle in degrees.
    pub phase: f64,
    pub temperature_k: f64,
    pub pressure_hpa: f64,
    pub error_bits: u32,
}

impl Default for ProbeReading {
    fn default() -> Self {
        ProbeReading {
            phase: 26.82,
            temperature_k: 293.15,
            pressure_hpa: 967.0,
            error_bits: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Behaviour {
    reading: ProbeReading,
    silent: bool,
    fail_send: bool,
    requests: u32,
}

/// Shared handle used to steer the simulated device while the driver owns its link.
#[derive(Debug, Clone, Default)]
pub struct SimulatedProbe {
    inner: Arc<Mutex<Behaviour>>,
}

impl SimulatedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reading(&self, reading: ProbeReading) {
        if let Ok(mut b) = self.inner.lock() {
            b.reading = reading;
        }
    }

    /// Stop answering requests. Sends still succeed.
    pub fn set_silent(&self, silent: bool) {
        if let Ok(mut b) = self.inner.lock() {
            b.silent = silent;
        }
    }

    pub fn set_fail_send(&self, fail: bool) {
        if let Ok(mut b) = self.inner.lock() {
            b.fail_send = fail;
        }
    }

    /// Number of complete requests (footer frames) seen so far.
    pub fn requests(&self) -> u32 {
        self.inner.lock().map(|b| b.requests).unwrap_or(0)
    }
}

/// Response frames for one measurement answer, in wire order.
pub fn answer_frames(reading: &ProbeReading, ack_id: u16) -> Vec<Vec<u8>> {
    let mut header = vec![0u8; HEADER_LEN];
    header[0] = 0xFF;
    header[1] = 0x01;
    header[40..42].copy_from_slice(&MEASUREMENT_RESPONSE.to_le_bytes());

    let data = |payload: &[u8]| {
        let mut f = vec![0xFF, 0x03];
        f.extend_from_slice(payload);
        f
    };

    let mut footer = vec![0xFF, 0x02];
    footer.extend_from_slice(&ack_id.to_le_bytes());

    vec![
        header,
        data(&0u64.to_le_bytes()),
        data(&reading.phase.to_le_bytes()),
        data(&0u64.to_le_bytes()),
        data(&reading.temperature_k.to_le_bytes()),
        data(&reading.pressure_hpa.to_le_bytes()),
        data(&reading.error_bits.to_le_bytes()),
        footer,
    ]
}

pub struct SimulatedProbeLink {
    probe: SimulatedProbe,
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl SimulatedProbeLink {
    fn new(probe: SimulatedProbe) -> Self {
        let (tx, rx) = unbounded();
        SimulatedProbeLink { probe, tx, rx }
    }
}

impl ProbeLink for SimulatedProbeLink {
    fn send(&self, frame: &[u8]) -> Result<(), BoxError> {
        let mut b = self
            .probe
            .inner
            .lock()
            .map_err(|_| HwError::Usb("simulated probe state poisoned".into()))?;
        if b.fail_send {
            return Err(Box::new(HwError::Usb("simulated transfer failure".into())));
        }
        if frame.len() >= 4 && frame[0] == 0xFF && frame[1] == 0x02 {
            b.requests += 1;
            if !b.silent {
                let id = u16::from_le_bytes([frame[2], frame[3]]);
                for f in answer_frames(&b.reading, id) {
                    // the receiver lives in self, so this cannot fail
                    let _ = self.tx.send(f);
                }
            }
        }
        Ok(())
    }

    fn receive(&self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>, BoxError> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => {
                let n = frame.len().min(buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                Ok(Some(n))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(Box::new(HwError::Usb("simulated link closed".into())))
            }
        }
    }
}

/// Opens [`SimulatedProbeLink`]s bound to one shared [`SimulatedProbe`].
pub struct SimulatedProbeConnector {
    probe: SimulatedProbe,
    serial: String,
    present: bool,
}

impl SimulatedProbeConnector {
    pub fn new(probe: SimulatedProbe) -> Self {
        SimulatedProbeConnector {
            probe,
            serial: "FBX-00423917".to_string(),
            present: true,
        }
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = serial.into();
        self
    }

    /// Pretend the device is unplugged.
    pub fn absent(mut self) -> Self {
        self.present = false;
        self
    }
}

impl ProbeConnector for SimulatedProbeConnector {
    fn open(&mut self, vendor_id: u16, product_id: u16) -> Result<OpenedProbe, BoxError> {
        if !self.present {
            return Err(Box::new(HwError::ProbeNotFound {
                vendor_id,
                product_id,
            }));
        }
        tracing::debug!(serial = %self.serial, "simulated probe opened");
        Ok(OpenedProbe {
            link: Arc::new(SimulatedProbeLink::new(self.probe.clone())),
            serial: self.serial.clone(),
        })
    }
}

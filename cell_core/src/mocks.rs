//! Test and helper mocks for cell_core.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cell_traits::{
    BoxError, Clock, Co2Sensor, OpenedProbe, ProbeConnector, ProbeLink, Quantity, ReadError,
    Sample, Sensor,
};
use crossbeam_channel as xch;

fn mock_fault(msg: &str) -> BoxError {
    Box::new(std::io::Error::other(msg.to_string()))
}

/// One scripted read outcome.
#[derive(Debug, Clone)]
pub enum Step {
    Values(Vec<Sample>),
    NoNewData,
    Fault(&'static str),
}

/// Sensor that replays a script, then repeats its `steady` step forever.
pub struct ScriptedSensor {
    name: &'static str,
    script: VecDeque<Step>,
    steady: Step,
    fail_init: Option<&'static str>,
    init_gate: Option<xch::Receiver<()>>,
    reads: Arc<Mutex<u32>>,
}

impl ScriptedSensor {
    pub fn new(name: &'static str, steady: Vec<Sample>) -> Self {
        Self {
            name,
            script: VecDeque::new(),
            steady: Step::Values(steady),
            fail_init: None,
            init_gate: None,
            reads: Arc::new(Mutex::new(0)),
        }
    }

    /// Constant single-quantity sensor.
    pub fn constant(name: &'static str, q: Quantity, value: f64) -> Self {
        Self::new(name, vec![Sample::new(q, value)])
    }

    pub fn then(mut self, step: Step) -> Self {
        self.script.push_back(step);
        self
    }

    /// Every read after the script runs out fails.
    pub fn faulting_forever(mut self, msg: &'static str) -> Self {
        self.steady = Step::Fault(msg);
        self
    }

    pub fn failing_init(mut self, msg: &'static str) -> Self {
        self.fail_init = Some(msg);
        self
    }

    /// Every `init()` blocks until a token arrives on the returned sender.
    /// Dropping the sender lets every later `init()` through.
    pub fn gated_init(mut self) -> (Self, xch::Sender<()>) {
        let (tx, rx) = xch::unbounded();
        self.init_gate = Some(rx);
        (self, tx)
    }

    pub fn read_counter(&self) -> Arc<Mutex<u32>> {
        self.reads.clone()
    }
}

impl Sensor for ScriptedSensor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn init(&mut self) -> Result<(), BoxError> {
        if let Some(gate) = &self.init_gate {
            gate.recv().ok();
        }
        match self.fail_init {
            Some(msg) => Err(mock_fault(msg)),
            None => Ok(()),
        }
    }

    fn read(&mut self) -> Result<Vec<Sample>, ReadError> {
        if let Ok(mut n) = self.reads.lock() {
            *n += 1;
        }
        let step = self.script.pop_front().unwrap_or_else(|| self.steady.clone());
        match step {
            Step::Values(v) => Ok(v),
            Step::NoNewData => Err(ReadError::NoNewData),
            Step::Fault(msg) => Err(ReadError::Fault(mock_fault(msg))),
        }
    }
}

/// Compensation writes seen by a [`ScriptedCo2`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Write {
    Humidity(u16),
    Pressure(u16),
    Temperature(i16),
}

/// CO₂ sensor mock recording compensation writes.
pub struct ScriptedCo2 {
    inner: ScriptedSensor,
    writes: Arc<Mutex<Vec<Write>>>,
    fail_writes: bool,
}

impl ScriptedCo2 {
    pub fn new(co2: f64, temperature: f64) -> Self {
        Self {
            inner: ScriptedSensor::new(
                "co2",
                vec![
                    Sample::new(Quantity::Co2, co2),
                    Sample::new(Quantity::Temperature, temperature),
                ],
            ),
            writes: Arc::new(Mutex::new(Vec::new())),
            fail_writes: false,
        }
    }

    pub fn failing_init(mut self, msg: &'static str) -> Self {
        self.inner = self.inner.failing_init(msg);
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn writes(&self) -> Arc<Mutex<Vec<Write>>> {
        self.writes.clone()
    }

    fn record(&self, w: Write) -> Result<(), BoxError> {
        if self.fail_writes {
            return Err(mock_fault("compensation write nack"));
        }
        if let Ok(mut v) = self.writes.lock() {
            v.push(w);
        }
        Ok(())
    }
}

impl Sensor for ScriptedCo2 {
    fn name(&self) -> &'static str {
        "co2"
    }
    fn init(&mut self) -> Result<(), BoxError> {
        self.inner.init()
    }
    fn read(&mut self) -> Result<Vec<Sample>, ReadError> {
        self.inner.read()
    }
}

impl Co2Sensor for ScriptedCo2 {
    fn set_relative_humidity(&mut self, ticks: u16) -> Result<(), BoxError> {
        self.record(Write::Humidity(ticks))
    }
    fn set_pressure(&mut self, mbar: u16) -> Result<(), BoxError> {
        self.record(Write::Pressure(mbar))
    }
    fn set_temperature(&mut self, ticks: i16) -> Result<(), BoxError> {
        self.record(Write::Temperature(ticks))
    }
}

/// How a [`MockProbe`] reacts to a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeMode {
    /// Answer with phase (deg), temperature (K), pressure (hPa) and status bits.
    Answer {
        phase: f64,
        temperature_k: f64,
        pressure_hpa: f64,
        status: u32,
    },
    Silent,
    /// Every send fails.
    Broken,
}

impl ProbeMode {
    /// Calibration point of the default constants: reads back the reference oxygen value.
    pub fn nominal() -> Self {
        ProbeMode::Answer {
            phase: 26.82,
            temperature_k: 293.15,
            pressure_hpa: 967.0,
            status: 0,
        }
    }
}

fn answer_frames(mode: ProbeMode, ack: u16) -> Vec<Vec<u8>> {
    let ProbeMode::Answer {
        phase,
        temperature_k,
        pressure_hpa,
        status,
    } = mode
    else {
        return Vec::new();
    };
    let mut header = vec![0u8; 64];
    header[..2].copy_from_slice(&[0xFF, 0x01]);
    header[40..42].copy_from_slice(&17u16.to_le_bytes());
    let data = |p: &[u8]| [&[0xFF, 0x03][..], p].concat();
    vec![
        header,
        data(&[0; 8]),
        data(&phase.to_le_bytes()),
        data(&[0; 8]),
        data(&temperature_k.to_le_bytes()),
        data(&pressure_hpa.to_le_bytes()),
        data(&status.to_le_bytes()),
        [&[0xFF, 0x02][..], &ack.to_le_bytes()[..]].concat(),
    ]
}

/// In-memory probe shared between the test and the links it hands out.
#[derive(Clone)]
pub struct MockProbe {
    mode: Arc<Mutex<ProbeMode>>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    serial: String,
    present: bool,
}

impl MockProbe {
    pub fn new(mode: ProbeMode) -> Self {
        Self {
            mode: Arc::new(Mutex::new(mode)),
            sent: Arc::new(Mutex::new(Vec::new())),
            serial: "FBX-00001234".to_string(),
            present: true,
        }
    }

    pub fn with_serial(mut self, serial: &str) -> Self {
        self.serial = serial.to_string();
        self
    }

    pub fn unplugged(mut self) -> Self {
        self.present = false;
        self
    }

    pub fn set_mode(&self, mode: ProbeMode) {
        if let Ok(mut m) = self.mode.lock() {
            *m = mode;
        }
    }

    /// Every frame written so far.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn connector(&self) -> Box<dyn ProbeConnector + Send> {
        Box::new(self.clone())
    }
}

impl ProbeConnector for MockProbe {
    fn open(&mut self, _vendor_id: u16, _product_id: u16) -> Result<OpenedProbe, BoxError> {
        if !self.present {
            return Err(mock_fault("no such device"));
        }
        let (tx, rx) = xch::unbounded();
        Ok(OpenedProbe {
            link: Arc::new(MockLink {
                probe: self.clone(),
                tx,
                rx,
            }),
            serial: self.serial.clone(),
        })
    }
}

struct MockLink {
    probe: MockProbe,
    tx: xch::Sender<Vec<u8>>,
    rx: xch::Receiver<Vec<u8>>,
}

impl ProbeLink for MockLink {
    fn send(&self, frame: &[u8]) -> Result<(), BoxError> {
        let mode = self
            .probe
            .mode
            .lock()
            .map(|m| *m)
            .map_err(|_| mock_fault("mode poisoned"))?;
        if mode == ProbeMode::Broken {
            return Err(mock_fault("pipe error"));
        }
        if let Ok(mut s) = self.probe.sent.lock() {
            s.push(frame.to_vec());
        }
        if let [0xFF, 0x02, lo, hi, ..] = frame {
            for f in answer_frames(mode, u16::from_le_bytes([*lo, *hi])) {
                let _ = self.tx.send(f);
            }
        }
        Ok(())
    }

    fn receive(&self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>, BoxError> {
        match self.rx.recv_timeout(timeout) {
            Ok(f) => {
                let n = f.len().min(buf.len());
                buf[..n].copy_from_slice(&f[..n]);
                Ok(Some(n))
            }
            Err(xch::RecvTimeoutError::Timeout) => Ok(None),
            Err(xch::RecvTimeoutError::Disconnected) => Err(mock_fault("link closed")),
        }
    }
}

/// Clock whose `sleep` blocks until the test calls [`GatedClock::release`].
///
/// Lets a test hold the probe timeout watcher until after an answer arrived.
#[derive(Clone)]
pub struct GatedClock {
    tx: xch::Sender<()>,
    rx: xch::Receiver<()>,
    sleepers: Arc<Mutex<u32>>,
}

impl Default for GatedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl GatedClock {
    pub fn new() -> Self {
        let (tx, rx) = xch::unbounded();
        Self {
            tx,
            rx,
            sleepers: Arc::new(Mutex::new(0)),
        }
    }

    /// Wake one sleeper.
    pub fn release(&self) {
        let _ = self.tx.send(());
    }

    /// Number of threads currently parked in `sleep`.
    pub fn sleepers(&self) -> u32 {
        self.sleepers.lock().map(|n| *n).unwrap_or(0)
    }
}

impl Clock for GatedClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, _d: Duration) {
        if let Ok(mut n) = self.sleepers.lock() {
            *n += 1;
        }
        let _ = self.rx.recv();
        if let Ok(mut n) = self.sleepers.lock() {
            *n -= 1;
        }
    }
}

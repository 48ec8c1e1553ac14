//! Measurement orchestration.
//!
//! `MeasureModule` owns one rolling window per quantity, the calibration
//! constants, the error log and the oxygen probe driver, and runs one polling
//! task per sensor plus the CO₂ compensation task. All tasks share a single
//! fault domain: the first fatal error from any of them sets `stopped`, and
//! every task idles until the next `reset()`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread::JoinHandle;

use cell_traits::{Co2Sensor, Quantity, ReadError, Sample, Sensor};

use crate::calibration::{CalibrationConfig, pressure_at_sea_level};
use crate::config::SamplingCfg;
use crate::error::CellError;
use crate::hw_error::map_hw_error;
use crate::oxygen::{OxygenCalculation, OxygenInput};
use crate::poller::Poller;
use crate::probe::ProbeDriver;
use crate::status::{DeviceState, NotReady};
use crate::types::{ErrorRecord, Snapshot};
use crate::util::{humidity_ticks, pressure_mbar, temperature_ticks};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

/// State shared by the module handle and its tasks.
pub(crate) struct Engine {
    sampling: SamplingCfg,
    windows: Vec<Mutex<crate::window::SampleWindow>>,
    errors: Mutex<VecDeque<ErrorRecord>>,
    stopped: AtomicBool,
    initialising: AtomicBool,
    started: AtomicBool,
    config: RwLock<CalibrationConfig>,
    pub(crate) co2: Mutex<Box<dyn Co2Sensor + Send>>,
    pub(crate) sensors: Vec<Mutex<Box<dyn Sensor + Send>>>,
    pub(crate) probe: ProbeDriver,
    reset_lock: Mutex<()>,
    /// Bumped by every reset; an initialisation only publishes its outcome
    /// while it is still the latest one.
    generation: AtomicU64,
    flags_lock: Mutex<()>,
}

impl Engine {
    pub(crate) fn new(
        sampling: SamplingCfg,
        calibration: CalibrationConfig,
        co2: Box<dyn Co2Sensor + Send>,
        sensors: Vec<Box<dyn Sensor + Send>>,
        probe: ProbeDriver,
    ) -> Self {
        let windows = Quantity::ALL
            .iter()
            .map(|q| {
                Mutex::new(crate::window::SampleWindow::new(
                    sampling.n_sample,
                    sampling.replicas(*q),
                ))
            })
            .collect();
        probe.set_enable_temp_fibox(calibration.enable_temp_fibox);
        Self {
            sampling,
            windows,
            errors: Mutex::new(VecDeque::new()),
            stopped: AtomicBool::new(true),
            initialising: AtomicBool::new(false),
            started: AtomicBool::new(false),
            config: RwLock::new(calibration),
            co2: Mutex::new(co2),
            sensors: sensors.into_iter().map(Mutex::new).collect(),
            probe,
            reset_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            flags_lock: Mutex::new(()),
        }
    }

    fn window(&self, q: Quantity) -> MutexGuard<'_, crate::window::SampleWindow> {
        lock(&self.windows[q.index()])
    }

    fn average(&self, q: Quantity) -> Result<f64, CellError> {
        self.window(q).average()
    }

    fn push(&self, sample: Sample) {
        let mut window = self.window(sample.quantity);
        // a reset clears windows after raising `stopped`; late samples stay out
        if !self.running() {
            return;
        }
        tracing::trace!(quantity = %sample.quantity, value = sample.value, "sample");
        window.add(sample.value);
    }

    fn calibration(&self) -> CalibrationConfig {
        self.config
            .read()
            .map(|c| c.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    pub(crate) fn running(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst) && !self.initialising.load(Ordering::SeqCst)
    }

    fn record_error(&self, message: String) {
        tracing::error!(%message, "measurement error");
        lock(&self.errors).push_front(ErrorRecord::now(message));
    }

    /// Log a fatal error and halt every task.
    fn fault(&self, message: String) {
        self.record_error(message);
        if !self.stopped.swap(true, Ordering::SeqCst) {
            tracing::warn!("measurement halted, reset required");
        }
    }

    /// Halt every task and drop all buffered data. Returns the generation the
    /// matching [`Engine::finish_reset`] must carry.
    pub(crate) fn begin_reset(&self) -> u64 {
        let generation = {
            let _flags = lock(&self.flags_lock);
            self.started.store(true, Ordering::SeqCst);
            self.stopped.store(true, Ordering::SeqCst);
            self.initialising.store(true, Ordering::SeqCst);
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        for w in &self.windows {
            lock(w).clear();
        }
        lock(&self.errors).clear();
        tracing::info!(generation, "measurement reset: initialising sensors");
        generation
    }

    /// Bring the sensors and the probe back up. A reset begun meanwhile
    /// supersedes this one and owns the final state.
    pub(crate) fn finish_reset(&self, generation: u64) {
        let _serial = lock(&self.reset_lock);
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "reset superseded before init");
            return;
        }

        let outcome = self.init_all();

        let _flags = lock(&self.flags_lock);
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "reset superseded during init");
            return;
        }
        match outcome {
            Err(message) => {
                self.record_error(message);
                self.initialising.store(false, Ordering::SeqCst);
            }
            Ok(()) => {
                self.probe
                    .set_enable_temp_fibox(self.calibration().enable_temp_fibox);
                self.stopped.store(false, Ordering::SeqCst);
                self.initialising.store(false, Ordering::SeqCst);
                tracing::info!("measurement running");
            }
        }
    }

    /// Fixed order: CO₂ sensor, the other sensors as registered, then the probe.
    fn init_all(&self) -> Result<(), String> {
        fn init_one<S: Sensor + ?Sized>(sensor: &mut S) -> Result<(), String> {
            let name = sensor.name();
            sensor
                .init()
                .map_err(|e| format!("cannot initialise {name} sensor: {e}"))?;
            sensor
                .self_test()
                .map_err(|e| format!("{name} sensor self-test failed: {e}"))?;
            tracing::debug!(sensor = name, "sensor ready");
            Ok(())
        }

        {
            let mut co2 = lock(&self.co2);
            co2.close();
            init_one(&mut **co2)?;
        }
        for s in &self.sensors {
            let mut s = lock(s);
            s.close();
            init_one(&mut **s)?;
        }
        self.probe
            .connect()
            .map_err(|e| format!("cannot initialise oxygen probe: {e}"))
    }

    fn handle_read(&self, name: &'static str, result: Result<Vec<Sample>, ReadError>) {
        match result {
            Ok(samples) => samples.into_iter().for_each(|s| self.push(s)),
            Err(ReadError::NoNewData) => tracing::trace!(sensor = name, "no new data"),
            Err(ReadError::Fault(e)) => match map_hw_error(name, &*e) {
                CellError::NoNewData => tracing::trace!(sensor = name, "no new data"),
                err => self.fault(format!("{name} sensor read failed: {err}")),
            },
        }
    }

    pub(crate) fn poll_co2(&self) {
        if !self.running() {
            return;
        }
        let result = lock(&self.co2).read();
        self.handle_read("co2", result);
    }

    pub(crate) fn poll_sensor(&self, index: usize) {
        if !self.running() {
            return;
        }
        let Some(slot) = self.sensors.get(index) else {
            return;
        };
        let mut sensor = lock(slot);
        let name = sensor.name();
        let result = sensor.read();
        drop(sensor);
        self.handle_read(name, result);
    }

    pub(crate) fn poll_oxygen(&self) {
        if !self.running() {
            return;
        }
        let answer = match self.probe.get_measure() {
            Ok(a) => a,
            Err(e) => return self.fault(format!("oxygen probe measurement failed: {e}")),
        };
        let input = OxygenInput {
            phase: answer.phase,
            temperature_c: self
                .average(Quantity::Temperature)
                .unwrap_or(answer.temperature_c),
            pressure_pa: self.average(Quantity::Pressure).unwrap_or(answer.pressure_pa),
        };
        let cfg = self.calibration();
        match OxygenCalculation::new(&cfg).compute(input) {
            Ok(o2) => {
                self.push(Sample::new(Quantity::O2, o2));
                self.push(Sample::new(Quantity::Pressure, answer.pressure_pa));
            }
            Err(e) => self.fault(format!("oxygen calculation failed: {e}")),
        }
    }

    /// Push averaged humidity, sea-level pressure and temperature into the CO₂ sensor.
    pub(crate) fn compensate(&self) {
        if !self.running() {
            return;
        }
        let t = self.average(Quantity::Temperature).ok();
        let h = self.average(Quantity::Humidity).ok();
        let p = self.average(Quantity::Pressure).ok();
        let (Some(t), Some(h), Some(p)) = (t, h, p) else {
            tracing::debug!("co2 compensation skipped, series not ready");
            return;
        };
        let p_sea = pressure_at_sea_level(t, p, self.calibration().altitude);

        let mut co2 = lock(&self.co2);
        let written = co2
            .set_relative_humidity(humidity_ticks(h))
            .map_err(|e| ("humidity", e))
            .and_then(|()| co2.set_pressure(pressure_mbar(p_sea)).map_err(|e| ("pressure", e)))
            .and_then(|()| {
                co2.set_temperature(temperature_ticks(t))
                    .map_err(|e| ("temperature", e))
            });
        drop(co2);
        if let Err((what, e)) = written {
            return self.fault(format!("co2 {what} compensation failed: {e}"));
        }
        tracing::debug!(t, h, p_sea, "co2 compensation applied");
    }

    pub(crate) fn state(&self) -> DeviceState {
        if !self.started.load(Ordering::SeqCst) {
            DeviceState::Uninitialized
        } else if self.initialising.load(Ordering::SeqCst) {
            DeviceState::Initializing
        } else if self.stopped.load(Ordering::SeqCst) {
            DeviceState::Stopped
        } else {
            DeviceState::Running
        }
    }

    pub(crate) fn get(&self) -> Result<Snapshot, NotReady> {
        match self.state() {
            DeviceState::Running => {}
            DeviceState::Initializing => return Err(NotReady::Initializing),
            DeviceState::Uninitialized | DeviceState::Stopped => return Err(NotReady::Halted),
        }

        let mut snap = Snapshot::default();
        for q in Quantity::ALL {
            let v = match self.average(q) {
                Ok(v) => Some(v),
                Err(e) => {
                    self.record_error(format!("{e} (series: {q})"));
                    None
                }
            };
            snap.set(q, v);
        }

        if let Some(p) = snap.get(Quantity::Pressure) {
            let corrected = match snap.get(Quantity::Temperature) {
                Some(t) => Some(pressure_at_sea_level(t, p, self.calibration().altitude)),
                None => {
                    self.record_error(
                        "pressure cannot be corrected to sea level without a temperature average"
                            .to_string(),
                    );
                    None
                }
            };
            snap.set(Quantity::Pressure, corrected);
        }
        Ok(snap)
    }

    pub(crate) fn set_config(&self, cfg: CalibrationConfig) {
        self.probe.set_enable_temp_fibox(cfg.enable_temp_fibox);
        match self.config.write() {
            Ok(mut c) => *c = cfg,
            Err(p) => *p.into_inner() = cfg,
        }
        self.window(Quantity::Co2).clear();
        self.window(Quantity::O2).clear();
        tracing::info!("calibration replaced, CO2 and O2 series cleared");
    }
}

/// Handle to a running measurement engine. Dropping it stops and joins every task.
pub struct MeasureModule {
    // declared before `engine` so tasks are joined first
    pollers: Vec<Poller>,
    resets: Mutex<Vec<JoinHandle<()>>>,
    engine: Arc<Engine>,
}

impl MeasureModule {
    pub(crate) fn start(engine: Engine) -> std::io::Result<Self> {
        let engine = Arc::new(engine);
        let period = engine.sampling.sensor_period;
        let mut pollers = Vec::new();

        let e = engine.clone();
        pollers.push(Poller::spawn("co2", period, move || e.poll_co2())?);
        for i in 0..engine.sensors.len() {
            let e = engine.clone();
            let name = lock(&engine.sensors[i]).name();
            pollers.push(Poller::spawn(name, period, move || e.poll_sensor(i))?);
        }
        let e = engine.clone();
        pollers.push(Poller::spawn("oxygen", period, move || e.poll_oxygen())?);
        let e = engine.clone();
        pollers.push(Poller::spawn(
            "compensation",
            engine.sampling.calibration_period,
            move || e.compensate(),
        )?);

        tracing::debug!(tasks = pollers.len(), "measurement tasks started");
        Ok(Self {
            pollers,
            resets: Mutex::new(Vec::new()),
            engine,
        })
    }

    /// Start a reset and return immediately. The module reports
    /// `Initializing` with empty series and an empty error log as soon as
    /// this returns; sensor initialisation continues in the background.
    pub fn reset(&self) {
        let generation = self.engine.begin_reset();
        let engine = self.engine.clone();
        let spawned = std::thread::Builder::new()
            .name("measure-reset".into())
            .spawn(move || engine.finish_reset(generation));
        match spawned {
            Ok(handle) => {
                let mut resets = lock(&self.resets);
                resets.retain(|h| !h.is_finished());
                resets.push(handle);
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot spawn reset thread, resetting inline");
                self.engine.finish_reset(generation);
            }
        }
    }

    /// Reset on the calling thread.
    pub fn reset_and_wait(&self) -> DeviceState {
        let generation = self.engine.begin_reset();
        self.engine.finish_reset(generation);
        self.engine.state()
    }

    pub fn get(&self) -> Result<Snapshot, NotReady> {
        self.engine.get()
    }

    pub fn set_config(&self, cfg: CalibrationConfig) {
        self.engine.set_config(cfg);
    }

    pub fn config(&self) -> CalibrationConfig {
        self.engine.calibration()
    }

    /// Error log, newest first.
    pub fn get_errors(&self) -> Vec<ErrorRecord> {
        lock(&self.engine.errors).iter().cloned().collect()
    }

    pub fn state(&self) -> DeviceState {
        self.engine.state()
    }

    /// Samples currently held for `q`.
    pub fn window_len(&self, q: Quantity) -> usize {
        self.engine.window(q).len()
    }

    pub fn probe(&self) -> &ProbeDriver {
        &self.engine.probe
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.pollers.iter().map(Poller::name).collect()
    }
}

impl Drop for MeasureModule {
    fn drop(&mut self) {
        self.pollers.clear();
        for h in lock(&self.resets).drain(..) {
            if h.join().is_err() {
                tracing::warn!("reset thread panicked");
            }
        }
    }
}

//! Oxygen probe driver.
//!
//! Owns the link returned by a [`ProbeConnector`], a dispatch thread that
//! listens on the IN side continuously, and the single-request protocol:
//! header + footer out, then wait for either a decoded answer or the timeout
//! watcher. A timeout, a transfer failure or a probe-reported fault latches
//! the driver into critical error until the next `connect()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use cell_traits::{Clock, ProbeConnector, ProbeLink};
use crossbeam_channel as xch;

use super::errors::{self, TEMPERATURE_SENSOR_ABSENT};
use super::reader::{PacketReader, ProbeAnswer};
use super::watch::TimeoutWatch;
use super::writer::PacketWriter;
use crate::config::ProbeCfg;
use crate::error::CellError;

const TRANSFER_LEN: usize = 64;

#[derive(Debug)]
enum ProbeEvent {
    Answer(ProbeAnswer),
    TimedOut,
    LinkLost(String),
}

/// State shared with the dispatch and watcher threads.
struct Shared {
    reader: Mutex<PacketReader>,
    watch: TimeoutWatch,
    critical: AtomicBool,
    enable_temp: AtomicBool,
    tx: xch::Sender<ProbeEvent>,
}

impl Shared {
    fn deliver(&self, event: ProbeEvent) {
        // at most one event per armed request, so the slot is free
        if self.tx.try_send(event).is_err() {
            tracing::warn!("probe event dropped, previous event not consumed");
        }
    }
}

/// One open connection: the link plus its dispatch thread.
struct Session {
    link: Arc<dyn ProbeLink>,
    writer: PacketWriter,
    shutdown: Arc<AtomicBool>,
    dispatch: Option<JoinHandle<()>>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.dispatch.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("probe dispatch thread joined"),
                Err(e) => tracing::warn!(?e, "probe dispatch thread panicked"),
            }
        }
    }
}

pub struct ProbeDriver {
    connector: Mutex<Box<dyn ProbeConnector + Send>>,
    cfg: ProbeCfg,
    session: Mutex<Option<Session>>,
    gate: Mutex<()>,
    shared: Arc<Shared>,
    events: xch::Receiver<ProbeEvent>,
    clock: Arc<dyn Clock>,
}

fn poisoned(what: &str) -> CellError {
    CellError::BusFault {
        sensor: "probe",
        message: format!("{what} lock poisoned"),
    }
}

impl ProbeDriver {
    pub fn new(
        connector: Box<dyn ProbeConnector + Send>,
        cfg: ProbeCfg,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (tx, events) = xch::bounded(1);
        let shared = Arc::new(Shared {
            reader: Mutex::new(PacketReader::new()),
            watch: TimeoutWatch::new(),
            critical: AtomicBool::new(false),
            enable_temp: AtomicBool::new(false),
            tx,
        });
        Self {
            connector: Mutex::new(connector),
            cfg,
            session: Mutex::new(None),
            gate: Mutex::new(()),
            shared,
            events,
            clock,
        }
    }

    fn session(&self) -> Result<MutexGuard<'_, Option<Session>>, CellError> {
        self.session.lock().map_err(|_| poisoned("probe session"))
    }

    /// (Re)open the probe. Drops any previous link and clears the critical latch on success.
    ///
    /// Waits for an in-flight request to finish first.
    pub fn connect(&self) -> Result<(), CellError> {
        let _gate = self.gate.lock().map_err(|_| poisoned("probe request gate"))?;
        let mut session = self.session()?;
        // joins the old dispatch thread and releases the old link
        *session = None;
        self.shared
            .reader
            .lock()
            .map_err(|_| poisoned("packet reader"))?
            .reset();
        self.shared.watch.complete();
        while self.events.try_recv().is_ok() {}

        let opened = self
            .connector
            .lock()
            .map_err(|_| poisoned("probe connector"))?
            .open(self.cfg.vendor_id, self.cfg.product_id)
            .map_err(|e| CellError::ProbeConnect(e.to_string()))?;
        let writer = PacketWriter::from_serial(&opened.serial)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let dispatch = {
            let link = opened.link.clone();
            let shared = self.shared.clone();
            let shutdown = shutdown.clone();
            let poll = self.cfg.poll;
            std::thread::Builder::new()
                .name("probe-dispatch".into())
                .spawn(move || dispatch_loop(link.as_ref(), &shared, &shutdown, poll))
                .map_err(|e| CellError::ProbeConnect(format!("spawn dispatch thread: {e}")))?
        };

        self.shared.critical.store(false, Ordering::SeqCst);
        tracing::info!(serial = %opened.serial, device_id = ?writer.device_id(), "oxygen probe connected");
        *session = Some(Session {
            link: opened.link,
            writer,
            shutdown,
            dispatch: Some(dispatch),
        });
        Ok(())
    }

    /// Request one measurement and wait for the answer or the timeout.
    pub fn get_measure(&self) -> Result<ProbeAnswer, CellError> {
        let _gate = self.gate.lock().map_err(|_| poisoned("probe request gate"))?;

        let (link, header, footer, id) = {
            let mut guard = self.session()?;
            let session = guard.as_mut().ok_or(CellError::ProbeNotConnected)?;
            if self.is_critical() {
                return Err(CellError::ProbeCritical);
            }
            let id = session.writer.request_id();
            let header = session.writer.header(id);
            let footer = session.writer.footer(id);
            (session.link.clone(), header, footer, id)
        };

        // armed before sending so an immediate answer cannot slip past
        let captured = self.shared.watch.arm();
        if let Err(e) = self
            .send(link.as_ref(), &header)
            .and_then(|()| self.send(link.as_ref(), &footer))
        {
            self.shared.watch.complete();
            return Err(e);
        }
        tracing::trace!(id, "probe request sent");
        self.spawn_watcher(captured);

        let event = self.events.recv();
        self.shared.watch.complete();

        match event {
            Ok(ProbeEvent::Answer(answer)) => self.check_answer(answer),
            Ok(ProbeEvent::TimedOut) => {
                self.latch("no answer before timeout");
                Err(CellError::ProbeTimeout(
                    u64::try_from(self.cfg.response_timeout.as_millis()).unwrap_or(u64::MAX),
                ))
            }
            Ok(ProbeEvent::LinkLost(msg)) => Err(CellError::BusFault {
                sensor: "probe",
                message: msg,
            }),
            Err(_) => Err(CellError::ProbeNotConnected),
        }
    }

    fn check_answer(&self, answer: ProbeAnswer) -> Result<ProbeAnswer, CellError> {
        let enable_temp = self.shared.enable_temp.load(Ordering::Relaxed);
        let fatal: Vec<_> = answer
            .errors
            .iter()
            .copied()
            .filter(|f| f.code != TEMPERATURE_SENSOR_ABSENT || enable_temp)
            .collect();
        if fatal.is_empty() {
            return Ok(answer);
        }
        let message = errors::join(&fatal);
        self.latch(&message);
        Err(CellError::ProbeSensorFault(message))
    }

    fn send(&self, link: &dyn ProbeLink, frame: &[u8]) -> Result<(), CellError> {
        link.send(frame).map_err(|e| {
            self.latch("transfer failed");
            CellError::BusFault {
                sensor: "probe",
                message: e.to_string(),
            }
        })
    }

    fn spawn_watcher(&self, captured: u64) {
        let shared = self.shared.clone();
        let clock = self.clock.clone();
        let timeout = self.cfg.response_timeout;
        let spawned = std::thread::Builder::new()
            .name("probe-timeout".into())
            .spawn(move || {
                clock.sleep(timeout);
                if shared.watch.fire(captured) {
                    shared.deliver(ProbeEvent::TimedOut);
                }
            });
        if let Err(e) = spawned {
            // without a watcher a silent probe would block forever
            tracing::error!(error = %e, "cannot spawn probe timeout watcher");
            if self.shared.watch.fire(captured) {
                self.shared.deliver(ProbeEvent::TimedOut);
            }
        }
    }

    fn latch(&self, reason: &str) {
        if !self.shared.critical.swap(true, Ordering::SeqCst) {
            tracing::error!(reason, "oxygen probe latched in critical error");
        }
    }

    /// Whether the "temperature sensor absent" status bit is treated as fatal.
    pub fn set_enable_temp_fibox(&self, enabled: bool) {
        self.shared.enable_temp.store(enabled, Ordering::Relaxed);
    }

    pub fn enable_temp_fibox(&self) -> bool {
        self.shared.enable_temp.load(Ordering::Relaxed)
    }

    pub fn is_critical(&self) -> bool {
        self.shared.critical.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.session().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Id the next request will carry.
    pub fn next_request_id(&self) -> Option<u16> {
        self.session()
            .ok()?
            .as_ref()
            .map(|s| s.writer.request_id())
    }
}

fn dispatch_loop(link: &dyn ProbeLink, shared: &Shared, shutdown: &AtomicBool, poll: Duration) {
    let mut buf = [0u8; TRANSFER_LEN];
    while !shutdown.load(Ordering::Relaxed) && !shared.critical.load(Ordering::SeqCst) {
        match link.receive(&mut buf, poll) {
            Ok(Some(n)) => {
                let answer = match shared.reader.lock() {
                    Ok(mut r) => r.process(&buf[..n]),
                    Err(_) => break,
                };
                if let Some(answer) = answer {
                    if shared.watch.resolve() {
                        shared.deliver(ProbeEvent::Answer(answer));
                    } else {
                        tracing::debug!("unsolicited probe answer dropped");
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "probe link failed");
                shared.critical.store(true, Ordering::SeqCst);
                if shared.watch.resolve() {
                    shared.deliver(ProbeEvent::LinkLost(e.to_string()));
                }
                break;
            }
        }
    }
    tracing::trace!("probe dispatch thread exiting");
}

//! TCP control socket: one listener, one thread per client.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cell_core::MeasureModule;
use eyre::WrapErr;

use crate::control;

const ACCEPT_POLL: Duration = Duration::from_millis(100);
const READ_POLL: Duration = Duration::from_millis(250);

fn serve_client(
    module: &MeasureModule,
    stream: TcpStream,
    shutdown: &AtomicBool,
) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_POLL))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    while !shutdown.load(Ordering::Relaxed) {
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let reply = control::handle_line(module, &line);
                line.clear();
                if let Some(reply) = reply {
                    writer.write_all(reply.line.as_bytes())?;
                    writer.write_all(b"\n")?;
                    writer.flush()?;
                    if reply.close {
                        break;
                    }
                }
            }
            // partial lines stay buffered in `line`
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Bound listener, ready to accept.
pub struct Server {
    listener: TcpListener,
}

impl Server {
    pub fn bind(addr: &str) -> eyre::Result<Self> {
        let listener =
            TcpListener::bind(addr).wrap_err_with(|| format!("cannot listen on {addr}"))?;
        listener
            .set_nonblocking(true)
            .wrap_err("cannot make listener non-blocking")?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> eyre::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients until `shutdown` is set, then wait for their threads.
    pub fn run(self, module: Arc<MeasureModule>, shutdown: Arc<AtomicBool>) -> eyre::Result<()> {
        let mut clients = Vec::new();
        while !shutdown.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    tracing::info!(%peer, "control client connected");
                    let module = module.clone();
                    let shutdown = shutdown.clone();
                    let handle = std::thread::Builder::new()
                        .name(format!("client-{peer}"))
                        .spawn(move || {
                            if let Err(e) = serve_client(&module, stream, &shutdown) {
                                tracing::warn!(%peer, error = %e, "control client failed");
                            }
                            tracing::info!(%peer, "control client disconnected");
                        })
                        .wrap_err("cannot spawn client thread")?;
                    clients.retain(|h: &std::thread::JoinHandle<()>| !h.is_finished());
                    clients.push(handle);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(ACCEPT_POLL);
                }
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            }
        }
        tracing::info!("control socket closing");
        for h in clients {
            if h.join().is_err() {
                tracing::warn!("client thread panicked");
            }
        }
        Ok(())
    }
}

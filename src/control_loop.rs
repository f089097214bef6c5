use std::io::Error as IoError;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;

use tracing::{debug, error, info, warn};
use watch::WatchSender;

use crate::error::SurfaceError;
use crate::governor::{Governor, GovernorState, TemperatureSample};
use crate::surface::{ControlSurface, Register};

/// Handle on the thread running one governor.
///
/// Dropping the handle without calling [`ControlLoop::stop`] also ends the
/// loop at its next wake, but does not wait for it.
pub struct ControlLoop {
    name: &'static str,
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl ControlLoop {
    /// Starts `governor` on its own thread. Every applied state is published on `status`.
    pub fn spawn(
        governor: Governor,
        surface: Arc<dyn ControlSurface>,
        status: WatchSender<GovernorState>,
    ) -> Result<Self, IoError> {
        let name = governor.name();
        let (stop, stop_rx) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name(format!("governor-{name}"))
            .spawn(move || run(governor, surface, stop_rx, status))?;
        Ok(Self { name, stop, handle })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Interrupts the sleep and blocks until the thread has exited.
    ///
    /// A tick already in progress finishes its writes first.
    pub fn stop(self) {
        info!(governor = self.name, "stopping governor");
        // the receiver is gone only if the thread already exited
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            error!(governor = self.name, "governor thread panicked");
        }
    }
}

fn run(
    mut governor: Governor,
    surface: Arc<dyn ControlSurface>,
    stop: Receiver<()>,
    status: WatchSender<GovernorState>,
) {
    info!(
        governor = governor.name(),
        poll = ?governor.poll_period(),
        "starting governor"
    );
    if let Err(e) = surface.set_bias(governor.bias()) {
        warn!(governor = governor.name(), error = %e, "cannot set performance bias");
    }

    loop {
        match stop.recv_timeout(governor.poll_period()) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        match tick(&governor, surface.as_ref()) {
            Ok(next) => {
                governor.commit(next.clone());
                status.send(next);
            }
            Err(e) => {
                warn!(governor = governor.name(), error = %e, "tick skipped");
            }
        }
    }

    info!(governor = governor.name(), "governor stopped");
}

/// One read, decide, clamp, write cycle.
///
/// Returns the state that reached the surface; the caller commits it. On
/// error nothing is committed and the governor keeps its previous state.
pub fn tick(governor: &Governor, surface: &dyn ControlSurface) -> Result<GovernorState, SurfaceError> {
    let temperature = if governor.reads_temperature() {
        Some(TemperatureSample::read(surface)?)
    } else {
        None
    };
    let next = governor.step(temperature.as_ref());
    apply(surface, &next)?;

    debug!(
        governor = next.name,
        min_perf_pct = next.current_min_pct,
        max_perf_pct = next.current_max_pct,
        no_turbo = next.no_turbo,
        temperature = temperature.map(|t| t.current),
        "applied"
    );
    Ok(next)
}

/// Writes min, max and no_turbo so the surface never sees min above max.
fn apply(surface: &dyn ControlSurface, state: &GovernorState) -> Result<(), SurfaceError> {
    let surface_max = surface.read(Register::MaxPerfPct)?;
    if state.current_min_pct > surface_max {
        surface.write(Register::MaxPerfPct, state.current_max_pct)?;
        surface.write(Register::MinPerfPct, state.current_min_pct)?;
    } else {
        surface.write(Register::MinPerfPct, state.current_min_pct)?;
        surface.write(Register::MaxPerfPct, state.current_max_pct)?;
    }
    surface.write(Register::NoTurbo, i64::from(state.no_turbo))
}

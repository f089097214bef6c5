use std::sync::{Arc, Mutex};

use tracing::{error, info};
use watch::WatchReceiver;

use crate::control_loop::ControlLoop;
use crate::error::ModeError;
use crate::governor::{Governor, GovernorState, Mode, PollPeriods, Strategy};
use crate::profile::HardwareProfile;
use crate::surface::ControlSurface;

enum SupervisorState {
    Uninitialized,
    Running {
        mode: Mode,
        control: ControlLoop,
        status: WatchReceiver<GovernorState>,
    },
}

/// Successful outcome of a mode request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    AlreadySet(Mode),
    Switched(Mode),
}

/// Owns the single running governor and serializes every switch.
///
/// All transitions happen under one mutex, and the old loop is joined before
/// the new one is spawned, so at most one thread ever writes the surface.
pub struct Supervisor {
    profile: HardwareProfile,
    periods: PollPeriods,
    surface: Arc<dyn ControlSurface>,
    state: Mutex<SupervisorState>,
}

impl Supervisor {
    pub fn new(
        profile: HardwareProfile,
        surface: Arc<dyn ControlSurface>,
        periods: PollPeriods,
    ) -> Self {
        Self {
            profile,
            periods,
            surface,
            state: Mutex::new(SupervisorState::Uninitialized),
        }
    }

    /// Builds a supervisor already running the stock governor.
    pub fn start(
        profile: HardwareProfile,
        surface: Arc<dyn ControlSurface>,
        periods: PollPeriods,
    ) -> Result<Self, ModeError> {
        let supervisor = Self::new(profile, surface, periods);
        let running = supervisor.launch(Strategy::Stock)?;
        *supervisor
            .state
            .lock()
            .map_err(|_| ModeError::Conflict(Mode::Stock))? = running;
        Ok(supervisor)
    }

    pub fn set_mode(&self, target: Mode) -> Result<ModeChange, ModeError> {
        let mut state = self.state.lock().map_err(|_| ModeError::Conflict(target))?;

        if let SupervisorState::Running { mode, .. } = &*state {
            if *mode == target {
                return Ok(ModeChange::AlreadySet(target));
            }
        }
        let strategy = target.strategy().ok_or(ModeError::Unsupported(target))?;

        if let SupervisorState::Running { mode, control, .. } =
            std::mem::replace(&mut *state, SupervisorState::Uninitialized)
        {
            info!(from = %mode, to = %target, "switching governor");
            control.stop();
        }
        *state = self.launch(strategy)?;
        Ok(ModeChange::Switched(target))
    }

    pub fn current(&self) -> Option<Mode> {
        let state = self.state.lock().ok()?;
        match &*state {
            SupervisorState::Running { mode, .. } => Some(*mode),
            SupervisorState::Uninitialized => None,
        }
    }

    /// Latest state published by the running governor.
    pub fn status(&self) -> Option<GovernorState> {
        let mut state = self.state.lock().ok()?;
        match &mut *state {
            SupervisorState::Running { status, .. } => Some(status.get()),
            SupervisorState::Uninitialized => None,
        }
    }

    /// Stops the running governor, if any. Later `set_mode` calls start a new one.
    pub fn shutdown(&self) {
        let Ok(mut state) = self.state.lock() else {
            error!("supervisor state poisoned, governor left running");
            return;
        };
        if let SupervisorState::Running { control, .. } =
            std::mem::replace(&mut *state, SupervisorState::Uninitialized)
        {
            control.stop();
        }
    }

    fn launch(&self, strategy: Strategy) -> Result<SupervisorState, ModeError> {
        let mode = strategy.mode();
        let governor = Governor::new(strategy, &self.profile, &self.periods);
        let (send, recv) = watch::channel(governor.state().clone());
        let control = ControlLoop::spawn(governor, self.surface.clone(), send).map_err(|source| {
            error!(governor = %mode, error = %source, "cannot spawn governor thread");
            ModeError::Spawn { mode, source }
        })?;
        Ok(SupervisorState::Running {
            mode,
            control,
            status: recv,
        })
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::*;
use crate::error::{ModeError, SurfaceError};
use crate::profile::HardwareProfile;
use crate::surface::{ControlSurface, PerformanceBias, Register};

/// Identifiers accepted by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    PowersaveLocked,
    Powersave,
    Stock,
    Performance,
    PerformanceLocked,
    PerformanceOverdrive,
    PerformanceCoolmode,
}

impl Mode {
    pub const ALL: [Mode; 7] = [
        Mode::PowersaveLocked,
        Mode::Powersave,
        Mode::Stock,
        Mode::Performance,
        Mode::PerformanceLocked,
        Mode::PerformanceOverdrive,
        Mode::PerformanceCoolmode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::PowersaveLocked => "powersavelocked",
            Mode::Powersave => "powersave",
            Mode::Stock => "stock",
            Mode::Performance => "performance",
            Mode::PerformanceLocked => "performance-locked",
            Mode::PerformanceOverdrive => "performanceoverdrive",
            Mode::PerformanceCoolmode => "performancecoolmode",
        }
    }

    /// `None` for modes that are recognized but have no control law yet.
    pub fn strategy(self) -> Option<Strategy> {
        match self {
            Mode::PowersaveLocked => Some(Strategy::PowersaveLocked),
            Mode::Powersave => Some(Strategy::Powersave),
            Mode::Stock => Some(Strategy::Stock),
            Mode::Performance => Some(Strategy::Performance),
            Mode::PerformanceLocked => Some(Strategy::PerformanceLocked),
            Mode::PerformanceOverdrive | Mode::PerformanceCoolmode => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ModeError::Invalid(s.to_string()))
    }
}

/// Control-law variants that can actually drive the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    PowersaveLocked,
    Powersave,
    Stock,
    Performance,
    PerformanceLocked,
}

impl Strategy {
    pub fn mode(self) -> Mode {
        match self {
            Strategy::PowersaveLocked => Mode::PowersaveLocked,
            Strategy::Powersave => Mode::Powersave,
            Strategy::Stock => Mode::Stock,
            Strategy::Performance => Mode::Performance,
            Strategy::PerformanceLocked => Mode::PerformanceLocked,
        }
    }

    pub fn is_locked(self) -> bool {
        matches!(self, Strategy::PowersaveLocked | Strategy::PerformanceLocked)
    }
}

/// Poll periods for the fixed-value and the temperature-driven variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPeriods {
    pub locked: Duration,
    pub active: Duration,
}

impl Default for PollPeriods {
    fn default() -> Self {
        Self {
            locked: Duration::from_millis(DEFAULT_LOCKED_POLL_MS),
            active: Duration::from_millis(DEFAULT_ACTIVE_POLL_MS),
        }
    }
}

/// Package temperatures in °C
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureSample {
    pub current: f64,
    pub package_max: f64,
    pub package_critical: f64,
}

impl TemperatureSample {
    pub fn read(surface: &dyn ControlSurface) -> Result<Self, SurfaceError> {
        let celsius = |register| surface.read(register).map(|milli| milli as f64 / 1000.0);
        Ok(Self {
            current: celsius(Register::PackageTemp)?,
            package_max: celsius(Register::PackageMaxTemp)?,
            package_critical: celsius(Register::PackageCritTemp)?,
        })
    }
}

/// Outcome of the stock threshold law
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ThrottleModerate,
    ThrottleCritical,
    BoostModerate,
    BoostCritical,
    NoOp,
}

impl Action {
    /// Strict inequalities, critical checks first.
    pub fn decide(temperature: &TemperatureSample) -> Self {
        let current = temperature.current;
        if current > temperature.package_critical - CRITICAL_HEADROOM_C {
            Action::ThrottleCritical
        } else if current > temperature.package_max {
            Action::ThrottleModerate
        } else if current < temperature.package_max - BOOST_HEADROOM_C {
            Action::BoostCritical
        } else if current < temperature.package_max {
            Action::BoostModerate
        } else {
            Action::NoOp
        }
    }

    pub fn delta(self) -> i64 {
        match self {
            Action::ThrottleCritical => -BIG_STEP_PCT,
            Action::ThrottleModerate => -SMALL_STEP_PCT,
            Action::BoostCritical => BIG_STEP_PCT,
            Action::BoostModerate => SMALL_STEP_PCT,
            Action::NoOp => 0,
        }
    }
}

/// Performance percentage at which the turbo range starts.
///
/// `floor(min + (100 - turbo) / 100 * steps * (max - min) / (steps - 1))`,
/// evaluated exactly in integers. `steps` must be at least 2.
pub fn noturbo_ceiling(min: i64, max: i64, steps: i64, turbo_pct: i64) -> i64 {
    let numerator = (100 - turbo_pct) * steps * (max - min);
    let denominator = 100 * (steps - 1);
    min + numerator.div_euclid(denominator)
}

fn midpoint(low: i64, high: i64) -> i64 {
    low + (high - low).div_euclid(2)
}

/// Snapshot of what a governor applies to the hardware
#[derive(Debug, Clone, PartialEq)]
pub struct GovernorState {
    pub name: &'static str,
    pub current_min_pct: i64,
    pub current_max_pct: i64,
    pub min_pct_limit: i64,
    pub max_pct_limit: i64,
    pub no_turbo: bool,
    pub poll_period: Duration,
}

impl GovernorState {
    pub fn within_limits(&self) -> bool {
        self.min_pct_limit <= self.current_min_pct
            && self.current_min_pct <= self.current_max_pct
            && self.current_max_pct <= self.max_pct_limit
    }
}

/// One instance of a control law, with its bounds and current state
#[derive(Debug, Clone)]
pub struct Governor {
    strategy: Strategy,
    state: GovernorState,
}

impl Governor {
    pub fn new(strategy: Strategy, profile: &HardwareProfile, periods: &PollPeriods) -> Self {
        let HardwareProfile {
            min_perf_pct,
            max_perf_pct,
            num_pstates,
            turbo_pct,
        } = *profile;
        // a turbo_pct of 0 would put the ceiling past the hardware maximum
        let ceiling =
            noturbo_ceiling(min_perf_pct, max_perf_pct, num_pstates, turbo_pct).min(max_perf_pct);

        // (min limit, max limit, no_turbo, initial max)
        let (min_pct_limit, max_pct_limit, no_turbo, initial_max) = match strategy {
            Strategy::PowersaveLocked => (min_perf_pct, min_perf_pct, true, min_perf_pct),
            Strategy::Powersave => {
                let top = midpoint(min_perf_pct, ceiling);
                (min_perf_pct, top, true, top)
            }
            Strategy::Stock => (min_perf_pct, ceiling, true, min_perf_pct),
            Strategy::Performance => (min_perf_pct, max_perf_pct, false, max_perf_pct),
            Strategy::PerformanceLocked => (max_perf_pct, max_perf_pct, false, max_perf_pct),
        };
        let poll_period = if strategy.is_locked() {
            periods.locked
        } else {
            periods.active
        };

        Self {
            strategy,
            state: GovernorState {
                name: strategy.mode().as_str(),
                current_min_pct: min_pct_limit,
                current_max_pct: initial_max,
                min_pct_limit,
                max_pct_limit,
                no_turbo,
                poll_period,
            },
        }
    }

    pub fn for_mode(
        mode: Mode,
        profile: &HardwareProfile,
        periods: &PollPeriods,
    ) -> Result<Self, ModeError> {
        let strategy = mode.strategy().ok_or(ModeError::Unsupported(mode))?;
        Ok(Self::new(strategy, profile, periods))
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn name(&self) -> &'static str {
        self.state.name
    }

    pub fn limits(&self) -> (i64, i64, bool) {
        (
            self.state.min_pct_limit,
            self.state.max_pct_limit,
            self.state.no_turbo,
        )
    }

    pub fn poll_period(&self) -> Duration {
        self.state.poll_period
    }

    pub fn bias(&self) -> PerformanceBias {
        match self.strategy {
            Strategy::Performance | Strategy::PerformanceLocked => PerformanceBias::Performance,
            _ => PerformanceBias::Powersave,
        }
    }

    /// Locked variants reassert a fixed value and never look at the sensor.
    pub fn reads_temperature(&self) -> bool {
        !self.strategy.is_locked()
    }

    pub fn state(&self) -> &GovernorState {
        &self.state
    }

    /// Next state for this tick. Does not touch `self`; see [`Governor::commit`].
    pub fn step(&self, temperature: Option<&TemperatureSample>) -> GovernorState {
        let delta = match (self.strategy, temperature) {
            (Strategy::Stock, Some(t)) => Action::decide(t).delta(),
            (Strategy::Performance, Some(t)) => {
                ((t.package_max - t.current) / 2.0).floor() as i64
            }
            _ => 0,
        };

        let mut next = self.state.clone();
        next.current_min_pct = next.min_pct_limit;
        next.current_max_pct = next
            .current_max_pct
            .saturating_add(delta)
            .clamp(next.min_pct_limit, next.max_pct_limit);
        next
    }

    /// Accepts a state returned by `step` once it has reached the hardware.
    pub fn commit(&mut self, state: GovernorState) {
        debug_assert!(state.within_limits());
        self.state = state;
    }
}

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

use toml::{Table, Value};
use tracing::{info, warn};

use crate::constants::{DEFAULT_ACTIVE_POLL_MS, DEFAULT_LOCKED_POLL_MS};
use crate::error::StartupError;
use crate::governor::PollPeriods;
use crate::surface::{SysfsPaths, discover_hwmon};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/pstate-thermald/config.toml";
pub const DEFAULT_SOCKET_PATH: &str = "/run/pstate-thermald.sock";

/// Daemon settings; every key is optional
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub pstate_dir: PathBuf,
    pub scaling_governor: PathBuf,
    /// `None` means look for coretemp's hwmon directory at startup
    pub hwmon_dir: Option<PathBuf>,
    pub socket: PathBuf,
    pub poll: PollPeriods,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pstate_dir: PathBuf::from(SysfsPaths::PSTATE_DIR),
            scaling_governor: PathBuf::from(SysfsPaths::SCALING_GOVERNOR),
            hwmon_dir: None,
            socket: PathBuf::from(DEFAULT_SOCKET_PATH),
            poll: PollPeriods::default(),
        }
    }
}

fn path_value(value: &Value) -> Result<PathBuf, &'static str> {
    value
        .as_str()
        .ok_or("must be a string")
        .and_then(|s| (!s.is_empty()).then_some(s).ok_or("must not be empty"))
        .map(PathBuf::from)
}

// ms
fn period_value(value: &Value) -> Result<Duration, &'static str> {
    value
        .as_integer()
        .ok_or("must be an integer")
        .and_then(|v| {
            u64::try_from(v)
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or("must be positive")
        })
        .map(Duration::from_millis)
}

/// Validates `key` with `parse`, falling back to `default` when it is absent or invalid.
fn or_default<T>(
    key: &str,
    value: Option<&Value>,
    parse: fn(&Value) -> Result<T, &'static str>,
    default: T,
    shown: impl Display,
) -> T {
    match value.map(parse) {
        Some(Ok(v)) => v,
        Some(Err(s)) => {
            warn!("{key} {s}, replaced with the default of {shown}");
            default
        }
        None => {
            info!("{key} is missing, using the default of {shown}");
            default
        }
    }
}

impl Config {
    /// Reads `path`, or the default location when it exists, or falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, StartupError> {
        let text = match path {
            Some(path) => std::fs::read_to_string(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                std::fs::read_to_string(DEFAULT_CONFIG_PATH)?
            }
            None => {
                info!("no configuration file, using defaults");
                String::new()
            }
        };
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, StartupError> {
        let config = text.parse::<Table>()?;
        let defaults = Self::default();

        let paths = config.get("paths").and_then(|t| t.as_table());
        let pstate_dir = or_default(
            "paths.pstate",
            paths.and_then(|t| t.get("pstate")),
            path_value,
            defaults.pstate_dir,
            SysfsPaths::PSTATE_DIR,
        );
        let scaling_governor = or_default(
            "paths.scaling-governor",
            paths.and_then(|t| t.get("scaling-governor")),
            path_value,
            defaults.scaling_governor,
            SysfsPaths::SCALING_GOVERNOR,
        );
        let hwmon_dir = paths
            .and_then(|t| t.get("hwmon"))
            .map(|v| path_value(v).map_err(|s| StartupError::Config(format!("paths.hwmon {s}"))))
            .transpose()?;
        let socket = or_default(
            "paths.socket",
            paths.and_then(|t| t.get("socket")),
            path_value,
            defaults.socket,
            DEFAULT_SOCKET_PATH,
        );

        let periods = config
            .get("timing")
            .and_then(|t| t.as_table())
            .and_then(|t| t.get("poll-periods"))
            .and_then(|t| t.as_table());
        let locked = or_default(
            "timing.poll-periods.locked",
            periods.and_then(|t| t.get("locked")),
            period_value,
            defaults.poll.locked,
            format_args!("{DEFAULT_LOCKED_POLL_MS} ms"),
        );
        let active = or_default(
            "timing.poll-periods.active",
            periods.and_then(|t| t.get("active")),
            period_value,
            defaults.poll.active,
            format_args!("{DEFAULT_ACTIVE_POLL_MS} ms"),
        );

        Ok(Self {
            pstate_dir,
            scaling_governor,
            hwmon_dir,
            socket,
            poll: PollPeriods { locked, active },
        })
    }

    /// Resolves the sysfs locations, discovering the hwmon directory if needed.
    pub fn sysfs_paths(&self) -> Result<SysfsPaths, StartupError> {
        let hwmon_dir = match &self.hwmon_dir {
            Some(dir) => dir.clone(),
            None => discover_hwmon(Path::new(SysfsPaths::CORETEMP_HWMON)).ok_or_else(|| {
                StartupError::Config(format!(
                    "no hwmon directory below {}, set paths.hwmon",
                    SysfsPaths::CORETEMP_HWMON
                ))
            })?,
        };
        Ok(SysfsPaths {
            pstate_dir: self.pstate_dir.clone(),
            scaling_governor: self.scaling_governor.clone(),
            hwmon_dir,
        })
    }
}

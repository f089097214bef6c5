use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::SurfaceError;

/// Integer registers exposed by the P-state driver and the package sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    MinPerfPct,
    MaxPerfPct,
    NumPstates,
    TurboPct,
    NoTurbo,
    /// milli-°C
    PackageTemp,
    /// milli-°C
    PackageMaxTemp,
    /// milli-°C
    PackageCritTemp,
    ScalingGovernor,
}

impl Register {
    pub fn file_name(self) -> &'static str {
        match self {
            Register::MinPerfPct => "min_perf_pct",
            Register::MaxPerfPct => "max_perf_pct",
            Register::NumPstates => "num_pstates",
            Register::TurboPct => "turbo_pct",
            Register::NoTurbo => "no_turbo",
            Register::PackageTemp => "temp1_input",
            Register::PackageMaxTemp => "temp1_max",
            Register::PackageCritTemp => "temp1_crit",
            Register::ScalingGovernor => "scaling_governor",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Token accepted by the scaling-governor selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceBias {
    Performance,
    Powersave,
}

impl PerformanceBias {
    pub fn as_str(self) -> &'static str {
        match self {
            PerformanceBias::Performance => "performance",
            PerformanceBias::Powersave => "powersave",
        }
    }
}

impl fmt::Display for PerformanceBias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read/write access to the hardware scaling parameters.
///
/// Only the active control loop writes through this trait; everything else
/// reads at most.
pub trait ControlSurface: Send + Sync {
    fn read(&self, register: Register) -> Result<i64, SurfaceError>;

    fn write(&self, register: Register, value: i64) -> Result<(), SurfaceError>;

    fn set_bias(&self, bias: PerformanceBias) -> Result<(), SurfaceError>;
}

/// Locations of the sysfs files backing the control surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsPaths {
    pub pstate_dir: PathBuf,
    pub scaling_governor: PathBuf,
    pub hwmon_dir: PathBuf,
}

impl SysfsPaths {
    pub const PSTATE_DIR: &'static str = "/sys/devices/system/cpu/intel_pstate";
    // cpu0 is enough, the driver applies the governor to every core
    pub const SCALING_GOVERNOR: &'static str =
        "/sys/devices/system/cpu/cpu0/cpufreq/scaling_governor";
    pub const CORETEMP_HWMON: &'static str = "/sys/devices/platform/coretemp.0/hwmon";

    pub fn path_of(&self, register: Register) -> PathBuf {
        match register {
            Register::MinPerfPct
            | Register::MaxPerfPct
            | Register::NumPstates
            | Register::TurboPct
            | Register::NoTurbo => self.pstate_dir.join(register.file_name()),
            Register::PackageTemp | Register::PackageMaxTemp | Register::PackageCritTemp => {
                self.hwmon_dir.join(register.file_name())
            }
            Register::ScalingGovernor => self.scaling_governor.clone(),
        }
    }
}

/// First `hwmon*` directory below `base`, in name order.
///
/// The hwmon index is assigned at boot, so it cannot be hardcoded.
pub fn discover_hwmon(base: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(base)
        .ok()?
        .flatten()
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("hwmon"))
        .map(|entry| entry.path())
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// Control surface backed by the intel_pstate and coretemp sysfs files
#[derive(Debug, Clone)]
pub struct SysfsSurface {
    paths: SysfsPaths,
}

impl SysfsSurface {
    pub fn new(paths: SysfsPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &SysfsPaths {
        &self.paths
    }

    fn write_token(&self, register: Register, token: &str) -> Result<(), SurfaceError> {
        let path = self.paths.path_of(register);
        std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .and_then(|mut file| file.write_all(token.as_bytes()))
            .map_err(|source| SurfaceError::Write {
                register,
                path,
                source,
            })
    }
}

impl ControlSurface for SysfsSurface {
    fn read(&self, register: Register) -> Result<i64, SurfaceError> {
        if register == Register::ScalingGovernor {
            return Err(SurfaceError::WriteOnly { register });
        }
        let path = self.paths.path_of(register);
        let content = std::fs::read_to_string(&path).map_err(|source| SurfaceError::Read {
            register,
            path: path.clone(),
            source,
        })?;
        content
            .trim()
            .parse::<i64>()
            .map_err(|_| SurfaceError::NotInteger {
                register,
                content: content.trim().to_string(),
            })
    }

    fn write(&self, register: Register, value: i64) -> Result<(), SurfaceError> {
        self.write_token(register, &value.to_string())
    }

    fn set_bias(&self, bias: PerformanceBias) -> Result<(), SurfaceError> {
        self.write_token(Register::ScalingGovernor, bias.as_str())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::io::Error as IoError;
    use std::sync::Mutex;
    use std::thread::ThreadId;
    use std::time::{Duration, Instant};

    fn injected(register: Register) -> IoError {
        IoError::other(format!("injected failure on {register}"))
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Written {
        Value(i64),
        Bias(PerformanceBias),
    }

    #[derive(Debug, Clone)]
    pub struct WriteRecord {
        pub writer: ThreadId,
        pub register: Register,
        pub value: Written,
        pub started: Instant,
        pub finished: Instant,
    }

    /// In-memory surface recording every write and who made it
    #[derive(Default)]
    pub struct MemorySurface {
        registers: Mutex<HashMap<Register, i64>>,
        writes: Mutex<Vec<WriteRecord>>,
        failing: Mutex<HashSet<Register>>,
        failing_writes: Mutex<HashSet<Register>>,
        write_delay: Duration,
    }

    impl MemorySurface {
        /// Profile (min, max, steps, turbo) plus package temperatures in °C.
        pub fn with_profile(min: i64, max: i64, steps: i64, turbo: i64) -> Self {
            let surface = Self::default();
            surface.set(Register::MinPerfPct, min);
            surface.set(Register::MaxPerfPct, max);
            surface.set(Register::NumPstates, steps);
            surface.set(Register::TurboPct, turbo);
            surface.set(Register::NoTurbo, 0);
            surface.set_temperatures(60, 90, 100);
            surface
        }

        pub fn with_write_delay(mut self, delay: Duration) -> Self {
            self.write_delay = delay;
            self
        }

        pub fn set(&self, register: Register, value: i64) {
            self.registers.lock().unwrap().insert(register, value);
        }

        pub fn get(&self, register: Register) -> Option<i64> {
            self.registers.lock().unwrap().get(&register).copied()
        }

        pub fn set_temperatures(&self, current: i64, max: i64, crit: i64) {
            self.set(Register::PackageTemp, current * 1000);
            self.set(Register::PackageMaxTemp, max * 1000);
            self.set(Register::PackageCritTemp, crit * 1000);
        }

        pub fn fail(&self, register: Register) {
            self.failing.lock().unwrap().insert(register);
        }

        /// Fails writes to `register` while reads still succeed.
        pub fn fail_writes(&self, register: Register) {
            self.failing_writes.lock().unwrap().insert(register);
        }

        pub fn recover(&self, register: Register) {
            self.failing.lock().unwrap().remove(&register);
            self.failing_writes.lock().unwrap().remove(&register);
        }

        pub fn writes(&self) -> Vec<WriteRecord> {
            self.writes.lock().unwrap().clone()
        }

        pub fn values_written(&self, register: Register) -> Vec<i64> {
            self.writes()
                .into_iter()
                .filter(|w| w.register == register)
                .filter_map(|w| match w.value {
                    Written::Value(v) => Some(v),
                    Written::Bias(_) => None,
                })
                .collect()
        }

        fn record(&self, register: Register, value: Written) -> Result<(), SurfaceError> {
            if self.failing.lock().unwrap().contains(&register)
                || self.failing_writes.lock().unwrap().contains(&register)
            {
                return Err(SurfaceError::Write {
                    register,
                    path: PathBuf::from("<memory>"),
                    source: injected(register),
                });
            }
            let started = Instant::now();
            if !self.write_delay.is_zero() {
                std::thread::sleep(self.write_delay);
            }
            if let Written::Value(v) = value {
                self.set(register, v);
            }
            self.writes.lock().unwrap().push(WriteRecord {
                writer: std::thread::current().id(),
                register,
                value,
                started,
                finished: Instant::now(),
            });
            Ok(())
        }
    }

    impl ControlSurface for MemorySurface {
        fn read(&self, register: Register) -> Result<i64, SurfaceError> {
            if self.failing.lock().unwrap().contains(&register) {
                return Err(SurfaceError::Read {
                    register,
                    path: PathBuf::from("<memory>"),
                    source: injected(register),
                });
            }
            self.get(register).ok_or_else(|| SurfaceError::Read {
                register,
                path: PathBuf::from("<memory>"),
                source: IoError::from(std::io::ErrorKind::NotFound),
            })
        }

        fn write(&self, register: Register, value: i64) -> Result<(), SurfaceError> {
            self.record(register, Written::Value(value))
        }

        fn set_bias(&self, bias: PerformanceBias) -> Result<(), SurfaceError> {
            self.record(Register::ScalingGovernor, Written::Bias(bias))
        }
    }
}

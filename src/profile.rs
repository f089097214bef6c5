use tracing::warn;

use crate::error::StartupError;
use crate::surface::{ControlSurface, Register};

/// Bounds reported by the P-state driver, read once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareProfile {
    pub min_perf_pct: i64,
    pub max_perf_pct: i64,
    pub num_pstates: i64,
    pub turbo_pct: i64,
}

impl HardwareProfile {
    /// Reads min, max, stepcount and turbopct. Any failure is fatal for the daemon.
    pub fn read(surface: &dyn ControlSurface) -> Result<Self, StartupError> {
        let profile = Self {
            min_perf_pct: surface.read(Register::MinPerfPct)?,
            max_perf_pct: surface.read(Register::MaxPerfPct)?,
            num_pstates: surface.read(Register::NumPstates)?,
            turbo_pct: surface.read(Register::TurboPct)?,
        };
        profile.validate()?;
        if profile.is_pinned() {
            warn!(
                perf_pct = profile.min_perf_pct,
                "min_perf_pct equals max_perf_pct, every mode will hold this single value; \
                the limits may be left over from a locked mode"
            );
        }
        Ok(profile)
    }

    /// True when the driver reports no room between the bounds.
    pub fn is_pinned(&self) -> bool {
        self.min_perf_pct == self.max_perf_pct
    }

    pub fn validate(&self) -> Result<(), StartupError> {
        if self.num_pstates < 2 {
            return Err(StartupError::InvalidProfile(format!(
                "num_pstates must be at least 2, got {}",
                self.num_pstates
            )));
        }
        if !(0..=100).contains(&self.turbo_pct) {
            return Err(StartupError::InvalidProfile(format!(
                "turbo_pct must be between 0 and 100, got {}",
                self.turbo_pct
            )));
        }
        if self.min_perf_pct < 0 || self.min_perf_pct > self.max_perf_pct {
            return Err(StartupError::InvalidProfile(format!(
                "min_perf_pct {} must be between 0 and max_perf_pct {}",
                self.min_perf_pct, self.max_perf_pct
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SurfaceError;
    use crate::surface::testing::MemorySurface;

    #[test]
    fn test_read_profile() {
        let surface = MemorySurface::with_profile(20, 100, 10, 30);
        let profile = HardwareProfile::read(&surface).unwrap();
        assert_eq!(
            profile,
            HardwareProfile {
                min_perf_pct: 20,
                max_perf_pct: 100,
                num_pstates: 10,
                turbo_pct: 30,
            }
        );
        assert!(surface.writes().is_empty());
    }

    #[test]
    fn test_read_failure_is_fatal() {
        let surface = MemorySurface::with_profile(20, 100, 10, 30);
        surface.fail(Register::TurboPct);
        let err = HardwareProfile::read(&surface).unwrap_err();
        assert!(matches!(
            err,
            StartupError::Hardware(SurfaceError::Read {
                register: Register::TurboPct,
                ..
            })
        ));
    }

    #[test]
    fn test_single_pstate_rejected() {
        let surface = MemorySurface::with_profile(20, 100, 1, 30);
        assert!(matches!(
            HardwareProfile::read(&surface),
            Err(StartupError::InvalidProfile(_))
        ));
    }

    #[test]
    fn test_pinned_profile_is_accepted() {
        let surface = MemorySurface::with_profile(20, 20, 10, 30);
        let profile = HardwareProfile::read(&surface).unwrap();
        assert!(profile.is_pinned());
        let surface = MemorySurface::with_profile(20, 100, 10, 30);
        assert!(!HardwareProfile::read(&surface).unwrap().is_pinned());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let surface = MemorySurface::with_profile(100, 20, 10, 30);
        assert!(HardwareProfile::read(&surface).is_err());
        let surface = MemorySurface::with_profile(20, 100, 10, 130);
        assert!(HardwareProfile::read(&surface).is_err());
    }
}

use std::sync::Arc;

use tracing::{info, warn};

use crate::governor::Mode;
use crate::supervisor::{ModeChange, Supervisor};

/// Text-in, text-out front of the supervisor used by the control socket
#[derive(Clone)]
pub struct ModeEndpoint {
    supervisor: Arc<Supervisor>,
}

impl ModeEndpoint {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self { supervisor }
    }

    /// Parses `name`, forwards it and returns the outcome as a message.
    pub fn set_mode(&self, name: &str) -> String {
        let result = name
            .parse::<Mode>()
            .and_then(|mode| self.supervisor.set_mode(mode));
        match result {
            Ok(ModeChange::Switched(mode)) => {
                info!(mode = %mode, "mode changed");
                format!("Governor set to {mode}")
            }
            Ok(ModeChange::AlreadySet(mode)) => format!("Mode already set to {mode}!"),
            Err(e) => {
                warn!(request = name, error = %e, "mode request rejected");
                e.to_string()
            }
        }
    }

    pub fn get_mode(&self) -> String {
        self.supervisor
            .current()
            .map_or_else(|| "uninitialized".to_string(), |mode| mode.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governor::PollPeriods;
    use crate::profile::HardwareProfile;
    use crate::surface::testing::MemorySurface;
    use std::time::Duration;

    fn endpoint() -> (ModeEndpoint, Arc<MemorySurface>) {
        let surface = Arc::new(MemorySurface::with_profile(20, 100, 10, 30));
        let profile = HardwareProfile::read(surface.as_ref()).unwrap();
        let periods = PollPeriods {
            locked: Duration::from_secs(60),
            active: Duration::from_secs(60),
        };
        let supervisor = Supervisor::start(profile, surface.clone(), periods).unwrap();
        // the stock loop writes its bias once on startup
        while surface.writes().is_empty() {
            std::thread::sleep(Duration::from_millis(2));
        }
        (ModeEndpoint::new(Arc::new(supervisor)), surface)
    }

    #[test]
    fn test_switch_message() {
        let (endpoint, _surface) = endpoint();
        assert_eq!(endpoint.set_mode("performance"), "Governor set to performance");
        assert_eq!(endpoint.get_mode(), "performance");
        assert_eq!(
            endpoint.set_mode("performance-locked"),
            "Governor set to performance-locked"
        );
    }

    #[test]
    fn test_already_set_message() {
        let (endpoint, _surface) = endpoint();
        assert_eq!(endpoint.set_mode("stock"), "Mode already set to stock!");
    }

    #[test]
    fn test_invalid_and_unsupported_are_distinct() {
        let (endpoint, surface) = endpoint();
        let before = surface.writes().len();

        assert_eq!(endpoint.set_mode("bogus"), "Invalid mode 'bogus'.");
        assert_eq!(endpoint.set_mode("Stock"), "Invalid mode 'Stock'.");
        assert_eq!(
            endpoint.set_mode("performanceoverdrive"),
            "Mode 'performanceoverdrive' is not supported."
        );
        assert_eq!(endpoint.get_mode(), "stock");
        assert_eq!(surface.writes().len(), before);
    }

    #[test]
    fn test_uninitialized_mode_name() {
        let surface = Arc::new(MemorySurface::with_profile(20, 100, 10, 30));
        let profile = HardwareProfile::read(surface.as_ref()).unwrap();
        let supervisor = Supervisor::new(profile, surface, PollPeriods::default());
        let endpoint = ModeEndpoint::new(Arc::new(supervisor));
        assert_eq!(endpoint.get_mode(), "uninitialized");
    }
}

// Public modules
pub mod config;
pub mod control_loop;
pub mod endpoint;
pub mod error;
pub mod governor;
pub mod profile;
pub mod server;
pub mod supervisor;
pub mod surface;

// Control-law constants
pub mod constants {
    /// °C below the critical temperature where stock throttles hard
    pub const CRITICAL_HEADROOM_C: f64 = 10.0;
    /// °C below the target temperature where stock boosts hard
    pub const BOOST_HEADROOM_C: f64 = 20.0;

    pub const SMALL_STEP_PCT: i64 = 1;
    pub const BIG_STEP_PCT: i64 = 3;

    pub const DEFAULT_LOCKED_POLL_MS: u64 = 5000;
    pub const DEFAULT_ACTIVE_POLL_MS: u64 = 250;
}

use std::path::PathBuf;
use std::sync::Arc;

use pstate_thermald::config::Config;
use pstate_thermald::endpoint::ModeEndpoint;
use pstate_thermald::error::StartupError;
use pstate_thermald::profile::HardwareProfile;
use pstate_thermald::server::ControlServer;
use pstate_thermald::supervisor::Supervisor;
use pstate_thermald::surface::SysfsSurface;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = run() {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), StartupError> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    let surface = SysfsSurface::new(config.sysfs_paths()?);
    let profile = HardwareProfile::read(&surface)?;
    info!(
        min_perf_pct = profile.min_perf_pct,
        max_perf_pct = profile.max_perf_pct,
        num_pstates = profile.num_pstates,
        turbo_pct = profile.turbo_pct,
        "hardware profile"
    );

    // a second daemon must fail here, before it touches the surface
    let server = ControlServer::bind(&config.socket)?;
    let supervisor = Arc::new(Supervisor::start(profile, Arc::new(surface), config.poll)?);

    let on_signal = supervisor.clone();
    let socket = server.path().to_path_buf();
    ctrlc::set_handler(move || {
        info!("shutting down");
        on_signal.shutdown();
        let _ = std::fs::remove_file(&socket);
        std::process::exit(0);
    })?;

    server.serve(&ModeEndpoint::new(supervisor));
    Ok(())
}

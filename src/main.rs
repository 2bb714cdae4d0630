//! `vigil` - a protected workstation activity agent
//!
//! Reports the active window and idle/working status to a remote server
//! on a fixed cadence and refuses to terminate without admin approval.
//! An exit without approval is undone by relaunching the agent.

use anyhow::{Context, Result};
use clap::Parser;
use console::Style;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vigil_core::config::Config;
use vigil_core::lifecycle::{DetachedRelauncher, ExitGuard, LifecycleController};
use vigil_core::monitor::ActivityMonitor;
use vigil_core::probe::{NullScreenGrabber, NullWindowInspector};
use vigil_core::remote::{HttpRemoteAuthority, RemoteAuthority};
use vigil_core::scheduler::Scheduler;
use vigil_core::SharedState;

use crate::cli::{Cli, Commands};
use crate::surface::ControlSurface;

mod cli;
mod surface;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // A broken configuration is fatal: the agent must not start.
    let config =
        Config::load(cli.config.as_deref()).context("Failed to load agent configuration")?;

    match cli.command {
        Some(Commands::CheckConfig) => {
            print_effective_config(&config);
            Ok(())
        }
        Some(Commands::Run) | None => run(config).await,
    }
}

async fn run(config: Config) -> Result<()> {
    print_banner(&config);

    let state = SharedState::new();
    let monitor = ActivityMonitor::new(state.clone(), config.idle_threshold());
    let remote: Arc<dyn RemoteAuthority> = Arc::new(
        HttpRemoteAuthority::new(&config.api_url, &config.api_key)
            .context("Failed to set up the remote authority client")?,
    );
    let controller = Arc::new(LifecycleController::new(
        state.clone(),
        Arc::clone(&remote),
        config.poll_interval(),
    ));

    // Resurrection guard for every unsanctioned exit path. A marker left
    // by the incarnation that launched us is cleared first.
    let guard = Arc::new(ExitGuard::new(
        state.clone(),
        Arc::new(DetachedRelauncher),
        ExitGuard::default_marker_path(),
    ));
    guard.clear_marker();
    spawn_signal_hooks(Arc::clone(&guard));

    let scheduler = Scheduler::new(state.clone(), Arc::clone(&remote), config.clone());
    scheduler.spawn_status_reporter(monitor.clone(), Arc::new(NullWindowInspector));
    scheduler.spawn_screenshot_task(Arc::new(NullScreenGrabber));

    // The control surface owns the main thread until approval arrives.
    let surface = ControlSurface::new(state, controller, monitor);
    let handle = tokio::runtime::Handle::current();
    let surface_result = tokio::task::spawn_blocking(move || surface.run(handle)).await;

    // The guard covers every exit path out of here: a panicked surface
    // thread is still an unsanctioned exit and gets resurrected, while a
    // close that was approved passes through untouched.
    guard.on_exit();
    surface_result.context("control surface thread panicked")?;
    info!("agent stopped");
    Ok(())
}

/// Route fatal signals through the exit guard before terminating.
fn spawn_signal_hooks(guard: Arc<ExitGuard>) {
    let ctrl_c_guard = Arc::clone(&guard);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_guard.on_exit();
            std::process::exit(130);
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let Ok(mut term) = signal(SignalKind::terminate()) else {
            return;
        };
        if term.recv().await.is_some() {
            guard.on_exit();
            std::process::exit(143);
        }
    });
}

fn print_banner(config: &Config) {
    let blue = Style::new().blue();
    let dim = Style::new().dim();

    println!("{}", blue.apply_to("=".repeat(50)));
    println!(
        "  {} v{} ({})",
        blue.apply_to("vigil agent (protected)"),
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );
    println!("{}", blue.apply_to("=".repeat(50)));
    println!("API URL: {}", config.api_url);
    println!("Activity interval: {}s", config.activity_interval);
    println!("Screenshot interval: {}s", config.screenshot_interval);
    println!(
        "{}",
        dim.apply_to("NOTE: this agent requires admin approval to close")
    );
    println!("{}", blue.apply_to("=".repeat(50)));
}

fn print_effective_config(config: &Config) {
    println!("api_url = {:?}", config.api_url);
    println!("api_key set = {}", !config.api_key.is_empty());
    println!("activity_interval = {}s", config.activity_interval);
    println!("screenshot_interval = {}s", config.screenshot_interval);
    println!("idle_threshold = {}s", config.idle_threshold);
    println!("screenshot_quality = {}", config.screenshot_quality);
    println!("poll_interval = {}s", config.poll_interval);
}

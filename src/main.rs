//! lamco-display-ctl - X11 display layout control
//!
//! Entry point for the command-line binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

use lamco_display_ctl::config::Config;
use lamco_display_ctl::display::{
    ApplyOutcome, DisplayBackend, DisplayOutput, DisplaySession, InventoryReader, LayoutRequest,
    Notification, Orientation, OrientationTimer, RelativePosition, Resolution, SessionObserver,
    TopologySnapshot, XrandrBackend,
};
use lamco_display_ctl::utils::{format_user_error, log_startup_diagnostics};

/// Command-line arguments for lamco-display-ctl
#[derive(Parser, Debug)]
#[command(name = "lamco-display-ctl")]
#[command(version, about = "X11 display layout and orientation control", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, env = "LAMCO_DISPLAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// xrandr binary to use
    #[arg(long, env = "LAMCO_XRANDR")]
    pub xrandr: Option<String>,

    /// Hotplug poll interval in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long, default_value = "compact")]
    pub log_format: String,

    /// Write logs to file (in addition to stderr)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show connected displays, their placement and modes
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply a layout change once
    Apply {
        /// Output to position or re-mode (default: the tracked secondary)
        #[arg(short, long)]
        display: Option<String>,

        /// Placement relative to the primary (right-of, left-of, above, below, same-as)
        #[arg(short, long)]
        position: Option<RelativePosition>,

        /// Mode as WIDTHxHEIGHT
        #[arg(short, long)]
        resolution: Option<Resolution>,

        /// Orientation of the primary (normal, left, right, inverted)
        #[arg(short, long)]
        orientation: Option<Orientation>,

        /// Keep a new orientation without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Follow hotplug events until interrupted
    Watch,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = load_config(&args);
    let logging = match &loaded {
        Ok(config) => config.logging.clone(),
        Err(_) => Default::default(),
    };
    let _log_guard = init_logging(&args, &logging)?;

    info!("════════════════════════════════════════════════════════");
    info!("  lamco-display-ctl v{}", env!("CARGO_PKG_VERSION"));
    info!("  Built: {} {}", env!("BUILD_DATE"), env!("BUILD_TIME"));
    info!("  Commit: {}", env!("GIT_HASH"));
    info!("════════════════════════════════════════════════════════");

    let config = loaded.or_else(|e| {
        warn!("Failed to load config: {:#}, using defaults", e);
        Config::default_config()
    })?;
    let config = config.with_overrides(args.xrandr.clone(), args.poll_interval_ms);
    config.validate()?;
    debug!("Config: {:?}", config);

    log_startup_diagnostics(&config.display).await;

    let result = match args.command {
        Command::Status { json } => run_status(&config, json).await,
        Command::Apply {
            display,
            position,
            resolution,
            orientation,
            yes,
        } => {
            let overrides = ApplyArgs {
                display,
                position,
                resolution,
                orientation,
                yes,
            };
            run_apply(&config, overrides).await
        }
        Command::Watch => run_watch(&config).await,
    };

    if let Err(e) = &result {
        eprintln!("{}", format_user_error(e));
    }
    result
}

fn load_config(args: &Args) -> Result<Config> {
    let path = args
        .config
        .clone()
        .or_else(Config::default_path)
        .context("No config directory available")?;
    Config::load(&path)
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn init_logging(
    args: &Args,
    logging: &lamco_display_ctl::config::LoggingConfig,
) -> Result<Option<WorkerGuard>> {
    use std::fs::File;

    let log_level = match args.verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "lamco_display_ctl={level},warn",
            level = log_level
        ))
    });

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(match args.log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
        "pretty" => tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .boxed(),
    });

    let mut guard = None;
    if let Some(log_file_path) = &args.log_file {
        let file = File::create(log_file_path)
            .context(format!("Failed to create log file: {}", log_file_path.display()))?;
        layers.push(file_layer(&args.log_format, file));
    } else if let Some(dir) = &logging.log_dir {
        let appender = tracing_appender::rolling::daily(dir, "lamco-display-ctl.log");
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        guard = Some(worker_guard);
        layers.push(file_layer(&args.log_format, writer));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    if let Some(path) = &args.log_file {
        info!("Logging to file: {}", path.display());
    } else if let Some(dir) = &logging.log_dir {
        info!("Logging to directory: {}", dir.display());
    }

    Ok(guard)
}

fn file_layer<W>(format: &str, writer: W) -> BoxedLayer
where
    W: for<'a> tracing_subscriber::fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    match format {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .boxed(),
    }
}

fn backend(config: &Config) -> Arc<dyn DisplayBackend> {
    Arc::new(XrandrBackend::from_config(&config.display))
}

/// One secondary output in `status --json`
#[derive(Debug, Serialize)]
struct SecondaryStatus {
    name: String,
    relation: RelativePosition,
    current_mode: Option<Resolution>,
}

/// `status --json` document
#[derive(Debug, Serialize)]
struct StatusReport {
    primary: Option<String>,
    secondary: Vec<SecondaryStatus>,
    outputs: Vec<DisplayOutput>,
}

async fn run_status(config: &Config, json: bool) -> Result<()> {
    let snapshot = InventoryReader::new(backend(config)).read().await?;

    if json {
        let secondary = snapshot
            .secondary
            .iter()
            .filter_map(|name| snapshot.output(name))
            .map(|output| SecondaryStatus {
                name: output.name.clone(),
                relation: snapshot
                    .primary
                    .as_deref()
                    .map(|primary| snapshot.placement(primary, &output.name))
                    .unwrap_or(RelativePosition::Unknown),
                current_mode: output.current_mode,
            })
            .collect();

        let report = StatusReport {
            primary: snapshot.primary.clone(),
            secondary,
            outputs: snapshot.outputs.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print!("{}", render_status(&snapshot));
    Ok(())
}

/// Plain-text status, all from one inventory read
fn render_status(snapshot: &TopologySnapshot) -> String {
    let Some(main) = snapshot.primary_output() else {
        return "No connected displays\n".to_string();
    };

    let mut text = String::new();
    render_output(&mut text, "Primary", main, None);
    for output in snapshot
        .secondary
        .iter()
        .filter_map(|name| snapshot.output(name))
    {
        let relation = snapshot.placement(&main.name, &output.name);
        render_output(
            &mut text,
            "Secondary",
            output,
            Some((relation, main.name.as_str())),
        );
    }
    text
}

fn render_output(
    text: &mut String,
    role: &str,
    output: &DisplayOutput,
    relation: Option<(RelativePosition, &str)>,
) {
    let mode = output
        .current_mode
        .map(|m| m.to_string())
        .unwrap_or_else(|| "off".to_string());

    let line = match relation {
        Some((relation, main)) => {
            format!("{}: {} ({}, {} {})\n", role, output.name, mode, relation, main)
        }
        None => format!("{}: {} ({})\n", role, output.name, mode),
    };
    text.push_str(&line);

    if !output.available_resolutions.is_empty() {
        let modes: Vec<String> = output
            .available_resolutions
            .iter()
            .map(ToString::to_string)
            .collect();
        text.push_str(&format!("  modes: {}\n", modes.join(", ")));
    }
}

/// Observer that reports session events on the terminal
struct CliObserver {
    notifications: mpsc::UnboundedSender<Notification>,
}

impl SessionObserver for CliObserver {
    fn on_external_displays(&self, displays: &[String]) {
        if displays.is_empty() {
            println!("No secondary displays connected");
        } else {
            println!("Secondary displays: {}", displays.join(", "));
        }
    }

    fn on_resolutions(&self, display: &str, resolutions: &[Resolution]) {
        let modes: Vec<String> = resolutions.iter().map(ToString::to_string).collect();
        println!("  {} modes: {}", display, modes.join(", "));
    }

    fn on_layout_reset(&self) {
        println!("Layout reset to primary display only");
    }

    fn on_countdown(&self, timer: &OrientationTimer) {
        debug!(
            "Reverting {} to {} in {}s",
            timer.target_display, timer.baseline_orientation, timer.remaining_seconds
        );
    }

    fn on_notification(&self, notification: &Notification) {
        println!("{}", notification);
        let _ = self.notifications.send(notification.clone());
    }
}

/// `apply` options
struct ApplyArgs {
    display: Option<String>,
    position: Option<RelativePosition>,
    resolution: Option<Resolution>,
    orientation: Option<Orientation>,
    yes: bool,
}

async fn start_session(
    config: &Config,
) -> Result<(DisplaySession, mpsc::UnboundedReceiver<Notification>)> {
    let (notifications, receiver) = mpsc::unbounded_channel();
    let observer = Arc::new(CliObserver { notifications });
    let session = DisplaySession::start(backend(config), &config.display, observer)
        .await
        .context("Failed to start display session")?;
    Ok((session, receiver))
}

async fn run_apply(config: &Config, args: ApplyArgs) -> Result<()> {
    if args.display.is_none()
        && args.position.is_none()
        && args.resolution.is_none()
        && args.orientation.is_none()
    {
        anyhow::bail!("Nothing to apply: give --position, --resolution or --orientation");
    }

    let (mut session, mut notifications) = start_session(config).await?;

    let current = session.desired_state().requested.clone();
    let request = LayoutRequest {
        display: args.display.or(current.display),
        orientation: args.orientation.unwrap_or(current.orientation),
        position: args.position.or(current.position),
        resolution: args.resolution.or(current.resolution),
    };

    match session.apply(request).await? {
        ApplyOutcome::Unchanged => println!("Layout already matches, nothing to do"),
        ApplyOutcome::Applied { commands, .. } => debug!("Issued {} layout commands", commands),
    }

    let Some(timer) = session.pending_orientation().cloned() else {
        return Ok(());
    };

    if args.yes {
        session.confirm()?;
        return Ok(());
    }

    println!(
        "Press Enter within {} seconds to keep {}.",
        timer.remaining_seconds, timer.pending_orientation
    );

    let (handle, session_loop) = session.into_runner();
    let task = tokio::spawn(session_loop);

    // Blocking stdin read on its own thread so the runtime never waits on it.
    // On EOF or a read error the sender is dropped and the countdown runs out.
    let (line_tx, line_rx) = oneshot::channel();
    std::thread::spawn(move || {
        if read_confirmation(&mut std::io::stdin().lock()) {
            let _ = line_tx.send(());
        }
    });

    let reverted = async {
        while let Some(notification) = notifications.recv().await {
            if matches!(notification, Notification::OrientationReverted { .. }) {
                break;
            }
        }
    };

    tokio::select! {
        Ok(()) = line_rx => {
            if let Err(e) = handle.confirm().await {
                warn!("Confirmation came too late: {}", e);
            }
        }
        _ = reverted => {}
    }

    handle.shutdown().await?;
    task.await.context("Display session task failed")??;
    Ok(())
}

/// Whether the user entered a line. End of input is not a confirmation.
fn read_confirmation(input: &mut impl BufRead) -> bool {
    let mut line = String::new();
    matches!(input.read_line(&mut line), Ok(n) if n > 0)
}

async fn run_watch(config: &Config) -> Result<()> {
    let (session, _notifications) = start_session(config).await?;
    println!(
        "Watching displays (primary {}), press Ctrl-C to stop",
        session.main_display()
    );

    let (handle, session_loop) = session.into_runner();
    let task = tokio::spawn(session_loop);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Interrupted, stopping");

    handle.shutdown().await?;
    task.await.context("Display session task failed")??;
    Ok(())
}

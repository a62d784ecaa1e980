//! ww: run dev jobs as supervised transient user services with live reload.
//!
//! This is the entry point of the application. Raw arguments are classified
//! first (version flag, unit shorthand, vocabulary subcommand, bare path)
//! and only the structured forms reach the clap parser.

mod commands;
mod config;
mod dash;
mod error;
mod ident;
mod journal;
mod registry;
mod router;
mod slug;
mod target;
mod watchtool;

use std::path::PathBuf;

use anyhow::Result;
use clap::builder::styling::{AnsiColor, Effects, Style};
use clap::builder::Styles;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::commands::Lifecycle;
use crate::dash::app::Columns;
use crate::dash::term::BackendChoice;
use crate::dash::DashOptions;
use crate::error::Error;
use crate::registry::{Registry, Systemctl};
use crate::router::{Route, UnitAction};

/// History lines shown when `-n` is not given.
const DEFAULT_LOG_LINES: u32 = 50;

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "ww",
    version,
    about = "Run dev jobs as supervised transient user services with live reload",
    styles = help_styles(),
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List managed services.
    Ps,
    /// Show detailed status for one service.
    Status {
        /// Unit name, PID, or friendly name.
        id: String,
    },
    /// Print the main PID of a service.
    Pid { id: String },
    /// Show journal output for a service.
    Logs {
        id: String,
        /// History lines to show.
        #[arg(short = 'n', long = "lines", default_value_t = DEFAULT_LOG_LINES)]
        lines: u32,
        /// Keep following new output.
        #[arg(short, long)]
        follow: bool,
        /// Include output from before the last activation.
        #[arg(short, long)]
        all: bool,
    },
    /// Restart a service (starts it when stopped).
    Restart { id: String },
    /// Stop a service.
    Stop { id: String },
    /// Stop a service and clear it from the registry.
    Rm { id: String },
    /// Restart every managed service.
    RestartAll,
    /// Stop every managed service.
    StopAll,
    /// Stop and clear every managed service.
    RmAll,
    /// Check the external tools this command depends on.
    Doctor,
    /// Interactive service dashboard.
    Dash {
        /// Project roots used to label services; repeatable.
        #[arg(long = "root")]
        roots: Vec<PathBuf>,
        /// Column set for the service table.
        #[arg(long, value_enum)]
        columns: Option<Columns>,
        /// Where dashboard commands run.
        #[arg(long, value_enum)]
        terminal_backend: Option<BackendChoice>,
        /// Status refresh interval in milliseconds.
        #[arg(long)]
        refresh_ms: Option<u64>,
        /// History lines when following a unit's logs.
        #[arg(long)]
        last: Option<u32>,
    },
    /// Show help information.
    Help,
    /// Show version information.
    Version,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(err) = dispatch(args).await {
        eprintln!("ww: {err:#}");
        let code = err
            .downcast_ref::<Error>()
            .map(Error::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn dispatch(args: Vec<String>) -> Result<()> {
    let registry = Systemctl::new();
    match router::classify(&args) {
        Route::Version => {
            println!("ww {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Route::Shorthand { unit, action } => {
            shorthand(&unit, action, &registry).await?;
            Ok(())
        }
        Route::StartPath(path) => {
            commands::start(&path, &registry).await?;
            Ok(())
        }
        Route::Subcommand(tokens) | Route::Fallthrough(tokens) => {
            let cli = Cli::parse_from(std::iter::once("ww".to_string()).chain(tokens));
            run_cli(cli, &registry).await
        }
    }
}

/// Dispatches `<unit> [action]` shorthand with the same defaults as the
/// structured forms.
async fn shorthand<R: Registry>(unit: &str, action: UnitAction, registry: &R) -> error::Result<()> {
    match action {
        UnitAction::ShowLogs => {
            commands::logs(unit, DEFAULT_LOG_LINES, false, false, registry).await
        }
        UnitAction::FollowLogs => {
            commands::logs(unit, DEFAULT_LOG_LINES, true, false, registry).await
        }
        UnitAction::ShowPid => commands::pid(unit, registry).await,
        UnitAction::ShowStatus => commands::status(unit, registry).await,
        UnitAction::Restart => commands::lifecycle(unit, Lifecycle::Restart, registry).await,
        UnitAction::Stop => commands::lifecycle(unit, Lifecycle::Stop, registry).await,
        UnitAction::Remove => commands::lifecycle(unit, Lifecycle::Remove, registry).await,
    }
}

async fn run_cli(cli: Cli, registry: &Systemctl) -> Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };
    match command {
        Commands::Ps => commands::ps(registry).await?,
        Commands::Status { id } => commands::status(&id, registry).await?,
        Commands::Pid { id } => commands::pid(&id, registry).await?,
        Commands::Logs {
            id,
            lines,
            follow,
            all,
        } => commands::logs(&id, lines, follow, all, registry).await?,
        Commands::Restart { id } => commands::lifecycle(&id, Lifecycle::Restart, registry).await?,
        Commands::Stop { id } => commands::lifecycle(&id, Lifecycle::Stop, registry).await?,
        Commands::Rm { id } => commands::lifecycle(&id, Lifecycle::Remove, registry).await?,
        Commands::RestartAll => commands::bulk(Lifecycle::Restart, registry).await?,
        Commands::StopAll => commands::bulk(Lifecycle::Stop, registry).await?,
        Commands::RmAll => commands::bulk(Lifecycle::Remove, registry).await?,
        Commands::Doctor => commands::doctor(registry).await?,
        Commands::Dash {
            roots,
            columns,
            terminal_backend,
            refresh_ms,
            last,
        } => {
            let defaults = config::load_default().dash.unwrap_or_default();
            let base = DashOptions::default();
            let opts = DashOptions {
                roots: if roots.is_empty() {
                    defaults.roots.unwrap_or_default()
                } else {
                    roots
                },
                columns: columns
                    .or_else(|| parse_enum::<Columns>(defaults.columns.as_deref()))
                    .unwrap_or(base.columns),
                terminal_backend: terminal_backend
                    .or_else(|| parse_enum::<BackendChoice>(defaults.terminal_backend.as_deref()))
                    .unwrap_or(base.terminal_backend),
                refresh_ms: refresh_ms.or(defaults.refresh_ms).unwrap_or(base.refresh_ms),
                last: last.or(defaults.last).unwrap_or(base.last),
            };
            dash::run(opts).await?;
        }
        Commands::Help => {
            Cli::command().print_help()?;
            println!();
        }
        Commands::Version => println!("ww {}", env!("CARGO_PKG_VERSION")),
    }
    Ok(())
}

/// Parses a config-file string through the same names clap accepts.
fn parse_enum<T: ValueEnum>(value: Option<&str>) -> Option<T> {
    value.and_then(|v| T::from_str(v, true).ok())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("WW_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .fg_color(Some(AnsiColor::Cyan.into()))
                .effects(Effects::BOLD),
        )
        .usage(
            Style::new()
                .fg_color(Some(AnsiColor::Green.into()))
                .effects(Effects::BOLD),
        )
        .literal(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::Magenta.into())))
        .valid(Style::new().fg_color(Some(AnsiColor::Green.into())))
        .invalid(
            Style::new()
                .fg_color(Some(AnsiColor::Red.into()))
                .effects(Effects::BOLD),
        )
}

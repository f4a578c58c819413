//! # probe
//!
//! Command-line entry point for the Probe API quality pipeline.
//!
//! - `probe run` executes suites and flows, analyzes and writes reports
//! - `probe list` prints the execution plan without touching the network
//! - `probe validate` checks a configuration file
//! - `probe envs` lists the resolvable environments

mod display;

use std::io::{IsTerminal, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use probe_core::{ExecutionPlan, Orchestrator, ProbeConfig, ReqwestTransport, RunMode, RunOutcome};
use probe_report::{Envelope, TerminalReporter, Verbosity};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Color output mode for terminal display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum ColorMode {
    /// Color when stdout is a TTY
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn should_use_colors(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => stdout().is_terminal(),
        }
    }
}

/// Resolves verbosity from flags, then `PROBE_QUIET` / `PROBE_VERBOSE`.
fn resolve_verbosity(cli_verbose: bool, cli_quiet: bool) -> Verbosity {
    if cli_quiet {
        return Verbosity::Quiet;
    }
    if cli_verbose {
        return Verbosity::Verbose;
    }
    if std::env::var("PROBE_QUIET").is_ok() {
        return Verbosity::Quiet;
    }
    if std::env::var("PROBE_VERBOSE").is_ok() {
        return Verbosity::Verbose;
    }
    Verbosity::Normal
}

/// How a command ended, mapped onto the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitStatus {
    Clean,
    /// A case failed, a critical issue was recorded or a phase failed.
    Failures,
    /// Configuration or arguments rejected before any request went out.
    Invalid,
    Interrupted,
}

impl ExitStatus {
    fn exit_code(self) -> i32 {
        match self {
            ExitStatus::Clean => 0,
            ExitStatus::Failures => 1,
            ExitStatus::Invalid => 2,
            ExitStatus::Interrupted => 130,
        }
    }

    fn from_outcome(outcome: &RunOutcome, interrupted: bool) -> Self {
        if interrupted {
            ExitStatus::Interrupted
        } else if outcome.has_failures() {
            ExitStatus::Failures
        } else {
            ExitStatus::Clean
        }
    }
}

/// Probe - API quality orchestration, analysis and reporting
#[derive(Parser, Debug)]
#[command(name = "probe", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, default_value = "probe.yml", global = true)]
    config: PathBuf,

    /// Target environment
    #[arg(short, long, default_value = "development", global = true)]
    env: String,

    /// Verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print one verdict line per cycle
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Color output mode (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    color: ColorMode,

    /// Print the execution plan and exit (same as `probe list`)
    #[arg(long)]
    list: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline (default if no subcommand given)
    Run(RunArgs),

    /// Print the execution plan without sending any request
    List,

    /// Validate the configuration file
    Validate,

    /// List known environments
    Envs,
}

#[derive(Args, Debug, Default, Clone)]
struct RunArgs {
    /// single, automated or continuous
    #[arg(short, long, default_value = "single")]
    mode: String,

    /// Cycles in automated mode
    #[arg(long)]
    cycles: Option<u32>,

    /// Seconds between cycles (automated and continuous)
    #[arg(long)]
    interval: Option<u64>,

    /// Directory for report artifacts
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report envelopes, comma-separated or repeated (text, html, markdown, json)
    #[arg(short, long, value_delimiter = ',')]
    format: Vec<String>,

    /// History file (JSON Lines)
    #[arg(long)]
    history: Option<PathBuf>,

    /// Do not retry a failed automated cycle
    #[arg(long)]
    no_retry: bool,
}

impl RunArgs {
    /// Applies command-line overrides on top of the file configuration.
    fn apply(&self, config: &mut ProbeConfig) -> Result<(), String> {
        if let Some(cycles) = self.cycles {
            if cycles == 0 {
                return Err("--cycles must be at least 1".to_string());
            }
            config.orchestrator.cycles = cycles;
        }
        if let Some(seconds) = self.interval {
            config.orchestrator.cycle_delay_ms = seconds * 1000;
            config.orchestrator.continuous_interval_ms = seconds * 1000;
        }
        if let Some(dir) = &self.output {
            config.report.output_dir = dir.clone();
        }
        if !self.format.is_empty() {
            let mut envelopes = Vec::new();
            for name in &self.format {
                let envelope: Envelope = name.parse().map_err(|e| format!("{e}"))?;
                if !envelopes.contains(&envelope) {
                    envelopes.push(envelope);
                }
            }
            config.report.envelopes = envelopes;
        }
        if let Some(path) = &self.history {
            config.analysis.history_path = path.clone();
        }
        if self.no_retry {
            config.orchestrator.retry_on_failure = false;
        }
        Ok(())
    }
}

fn init_tracing(verbosity: Verbosity) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(filter) if !filter.is_empty() => filter,
        _ => match verbosity {
            Verbosity::Verbose => "debug".to_string(),
            Verbosity::Quiet => "warn".to_string(),
            Verbosity::Normal => "info".to_string(),
        },
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn invalid(message: impl std::fmt::Display) -> ExitStatus {
    eprintln!("{} {message}", "error:".red().bold());
    ExitStatus::Invalid
}

fn load_config(cli: &Cli) -> Result<ProbeConfig, ExitStatus> {
    ProbeConfig::from_file(&cli.config).map_err(|e| {
        invalid(format!(
            "could not load configuration '{}': {e}",
            cli.config.display()
        ))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbosity = resolve_verbosity(cli.verbose, cli.quiet);
    init_tracing(verbosity);
    colored::control::set_override(cli.color.should_use_colors());

    let status = match &cli.command {
        _ if cli.list => list_command(&cli),
        None => run_command(&cli, &RunArgs::default_args(), verbosity).await,
        Some(Commands::Run(args)) => run_command(&cli, args, verbosity).await,
        Some(Commands::List) => list_command(&cli),
        Some(Commands::Validate) => validate_command(&cli),
        Some(Commands::Envs) => envs_command(&cli),
    };

    let code = status.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

impl RunArgs {
    fn default_args() -> Self {
        Self {
            mode: RunMode::Single.as_str().to_string(),
            ..Self::default()
        }
    }
}

async fn run_command(cli: &Cli, args: &RunArgs, verbosity: Verbosity) -> ExitStatus {
    let mode: RunMode = match args.mode.parse() {
        Ok(mode) => mode,
        Err(e) => return invalid(e),
    };
    let mut config = match load_config(cli) {
        Ok(config) => config,
        Err(status) => return status,
    };
    if let Err(message) = args.apply(&mut config) {
        return invalid(message);
    }

    let transport = match ReqwestTransport::new() {
        Ok(transport) => Arc::new(transport),
        Err(e) => return invalid(format!("could not build HTTP client: {e}")),
    };

    let reporter = Arc::new(TerminalReporter::with_verbosity(verbosity));
    let orchestrator = match Orchestrator::from_config(&config, &cli.env, transport) {
        Ok(orchestrator) => orchestrator
            .on_progress(display::progress_callback(Arc::clone(&reporter)))
            .on_event(display::event_callback(Arc::clone(&reporter))),
        Err(e) => return invalid(e),
    };

    let interrupted = Arc::new(AtomicBool::new(false));
    spawn_interrupt_handler(orchestrator.cancellation_token(), Arc::clone(&interrupted));

    info!(
        mode = %mode,
        environment = %cli.env,
        suites = config.suites.len(),
        flows = config.flows.len(),
        "starting run"
    );
    let outcome = orchestrator.run(mode).await;

    if outcome.summaries.len() > 1 && verbosity != Verbosity::Quiet {
        println!("\n{}", "Cycles".bold());
        for summary in &outcome.summaries {
            println!("  {}", TerminalReporter::verdict_line(summary));
        }
    }

    ExitStatus::from_outcome(&outcome, interrupted.load(Ordering::SeqCst))
}

/// First Ctrl-C stops scheduling; the cycle in flight still finishes.
fn spawn_interrupt_handler(token: CancellationToken, interrupted: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current cycle");
            interrupted.store(true, Ordering::SeqCst);
            token.cancel();
        }
    });
}

fn list_command(cli: &Cli) -> ExitStatus {
    let config = match load_config(cli) {
        Ok(config) => config,
        Err(status) => return status,
    };
    if let Err(e) = config.validate(&cli.env) {
        return invalid(e);
    }
    let plan = match ExecutionPlan::build(&config.suites) {
        Ok(plan) => plan,
        Err(e) => return invalid(e),
    };
    for line in display::plan_lines(&plan, &config.flows) {
        println!("{line}");
    }
    ExitStatus::Clean
}

fn validate_command(cli: &Cli) -> ExitStatus {
    let config = match load_config(cli) {
        Ok(config) => config,
        Err(status) => return status,
    };
    match config.validate(&cli.env) {
        Ok(env) => {
            println!(
                "{} {} is valid for '{}' ({})",
                "ok:".green().bold(),
                cli.config.display(),
                env.name,
                env.base_url
            );
            ExitStatus::Clean
        }
        Err(e) => invalid(e),
    }
}

fn envs_command(cli: &Cli) -> ExitStatus {
    let config = match load_config(cli) {
        Ok(config) => config,
        Err(status) => return status,
    };
    for name in config.environment_names() {
        match config.environment(&name) {
            Ok(env) => println!("{name:<14} {}", env.base_url),
            Err(e) => println!("{name:<14} {}", e.to_string().red()),
        }
    }
    ExitStatus::Clean
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use probe_proto::{Phase, PhaseLog, RunState, RunSummary, SessionStatus};

    fn summary(state: RunState) -> RunSummary {
        let now = Utc::now();
        RunSummary {
            cycle: 1,
            session_id: Some("s".into()),
            environment: "development".into(),
            state,
            session_status: Some(SessionStatus::Passed),
            pass_rate: 100.0,
            overall_score: None,
            grade: None,
            risk_level: None,
            critical_issues: 0,
            artifacts: Vec::new(),
            phases: PhaseLog::new(),
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_cli_defaults_to_run() {
        let cli = Cli::try_parse_from(["probe"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("probe.yml"));
        assert_eq!(cli.env, "development");
        assert!(!cli.list);
        assert!(Cli::try_parse_from(["probe", "--list"]).unwrap().list);
    }

    #[test]
    fn test_format_accepts_comma_list() {
        let cli =
            Cli::try_parse_from(["probe", "run", "--format", "json,md", "-f", "html"]).unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        let mut config = ProbeConfig::default();
        args.apply(&mut config).unwrap();
        assert_eq!(
            config.report.envelopes,
            vec![Envelope::Json, Envelope::Markdown, Envelope::Html]
        );
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let args = RunArgs {
            format: vec!["pdf".into()],
            ..RunArgs::default_args()
        };
        assert!(args.apply(&mut ProbeConfig::default()).is_err());
    }

    #[test]
    fn test_overrides_reach_config() {
        let args = RunArgs {
            cycles: Some(5),
            interval: Some(2),
            output: Some(PathBuf::from("out")),
            history: Some(PathBuf::from("h.jsonl")),
            no_retry: true,
            ..RunArgs::default_args()
        };
        let mut config = ProbeConfig::default();
        args.apply(&mut config).unwrap();

        assert_eq!(config.orchestrator.cycles, 5);
        assert_eq!(config.orchestrator.cycle_delay_ms, 2000);
        assert_eq!(config.orchestrator.continuous_interval_ms, 2000);
        assert_eq!(config.report.output_dir, PathBuf::from("out"));
        assert_eq!(config.analysis.history_path, PathBuf::from("h.jsonl"));
        assert!(!config.orchestrator.retry_on_failure);
    }

    #[test]
    fn test_zero_cycles_rejected() {
        let args = RunArgs {
            cycles: Some(0),
            ..RunArgs::default_args()
        };
        assert!(args.apply(&mut ProbeConfig::default()).is_err());
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["probe", "-v", "-q"]).is_err());
        assert_eq!(resolve_verbosity(true, false), Verbosity::Verbose);
        assert_eq!(resolve_verbosity(false, true), Verbosity::Quiet);
    }

    #[test]
    fn test_exit_codes() {
        let clean = RunOutcome {
            summaries: vec![summary(RunState::Completed)],
            cancelled: false,
        };
        let failed = RunOutcome {
            summaries: vec![summary(RunState::Failed {
                phase: Phase::Executing,
                message: "boom".into(),
            })],
            cancelled: false,
        };

        assert_eq!(ExitStatus::from_outcome(&clean, false), ExitStatus::Clean);
        assert_eq!(ExitStatus::from_outcome(&failed, false).exit_code(), 1);
        assert_eq!(ExitStatus::from_outcome(&clean, true).exit_code(), 130);
        assert_eq!(ExitStatus::Invalid.exit_code(), 2);
    }

    #[test]
    fn test_missing_config_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yml");
        let cli = Cli::try_parse_from(["probe", "-c", path.to_str().unwrap(), "validate"]).unwrap();
        assert_eq!(validate_command(&cli), ExitStatus::Invalid);
    }

    #[test]
    fn test_list_does_not_need_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.yml");
        std::fs::write(
            &path,
            "suites:\n  - name: smoke\n    cases:\n      - id: health\n        endpoint: /health\n",
        )
        .unwrap();
        let cli = Cli::try_parse_from(["probe", "-c", path.to_str().unwrap(), "list"]).unwrap();
        assert_eq!(list_command(&cli), ExitStatus::Clean);
    }
}

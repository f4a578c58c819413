//! Colored terminal output for progress and run summaries.

use colored::Colorize;
use probe_proto::{CaseStatus, Grade, LoadResult, RunState, RunSummary, SessionStatus};

/// Verbosity level for terminal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Only the final verdict.
    Quiet,
    /// Suites, failing cases and the summary.
    #[default]
    Normal,
    /// Every case, with attempts and timings.
    Verbose,
}

/// Terminal reporter fed by engine progress and orchestrator summaries.
#[derive(Debug, Default)]
pub struct TerminalReporter {
    verbosity: Verbosity,
}

fn status_mark(status: CaseStatus) -> colored::ColoredString {
    match status {
        CaseStatus::Passed => "PASS".green(),
        CaseStatus::Failed => "FAIL".red(),
        CaseStatus::Error => "ERR ".red().bold(),
        CaseStatus::Skipped => "SKIP".dimmed(),
        CaseStatus::Pending | CaseStatus::Running => "....".dimmed(),
    }
}

fn grade_colored(grade: Grade) -> colored::ColoredString {
    match grade {
        Grade::A | Grade::B => grade.as_str().green().bold(),
        Grade::C => grade.as_str().yellow().bold(),
        Grade::D | Grade::F => grade.as_str().red().bold(),
    }
}

fn session_status_colored(status: SessionStatus) -> colored::ColoredString {
    match status {
        SessionStatus::Passed => status.as_str().green().bold(),
        SessionStatus::Partial => status.as_str().yellow().bold(),
        SessionStatus::Failed => status.as_str().red().bold(),
        SessionStatus::Running => status.as_str().dimmed(),
    }
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verbosity(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    fn normal(&self) -> bool {
        self.verbosity != Verbosity::Quiet
    }

    fn verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    pub fn cycle_started(&self, cycle: u32, total: Option<u32>) {
        if self.normal() {
            let label = match total {
                Some(total) => format!("Cycle {cycle}/{total}"),
                None => format!("Cycle {cycle}"),
            };
            println!("\n{}", label.bold().underline());
        }
    }

    pub fn run_started(&self, session_id: &str, suites: usize, cases: usize) {
        if self.normal() {
            println!(
                "{} {} ({} suite{}, {} case{})",
                "Running session".bold(),
                session_id.dimmed(),
                suites,
                if suites == 1 { "" } else { "s" },
                cases,
                if cases == 1 { "" } else { "s" },
            );
        }
    }

    pub fn suite_started(&self, suite: &str, cases: usize) {
        if self.normal() {
            println!("\n  {} {}", suite.bold(), format!("({cases} cases)").dimmed());
        }
    }

    /// Formats one case line.
    pub fn case_line(
        case_id: &str,
        route: &str,
        status: CaseStatus,
        duration_ms: Option<f64>,
        attempts: u32,
    ) -> String {
        let timing = duration_ms.map_or_else(String::new, |d| format!(" ({d:.0} ms)"));
        let retries = if attempts > 1 {
            format!(" [{attempts} attempts]")
        } else {
            String::new()
        };
        format!(
            "    {} {case_id} {}{}{}",
            status_mark(status),
            route.dimmed(),
            timing.dimmed(),
            retries.yellow()
        )
    }

    pub fn case_completed(
        &self,
        case_id: &str,
        route: &str,
        status: CaseStatus,
        duration_ms: Option<f64>,
        attempts: u32,
    ) {
        let interesting = matches!(status, CaseStatus::Failed | CaseStatus::Error);
        if self.verbose() || (self.normal() && interesting) {
            println!(
                "{}",
                Self::case_line(case_id, route, status, duration_ms, attempts)
            );
        }
    }

    pub fn suite_failed(&self, suite: &str, error: &str) {
        // Shown at every verbosity.
        eprintln!("  {} {}: {}", "SUITE FAILED".red().bold(), suite, error);
    }

    pub fn load_completed(&self, suite: &str, result: &LoadResult) {
        if self.normal() {
            println!(
                "    {} {suite}: {} dispatched, {} failed, {:.1} req/s, p95 {:.0} ms",
                "LOAD".cyan(),
                result.dispatched,
                result.failed,
                result.requests_per_second,
                result.latency.p95_ms
            );
        }
    }

    pub fn session_completed(&self, session_id: &str, status: SessionStatus, pass_rate: f64) {
        if self.normal() {
            println!(
                "\n  Session {} {} ({pass_rate:.1}% passed)",
                session_id.dimmed(),
                session_status_colored(status)
            );
        }
    }

    /// One-line verdict used in quiet mode and after continuous cycles.
    pub fn verdict_line(summary: &RunSummary) -> String {
        let state = match &summary.state {
            RunState::Completed => summary
                .session_status
                .map_or_else(|| "completed".normal(), session_status_colored),
            RunState::Failed { phase, .. } => format!("failed in {phase}").red().bold(),
            other => other.as_str().dimmed(),
        };
        let score = match (summary.overall_score, summary.grade) {
            (Some(score), Some(grade)) => format!(", score {score:.1} {}", grade_colored(grade)),
            _ => String::new(),
        };
        format!(
            "cycle {}: {state}, {:.1}% passed{score}",
            summary.cycle, summary.pass_rate
        )
    }

    /// Full summary of one cycle.
    pub fn print_summary(&self, summary: &RunSummary) {
        if !self.normal() {
            println!("{}", Self::verdict_line(summary));
            return;
        }

        println!("\n{}", "=".repeat(48).dimmed());
        println!("{}", Self::verdict_line(summary).bold());
        if let Some(id) = &summary.session_id {
            println!("   Session:          {id}");
        }
        println!("   Environment:      {}", summary.environment);
        if let Some(level) = summary.risk_level {
            println!("   Risk level:       {level}");
        }
        if summary.critical_issues > 0 {
            println!(
                "   Critical issues:  {}",
                summary.critical_issues.to_string().red()
            );
        }
        if let RunState::Failed { phase, message } = &summary.state {
            println!("   {} {phase}: {message}", "Phase failed:".red());
        }
        let incomplete = summary.phases.incomplete();
        if !incomplete.is_empty() {
            let names: Vec<&str> = incomplete.iter().map(|p| p.as_str()).collect();
            println!("   Incomplete:       {}", names.join(", ").yellow());
        }
        for artifact in &summary.artifacts {
            println!("   {} {}", "Artifact:".dimmed(), artifact.display());
        }
        println!(
            "   {}",
            format!("Completed in {:.1}s", summary.duration_ms() as f64 / 1000.0).dimmed()
        );
    }
}

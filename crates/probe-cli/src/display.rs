//! Bridges engine and orchestrator events onto the terminal reporter.

use std::sync::Arc;

use colored::Colorize;
use probe_core::{EngineEvent, ExecutionPlan, OrchestratorCallback, OrchestratorEvent, ProgressCallback};
use probe_proto::Flow;
use probe_report::TerminalReporter;

pub fn progress_callback(reporter: Arc<TerminalReporter>) -> ProgressCallback {
    Box::new(move |event| on_engine_event(&reporter, event))
}

pub fn event_callback(reporter: Arc<TerminalReporter>) -> OrchestratorCallback {
    Box::new(move |event| on_orchestrator_event(&reporter, event))
}

pub fn on_engine_event(reporter: &TerminalReporter, event: EngineEvent) {
    match event {
        EngineEvent::RunStarted {
            session_id,
            suites,
            cases,
        } => reporter.run_started(&session_id, suites, cases),
        EngineEvent::SuiteStarted { suite, cases } => reporter.suite_started(&suite, cases),
        EngineEvent::CaseCompleted {
            case_id,
            route,
            status,
            duration_ms,
            attempts,
            ..
        } => reporter.case_completed(&case_id, &route, status, duration_ms, attempts),
        EngineEvent::SuiteFailed { suite, error } => reporter.suite_failed(&suite, &error),
        EngineEvent::LoadCompleted { suite, result } => reporter.load_completed(&suite, &result),
        EngineEvent::SuiteCompleted { suite, metrics } => {
            tracing::debug!(
                suite = %suite,
                passed = metrics.passed,
                failed = metrics.failed,
                errored = metrics.errored,
                "suite completed"
            );
        }
        EngineEvent::SessionCompleted {
            session_id,
            status,
            pass_rate,
        } => reporter.session_completed(&session_id, status, pass_rate),
    }
}

pub fn on_orchestrator_event(reporter: &TerminalReporter, event: OrchestratorEvent) {
    match event {
        OrchestratorEvent::CycleStarted { cycle, total } => reporter.cycle_started(cycle, total),
        OrchestratorEvent::PhaseStarted { cycle, phase } => {
            tracing::debug!(cycle, %phase, "phase started");
        }
        OrchestratorEvent::CycleFinished { summary } => reporter.print_summary(&summary),
        OrchestratorEvent::RetryScheduled { cycle, delay_ms } => {
            eprintln!("{}", retry_line(cycle, delay_ms));
        }
        OrchestratorEvent::Stopped { cycles_run } => {
            tracing::info!(cycles_run, "orchestrator stopped");
        }
    }
}

pub fn retry_line(cycle: u32, delay_ms: u64) -> String {
    format!(
        "  {} cycle {cycle} failed, retrying in {:.1}s",
        "RETRY".yellow().bold(),
        delay_ms as f64 / 1000.0
    )
}

/// Lines printed by `probe list`: suites in run order, then flows.
pub fn plan_lines(plan: &ExecutionPlan, flows: &[Flow]) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} ({} suites, {} cases)",
        "Execution plan".bold(),
        plan.len(),
        plan.total_cases()
    ));
    for (position, entry) in plan.entries.iter().enumerate() {
        let mut line = format!(
            "  {:>2}. {} [{}] {} cases",
            position + 1,
            entry.name,
            entry.priority,
            entry.cases
        );
        if entry.skipped_cases > 0 {
            line.push_str(&format!(", {} skipped", entry.skipped_cases));
        }
        if entry.load_requests > 0 {
            line.push_str(&format!(", load burst of {} requests", entry.load_requests));
        }
        lines.push(line);
    }

    if !flows.is_empty() {
        lines.push(format!("{} ({})", "Flows".bold(), flows.len()));
        for flow in flows {
            lines.push(format!("  - {} ({} steps)", flow.name, flow.steps.len()));
            for step in &flow.steps {
                lines.push(format!("      {} {} {}", step.method, step.endpoint, step.name.dimmed()));
            }
        }
    }
    lines
}

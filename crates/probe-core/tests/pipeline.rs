//! Full single-cycle pipeline: execution, flows, analysis, reporting and
//! monitoring, with the report's machine-readable envelope read back.

use std::sync::Arc;

use probe_core::testing::{MockReply, MockTransport};
use probe_core::{
    AssertionEngine, DataAnalyzer, ExecutionEngine, FlowRunner, MemoryHistoryStore, Orchestrator,
};
use probe_proto::{
    Environment, Flow, FlowStep, HttpMethod, Phase, PhaseLog, RunState, Suite, TestCase,
};
use probe_report::{
    Envelope, MemorySink, ReportConfiguration, ReportGenerator, ReportWriter, parse_snapshot,
};
use serde_json::json;

fn env() -> Environment {
    Environment::new("pipeline", "http://api.test").with_retries(0)
}

fn mock() -> MockTransport {
    MockTransport::new()
        .with_secure_headers()
        .on_get("/produtos", MockReply::ok(json!([{"id": 1}, {"id": 2}])))
        .on_post("/produtos", MockReply::json(201, json!({"id": 42})))
        .on_get("/produtos/42", MockReply::ok(json!({"id": 42, "nome": "Cafe"})))
        .on_get("/estoque", MockReply::json(500, json!({"error": "down"})))
}

fn suites() -> Vec<Suite> {
    vec![
        Suite::new("catalog")
            .with_case(TestCase::get("list", "/produtos"))
            .with_case(TestCase::post("create", "/produtos", json!({"nome": "Cafe"})).expect_status([201])),
        Suite::new("stock").with_case(TestCase::get("levels", "/estoque")),
    ]
}

fn flow() -> Flow {
    Flow::new("create and read product")
        .step(
            FlowStep::new("create", HttpMethod::Post, "/produtos")
                .with_body(json!({"nome": "Cafe"}))
                .producing("produto")
                .expect_status(201),
        )
        .step(FlowStep::new("read", HttpMethod::Get, "/produtos/{produto_id}").expect_status(200))
}

#[tokio::test]
async fn test_single_cycle_writes_report_and_monitoring_plan() {
    let mock = mock();
    let sink = Arc::new(MemorySink::new());
    let config = ReportConfiguration::default().with_envelopes(Envelope::ALL.to_vec());
    let engine = ExecutionEngine::new(Arc::new(mock.clone()), AssertionEngine::new());

    let orchestrator = Orchestrator::new(env(), engine)
        .with_suites(suites())
        .with_flows(vec![flow()])
        .with_report(ReportGenerator::new(config), ReportWriter::new(sink.clone()))
        .with_history(Box::new(MemoryHistoryStore::new()));

    let summary = orchestrator.run_single().await;

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.critical_issues, 0);
    assert!(summary.overall_score.is_some());
    assert!(Phase::ALL.iter().all(|p| summary.phases.is_complete(*p)));

    let id = summary.session_id.clone().unwrap();
    for ext in ["txt", "html", "md", "json", "monitoring.json"] {
        assert!(
            sink.get(&format!("{id}.{ext}")).is_some(),
            "missing artifact {id}.{ext}"
        );
    }
    assert_eq!(summary.artifacts.len(), 5);

    // The flow resolved the captured id into the second step's path.
    assert_eq!(mock.calls_to("/produtos/42"), 1);

    let snapshot = parse_snapshot(&sink.get_string(&format!("{id}.json")).unwrap()).unwrap();
    let analysis = snapshot.analysis.unwrap();
    assert_eq!(analysis.session_id, id);
    assert_eq!(analysis.flows.len(), 1);
    assert!(analysis.flows[0].passed);
    assert!((analysis.overall_score - summary.overall_score.unwrap()).abs() < 1e-6);

    let session = snapshot.session.unwrap();
    assert!((session.results.pass_rate - summary.pass_rate).abs() < 1e-6);

    let plan: serde_json::Value =
        serde_json::from_str(&sink.get_string(&format!("{id}.monitoring.json")).unwrap()).unwrap();
    assert_eq!(plan["session_id"], json!(id));
    assert!(plan["alerts"].as_array().is_some_and(|a| !a.is_empty()));
}

#[tokio::test]
async fn test_json_envelope_round_trips_scores() {
    let mock = mock();
    let engine = ExecutionEngine::new(Arc::new(mock.clone()), AssertionEngine::new());
    let session = engine.run(&env(), &suites()).await.unwrap();
    let flows = FlowRunner::new(Arc::new(mock)).run_all(&env(), &[flow()]).await;
    let analysis = DataAnalyzer::default().analyze(&session, &flows, &[]).unwrap();

    let mut phases = PhaseLog::new();
    for phase in [Phase::Initializing, Phase::Executing, Phase::Analyzing] {
        phases.complete(phase);
    }
    let generator = ReportGenerator::default();
    let report = generator.generate(Some(&analysis), Some(&session), &phases);
    let json = generator.render(&report, Envelope::Json).unwrap();
    let parsed = parse_snapshot(&json).unwrap().analysis.unwrap();

    assert!((parsed.overall_score - analysis.overall_score).abs() < 1e-6);
    assert_eq!(parsed.insights.len(), analysis.insights.len());
    for (before, after) in analysis.insights.iter().zip(&parsed.insights) {
        assert_eq!(before.dimension, after.dimension);
        assert!((before.score - after.score).abs() < 1e-6);
        for (name, value) in &before.metrics {
            assert!((after.metrics[name] - value).abs() < 1e-6, "metric {name}");
        }
    }
    for (before, after) in analysis.risk.factors.iter().zip(&parsed.risk.factors) {
        assert!((before.score - after.score).abs() < 1e-6);
    }
}

#[tokio::test]
async fn test_generator_is_idempotent() {
    let mock = mock();
    let engine = ExecutionEngine::new(Arc::new(mock), AssertionEngine::new());
    let session = engine.run(&env(), &suites()).await.unwrap();
    let analysis = DataAnalyzer::default().analyze(&session, &[], &[]).unwrap();

    let generator = ReportGenerator::default();
    let phases = PhaseLog::new();
    for envelope in Envelope::ALL {
        let first = generator.render(&generator.generate(Some(&analysis), Some(&session), &phases), envelope);
        let second = generator.render(&generator.generate(Some(&analysis), Some(&session), &phases), envelope);
        assert_eq!(first.unwrap(), second.unwrap(), "{envelope} output differs");
    }
}

#[tokio::test]
async fn test_grades_agree_across_layers() {
    let mock = mock();
    let engine = ExecutionEngine::new(Arc::new(mock), AssertionEngine::new());
    let session = engine.run(&env(), &suites()).await.unwrap();
    let analysis = DataAnalyzer::default().analyze(&session, &[], &[]).unwrap();

    for insight in &analysis.insights {
        assert_eq!(insight.grade, probe_proto::grade(insight.score));
    }
    assert_eq!(analysis.overall_grade, probe_proto::grade(analysis.overall_score));

    let report = ReportGenerator::default().generate(Some(&analysis), Some(&session), &PhaseLog::new());
    let text = ReportGenerator::default().render(&report, Envelope::Text).unwrap();
    assert!(text.contains(&format!("{:.1} ({})", analysis.overall_score, analysis.overall_grade)));
}

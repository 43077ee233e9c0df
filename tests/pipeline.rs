//! End-to-end tests of the research → preferences → report → revision
//! pipeline through [`LearningService`], with stubbed providers.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

use learning_harness::error::LearningError;
use learning_harness::research::Aggregator;
use learning_harness::service::ResearchRequest;
use learning_harness::session::InMemorySessionStore;
use learning_harness_core::models::{Category, PreferenceOverrides};
use learning_harness_core::report::NO_RESEARCH_DATA;

use common::*;

fn research_request(topic: &str) -> ResearchRequest {
    ResearchRequest {
        topic: topic.to_string(),
        objectives: vec!["understand qubits".to_string()],
        session_id: None,
    }
}

fn answers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn count_reference(report: &str, source_id: &str) -> usize {
    let bullet = format!("- {}", source_id);
    references_section(report)
        .lines()
        .filter(|line| line.trim() == bullet)
        .count()
}

#[tokio::test]
async fn test_quantum_computing_report() {
    let tmp = TempDir::new().unwrap();
    let service = quantum_service(tmp.path());

    let research = service
        .research(research_request("Quantum Computing"))
        .await
        .unwrap();
    assert_eq!(research.documents.len(), 3);
    assert_eq!(
        research.summary,
        "Found 3 relevant sources on Quantum Computing"
    );

    let prefs = service
        .analyze_preferences(
            &answers(&[("familiarity", "Beginner"), ("format", "Code examples")]),
            Some(&research.session_id),
        )
        .await
        .unwrap();
    assert!(prefs.include_code);

    let report = service
        .generate_report(&research.session_id, &PreferenceOverrides::default())
        .await
        .unwrap();

    assert!(report.starts_with("# Learning Report: Quantum Computing"));
    for heading in [
        "# Overview of Quantum Computing",
        "## Learning Objectives",
        "## Key Concepts",
        "## Qubits",
        "## Quantum Gates",
        "### Code Example: Qubits",
        "## Check Your Understanding",
        "## Additional Resources",
        "## References",
    ] {
        assert!(report.contains(heading), "missing heading {heading}");
    }

    for source in [WEB_1, WEB_2, PAPER] {
        assert_eq!(count_reference(&report, source), 1, "reference {source}");
    }

    let summary = service.get_session(&research.session_id).await.unwrap();
    assert!(summary.has_index);
    assert!(summary.has_report);
    assert_eq!(summary.topic.as_deref(), Some("Quantum Computing"));
}

#[tokio::test]
async fn test_all_providers_failing_yields_empty_research() {
    let tmp = TempDir::new().unwrap();
    let service = service_with(
        tmp.path(),
        failing_aggregator(),
        Arc::new(ScriptedGenerator::default()),
    );

    let research = service
        .research(research_request("Quantum Computing"))
        .await
        .unwrap();
    assert!(research.documents.is_empty());
    assert_eq!(
        research.summary,
        "Found 0 relevant sources on Quantum Computing"
    );

    let summary = service.get_session(&research.session_id).await.unwrap();
    assert!(!summary.has_index);
}

#[tokio::test]
async fn test_failed_video_keeps_web_and_academic() {
    let tmp = TempDir::new().unwrap();
    let service = quantum_service(tmp.path());

    let research = service
        .research(research_request("Quantum Computing"))
        .await
        .unwrap();
    let categories: Vec<Category> = research.documents.iter().map(|d| d.category).collect();
    assert_eq!(
        categories,
        vec![Category::Web, Category::Web, Category::Academic]
    );
}

#[tokio::test]
async fn test_report_without_research_data() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::default());
    let service = service_with(tmp.path(), failing_aggregator(), generator.clone());

    let research = service.research(research_request("Rust")).await.unwrap();
    let report = service
        .generate_report(&research.session_id, &PreferenceOverrides::default())
        .await
        .unwrap();

    assert_eq!(report, NO_RESEARCH_DATA);
    assert_eq!(
        generator.calls.load(std::sync::atomic::Ordering::SeqCst),
        0
    );
    let summary = service.get_session(&research.session_id).await.unwrap();
    assert!(!summary.has_report);
}

#[tokio::test]
async fn test_modify_report_follows_feedback() {
    let tmp = TempDir::new().unwrap();
    let service = quantum_service(tmp.path());

    let research = service
        .research(research_request("Quantum Computing"))
        .await
        .unwrap();
    let original = service
        .generate_report(&research.session_id, &PreferenceOverrides::default())
        .await
        .unwrap();

    let shorter = service
        .modify_report(&research.session_id, "Make the key concepts shorter")
        .await
        .unwrap();
    let more_code = service
        .modify_report(&research.session_id, "Add more code examples")
        .await
        .unwrap();

    assert!(shorter.starts_with("# Learning Report"));
    assert!(more_code.starts_with("# Learning Report"));
    assert_ne!(shorter, original);
    assert_ne!(shorter, more_code);
    assert!(more_code.contains("Add more code examples"));

    let summary = service.get_session(&research.session_id).await.unwrap();
    assert_eq!(summary.feedback_count, 2);
}

#[tokio::test]
async fn test_generation_failure_keeps_previous_state() {
    let tmp = TempDir::new().unwrap();
    let service = service_with(tmp.path(), quantum_aggregator(), Arc::new(BrokenGenerator));

    let research = service
        .research(research_request("Quantum Computing"))
        .await
        .unwrap();
    let err = service
        .generate_report(&research.session_id, &PreferenceOverrides::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LearningError::GenerationFailure(_)));

    let summary = service.get_session(&research.session_id).await.unwrap();
    assert!(!summary.has_report);
}

#[tokio::test]
async fn test_preference_overrides_apply() {
    let tmp = TempDir::new().unwrap();
    let service = quantum_service(tmp.path());

    let research = service
        .research(research_request("Quantum Computing"))
        .await
        .unwrap();
    let overrides: PreferenceOverrides =
        serde_json::from_str(r#"{"include_visuals": true}"#).unwrap();
    let report = service
        .generate_report(&research.session_id, &overrides)
        .await
        .unwrap();

    assert!(report.contains("### Visual Aid: Qubits"));
    assert!(!report.contains("### Code Example"));
}

#[tokio::test]
async fn test_research_into_started_session() {
    let tmp = TempDir::new().unwrap();
    let service = quantum_service(tmp.path());

    let session_id = service.start_session(None).await.unwrap();
    let research = service
        .research(ResearchRequest {
            topic: "Quantum Computing".to_string(),
            objectives: vec![],
            session_id: Some(session_id.clone()),
        })
        .await
        .unwrap();
    assert_eq!(research.session_id, session_id);

    let err = service
        .research(ResearchRequest {
            topic: "Quantum Computing".to_string(),
            objectives: vec![],
            session_id: Some("session_missing".to_string()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LearningError::SessionNotFound(_)));
}

#[tokio::test]
async fn test_invalid_requests() {
    let tmp = TempDir::new().unwrap();
    let service = quantum_service(tmp.path());

    let err = service.research(research_request("   ")).await.unwrap_err();
    assert!(matches!(err, LearningError::InvalidRequest(_)));

    let err = service
        .generate_report("session_missing", &PreferenceOverrides::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LearningError::SessionNotFound(_)));

    let err = service
        .modify_report("session_missing", "more detail")
        .await
        .unwrap_err();
    assert!(matches!(err, LearningError::SessionNotFound(_)));

    let research = service
        .research(research_request("Quantum Computing"))
        .await
        .unwrap();
    let err = service
        .modify_report(&research.session_id, "  ")
        .await
        .unwrap_err();
    assert!(matches!(err, LearningError::InvalidRequest(_)));

    let err = service
        .analyze_preferences(&HashMap::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LearningError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let tmp = TempDir::new().unwrap();
    let rust_only = Aggregator::new(
        ok_source(
            "web",
            Category::Web,
            &[("https://example.com/borrowck", "The borrow checker enforces ownership rules.")],
        ),
        failing_source("academic", Category::Academic),
        failing_source("video", Category::Video),
    );
    let quantum = quantum_service(tmp.path());
    let rust = service_with(
        tmp.path(),
        rust_only,
        Arc::new(ScriptedGenerator::default()),
    );

    let q = quantum
        .research(research_request("Quantum Computing"))
        .await
        .unwrap();
    let r = rust.research(research_request("Rust")).await.unwrap();
    assert_ne!(q.session_id, r.session_id);

    let report = rust
        .generate_report(&r.session_id, &PreferenceOverrides::default())
        .await
        .unwrap();
    assert_eq!(count_reference(&report, "https://example.com/borrowck"), 1);
    assert_eq!(count_reference(&report, WEB_1), 0);
}

#[tokio::test]
async fn test_end_session_deletes_index() {
    let tmp = TempDir::new().unwrap();
    let service = quantum_service(tmp.path());

    let research = service
        .research(research_request("Quantum Computing"))
        .await
        .unwrap();
    let index = index_file(tmp.path(), &research.session_id);
    assert!(index.exists());

    service.end_session(&research.session_id).await.unwrap();
    assert!(!index.exists());
    assert!(matches!(
        service.get_session(&research.session_id).await,
        Err(LearningError::SessionNotFound(_))
    ));
    assert!(matches!(
        service.end_session(&research.session_id).await,
        Err(LearningError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_expired_sessions_are_purged_with_their_index() {
    let tmp = TempDir::new().unwrap();
    let service = service_with_store(
        tmp.path(),
        Arc::new(InMemorySessionStore::with_ttl(Some(0))),
        quantum_aggregator(),
        Arc::new(ScriptedGenerator::default()),
    );

    let research = service
        .research(research_request("Quantum Computing"))
        .await
        .unwrap();
    let index = index_file(tmp.path(), &research.session_id);
    assert!(index.exists());

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(service.purge_expired_sessions().await.unwrap(), 1);
    assert!(!index.exists());
    assert!(matches!(
        service.get_session(&research.session_id).await,
        Err(LearningError::SessionNotFound(_))
    ));
    assert_eq!(service.purge_expired_sessions().await.unwrap(), 0);
}

#[tokio::test]
async fn test_active_sessions_survive_purge() {
    let tmp = TempDir::new().unwrap();
    let service = service_with_store(
        tmp.path(),
        Arc::new(InMemorySessionStore::with_ttl(Some(3600))),
        quantum_aggregator(),
        Arc::new(ScriptedGenerator::default()),
    );

    let research = service
        .research(research_request("Quantum Computing"))
        .await
        .unwrap();
    assert_eq!(service.purge_expired_sessions().await.unwrap(), 0);
    assert!(index_file(tmp.path(), &research.session_id).exists());
    assert!(service.get_session(&research.session_id).await.unwrap().has_index);
}

//! # Backend Contract Tests
//!
//! The same scenarios run against every local backend. Any divergence in
//! results or error kinds between memory, filesystem and redb is a bug.

#![allow(clippy::unwrap_used, clippy::panic)]

use mlgate_core::model::{
    DataClassification, DataDescriptor, FieldDescriptor, GoalDescriptor, LabelDescriptor,
    MetricDescriptor, ProblemType,
};
use mlgate_core::{
    Artifact, ArtifactBody, ArtifactStore, Context, Evidence, EvidenceMetadata, EvidenceValue,
    Filter, MlgateError, Namespace, NegotiationCard, Persistable, QaCategory, Query, Report,
    TestCase, TestResults, TestSuite, TestSuiteValidator, Validator, WriteOptions,
    create_artifact_store,
};
use tempfile::TempDir;

// =============================================================================
// FIXTURES
// =============================================================================

/// One store per local backend. The temp dir must outlive the stores.
fn stores() -> (TempDir, Vec<ArtifactStore>) {
    let dir = tempfile::tempdir().expect("temp dir");
    let fs = format!("fs://{}", dir.path().join("fs").display());
    let db = format!("rdbs+redb://{}", dir.path().join("artifacts.redb").display());
    let stores = vec![
        create_artifact_store("memory://").expect("memory store"),
        create_artifact_store(&fs).expect("fs store"),
        create_artifact_store(&db).expect("redb store"),
    ];
    (dir, stores)
}

fn ctx() -> Context {
    Context::new("ns", "m", "v1").expect("context")
}

fn card() -> NegotiationCard {
    let mut card = NegotiationCard::default();
    card.system.problem_type = ProblemType::Detection;
    card.system.task = Some("Find defects in weld images".into());
    card.system.goals.push(GoalDescriptor {
        description: Some("Catch defects early".into()),
        metrics: vec![MetricDescriptor {
            description: Some("recall".into()),
            baseline: Some("0.8".into()),
        }],
    });
    card.system.risks.fn_ = Some("A defect ships".into());
    card.data.push(DataDescriptor {
        description: Some("Labelled welds".into()),
        classification: DataClassification::Cui,
        labels: vec![LabelDescriptor {
            description: Some("defect".into()),
            percentage: Some(12.5),
        }],
        fields: vec![FieldDescriptor {
            name: Some("image".into()),
            field_type: Some("png".into()),
            ..FieldDescriptor::default()
        }],
        ..DataDescriptor::default()
    });
    card.model.development_compute_resources.gpu = Some("1".into());
    card.model.production_compute_resources.memory = Some("8Gi".into());
    card
}

fn suite() -> TestSuite {
    TestSuite::new(
        vec![QaCategory::new("performance").with_description("How well it predicts")],
        vec![
            TestCase::new("recall")
                .with_qa_category("performance")
                .with_validator(Validator::greater_or_equal_to(0.8)),
            TestCase::new("latency_ms").with_validator(Validator::less_than(50.0)),
        ],
    )
    .expect("suite")
}

fn evidence(test_case: &str, value: EvidenceValue) -> Evidence {
    value.with_metadata(EvidenceMetadata::new(test_case, "measurement"))
}

fn sorted(mut keys: Vec<String>) -> Vec<String> {
    keys.sort();
    keys
}

// =============================================================================
// CONTAINERS
// =============================================================================

#[test]
fn container_errors_match_across_backends() {
    let (_dir, stores) = stores();
    for store in &stores {
        let uri = &store.uri().uri;
        store
            .with_session(|s| {
                let mut namespaces = s.namespace_mapper()?;
                namespaces.create(Namespace::new("ns")?)?;
                assert!(
                    matches!(
                        namespaces.create(Namespace::new("ns")?),
                        Err(MlgateError::AlreadyExists(_))
                    ),
                    "{uri}"
                );
                assert!(
                    matches!(namespaces.read("ghost"), Err(MlgateError::NotFound(_))),
                    "{uri}"
                );
                assert!(
                    matches!(namespaces.delete("ghost"), Err(MlgateError::NotFound(_))),
                    "{uri}"
                );

                let err = s.model_mapper("ghost")?.list().unwrap_err();
                assert_eq!(err, MlgateError::not_found("namespace", "ghost"), "{uri}");
                Ok(())
            })
            .expect("session");
    }
}

#[test]
fn keys_cannot_reach_outside_their_container() {
    let (_dir, stores) = stores();
    let v2 = Context::new("ns", "m", "v2").expect("context");
    for store in &stores {
        let uri = &store.uri().uri;
        store
            .with_session(|s| {
                s.create_context(&ctx())?;
                let card1 = Artifact::from_body("card1", ArtifactBody::NegotiationCard(card()))?;
                s.write_artifact(&v2, card1, WriteOptions::default().with_parents())?;

                for key in ["../v2/card1", "..", "", "a/b", "..\\v2\\card1"] {
                    assert!(
                        matches!(s.read_artifact(&ctx(), key), Err(MlgateError::NotFound(_))),
                        "{uri} read {key:?}"
                    );
                    assert!(
                        matches!(s.delete_artifact(&ctx(), key), Err(MlgateError::NotFound(_))),
                        "{uri} delete {key:?}"
                    );
                    assert!(
                        matches!(s.namespace_mapper()?.delete(key), Err(MlgateError::NotFound(_))),
                        "{uri} namespace {key:?}"
                    );
                }
                assert_eq!(s.list_artifacts(&v2)?, vec!["card1"], "{uri}");

                let err = s.model_mapper("..").and_then(|mut m| m.list()).unwrap_err();
                assert_eq!(err, MlgateError::not_found("namespace", ".."), "{uri}");
                let err = s.version_mapper("ns", "../..").and_then(|mut m| m.list()).unwrap_err();
                assert_eq!(err, MlgateError::not_found("model", "../.."), "{uri}");
                assert_eq!(s.namespace_mapper()?.list()?, vec!["ns"], "{uri}");
                Ok(())
            })
            .expect("session");
    }
}

#[test]
fn listing_is_the_same_set_everywhere() {
    let (_dir, stores) = stores();
    let mut listings = Vec::new();
    for store in &stores {
        let keys = store
            .with_session(|s| {
                for ns in ["zeta", "alpha", "mid"] {
                    s.namespace_mapper()?.create(Namespace::new(ns)?)?;
                }
                s.namespace_mapper()?.list()
            })
            .expect("session");
        listings.push(sorted(keys));
    }
    assert!(listings.iter().all(|l| *l == ["alpha", "mid", "zeta"]));
}

// =============================================================================
// ARTIFACTS
// =============================================================================

#[test]
fn card1_lifecycle_is_identical_on_every_backend() {
    let (_dir, stores) = stores();
    for store in &stores {
        let uri = &store.uri().uri;
        store
            .with_session(|s| {
                s.create_context(&ctx())?;
                let card1 = Artifact::from_body("card1", ArtifactBody::NegotiationCard(card()))?;
                s.write_artifact(&ctx(), card1.clone(), WriteOptions::default())?;

                assert_eq!(s.list_artifacts(&ctx())?, vec!["card1"], "{uri}");
                assert_eq!(s.read_artifact(&ctx(), "card1")?, card1, "{uri}");

                assert_eq!(s.delete_artifact(&ctx(), "card1")?, card1, "{uri}");
                assert_eq!(
                    s.read_artifact(&ctx(), "card1").unwrap_err(),
                    MlgateError::not_found("artifact", "card1"),
                    "{uri}"
                );
                assert!(
                    matches!(s.delete_artifact(&ctx(), "card1"), Err(MlgateError::NotFound(_))),
                    "{uri}"
                );
                assert!(s.list_artifacts(&ctx())?.is_empty(), "{uri}");
                Ok(())
            })
            .expect("session");
    }
}

#[test]
fn non_finite_values_are_refused_everywhere() {
    let (_dir, stores) = stores();
    for store in &stores {
        let uri = &store.uri().uri;
        store.with_session(|s| s.create_context(&ctx())).expect("context");

        for value in [
            EvidenceValue::Real(f64::NAN),
            EvidenceValue::Real(f64::INFINITY),
            EvidenceValue::Array(vec![0.5, f64::NEG_INFINITY]),
        ] {
            let err = evidence("recall", value).save_with(&ctx(), store).unwrap_err();
            assert!(matches!(err, MlgateError::Validation(_)), "{uri}: {err:?}");
        }
        let bad_suite = TestSuite::new(
            vec![],
            vec![TestCase::new("t").with_validator(Validator::in_range(0.0, f64::NAN))],
        );
        assert!(matches!(bad_suite, Err(MlgateError::Validation(_))), "{uri}");

        let stored = store.with_session(|s| s.list_artifacts(&ctx())).expect("list");
        assert!(stored.is_empty(), "{uri}");
    }
}

#[test]
fn negotiation_card_round_trips_under_a_version() {
    let (_dir, stores) = stores();
    for store in &stores {
        let uri = &store.uri().uri;
        store.with_session(|s| s.create_context(&ctx())).expect("context");

        card().save_with(&ctx(), store).expect("save");
        assert_eq!(NegotiationCard::load_with(&ctx(), store).expect("load"), card(), "{uri}");

        assert!(
            matches!(card().save_with(&ctx(), store), Err(MlgateError::AlreadyExists(_))),
            "{uri}"
        );
    }
}

#[test]
fn artifacts_read_back_identically_on_every_backend() {
    let (_dir, stores) = stores();
    let written = vec![
        Artifact::from_body(NegotiationCard::DEFAULT_ID, ArtifactBody::NegotiationCard(card()))
            .expect("card")
            .with_creator("ana"),
        Artifact::from_body(TestSuite::DEFAULT_ID, ArtifactBody::TestSuite(suite()))
            .expect("suite"),
        Artifact::from_body(
            "evidence.recall",
            ArtifactBody::Evidence(evidence("recall", EvidenceValue::Real(0.91))),
        )
        .expect("evidence"),
        Artifact::from_body(
            "evidence.confusion",
            ArtifactBody::Evidence(evidence(
                "confusion",
                EvidenceValue::Opaque(serde_json::json!({"tp": 9, "fp": 1})),
            )),
        )
        .expect("opaque evidence"),
    ];

    let mut read_back = Vec::new();
    for store in &stores {
        let artifacts = store
            .with_session(|s| {
                for artifact in &written {
                    s.write_artifact(&ctx(), artifact.clone(), WriteOptions::default().with_parents())?;
                }
                let keys = sorted(s.list_artifacts(&ctx())?);
                keys.iter().map(|k| s.read_artifact(&ctx(), k)).collect::<Result<Vec<_>, _>>()
            })
            .expect("session");
        read_back.push(artifacts);
    }

    let mut expected = written.clone();
    expected.sort_by(|a, b| a.identifier().cmp(b.identifier()));
    for (store, artifacts) in stores.iter().zip(&read_back) {
        assert_eq!(*artifacts, expected, "{}", store.uri().uri);
    }
}

#[test]
fn forced_write_replaces_and_search_filters() {
    let (_dir, stores) = stores();
    for store in &stores {
        let uri = &store.uri().uri;
        store
            .with_session(|s| {
                let options = WriteOptions::default().with_parents();
                let first = Report {
                    summary: Some("draft".into()),
                    ..Report::default()
                };
                let artifact = Artifact::from_body(Report::DEFAULT_ID, ArtifactBody::Report(first))?;
                s.write_artifact(&ctx(), artifact, options)?;

                let second = Report {
                    summary: Some("final".into()),
                    ..Report::default()
                };
                let artifact = Artifact::from_body(Report::DEFAULT_ID, ArtifactBody::Report(second.clone()))?;
                s.write_artifact(&ctx(), artifact, WriteOptions::force())?;

                let evidence = Artifact::from_body(
                    "evidence.recall",
                    ArtifactBody::Evidence(evidence("recall", EvidenceValue::Integer(1))),
                )?;
                s.write_artifact(&ctx(), evidence, options)?;

                let hits = s.search_artifacts(&ctx(), &Query::new(Filter::item_type("report")))?;
                assert_eq!(hits.len(), 1, "{uri}");
                assert_eq!(hits[0].body(), &ArtifactBody::Report(second), "{uri}");

                let none = s.search_artifacts(&ctx(), &Query::new(Filter::identifier("ghost")))?;
                assert!(none.is_empty(), "{uri}");
                Ok(())
            })
            .expect("session");
    }
}

#[test]
fn deleting_a_version_drops_its_artifacts() {
    let (_dir, stores) = stores();
    for store in &stores {
        let uri = &store.uri().uri;
        store
            .with_session(|s| {
                let report = Artifact::from_body("r", ArtifactBody::Report(Report::default()))?;
                s.write_artifact(&ctx(), report, WriteOptions::default().with_parents())?;

                s.version_mapper("ns", "m")?.delete("v1")?;
                assert!(s.version_mapper("ns", "m")?.list()?.is_empty(), "{uri}");
                assert!(
                    matches!(s.list_artifacts(&ctx()), Err(MlgateError::NotFound(_))),
                    "{uri}"
                );

                s.create_context(&ctx())?;
                assert!(s.list_artifacts(&ctx())?.is_empty(), "{uri}");
                Ok(())
            })
            .expect("session");
    }
}

// =============================================================================
// VALIDATION RESULTS
// =============================================================================

#[test]
fn test_results_persist_with_their_suite() {
    let (_dir, stores) = stores();
    for store in &stores {
        let uri = &store.uri().uri;
        store.with_session(|s| s.create_context(&ctx())).expect("context");
        suite().save_with(&ctx(), store).expect("save suite");

        let stored_suite = TestSuite::load_with(&ctx(), store).expect("load suite");
        let mut validator = TestSuiteValidator::new(&stored_suite);
        validator
            .add_evidence_list([
                evidence("recall", EvidenceValue::Real(0.85)),
                evidence("latency_ms", EvidenceValue::Integer(75)),
            ])
            .expect("evidence");
        let results = validator.validate().expect("validate");
        assert!(results.result("recall").is_some_and(|r| r.is_success()), "{uri}");
        assert!(results.result("latency_ms").is_some_and(|r| r.is_failure()), "{uri}");

        results.save_with(&ctx(), store).expect("save results");
        let loaded = TestResults::load_with(&ctx(), store).expect("load results");
        assert_eq!(loaded, results, "{uri}");
        assert_eq!(loaded.test_suite_id(), TestSuite::DEFAULT_ID, "{uri}");
        assert!(!loaded.passed(), "{uri}");

        store
            .with_session(|s| s.delete_artifact(&ctx(), TestResults::DEFAULT_ID))
            .expect("delete results");
        assert!(
            matches!(TestResults::load_with(&ctx(), store), Err(MlgateError::NotFound(_))),
            "{uri}"
        );
        assert_eq!(TestSuite::load_with(&ctx(), store).expect("suite survives"), stored_suite);
    }
}

#[test]
fn results_for_a_suite_stored_elsewhere_still_load() {
    let (_dir, stores) = stores();
    for store in &stores {
        let uri = &store.uri().uri;
        store.with_session(|s| s.create_context(&ctx())).expect("context");

        // No suite artifact in this version: the category lookup finds nothing.
        let mut validator = TestSuiteValidator::new(&suite()).with_test_suite_id("shared.suite");
        validator
            .add_evidence(evidence("recall", EvidenceValue::Array(vec![0.81, 0.9])))
            .expect("recall");
        validator
            .add_evidence(evidence("latency_ms", EvidenceValue::Real(12.0)))
            .expect("latency");
        let results = validator.validate().expect("validate");

        results.save_with(&ctx(), store).expect("save");
        let loaded = TestResults::load_with(&ctx(), store).expect("load");
        assert_eq!(loaded, results, "{uri}");
        assert!(loaded.passed(), "{uri}");
    }
}

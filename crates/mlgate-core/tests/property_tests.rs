//! # Property-Based Tests
//!
//! Invariants of the query language, the validators and the result set,
//! checked with proptest.

#![allow(clippy::unwrap_used, clippy::panic)]

use indexmap::IndexMap;
use mlgate_core::{
    EvidenceValue, Filter, Namespace, Query, ResultType, TestCase, TestResults, TestSuite,
    ValidationResult, Validator, create_artifact_store,
};
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use serde_json::Value;
use std::collections::BTreeSet;

// =============================================================================
// STRATEGIES
// =============================================================================

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}"
}

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z ]{0,12}".prop_map(Value::from),
    ]
}

fn filter() -> impl Strategy<Value = Filter> {
    let leaf = prop_oneof![
        Just(Filter::All),
        Just(Filter::None),
        ident().prop_map(Filter::identifier),
        ident().prop_map(Filter::item_type),
        (ident(), ident()).prop_map(|(n, v)| Filter::tag(n, v)),
        (ident(), json_leaf()).prop_map(|(n, v)| Filter::property(n, v)),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..4).prop_map(Filter::and),
            vec(inner, 0..4).prop_map(Filter::or),
        ]
    })
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Every filter tree survives JSON unchanged.
    #[test]
    fn query_round_trips_through_json(filter in filter()) {
        let query = Query::new(filter);
        let json = serde_json::to_string(&query).expect("serialize");
        let back: Query = serde_json::from_str(&json).expect("deserialize");
        prop_assert_eq!(back, query);
    }

    /// Searching is the same as filtering the full listing.
    #[test]
    fn search_matches_filtering_the_listing(
        ids in btree_set(ident(), 0..12),
        wanted in vec(ident(), 0..4),
    ) {
        let store = create_artifact_store("memory://").expect("store");
        let session = store.session();
        let mut namespaces = session.namespace_mapper().expect("mapper");
        for id in &ids {
            namespaces.create(Namespace::new(id.clone()).expect("namespace")).expect("create");
        }

        let filter = Filter::or(wanted.iter().cloned().map(Filter::identifier).collect());
        let hits: BTreeSet<String> = namespaces
            .search(&Query::new(filter))
            .expect("search")
            .into_iter()
            .map(|ns| ns.identifier)
            .collect();
        let expected: BTreeSet<String> =
            ids.iter().filter(|id| wanted.contains(id)).cloned().collect();
        prop_assert_eq!(hits, expected);
    }

    /// Range bounds are inclusive on both ends.
    #[test]
    fn in_range_includes_its_bounds(low in -1e6f64..1e6, width in 0.0f64..1e6) {
        let high = low + width;
        let range = Validator::in_range(low, high);
        prop_assert!(range.validate(&EvidenceValue::Real(low)).is_success());
        prop_assert!(range.validate(&EvidenceValue::Real(high)).is_success());
        prop_assert!(range.validate(&EvidenceValue::Real(high + 1.0)).is_failure());
    }

    /// Negation flips success and failure.
    #[test]
    fn negation_flips_the_verdict(threshold in -1e3f64..1e3, value in -1e3f64..1e3) {
        let plain = Validator::less_than(threshold).validate(&EvidenceValue::Real(value));
        let negated = Validator::negate(Validator::less_than(threshold))
            .validate(&EvidenceValue::Real(value));
        prop_assert_eq!(plain.is_success(), negated.is_failure());
    }

    /// Integers and reals of the same value get the same verdict.
    #[test]
    fn integers_compare_like_reals(threshold in -1000i64..1000, value in -1000i64..1000) {
        let validator = Validator::greater_or_equal_to(threshold as f64);
        let as_int = validator.validate(&EvidenceValue::Integer(value));
        let as_real = validator.validate(&EvidenceValue::Real(value as f64));
        prop_assert_eq!(as_int.result_type, as_real.result_type);
    }

    /// Results are accepted exactly when their keys equal the suite's cases.
    #[test]
    fn results_must_cover_the_suite_exactly(
        cases in btree_set(ident(), 1..6),
        answered in btree_set(ident(), 0..6),
    ) {
        let suite = TestSuite::new(vec![], cases.iter().map(TestCase::new).collect())
            .expect("suite");
        let results: IndexMap<String, ValidationResult> = answered
            .iter()
            .map(|id| (id.clone(), ValidationResult::new(ResultType::Info, "noted")))
            .collect();

        let built = TestResults::new("suite", Some(suite), results);
        prop_assert_eq!(built.is_ok(), cases == answered);
    }
}

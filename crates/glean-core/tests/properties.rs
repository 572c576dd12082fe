//! Property tests for the pure parts of the core: quality scoring and
//! strategy selection.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use glean_core::quality;
use glean_core::{Capability, Parameters, StrategyRegistry};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn arb_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec![
            "word", "Sentence.", "cookie", "data", "Question?", "lorem ipsum", " ", "ünïcödé",
        ]),
        0..200,
    )
    .prop_map(|parts| parts.join(" "))
}

fn arb_structured() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z]{1,8}", "[a-z]{0,4}", 0..12).prop_map(|m| {
        m.into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect()
    })
}

fn with_fields(n: usize) -> Map<String, Value> {
    (0..n).map(|i| (format!("field_{i}"), json!(i))).collect()
}

proptest! {
    #[test]
    fn score_is_bit_identical_for_identical_input(text in arb_text(), structured in arb_structured()) {
        let payload = json!({ "text": text });
        let a = quality::score(&payload, &structured);
        let b = quality::score(&payload, &structured);
        prop_assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn score_is_within_unit_interval(text in arb_text(), structured in arb_structured()) {
        let s = quality::score(&json!(text), &structured);
        prop_assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn score_is_monotonic_in_field_count(text in arb_text(), n in 0usize..40) {
        let payload = json!({ "text": text });
        let fewer = quality::score(&payload, &with_fields(n));
        let more = quality::score(&payload, &with_fields(n + 1));
        prop_assert!(more >= fewer);
    }

    #[test]
    fn strategy_selection_is_deterministic(
        hint in prop::option::of(prop::sample::select(vec![
            "http.plain", "http.stealth", "browser.headless", "search.fanout", "nope",
        ])),
        render_js in any::<bool>(),
    ) {
        let registry = StrategyRegistry::default();
        let params: Parameters = json!({"url": "https://example.com", "render_js": render_js})
            .as_object()
            .cloned()
            .unwrap();
        let first = registry.select(Capability::Extract, &params, hint).unwrap();
        for _ in 0..5 {
            let again = registry.select(Capability::Extract, &params, hint).unwrap();
            prop_assert_eq!(&again, &first);
        }
    }
}

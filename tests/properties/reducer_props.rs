use std::collections::HashSet;

use proptest::prelude::*;
use serde_json::{Value, json};

use docsearch::search::{ReducerVariant, SearchAction, SearchState, reduce};

fn arb_rows() -> impl Strategy<Value = Value> {
    prop::collection::vec((0i64..50, "/[a-d]{1,2}"), 0..6).prop_map(|rows| {
        Value::Array(
            rows.into_iter()
                .map(|(id, path)| json!({ "id": id, "path": path, "type": "markdown", "title": path }))
                .collect(),
        )
    })
}

fn arb_action() -> impl Strategy<Value = SearchAction> {
    prop_oneof![
        Just(SearchAction::Triggered),
        Just(SearchAction::Errored),
        Just(SearchAction::Reset),
        (arb_rows(), any::<bool>()).prop_map(|(results, still_outstanding)| {
            SearchAction::Completed {
                results,
                still_outstanding,
            }
        }),
    ]
}

fn arb_variant() -> impl Strategy<Value = ReducerVariant> {
    prop_oneof![Just(ReducerVariant::LocalOnly), Just(ReducerVariant::RemoteFallback)]
}

fn run(actions: &[SearchAction], variant: ReducerVariant) -> SearchState {
    actions
        .iter()
        .fold(SearchState::Initial, |state, action| reduce(state, action, variant))
}

proptest! {
    #[test]
    fn reducer_is_total(actions in prop::collection::vec(arb_action(), 0..24), variant in arb_variant()) {
        let _ = run(&actions, variant);
    }

    #[test]
    fn reset_always_yields_initial(
        actions in prop::collection::vec(arb_action(), 0..24),
        variant in arb_variant(),
    ) {
        let state = run(&actions, variant);
        prop_assert_eq!(reduce(state, &SearchAction::Reset, variant), SearchState::Initial);
    }

    #[test]
    fn results_are_unique_by_path(
        actions in prop::collection::vec(arb_action(), 0..24),
        variant in arb_variant(),
    ) {
        let mut state = SearchState::Initial;
        for action in &actions {
            state = reduce(state, action, variant);
            let paths: Vec<&str> = state.results().iter().map(|r| r.path.as_str()).collect();
            let unique: HashSet<&str> = paths.iter().copied().collect();
            prop_assert_eq!(unique.len(), paths.len());
        }
    }

    #[test]
    fn completed_before_triggered_is_ignored(rows in arb_rows(), variant in arb_variant()) {
        let state = reduce(SearchState::Initial, &SearchAction::completed(rows), variant);
        prop_assert_eq!(state, SearchState::Initial);
    }
}

use proptest::prelude::*;
use serde_json::{Value, json};

use docsearch::search::normalize;

const PAGE_TYPES: [&str; 5] = ["markdown", "discussion", "partner-integration", "reference", "video"];

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        ".{0,12}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::hash_map("[a-z]{1,8}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

/// Rows that are mostly well-formed, with optional heading/slug arrays of
/// independent lengths.
fn arb_row() -> impl Strategy<Value = Value> {
    (
        any::<i64>(),
        "/[a-z]{1,10}",
        prop::sample::select(PAGE_TYPES.to_vec()),
        ".{0,16}",
        prop::option::of(prop::collection::vec("[a-z ]{1,8}", 0..4)),
        prop::option::of(prop::collection::vec("[a-z-]{1,8}", 0..4)),
    )
        .prop_map(|(id, path, page_type, title, headings, slugs)| {
            let mut row = json!({ "id": id, "path": path, "type": page_type, "title": title });
            if let Some(headings) = headings {
                row["headings"] = json!(headings);
            }
            if let Some(slugs) = slugs {
                row["slugs"] = json!(slugs);
            }
            row
        })
}

proptest! {
    #[test]
    fn normalize_never_panics(raw in arb_json()) {
        let _ = normalize(&raw);
    }

    #[test]
    fn headings_only_when_lengths_match(rows in prop::collection::vec(arb_row(), 0..8)) {
        let results = normalize(&Value::Array(rows.clone()));
        for result in &results {
            let raw = rows
                .iter()
                .find(|row| row["path"] == result.path.as_str() && row["id"] == result.id)
                .expect("result comes from an input row");
            match (raw["headings"].as_array(), raw["slugs"].as_array()) {
                (Some(h), Some(s)) if h.len() == s.len() => {
                    prop_assert_eq!(result.headings.as_ref().map(Vec::len), Some(h.len()));
                }
                _ => prop_assert!(result.headings.is_none()),
            }
        }
    }

    #[test]
    fn unknown_types_are_dropped(rows in prop::collection::vec(arb_row(), 0..8)) {
        let valid = rows.iter().filter(|row| row["type"] != "video").count();
        prop_assert_eq!(normalize(&Value::Array(rows)).len(), valid);
    }
}

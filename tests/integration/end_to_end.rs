use std::collections::HashSet;
use std::time::Duration;

use docsearch::search::{ActionKind, SearchState, StateKind};

use crate::fixture::{Fixture, local_coordinator, settle};

fn drain(actions: &mut tokio::sync::broadcast::Receiver<ActionKind>) -> Vec<ActionKind> {
    std::iter::from_fn(|| actions.try_recv().ok()).collect()
}

fn paths(state: &SearchState) -> Vec<String> {
    state.results().iter().map(|r| r.path.clone()).collect()
}

#[tokio::test]
async fn local_search_returns_unique_ranked_results() {
    let fixture = Fixture::seeded();
    let coordinator = local_coordinator(fixture.options()).await;
    let mut actions = coordinator.store().actions();

    coordinator.search("auth");
    settle(&coordinator).await;

    let state = coordinator.store().state();
    assert_eq!(state.kind(), StateKind::Results);
    assert_eq!(
        drain(&mut actions),
        vec![ActionKind::Triggered, ActionKind::Completed]
    );

    let found = paths(&state);
    let unique: HashSet<_> = found.iter().collect();
    assert_eq!(unique.len(), found.len(), "duplicate paths in {found:?}");
    assert_eq!(found.first().map(String::as_str), Some("/guides/auth"));
    assert!(found.contains(&"/guides/row-level-security".to_string()));
    assert!(!found.contains(&"/reference/errors".to_string()));
}

#[tokio::test]
async fn local_search_with_no_match_is_empty() {
    let fixture = Fixture::seeded();
    let coordinator = local_coordinator(fixture.options()).await;

    coordinator.search("zzzznomatch");
    settle(&coordinator).await;

    assert_eq!(coordinator.store().state(), SearchState::Empty);
}

#[tokio::test]
async fn error_code_query_finds_reference_page() {
    let fixture = Fixture::seeded();
    let coordinator = local_coordinator(fixture.options()).await;

    coordinator.search("PGRST116");
    settle(&coordinator).await;

    let state = coordinator.store().state();
    assert_eq!(paths(&state), vec!["/reference/errors"]);
    assert_eq!(state.results()[0].title, "Error codes");
}

#[tokio::test]
async fn follow_up_query_replaces_local_results() {
    let fixture = Fixture::seeded();
    let coordinator = local_coordinator(fixture.options()).await;

    coordinator.search("auth");
    settle(&coordinator).await;
    coordinator.search("PGRST116");
    settle(&coordinator).await;

    assert_eq!(paths(&coordinator.store().state()), vec!["/reference/errors"]);
}

#[tokio::test]
async fn stale_local_reply_does_not_replace_newer_query() {
    let fixture = Fixture::seeded();
    let coordinator = local_coordinator(fixture.options()).await;
    let mut actions = coordinator.store().actions();

    coordinator.search("PGRST116");
    // Block the runtime so the engine answers the first query before the
    // second is posted; the reply waits in the channel.
    std::thread::sleep(Duration::from_millis(300));
    coordinator.search("auth");
    settle(&coordinator).await;

    let expect_auth = |state: &SearchState| {
        let found = paths(state);
        assert_eq!(found.first().map(String::as_str), Some("/guides/auth"), "{found:?}");
        assert!(found.contains(&"/guides/row-level-security".to_string()));
        assert!(!found.contains(&"/reference/errors".to_string()));
    };
    expect_auth(&coordinator.store().state());
    assert_eq!(
        drain(&mut actions),
        vec![ActionKind::Triggered, ActionKind::Triggered, ActionKind::Completed]
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    expect_auth(&coordinator.store().state());
    assert!(drain(&mut actions).is_empty());
}

#[tokio::test]
async fn engine_query_failure_surfaces_as_error() {
    let fixture = Fixture::seeded();
    {
        let conn = rusqlite::Connection::open(&fixture.db_path).unwrap();
        conn.execute_batch("DROP TABLE page_section;").unwrap();
    }
    let coordinator = local_coordinator(fixture.options()).await;
    let mut actions = coordinator.store().actions();

    coordinator.search("auth");
    settle(&coordinator).await;

    assert_eq!(coordinator.store().state(), SearchState::Error);
    assert_eq!(
        drain(&mut actions),
        vec![ActionKind::Triggered, ActionKind::Errored]
    );
}

#[tokio::test]
async fn reset_after_results_returns_to_initial() {
    let fixture = Fixture::seeded();
    let coordinator = local_coordinator(fixture.options()).await;

    coordinator.search("auth");
    settle(&coordinator).await;
    assert_eq!(coordinator.store().state().kind(), StateKind::Results);

    coordinator.reset();
    settle(&coordinator).await;

    assert_eq!(coordinator.store().state(), SearchState::Initial);
    assert!(coordinator.engine().unwrap().aborts_posted() >= 1);
}

#[tokio::test]
async fn deleted_pages_are_not_found() {
    let fixture = Fixture::seeded();
    {
        let db = docsearch::storage::Database::open(&fixture.db_path).unwrap();
        assert!(db.delete_page("/reference/errors").unwrap());
        assert_eq!(db.page_count().unwrap(), 2);
    }
    let coordinator = local_coordinator(fixture.options()).await;

    coordinator.search("PGRST116");
    settle(&coordinator).await;

    assert_eq!(coordinator.store().state(), SearchState::Empty);
}

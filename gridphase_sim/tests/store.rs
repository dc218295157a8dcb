//! Persistence tests against a scratch directory.

use gridphase_core::{simulate, AnomalyMetrics, Leaderboards, RunConfig};
use gridphase_sim::{BatchRunner, EngineContext, FixedConfig, RunStore, StoreError};
use std::fs;
use tempfile::tempdir;

fn small_config(steps: u64) -> RunConfig {
    RunConfig {
        steps,
        ..Default::default()
    }
}

#[test]
fn test_run_files_are_write_once() {
    let dir = tempdir().unwrap();
    let store = RunStore::new(dir.path()).unwrap();

    let record = simulate(&small_config(100)).unwrap();
    let scores = AnomalyMetrics::default().score_run(&record);

    store.write_run("run_000000", &record, &scores).unwrap();
    let second = store.write_run("run_000000", &record, &scores);
    assert!(matches!(second, Err(StoreError::AlreadyStored(_))));

    let export = store.read_run("run_000000").unwrap();
    assert_eq!(export.trajectory.len(), 100);
    assert_eq!(export.events, record.events);
    assert_eq!(export.scores.checks, scores.checks);
    assert!(export.scores.scores.keys().eq(scores.scores.keys()));
}

#[test]
fn test_missing_and_corrupt_categories_load_empty() {
    let dir = tempdir().unwrap();
    let store = RunStore::new(dir.path()).unwrap();

    assert!(store.load_category("randomness").is_empty());

    fs::write(store.category_path("structure"), "{ not json").unwrap();
    assert!(store.load_category("structure").is_empty());

    let mut boards = Leaderboards::new(4);
    store.load_all(&mut boards);
    assert!(boards.query("structure", 10).is_empty());
}

#[test]
fn test_checkpoint_roundtrip_and_retention() {
    let dir = tempdir().unwrap();

    // Capacity 1: only the best run per category survives retention.
    let mut runner = BatchRunner::new(EngineContext::new(1, 1))
        .with_store(RunStore::new(dir.path()).unwrap());
    let configs = vec![small_config(50), small_config(120), small_config(300)];
    let outcomes = runner.run_batch(configs);
    assert!(outcomes.iter().all(|o| o.passed && o.persisted));

    runner.checkpoint().unwrap();

    let store = RunStore::new(dir.path()).unwrap();
    let leaderboards = runner.context().leaderboards();
    let kept = store.stored_runs().unwrap();
    assert_eq!(
        kept.into_iter().collect::<std::collections::BTreeSet<_>>(),
        leaderboards.referenced_runs()
    );

    let mut restored = Leaderboards::new(1);
    store.load_all(&mut restored);
    for category in leaderboards.categories() {
        let ids = |boards: &Leaderboards| -> Vec<String> {
            boards.query(category, 1).iter().map(|e| e.run_id.clone()).collect()
        };
        let (before, after) = (ids(leaderboards), ids(&restored));
        assert_eq!(before, after, "category {}", category);
    }

    assert_eq!(store.next_run_counter(&restored).unwrap(), 3);
}

#[test]
fn test_resumed_session_continues_numbering() {
    let dir = tempdir().unwrap();
    {
        let mut runner = BatchRunner::new(EngineContext::new(1, 10))
            .with_store(RunStore::new(dir.path()).unwrap());
        runner.run_policy(&mut FixedConfig::new(small_config(40)), 2);
        runner.checkpoint().unwrap();
    }

    let store = RunStore::new(dir.path()).unwrap();
    let mut context = EngineContext::new(1, 10);
    store.load_all(context.leaderboards_mut());
    let next = store.next_run_counter(context.leaderboards()).unwrap();
    let mut runner = BatchRunner::new(context.with_run_counter(next)).with_store(store);

    let outcome = runner.run_config(small_config(40));
    assert_eq!(outcome.run_id, "run_000002");
    assert!(outcome.persisted);
}

#[test]
fn test_stale_partial_write_does_not_block_run() {
    let dir = tempdir().unwrap();
    let store = RunStore::new(dir.path()).unwrap();

    // Leftover from an interrupted write.
    let partial = store.run_path("run_000000").with_extension("json.tmp");
    fs::write(&partial, "{ \"run_id\": \"run_0").unwrap();
    assert!(store.stored_runs().unwrap().is_empty());

    let record = simulate(&small_config(30)).unwrap();
    let scores = AnomalyMetrics::default().score_run(&record);
    store.write_run("run_000000", &record, &scores).unwrap();

    assert!(!partial.exists());
    assert_eq!(store.stored_runs().unwrap(), vec!["run_000000".to_string()]);
    assert_eq!(store.read_run("run_000000").unwrap().trajectory.len(), 30);
}

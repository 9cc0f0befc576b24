//! Concurrent load against the routed data path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rls_harness::harness::Sessions;
use rls_harness::routing::{Pattern, RouteKey, RoutingTable, Rule, SharedRouter};
use rls_harness::storage::{scan_rows, AdminClient, DataClient, MemoryStore, Mutation, Timestamp};

mod common;
use common::{rule, store_with_table, test_config};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_routed_writes() {
    let mut config = test_config();
    config.routing.rules = vec![rule("method=MutateRow", "dns:///writer"), rule("*", "dns:///reader")];
    let store = store_with_table(&config).await;
    let sessions = Sessions::connect_emulated(&config, store.clone()).unwrap();

    let concurrency = 16;
    let writes_per_task = 25;
    let start = Instant::now();

    let mut tasks = Vec::new();
    for task in 0..concurrency {
        let data = sessions.data.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..writes_per_task {
                let key = format!("load_{:02}_{:03}", task, i);
                let m = Mutation::new().set("cf1", "greeting", Timestamp::now(), key.clone());
                data.apply_mutation("rls-test-table", &key, m).await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    let elapsed = start.elapsed();

    let rows = scan_rows(&sessions.data, "rls-test-table", "load_")
        .with_page_size(7)
        .collect()
        .await
        .unwrap();
    assert_eq!(rows.len(), concurrency * writes_per_task);
    assert!(rows.windows(2).all(|w| w[0].key < w[1].key));

    println!(
        "{} routed writes in {:?} ({:.0} writes/s)",
        rows.len(),
        elapsed,
        rows.len() as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );

    store.delete_table("rls-test-table").await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_resolves_stay_consistent_during_reloads() {
    let router = SharedRouter::new(RoutingTable::new(vec![Rule::new(Pattern::wildcard(), "T0")], None));
    let key = RouteKey::new().with("service", "A");

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let router = router.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let deadline = Instant::now() + Duration::from_millis(200);
                let mut seen = 0usize;
                while Instant::now() < deadline {
                    // Every published table routes this key somewhere.
                    let target = router.resolve(&key).unwrap().target;
                    assert!(target.starts_with('T'));
                    seen += 1;
                    tokio::task::yield_now().await;
                }
                seen
            })
        })
        .collect();

    for generation in 1..=50 {
        let table = RoutingTable::new(
            vec![Rule::new(Pattern::parse("service=A").unwrap(), format!("T{}", generation))],
            None,
        );
        router.replace(table);
        tokio::task::yield_now().await;
    }

    for reader in readers {
        assert!(reader.await.unwrap() > 0);
    }
    assert_eq!(router.resolve(&key).unwrap().target, "T50");
}

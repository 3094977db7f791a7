// tests/single_child_property.rs
//
// Whatever mix of changes, crashes and restart requests arrives, the
// supervisor never has two children alive and never spawns over a live one.

mod common;
use crate::common::{changed, fast_options, spawn_supervisor, FakeBackend};

use std::time::Duration;

use proptest::prelude::*;
use watchserve::engine::RuntimeEvent;

#[derive(Debug, Clone)]
enum Op {
    Change,
    Crash(i32),
    Restart,
    Pause(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Change),
        2 => (0..3i32).prop_map(Op::Crash),
        2 => Just(Op::Restart),
        3 => (0..15u64).prop_map(Op::Pause),
    ]
}

fn run_scenario(ops: Vec<Op>, stubborn: bool) -> (usize, usize, usize) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    rt.block_on(async move {
        let backend = FakeBackend::new();
        backend.set_ignore_term(stubborn);
        let (tx, handle) =
            spawn_supervisor(backend.clone(), fast_options(5), Duration::from_millis(20));

        for op in ops {
            match op {
                Op::Change => tx.send(changed("app.py")).await.unwrap(),
                Op::Crash(code) => backend.crash_current(code),
                Op::Restart => tx.send(RuntimeEvent::RestartRequested).await.unwrap(),
                Op::Pause(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
            }
            tokio::task::yield_now().await;
        }

        tx.send(RuntimeEvent::ShutdownRequested).await.unwrap();
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("supervisor did not shut down")
            .unwrap()
            .unwrap();

        (
            backend.max_alive(),
            backend.overlapping_spawns(),
            backend.alive(),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn at_most_one_child_is_ever_alive(
        ops in proptest::collection::vec(op_strategy(), 0..40),
        stubborn in any::<bool>(),
    ) {
        let (max_alive, overlapping, alive_at_end) = run_scenario(ops, stubborn);
        prop_assert!(max_alive <= 1, "max alive = {}", max_alive);
        prop_assert_eq!(overlapping, 0);
        prop_assert_eq!(alive_at_end, 0);
    }
}

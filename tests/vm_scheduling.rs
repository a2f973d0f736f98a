//! Context-pool scheduling tests
//!
//! Verifies least-loaded placement across the pool and that load counts
//! are released when threads finish or are stopped.

use marionette::{ObjectId, StopReason, VirtualMachine, VmConfig, VmEvent};
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);
const SPIN: &str = "while (true) { let x = 1; }";

fn config(contexts: usize) -> VmConfig {
    VmConfig {
        contexts,
        tick: Duration::from_millis(1),
        steps_per_tick: 1,
    }
}

#[tokio::test]
async fn threads_spread_across_the_pool() {
    let (vm, _events) = VirtualMachine::new(config(3)).expect("vm");

    let placements: Vec<usize> = (0..4)
        .map(|n| vm.run(ObjectId::new(format!("agent-{n}")), SPIN).context)
        .collect();

    // Each context fills before any takes a second thread; ties go to the
    // lowest index.
    assert_eq!(placements, vec![0, 1, 2, 0]);
    assert_eq!(vm.loads(), vec![2, 1, 1]);
}

#[tokio::test]
async fn completed_threads_release_their_slot() {
    let (vm, mut events) = VirtualMachine::new(config(2)).expect("vm");
    let agent = ObjectId::new("walker");

    vm.run(agent.clone(), "let x = 1;");
    loop {
        let event = timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for completion")
            .expect("event stream closed");
        if let VmEvent::Stopped { reason, .. } = event {
            assert_eq!(reason, StopReason::Completed);
            break;
        }
    }

    assert_eq!(vm.loads(), vec![0, 0]);

    // The freed slot is reused before the pool doubles up.
    let a = vm.run(ObjectId::new("a"), SPIN);
    let b = vm.run(ObjectId::new("b"), SPIN);
    assert_eq!(a.context, 0);
    assert_eq!(b.context, 1);
}

#[tokio::test]
async fn stopping_releases_the_slot() {
    let (vm, _events) = VirtualMachine::new(config(2)).expect("vm");

    let a = ObjectId::new("a");
    let b = ObjectId::new("b");
    vm.run(a.clone(), SPIN);
    vm.run(b.clone(), SPIN);
    assert_eq!(vm.loads(), vec![1, 1]);

    assert!(vm.stop(&a));
    assert_eq!(vm.loads(), vec![0, 1]);

    // A replacement lands on the now-empty context.
    let c = vm.run(ObjectId::new("c"), SPIN);
    assert_eq!(c.context, 0);
}

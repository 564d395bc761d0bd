//! Worker teardown. Kept in its own binary so `live_workers` only counts
//! the workers started here.

use std::time::{Duration, Instant};

use skein_thread::{
    Controller, DropPolicy, Portable, TaskBody, TaskStatus, ThreadConfig, ThreadQueue, encode,
    live_workers,
};

fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn gated_task() -> TaskBody {
    TaskBody::compile("let q = ...\nq.pop()\nreturn 1\n", "gated").expect("task should compile")
}

#[test]
fn detached_and_dropped_workers_tear_down() {
    assert_eq!(live_workers(), 0);

    let gate = ThreadQueue::new(1);
    let handle = Controller::default()
        .spawn(gated_task(), vec![Portable::Queue(gate.clone())])
        .expect("spawn");
    wait_until("worker to start", || live_workers() == 1);

    handle.detach().expect("detach");
    assert_eq!(live_workers(), 1);
    gate.push(encode(&[]).expect("encode")).expect("open gate");
    wait_until("worker to finish", || handle.is_finished());
    wait_until("worker to exit", || live_workers() == 0);
    assert_eq!(handle.status(), TaskStatus::Detached);
    drop(handle);

    let detaching = Controller::new(ThreadConfig {
        drop_policy: DropPolicy::Detach,
        ..ThreadConfig::default()
    });
    let handle = detaching
        .spawn(gated_task(), vec![Portable::Queue(gate.clone())])
        .expect("spawn");
    wait_until("second worker to start", || live_workers() == 1);
    drop(handle);
    assert_eq!(live_workers(), 1);

    gate.push(encode(&[]).expect("encode")).expect("open gate");
    wait_until("dropped worker to exit", || live_workers() == 0);

    let joined = Controller::default()
        .spawn(gated_task(), vec![Portable::Queue(gate.clone())])
        .expect("spawn");
    gate.push(encode(&[]).expect("encode")).expect("open gate");
    assert!(joined.join().expect("join").is_done());
    assert_eq!(live_workers(), 0);
}

use std::thread;
use std::time::Duration;

use skein_thread::{
    Controller, Outcome, Portable, QueueError, TaskBody, ThreadQueue, decode, encode,
};

fn item(n: f64) -> skein_thread::Payload {
    encode(&[Portable::Number(n)]).expect("encode")
}

#[test]
fn blocked_pop_is_woken_by_push() {
    let q = ThreadQueue::new(1);
    let consumer = {
        let q = q.clone();
        thread::spawn(move || q.pop())
    };
    thread::sleep(Duration::from_millis(20));
    q.push(item(5.0)).expect("push");

    let payload = consumer.join().expect("consumer").expect("pop");
    assert_eq!(decode(&payload).expect("decode"), vec![Portable::Number(5.0)]);
}

#[test]
fn full_queue_blocks_producer_until_drained() {
    let q = ThreadQueue::new(1);
    q.push(item(1.0)).expect("first push");
    let producer = {
        let q = q.clone();
        thread::spawn(move || q.push(item(2.0)))
    };
    thread::sleep(Duration::from_millis(20));
    assert_eq!(q.len(), 1);

    q.pop().expect("drain");
    producer.join().expect("producer").expect("second push");
    assert_eq!(decode(&q.pop().expect("pop")).expect("decode"), vec![Portable::Number(2.0)]);
}

#[test]
fn interrupt_wakes_blocked_callers_only() {
    let q = ThreadQueue::new(1);
    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let q = q.clone();
            thread::spawn(move || q.pop().map(|_| ()))
        })
        .collect();
    // A waiter that had not blocked yet is caught by a later round.
    while !waiters.iter().all(|w| w.is_finished()) {
        q.interrupt_all();
        thread::sleep(Duration::from_millis(5));
    }

    for waiter in waiters {
        assert_eq!(waiter.join().expect("waiter"), Err(QueueError::Interrupted));
    }

    // Calls made after the interrupt behave normally.
    q.push(item(3.0)).expect("push after interrupt");
    assert!(q.pop().is_ok());
}

#[test]
fn terminate_wakes_blocked_producers() {
    let q = ThreadQueue::new(1);
    q.push(item(1.0)).expect("fill");
    let producer = {
        let q = q.clone();
        thread::spawn(move || q.push(item(2.0)))
    };
    thread::sleep(Duration::from_millis(20));
    assert!(!q.is_terminated());
    q.terminate();
    assert!(q.is_terminated());
    assert_eq!(producer.join().expect("producer"), Err(QueueError::Terminated));
    assert_eq!(q.try_pop().unwrap_err().code(), "EOF");
}

#[test]
fn workers_stream_results_through_a_queue() {
    let q = ThreadQueue::new(2);
    let producer = Controller::default()
        .spawn(
            TaskBody::Source(
                "let q, n = ...\nfor i in range(n) {\n    q.push(i, i * i)\n}\nreturn n\n".into(),
            ),
            vec![Portable::Queue(q.clone()), Portable::Number(5.0)],
        )
        .expect("spawn");

    let mut squares = Vec::new();
    for _ in 0..5 {
        let values = decode(&q.pop().expect("pop")).expect("decode");
        squares.push(values);
    }
    assert_eq!(producer.join().expect("join"), Outcome::Done(vec![Portable::Number(5.0)]));
    assert_eq!(squares[3], vec![Portable::Number(3.0), Portable::Number(9.0)]);
    assert_eq!(squares.len(), 5);
}

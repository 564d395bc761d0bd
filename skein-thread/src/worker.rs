use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use skein_interpret::{Interpreter, Value};

use crate::bridge;
use crate::codec::{self, Portable, TaskBody};
use crate::environment::EnvironmentFactory;
use crate::error::{FailureKind, TaskFailure};
use crate::handle::{TaskOutput, TaskRecord};
use crate::status::TaskStatus;

/// Chunk name given to tasks shipped as source text.
pub(crate) const SOURCE_CHUNK: &str = "=thread";

static LIVE_WORKERS: AtomicUsize = AtomicUsize::new(0);

/// Worker threads that still hold their task record.
pub fn live_workers() -> usize {
    LIVE_WORKERS.load(Ordering::Acquire)
}

struct LiveWorker;

impl LiveWorker {
    fn enter() -> Self {
        LIVE_WORKERS.fetch_add(1, Ordering::AcqRel);
        LiveWorker
    }
}

impl Drop for LiveWorker {
    fn drop(&mut self) {
        LIVE_WORKERS.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Publishes an ERROR outcome if the worker unwinds before it published one.
struct PublishGuard<'a> {
    record: &'a TaskRecord,
}

impl Drop for PublishGuard<'_> {
    fn drop(&mut self) {
        if self.record.output.get().is_none() {
            self.record.fail(FailureKind::Panic, "worker thread panicked");
        }
    }
}

/// Body of every worker thread. Owns one reference to `record` until it
/// returns.
pub(crate) fn run(record: Arc<TaskRecord>) {
    let _live = LiveWorker::enter();
    let span = tracing::debug_span!("worker", task = record.id);
    let _enter = span.enter();

    let guard = PublishGuard { record: &record };
    execute(&record);
    drop(guard);
    tracing::trace!(status = %record.status.load(), "worker finished");
    drop(record);
}

fn execute(record: &TaskRecord) {
    let factory = EnvironmentFactory::new(Arc::clone(&record.config));
    let mut interp = match factory.build(&record.package) {
        Ok(interp) => interp,
        Err(e) => {
            record.fail(FailureKind::Environment, e.to_string());
            return;
        }
    };

    let (func, args) = match prepare(&mut interp, record) {
        Ok(call) => call,
        Err(failure) => {
            record.fail(failure.kind, failure.message);
            return;
        }
    };

    record.status.advance(TaskStatus::Running);
    tracing::trace!("task running");

    match interp.pcall(&func, args) {
        Ok(values) => match encode_results(&values) {
            Ok(payload) => {
                record.publish(TaskOutput::Done(payload), TaskStatus::Done);
            }
            Err(failure) => {
                record.fail(failure.kind, failure.message);
            }
        },
        Err(message) => {
            record.fail(FailureKind::Runtime, message);
        }
    }

    drop(interp);
}

fn prepare(
    interp: &mut Interpreter,
    record: &TaskRecord,
) -> Result<(Value, Vec<Value>), TaskFailure> {
    let serialization = |e: crate::SerializationError| {
        TaskFailure::new(FailureKind::Serialization, e.to_string())
    };

    let mut values = codec::decode(&record.input).map_err(serialization)?.into_iter();
    let func = match values.next() {
        Some(Portable::Task(TaskBody::Compiled(proto))) => Value::Function(proto),
        Some(Portable::Task(TaskBody::Source(src))) => interp.load(&src, SOURCE_CHUNK).map_err(|e| {
            TaskFailure::new(
                FailureKind::Compile,
                format!("{SOURCE_CHUNK}:{}: {}", e.line(), e.message()),
            )
        })?,
        Some(other) => {
            return Err(TaskFailure::new(
                FailureKind::Serialization,
                format!("expected a task at the head of the payload, found {}", other.kind()),
            ));
        }
        None => {
            return Err(TaskFailure::new(FailureKind::Serialization, "empty task payload"));
        }
    };

    Ok((func, values.map(bridge::from_portable).collect()))
}

fn encode_results(values: &[Value]) -> Result<codec::Payload, TaskFailure> {
    values
        .iter()
        .map(bridge::to_portable)
        .collect::<Result<Vec<_>, _>>()
        .and_then(|values| codec::encode(&values))
        .map_err(|e| TaskFailure::new(FailureKind::Serialization, e.to_string()))
}

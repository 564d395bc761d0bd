//! The `thread` and `queue` script modules.

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use skein_interpret::stdlib::{arg, bad_argument, check_number};
use skein_interpret::{HostObject, Interpreter, NativeFunction, RuntimeError, Value};

use crate::bridge::{from_portable, to_portable};
use crate::codec::{self, Payload, TaskBody};
use crate::config::ThreadConfig;
use crate::controller::{Controller, yield_now};
use crate::error::ThreadError;
use crate::handle::{Outcome, ThreadHandle};
use crate::queue::{QueueError, ThreadQueue};

type NativeResult = Result<Vec<Value>, RuntimeError>;

/// Script-side thread handle. Dropping it runs the handle's finalizer.
pub struct ThreadObject {
    handle: ThreadHandle,
}

impl ThreadObject {
    pub fn new(handle: ThreadHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &ThreadHandle {
        &self.handle
    }
}

impl HostObject for ThreadObject {
    fn type_name(&self) -> &'static str {
        "thread"
    }

    fn describe(&self) -> String {
        self.handle.to_string()
    }

    fn call_method(
        &self,
        interp: &mut Interpreter,
        method: &str,
        _args: Vec<Value>,
    ) -> NativeResult {
        match method {
            "join" => Ok(match self.handle.join() {
                Ok(Outcome::Done(values)) => std::iter::once(Value::Bool(true))
                    .chain(values.into_iter().map(from_portable))
                    .collect(),
                Ok(Outcome::Failed(failure)) => {
                    vec![Value::Bool(false), Value::from(failure.message)]
                }
                Err(e) => vec![Value::Nil, Value::from(e.to_string())],
            }),
            "status" => Ok(vec![Value::str(self.handle.status().as_str())]),
            "detach" => Ok(match self.handle.detach() {
                Ok(()) => vec![Value::Bool(true)],
                Err(e) => vec![Value::Nil, Value::from(e.to_string())],
            }),
            other => Err(interp.error(format!("thread has no method '{other}'"))),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Script-side queue reference. `close()` drops this reference only.
pub struct QueueObject {
    queue: RefCell<Option<ThreadQueue>>,
}

impl QueueObject {
    pub fn new(queue: ThreadQueue) -> Self {
        Self {
            queue: RefCell::new(Some(queue)),
        }
    }

    /// The underlying queue, unless this reference was closed.
    pub fn queue(&self) -> Option<ThreadQueue> {
        self.queue.borrow().clone()
    }
}

impl HostObject for QueueObject {
    fn type_name(&self) -> &'static str {
        "queue"
    }

    fn describe(&self) -> String {
        match self.queue() {
            Some(q) => format!("queue ({}/{})", q.len(), q.capacity()),
            None => "queue (closed)".to_string(),
        }
    }

    fn call_method(
        &self,
        interp: &mut Interpreter,
        method: &str,
        args: Vec<Value>,
    ) -> NativeResult {
        if method == "close" {
            self.queue.borrow_mut().take();
            return Ok(vec![Value::Bool(true)]);
        }
        let Some(queue) = self.queue() else {
            return Err(interp.error("attempt to use a closed queue"));
        };

        match method {
            "push" => {
                let item = encode_args(interp, &args)?;
                Ok(queue_status(queue.push(item)))
            }
            "trypush" => {
                let item = encode_args(interp, &args)?;
                Ok(queue_status(queue.try_push(item)))
            }
            "pop" => decode_item(interp, queue.pop()),
            "trypop" => decode_item(interp, queue.try_pop()),
            "interrupt" => {
                queue.interrupt_all();
                Ok(vec![Value::Bool(true)])
            }
            "terminate" => {
                queue.terminate();
                Ok(vec![Value::Bool(true)])
            }
            "len" => Ok(vec![Value::Number(queue.len() as f64)]),
            other => Err(interp.error(format!("queue has no method '{other}'"))),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn encode_args(interp: &Interpreter, args: &[Value]) -> Result<Payload, RuntimeError> {
    let values = args
        .iter()
        .map(to_portable)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| interp.error(e))?;
    codec::encode(&values).map_err(|e| interp.error(e))
}

fn queue_status(result: Result<(), QueueError>) -> Vec<Value> {
    match result {
        Ok(()) => vec![Value::Bool(true)],
        Err(e) => vec![Value::Nil, Value::str(e.code())],
    }
}

fn decode_item(interp: &Interpreter, result: Result<Payload, QueueError>) -> NativeResult {
    match result {
        Ok(item) => {
            let values = codec::decode(&item).map_err(|e| interp.error(e))?;
            Ok(values.into_iter().map(from_portable).collect())
        }
        Err(e) => Ok(vec![Value::Nil, Value::str(e.code())]),
    }
}

fn spawn(interp: &mut Interpreter, config: &Arc<ThreadConfig>, args: Vec<Value>) -> NativeResult {
    let mut args = args.into_iter();
    let task = match args.next().unwrap_or(Value::Nil) {
        Value::Function(proto) => TaskBody::Compiled(proto),
        Value::Str(src) => TaskBody::Source(src.to_string()),
        other => return Err(bad_argument(interp, 0, "spawn", "function or string", &other)),
    };
    let task_args = args
        .map(|v| to_portable(&v))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| interp.error(e))?;

    let controller = Controller::inheriting(Arc::clone(config), interp);
    match controller.spawn(task, task_args) {
        Ok(handle) => Ok(vec![Value::object(ThreadObject::new(handle))]),
        Err(e @ ThreadError::Resource(_)) => Ok(vec![Value::Nil, Value::from(e.to_string())]),
        Err(e) => Err(interp.error(e)),
    }
}

fn sleep(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let secs = check_number(interp, &args, 0, "sleep")?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(bad_argument(interp, 0, "sleep", "non-negative number", &arg(&args, 0)));
    }
    std::thread::sleep(Duration::from_secs_f64(secs));
    Ok(Vec::new())
}

fn new_queue(interp: &mut Interpreter, config: &ThreadConfig, args: Vec<Value>) -> NativeResult {
    let capacity = match arg(&args, 0) {
        Value::Nil => config.queue_capacity,
        Value::Number(n) if n >= 1.0 && n.fract() == 0.0 => n as usize,
        other => return Err(bad_argument(interp, 0, "new", "positive integer", &other)),
    };
    Ok(vec![Value::object(QueueObject::new(ThreadQueue::new(capacity)))])
}

fn module(functions: Vec<NativeFunction>) -> Value {
    let entries: BTreeMap<String, Value> = functions
        .into_iter()
        .map(|f| (f.name().to_string(), Value::Native(f)))
        .collect();
    Value::map(entries)
}

fn thread_module(config: Arc<ThreadConfig>) -> Value {
    module(vec![
        NativeFunction::new("spawn", move |interp, args| spawn(interp, &config, args)),
        NativeFunction::new("yield", |_, _| {
            yield_now();
            Ok(Vec::new())
        }),
        NativeFunction::new("sleep", sleep),
    ])
}

fn queue_module(config: Arc<ThreadConfig>) -> Value {
    module(vec![NativeFunction::new("new", move |interp, args| {
        new_queue(interp, &config, args)
    })])
}

/// Install the `thread` and `queue` modules into `interp`, both as globals
/// and as `require`-able native modules.
pub fn install(interp: &mut Interpreter, config: Arc<ThreadConfig>) {
    for (name, value) in [
        ("thread", thread_module(Arc::clone(&config))),
        ("queue", queue_module(config)),
    ] {
        interp.set_global(name, value.clone());
        interp.register_module(name, move |_| Ok(value.clone()));
    }
}

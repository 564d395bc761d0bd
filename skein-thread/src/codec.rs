//! Portable values and the encoded buffers they travel in.
//!
//! A [`Payload`] is self-contained apart from the queues it references: the
//! JSON envelope holds everything else, and queues ride alongside in
//! `shared`, referenced from the envelope by index.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use skein_ast::FunctionProto;

use crate::error::SerializationError;
use crate::queue::ThreadQueue;

const ENVELOPE_VERSION: u32 = 1;

/// The body of a task: a compiled function, or source text compiled by the
/// worker.
#[derive(Clone, Debug)]
pub enum TaskBody {
    Compiled(Arc<FunctionProto>),
    Source(String),
}

impl TaskBody {
    /// Compile `src` up front so syntax errors surface before any thread
    /// exists.
    pub fn compile(src: &str, chunk: &str) -> Result<Self, crate::ThreadError> {
        skein_parse::compile_chunk(src, chunk)
            .map(TaskBody::Compiled)
            .map_err(|e| {
                crate::ThreadError::Compile(format!("{chunk}:{}: {}", e.line(), e.message()))
            })
    }
}

impl PartialEq for TaskBody {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TaskBody::Compiled(a), TaskBody::Compiled(b)) => Arc::ptr_eq(a, b) || a == b,
            (TaskBody::Source(a), TaskBody::Source(b)) => a == b,
            _ => false,
        }
    }
}

/// A value that can cross a thread boundary.
#[derive(Clone, Debug)]
pub enum Portable {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<Portable>),
    Map(BTreeMap<String, Portable>),
    Task(TaskBody),
    Queue(ThreadQueue),
}

impl Portable {
    pub fn kind(&self) -> &'static str {
        match self {
            Portable::Nil => "nil",
            Portable::Bool(_) => "boolean",
            Portable::Number(_) => "number",
            Portable::Str(_) => "string",
            Portable::List(_) => "list",
            Portable::Map(_) => "map",
            Portable::Task(_) => "function",
            Portable::Queue(_) => "queue",
        }
    }
}

impl PartialEq for Portable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Portable::Nil, Portable::Nil) => true,
            (Portable::Bool(a), Portable::Bool(b)) => a == b,
            (Portable::Number(a), Portable::Number(b)) => a == b,
            (Portable::Str(a), Portable::Str(b)) => a == b,
            (Portable::List(a), Portable::List(b)) => a == b,
            (Portable::Map(a), Portable::Map(b)) => a == b,
            (Portable::Task(a), Portable::Task(b)) => a == b,
            (Portable::Queue(a), Portable::Queue(b)) => a.same_queue(b),
            _ => false,
        }
    }
}

impl From<f64> for Portable {
    fn from(n: f64) -> Self {
        Portable::Number(n)
    }
}

impl From<&str> for Portable {
    fn from(s: &str) -> Self {
        Portable::Str(s.to_string())
    }
}

impl From<bool> for Portable {
    fn from(b: bool) -> Self {
        Portable::Bool(b)
    }
}

/// An encoded tuple of portable values.
#[derive(Clone, Debug, Default)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub shared: Vec<ThreadQueue>,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
enum Wire {
    Nil,
    Bool(bool),
    /// IEEE-754 bits, so NaN, infinities and -0.0 survive.
    Number(u64),
    Str(String),
    List(Vec<Wire>),
    Map(BTreeMap<String, Wire>),
    Function(Arc<FunctionProto>),
    Source(String),
    Queue(usize),
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    values: Vec<Wire>,
}

pub fn encode(values: &[Portable]) -> Result<Payload, SerializationError> {
    let mut shared = Vec::new();
    let envelope = Envelope {
        version: ENVELOPE_VERSION,
        values: values.iter().map(|v| to_wire(v, &mut shared)).collect(),
    };
    let bytes = serde_json::to_vec(&envelope)
        .map_err(|e| SerializationError::new("payload", e.to_string()))?;
    Ok(Payload { bytes, shared })
}

pub fn decode(payload: &Payload) -> Result<Vec<Portable>, SerializationError> {
    let mut de = serde_json::Deserializer::from_slice(&payload.bytes);
    // Function bodies nest deeper than serde_json's default limit allows.
    de.disable_recursion_limit();
    let envelope = Envelope::deserialize(&mut de)
        .map_err(|e| SerializationError::new("payload", e.to_string()))?;
    de.end().map_err(|e| SerializationError::new("payload", e.to_string()))?;

    if envelope.version != ENVELOPE_VERSION {
        return Err(SerializationError::new(
            "payload",
            format!("unsupported envelope version {}", envelope.version),
        ));
    }
    envelope
        .values
        .into_iter()
        .map(|w| from_wire(w, &payload.shared))
        .collect()
}

fn to_wire(value: &Portable, shared: &mut Vec<ThreadQueue>) -> Wire {
    match value {
        Portable::Nil => Wire::Nil,
        Portable::Bool(b) => Wire::Bool(*b),
        Portable::Number(n) => Wire::Number(n.to_bits()),
        Portable::Str(s) => Wire::Str(s.clone()),
        Portable::List(items) => Wire::List(items.iter().map(|v| to_wire(v, shared)).collect()),
        Portable::Map(entries) => Wire::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), to_wire(v, shared)))
                .collect(),
        ),
        Portable::Task(TaskBody::Compiled(proto)) => Wire::Function(Arc::clone(proto)),
        Portable::Task(TaskBody::Source(src)) => Wire::Source(src.clone()),
        Portable::Queue(queue) => {
            let index = match shared.iter().position(|q| q.same_queue(queue)) {
                Some(i) => i,
                None => {
                    shared.push(queue.clone());
                    shared.len() - 1
                }
            };
            Wire::Queue(index)
        }
    }
}

fn from_wire(wire: Wire, shared: &[ThreadQueue]) -> Result<Portable, SerializationError> {
    Ok(match wire {
        Wire::Nil => Portable::Nil,
        Wire::Bool(b) => Portable::Bool(b),
        Wire::Number(bits) => Portable::Number(f64::from_bits(bits)),
        Wire::Str(s) => Portable::Str(s),
        Wire::List(items) => Portable::List(
            items
                .into_iter()
                .map(|w| from_wire(w, shared))
                .collect::<Result<_, _>>()?,
        ),
        Wire::Map(entries) => Portable::Map(
            entries
                .into_iter()
                .map(|(k, w)| Ok((k, from_wire(w, shared)?)))
                .collect::<Result<_, SerializationError>>()?,
        ),
        Wire::Function(proto) => Portable::Task(TaskBody::Compiled(proto)),
        Wire::Source(src) => Portable::Task(TaskBody::Source(src)),
        Wire::Queue(index) => Portable::Queue(
            shared
                .get(index)
                .cloned()
                .ok_or_else(|| {
                    let message = format!("payload references missing queue #{index}");
                    SerializationError::new("queue", message)
                })?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_floats_survive() {
        let payload = encode(&[
            Portable::Number(f64::NAN),
            Portable::Number(-0.0),
            Portable::Number(f64::INFINITY),
        ])
        .unwrap();
        let values = decode(&payload).unwrap();
        let [Portable::Number(nan), Portable::Number(neg_zero), Portable::Number(inf)] =
            values.as_slice()
        else {
            panic!("unexpected decode {values:?}");
        };
        assert!(nan.is_nan());
        assert!(neg_zero.is_sign_negative());
        assert_eq!(*inf, f64::INFINITY);
    }

    #[test]
    fn nested_containers_and_tasks_decode_equal() {
        let proto = skein_parse::compile_chunk("return ...\n", "echo").unwrap();
        let mut map = BTreeMap::new();
        map.insert("k".to_string(), Portable::List(vec![Portable::from("v"), Portable::Nil]));
        let values = vec![
            Portable::Task(TaskBody::Compiled(proto)),
            Portable::Map(map),
            Portable::from(true),
        ];

        assert_eq!(decode(&encode(&values).unwrap()).unwrap(), values);
    }

    #[test]
    fn one_queue_referenced_twice_is_shared_once() {
        let q = ThreadQueue::new(1);
        let nested = Portable::List(vec![Portable::Queue(q.clone())]);
        let payload = encode(&[Portable::Queue(q.clone()), nested]).unwrap();
        assert_eq!(payload.shared.len(), 1);

        let decoded = decode(&payload).unwrap();
        assert_eq!(decoded[0], Portable::Queue(q));
    }

    #[test]
    fn rejects_unknown_version_and_dangling_queue() {
        let mut payload = encode(&[Portable::Nil]).unwrap();
        payload.bytes = br#"{"version":9,"values":[]}"#.to_vec();
        let err = decode(&payload).unwrap_err();
        assert!(err.reason.contains("version 9"));

        payload.bytes = br#"{"version":1,"values":[{"t":"queue","v":3}]}"#.to_vec();
        assert_eq!(decode(&payload).unwrap_err().kind, "queue");

        payload.bytes = br#"{"version":1,"values":[{"t":"socket","v":1}]}"#.to_vec();
        let err = decode(&payload).unwrap_err();
        assert_eq!(err.kind, "payload");
        assert!(err.reason.contains("socket"), "{}", err.reason);
    }
}

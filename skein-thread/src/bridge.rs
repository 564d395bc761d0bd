//! Conversion between interpreter values and [`Portable`] values.

use std::collections::BTreeMap;
use std::rc::Rc;

use skein_interpret::Value;

use crate::bindings::{QueueObject, ThreadObject};
use crate::codec::{Portable, TaskBody};
use crate::error::SerializationError;

/// Copy `value` out of its interpreter.
///
/// Lists and maps are copied deeply. Native functions, thread handles,
/// other host objects and cyclic structures are rejected.
pub fn to_portable(value: &Value) -> Result<Portable, SerializationError> {
    let mut visiting = Vec::new();
    convert(value, &mut visiting)
}

fn convert(value: &Value, visiting: &mut Vec<*const ()>) -> Result<Portable, SerializationError> {
    Ok(match value {
        Value::Nil => Portable::Nil,
        Value::Bool(b) => Portable::Bool(*b),
        Value::Number(n) => Portable::Number(*n),
        Value::Str(s) => Portable::Str(s.to_string()),
        Value::Function(proto) => Portable::Task(TaskBody::Compiled(proto.clone())),
        Value::List(list) => {
            let ptr = Rc::as_ptr(list).cast::<()>();
            enter(ptr, "list", visiting)?;
            let items = list
                .borrow()
                .iter()
                .map(|v| convert(v, visiting))
                .collect::<Result<Vec<_>, _>>();
            visiting.pop();
            Portable::List(items?)
        }
        Value::Map(map) => {
            let ptr = Rc::as_ptr(map).cast::<()>();
            enter(ptr, "map", visiting)?;
            let entries = map
                .borrow()
                .iter()
                .map(|(k, v)| Ok((k.clone(), convert(v, visiting)?)))
                .collect::<Result<BTreeMap<_, _>, SerializationError>>();
            visiting.pop();
            Portable::Map(entries?)
        }
        Value::Native(native) => {
            return Err(SerializationError::new(
                "function",
                format!("native function '{}' cannot be sent to another thread", native.name()),
            ));
        }
        Value::Object(_) => {
            if let Some(queue) = value.downcast_object::<QueueObject>() {
                return queue
                    .queue()
                    .map(Portable::Queue)
                    .ok_or_else(|| SerializationError::new("queue", "queue is closed"));
            }
            if value.downcast_object::<ThreadObject>().is_some() {
                return Err(SerializationError::new(
                    "thread",
                    "thread handles cannot be sent to another thread",
                ));
            }
            return Err(SerializationError::new(
                value.type_name(),
                "host objects cannot be sent to another thread",
            ));
        }
    })
}

fn enter(
    ptr: *const (),
    kind: &str,
    visiting: &mut Vec<*const ()>,
) -> Result<(), SerializationError> {
    if visiting.contains(&ptr) {
        return Err(SerializationError::new(
            kind,
            "cyclic structures cannot be sent to another thread",
        ));
    }
    visiting.push(ptr);
    Ok(())
}

/// Rebuild `value` inside the receiving interpreter.
///
/// Functions become closures over the transferred body; their free names
/// resolve against the receiver's globals. Source-text tasks arrive as
/// strings.
pub fn from_portable(value: Portable) -> Value {
    match value {
        Portable::Nil => Value::Nil,
        Portable::Bool(b) => Value::Bool(b),
        Portable::Number(n) => Value::Number(n),
        Portable::Str(s) => Value::from(s),
        Portable::List(items) => Value::list(items.into_iter().map(from_portable).collect()),
        Portable::Map(entries) => Value::map(
            entries
                .into_iter()
                .map(|(k, v)| (k, from_portable(v)))
                .collect(),
        ),
        Portable::Task(TaskBody::Compiled(proto)) => Value::Function(proto),
        Portable::Task(TaskBody::Source(src)) => Value::from(src),
        Portable::Queue(queue) => Value::object(QueueObject::new(queue)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_but_acyclic_structures_are_copied() {
        let inner = Value::list(vec![Value::Number(1.0)]);
        let outer = Value::list(vec![inner.clone(), inner]);
        let portable = to_portable(&outer).unwrap();
        let one = Portable::List(vec![Portable::Number(1.0)]);
        assert_eq!(portable, Portable::List(vec![one.clone(), one]));
    }

    #[test]
    fn cycles_are_rejected() {
        let list = Value::list(Vec::new());
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        let err = to_portable(&list).unwrap_err();
        assert_eq!(err.kind, "list");
        assert!(err.reason.contains("cyclic"));

        // Break the cycle so the test does not leak.
        if let Value::List(items) = &list {
            items.borrow_mut().clear();
        }
    }

    #[test]
    fn native_functions_are_rejected() {
        let interp = skein_interpret::Interpreter::default();
        let err = to_portable(&interp.global("print")).unwrap_err();
        assert_eq!(err.kind, "function");
        assert!(err.reason.contains("'print'"));
    }
}

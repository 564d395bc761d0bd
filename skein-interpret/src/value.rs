use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use skein_ast::FunctionProto;

use crate::error::RuntimeError;
use crate::vm::Interpreter;

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type MapRef = Rc<RefCell<BTreeMap<String, Value>>>;

type NativeFnBox = dyn Fn(&mut Interpreter, Vec<Value>) -> Result<Vec<Value>, RuntimeError>;

/// A function implemented in Rust and callable from scripts.
#[derive(Clone)]
pub struct NativeFunction {
    name: Rc<str>,
    func: Rc<NativeFnBox>,
}

impl NativeFunction {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&mut Interpreter, Vec<Value>) -> Result<Vec<Value>, RuntimeError> + 'static,
    {
        Self {
            name: Rc::from(name),
            func: Rc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn invoke(
        &self,
        interp: &mut Interpreter,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, RuntimeError> {
        (self.func)(interp, args)
    }
}

/// A Rust object exposed to scripts (thread handles, queues, ...).
///
/// Scripts interact with host objects only through method calls:
/// `obj.method(args)` dispatches to [`HostObject::call_method`].
pub trait HostObject: Any {
    fn type_name(&self) -> &'static str;

    fn describe(&self) -> String {
        format!("{} ({:p})", self.type_name(), self as *const Self)
    }

    fn call_method(
        &self,
        interp: &mut Interpreter,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, RuntimeError>;

    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    List(ListRef),
    Map(MapRef),
    Function(Arc<FunctionProto>),
    Native(NativeFunction),
    Object(Rc<dyn HostObject>),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    pub fn object<T: HostObject>(obj: T) -> Self {
        Value::Object(Rc::new(obj))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Object(obj) => obj.type_name(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Downcast a host object to its concrete Rust type.
    pub fn downcast_object<T: HostObject>(&self) -> Option<&T> {
        match self {
            Value::Object(obj) => obj.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Scalars compare by value; lists, maps, functions and objects by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(&a.func, &b.func),
            (Value::Object(a), Value::Object(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            _ => false,
        }
    }
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "nan".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Str(s) => f.write_str(s),
            Value::List(l) => write!(f, "list: {:p}", Rc::as_ptr(l)),
            Value::Map(m) => write!(f, "map: {:p}", Rc::as_ptr(m)),
            Value::Function(p) => match &p.name {
                Some(name) => write!(f, "function: {name} ({}:{})", p.chunk, p.span.line),
                None => write!(f, "function: <{}:{}>", p.chunk, p.span.line),
            },
            Value::Native(n) => write!(f, "function: builtin '{}'", n.name),
            Value::Object(obj) => f.write_str(&obj.describe()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(l) => f.debug_list().entries(l.borrow().iter()).finish(),
            Value::Map(m) => f.debug_map().entries(m.borrow().iter()).finish(),
            other => write!(f, "{other}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

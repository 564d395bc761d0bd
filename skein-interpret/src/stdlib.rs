use std::rc::Rc;

use crate::error::RuntimeError;
use crate::value::Value;
use crate::vm::Interpreter;

type NativeResult = Result<Vec<Value>, RuntimeError>;

pub(crate) fn install(interp: &mut Interpreter) {
    interp.register_native("print", print);
    interp.register_native("error", error);
    interp.register_native("pcall", pcall);
    interp.register_native("assert", assert);
    interp.register_native("type", type_of);
    interp.register_native("tostring", tostring);
    interp.register_native("tonumber", tonumber);
    interp.register_native("len", len);
    interp.register_native("push", push);
    interp.register_native("keys", keys);
    interp.register_native("range", range);
    interp.register_native("require", require);
}

/// Argument `i` (0-based), or nil when absent.
pub fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Nil)
}

pub fn bad_argument(
    interp: &Interpreter,
    i: usize,
    func: &str,
    expected: &str,
    got: &Value,
) -> RuntimeError {
    interp.error(format!(
        "bad argument #{} to '{func}' ({expected} expected, got {})",
        i + 1,
        got.type_name()
    ))
}

pub fn check_str(
    interp: &Interpreter,
    args: &[Value],
    i: usize,
    func: &str,
) -> Result<Rc<str>, RuntimeError> {
    match arg(args, i) {
        Value::Str(s) => Ok(s),
        other => Err(bad_argument(interp, i, func, "string", &other)),
    }
}

pub fn check_number(
    interp: &Interpreter,
    args: &[Value],
    i: usize,
    func: &str,
) -> Result<f64, RuntimeError> {
    match arg(args, i) {
        Value::Number(n) => Ok(n),
        other => Err(bad_argument(interp, i, func, "number", &other)),
    }
}

fn print(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let mut line = args.iter().map(Value::to_string).collect::<Vec<_>>().join("\t");
    line.push('\n');
    interp.write_output(&line)?;
    Ok(Vec::new())
}

fn error(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    Err(match arg(&args, 0) {
        Value::Str(msg) => interp.error(msg),
        other => interp.raise(other.to_string()),
    })
}

fn pcall(interp: &mut Interpreter, mut args: Vec<Value>) -> NativeResult {
    if args.is_empty() {
        return Err(bad_argument(interp, 0, "pcall", "value", &Value::Nil));
    }
    let func = args.remove(0);
    match interp.call(&func, args) {
        Ok(mut values) => {
            values.insert(0, Value::Bool(true));
            Ok(values)
        }
        Err(err) => Ok(vec![Value::Bool(false), Value::from(err.message)]),
    }
}

fn assert(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    if arg(&args, 0).is_truthy() {
        return Ok(args);
    }
    Err(match arg(&args, 1) {
        Value::Nil => interp.error("assertion failed!"),
        msg => interp.raise(msg.to_string()),
    })
}

fn type_of(_: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    Ok(vec![Value::str(arg(&args, 0).type_name())])
}

fn tostring(_: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    Ok(vec![Value::from(arg(&args, 0).to_string())])
}

fn tonumber(_: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let value = match arg(&args, 0) {
        Value::Number(n) => Value::Number(n),
        Value::Str(s) => parse_number(&s).map(Value::Number).unwrap_or(Value::Nil),
        _ => Value::Nil,
    };
    Ok(vec![value])
}

fn parse_number(s: &str) -> Option<f64> {
    let t = s.trim();
    let (negative, body) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t),
    };
    let n = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()? as f64
    } else if !body.is_empty()
        && body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        body.parse::<f64>().ok()?
    } else {
        return None;
    };
    Some(if negative { -n } else { n })
}

fn len(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let n = match arg(&args, 0) {
        Value::Str(s) => s.len(),
        Value::List(list) => list.borrow().len(),
        Value::Map(map) => map.borrow().len(),
        other => return Err(bad_argument(interp, 0, "len", "list, map or string", &other)),
    };
    Ok(vec![Value::Number(n as f64)])
}

fn push(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let mut args = args.into_iter();
    let list = match args.next() {
        Some(Value::List(list)) => list,
        other => {
            return Err(bad_argument(interp, 0, "push", "list", &other.unwrap_or(Value::Nil)));
        }
    };
    let mut items = list.borrow_mut();
    items.extend(args);
    Ok(vec![Value::Number(items.len() as f64)])
}

fn keys(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    match arg(&args, 0) {
        Value::Map(map) => Ok(vec![Value::list(
            map.borrow().keys().map(|k| Value::str(k)).collect(),
        )]),
        other => Err(bad_argument(interp, 0, "keys", "map", &other)),
    }
}

/// `range(n)` is `[0, n)`; `range(a, b)` is `[a, b)`.
fn range(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let first = check_number(interp, &args, 0, "range")?;
    let (start, end) = match arg(&args, 1) {
        Value::Nil => (0.0, first),
        Value::Number(end) => (first, end),
        other => return Err(bad_argument(interp, 1, "range", "number", &other)),
    };
    let mut items = Vec::new();
    let mut n = start;
    while n < end {
        items.push(Value::Number(n));
        n += 1.0;
    }
    Ok(vec![Value::list(items)])
}

fn require(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let name = check_str(interp, &args, 0, "require")?;
    Ok(vec![interp.require(&name)?])
}

#[cfg(test)]
mod tests {
    use super::parse_number;

    #[test]
    fn tonumber_accepts_decimal_and_hex_only() {
        assert_eq!(parse_number(" 42 "), Some(42.0));
        assert_eq!(parse_number("-0x10"), Some(-16.0));
        assert_eq!(parse_number("1e2"), Some(100.0));
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("12abc"), None);
        assert_eq!(parse_number(""), None);
    }
}

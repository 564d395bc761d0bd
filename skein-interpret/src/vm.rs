use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use std::sync::Arc;

use skein_ast::{BinOp, Expr, ExprKind, ForStmt, FunctionProto, Ident, Span, Stmt, UnaryOp};
use skein_parse::{SyntaxError, compile_chunk};

use crate::error::{ExecError, RuntimeError, TraceFrame};
use crate::package::{PackageConfig, search_path};
use crate::value::{HostObject, NativeFunction, Value, format_number};

pub type MessageHandler = Rc<dyn Fn(&RuntimeError) -> String>;
pub type ModuleLoader = Rc<dyn Fn(&mut Interpreter) -> Result<Value, RuntimeError>>;

#[derive(Clone, Debug)]
pub struct InterpreterConfig {
    pub max_call_depth: usize,
    pub package: PackageConfig,
    /// Collect `print` output in memory instead of writing to stdout.
    pub capture_output: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 200,
            package: PackageConfig::default(),
            capture_output: false,
        }
    }
}

struct Frame {
    function: String,
    chunk: String,
    line: u32,
    native: bool,
    main: bool,
    scopes: Vec<HashMap<String, Value>>,
    varargs: Vec<Value>,
}

impl Frame {
    fn native(function: String) -> Self {
        Self {
            function,
            chunk: String::new(),
            line: 0,
            native: true,
            main: false,
            scopes: Vec::new(),
            varargs: Vec::new(),
        }
    }
}

enum Flow {
    Normal,
    Break,
    Return(Vec<Value>),
}

/// One isolated execution environment.
///
/// Nothing in an interpreter is shareable across threads: values are
/// reference counted with `Rc`, so the type is `!Send`.
pub struct Interpreter {
    config: InterpreterConfig,
    globals: HashMap<String, Value>,
    frames: Vec<Frame>,
    modules: HashMap<String, ModuleLoader>,
    loaded: HashMap<String, Value>,
    loading: HashSet<String>,
    message_handler: Option<MessageHandler>,
    output: String,
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("config", &self.config)
            .field("globals", &self.globals.len())
            .field("depth", &self.frames.len())
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(InterpreterConfig::default())
    }
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        let package = config.package.clone();
        let mut interp = Self {
            config,
            globals: HashMap::new(),
            frames: Vec::new(),
            modules: HashMap::new(),
            loaded: HashMap::new(),
            loading: HashSet::new(),
            message_handler: None,
            output: String::new(),
        };
        interp.apply_package_config(&package);
        crate::stdlib::install(&mut interp);
        interp
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn global(&self, name: &str) -> Value {
        self.globals.get(name).cloned().unwrap_or(Value::Nil)
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        if matches!(value, Value::Nil) {
            self.globals.remove(name);
        } else {
            self.globals.insert(name.to_string(), value);
        }
    }

    pub fn register_native<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&mut Interpreter, Vec<Value>) -> Result<Vec<Value>, RuntimeError> + 'static,
    {
        self.set_global(name, Value::Native(NativeFunction::new(name, func)));
    }

    /// Make `require(name)` produce the value returned by `loader`.
    pub fn register_module<F>(&mut self, name: &str, loader: F)
    where
        F: Fn(&mut Interpreter) -> Result<Value, RuntimeError> + 'static,
    {
        self.modules.insert(name.to_string(), Rc::new(loader));
    }

    /// Formats errors caught by [`Interpreter::pcall`].
    pub fn set_message_handler<F>(&mut self, handler: F)
    where
        F: Fn(&RuntimeError) -> String + 'static,
    {
        self.message_handler = Some(Rc::new(handler));
    }

    /// Read `package.path`, `package.cpath` and `package.config`.
    ///
    /// Fields that are missing or not strings read as empty.
    pub fn package_config(&self) -> PackageConfig {
        let field = |name: &str| match self.globals.get("package") {
            Some(Value::Map(map)) => map
                .borrow()
                .get(name)
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            _ => String::new(),
        };
        PackageConfig {
            path: field("path"),
            cpath: field("cpath"),
            config: field("config"),
        }
    }

    pub fn apply_package_config(&mut self, package: &PackageConfig) {
        let map = match self.globals.get("package") {
            Some(Value::Map(map)) => map.clone(),
            _ => {
                let map = Rc::new(RefCell::new(BTreeMap::new()));
                self.globals.insert("package".to_string(), Value::Map(map.clone()));
                map
            }
        };
        let mut map = map.borrow_mut();
        map.insert("path".to_string(), Value::str(&package.path));
        map.insert("cpath".to_string(), Value::str(&package.cpath));
        map.insert("config".to_string(), Value::str(&package.config));
    }

    /// Compile `src` into a function value without running it.
    pub fn load(&self, src: &str, chunk: &str) -> Result<Value, SyntaxError> {
        Ok(Value::Function(compile_chunk(src, chunk)?))
    }

    pub fn exec_source(&mut self, src: &str, chunk: &str) -> Result<Vec<Value>, ExecError> {
        let main = self.load(src, chunk)?;
        Ok(self.call(&main, Vec::new())?)
    }

    pub fn call(&mut self, func: &Value, args: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
        match func {
            Value::Function(proto) => self.call_proto(proto, args),
            Value::Native(native) => {
                self.enter(Frame::native(native.name().to_string()))?;
                let result = native.invoke(self, args);
                self.frames.pop();
                result
            }
            other => Err(self.error(format!("attempt to call a {} value", other.type_name()))),
        }
    }

    /// Call `func`, converting a raised error into its message.
    ///
    /// The message handler, when set, formats the message.
    pub fn pcall(&mut self, func: &Value, args: Vec<Value>) -> Result<Vec<Value>, String> {
        self.call(func, args).map_err(|err| match &self.message_handler {
            Some(handler) => handler(&err),
            None => err.message,
        })
    }

    pub fn call_method(
        &mut self,
        obj: &Rc<dyn HostObject>,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, RuntimeError> {
        self.enter(Frame::native(format!("{}.{method}", obj.type_name())))?;
        let result = obj.call_method(self, method, args);
        self.frames.pop();
        result
    }

    /// An error positioned at the innermost script frame.
    pub fn error(&self, message: impl fmt::Display) -> RuntimeError {
        let message = match self.frames.iter().rev().find(|f| !f.native) {
            Some(frame) => format!("{}:{}: {message}", frame.chunk, frame.line),
            None => message.to_string(),
        };
        RuntimeError {
            message,
            traceback: self.traceback(),
        }
    }

    /// An error carrying `message` verbatim.
    pub fn raise(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError {
            message: message.into(),
            traceback: self.traceback(),
        }
    }

    pub fn traceback(&self) -> Vec<TraceFrame> {
        self.frames
            .iter()
            .rev()
            .map(|f| TraceFrame {
                function: f.function.clone(),
                chunk: f.chunk.clone(),
                line: f.line,
                native: f.native,
                main: f.main,
            })
            .collect()
    }

    pub fn write_output(&mut self, text: &str) -> Result<(), RuntimeError> {
        if self.config.capture_output {
            self.output.push_str(text);
            return Ok(());
        }
        let mut out = std::io::stdout().lock();
        out.write_all(text.as_bytes())
            .and_then(|()| out.flush())
            .map_err(|e| self.error(format!("write to stdout failed: {e}")))
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn require(&mut self, name: &str) -> Result<Value, RuntimeError> {
        if let Some(value) = self.loaded.get(name) {
            return Ok(value.clone());
        }
        if !self.loading.insert(name.to_string()) {
            return Err(self.error(format!("loop while loading module '{name}'")));
        }
        let result = self.load_module(name);
        self.loading.remove(name);
        let value = result?;
        self.loaded.insert(name.to_string(), value.clone());
        Ok(value)
    }

    fn load_module(&mut self, name: &str) -> Result<Value, RuntimeError> {
        if let Some(loader) = self.modules.get(name).cloned() {
            tracing::trace!(module = name, "loading native module");
            return loader(self);
        }

        let package = self.package_config();
        let seps = package.separators().map_err(|e| self.error(e))?;
        let (found, tried) = search_path(name, &package.path, seps);
        let Some(file) = found else {
            let mut message = format!("module '{name}' not found:\n\tno native module '{name}'");
            for candidate in tried {
                message.push_str(&format!("\n\tno file '{candidate}'"));
            }
            return Err(self.error(message));
        };

        let chunk = file.display().to_string();
        let src = std::fs::read_to_string(&file)
            .map_err(|e| self.error(format!("cannot read module '{name}' from {chunk}: {e}")))?;
        let proto = compile_chunk(&src, &chunk).map_err(|e| {
            self.error(format!(
                "error loading module '{name}': {chunk}:{}: {}",
                e.line(),
                e.message()
            ))
        })?;
        tracing::debug!(module = name, path = %chunk, "loaded script module");

        let values = self.call(&Value::Function(proto), vec![Value::str(name)])?;
        Ok(values
            .into_iter()
            .next()
            .filter(|v| !matches!(v, Value::Nil))
            .unwrap_or(Value::Bool(true)))
    }

    fn enter(&mut self, frame: Frame) -> Result<(), RuntimeError> {
        if self.frames.len() >= self.config.max_call_depth {
            return Err(self.error("stack overflow"));
        }
        self.frames.push(frame);
        Ok(())
    }

    fn call_proto(
        &mut self,
        proto: &Arc<FunctionProto>,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, RuntimeError> {
        let mut args = args.into_iter();
        let mut scope = HashMap::new();
        for param in &proto.params {
            scope.insert(param.node.clone(), args.next().unwrap_or(Value::Nil));
        }
        let varargs = if proto.variadic { args.collect() } else { Vec::new() };

        let function = match &proto.name {
            Some(name) => name.clone(),
            None => format!("<{}:{}>", proto.chunk, proto.span.line),
        };
        self.enter(Frame {
            function,
            chunk: proto.chunk.clone(),
            line: proto.span.line,
            native: false,
            main: proto.main,
            scopes: vec![scope],
            varargs,
        })?;
        let flow = self.exec_stmts(&proto.body.stmts);
        self.frames.pop();

        match flow? {
            Flow::Return(values) => Ok(values),
            Flow::Normal => Ok(Vec::new()),
            Flow::Break => Err(self.error("'break' outside a loop")),
        }
    }

    fn set_line(&mut self, line: u32) {
        if let Some(frame) = self.frames.last_mut() {
            frame.line = line;
        }
    }

    fn push_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.scopes.push(HashMap::new());
        }
    }

    fn pop_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.scopes.pop();
        }
    }

    fn varargs(&self) -> &[Value] {
        self.frames.last().map(|f| f.varargs.as_slice()).unwrap_or(&[])
    }

    fn lookup(&self, name: &str) -> Value {
        if let Some(frame) = self.frames.last() {
            for scope in frame.scopes.iter().rev() {
                if let Some(value) = scope.get(name) {
                    return value.clone();
                }
            }
        }
        self.global(name)
    }

    fn declare(&mut self, name: &str, value: Value) {
        match self.frames.last_mut().and_then(|f| f.scopes.last_mut()) {
            Some(scope) => {
                scope.insert(name.to_string(), value);
            }
            None => self.set_global(name, value),
        }
    }

    fn assign(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            for scope in frame.scopes.iter_mut().rev() {
                if let Some(slot) = scope.get_mut(name) {
                    *slot = value;
                    return;
                }
            }
        }
        self.set_global(name, value);
    }

    fn exec_stmts(&mut self, stmts: &[Stmt]) -> Result<Flow, RuntimeError> {
        for stmt in stmts {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_block(&mut self, block: &skein_ast::Block) -> Result<Flow, RuntimeError> {
        self.push_scope();
        let flow = self.exec_stmts(&block.stmts);
        self.pop_scope();
        flow
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        self.set_line(stmt.span().line);
        match stmt {
            Stmt::Let(s) => {
                let mut values = self.eval_multi(&s.exprs)?.into_iter();
                for name in &s.names {
                    let value = values.next().unwrap_or(Value::Nil);
                    self.declare(&name.node, value);
                }
                Ok(Flow::Normal)
            }
            Stmt::Assign(s) => {
                let value = self.eval(&s.expr)?;
                self.assign_to(&s.target, value)?;
                Ok(Flow::Normal)
            }
            Stmt::FnDef(def) => {
                self.assign(&def.name.node, Value::Function(def.proto.clone()));
                Ok(Flow::Normal)
            }
            Stmt::If(s) => {
                if self.eval(&s.cond)?.is_truthy() {
                    self.exec_block(&s.then_block)
                } else if let Some(block) = &s.else_block {
                    self.exec_block(block)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While(s) => {
                while self.eval(&s.cond)?.is_truthy() {
                    match self.exec_block(&s.body)? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                    self.set_line(s.span.line);
                }
                Ok(Flow::Normal)
            }
            Stmt::For(s) => self.exec_for(s),
            Stmt::Return(s) => Ok(Flow::Return(self.eval_multi(&s.exprs)?)),
            Stmt::Break(_) => Ok(Flow::Break),
            Stmt::ExprStmt(expr) => {
                self.eval_expand(expr)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn exec_for(&mut self, s: &ForStmt) -> Result<Flow, RuntimeError> {
        let iterable = self.eval(&s.iter)?;
        let is_list = matches!(iterable, Value::List(_));
        let pairs: Vec<(Value, Value)> = match &iterable {
            Value::List(list) => list
                .borrow()
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::Number(i as f64), v.clone()))
                .collect(),
            Value::Map(map) => map
                .borrow()
                .iter()
                .map(|(k, v)| (Value::str(k), v.clone()))
                .collect(),
            other => {
                let message = format!("cannot iterate over a {} value", other.type_name());
                return Err(self.error(message));
            }
        };

        for (key, value) in pairs {
            self.push_scope();
            match &s.second {
                Some(second) => {
                    self.declare(&s.first.node, key);
                    self.declare(&second.node, value);
                }
                None => self.declare(&s.first.node, if is_list { value } else { key }),
            }
            let flow = self.exec_block(&s.body);
            self.pop_scope();
            match flow? {
                Flow::Normal => {}
                Flow::Break => break,
                ret @ Flow::Return(_) => return Ok(ret),
            }
        }
        Ok(Flow::Normal)
    }

    fn assign_to(&mut self, target: &Expr, value: Value) -> Result<(), RuntimeError> {
        match &target.kind {
            ExprKind::Ident(id) => {
                self.assign(&id.node, value);
                Ok(())
            }
            ExprKind::Index { base, index } => {
                let base = self.eval(base)?;
                let key = self.eval(index)?;
                self.set_index(&base, key, value)
            }
            ExprKind::Member { base, member } => {
                let base_value = self.eval(base)?;
                if !matches!(base_value, Value::Map(_)) {
                    return Err(self.error(format!(
                        "attempt to index a {} value{}",
                        base_value.type_name(),
                        describe_expr(base)
                    )));
                }
                self.set_index(&base_value, Value::str(&member.node), value)
            }
            _ => Err(self.error("cannot assign to this expression")),
        }
    }

    fn set_index(&self, base: &Value, key: Value, value: Value) -> Result<(), RuntimeError> {
        match (base, &key) {
            (Value::List(list), Value::Number(n)) => {
                let mut items = list.borrow_mut();
                let len = items.len();
                match list_index(*n) {
                    Some(i) if i < len => items[i] = value,
                    Some(i) if i == len => items.push(value),
                    _ => {
                        return Err(self.error(format!(
                            "list index {} out of range (length {len})",
                            format_number(*n)
                        )));
                    }
                }
                Ok(())
            }
            (Value::Map(map), Value::Str(k)) => {
                let mut map = map.borrow_mut();
                if matches!(value, Value::Nil) {
                    map.remove(&**k);
                } else {
                    map.insert(k.to_string(), value);
                }
                Ok(())
            }
            (Value::List(_), other) => Err(self.error(format!(
                "list index must be a number, got {}",
                other.type_name()
            ))),
            (Value::Map(_), other) => Err(self.error(format!(
                "map keys must be strings, got {}",
                other.type_name()
            ))),
            (other, _) => {
                Err(self.error(format!("attempt to index a {} value", other.type_name())))
            }
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Nil => Ok(Value::Nil),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::str(s)),
            ExprKind::Ident(id) => Ok(self.lookup(&id.node)),
            ExprKind::Varargs => Ok(self.varargs().first().cloned().unwrap_or(Value::Nil)),
            ExprKind::List(items) => Ok(Value::list(self.eval_multi(items)?)),
            ExprKind::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    let value = self.eval(value)?;
                    if !matches!(value, Value::Nil) {
                        map.insert(key.node.clone(), value);
                    }
                }
                Ok(Value::map(map))
            }
            ExprKind::Function(proto) => Ok(Value::Function(proto.clone())),
            ExprKind::Paren(inner) => self.eval(inner),
            ExprKind::Unary { op, expr: inner } => {
                let value = self.eval(inner)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Neg => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => Err(self.error(format!(
                            "attempt to perform arithmetic on a {} value{}",
                            other.type_name(),
                            describe_expr(inner)
                        ))),
                    },
                }
            }
            ExprKind::Binary { left, op, right } => self.eval_binary(left, *op, right),
            ExprKind::Index { base, index } => {
                let base_value = self.eval(base)?;
                let key = self.eval(index)?;
                self.index_value(&base_value, &key, base)
            }
            ExprKind::Member { base, member } => {
                let base_value = self.eval(base)?;
                self.member_value(&base_value, member, base)
            }
            ExprKind::Call { .. } => {
                Ok(self.eval_expand(expr)?.into_iter().next().unwrap_or(Value::Nil))
            }
        }
    }

    fn eval_expand(&mut self, expr: &Expr) -> Result<Vec<Value>, RuntimeError> {
        match &expr.kind {
            ExprKind::Call { callee, args } => self.eval_call(callee, args, expr.span),
            ExprKind::Varargs => Ok(self.varargs().to_vec()),
            _ => Ok(vec![self.eval(expr)?]),
        }
    }

    /// Evaluate a list of expressions; a trailing call or `...` contributes
    /// all of its values.
    fn eval_multi(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, RuntimeError> {
        let mut out = Vec::with_capacity(exprs.len());
        for (i, expr) in exprs.iter().enumerate() {
            if i + 1 == exprs.len() && expr.kind.is_multi() {
                out.extend(self.eval_expand(expr)?);
            } else {
                out.push(self.eval(expr)?);
            }
        }
        Ok(out)
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        span: Span,
    ) -> Result<Vec<Value>, RuntimeError> {
        let func = match &callee.kind {
            ExprKind::Member { base, member } => {
                let target = self.eval(base)?;
                if let Value::Object(obj) = &target {
                    let args = self.eval_multi(args)?;
                    self.set_line(span.line);
                    return self.call_method(obj, &member.node, args);
                }
                self.member_value(&target, member, base)?
            }
            _ => self.eval(callee)?,
        };
        let args = self.eval_multi(args)?;
        self.set_line(span.line);

        if !matches!(func, Value::Function(_) | Value::Native(_)) {
            return Err(self.error(format!(
                "attempt to call a {} value{}",
                func.type_name(),
                describe_expr(callee)
            )));
        }
        self.call(&func, args)
    }

    fn eval_binary(&mut self, left: &Expr, op: BinOp, right: &Expr) -> Result<Value, RuntimeError> {
        let l = self.eval(left)?;
        match op {
            BinOp::And if !l.is_truthy() => return Ok(l),
            BinOp::Or if l.is_truthy() => return Ok(l),
            BinOp::And | BinOp::Or => return self.eval(right),
            _ => {}
        }
        let r = self.eval(right)?;

        match op {
            BinOp::Add => self.arith(&l, &r, |a, b| a + b),
            BinOp::Sub => self.arith(&l, &r, |a, b| a - b),
            BinOp::Mul => self.arith(&l, &r, |a, b| a * b),
            BinOp::Div => self.arith(&l, &r, |a, b| a / b),
            BinOp::Rem => self.arith(&l, &r, |a, b| a - (a / b).floor() * b),
            BinOp::Concat => match (concat_piece(&l), concat_piece(&r)) {
                (Some(a), Some(b)) => Ok(Value::from(a + &b)),
                (None, _) => {
                    Err(self.error(format!("attempt to concatenate a {} value", l.type_name())))
                }
                (_, None) => {
                    Err(self.error(format!("attempt to concatenate a {} value", r.type_name())))
                }
            },
            BinOp::Eq => Ok(Value::Bool(l == r)),
            BinOp::Ne => Ok(Value::Bool(l != r)),
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => self.compare(op, &l, &r),
            BinOp::And | BinOp::Or => Ok(r),
        }
    }

    fn arith(
        &self,
        l: &Value,
        r: &Value,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Value, RuntimeError> {
        match (l, r) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(f(*a, *b))),
            (Value::Number(_), bad) | (bad, _) => Err(self.error(format!(
                "attempt to perform arithmetic on a {} value",
                bad.type_name()
            ))),
        }
    }

    fn compare(&self, op: BinOp, l: &Value, r: &Value) -> Result<Value, RuntimeError> {
        let ordering = match (l, r) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => {
                return Err(self.error(format!(
                    "attempt to compare {} with {}",
                    l.type_name(),
                    r.type_name()
                )));
            }
        };
        let result = ordering.is_some_and(|o| match op {
            BinOp::Lt => o.is_lt(),
            BinOp::Gt => o.is_gt(),
            BinOp::Le => o.is_le(),
            BinOp::Ge => o.is_ge(),
            _ => false,
        });
        Ok(Value::Bool(result))
    }

    fn index_value(
        &self,
        base: &Value,
        key: &Value,
        base_expr: &Expr,
    ) -> Result<Value, RuntimeError> {
        match (base, key) {
            (Value::List(list), Value::Number(n)) => Ok(list_index(*n)
                .and_then(|i| list.borrow().get(i).cloned())
                .unwrap_or(Value::Nil)),
            (Value::Map(map), Value::Str(k)) => {
                Ok(map.borrow().get(&**k).cloned().unwrap_or(Value::Nil))
            }
            (Value::List(_), other) => Err(self.error(format!(
                "list index must be a number, got {}",
                other.type_name()
            ))),
            (Value::Map(_), other) => Err(self.error(format!(
                "map keys must be strings, got {}",
                other.type_name()
            ))),
            (other, _) => Err(self.error(format!(
                "attempt to index a {} value{}",
                other.type_name(),
                describe_expr(base_expr)
            ))),
        }
    }

    fn member_value(
        &self,
        base: &Value,
        member: &Ident,
        base_expr: &Expr,
    ) -> Result<Value, RuntimeError> {
        match base {
            Value::Map(map) => Ok(map.borrow().get(&member.node).cloned().unwrap_or(Value::Nil)),
            other => Err(self.error(format!(
                "attempt to index a {} value{}",
                other.type_name(),
                describe_expr(base_expr)
            ))),
        }
    }
}

fn list_index(n: f64) -> Option<usize> {
    (n >= 0.0 && n.fract() == 0.0 && n < usize::MAX as f64).then_some(n as usize)
}

fn concat_piece(v: &Value) -> Option<String> {
    match v {
        Value::Str(s) => Some(s.to_string()),
        Value::Number(n) => Some(format_number(*n)),
        _ => None,
    }
}

fn describe_expr(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(id) => format!(" (name '{}')", id.node),
        ExprKind::Member { member, .. } => format!(" (field '{}')", member.node),
        _ => String::new(),
    }
}

//! Tree-walking interpreter with per-line pause points.
//!
//! Execution pauses before a statement according to the current [`StepMode`]
//! and the shared breakpoint table, hands a [`PauseCtx`] to the trace hook,
//! and resumes under whatever mode the hook returns.

use std::rc::Rc;

use super::ast::{BinaryOp, Expr, Stmt, StmtKind, UnaryOp};
use super::breakpoints::{lock, SharedBreakpoints};
use super::value::{Bindings, FuncObj, Value};
use super::{parser, EngineError, Resume, StepMode, TraceHook};

/// Frame stack bound; self-recursive programs fault here instead of
/// overflowing the host stack.
pub const MAX_CALL_DEPTH: usize = 64;

/// Nesting bound for structural equality of lists.
const MAX_COMPARE_DEPTH: usize = 64;

/// One live call frame.
#[derive(Debug)]
pub struct Frame {
    /// `<module>` for the top-level frame.
    pub function: String,
    /// Line currently executing in this frame. For caller frames this is
    /// the line of the pending call.
    pub line: u32,
    pub locals: Bindings,
}

/// Live view of the frame chain handed to the trace hook at a pause point.
///
/// Borrowed from the interpreter; hooks must copy out whatever they need
/// before returning.
pub struct PauseCtx<'a> {
    file: &'a str,
    line: u32,
    frames: &'a [Frame],
}

impl<'a> PauseCtx<'a> {
    pub fn file(&self) -> &str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// Frames from innermost to outermost.
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter().rev()
    }

    /// The innermost frame.
    pub fn current(&self) -> &Frame {
        self.frames.last().expect("frame stack is never empty at a pause point")
    }

    /// Module-level bindings.
    pub fn globals(&self) -> &Bindings {
        &self.frames[0].locals
    }
}

/// Parse and execute `source` under trace.
pub fn run(
    source: &str,
    file: &str,
    breakpoints: SharedBreakpoints,
    hook: &mut dyn TraceHook,
) -> Result<(), EngineError> {
    let program = parser::parse(source)?;

    let mut module = Frame {
        function: "<module>".into(),
        line: 0,
        locals: Bindings::new(),
    };
    module
        .locals
        .insert("__name__".into(), Value::Str("__main__".into()));

    let mut interp = Interp {
        file: file.to_string(),
        breakpoints,
        hook,
        frames: vec![module],
        mode: StepMode::Into,
        over_depth: 1,
        cur_line: 0,
        in_condition: false,
    };
    interp.exec_block(&program.body)?;
    Ok(())
}

enum Flow {
    Normal,
    Return(Value),
}

struct Interp<'h> {
    file: String,
    breakpoints: SharedBreakpoints,
    hook: &'h mut dyn TraceHook,
    frames: Vec<Frame>,
    mode: StepMode,
    over_depth: usize,
    cur_line: u32,
    in_condition: bool,
}

impl Interp<'_> {
    fn runtime_error(&self, message: impl Into<String>) -> EngineError {
        EngineError::Runtime {
            line: self.cur_line,
            message: message.into(),
        }
    }

    fn exec_block(&mut self, body: &[Stmt]) -> Result<Flow, EngineError> {
        for stmt in body {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                ret @ Flow::Return(_) => return Ok(ret),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, EngineError> {
        self.cur_line = stmt.line;
        if let Some(frame) = self.frames.last_mut() {
            frame.line = stmt.line;
        }
        self.pause_point(stmt.line)?;

        match &stmt.kind {
            StmtKind::Assign { target, value } => {
                let v = self.eval(value)?;
                if let Some(frame) = self.frames.last_mut() {
                    frame.locals.insert(target.clone(), v);
                }
                Ok(Flow::Normal)
            }
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            }
            StmtKind::FuncDef { name, params, body } => {
                let func = FuncObj {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                };
                if let Some(frame) = self.frames.last_mut() {
                    frame.locals.insert(name.clone(), Value::Func(Rc::new(func)));
                }
                Ok(Flow::Normal)
            }
            StmtKind::Return(value) => {
                if self.frames.len() == 1 {
                    return Err(self.runtime_error("'return' outside function"));
                }
                let v = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                Ok(Flow::Return(v))
            }
            StmtKind::If { arms, orelse } => {
                for arm in arms {
                    if self.eval(&arm.cond)?.truthy() {
                        return self.exec_block(&arm.body);
                    }
                }
                self.exec_block(orelse)
            }
            StmtKind::While { cond, body } => {
                loop {
                    self.cur_line = stmt.line;
                    if let Some(frame) = self.frames.last_mut() {
                        frame.line = stmt.line;
                    }
                    if !self.eval(cond)?.truthy() {
                        break;
                    }
                    match self.exec_block(body)? {
                        Flow::Normal => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                    // loop back-edge is a pause point, like the first visit
                    self.cur_line = stmt.line;
                    if let Some(frame) = self.frames.last_mut() {
                        frame.line = stmt.line;
                    }
                    self.pause_point(stmt.line)?;
                }
                Ok(Flow::Normal)
            }
            StmtKind::Pass => Ok(Flow::Normal),
        }
    }

    fn pause_point(&mut self, line: u32) -> Result<(), EngineError> {
        if self.in_condition {
            return Ok(());
        }
        if !self.should_pause(line)? {
            return Ok(());
        }
        let ctx = PauseCtx {
            file: &self.file,
            line,
            frames: &self.frames,
        };
        match self.hook.on_pause(&ctx) {
            Resume::Step(mode) => {
                self.mode = mode;
                if mode == StepMode::Over {
                    self.over_depth = self.frames.len();
                }
                Ok(())
            }
            Resume::Halt => Err(EngineError::Halted),
        }
    }

    fn should_pause(&mut self, line: u32) -> Result<bool, EngineError> {
        let mode_pause = match self.mode {
            StepMode::Into => true,
            StepMode::Over => self.frames.len() <= self.over_depth,
            // with nothing registered there is nowhere to run to; degrade
            // to single-stepping so execution stays observable
            StepMode::Continue => lock(&self.breakpoints).is_empty(),
        };
        if mode_pause {
            return Ok(true);
        }
        self.breakpoint_hit(line)
    }

    fn breakpoint_hit(&mut self, line: u32) -> Result<bool, EngineError> {
        let bp = match lock(&self.breakpoints).get(&self.file, line) {
            Some(bp) => bp.clone(),
            None => return Ok(false),
        };

        if let Some(func) = &bp.func_name {
            let current = self.frames.last().map(|f| f.function.as_str());
            if current != Some(func.as_str()) {
                return Ok(false);
            }
        }

        if let Some(cond) = &bp.condition {
            // no pause points while evaluating a breakpoint condition
            self.in_condition = true;
            let hit = match parser::parse_expr_str(cond) {
                Ok(expr) => self.eval(&expr).map(|v| v.truthy()).unwrap_or(true),
                Err(_) => true,
            };
            self.in_condition = false;
            if !hit {
                return Ok(false);
            }
        }

        if bp.temporary {
            lock(&self.breakpoints).clear(&self.file, line);
        }
        Ok(true)
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(frame) = self.frames.last() {
            if let Some(v) = frame.locals.get(name) {
                return Some(v.clone());
            }
        }
        self.frames[0].locals.get(name).cloned()
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, EngineError> {
        match expr {
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::NoneLit => Ok(Value::None),
            Expr::Name(name) => self
                .lookup(name)
                .ok_or_else(|| self.runtime_error(format!("name '{name}' is not defined"))),
            Expr::List(items) => {
                let mut vals = Vec::with_capacity(items.len());
                for item in items {
                    vals.push(self.eval(item)?);
                }
                Ok(Value::list(vals))
            }
            Expr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                self.unary_op(*op, v)
            }
            Expr::Binary { op, lhs, rhs } => match op {
                BinaryOp::And => {
                    let l = self.eval(lhs)?;
                    if l.truthy() {
                        self.eval(rhs)
                    } else {
                        Ok(l)
                    }
                }
                BinaryOp::Or => {
                    let l = self.eval(lhs)?;
                    if l.truthy() {
                        Ok(l)
                    } else {
                        self.eval(rhs)
                    }
                }
                _ => {
                    let l = self.eval(lhs)?;
                    let r = self.eval(rhs)?;
                    self.binary_op(*op, l, r)
                }
            },
            Expr::Call { callee, args } => self.eval_call(callee, args),
            Expr::Index { target, index } => {
                let t = self.eval(target)?;
                let i = self.eval(index)?;
                self.index_op(t, i)
            }
        }
    }

    fn unary_op(&self, op: UnaryOp, v: Value) -> Result<Value, EngineError> {
        match op {
            UnaryOp::Not => Ok(Value::Bool(!v.truthy())),
            UnaryOp::Neg => match v {
                Value::Int(n) => n
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| self.runtime_error("integer overflow")),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(self.runtime_error(format!(
                    "bad operand type for unary '-': '{}'",
                    other.type_name()
                ))),
            },
        }
    }

    fn binary_op(&self, op: BinaryOp, l: Value, r: Value) -> Result<Value, EngineError> {
        use BinaryOp::*;
        match op {
            Add => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => a
                    .checked_add(*b)
                    .map(Value::Int)
                    .ok_or_else(|| self.runtime_error("integer overflow")),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
                _ => self.float_op(op, &l, &r),
            },
            Sub => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => a
                    .checked_sub(*b)
                    .map(Value::Int)
                    .ok_or_else(|| self.runtime_error("integer overflow")),
                _ => self.float_op(op, &l, &r),
            },
            Mul => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => a
                    .checked_mul(*b)
                    .map(Value::Int)
                    .ok_or_else(|| self.runtime_error("integer overflow")),
                _ => self.float_op(op, &l, &r),
            },
            Div => {
                let (a, b) = self.numeric_pair(op, &l, &r)?;
                if b == 0.0 {
                    return Err(self.runtime_error("division by zero"));
                }
                Ok(Value::Float(a / b))
            }
            Mod => match (&l, &r) {
                (Value::Int(_), Value::Int(0)) => Err(self.runtime_error("modulo by zero")),
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.rem_euclid(*b))),
                _ => Err(self.type_mismatch(op, &l, &r)),
            },
            Eq => Ok(Value::Bool(self.eq_values(&l, &r, 0)?)),
            Ne => Ok(Value::Bool(!self.eq_values(&l, &r, 0)?)),
            Lt | Le | Gt | Ge => self.ordered_op(op, &l, &r),
            And | Or => unreachable!("short-circuit ops are handled in eval"),
        }
    }

    fn float_op(&self, op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EngineError> {
        let (a, b) = self.numeric_pair(op, l, r)?;
        Ok(Value::Float(match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            _ => unreachable!("float_op only handles arithmetic"),
        }))
    }

    fn numeric_pair(&self, op: BinaryOp, l: &Value, r: &Value) -> Result<(f64, f64), EngineError> {
        match (to_f64(l), to_f64(r)) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(self.type_mismatch(op, l, r)),
        }
    }

    fn type_mismatch(&self, op: BinaryOp, l: &Value, r: &Value) -> EngineError {
        self.runtime_error(format!(
            "unsupported operand types for {}: '{}' and '{}'",
            op_symbol(op),
            l.type_name(),
            r.type_name()
        ))
    }

    fn eq_values(&self, l: &Value, r: &Value, depth: usize) -> Result<bool, EngineError> {
        if depth > MAX_COMPARE_DEPTH {
            return Err(self.runtime_error("maximum comparison depth exceeded"));
        }
        Ok(match (l, r) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Func(a), Value::Func(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    if !self.eq_values(x, y, depth + 1)? {
                        return Ok(false);
                    }
                }
                true
            }
            _ => match (to_f64(l), to_f64(r)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        })
    }

    fn ordered_op(&self, op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EngineError> {
        let holds = match (l, r) {
            (Value::Str(a), Value::Str(b)) => cmp_holds(op, a.cmp(b)),
            _ => {
                let (a, b) = self.numeric_pair(op, l, r)?;
                match a.partial_cmp(&b) {
                    Some(ord) => cmp_holds(op, ord),
                    None => false,
                }
            }
        };
        Ok(Value::Bool(holds))
    }

    fn index_op(&self, target: Value, index: Value) -> Result<Value, EngineError> {
        let Value::Int(i) = index else {
            return Err(self.runtime_error(format!(
                "indices must be integers, not '{}'",
                index.type_name()
            )));
        };
        match target {
            Value::List(items) => {
                let items = items.borrow();
                let n = items.len() as i64;
                let j = if i < 0 { i + n } else { i };
                if j < 0 || j >= n {
                    return Err(self.runtime_error("list index out of range"));
                }
                Ok(items[j as usize].clone())
            }
            Value::Str(s) => {
                let n = s.chars().count() as i64;
                let j = if i < 0 { i + n } else { i };
                if j < 0 || j >= n {
                    return Err(self.runtime_error("string index out of range"));
                }
                Ok(Value::Str(
                    s.chars().nth(j as usize).map(String::from).unwrap_or_default(),
                ))
            }
            other => Err(self.runtime_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    fn eval_call(&mut self, callee: &str, args: &[Expr]) -> Result<Value, EngineError> {
        let mut vals = Vec::with_capacity(args.len());
        for arg in args {
            vals.push(self.eval(arg)?);
        }

        if let Some(target) = self.lookup(callee) {
            return match target {
                Value::Func(func) => self.call_function(&func, vals),
                other => Err(self.runtime_error(format!(
                    "'{}' object is not callable",
                    other.type_name()
                ))),
            };
        }
        self.call_builtin(callee, vals)
    }

    fn call_function(&mut self, func: &FuncObj, args: Vec<Value>) -> Result<Value, EngineError> {
        if args.len() != func.params.len() {
            return Err(self.runtime_error(format!(
                "{}() takes {} arguments but {} were given",
                func.name,
                func.params.len(),
                args.len()
            )));
        }
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(self.runtime_error("maximum call depth exceeded"));
        }

        let mut locals = Bindings::new();
        for (param, value) in func.params.iter().zip(args) {
            locals.insert(param.clone(), value);
        }
        let caller_line = self.cur_line;
        self.frames.push(Frame {
            function: func.name.clone(),
            line: caller_line,
            locals,
        });
        let result = self.exec_block(&func.body);
        self.frames.pop();
        self.cur_line = caller_line;

        match result? {
            Flow::Return(v) => Ok(v),
            Flow::Normal => Ok(Value::None),
        }
    }

    fn call_builtin(&mut self, name: &str, vals: Vec<Value>) -> Result<Value, EngineError> {
        match name {
            "print" => {
                let rendered: Vec<String> = vals.iter().map(Value::display).collect();
                self.hook.on_output(&rendered.join(" "));
                Ok(Value::None)
            }
            "len" => {
                let [v] = &vals[..] else {
                    return Err(self.arity_error(name, 1, vals.len()));
                };
                match v {
                    Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                    Value::List(items) => Ok(Value::Int(items.borrow().len() as i64)),
                    other => Err(self.runtime_error(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    ))),
                }
            }
            "str" => {
                let [v] = &vals[..] else {
                    return Err(self.arity_error(name, 1, vals.len()));
                };
                Ok(Value::Str(v.display()))
            }
            "abs" => {
                let [v] = &vals[..] else {
                    return Err(self.arity_error(name, 1, vals.len()));
                };
                match v {
                    Value::Int(n) => n
                        .checked_abs()
                        .map(Value::Int)
                        .ok_or_else(|| self.runtime_error("integer overflow")),
                    Value::Float(f) => Ok(Value::Float(f.abs())),
                    other => Err(self.runtime_error(format!(
                        "bad operand type for abs(): '{}'",
                        other.type_name()
                    ))),
                }
            }
            "append" => {
                let [list, item] = &vals[..] else {
                    return Err(self.arity_error(name, 2, vals.len()));
                };
                match list {
                    Value::List(items) => {
                        items.borrow_mut().push(item.clone());
                        Ok(Value::None)
                    }
                    other => Err(self.runtime_error(format!(
                        "append() expects a list, not '{}'",
                        other.type_name()
                    ))),
                }
            }
            _ => Err(self.runtime_error(format!("name '{name}' is not defined"))),
        }
    }

    fn arity_error(&self, name: &str, want: usize, got: usize) -> EngineError {
        self.runtime_error(format!("{name}() takes {want} arguments but {got} were given"))
    }
}

fn to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn cmp_holds(op: BinaryOp, ord: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        BinaryOp::Lt => ord == Less,
        BinaryOp::Le => ord != Greater,
        BinaryOp::Gt => ord == Greater,
        BinaryOp::Ge => ord != Less,
        _ => false,
    }
}

fn op_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "'+'",
        BinaryOp::Sub => "'-'",
        BinaryOp::Mul => "'*'",
        BinaryOp::Div => "'/'",
        BinaryOp::Mod => "'%'",
        BinaryOp::Eq => "'=='",
        BinaryOp::Ne => "'!='",
        BinaryOp::Lt => "'<'",
        BinaryOp::Le => "'<='",
        BinaryOp::Gt => "'>'",
        BinaryOp::Ge => "'>='",
        BinaryOp::And => "'and'",
        BinaryOp::Or => "'or'",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use super::super::breakpoints::Breakpoint;
    use super::*;

    /// Records pause lines and program output; resumes from a scripted plan,
    /// falling back to a default mode.
    struct ScriptedHook {
        lines: Vec<u32>,
        outputs: Vec<String>,
        plan: VecDeque<Resume>,
        default: Resume,
    }

    impl ScriptedHook {
        fn stepping() -> Self {
            Self::with_default(Resume::Step(StepMode::Into))
        }

        fn with_default(default: Resume) -> Self {
            Self {
                lines: Vec::new(),
                outputs: Vec::new(),
                plan: VecDeque::new(),
                default,
            }
        }
    }

    impl TraceHook for ScriptedHook {
        fn on_pause(&mut self, ctx: &PauseCtx<'_>) -> Resume {
            self.lines.push(ctx.line());
            self.plan.pop_front().unwrap_or(self.default)
        }

        fn on_output(&mut self, text: &str) {
            self.outputs.push(text.to_string());
        }
    }

    fn run_stepping(src: &str) -> ScriptedHook {
        let mut hook = ScriptedHook::stepping();
        run(src, "<string>", SharedBreakpoints::default(), &mut hook).expect("program should run");
        hook
    }

    fn run_err(src: &str) -> EngineError {
        let mut hook = ScriptedHook::stepping();
        run(src, "<string>", SharedBreakpoints::default(), &mut hook)
            .expect_err("program should fault")
    }

    #[test]
    fn arithmetic_output() {
        let hook = run_stepping("print(2 + 3 * 4)\nprint(10 / 4)\nprint(7 % 3)\nprint(-2)\n");
        assert_eq!(hook.outputs, vec!["14", "2.5", "1", "-2"]);
    }

    #[test]
    fn string_concat_and_len() {
        let hook = run_stepping("a = 'foo'\nb = a + 'bar'\nprint(b)\nprint(len(b))\n");
        assert_eq!(hook.outputs, vec!["foobar", "6"]);
    }

    #[test]
    fn comparisons_and_boolean_ops() {
        let src = "print(1 < 2)\nprint(not True)\nprint(1 == 1.0)\nprint('a' and 'b')\nprint(0 or 5)\n";
        let hook = run_stepping(src);
        assert_eq!(hook.outputs, vec!["True", "False", "True", "b", "5"]);
    }

    #[test]
    fn if_elif_else_branches() {
        let src = "x = 0\nif x < 0:\n    print('neg')\nelif x == 0:\n    print('zero')\nelse:\n    print('pos')\n";
        let hook = run_stepping(src);
        assert_eq!(hook.outputs, vec!["zero"]);
    }

    #[test]
    fn function_calls_and_recursion() {
        let src = "def fib(n):\n    if n < 2:\n        return n\n    return fib(n - 1) + fib(n - 2)\nprint(fib(6))\n";
        let hook = run_stepping(src);
        assert_eq!(hook.outputs, vec!["8"]);
    }

    #[test]
    fn globals_readable_from_functions() {
        let src = "g = 10\ndef f():\n    return g + 1\nprint(f())\n";
        let hook = run_stepping(src);
        assert_eq!(hook.outputs, vec!["11"]);
    }

    #[test]
    fn list_ops_and_indexing() {
        let src = "xs = [1, 2]\nappend(xs, 3)\nprint(len(xs))\nprint(xs[0] + xs[-1])\nprint(xs)\n";
        let hook = run_stepping(src);
        assert_eq!(hook.outputs, vec!["3", "4", "[1, 2, 3]"]);
    }

    #[test]
    fn str_and_abs_builtins() {
        let hook = run_stepping("print(str(42) + '!')\nprint(abs(-5))\n");
        assert_eq!(hook.outputs, vec!["42!", "5"]);
    }

    #[test]
    fn module_frame_seeds_name() {
        let hook = run_stepping("print(__name__)\n");
        assert_eq!(hook.outputs, vec!["__main__"]);
    }

    #[test]
    fn step_into_visits_every_line() {
        let src = "def add(a, b):\n    c = a + b\n    return c\nx = add(1, 2)\nprint(x)\n";
        let hook = run_stepping(src);
        assert_eq!(hook.lines, vec![1, 4, 2, 3, 5]);
        assert_eq!(hook.outputs, vec!["3"]);
    }

    #[test]
    fn step_over_skips_callee_lines() {
        let src = "def add(a, b):\n    c = a + b\n    return c\nx = add(1, 2)\nprint(x)\n";
        let mut hook = ScriptedHook::with_default(Resume::Step(StepMode::Over));
        run(src, "<string>", SharedBreakpoints::default(), &mut hook).expect("should run");
        assert_eq!(hook.lines, vec![1, 4, 5]);
    }

    #[test]
    fn while_line_pauses_each_iteration() {
        let src = "i = 0\nwhile i < 2:\n    i = i + 1\nprint(i)\n";
        let hook = run_stepping(src);
        assert_eq!(hook.lines, vec![1, 2, 3, 2, 3, 2, 4]);
        assert_eq!(hook.outputs, vec!["2"]);
    }

    #[test]
    fn continue_runs_to_breakpoint() {
        let src = "a = 1\nb = 2\nc = 3\nd = 4\ne = 5\nprint(e)\n";
        let bps = SharedBreakpoints::default();
        lock(&bps).set("<string>", 5, Breakpoint::default());
        let mut hook = ScriptedHook::with_default(Resume::Step(StepMode::Continue));
        run(src, "<string>", Arc::clone(&bps), &mut hook).expect("should run");
        assert_eq!(hook.lines, vec![1, 5]);
        assert_eq!(hook.outputs, vec!["5"]);
    }

    #[test]
    fn continue_with_empty_registry_single_steps() {
        let mut hook = ScriptedHook::with_default(Resume::Step(StepMode::Continue));
        run(
            "x = 1\ny = 2\nprint(x + y)\n",
            "<string>",
            SharedBreakpoints::default(),
            &mut hook,
        )
        .expect("should run");
        assert_eq!(hook.lines, vec![1, 2, 3]);
        assert_eq!(hook.outputs, vec!["3"]);
    }

    #[test]
    fn conditional_breakpoint_checks_frame() {
        let src = "i = 0\nwhile i < 5:\n    i = i + 1\nprint(i)\n";
        let bps = SharedBreakpoints::default();
        lock(&bps).set(
            "<string>",
            3,
            Breakpoint {
                condition: Some("i == 3".into()),
                ..Breakpoint::default()
            },
        );
        let mut hook = ScriptedHook::with_default(Resume::Step(StepMode::Continue));
        run(src, "<string>", bps, &mut hook).expect("should run");
        assert_eq!(hook.lines, vec![1, 3]);
        assert_eq!(hook.outputs, vec!["5"]);
    }

    #[test]
    fn temporary_breakpoint_hits_once() {
        let src = "i = 0\nwhile i < 3:\n    i = i + 1\nprint(i)\n";
        let bps = SharedBreakpoints::default();
        lock(&bps).set(
            "<string>",
            3,
            Breakpoint {
                temporary: true,
                ..Breakpoint::default()
            },
        );
        // second entry keeps the registry non-empty after the hit
        lock(&bps).set("<string>", 99, Breakpoint::default());
        let mut hook = ScriptedHook::with_default(Resume::Step(StepMode::Continue));
        run(src, "<string>", Arc::clone(&bps), &mut hook).expect("should run");
        assert_eq!(hook.lines, vec![1, 3]);
        assert!(!lock(&bps).contains("<string>", 3));
        assert!(lock(&bps).contains("<string>", 99));
    }

    #[test]
    fn function_name_filter_gates_breakpoint() {
        let src = "def f():\n    return 1\ndef g():\n    return 2\nx = f() + g()\nprint(x)\n";
        let bps = SharedBreakpoints::default();
        lock(&bps).set(
            "<string>",
            2,
            Breakpoint {
                func_name: Some("g".into()),
                ..Breakpoint::default()
            },
        );
        let mut hook = ScriptedHook::with_default(Resume::Step(StepMode::Continue));
        run(src, "<string>", bps, &mut hook).expect("should run");
        // line 2 belongs to f, so the g-only breakpoint never hits
        assert_eq!(hook.lines, vec![1]);
        assert_eq!(hook.outputs, vec!["3"]);
    }

    #[test]
    fn halt_stops_execution() {
        let mut hook = ScriptedHook::stepping();
        hook.plan.push_back(Resume::Halt);
        let err = run(
            "x = 1\ny = 2\n",
            "<string>",
            SharedBreakpoints::default(),
            &mut hook,
        )
        .expect_err("halt should surface");
        assert!(matches!(err, EngineError::Halted));
        assert_eq!(hook.lines, vec![1]);
    }

    #[test]
    fn undefined_name_reports_line() {
        let err = run_err("x = 1\ny = x + z\n");
        assert!(matches!(err, EngineError::Runtime { line: 2, .. }), "{err}");
        assert!(err.to_string().contains("'z' is not defined"), "{err}");
    }

    #[test]
    fn division_by_zero_faults() {
        let err = run_err("print(1 / 0)\n");
        assert!(err.to_string().contains("division by zero"), "{err}");
    }

    #[test]
    fn type_mismatch_faults() {
        let err = run_err("x = 1 + 'a'\n");
        assert!(err.to_string().contains("unsupported operand types"), "{err}");
    }

    #[test]
    fn call_depth_is_bounded() {
        let err = run_err("def f():\n    return f()\nf()\n");
        assert!(err.to_string().contains("maximum call depth"), "{err}");
    }

    #[test]
    fn return_outside_function_faults() {
        let err = run_err("return 1\n");
        assert!(err.to_string().contains("outside function"), "{err}");
    }

    #[test]
    fn wrong_arity_faults() {
        let err = run_err("def f(a):\n    pass\nf(1, 2)\n");
        assert!(err.to_string().contains("takes 1 arguments but 2"), "{err}");
    }
}

use super::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use super::host::{HostApi, HostCall};
use super::value::Value;
use super::{Result, ScriptError};
use std::collections::HashMap;

/// Outcome of a single interpreter step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    /// One statement executed; more remain.
    Progress,
    /// The script invoked a host API; the interpreter is now suspended and
    /// must be fed the call's result via [`Interpreter::resume`].
    HostCall(HostCall),
    /// The program ran to completion.
    Finished,
}

/// Steppable interpreter for one compiled script.
///
/// Execution is modelled as a stack of frames over the statement AST. Each
/// `step` advances by exactly one statement (a loop's condition re-check
/// counts as a statement), which lets a thread manager interleave many
/// scripts fairly on one tick. Host calls are the only suspension points:
/// `step` returns [`StepEvent::HostCall`] and the interpreter stays suspended
/// until [`Interpreter::resume`] delivers the result.
pub struct Interpreter {
    frames: Vec<Frame>,
    vars: HashMap<String, Value>,
    status: Status,
}

enum Status {
    Running,
    /// Suspended on a host call; holds the variable the result is bound to.
    Suspended { target: Option<String> },
    Finished,
}

struct Frame {
    stmts: Vec<Stmt>,
    index: usize,
    kind: FrameKind,
}

enum FrameKind {
    Block,
    Loop { cond: Expr },
}

impl Frame {
    fn block(stmts: Vec<Stmt>) -> Self {
        Self {
            stmts,
            index: 0,
            kind: FrameKind::Block,
        }
    }

    fn repeat(cond: Expr, stmts: Vec<Stmt>) -> Self {
        Self {
            stmts,
            index: 0,
            kind: FrameKind::Loop { cond },
        }
    }
}

impl Interpreter {
    /// Create an interpreter over an already-parsed program.
    pub fn new(program: Vec<Stmt>) -> Self {
        Self {
            frames: vec![Frame::block(program)],
            vars: HashMap::new(),
            status: Status::Running,
        }
    }

    /// Whether the interpreter is suspended on a host call.
    pub fn is_suspended(&self) -> bool {
        matches!(self.status, Status::Suspended { .. })
    }

    /// Whether the program has run to completion.
    pub fn is_finished(&self) -> bool {
        matches!(self.status, Status::Finished)
    }

    /// Current value of a script variable, if bound.
    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Advance execution by one statement.
    ///
    /// Returns an error if called while suspended; the embedder must deliver
    /// the pending host result through [`Interpreter::resume`] first.
    pub fn step(&mut self) -> Result<StepEvent> {
        match self.status {
            Status::Running => {}
            Status::Suspended { .. } => {
                return Err(ScriptError::Contract(
                    "step called while suspended on a host call".to_string(),
                ));
            }
            Status::Finished => return Ok(StepEvent::Finished),
        }

        loop {
            let Some(frame) = self.frames.last_mut() else {
                self.status = Status::Finished;
                return Ok(StepEvent::Finished);
            };

            if frame.index >= frame.stmts.len() {
                let recheck = match &frame.kind {
                    FrameKind::Block => None,
                    FrameKind::Loop { cond } => Some(cond.clone()),
                };
                let Some(cond) = recheck else {
                    self.frames.pop();
                    continue;
                };
                // Wrap-around condition re-check is one step.
                if self.eval(&cond)?.truthy() {
                    if let Some(frame) = self.frames.last_mut() {
                        frame.index = 0;
                    }
                } else {
                    self.frames.pop();
                }
                return Ok(StepEvent::Progress);
            }

            let stmt = frame.stmts[frame.index].clone();
            frame.index += 1;

            return match stmt {
                Stmt::Let { name, expr } => self.exec_binding(Some(name), expr),
                Stmt::Assign { name, expr } => {
                    if !self.vars.contains_key(&name) {
                        return Err(ScriptError::Runtime(format!(
                            "assignment to undefined variable '{}'",
                            name
                        )));
                    }
                    self.exec_binding(Some(name), expr)
                }
                Stmt::Expr(expr) => self.exec_binding(None, expr),
                Stmt::If {
                    cond,
                    then_body,
                    else_body,
                } => {
                    let branch = if self.eval(&cond)?.truthy() {
                        Some(then_body)
                    } else {
                        else_body
                    };
                    if let Some(body) = branch {
                        if !body.is_empty() {
                            self.frames.push(Frame::block(body));
                        }
                    }
                    Ok(StepEvent::Progress)
                }
                Stmt::While { cond, body } => {
                    if self.eval(&cond)?.truthy() && !body.is_empty() {
                        self.frames.push(Frame::repeat(cond, body));
                    }
                    Ok(StepEvent::Progress)
                }
            };
        }
    }

    /// Deliver the result of the pending host call and return to `Running`.
    pub fn resume(&mut self, result: Value) -> Result<()> {
        match std::mem::replace(&mut self.status, Status::Running) {
            Status::Suspended { target } => {
                if let Some(name) = target {
                    self.vars.insert(name, result);
                }
                Ok(())
            }
            other => {
                self.status = other;
                Err(ScriptError::Contract(
                    "resume called while not suspended".to_string(),
                ))
            }
        }
    }

    /// Execute a statement whose expression may be a host call: a plain
    /// expression statement or the right-hand side of `let`/assignment.
    fn exec_binding(&mut self, target: Option<String>, expr: Expr) -> Result<StepEvent> {
        if let Some((name, args)) = as_host_call(&expr) {
            let api = HostApi::from_name(name)
                .ok_or_else(|| ScriptError::UnknownFunction(name.to_string()))?;
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(self.eval(arg)?);
            }
            let params = api.build_params(evaluated)?;
            self.status = Status::Suspended { target };
            return Ok(StepEvent::HostCall(HostCall { api, params }));
        }

        let value = self.eval(&expr)?;
        if let Some(name) = target {
            self.vars.insert(name, value);
        }
        Ok(StepEvent::Progress)
    }

    /// Evaluate a pure expression. Host calls are rejected here: they are
    /// only legal in statement position or as a binding's right-hand side.
    fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::List(values))
            }
            Expr::Var(name) => self
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| ScriptError::Runtime(format!("undefined variable '{}'", name))),
            Expr::Member { object, field } => {
                let object = self.eval(object)?;
                match object {
                    Value::Map(entries) => entries.get(field).cloned().ok_or_else(|| {
                        ScriptError::Runtime(format!("no field '{}' on map", field))
                    }),
                    other => Err(ScriptError::Runtime(format!(
                        "cannot access field '{}' on {}",
                        field,
                        other.type_name()
                    ))),
                }
            }
            Expr::Index { object, index } => {
                let container = self.eval(object)?;
                let index = self.eval(index)?;
                match (container, index) {
                    (Value::List(items), Value::Int(at)) => {
                        let at = usize::try_from(at).map_err(|_| {
                            ScriptError::Runtime(format!("negative list index {}", at))
                        })?;
                        items.get(at).cloned().ok_or_else(|| {
                            ScriptError::Runtime(format!(
                                "list index {} out of bounds (len {})",
                                at,
                                items.len()
                            ))
                        })
                    }
                    (Value::Map(entries), Value::Str(key)) => {
                        entries.get(&key).cloned().ok_or_else(|| {
                            ScriptError::Runtime(format!("no field '{}' on map", key))
                        })
                    }
                    (container, index) => Err(ScriptError::Runtime(format!(
                        "cannot index {} with {}",
                        container.type_name(),
                        index.type_name()
                    ))),
                }
            }
            Expr::Unary { op, expr } => {
                let value = self.eval(expr)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                    UnaryOp::Neg => match value {
                        // Wraps like the other integer operators.
                        Value::Int(num) => Ok(Value::Int(num.wrapping_neg())),
                        Value::Float(num) => Ok(Value::Float(-num)),
                        other => Err(ScriptError::Runtime(format!(
                            "cannot negate {}",
                            other.type_name()
                        ))),
                    },
                }
            }
            Expr::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs),
            Expr::Call { name, .. } => Err(ScriptError::Runtime(format!(
                "host call '{}' must stand alone or be the right-hand side of an assignment",
                name
            ))),
            Expr::Await(inner) => match inner.as_ref() {
                Expr::Call { name, .. } => Err(ScriptError::Runtime(format!(
                    "host call '{}' must stand alone or be the right-hand side of an assignment",
                    name
                ))),
                _ => Err(ScriptError::Runtime(
                    "await is only valid on a host call".to_string(),
                )),
            },
        }
    }

    fn eval_binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value> {
        // Short-circuit operators evaluate the right side lazily.
        match op {
            BinaryOp::Or => {
                let left = self.eval(lhs)?;
                return if left.truthy() { Ok(left) } else { self.eval(rhs) };
            }
            BinaryOp::And => {
                let left = self.eval(lhs)?;
                return if left.truthy() { self.eval(rhs) } else { Ok(left) };
            }
            _ => {}
        }

        let left = self.eval(lhs)?;
        let right = self.eval(rhs)?;
        match op {
            BinaryOp::Eq => Ok(Value::Bool(left == right)),
            BinaryOp::Ne => Ok(Value::Bool(left != right)),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                compare(op, &left, &right)
            }
            BinaryOp::Add => match (&left, &right) {
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
                _ => arithmetic(op, &left, &right, |a, b| a + b),
            },
            BinaryOp::Sub => match (&left, &right) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(*b))),
                _ => arithmetic(op, &left, &right, |a, b| a - b),
            },
            BinaryOp::Mul => match (&left, &right) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(*b))),
                _ => arithmetic(op, &left, &right, |a, b| a * b),
            },
            BinaryOp::Div => {
                if right.as_number() == Some(0.0) {
                    return Err(ScriptError::Runtime("division by zero".to_string()));
                }
                match (&left, &right) {
                    // checked: i64::MIN / -1 overflows.
                    (Value::Int(a), Value::Int(b)) => {
                        a.checked_div(*b).map(Value::Int).ok_or_else(|| {
                            ScriptError::Runtime("integer overflow in division".to_string())
                        })
                    }
                    _ => arithmetic(op, &left, &right, |a, b| a / b),
                }
            }
            BinaryOp::Rem => {
                if right.as_number() == Some(0.0) {
                    return Err(ScriptError::Runtime("division by zero".to_string()));
                }
                match (&left, &right) {
                    (Value::Int(a), Value::Int(b)) => {
                        a.checked_rem(*b).map(Value::Int).ok_or_else(|| {
                            ScriptError::Runtime("integer overflow in remainder".to_string())
                        })
                    }
                    _ => arithmetic(op, &left, &right, |a, b| a % b),
                }
            }
            BinaryOp::Or | BinaryOp::And => unreachable!("handled above"),
        }
    }
}

fn arithmetic(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    apply: impl Fn(f64, f64) -> f64,
) -> Result<Value> {
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => Ok(Value::Float(apply(a, b))),
        _ => Err(ScriptError::Runtime(format!(
            "{:?} expects numbers, found {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        // Exact for int pairs; f64 coercion would collapse values past 2^53.
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    let Some(ordering) = ordering else {
        return Err(ScriptError::Runtime(format!(
            "cannot compare {} with {}",
            left.type_name(),
            right.type_name()
        )));
    };
    let result = match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => unreachable!("compare only handles ordering operators"),
    };
    Ok(Value::Bool(result))
}

/// Recognise the host-call shape at the top level of a statement expression.
fn as_host_call(expr: &Expr) -> Option<(&str, &[Expr])> {
    let call = match expr {
        Expr::Await(inner) => inner.as_ref(),
        other => other,
    };
    match call {
        Expr::Call { name, args } => Some((name.as_str(), args.as_slice())),
        _ => None,
    }
}

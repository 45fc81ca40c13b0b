//! Resumable evaluation.
//!
//! Every node that may have to wait on a child gets a [`Frame`] on an explicit
//! stack. A frame keeps the partial results of its children, so when a
//! breakpoint suspends evaluation the host can later call
//! [`Evaluator::resume`] and each frame picks up where it stopped.

mod accessor;
mod builtins;
mod dynamic_scope;
mod operators;

pub use accessor::{AccessorFrame, AccessorMatcher, CallMatch};
pub use builtins::{standard_globals, visit_value, GlobalContext, StandardGlobals};
pub use dynamic_scope::{CellId, DynamicScope};

use crate::ast::{BinaryOp, DeclId, Expr, ExprKind, FlowBreakKind, FunctionDef, UnaryOp, VarDecl};
use crate::engine::Breakpoints;
use crate::error::EngineError;
use crate::value::{Closure, RuntimeError, Signal, Value};
use std::collections::HashSet;
use std::mem;
use std::rc::Rc;
use tracing::{debug, trace, warn};

const ILLEGAL_FLOW: &str = "Illegal break or continue statement.";

/// Frames allowed on the stack at once. Each live frame also holds a few
/// native stack frames, so this bounds script recursion well before the host
/// thread runs out of stack.
pub const MAX_FRAMES: usize = 256;

/// Position of a frame in the evaluator's stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(usize);

impl FrameId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A possibly not yet evaluated expression.
#[derive(Debug, Clone, Default)]
pub enum PExpr {
    /// Evaluation has not started.
    #[default]
    Unknown,
    /// Evaluation is suspended inside this frame.
    Pending(FrameId),
    Resolved(Value),
}

impl PExpr {
    pub fn is_unknown(&self) -> bool {
        matches!(self, PExpr::Unknown)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, PExpr::Pending(_))
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, PExpr::Resolved(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            PExpr::Resolved(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Default)]
enum FrameState {
    #[default]
    Fresh,
    Binary {
        left: PExpr,
        right: PExpr,
    },
    Unary {
        operand: PExpr,
    },
    Accessor {
        left: PExpr,
        invoke: PExpr,
    },
    Assign {
        target: PExpr,
        value: PExpr,
    },
    IncDec {
        operand: PExpr,
    },
    If {
        condition: PExpr,
        branch: PExpr,
    },
    While {
        condition: PExpr,
        body: PExpr,
        in_body: bool,
    },
    Block {
        registered: bool,
        index: usize,
        current: PExpr,
        last: Value,
    },
    FlowBreak {
        value: PExpr,
    },
    /// Activation of a closure; its frame sits right above the call frame.
    Invoke {
        closure: Rc<Closure>,
        args: Vec<PExpr>,
        registered: bool,
        body: PExpr,
    },
}

impl FrameState {
    fn initial(expr: &Expr) -> FrameState {
        match &expr.kind {
            ExprKind::Binary { .. } => FrameState::Binary {
                left: PExpr::Unknown,
                right: PExpr::Unknown,
            },
            ExprKind::Unary { .. } => FrameState::Unary {
                operand: PExpr::Unknown,
            },
            ExprKind::Member { .. } | ExprKind::Indexer { .. } | ExprKind::Call { .. } => {
                FrameState::Accessor {
                    left: PExpr::Unknown,
                    invoke: PExpr::Unknown,
                }
            }
            ExprKind::Assign { .. } => FrameState::Assign {
                target: PExpr::Unknown,
                value: PExpr::Unknown,
            },
            ExprKind::IncDec { .. } => FrameState::IncDec {
                operand: PExpr::Unknown,
            },
            ExprKind::If { .. } => FrameState::If {
                condition: PExpr::Unknown,
                branch: PExpr::Unknown,
            },
            ExprKind::While { do_while, .. } => FrameState::While {
                condition: PExpr::Unknown,
                body: PExpr::Unknown,
                in_body: *do_while,
            },
            ExprKind::Block { .. } => FrameState::Block {
                registered: false,
                index: 0,
                current: PExpr::Unknown,
                last: Value::Undefined,
            },
            ExprKind::FlowBreak { .. } => FrameState::FlowBreak {
                value: PExpr::Unknown,
            },
            _ => FrameState::Fresh,
        }
    }
}

struct Frame {
    expr: Rc<Expr>,
    result: Option<Value>,
    state: FrameState,
    /// Arguments evaluated for a host accessor that matched this frame.
    call_args: Option<Vec<PExpr>>,
}

/// Evaluates expression trees, suspending at breakpoints.
pub struct Evaluator {
    global: Rc<dyn GlobalContext>,
    scope: DynamicScope,
    frames: Vec<Frame>,
    breakpoints: Breakpoints,
    break_on_next: bool,
    last_error: Option<Rc<RuntimeError>>,
    result: Option<Value>,
    globals: HashSet<DeclId>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(Rc::new(StandardGlobals))
    }
}

impl Evaluator {
    pub fn new(global: Rc<dyn GlobalContext>) -> Self {
        Self {
            global,
            scope: DynamicScope::new(),
            frames: Vec::new(),
            breakpoints: Breakpoints::default(),
            break_on_next: false,
            last_error: None,
            result: None,
            globals: HashSet::new(),
        }
    }

    pub fn global(&self) -> Rc<dyn GlobalContext> {
        Rc::clone(&self.global)
    }

    pub fn set_global(&mut self, global: Rc<dyn GlobalContext>) {
        self.global = global;
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    pub fn breakpoints_mut(&mut self) -> &mut Breakpoints {
        &mut self.breakpoints
    }

    pub fn scope(&self) -> &DynamicScope {
        &self.scope
    }

    /// Registers global-scope declarations that do not have a cell yet. Their
    /// values survive from one evaluation to the next.
    pub fn declare_globals(&mut self, decls: &[Rc<VarDecl>]) {
        for decl in decls {
            if self.globals.insert(decl.id) {
                self.scope.register(decl);
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Result of the last completed evaluation.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Expressions of the live frames, outermost first. The last one is where
    /// evaluation is suspended.
    pub fn frame_stack(&self) -> Vec<Rc<Expr>> {
        self.frames.iter().map(|f| Rc::clone(&f.expr)).collect()
    }

    /// Starts evaluating `expr`. Returns `Pending` when a breakpoint is hit.
    pub fn start(&mut self, expr: &Rc<Expr>) -> Result<PExpr, EngineError> {
        if self.is_pending() {
            return Err(EngineError::AlreadyRunning);
        }
        debug!(location = %expr.location, "start evaluation");
        self.result = None;
        self.last_error = None;
        self.break_on_next = false;
        let outcome = self.visit(expr);
        Ok(self.settle(outcome))
    }

    /// Resumes a suspended evaluation until the next breakpoint or the end.
    pub fn resume(&mut self) -> Result<PExpr, EngineError> {
        if !self.is_pending() {
            return Err(EngineError::NotPending);
        }
        debug!(depth = self.frames.len(), "resume evaluation");
        let outcome = self.run_frame(FrameId(0));
        Ok(self.settle(outcome))
    }

    /// Resumes and suspends again at the next breakable node.
    pub fn step_in(&mut self) -> Result<PExpr, EngineError> {
        if !self.is_pending() {
            return Err(EngineError::NotPending);
        }
        self.break_on_next = true;
        self.resume()
    }

    /// Evaluates `expr` to the end, resuming through every breakpoint.
    pub fn evaluate(&mut self, expr: &Rc<Expr>) -> Result<Value, EngineError> {
        let mut outcome = self.start(expr)?;
        while !outcome.is_resolved() {
            outcome = self.resume()?;
        }
        Ok(self.result.clone().unwrap_or_default())
    }

    /// Abandons a suspended evaluation, releasing the locals of every frame.
    pub fn reset(&mut self) {
        if self.is_pending() {
            debug!(depth = self.frames.len(), "reset evaluation");
            self.pop_frame(FrameId(0));
        }
        self.break_on_next = false;
    }

    pub fn deref(&self, value: &Value) -> Value {
        self.scope.deref(value)
    }

    fn settle(&mut self, outcome: PExpr) -> PExpr {
        match outcome {
            PExpr::Resolved(value) => {
                let value = match value {
                    Value::Signal(s) if s.kind == FlowBreakKind::Return => s.value.clone(),
                    Value::Signal(s) => self.error_value(&s.culprit, ILLEGAL_FLOW),
                    other => self.scope.deref(&other),
                };
                debug!(result = %value, "evaluation finished");
                self.result = Some(value.clone());
                PExpr::Resolved(value)
            }
            pending => {
                if let Some(frame) = self.frames.last() {
                    debug!(location = %frame.expr.location, "evaluation suspended");
                }
                pending
            }
        }
    }

    fn visit(&mut self, expr: &Rc<Expr>) -> PExpr {
        let value = match &expr.kind {
            ExprKind::Constant(v) => v.clone(),
            ExprKind::Nop => Value::Undefined,
            ExprKind::SyntaxError(message) => self.error_value(expr, message.clone()),
            ExprKind::DeclVar(decl) | ExprKind::Variable(decl) => match self.scope.find(decl) {
                Some(cell) => Value::Reference(cell),
                None => self.unregistered(expr, decl),
            },
            ExprKind::Function(def) => self.closure(expr, def),
            _ if self.frames.len() >= MAX_FRAMES => {
                warn!(depth = self.frames.len(), location = %expr.location, "frame limit reached");
                self.error_value(expr, "Maximum call depth exceeded.")
            }
            _ => {
                let id = self.push_frame(Rc::clone(expr), FrameState::initial(expr));
                if expr.is_breakable()
                    && (self.break_on_next || self.breakpoints.should_break(expr))
                {
                    self.break_on_next = false;
                    return PExpr::Pending(id);
                }
                return self.run_frame(id);
            }
        };
        PExpr::Resolved(value)
    }

    /// Steps a frame and pops it once it has a result.
    fn run_frame(&mut self, id: FrameId) -> PExpr {
        let outcome = self.step_out(id);
        if outcome.is_resolved() {
            self.pop_frame(id);
        }
        outcome
    }

    fn step_out(&mut self, id: FrameId) -> PExpr {
        if let Some(result) = &self.frames[id.0].result {
            return PExpr::Resolved(result.clone());
        }
        let outcome = self.do_visit(id);
        if let PExpr::Resolved(v) = &outcome {
            if self.frames[id.0].result.is_none() {
                self.frames[id.0].result = Some(v.clone());
            }
        }
        outcome
    }

    fn resolve_child(&mut self, slot: &mut PExpr, expr: &Rc<Expr>) {
        match slot {
            PExpr::Resolved(_) => {}
            PExpr::Unknown => *slot = self.visit(expr),
            PExpr::Pending(child) => {
                let child = *child;
                *slot = self.run_frame(child);
            }
        }
    }

    /// Resolves a child of frame `id`. `Err` is what the frame returns right
    /// away: its own pending state, or the error or signal it adopts.
    fn child(&mut self, id: FrameId, slot: &mut PExpr, expr: &Rc<Expr>) -> Result<Value, PExpr> {
        let value = self.child_any(id, slot, expr)?;
        if value.is_error_or_signal() {
            return Err(self.resolve(id, value));
        }
        Ok(value)
    }

    /// Like [`Evaluator::child`], but hands errors and signals back to the caller.
    fn child_any(&mut self, id: FrameId, slot: &mut PExpr, expr: &Rc<Expr>) -> Result<Value, PExpr> {
        self.resolve_child(slot, expr);
        match slot {
            PExpr::Resolved(v) => Ok(v.clone()),
            _ => Err(PExpr::Pending(id)),
        }
    }

    /// Like [`Evaluator::child`], but reads a reference once and keeps the
    /// plain value in the slot. A later write in the same expression does not
    /// change an operand that was already evaluated.
    fn child_value(
        &mut self,
        id: FrameId,
        slot: &mut PExpr,
        expr: &Rc<Expr>,
    ) -> Result<Value, PExpr> {
        let value = self.child(id, slot, expr)?;
        let value = self.scope.deref(&value);
        *slot = PExpr::Resolved(value.clone());
        Ok(value)
    }

    fn resolve(&mut self, id: FrameId, value: Value) -> PExpr {
        self.frames[id.0].result = Some(value.clone());
        PExpr::Resolved(value)
    }

    fn push_frame(&mut self, expr: Rc<Expr>, state: FrameState) -> FrameId {
        trace!(depth = self.frames.len(), location = %expr.location, "push frame");
        self.frames.push(Frame {
            expr,
            result: None,
            state,
            call_args: None,
        });
        FrameId(self.frames.len() - 1)
    }

    /// Pops `id` and every frame above it.
    fn pop_frame(&mut self, id: FrameId) {
        while self.frames.len() > id.0 {
            if let Some(frame) = self.frames.pop() {
                trace!(depth = self.frames.len(), location = %frame.expr.location, "pop frame");
                self.dispose(frame);
            }
        }
    }

    fn dispose(&mut self, frame: Frame) {
        match (&frame.expr.kind, frame.state) {
            (
                ExprKind::Block { locals, .. },
                FrameState::Block {
                    registered: true, ..
                },
            ) => {
                for decl in locals.iter().rev() {
                    self.scope.unregister(decl);
                }
            }
            (
                _,
                FrameState::Invoke {
                    closure,
                    registered: true,
                    ..
                },
            ) => {
                for param in closure.def.parameters.iter().rev() {
                    self.scope.unregister(param);
                }
                for (decl, _) in closure.captures.iter().rev() {
                    self.scope.unregister(decl);
                }
            }
            _ => {}
        }
    }

    fn do_visit(&mut self, id: FrameId) -> PExpr {
        let expr = Rc::clone(&self.frames[id.0].expr);
        let mut state = mem::take(&mut self.frames[id.0].state);
        let outcome = match (&expr.kind, &mut state) {
            (
                _,
                FrameState::Invoke {
                    closure,
                    args,
                    registered,
                    body,
                },
            ) => {
                let closure = Rc::clone(closure);
                self.invoke(id, &expr, &closure, args, registered, body)
            }
            (ExprKind::Binary { left, op, right }, FrameState::Binary { left: l, right: r }) => {
                self.binary(id, &expr, (left, l), *op, (right, r))
            }
            (ExprKind::Unary { op, operand }, FrameState::Unary { operand: slot }) => {
                self.unary(id, &expr, *op, operand, slot)
            }
            (_, FrameState::Accessor { left, invoke }) => self.accessor(id, &expr, left, invoke),
            (ExprKind::Assign { target, value }, FrameState::Assign { target: t, value: v }) => {
                self.assign(id, &expr, (target, t), (value, v))
            }
            (
                ExprKind::IncDec {
                    operand,
                    increment,
                    prefix,
                },
                FrameState::IncDec { operand: slot },
            ) => self.inc_dec(id, &expr, (operand, slot), *increment, *prefix),
            (
                ExprKind::If {
                    condition,
                    when_true,
                    when_false,
                    ..
                },
                FrameState::If {
                    condition: c,
                    branch,
                },
            ) => self.if_else(id, (condition, c), when_true, when_false.as_ref(), branch),
            (
                ExprKind::While {
                    condition, body, ..
                },
                FrameState::While {
                    condition: c,
                    body: b,
                    in_body,
                },
            ) => self.while_loop(id, (condition, c), (body, b), in_body),
            (
                ExprKind::Block { statements, locals },
                FrameState::Block {
                    registered,
                    index,
                    current,
                    last,
                },
            ) => {
                if !*registered {
                    for decl in locals {
                        self.scope.register(decl);
                    }
                    *registered = true;
                }
                self.block(id, statements, index, current, last)
            }
            (ExprKind::FlowBreak { kind, value }, FrameState::FlowBreak { value: slot }) => {
                self.flow_break(id, &expr, *kind, value.as_ref(), slot)
            }
            _ => {
                warn!(location = %expr.location, "no frame state for node");
                Ok(Value::Undefined)
            }
        };
        self.frames[id.0].state = state;
        match outcome {
            Ok(value) => self.resolve(id, value),
            Err(outcome) => outcome,
        }
    }

    fn binary(
        &mut self,
        id: FrameId,
        expr: &Rc<Expr>,
        (left, l): (&Rc<Expr>, &mut PExpr),
        op: BinaryOp,
        (right, r): (&Rc<Expr>, &mut PExpr),
    ) -> Result<Value, PExpr> {
        let lv = self.child_value(id, l, left)?;
        match op {
            BinaryOp::And if !lv.to_boolean() => return Ok(lv),
            BinaryOp::Or if lv.to_boolean() => return Ok(lv),
            _ => {}
        }
        let rv = self.child_value(id, r, right)?;
        if op.is_logical() {
            return Ok(rv);
        }
        Ok(match operators::binary(op, &lv, &rv) {
            Ok(v) => v,
            Err(message) => self.error_value(expr, message),
        })
    }

    fn unary(
        &mut self,
        id: FrameId,
        expr: &Rc<Expr>,
        op: UnaryOp,
        operand: &Rc<Expr>,
        slot: &mut PExpr,
    ) -> Result<Value, PExpr> {
        let v = self.child_value(id, slot, operand)?;
        Ok(match operators::unary(op, &v) {
            Ok(v) => v,
            Err(message) => self.error_value(expr, message),
        })
    }

    fn accessor(
        &mut self,
        id: FrameId,
        expr: &Rc<Expr>,
        left: &mut PExpr,
        invoke: &mut PExpr,
    ) -> Result<Value, PExpr> {
        let target = match expr.accessor_left() {
            Some(left_expr) => Some(self.child_value(id, left, left_expr)?),
            None => None,
        };
        // An outer accessor may already have resolved this one.
        if let Some(result) = &self.frames[id.0].result {
            return Ok(result.clone());
        }
        if let (ExprKind::Call { .. }, Some(Value::Function(closure))) = (&expr.kind, &target) {
            return self.call_function(id, expr, closure, invoke);
        }
        let outcome = match &target {
            None => {
                let global = Rc::clone(&self.global);
                global.visit(&mut AccessorFrame::new(self, id))
            }
            Some(value) => visit_value(value, &mut AccessorFrame::new(self, id)),
        };
        match outcome {
            PExpr::Resolved(v) => Ok(self.frames[id.0].result.clone().unwrap_or(v)),
            PExpr::Pending(_) => Err(PExpr::Pending(id)),
            PExpr::Unknown => Ok(self.accessor_error(expr)),
        }
    }

    fn accessor_error(&mut self, expr: &Rc<Expr>) -> Value {
        let message = match &expr.kind {
            ExprKind::Member { left: None, name } => format!("Undefined in scope: {}", name),
            ExprKind::Member { name, .. } => format!("Unknown property: {}", name),
            ExprKind::Indexer { .. } => "Indexer is not supported.".to_string(),
            _ => "Not a function.".to_string(),
        };
        self.error_value(expr, message)
    }

    fn call_function(
        &mut self,
        id: FrameId,
        expr: &Rc<Expr>,
        closure: &Rc<Closure>,
        invoke: &mut PExpr,
    ) -> Result<Value, PExpr> {
        let outcome = match invoke.clone() {
            PExpr::Resolved(v) => return Ok(v),
            PExpr::Pending(frame) => self.run_frame(frame),
            PExpr::Unknown => {
                let state = FrameState::Invoke {
                    closure: Rc::clone(closure),
                    args: vec![PExpr::Unknown; expr.arguments().len()],
                    registered: false,
                    body: PExpr::Unknown,
                };
                let frame = self.push_frame(Rc::clone(expr), state);
                self.run_frame(frame)
            }
        };
        *invoke = outcome.clone();
        match outcome {
            PExpr::Resolved(v) => Ok(v),
            _ => Err(PExpr::Pending(id)),
        }
    }

    fn invoke(
        &mut self,
        id: FrameId,
        expr: &Rc<Expr>,
        closure: &Rc<Closure>,
        args: &mut [PExpr],
        registered: &mut bool,
        body: &mut PExpr,
    ) -> Result<Value, PExpr> {
        for (slot, arg) in args.iter_mut().zip(expr.arguments()) {
            self.child_value(id, slot, arg)?;
        }
        if !*registered {
            for (decl, cell) in &closure.captures {
                self.scope.register_cell(decl, *cell);
            }
            for (i, param) in closure.def.parameters.iter().enumerate() {
                let value = args.get(i).and_then(PExpr::value).cloned().unwrap_or_default();
                let cell = self.scope.register(param);
                self.scope.set(cell, value);
            }
            *registered = true;
        }
        let value = self.child_any(id, body, &closure.def.body)?;
        Ok(match &value {
            Value::Signal(s) if s.kind == FlowBreakKind::Return => s.value.clone(),
            Value::Signal(s) => self.error_value(&s.culprit, ILLEGAL_FLOW),
            Value::Error(_) => value.clone(),
            _ => Value::Undefined,
        })
    }

    fn assign(
        &mut self,
        id: FrameId,
        expr: &Rc<Expr>,
        (target, t): (&Rc<Expr>, &mut PExpr),
        (value, v): (&Rc<Expr>, &mut PExpr),
    ) -> Result<Value, PExpr> {
        let Value::Reference(cell) = self.child(id, t, target)? else {
            return Ok(self.error_value(expr, "Invalid assignment left-hand side."));
        };
        let value = self.child_value(id, v, value)?;
        self.scope.set(cell, value.clone());
        Ok(value)
    }

    fn inc_dec(
        &mut self,
        id: FrameId,
        expr: &Rc<Expr>,
        (operand, slot): (&Rc<Expr>, &mut PExpr),
        increment: bool,
        prefix: bool,
    ) -> Result<Value, PExpr> {
        let Value::Reference(cell) = self.child(id, slot, operand)? else {
            return Ok(self.error_value(expr, "Invalid increment or decrement operand."));
        };
        let old = self.scope.get(cell).to_number();
        let new = if increment { old + 1.0 } else { old - 1.0 };
        self.scope.set(cell, Value::number(new));
        Ok(Value::number(if prefix { new } else { old }))
    }

    fn if_else(
        &mut self,
        id: FrameId,
        (condition, c): (&Rc<Expr>, &mut PExpr),
        when_true: &Rc<Expr>,
        when_false: Option<&Rc<Expr>>,
        branch: &mut PExpr,
    ) -> Result<Value, PExpr> {
        let cv = self.child_value(id, c, condition)?;
        let taken = if cv.to_boolean() {
            Some(when_true)
        } else {
            when_false
        };
        match taken {
            Some(e) => self.child(id, branch, e),
            None => Ok(Value::Undefined),
        }
    }

    fn while_loop(
        &mut self,
        id: FrameId,
        (condition, c): (&Rc<Expr>, &mut PExpr),
        (body, b): (&Rc<Expr>, &mut PExpr),
        in_body: &mut bool,
    ) -> Result<Value, PExpr> {
        loop {
            if !*in_body {
                let cv = self.child_value(id, c, condition)?;
                *c = PExpr::Unknown;
                if !cv.to_boolean() {
                    return Ok(Value::Undefined);
                }
                *in_body = true;
            }
            let bv = self.child_any(id, b, body)?;
            *b = PExpr::Unknown;
            *in_body = false;
            match &bv {
                Value::Signal(s) if s.kind == FlowBreakKind::Break => return Ok(Value::Undefined),
                Value::Signal(s) if s.kind == FlowBreakKind::Continue => {}
                Value::Signal(_) | Value::Error(_) => return Ok(bv.clone()),
                _ => {}
            }
        }
    }

    fn block(
        &mut self,
        id: FrameId,
        statements: &[Rc<Expr>],
        index: &mut usize,
        current: &mut PExpr,
        last: &mut Value,
    ) -> Result<Value, PExpr> {
        while let Some(statement) = statements.get(*index) {
            let v = self.child(id, current, statement)?;
            // Locals die with the block: keep values, not references.
            *last = self.scope.deref(&v);
            *current = PExpr::Unknown;
            *index += 1;
        }
        Ok(mem::take(last))
    }

    fn flow_break(
        &mut self,
        id: FrameId,
        expr: &Rc<Expr>,
        kind: FlowBreakKind,
        value: Option<&Rc<Expr>>,
        slot: &mut PExpr,
    ) -> Result<Value, PExpr> {
        let value = match value {
            Some(e) => self.child_value(id, slot, e)?,
            None => Value::Undefined,
        };
        Ok(Value::Signal(Rc::new(Signal {
            kind,
            culprit: Rc::clone(expr),
            value,
        })))
    }

    fn closure(&mut self, expr: &Rc<Expr>, def: &Rc<FunctionDef>) -> Value {
        let mut captures = Vec::with_capacity(def.closures.len());
        for decl in &def.closures {
            match self.scope.find(decl) {
                Some(cell) => {
                    self.scope.mark_captured(cell);
                    captures.push((Rc::clone(decl), cell));
                }
                None => return self.unregistered(expr, decl),
            }
        }
        let closure = Value::Function(Rc::new(Closure {
            def: Rc::clone(def),
            captures,
        }));
        if let Some(name) = &def.name {
            match self.scope.find(name) {
                Some(cell) => self.scope.set(cell, closure.clone()),
                None => return self.unregistered(expr, name),
            }
        }
        closure
    }

    fn unregistered(&mut self, expr: &Rc<Expr>, decl: &VarDecl) -> Value {
        self.error_value(expr, format!("Unregistered variable: {}", decl.name))
    }

    /// Creates an error value chained to the previous error of this evaluation.
    pub(crate) fn error_value(&mut self, culprit: &Rc<Expr>, message: impl Into<String>) -> Value {
        let error = Rc::new(RuntimeError {
            culprit: Rc::clone(culprit),
            message: message.into(),
            previous: self.last_error.take(),
        });
        debug!(%error, "runtime error");
        self.last_error = Some(Rc::clone(&error));
        Value::Error(error)
    }

    fn frame_expr(&self, id: FrameId) -> &Rc<Expr> {
        &self.frames[id.0].expr
    }

    /// The accessor frame whose left operand is frame `id`.
    fn next_accessor(&self, id: FrameId) -> Option<FrameId> {
        let parent = id.0.checked_sub(1)?;
        let left = self.frames[parent].expr.accessor_left()?;
        (left.id == self.frames[id.0].expr.id).then_some(FrameId(parent))
    }

    /// Sets the result of an accessor frame and of the accessor chain it was
    /// reached from.
    fn set_result(&mut self, id: FrameId, value: Value) -> PExpr {
        self.frames[id.0].result = Some(value.clone());
        let mut parent = id.0;
        while parent + 1 < self.frames.len() {
            let child = parent + 1;
            let linked = self.frames[parent]
                .expr
                .accessor_left()
                .map_or(false, |left| left.id == self.frames[child].expr.id);
            if !linked || self.frames[child].result.is_some() {
                break;
            }
            self.frames[child].result = Some(value.clone());
            parent = child;
        }
        PExpr::Resolved(value)
    }

    /// Evaluates up to `arity` arguments of the accessor frame `id`, keeping
    /// partial results on the frame across suspensions.
    fn accessor_args(&mut self, id: FrameId, arity: usize) -> Result<Vec<Value>, PExpr> {
        let expr = Rc::clone(&self.frames[id.0].expr);
        let arguments = expr.arguments();
        let count = arity.min(arguments.len());
        let mut args = self.frames[id.0]
            .call_args
            .take()
            .unwrap_or_else(|| vec![PExpr::Unknown; count]);
        let mut failed = None;
        for (slot, arg) in args.iter_mut().zip(arguments) {
            self.resolve_child(slot, arg);
            if let PExpr::Resolved(v) = slot {
                *v = self.scope.deref(v);
            }
            match slot {
                PExpr::Resolved(v) if v.is_error_or_signal() => {
                    failed = Some(v.clone());
                    break;
                }
                PExpr::Resolved(_) => {}
                _ => {
                    self.frames[id.0].call_args = Some(args);
                    return Err(PExpr::Pending(id));
                }
            }
        }
        let values = args.iter().filter_map(PExpr::value).cloned().collect();
        self.frames[id.0].call_args = Some(args);
        match failed {
            Some(error) => Err(self.set_result(id, error)),
            None => Ok(values),
        }
    }
}

use super::{Evaluator, FrameId, PExpr};
use crate::ast::{Expr, ExprKind};
use crate::value::Value;
use std::rc::Rc;

/// A member, indexer or call frame handed to a [`GlobalContext`](super::GlobalContext)
/// or a value for resolution.
///
/// `a.b(c)` is three nested accessors: the frame for `a` (unbound member),
/// then `.b`, then the call. A resolver walks outwards from the innermost one
/// with [`AccessorFrame::next_accessor`] and sets the result on the outermost
/// frame it understands; the frames in between get the same result.
pub struct AccessorFrame<'e> {
    ev: &'e mut Evaluator,
    id: FrameId,
}

/// Outcome of [`AccessorFrame::match_call`].
pub enum CallMatch<'f> {
    NoMatch,
    /// An argument is suspended; return this from the resolver.
    Pending(PExpr),
    /// The call frame and its evaluated arguments.
    Ready(AccessorFrame<'f>, Vec<Value>),
}

impl<'e> AccessorFrame<'e> {
    pub(super) fn new(ev: &'e mut Evaluator, id: FrameId) -> Self {
        Self { ev, id }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn expr(&self) -> Rc<Expr> {
        Rc::clone(self.ev.frame_expr(self.id))
    }

    pub fn is_member(&self, name: &str) -> bool {
        self.ev.frame_expr(self.id).is_member(name)
    }

    pub fn is_call(&self) -> bool {
        matches!(self.ev.frame_expr(self.id).kind, ExprKind::Call { .. })
    }

    pub fn is_indexer(&self) -> bool {
        matches!(self.ev.frame_expr(self.id).kind, ExprKind::Indexer { .. })
    }

    /// The accessor this frame is the left operand of.
    pub fn next_accessor(&mut self) -> Option<AccessorFrame<'_>> {
        let next = self.ev.next_accessor(self.id)?;
        Some(AccessorFrame::new(self.ev, next))
    }

    /// `next_accessor` when this frame is the member `name`.
    pub fn match_member(&mut self, name: &str) -> Option<AccessorFrame<'_>> {
        if self.is_member(name) {
            self.next_accessor()
        } else {
            None
        }
    }

    /// Matches `name(...)` and evaluates up to `max_arity` arguments.
    pub fn match_call(&mut self, name: &str, max_arity: usize) -> CallMatch<'_> {
        let Some(call) = self.ev.next_accessor(self.id) else {
            return CallMatch::NoMatch;
        };
        if !self.is_member(name)
            || !matches!(self.ev.frame_expr(call).kind, ExprKind::Call { .. })
        {
            return CallMatch::NoMatch;
        }
        match self.ev.accessor_args(call, max_arity) {
            Ok(args) => CallMatch::Ready(AccessorFrame::new(self.ev, call), args),
            Err(outcome) => CallMatch::Pending(outcome),
        }
    }

    /// Evaluates up to `max_arity` arguments of this call or indexer.
    pub fn arguments(&mut self, max_arity: usize) -> Result<Vec<Value>, PExpr> {
        self.ev.accessor_args(self.id, max_arity)
    }

    pub fn set_result(&mut self, value: impl Into<Value>) -> PExpr {
        self.ev.set_result(self.id, value.into())
    }

    pub fn set_error(&mut self, message: impl Into<String>) -> PExpr {
        let expr = self.expr();
        let error = self.ev.error_value(&expr, message);
        self.ev.set_result(self.id, error)
    }

    pub fn deref(&self, value: &Value) -> Value {
        self.ev.deref(value)
    }

    /// Starts a declarative match at this frame.
    pub fn matcher(&mut self) -> AccessorMatcher<'_, 'e> {
        AccessorMatcher {
            current: Some(self.id),
            frame: self,
            outcome: PExpr::Unknown,
        }
    }

    /// Shorthand for `matcher().on(name)`.
    pub fn on(&mut self, name: &str) -> AccessorMatcher<'_, 'e> {
        self.matcher().on(name)
    }
}

/// Declarative resolver:
///
/// ```ignore
/// frame
///     .matcher()
///     .on("Math").on("max").on_call(2, |f, args| f.set_result(max(&args)))
///     .on("Math").on_get("PI", |f| f.set_result(std::f64::consts::PI))
///     .resolve()
/// ```
///
/// Each `on` follows one member outwards. A handler (`on_call`, `on_index`,
/// `on_get`) ends a chain: the next `on` starts again from the first frame.
/// The first handler that matches wins.
pub struct AccessorMatcher<'f, 'e> {
    frame: &'f mut AccessorFrame<'e>,
    current: Option<FrameId>,
    outcome: PExpr,
}

impl<'f, 'e> AccessorMatcher<'f, 'e> {
    pub fn on(mut self, name: &str) -> Self {
        if self.outcome.is_unknown() {
            let ev = &*self.frame.ev;
            self.current = self
                .current
                .filter(|&id| ev.frame_expr(id).is_member(name))
                .and_then(|id| ev.next_accessor(id));
        }
        self
    }

    /// Handles a call of the current chain, with up to `max_arity` evaluated arguments.
    pub fn on_call(
        mut self,
        max_arity: usize,
        handler: impl FnOnce(&mut AccessorFrame<'_>, Vec<Value>) -> PExpr,
    ) -> Self {
        if let Some(id) = self.candidate(|kind| matches!(kind, ExprKind::Call { .. })) {
            self.outcome = self.run(id, max_arity, handler);
        }
        self.restart()
    }

    /// Handles `[index]` applied to the current chain.
    pub fn on_index(mut self, handler: impl FnOnce(&mut AccessorFrame<'_>, Value) -> PExpr) -> Self {
        if let Some(id) = self.candidate(|kind| matches!(kind, ExprKind::Indexer { .. })) {
            self.outcome = self.run(id, 1, |f, args| {
                handler(f, args.into_iter().next().unwrap_or_default())
            });
        }
        self.restart()
    }

    /// Handles the member `name` itself, read as a value.
    pub fn on_get(mut self, name: &str, handler: impl FnOnce(&mut AccessorFrame<'_>) -> PExpr) -> Self {
        if let Some(id) = self.candidate(|kind| matches!(kind, ExprKind::Member { name: n, .. } if n == name)) {
            let mut winner = AccessorFrame::new(&mut *self.frame.ev, id);
            self.outcome = handler(&mut winner);
        }
        self.restart()
    }

    /// Outcome of the winning handler, `Unknown` when none matched.
    pub fn resolve(self) -> PExpr {
        self.outcome
    }

    fn candidate(&self, test: impl Fn(&ExprKind) -> bool) -> Option<FrameId> {
        if !self.outcome.is_unknown() {
            return None;
        }
        self.current
            .filter(|&id| test(&self.frame.ev.frame_expr(id).kind))
    }

    fn run(
        &mut self,
        winner: FrameId,
        max_arity: usize,
        handler: impl FnOnce(&mut AccessorFrame<'_>, Vec<Value>) -> PExpr,
    ) -> PExpr {
        match self.frame.ev.accessor_args(winner, max_arity) {
            Ok(args) => handler(&mut AccessorFrame::new(&mut *self.frame.ev, winner), args),
            Err(outcome) => outcome,
        }
    }

    fn restart(mut self) -> Self {
        self.current = Some(self.frame.id);
        self
    }
}

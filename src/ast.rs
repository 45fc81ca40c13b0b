use crate::error::SourceLocation;
use crate::lexer::TokenCode;
use crate::value::{number_to_string, quote_string, Value};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Identity of a node, used to set breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// Identity of a variable declaration: two declarations sharing a name are
/// still two distinct storage locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(u64);

#[derive(Debug)]
pub struct VarDecl {
    pub id: DeclId,
    pub name: String,
    pub location: SourceLocation,
}

impl VarDecl {
    pub fn new(name: impl Into<String>, location: SourceLocation) -> Rc<VarDecl> {
        Rc::new(VarDecl {
            id: DeclId(next_id()),
            name: name.into(),
            location,
        })
    }
}

#[derive(Debug)]
pub struct FunctionDef {
    /// Set for `function name(...)`: the declaration the function is stored in.
    pub name: Option<Rc<VarDecl>>,
    pub parameters: Vec<Rc<VarDecl>>,
    pub body: Rc<Expr>,
    /// Declarations of enclosing scopes referenced from the body.
    pub closures: Vec<Rc<VarDecl>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Plus,
    Minus,
    Mult,
    Divide,
    Modulo,
    BitAnd,
    BitOr,
    BitXor,
    LeftShift,
    RightShift,
    UnsignedRightShift,
    Equal,
    Different,
    StrictEqual,
    StrictDifferent,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    InstanceOf,
    And,
    Or,
}

impl BinaryOp {
    pub fn from_token(code: TokenCode) -> Option<BinaryOp> {
        let op = match code {
            TokenCode::PLUS => BinaryOp::Plus,
            TokenCode::MINUS => BinaryOp::Minus,
            TokenCode::MULT => BinaryOp::Mult,
            TokenCode::DIVIDE => BinaryOp::Divide,
            TokenCode::MODULO => BinaryOp::Modulo,
            TokenCode::BIT_AND => BinaryOp::BitAnd,
            TokenCode::BIT_OR => BinaryOp::BitOr,
            TokenCode::BIT_XOR => BinaryOp::BitXor,
            TokenCode::LEFT_SHIFT => BinaryOp::LeftShift,
            TokenCode::RIGHT_SHIFT => BinaryOp::RightShift,
            TokenCode::UNSIGNED_RIGHT_SHIFT => BinaryOp::UnsignedRightShift,
            TokenCode::EQUAL => BinaryOp::Equal,
            TokenCode::DIFFERENT => BinaryOp::Different,
            TokenCode::STRICT_EQUAL => BinaryOp::StrictEqual,
            TokenCode::STRICT_DIFFERENT => BinaryOp::StrictDifferent,
            TokenCode::LESS => BinaryOp::Less,
            TokenCode::GREATER => BinaryOp::Greater,
            TokenCode::LESS_OR_EQUAL => BinaryOp::LessOrEqual,
            TokenCode::GREATER_OR_EQUAL => BinaryOp::GreaterOrEqual,
            TokenCode::INSTANCEOF => BinaryOp::InstanceOf,
            TokenCode::AND => BinaryOp::And,
            TokenCode::OR => BinaryOp::Or,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Mult => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::LeftShift => "<<",
            BinaryOp::RightShift => ">>",
            BinaryOp::UnsignedRightShift => ">>>",
            BinaryOp::Equal => "==",
            BinaryOp::Different => "!=",
            BinaryOp::StrictEqual => "===",
            BinaryOp::StrictDifferent => "!==",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::InstanceOf => "instanceof",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
    BitNot,
    TypeOf,
    Void,
    Delete,
    New,
}

impl UnaryOp {
    pub fn from_token(code: TokenCode) -> Option<UnaryOp> {
        let op = match code {
            TokenCode::MINUS => UnaryOp::Minus,
            TokenCode::PLUS => UnaryOp::Plus,
            TokenCode::NOT => UnaryOp::Not,
            TokenCode::BIT_NOT => UnaryOp::BitNot,
            TokenCode::TYPEOF => UnaryOp::TypeOf,
            TokenCode::VOID => UnaryOp::Void,
            TokenCode::DELETE => UnaryOp::Delete,
            TokenCode::NEW => UnaryOp::New,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Minus => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::TypeOf => "typeof ",
            UnaryOp::Void => "void ",
            UnaryOp::Delete => "delete ",
            UnaryOp::New => "new ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowBreakKind {
    Break,
    Continue,
    Return,
}

impl FlowBreakKind {
    pub fn keyword(self) -> &'static str {
        match self {
            FlowBreakKind::Break => "break",
            FlowBreakKind::Continue => "continue",
            FlowBreakKind::Return => "return",
        }
    }
}

#[derive(Debug)]
pub enum ExprKind {
    Constant(Value),
    /// `left.name`, or a name resolved by the global context when `left` is `None`.
    Member {
        left: Option<Rc<Expr>>,
        name: String,
    },
    Indexer {
        left: Rc<Expr>,
        index: Rc<Expr>,
    },
    Call {
        left: Rc<Expr>,
        arguments: Vec<Rc<Expr>>,
    },
    Binary {
        left: Rc<Expr>,
        op: BinaryOp,
        right: Rc<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Rc<Expr>,
    },
    Assign {
        target: Rc<Expr>,
        value: Rc<Expr>,
    },
    IncDec {
        operand: Rc<Expr>,
        increment: bool,
        prefix: bool,
    },
    If {
        condition: Rc<Expr>,
        when_true: Rc<Expr>,
        when_false: Option<Rc<Expr>>,
        ternary: bool,
    },
    While {
        condition: Rc<Expr>,
        body: Rc<Expr>,
        do_while: bool,
    },
    Block {
        statements: Vec<Rc<Expr>>,
        locals: Vec<Rc<VarDecl>>,
    },
    /// `var name`: the declaration site.
    DeclVar(Rc<VarDecl>),
    /// A use of a declared variable.
    Variable(Rc<VarDecl>),
    Function(Rc<FunctionDef>),
    FlowBreak {
        kind: FlowBreakKind,
        value: Option<Rc<Expr>>,
    },
    Nop,
    SyntaxError(String),
}

#[derive(Debug)]
pub struct Expr {
    pub id: NodeId,
    pub location: SourceLocation,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(location: SourceLocation, kind: ExprKind) -> Rc<Expr> {
        Rc::new(Expr {
            id: NodeId(next_id()),
            location,
            kind,
        })
    }

    pub fn syntax_error(location: SourceLocation, message: impl Into<String>) -> Rc<Expr> {
        Expr::new(location, ExprKind::SyntaxError(message.into()))
    }

    /// Whether evaluation may suspend before this node.
    pub fn is_breakable(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Binary { .. }
                | ExprKind::If { .. }
                | ExprKind::While { .. }
                | ExprKind::Assign { .. }
                | ExprKind::IncDec { .. }
                | ExprKind::FlowBreak { .. }
                | ExprKind::Indexer { .. }
                | ExprKind::Call { .. }
        )
    }

    pub fn is_syntax_error(&self) -> bool {
        matches!(self.kind, ExprKind::SyntaxError(_))
    }

    /// Member, indexer and call nodes: the ones resolved through the accessor protocol.
    pub fn is_accessor(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Member { .. } | ExprKind::Indexer { .. } | ExprKind::Call { .. }
        )
    }

    /// Nodes that can stand on the left of an assignment.
    pub fn is_assignable(&self) -> bool {
        self.is_accessor() || matches!(self.kind, ExprKind::Variable(_) | ExprKind::DeclVar(_))
    }

    pub fn is_member(&self, name: &str) -> bool {
        matches!(&self.kind, ExprKind::Member { name: n, .. } if n == name)
    }

    pub fn is_unbound_member(&self) -> bool {
        matches!(&self.kind, ExprKind::Member { left: None, .. })
    }

    /// Left operand of an accessor.
    pub fn accessor_left(&self) -> Option<&Rc<Expr>> {
        match &self.kind {
            ExprKind::Member { left, .. } => left.as_ref(),
            ExprKind::Indexer { left, .. } | ExprKind::Call { left, .. } => Some(left),
            _ => None,
        }
    }

    /// Arguments of a call, or the index of an indexer.
    pub fn arguments(&self) -> &[Rc<Expr>] {
        match &self.kind {
            ExprKind::Indexer { index, .. } => std::slice::from_ref(index),
            ExprKind::Call { arguments, .. } => arguments,
            _ => &[],
        }
    }
}

/// Read-only traversal.
///
/// [`Visitor::visit`] dispatches on the node kind to one `visit_*` method per
/// variant. Each default continues into the children through the matching
/// `walk_*` function, so an override that still wants the children calls it.
pub trait Visitor {
    fn visit(&mut self, expr: &Rc<Expr>) {
        walk(self, expr);
    }

    fn visit_constant(&mut self, expr: &Rc<Expr>, value: &Value) {
        let _ = (expr, value);
    }

    fn visit_member(&mut self, expr: &Rc<Expr>, left: Option<&Rc<Expr>>, name: &str) {
        let _ = (expr, name);
        walk_member(self, left);
    }

    fn visit_indexer(&mut self, expr: &Rc<Expr>, left: &Rc<Expr>, index: &Rc<Expr>) {
        let _ = expr;
        walk_indexer(self, left, index);
    }

    fn visit_call(&mut self, expr: &Rc<Expr>, left: &Rc<Expr>, arguments: &[Rc<Expr>]) {
        let _ = expr;
        walk_call(self, left, arguments);
    }

    fn visit_binary(&mut self, expr: &Rc<Expr>, left: &Rc<Expr>, op: BinaryOp, right: &Rc<Expr>) {
        let _ = (expr, op);
        walk_binary(self, left, right);
    }

    fn visit_unary(&mut self, expr: &Rc<Expr>, op: UnaryOp, operand: &Rc<Expr>) {
        let _ = (expr, op);
        self.visit(operand);
    }

    fn visit_assign(&mut self, expr: &Rc<Expr>, target: &Rc<Expr>, value: &Rc<Expr>) {
        let _ = expr;
        walk_assign(self, target, value);
    }

    fn visit_inc_dec(&mut self, expr: &Rc<Expr>, operand: &Rc<Expr>) {
        let _ = expr;
        self.visit(operand);
    }

    fn visit_if(
        &mut self,
        expr: &Rc<Expr>,
        condition: &Rc<Expr>,
        when_true: &Rc<Expr>,
        when_false: Option<&Rc<Expr>>,
    ) {
        let _ = expr;
        walk_if(self, condition, when_true, when_false);
    }

    fn visit_while(&mut self, expr: &Rc<Expr>, condition: &Rc<Expr>, body: &Rc<Expr>) {
        let _ = expr;
        walk_while(self, condition, body);
    }

    fn visit_block(&mut self, expr: &Rc<Expr>, statements: &[Rc<Expr>], locals: &[Rc<VarDecl>]) {
        let _ = (expr, locals);
        walk_block(self, statements);
    }

    fn visit_decl_var(&mut self, expr: &Rc<Expr>, decl: &Rc<VarDecl>) {
        let _ = (expr, decl);
    }

    fn visit_variable(&mut self, expr: &Rc<Expr>, decl: &Rc<VarDecl>) {
        let _ = (expr, decl);
    }

    fn visit_function(&mut self, expr: &Rc<Expr>, def: &Rc<FunctionDef>) {
        let _ = expr;
        self.visit(&def.body);
    }

    fn visit_flow_break(&mut self, expr: &Rc<Expr>, kind: FlowBreakKind, value: Option<&Rc<Expr>>) {
        let _ = (expr, kind);
        if let Some(value) = value {
            self.visit(value);
        }
    }

    fn visit_nop(&mut self, expr: &Rc<Expr>) {
        let _ = expr;
    }

    fn visit_syntax_error(&mut self, expr: &Rc<Expr>, message: &str) {
        let _ = (expr, message);
    }
}

/// Calls the `visit_*` method matching the kind of `expr`.
pub fn walk<V: Visitor + ?Sized>(visitor: &mut V, expr: &Rc<Expr>) {
    match &expr.kind {
        ExprKind::Constant(value) => visitor.visit_constant(expr, value),
        ExprKind::Member { left, name } => visitor.visit_member(expr, left.as_ref(), name),
        ExprKind::Indexer { left, index } => visitor.visit_indexer(expr, left, index),
        ExprKind::Call { left, arguments } => visitor.visit_call(expr, left, arguments),
        ExprKind::Binary { left, op, right } => visitor.visit_binary(expr, left, *op, right),
        ExprKind::Unary { op, operand } => visitor.visit_unary(expr, *op, operand),
        ExprKind::Assign { target, value } => visitor.visit_assign(expr, target, value),
        ExprKind::IncDec { operand, .. } => visitor.visit_inc_dec(expr, operand),
        ExprKind::If {
            condition,
            when_true,
            when_false,
            ..
        } => visitor.visit_if(expr, condition, when_true, when_false.as_ref()),
        ExprKind::While {
            condition, body, ..
        } => visitor.visit_while(expr, condition, body),
        ExprKind::Block { statements, locals } => visitor.visit_block(expr, statements, locals),
        ExprKind::DeclVar(decl) => visitor.visit_decl_var(expr, decl),
        ExprKind::Variable(decl) => visitor.visit_variable(expr, decl),
        ExprKind::Function(def) => visitor.visit_function(expr, def),
        ExprKind::FlowBreak { kind, value } => visitor.visit_flow_break(expr, *kind, value.as_ref()),
        ExprKind::Nop => visitor.visit_nop(expr),
        ExprKind::SyntaxError(message) => visitor.visit_syntax_error(expr, message),
    }
}

pub fn walk_member<V: Visitor + ?Sized>(visitor: &mut V, left: Option<&Rc<Expr>>) {
    if let Some(left) = left {
        visitor.visit(left);
    }
}

pub fn walk_indexer<V: Visitor + ?Sized>(visitor: &mut V, left: &Rc<Expr>, index: &Rc<Expr>) {
    visitor.visit(left);
    visitor.visit(index);
}

pub fn walk_call<V: Visitor + ?Sized>(visitor: &mut V, left: &Rc<Expr>, arguments: &[Rc<Expr>]) {
    visitor.visit(left);
    for argument in arguments {
        visitor.visit(argument);
    }
}

pub fn walk_binary<V: Visitor + ?Sized>(visitor: &mut V, left: &Rc<Expr>, right: &Rc<Expr>) {
    visitor.visit(left);
    visitor.visit(right);
}

pub fn walk_assign<V: Visitor + ?Sized>(visitor: &mut V, target: &Rc<Expr>, value: &Rc<Expr>) {
    visitor.visit(target);
    visitor.visit(value);
}

pub fn walk_if<V: Visitor + ?Sized>(
    visitor: &mut V,
    condition: &Rc<Expr>,
    when_true: &Rc<Expr>,
    when_false: Option<&Rc<Expr>>,
) {
    visitor.visit(condition);
    visitor.visit(when_true);
    if let Some(when_false) = when_false {
        visitor.visit(when_false);
    }
}

pub fn walk_while<V: Visitor + ?Sized>(visitor: &mut V, condition: &Rc<Expr>, body: &Rc<Expr>) {
    visitor.visit(condition);
    visitor.visit(body);
}

pub fn walk_block<V: Visitor + ?Sized>(visitor: &mut V, statements: &[Rc<Expr>]) {
    for statement in statements {
        visitor.visit(statement);
    }
}

/// Rebuilding traversal: a visitor that changes a subtree builds new nodes.
///
/// A node is rebuilt only when one of its children came back as a different
/// `Rc`. Untouched subtrees are returned as they are, so their identity and
/// any breakpoint set on them survive the rewrite.
pub trait Rewriter {
    fn rewrite(&mut self, expr: &Rc<Expr>) -> Rc<Expr> {
        rewrite_children(self, expr)
    }
}

fn rewrite_child<R: Rewriter + ?Sized>(
    rewriter: &mut R,
    expr: &Rc<Expr>,
    changed: &mut bool,
) -> Rc<Expr> {
    let rewritten = rewriter.rewrite(expr);
    *changed |= !Rc::ptr_eq(&rewritten, expr);
    rewritten
}

/// Rewrites the children of `expr`. Returns `expr` itself when none changed.
pub fn rewrite_children<R: Rewriter + ?Sized>(rewriter: &mut R, expr: &Rc<Expr>) -> Rc<Expr> {
    let mut changed = false;
    let kind = match &expr.kind {
        ExprKind::Constant(_)
        | ExprKind::DeclVar(_)
        | ExprKind::Variable(_)
        | ExprKind::Nop
        | ExprKind::SyntaxError(_)
        | ExprKind::Member { left: None, .. } => return Rc::clone(expr),
        ExprKind::Member {
            left: Some(left),
            name,
        } => ExprKind::Member {
            left: Some(rewrite_child(rewriter, left, &mut changed)),
            name: name.clone(),
        },
        ExprKind::Indexer { left, index } => ExprKind::Indexer {
            left: rewrite_child(rewriter, left, &mut changed),
            index: rewrite_child(rewriter, index, &mut changed),
        },
        ExprKind::Call { left, arguments } => ExprKind::Call {
            left: rewrite_child(rewriter, left, &mut changed),
            arguments: arguments
                .iter()
                .map(|a| rewrite_child(rewriter, a, &mut changed))
                .collect(),
        },
        ExprKind::Binary { left, op, right } => ExprKind::Binary {
            left: rewrite_child(rewriter, left, &mut changed),
            op: *op,
            right: rewrite_child(rewriter, right, &mut changed),
        },
        ExprKind::Unary { op, operand } => ExprKind::Unary {
            op: *op,
            operand: rewrite_child(rewriter, operand, &mut changed),
        },
        ExprKind::Assign { target, value } => ExprKind::Assign {
            target: rewrite_child(rewriter, target, &mut changed),
            value: rewrite_child(rewriter, value, &mut changed),
        },
        ExprKind::IncDec {
            operand,
            increment,
            prefix,
        } => ExprKind::IncDec {
            operand: rewrite_child(rewriter, operand, &mut changed),
            increment: *increment,
            prefix: *prefix,
        },
        ExprKind::If {
            condition,
            when_true,
            when_false,
            ternary,
        } => ExprKind::If {
            condition: rewrite_child(rewriter, condition, &mut changed),
            when_true: rewrite_child(rewriter, when_true, &mut changed),
            when_false: when_false
                .as_ref()
                .map(|e| rewrite_child(rewriter, e, &mut changed)),
            ternary: *ternary,
        },
        ExprKind::While {
            condition,
            body,
            do_while,
        } => ExprKind::While {
            condition: rewrite_child(rewriter, condition, &mut changed),
            body: rewrite_child(rewriter, body, &mut changed),
            do_while: *do_while,
        },
        ExprKind::Block { statements, locals } => ExprKind::Block {
            statements: statements
                .iter()
                .map(|s| rewrite_child(rewriter, s, &mut changed))
                .collect(),
            locals: locals.clone(),
        },
        ExprKind::Function(def) => ExprKind::Function(Rc::new(FunctionDef {
            name: def.name.clone(),
            parameters: def.parameters.clone(),
            body: rewrite_child(rewriter, &def.body, &mut changed),
            closures: def.closures.clone(),
        })),
        ExprKind::FlowBreak { kind, value } => ExprKind::FlowBreak {
            kind: *kind,
            value: value
                .as_ref()
                .map(|e| rewrite_child(rewriter, e, &mut changed)),
        },
    };
    if changed {
        Expr::new(expr.location, kind)
    } else {
        Rc::clone(expr)
    }
}

/// Collects syntax error nodes and, optionally, the names left unresolved
/// for the global context.
#[derive(Debug, Default)]
pub struct SyntaxErrorCollector {
    pub errors: Vec<Rc<Expr>>,
    pub unbound: Vec<Rc<Expr>>,
    collect_unbound: bool,
}

impl SyntaxErrorCollector {
    pub fn new(collect_unbound: bool) -> Self {
        Self {
            collect_unbound,
            ..Self::default()
        }
    }

    pub fn collect(expr: &Rc<Expr>, collect_unbound: bool) -> Self {
        let mut collector = Self::new(collect_unbound);
        collector.visit(expr);
        collector
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl Visitor for SyntaxErrorCollector {
    fn visit_syntax_error(&mut self, expr: &Rc<Expr>, _message: &str) {
        self.errors.push(Rc::clone(expr));
    }

    fn visit_member(&mut self, expr: &Rc<Expr>, left: Option<&Rc<Expr>>, _name: &str) {
        if left.is_none() && self.collect_unbound {
            self.unbound.push(Rc::clone(expr));
        }
        walk_member(self, left);
    }
}

// Printing produces fully parenthesized source that parses back to the same tree.

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ExprKind::Constant(v) => match v {
                Value::String(s) => write!(f, "{}", quote_string(s)),
                Value::Number(n) if *n < 0.0 => write!(f, "(-{})", number_to_string(-n)),
                Value::Number(n) => write!(f, "{}", number_to_string(*n)),
                other => write!(f, "{}", other),
            },
            ExprKind::Member { left: None, name } => write!(f, "{}", name),
            ExprKind::Member {
                left: Some(left),
                name,
            } => write!(f, "{}.{}", left, name),
            ExprKind::Indexer { left, index } => write!(f, "{}[{}]", left, index),
            ExprKind::Call { left, arguments } => {
                write!(f, "{}(", left)?;
                write_list(f, arguments)?;
                write!(f, ")")
            }
            ExprKind::Binary { left, op, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            ExprKind::Unary { op, operand } => write!(f, "({}{})", op.symbol(), operand),
            ExprKind::Assign { target, value } => match &target.kind {
                ExprKind::DeclVar(_) => write!(f, "{} = {}", target, value),
                _ => write!(f, "({} = {})", target, value),
            },
            ExprKind::IncDec {
                operand,
                increment,
                prefix,
            } => {
                let op = if *increment { "++" } else { "--" };
                if *prefix {
                    write!(f, "({}{})", op, operand)
                } else {
                    write!(f, "({}{})", operand, op)
                }
            }
            ExprKind::If {
                condition,
                when_true,
                when_false,
                ternary: true,
            } => {
                write!(f, "({} ? {} : ", condition, when_true)?;
                match when_false {
                    Some(e) => write!(f, "{})", e),
                    None => write!(f, "undefined)"),
                }
            }
            ExprKind::If {
                condition,
                when_true,
                when_false,
                ..
            } => {
                write!(f, "if ({}) ", condition)?;
                write_braced(f, when_true)?;
                if let Some(e) = when_false {
                    write!(f, " else ")?;
                    write_braced(f, e)?;
                }
                Ok(())
            }
            ExprKind::While {
                condition,
                body,
                do_while: false,
            } => {
                write!(f, "while ({}) ", condition)?;
                write_braced(f, body)
            }
            ExprKind::While {
                condition, body, ..
            } => {
                write!(f, "do ")?;
                write_braced(f, body)?;
                write!(f, " while ({})", condition)
            }
            ExprKind::Block { statements, locals } => {
                if locals.is_empty() && statements.len() > 1 && statements.iter().all(is_declarator)
                {
                    // `var a = 1, b = 2` parses into a block without locals.
                    write!(f, "var ")?;
                    for (i, s) in statements.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", s.to_string().trim_start_matches("var "))?;
                    }
                    return Ok(());
                }
                write!(f, "{{ ")?;
                for s in statements {
                    write!(f, "{}; ", s)?;
                }
                write!(f, "}}")
            }
            ExprKind::DeclVar(decl) => write!(f, "var {}", decl.name),
            ExprKind::Variable(decl) => write!(f, "{}", decl.name),
            ExprKind::Function(def) => write!(f, "{}", def),
            ExprKind::FlowBreak { kind, value: None } => write!(f, "{}", kind.keyword()),
            ExprKind::FlowBreak {
                kind,
                value: Some(v),
            } => write!(f, "{} {}", kind.keyword(), v),
            ExprKind::Nop => Ok(()),
            ExprKind::SyntaxError(message) => write!(f, "\u{2039}error: {}\u{203a}", message),
        }
    }
}

impl fmt::Display for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "function ")?;
        if let Some(name) = &self.name {
            write!(f, "{}", name.name)?;
        }
        write!(f, "(")?;
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p.name)?;
        }
        write!(f, ") ")?;
        write_braced(f, &self.body)
    }
}

fn is_declarator(e: &Rc<Expr>) -> bool {
    match &e.kind {
        ExprKind::DeclVar(_) => true,
        ExprKind::Assign { target, .. } => matches!(target.kind, ExprKind::DeclVar(_)),
        _ => false,
    }
}

fn write_list(f: &mut fmt::Formatter, items: &[Rc<Expr>]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_braced(f: &mut fmt::Formatter, e: &Rc<Expr>) -> fmt::Result {
    match e.kind {
        ExprKind::Block { .. } if !is_var_list(e) => write!(f, "{}", e),
        _ => write!(f, "{{ {}; }}", e),
    }
}

fn is_var_list(e: &Expr) -> bool {
    matches!(&e.kind, ExprKind::Block { statements, locals }
        if locals.is_empty() && statements.len() > 1 && statements.iter().all(is_declarator))
}

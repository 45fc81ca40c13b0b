use crate::ast::{BinaryOp, DeclId, Expr, ExprKind, FlowBreakKind, FunctionDef, UnaryOp, VarDecl};
use crate::error::SourceLocation;
use crate::lexer::{Lexer, TokenCode};
use crate::scope::{ScopeOptions, StaticScope};
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{debug, warn};

/// Parse helpers fail with the syntax error node to put in the tree.
type ParseResult<T> = Result<T, Rc<Expr>>;

/// Binding power used for the operand of a prefix operator: postfix `++`/`--`
/// and member access still bind to the operand.
const UNARY_OPERAND: i32 = 27;

#[derive(Default)]
struct FunctionContext {
    closures: Vec<Rc<VarDecl>>,
    seen: HashSet<DeclId>,
}

/// Precedence climbing analyser. Parsing never fails: syntax errors become
/// [`ExprKind::SyntaxError`] nodes and analysis stops at the first one.
pub struct Parser {
    lexer: Lexer,
    scope: StaticScope,
    functions: Vec<FunctionContext>,
    decl_depths: HashMap<DeclId, usize>,
    has_error: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(ScopeOptions::default())
    }
}

impl Parser {
    pub fn new(options: ScopeOptions) -> Self {
        Self {
            lexer: Lexer::default(),
            scope: StaticScope::new(options),
            functions: Vec::new(),
            decl_depths: HashMap::new(),
            has_error: false,
        }
    }

    pub fn scope(&self) -> &StaticScope {
        &self.scope
    }

    pub fn parse(&mut self, source: &str) -> Rc<Expr> {
        self.analyse(Lexer::new(source))
    }

    /// Analyses the whole input of `lexer` into a single tree.
    pub fn analyse(&mut self, lexer: Lexer) -> Rc<Expr> {
        self.lexer = lexer;
        self.has_error = false;
        self.functions.clear();

        let location = self.lexer.location();
        let global = self.scope.options().global_scope;
        if !global {
            self.scope.open_scope();
        }
        let top = self.scope.depth();
        let mut statements = self.statements(None);
        if statements.is_empty() && !self.has_error {
            statements.push(self.unexpected("expression"));
        }
        self.scope.close_to(top);
        let locals = if global {
            Vec::new()
        } else {
            match self.scope.close_scope() {
                Ok(locals) => locals,
                Err(e) => {
                    warn!(error = %e, "top level scope was already closed");
                    Vec::new()
                }
            }
        };
        debug!(
            statements = statements.len(),
            locals = locals.len(),
            has_error = self.has_error,
            "analysed source"
        );
        let end = self.lexer.prev_location();
        make_block(location.extend(end), statements, locals)
    }

    fn statements(&mut self, closing: Option<TokenCode>) -> Vec<Rc<Expr>> {
        let mut statements = Vec::new();
        while !self.has_error {
            match closing {
                Some(code) if self.lexer.matches(code) => break,
                None if self.lexer.is_end_of_input() => break,
                _ => {}
            }
            statements.push(self.statement());
        }
        statements
    }

    fn statement(&mut self) -> Rc<Expr> {
        let e = self.expression(0);
        self.lexer.matches(TokenCode::SEMICOLON);
        e
    }

    pub fn expression(&mut self, min_bp: i32) -> Rc<Expr> {
        if self.lexer.is_error_or_end_of_input() {
            return self.unexpected("expression");
        }
        let mut left = match self.nud(min_bp) {
            Ok(e) | Err(e) => e,
        };
        while !self.has_error && self.lexer.precedence() > min_bp && self.has_led() {
            left = match self.led(left) {
                Ok(e) | Err(e) => e,
            };
        }
        left
    }

    fn error(&mut self, location: SourceLocation, message: impl Into<String>) -> Rc<Expr> {
        self.has_error = true;
        Expr::syntax_error(location, message)
    }

    /// Error for the current token when `expected` was required.
    fn unexpected(&mut self, expected: &str) -> Rc<Expr> {
        let token = self.lexer.current_token();
        let message = if token.is_error() {
            token.explain()
        } else {
            format!("Expected {} but found {}.", expected, token.explain())
        };
        let location = self.lexer.location();
        self.error(location, message)
    }

    fn expect(&mut self, code: TokenCode) -> ParseResult<()> {
        if self.lexer.matches(code) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", code.explain())))
        }
    }

    fn span_from(&self, start: SourceLocation) -> SourceLocation {
        start.extend(self.lexer.prev_location())
    }

    fn nud(&mut self, min_bp: i32) -> ParseResult<Rc<Expr>> {
        let location = self.lexer.location();
        let token = self.lexer.current_token();

        if let Some(n) = self.lexer.read_number() {
            return Ok(Expr::new(location, ExprKind::Constant(Value::Number(n))));
        }
        if let Some(s) = self.lexer.read_string() {
            return Ok(Expr::new(location, ExprKind::Constant(Value::string(s))));
        }
        if token.is_regex() {
            return Err(self.error(location, "Regular expressions are not supported."));
        }
        if token == TokenCode::INCREMENT || token == TokenCode::DECREMENT {
            self.lexer.forward();
            let operand = self.expression(UNARY_OPERAND);
            if operand.is_syntax_error() {
                return Err(operand);
            }
            if !operand.is_assignable() {
                return Err(self.error(operand.location, "Invalid increment or decrement operand."));
            }
            return Ok(Expr::new(
                self.span_from(location),
                ExprKind::IncDec {
                    operand,
                    increment: token == TokenCode::INCREMENT,
                    prefix: true,
                },
            ));
        }
        if let Some(op) = UnaryOp::from_token(token) {
            self.lexer.forward();
            let operand = self.expression(UNARY_OPERAND);
            return Ok(Expr::new(
                self.span_from(location),
                ExprKind::Unary { op, operand },
            ));
        }
        if token.is_identifier() {
            return self.identifier(location);
        }
        if self.lexer.matches(TokenCode::OPEN_PAR) {
            let e = self.expression(0);
            if e.is_syntax_error() {
                return Err(e);
            }
            self.expect(TokenCode::CLOSE_PAR)?;
            return Ok(e);
        }
        if self.lexer.matches(TokenCode::OPEN_CURLY) {
            return Ok(self.block(location));
        }
        if token == TokenCode::SEMICOLON && min_bp == 0 {
            return Ok(Expr::new(location, ExprKind::Nop));
        }
        Err(self.unexpected("expression"))
    }

    fn has_led(&self) -> bool {
        let t = self.lexer.current_token();
        t.is_binary_operator()
            || t.is_compare_operator()
            || t.is_logical()
            || t.is_assign_operator()
            || t == TokenCode::DOT
            || t == TokenCode::OPEN_PAR
            || t == TokenCode::OPEN_SQUARE
            || t == TokenCode::QUESTION_MARK
            || t == TokenCode::INCREMENT
            || t == TokenCode::DECREMENT
    }

    fn led(&mut self, left: Rc<Expr>) -> ParseResult<Rc<Expr>> {
        let token = self.lexer.current_token();
        let precedence = token.precedence();

        if token.is_logical() {
            self.lexer.forward();
            let right = self.expression(precedence - 1);
            return Ok(binary(left, binary_op(token), right));
        }
        if token.is_binary_operator() || token.is_compare_operator() {
            self.lexer.forward();
            let right = self.expression(precedence);
            return Ok(binary(left, binary_op(token), right));
        }
        if self.lexer.matches(TokenCode::DOT) {
            let name = match self.lexer.read_identifier() {
                Some(name) => name,
                None => return Err(self.unexpected("member name")),
            };
            return Ok(Expr::new(
                self.span_from(left.location),
                ExprKind::Member {
                    left: Some(left),
                    name,
                },
            ));
        }
        if self.lexer.matches(TokenCode::OPEN_SQUARE) {
            let index = self.expression(0);
            if index.is_syntax_error() {
                return Err(index);
            }
            self.expect(TokenCode::CLOSE_SQUARE)?;
            return Ok(Expr::new(
                self.span_from(left.location),
                ExprKind::Indexer { left, index },
            ));
        }
        if self.lexer.matches(TokenCode::OPEN_PAR) {
            let arguments = self.arguments()?;
            return Ok(Expr::new(
                self.span_from(left.location),
                ExprKind::Call { left, arguments },
            ));
        }
        if self.lexer.matches(TokenCode::QUESTION_MARK) {
            let when_true = self.expression(TokenCode::ASSIGN.precedence() - 1);
            if when_true.is_syntax_error() {
                return Err(when_true);
            }
            self.expect(TokenCode::COLON)?;
            let when_false = self.expression(precedence - 1);
            return Ok(Expr::new(
                left.location.extend(when_false.location),
                ExprKind::If {
                    condition: left,
                    when_true,
                    when_false: Some(when_false),
                    ternary: true,
                },
            ));
        }
        if token.is_assign_operator() {
            if !left.is_assignable() {
                return Err(self.error(left.location, "Invalid assignment target."));
            }
            self.lexer.forward();
            let mut value = self.expression(precedence - 1);
            if let Some(op) = token.compound_operator() {
                value = binary(Rc::clone(&left), binary_op(op), value);
            }
            return Ok(Expr::new(
                left.location.extend(value.location),
                ExprKind::Assign {
                    target: left,
                    value,
                },
            ));
        }
        if token == TokenCode::INCREMENT || token == TokenCode::DECREMENT {
            if !left.is_assignable() {
                return Err(self.error(left.location, "Invalid increment or decrement operand."));
            }
            self.lexer.forward();
            return Ok(Expr::new(
                self.span_from(left.location),
                ExprKind::IncDec {
                    operand: left,
                    increment: token == TokenCode::INCREMENT,
                    prefix: false,
                },
            ));
        }
        Err(self.unexpected("operator"))
    }

    fn arguments(&mut self) -> ParseResult<Vec<Rc<Expr>>> {
        let mut arguments = Vec::new();
        if self.lexer.matches(TokenCode::CLOSE_PAR) {
            return Ok(arguments);
        }
        loop {
            let arg = self.expression(TokenCode::COMMA.precedence());
            if arg.is_syntax_error() {
                return Err(arg);
            }
            arguments.push(arg);
            if !self.lexer.matches(TokenCode::COMMA) {
                break;
            }
        }
        self.expect(TokenCode::CLOSE_PAR)?;
        Ok(arguments)
    }

    fn identifier(&mut self, location: SourceLocation) -> ParseResult<Rc<Expr>> {
        let name = self.lexer.text().to_string();
        let constant = match name.as_str() {
            "true" => Some(Value::Boolean(true)),
            "false" => Some(Value::Boolean(false)),
            "null" => Some(Value::Null),
            "undefined" => Some(Value::Undefined),
            _ => None,
        };
        if let Some(value) = constant {
            self.lexer.forward();
            return Ok(Expr::new(location, ExprKind::Constant(value)));
        }
        match name.as_str() {
            "if" => return self.if_statement(location),
            "while" => return self.while_statement(location),
            "do" => return self.do_while_statement(location),
            "var" => return self.var_statement(location),
            "function" => return self.function(location),
            "break" => return Ok(self.flow_break(location, FlowBreakKind::Break)),
            "continue" => return Ok(self.flow_break(location, FlowBreakKind::Continue)),
            "return" => return self.return_statement(location),
            "else" => return Err(self.error(location, "Unexpected 'else'.")),
            _ => {}
        }
        self.lexer.forward();
        let kind = match self.scope.find(&name).cloned() {
            Some(decl) => {
                self.use_declaration(&decl);
                ExprKind::Variable(decl)
            }
            None => ExprKind::Member { left: None, name },
        };
        Ok(Expr::new(location, kind))
    }

    /// Records `decl` as a free variable of every open function nested below
    /// the one that declares it.
    fn use_declaration(&mut self, decl: &Rc<VarDecl>) {
        let depth = self.decl_depths.get(&decl.id).copied().unwrap_or(0);
        for function in self.functions.iter_mut().skip(depth) {
            if function.seen.insert(decl.id) {
                function.closures.push(Rc::clone(decl));
            }
        }
    }

    fn declare(&mut self, name: String, location: SourceLocation) -> ParseResult<Rc<VarDecl>> {
        let decl = VarDecl::new(name, location);
        if let Err(message) = self.scope.declare(Rc::clone(&decl)) {
            return Err(self.error(location, message));
        }
        self.decl_depths.insert(decl.id, self.functions.len());
        Ok(decl)
    }

    fn block(&mut self, location: SourceLocation) -> Rc<Expr> {
        self.scope.open_scope();
        let statements = self.statements(Some(TokenCode::CLOSE_CURLY));
        let locals = match self.scope.close_scope() {
            Ok(locals) => locals,
            Err(e) => {
                warn!(error = %e, "block scope was already closed");
                Vec::new()
            }
        };
        make_block(self.span_from(location), statements, locals)
    }

    fn condition(&mut self) -> ParseResult<Rc<Expr>> {
        self.expect(TokenCode::OPEN_PAR)?;
        let condition = self.expression(0);
        if condition.is_syntax_error() {
            return Err(condition);
        }
        self.expect(TokenCode::CLOSE_PAR)?;
        Ok(condition)
    }

    fn if_statement(&mut self, location: SourceLocation) -> ParseResult<Rc<Expr>> {
        self.lexer.forward();
        let condition = self.condition()?;
        let when_true = self.statement();
        let when_false = if !self.has_error && self.lexer.match_identifier("else") {
            Some(self.statement())
        } else {
            None
        };
        Ok(Expr::new(
            self.span_from(location),
            ExprKind::If {
                condition,
                when_true,
                when_false,
                ternary: false,
            },
        ))
    }

    fn while_statement(&mut self, location: SourceLocation) -> ParseResult<Rc<Expr>> {
        self.lexer.forward();
        let condition = self.condition()?;
        let body = self.statement();
        Ok(Expr::new(
            self.span_from(location),
            ExprKind::While {
                condition,
                body,
                do_while: false,
            },
        ))
    }

    fn do_while_statement(&mut self, location: SourceLocation) -> ParseResult<Rc<Expr>> {
        self.lexer.forward();
        let body = self.statement();
        if body.is_syntax_error() {
            return Err(body);
        }
        if !self.lexer.match_identifier("while") {
            return Err(self.unexpected("'while'"));
        }
        let condition = self.condition()?;
        Ok(Expr::new(
            self.span_from(location),
            ExprKind::While {
                condition,
                body,
                do_while: true,
            },
        ))
    }

    fn var_statement(&mut self, location: SourceLocation) -> ParseResult<Rc<Expr>> {
        self.lexer.forward();
        let mut declarations = Vec::new();
        loop {
            let decl_location = self.lexer.location();
            let name = match self.lexer.read_identifier() {
                Some(name) => name,
                None => return Err(self.unexpected("variable name")),
            };
            let decl = self.declare(name, decl_location)?;
            let target = Expr::new(decl_location, ExprKind::DeclVar(decl));
            let declaration = if self.lexer.matches(TokenCode::ASSIGN) {
                let value = self.expression(TokenCode::COMMA.precedence());
                Expr::new(
                    decl_location.extend(value.location),
                    ExprKind::Assign { target, value },
                )
            } else {
                target
            };
            declarations.push(declaration);
            if self.has_error || !self.lexer.matches(TokenCode::COMMA) {
                break;
            }
        }
        Ok(make_block(self.span_from(location), declarations, Vec::new()))
    }

    fn function(&mut self, location: SourceLocation) -> ParseResult<Rc<Expr>> {
        self.lexer.forward();
        let name = match self.lexer.read_identifier() {
            Some(name) => {
                let name_location = self.lexer.prev_location();
                Some(self.declare(name, name_location)?)
            }
            None => None,
        };

        self.scope.open_scope();
        self.functions.push(FunctionContext::default());
        let signature = self.function_signature_and_body();
        let context = self.functions.pop().unwrap_or_default();
        if let Err(e) = self.scope.close_scope() {
            warn!(error = %e, "function scope was already closed");
        }
        let (parameters, body) = signature?;

        let def = FunctionDef {
            name,
            parameters,
            body,
            closures: context.closures,
        };
        Ok(Expr::new(
            self.span_from(location),
            ExprKind::Function(Rc::new(def)),
        ))
    }

    fn function_signature_and_body(&mut self) -> ParseResult<(Vec<Rc<VarDecl>>, Rc<Expr>)> {
        self.expect(TokenCode::OPEN_PAR)?;
        let mut parameters = Vec::new();
        if !self.lexer.matches(TokenCode::CLOSE_PAR) {
            loop {
                let location = self.lexer.location();
                let name = match self.lexer.read_identifier() {
                    Some(name) => name,
                    None => return Err(self.unexpected("parameter name")),
                };
                parameters.push(self.declare(name, location)?);
                if !self.lexer.matches(TokenCode::COMMA) {
                    break;
                }
            }
            self.expect(TokenCode::CLOSE_PAR)?;
        }
        let body_location = self.lexer.location();
        self.expect(TokenCode::OPEN_CURLY)?;
        let body = self.block(body_location);
        if self.has_error {
            return Err(body);
        }
        Ok((parameters, body))
    }

    fn flow_break(&mut self, location: SourceLocation, kind: FlowBreakKind) -> Rc<Expr> {
        self.lexer.forward();
        Expr::new(location, ExprKind::FlowBreak { kind, value: None })
    }

    fn return_statement(&mut self, location: SourceLocation) -> ParseResult<Rc<Expr>> {
        self.lexer.forward();
        let token = self.lexer.current_token();
        let value = if token == TokenCode::SEMICOLON
            || token == TokenCode::CLOSE_CURLY
            || token.is_end_of_input()
        {
            None
        } else {
            let value = self.expression(0);
            if value.is_syntax_error() {
                return Err(value);
            }
            Some(value)
        };
        Ok(Expr::new(
            self.span_from(location),
            ExprKind::FlowBreak {
                kind: FlowBreakKind::Return,
                value,
            },
        ))
    }
}

/// Parses `source` with the default scope options.
pub fn parse(source: &str) -> Rc<Expr> {
    Parser::default().parse(source)
}

fn binary_op(code: TokenCode) -> BinaryOp {
    // Only called for tokens of the binary, compare and logical classes.
    BinaryOp::from_token(code).unwrap_or(BinaryOp::Plus)
}

fn binary(left: Rc<Expr>, op: BinaryOp, right: Rc<Expr>) -> Rc<Expr> {
    Expr::new(
        left.location.extend(right.location),
        ExprKind::Binary { left, op, right },
    )
}

/// A block of one statement without locals is that statement.
fn make_block(
    location: SourceLocation,
    mut statements: Vec<Rc<Expr>>,
    locals: Vec<Rc<VarDecl>>,
) -> Rc<Expr> {
    if statements.len() == 1 && locals.is_empty() {
        if let Some(single) = statements.pop() {
            return single;
        }
    }
    Expr::new(location, ExprKind::Block { statements, locals })
}

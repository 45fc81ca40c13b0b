use crate::error::{SourceLocation, Span};
use std::fmt;

/// Classified token code.
///
/// The code is a bitfield: the sign bit marks errors and end of input, bits 8..20
/// hold the token class flags and bits 20..24 hold the operator level. The low
/// byte distinguishes tokens inside a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TokenCode(i32);

const LEVEL_SHIFT: i32 = 20;
const LEVEL_MASK: i32 = 15 << LEVEL_SHIFT;

const fn level(n: i32) -> i32 {
    n << LEVEL_SHIFT
}

const ASSIGN: i32 = 1 << 8;
const BINARY: i32 = 1 << 9;
const COMPARE: i32 = 1 << 10;
const LOGICAL: i32 = 1 << 11;
const UNARY: i32 = 1 << 12;
const PUNCTUATION: i32 = 1 << 13;
const BRACKET: i32 = 1 << 14;
const IDENTIFIER: i32 = 1 << 15;
const NUMBER: i32 = 1 << 16;
const STRING: i32 = 1 << 17;
const COMMENT: i32 = 1 << 18;
const REGEX: i32 = 1 << 19;

const ERROR_OR_END: i32 = i32::MIN;
const END: i32 = ERROR_OR_END | 1 << 30;
const ERROR: i32 = ERROR_OR_END | 1 << 29;
const ERROR_STRING: i32 = ERROR | 1 << 28;
const ERROR_NUMBER: i32 = ERROR | 1 << 27;
const ERROR_REGEX: i32 = ERROR | 1 << 26;

impl TokenCode {
    pub const NONE: TokenCode = TokenCode(0);

    pub const END_OF_INPUT: TokenCode = TokenCode(END);
    pub const ERROR_INVALID_CHAR: TokenCode = TokenCode(ERROR | 1);
    pub const ERROR_STRING_UNTERMINATED: TokenCode = TokenCode(ERROR_STRING | 1);
    pub const ERROR_STRING_UNICODE_VALUE: TokenCode = TokenCode(ERROR_STRING | 2);
    pub const ERROR_STRING_HEXA_VALUE: TokenCode = TokenCode(ERROR_STRING | 3);
    pub const ERROR_STRING_CR_IN_CONTINUATION: TokenCode = TokenCode(ERROR_STRING | 4);
    pub const ERROR_NUMBER_UNTERMINATED: TokenCode = TokenCode(ERROR_NUMBER | 1);
    pub const ERROR_NUMBER_VALUE: TokenCode = TokenCode(ERROR_NUMBER | 2);
    pub const ERROR_NUMBER_IDENTIFIER_STARTS_IMMEDIATELY: TokenCode = TokenCode(ERROR_NUMBER | 3);
    pub const ERROR_REGEX_UNTERMINATED: TokenCode = TokenCode(ERROR_REGEX | 1);

    pub const IDENTIFIER: TokenCode = TokenCode(IDENTIFIER);
    pub const STRING: TokenCode = TokenCode(STRING);
    pub const REGEX: TokenCode = TokenCode(REGEX);
    pub const FLOAT: TokenCode = TokenCode(NUMBER | 1);
    pub const INTEGER: TokenCode = TokenCode(NUMBER | 2);
    pub const HEX_NUMBER: TokenCode = TokenCode(NUMBER | 3);
    pub const NAN: TokenCode = TokenCode(NUMBER | 4);
    pub const INFINITY: TokenCode = TokenCode(NUMBER | 5);
    pub const STAR_COMMENT: TokenCode = TokenCode(COMMENT | 1);
    pub const LINE_COMMENT: TokenCode = TokenCode(COMMENT | 2);

    pub const COMMA: TokenCode = TokenCode(PUNCTUATION | level(1) | 1);
    pub const QUESTION_MARK: TokenCode = TokenCode(PUNCTUATION | level(3) | 2);
    pub const COLON: TokenCode = TokenCode(PUNCTUATION | 3);
    pub const SEMICOLON: TokenCode = TokenCode(PUNCTUATION | 4);
    pub const DOT: TokenCode = TokenCode(PUNCTUATION | level(15) | 5);

    pub const OPEN_PAR: TokenCode = TokenCode(BRACKET | level(15) | 1);
    pub const CLOSE_PAR: TokenCode = TokenCode(BRACKET | 2);
    pub const OPEN_SQUARE: TokenCode = TokenCode(BRACKET | level(15) | 3);
    pub const CLOSE_SQUARE: TokenCode = TokenCode(BRACKET | 4);
    pub const OPEN_CURLY: TokenCode = TokenCode(BRACKET | 5);
    pub const CLOSE_CURLY: TokenCode = TokenCode(BRACKET | 6);

    pub const ASSIGN: TokenCode = TokenCode(ASSIGN | level(2) | 1);
    pub const PLUS_ASSIGN: TokenCode = TokenCode(ASSIGN | level(2) | 2);
    pub const MINUS_ASSIGN: TokenCode = TokenCode(ASSIGN | level(2) | 3);
    pub const MULT_ASSIGN: TokenCode = TokenCode(ASSIGN | level(2) | 4);
    pub const DIVIDE_ASSIGN: TokenCode = TokenCode(ASSIGN | level(2) | 5);
    pub const MODULO_ASSIGN: TokenCode = TokenCode(ASSIGN | level(2) | 6);
    pub const LEFT_SHIFT_ASSIGN: TokenCode = TokenCode(ASSIGN | level(2) | 7);
    pub const RIGHT_SHIFT_ASSIGN: TokenCode = TokenCode(ASSIGN | level(2) | 8);
    pub const UNSIGNED_RIGHT_SHIFT_ASSIGN: TokenCode = TokenCode(ASSIGN | level(2) | 9);
    pub const BIT_AND_ASSIGN: TokenCode = TokenCode(ASSIGN | level(2) | 10);
    pub const BIT_OR_ASSIGN: TokenCode = TokenCode(ASSIGN | level(2) | 11);
    pub const BIT_XOR_ASSIGN: TokenCode = TokenCode(ASSIGN | level(2) | 12);

    pub const OR: TokenCode = TokenCode(LOGICAL | level(4) | 1);
    pub const AND: TokenCode = TokenCode(LOGICAL | level(5) | 2);

    pub const BIT_OR: TokenCode = TokenCode(BINARY | level(6) | 1);
    pub const BIT_XOR: TokenCode = TokenCode(BINARY | level(7) | 2);
    pub const BIT_AND: TokenCode = TokenCode(BINARY | level(8) | 3);
    pub const LEFT_SHIFT: TokenCode = TokenCode(BINARY | level(11) | 4);
    pub const RIGHT_SHIFT: TokenCode = TokenCode(BINARY | level(11) | 5);
    pub const UNSIGNED_RIGHT_SHIFT: TokenCode = TokenCode(BINARY | level(11) | 6);
    pub const PLUS: TokenCode = TokenCode(BINARY | level(12) | 7);
    pub const MINUS: TokenCode = TokenCode(BINARY | level(12) | 8);
    pub const MULT: TokenCode = TokenCode(BINARY | level(13) | 9);
    pub const DIVIDE: TokenCode = TokenCode(BINARY | level(13) | 10);
    pub const MODULO: TokenCode = TokenCode(BINARY | level(13) | 11);

    pub const EQUAL: TokenCode = TokenCode(COMPARE | level(9) | 1);
    pub const DIFFERENT: TokenCode = TokenCode(COMPARE | level(9) | 2);
    pub const STRICT_EQUAL: TokenCode = TokenCode(COMPARE | level(9) | 3);
    pub const STRICT_DIFFERENT: TokenCode = TokenCode(COMPARE | level(9) | 4);
    pub const LESS: TokenCode = TokenCode(COMPARE | level(10) | 5);
    pub const GREATER: TokenCode = TokenCode(COMPARE | level(10) | 6);
    pub const LESS_OR_EQUAL: TokenCode = TokenCode(COMPARE | level(10) | 7);
    pub const GREATER_OR_EQUAL: TokenCode = TokenCode(COMPARE | level(10) | 8);
    pub const INSTANCEOF: TokenCode = TokenCode(COMPARE | level(10) | 9);

    pub const NOT: TokenCode = TokenCode(UNARY | level(14) | 1);
    pub const BIT_NOT: TokenCode = TokenCode(UNARY | level(14) | 2);
    pub const INCREMENT: TokenCode = TokenCode(UNARY | level(14) | 3);
    pub const DECREMENT: TokenCode = TokenCode(UNARY | level(14) | 4);
    pub const TYPEOF: TokenCode = TokenCode(UNARY | level(14) | 5);
    pub const VOID: TokenCode = TokenCode(UNARY | level(14) | 6);
    pub const DELETE: TokenCode = TokenCode(UNARY | level(14) | 7);
    pub const NEW: TokenCode = TokenCode(UNARY | level(14) | 8);

    pub fn bits(self) -> i32 {
        self.0
    }

    pub fn is_error_or_end_of_input(self) -> bool {
        self.0 < 0
    }

    pub fn is_end_of_input(self) -> bool {
        self.0 == END
    }

    pub fn is_error(self) -> bool {
        self.0 & ERROR == ERROR
    }

    /// Binding power of the token: the operator level shifted left by one so
    /// that right associative operators can recurse at `precedence - 1`.
    pub fn precedence(self) -> i32 {
        ((self.0 & LEVEL_MASK) >> LEVEL_SHIFT) << 1
    }

    fn has(self, class: i32) -> bool {
        self.0 >= 0 && self.0 & class != 0
    }

    pub fn is_assign_operator(self) -> bool {
        self.has(ASSIGN)
    }

    pub fn is_binary_operator(self) -> bool {
        self.has(BINARY)
    }

    pub fn is_compare_operator(self) -> bool {
        self.has(COMPARE)
    }

    pub fn is_logical(self) -> bool {
        self.has(LOGICAL)
    }

    pub fn is_unary_operator(self) -> bool {
        self.has(UNARY)
    }

    pub fn is_punctuation(self) -> bool {
        self.has(PUNCTUATION)
    }

    pub fn is_bracket(self) -> bool {
        self.has(BRACKET)
    }

    pub fn is_identifier(self) -> bool {
        self.has(IDENTIFIER)
    }

    pub fn is_number(self) -> bool {
        self.has(NUMBER)
    }

    pub fn is_string(self) -> bool {
        self.has(STRING)
    }

    pub fn is_comment(self) -> bool {
        self.has(COMMENT)
    }

    pub fn is_regex(self) -> bool {
        self.has(REGEX)
    }

    /// Operator a compound assignment token stands for (`+=` gives `+`).
    pub fn compound_operator(self) -> Option<TokenCode> {
        let op = match self {
            TokenCode::PLUS_ASSIGN => TokenCode::PLUS,
            TokenCode::MINUS_ASSIGN => TokenCode::MINUS,
            TokenCode::MULT_ASSIGN => TokenCode::MULT,
            TokenCode::DIVIDE_ASSIGN => TokenCode::DIVIDE,
            TokenCode::MODULO_ASSIGN => TokenCode::MODULO,
            TokenCode::LEFT_SHIFT_ASSIGN => TokenCode::LEFT_SHIFT,
            TokenCode::RIGHT_SHIFT_ASSIGN => TokenCode::RIGHT_SHIFT,
            TokenCode::UNSIGNED_RIGHT_SHIFT_ASSIGN => TokenCode::UNSIGNED_RIGHT_SHIFT,
            TokenCode::BIT_AND_ASSIGN => TokenCode::BIT_AND,
            TokenCode::BIT_OR_ASSIGN => TokenCode::BIT_OR,
            TokenCode::BIT_XOR_ASSIGN => TokenCode::BIT_XOR,
            _ => return None,
        };
        Some(op)
    }

    /// Source text of an operator or punctuation token, if it has a fixed one.
    pub fn text(self) -> Option<&'static str> {
        let text = match self {
            TokenCode::COMMA => ",",
            TokenCode::QUESTION_MARK => "?",
            TokenCode::COLON => ":",
            TokenCode::SEMICOLON => ";",
            TokenCode::DOT => ".",
            TokenCode::OPEN_PAR => "(",
            TokenCode::CLOSE_PAR => ")",
            TokenCode::OPEN_SQUARE => "[",
            TokenCode::CLOSE_SQUARE => "]",
            TokenCode::OPEN_CURLY => "{",
            TokenCode::CLOSE_CURLY => "}",
            TokenCode::ASSIGN => "=",
            TokenCode::PLUS_ASSIGN => "+=",
            TokenCode::MINUS_ASSIGN => "-=",
            TokenCode::MULT_ASSIGN => "*=",
            TokenCode::DIVIDE_ASSIGN => "/=",
            TokenCode::MODULO_ASSIGN => "%=",
            TokenCode::LEFT_SHIFT_ASSIGN => "<<=",
            TokenCode::RIGHT_SHIFT_ASSIGN => ">>=",
            TokenCode::UNSIGNED_RIGHT_SHIFT_ASSIGN => ">>>=",
            TokenCode::BIT_AND_ASSIGN => "&=",
            TokenCode::BIT_OR_ASSIGN => "|=",
            TokenCode::BIT_XOR_ASSIGN => "^=",
            TokenCode::OR => "||",
            TokenCode::AND => "&&",
            TokenCode::BIT_OR => "|",
            TokenCode::BIT_XOR => "^",
            TokenCode::BIT_AND => "&",
            TokenCode::LEFT_SHIFT => "<<",
            TokenCode::RIGHT_SHIFT => ">>",
            TokenCode::UNSIGNED_RIGHT_SHIFT => ">>>",
            TokenCode::PLUS => "+",
            TokenCode::MINUS => "-",
            TokenCode::MULT => "*",
            TokenCode::DIVIDE => "/",
            TokenCode::MODULO => "%",
            TokenCode::EQUAL => "==",
            TokenCode::DIFFERENT => "!=",
            TokenCode::STRICT_EQUAL => "===",
            TokenCode::STRICT_DIFFERENT => "!==",
            TokenCode::LESS => "<",
            TokenCode::GREATER => ">",
            TokenCode::LESS_OR_EQUAL => "<=",
            TokenCode::GREATER_OR_EQUAL => ">=",
            TokenCode::INSTANCEOF => "instanceof",
            TokenCode::NOT => "!",
            TokenCode::BIT_NOT => "~",
            TokenCode::INCREMENT => "++",
            TokenCode::DECREMENT => "--",
            TokenCode::TYPEOF => "typeof",
            TokenCode::VOID => "void",
            TokenCode::DELETE => "delete",
            TokenCode::NEW => "new",
            TokenCode::NAN => "NaN",
            TokenCode::INFINITY => "Infinity",
            _ => return None,
        };
        Some(text)
    }

    /// Human readable description of the token, used in syntax error messages.
    pub fn explain(self) -> String {
        if let Some(text) = self.text() {
            return text.to_string();
        }
        let text = match self {
            TokenCode::END_OF_INPUT => "end of input",
            TokenCode::ERROR_INVALID_CHAR => "invalid character",
            TokenCode::ERROR_STRING_UNTERMINATED => "unterminated string",
            TokenCode::ERROR_STRING_UNICODE_VALUE => "invalid \\u escape in string (4 hex digits expected)",
            TokenCode::ERROR_STRING_HEXA_VALUE => "invalid \\x escape in string (2 hex digits expected)",
            TokenCode::ERROR_STRING_CR_IN_CONTINUATION => "carriage return without line feed in string line continuation",
            TokenCode::ERROR_NUMBER_UNTERMINATED => "unterminated number",
            TokenCode::ERROR_NUMBER_VALUE => "invalid number value",
            TokenCode::ERROR_NUMBER_IDENTIFIER_STARTS_IMMEDIATELY => "identifier starts immediately after number",
            TokenCode::ERROR_REGEX_UNTERMINATED => "unterminated regular expression",
            TokenCode::STAR_COMMENT => "/* comment */",
            TokenCode::LINE_COMMENT => "// comment",
            c if c.is_identifier() => "identifier",
            c if c.is_string() => "string",
            c if c.is_number() => "number",
            c if c.is_regex() => "regular expression",
            c if c.is_error() => "error",
            _ => "unknown token",
        };
        text.to_string()
    }
}

impl fmt::Display for TokenCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.explain())
    }
}

/// Pull tokenizer: `reset` loads a text and reads its first token, `forward`
/// moves to the next one. Once an error or the end of input is reached the
/// tokenizer stays there.
pub struct Lexer {
    source: Vec<char>,
    current: usize,
    line: u32,
    column: u32,
    skip_comments: bool,
    token: TokenCode,
    prev_non_comment: TokenCode,
    location: SourceLocation,
    prev_location: SourceLocation,
    text: String,
    number: f64,
}

impl Default for Lexer {
    fn default() -> Self {
        Self {
            source: Vec::new(),
            current: 0,
            line: 1,
            column: 1,
            skip_comments: true,
            token: TokenCode::END_OF_INPUT,
            prev_non_comment: TokenCode::NONE,
            location: SourceLocation::default(),
            prev_location: SourceLocation::default(),
            text: String::new(),
            number: 0.0,
        }
    }
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        let mut lexer = Self::default();
        lexer.reset(source);
        lexer
    }

    /// Comments are skipped unless this is turned off, in which case they are
    /// reported as `STAR_COMMENT` or `LINE_COMMENT` tokens.
    pub fn with_comments(source: &str) -> Self {
        let mut lexer = Self {
            skip_comments: false,
            ..Self::default()
        };
        lexer.reset(source);
        lexer
    }

    pub fn reset(&mut self, source: &str) -> bool {
        self.source = source.chars().collect();
        self.current = 0;
        self.line = 1;
        self.column = 1;
        self.token = TokenCode::NONE;
        self.prev_non_comment = TokenCode::NONE;
        self.prev_location = SourceLocation::new(Span::new(0, 0), 1, 1);
        self.forward()
    }

    /// Reads the next token. Returns false on error or end of input.
    pub fn forward(&mut self) -> bool {
        if self.token.is_error_or_end_of_input() {
            return false;
        }
        if self.token != TokenCode::NONE {
            self.prev_location = self.location;
        }
        loop {
            self.token = self.next_token();
            if !self.token.is_comment() {
                self.prev_non_comment = self.token;
                break;
            }
            if !self.skip_comments {
                break;
            }
        }
        !self.token.is_error_or_end_of_input()
    }

    pub fn current_token(&self) -> TokenCode {
        self.token
    }

    pub fn location(&self) -> SourceLocation {
        self.location
    }

    /// Location of the token read before the current one.
    pub fn prev_location(&self) -> SourceLocation {
        self.prev_location
    }

    pub fn precedence(&self) -> i32 {
        self.token.precedence()
    }

    pub fn is_error_or_end_of_input(&self) -> bool {
        self.token.is_error_or_end_of_input()
    }

    pub fn is_end_of_input(&self) -> bool {
        self.token.is_end_of_input()
    }

    pub fn is_error(&self) -> bool {
        self.token.is_error()
    }

    pub fn is_number(&self) -> bool {
        self.token.is_number()
    }

    pub fn is_string(&self) -> bool {
        self.token.is_string()
    }

    pub fn is_identifier(&self) -> bool {
        self.token.is_identifier()
    }

    pub fn is_regex(&self) -> bool {
        self.token.is_regex()
    }

    pub fn is_comment(&self) -> bool {
        self.token.is_comment()
    }

    pub fn is_assign_operator(&self) -> bool {
        self.token.is_assign_operator()
    }

    pub fn is_binary_operator(&self) -> bool {
        self.token.is_binary_operator()
    }

    pub fn is_compare_operator(&self) -> bool {
        self.token.is_compare_operator()
    }

    pub fn is_logical(&self) -> bool {
        self.token.is_logical()
    }

    pub fn is_unary_operator(&self) -> bool {
        self.token.is_unary_operator()
    }

    pub fn is_identifier_named(&self, name: &str) -> bool {
        self.token.is_identifier() && self.text == name
    }

    /// Text of the current identifier, string, regex or comment.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Value of the current number token.
    pub fn number(&self) -> f64 {
        self.number
    }

    /// Consumes the current token if it is `code`.
    pub fn matches(&mut self, code: TokenCode) -> bool {
        if self.token == code {
            self.forward();
            true
        } else {
            false
        }
    }

    pub fn match_identifier(&mut self, name: &str) -> bool {
        if self.is_identifier_named(name) {
            self.forward();
            true
        } else {
            false
        }
    }

    pub fn read_number(&mut self) -> Option<f64> {
        if !self.is_number() {
            return None;
        }
        let value = self.number;
        self.forward();
        Some(value)
    }

    pub fn read_string(&mut self) -> Option<String> {
        if !self.is_string() {
            return None;
        }
        let value = std::mem::take(&mut self.text);
        self.forward();
        Some(value)
    }

    pub fn read_identifier(&mut self) -> Option<String> {
        if !self.is_identifier() {
            return None;
        }
        let value = std::mem::take(&mut self.text);
        self.forward();
        Some(value)
    }

    pub fn read_regex(&mut self) -> Option<String> {
        if !self.is_regex() {
            return None;
        }
        let value = std::mem::take(&mut self.text);
        self.forward();
        Some(value)
    }

    pub fn read_comment(&mut self) -> Option<String> {
        if !self.is_comment() {
            return None;
        }
        let value = std::mem::take(&mut self.text);
        self.forward();
        Some(value)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        match self.source.get(self.current) {
            Some(&c) => {
                self.current += 1;
                if c == '\n' {
                    self.line += 1;
                    self.column = 1;
                } else {
                    self.column += 1;
                }
                c
            }
            None => '\0',
        }
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            false
        } else {
            self.advance();
            true
        }
    }

    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.source.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn next_token(&mut self) -> TokenCode {
        while !self.is_at_end() && self.peek().is_whitespace() {
            self.advance();
        }
        let (start, line, column) = (self.current, self.line, self.column);
        self.text.clear();
        let token = if self.is_at_end() {
            TokenCode::END_OF_INPUT
        } else {
            self.scan_token()
        };
        self.location = SourceLocation::new(Span::new(start, self.current), line, column);
        token
    }

    fn scan_token(&mut self) -> TokenCode {
        let c = self.advance();
        match c {
            '(' => TokenCode::OPEN_PAR,
            ')' => TokenCode::CLOSE_PAR,
            '[' => TokenCode::OPEN_SQUARE,
            ']' => TokenCode::CLOSE_SQUARE,
            '{' => TokenCode::OPEN_CURLY,
            '}' => TokenCode::CLOSE_CURLY,
            ',' => TokenCode::COMMA,
            ';' => TokenCode::SEMICOLON,
            ':' => TokenCode::COLON,
            '?' => TokenCode::QUESTION_MARK,
            '~' => TokenCode::BIT_NOT,
            '.' => {
                if self.peek().is_ascii_digit() {
                    self.scan_number(c)
                } else {
                    TokenCode::DOT
                }
            }
            '!' => {
                if self.match_char('=') {
                    if self.match_char('=') {
                        TokenCode::STRICT_DIFFERENT
                    } else {
                        TokenCode::DIFFERENT
                    }
                } else {
                    TokenCode::NOT
                }
            }
            '=' => {
                if self.match_char('=') {
                    if self.match_char('=') {
                        TokenCode::STRICT_EQUAL
                    } else {
                        TokenCode::EQUAL
                    }
                } else {
                    TokenCode::ASSIGN
                }
            }
            '<' => {
                if self.match_char('<') {
                    if self.match_char('=') {
                        TokenCode::LEFT_SHIFT_ASSIGN
                    } else {
                        TokenCode::LEFT_SHIFT
                    }
                } else if self.match_char('=') {
                    TokenCode::LESS_OR_EQUAL
                } else {
                    TokenCode::LESS
                }
            }
            '>' => {
                if self.match_char('>') {
                    if self.match_char('>') {
                        if self.match_char('=') {
                            TokenCode::UNSIGNED_RIGHT_SHIFT_ASSIGN
                        } else {
                            TokenCode::UNSIGNED_RIGHT_SHIFT
                        }
                    } else if self.match_char('=') {
                        TokenCode::RIGHT_SHIFT_ASSIGN
                    } else {
                        TokenCode::RIGHT_SHIFT
                    }
                } else if self.match_char('=') {
                    TokenCode::GREATER_OR_EQUAL
                } else {
                    TokenCode::GREATER
                }
            }
            '+' => {
                if self.match_char('+') {
                    TokenCode::INCREMENT
                } else if self.match_char('=') {
                    TokenCode::PLUS_ASSIGN
                } else {
                    TokenCode::PLUS
                }
            }
            '-' => {
                if self.match_char('-') {
                    TokenCode::DECREMENT
                } else if self.match_char('=') {
                    TokenCode::MINUS_ASSIGN
                } else {
                    TokenCode::MINUS
                }
            }
            '*' => self.with_assign(TokenCode::MULT, TokenCode::MULT_ASSIGN),
            '%' => self.with_assign(TokenCode::MODULO, TokenCode::MODULO_ASSIGN),
            '^' => self.with_assign(TokenCode::BIT_XOR, TokenCode::BIT_XOR_ASSIGN),
            '&' => {
                if self.match_char('&') {
                    TokenCode::AND
                } else {
                    self.with_assign(TokenCode::BIT_AND, TokenCode::BIT_AND_ASSIGN)
                }
            }
            '|' => {
                if self.match_char('|') {
                    TokenCode::OR
                } else {
                    self.with_assign(TokenCode::BIT_OR, TokenCode::BIT_OR_ASSIGN)
                }
            }
            '/' => {
                if self.match_char('/') {
                    self.line_comment()
                } else if self.match_char('*') {
                    self.star_comment()
                } else if self.division_allowed() {
                    self.with_assign(TokenCode::DIVIDE, TokenCode::DIVIDE_ASSIGN)
                } else {
                    self.regex()
                }
            }
            '"' | '\'' => self.string(c),
            c if c.is_ascii_digit() => self.scan_number(c),
            c if is_identifier_start(c) => self.identifier(c),
            _ => TokenCode::ERROR_INVALID_CHAR,
        }
    }

    fn with_assign(&mut self, op: TokenCode, assign: TokenCode) -> TokenCode {
        if self.match_char('=') {
            assign
        } else {
            op
        }
    }

    /// A slash is a division when what precedes it can end an operand.
    fn division_allowed(&self) -> bool {
        let prev = self.prev_non_comment;
        prev.is_identifier()
            || prev.is_string()
            || prev.is_number()
            || prev == TokenCode::CLOSE_PAR
            || prev == TokenCode::CLOSE_SQUARE
            || prev == TokenCode::INCREMENT
            || prev == TokenCode::DECREMENT
    }

    fn line_comment(&mut self) -> TokenCode {
        while !self.is_at_end() && self.peek() != '\n' {
            let c = self.advance();
            self.text.push(c);
        }
        TokenCode::LINE_COMMENT
    }

    fn star_comment(&mut self) -> TokenCode {
        while !self.is_at_end() {
            if self.peek() == '*' && self.peek_next() == '/' {
                self.advance();
                self.advance();
                break;
            }
            let c = self.advance();
            self.text.push(c);
        }
        TokenCode::STAR_COMMENT
    }

    fn regex(&mut self) -> TokenCode {
        self.text.push('/');
        loop {
            if self.is_at_end() || self.peek() == '\n' {
                return TokenCode::ERROR_REGEX_UNTERMINATED;
            }
            let c = self.advance();
            self.text.push(c);
            match c {
                '/' => break,
                '\\' => {
                    if self.is_at_end() || self.peek() == '\n' {
                        return TokenCode::ERROR_REGEX_UNTERMINATED;
                    }
                    let escaped = self.advance();
                    self.text.push(escaped);
                }
                _ => {}
            }
        }
        while matches!(self.peek(), 'g' | 'i' | 'm') {
            let flag = self.advance();
            self.text.push(flag);
        }
        TokenCode::REGEX
    }

    fn string(&mut self, quote: char) -> TokenCode {
        loop {
            if self.is_at_end() {
                return TokenCode::ERROR_STRING_UNTERMINATED;
            }
            let c = self.advance();
            if c == quote {
                return TokenCode::STRING;
            }
            match c {
                '\n' => return TokenCode::ERROR_STRING_UNTERMINATED,
                '\\' => {
                    if self.is_at_end() {
                        return TokenCode::ERROR_STRING_UNTERMINATED;
                    }
                    let escaped = self.advance();
                    let decoded = match escaped {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        'b' => '\u{0008}',
                        'v' => '\u{000B}',
                        'f' => '\u{000C}',
                        '0' => '\0',
                        'u' => match self.hex_value(4) {
                            Some(c) => c,
                            None => return TokenCode::ERROR_STRING_UNICODE_VALUE,
                        },
                        'x' => match self.hex_value(2) {
                            Some(c) => c,
                            None => return TokenCode::ERROR_STRING_HEXA_VALUE,
                        },
                        // Line continuation.
                        '\n' => continue,
                        '\r' => {
                            if self.match_char('\n') {
                                continue;
                            }
                            return TokenCode::ERROR_STRING_CR_IN_CONTINUATION;
                        }
                        other => other,
                    };
                    self.text.push(decoded);
                }
                _ => self.text.push(c),
            }
        }
    }

    fn hex_value(&mut self, digits: usize) -> Option<char> {
        let mut value = 0u32;
        for _ in 0..digits {
            let d = self.peek().to_digit(16)?;
            self.advance();
            value = value * 16 + d;
        }
        char::from_u32(value)
    }

    fn scan_number(&mut self, first: char) -> TokenCode {
        let mut literal = String::new();
        literal.push(first);

        if first == '0' && matches!(self.peek(), 'x' | 'X') {
            self.advance();
            let mut value = 0f64;
            let mut count = 0;
            while let Some(d) = self.peek().to_digit(16) {
                self.advance();
                value = value * 16.0 + f64::from(d);
                count += 1;
            }
            if count == 0 {
                return TokenCode::ERROR_NUMBER_UNTERMINATED;
            }
            if is_identifier_part(self.peek()) {
                return TokenCode::ERROR_NUMBER_IDENTIFIER_STARTS_IMMEDIATELY;
            }
            self.number = value;
            return TokenCode::HEX_NUMBER;
        }

        let mut is_float = first == '.';
        self.digits(&mut literal);
        if !is_float && self.peek() == '.' {
            self.advance();
            is_float = true;
            literal.push('.');
            self.digits(&mut literal);
        }
        if self.peek() == '.' {
            return TokenCode::ERROR_NUMBER_IDENTIFIER_STARTS_IMMEDIATELY;
        }
        if matches!(self.peek(), 'e' | 'E') {
            self.advance();
            is_float = true;
            literal.push('e');
            if matches!(self.peek(), '+' | '-') {
                literal.push(self.advance());
            }
            if !self.peek().is_ascii_digit() {
                return TokenCode::ERROR_NUMBER_UNTERMINATED;
            }
            self.digits(&mut literal);
        }
        if is_identifier_part(self.peek()) {
            return TokenCode::ERROR_NUMBER_IDENTIFIER_STARTS_IMMEDIATELY;
        }
        let literal = literal.strip_suffix('.').unwrap_or(&literal);
        match literal.parse::<f64>() {
            Ok(value) => {
                self.number = value;
                if is_float {
                    TokenCode::FLOAT
                } else {
                    TokenCode::INTEGER
                }
            }
            Err(_) => TokenCode::ERROR_NUMBER_VALUE,
        }
    }

    fn digits(&mut self, literal: &mut String) {
        while self.peek().is_ascii_digit() {
            literal.push(self.advance());
        }
    }

    fn identifier(&mut self, first: char) -> TokenCode {
        self.text.push(first);
        while is_identifier_part(self.peek()) {
            let c = self.advance();
            self.text.push(c);
        }
        match self.text.as_str() {
            "instanceof" => TokenCode::INSTANCEOF,
            "typeof" => TokenCode::TYPEOF,
            "void" => TokenCode::VOID,
            "delete" => TokenCode::DELETE,
            "new" => TokenCode::NEW,
            "NaN" => {
                self.number = f64::NAN;
                TokenCode::NAN
            }
            "Infinity" => {
                self.number = f64::INFINITY;
                TokenCode::INFINITY
            }
            _ => TokenCode::IDENTIFIER,
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_ascii_alphabetic()
}

fn is_identifier_part(c: char) -> bool {
    is_identifier_start(c) || c.is_ascii_digit()
}

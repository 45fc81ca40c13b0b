// Tokenizer tests

use stepjs::{Lexer, TokenCode};

/// Every token of `source`, the final error or end of input included.
fn codes(source: &str) -> Vec<TokenCode> {
    let mut lexer = Lexer::new(source);
    let mut codes = vec![lexer.current_token()];
    while lexer.forward() {
        codes.push(lexer.current_token());
    }
    if codes.last().map_or(true, |c| !c.is_error_or_end_of_input()) {
        codes.push(lexer.current_token());
    }
    codes
}

fn first_token(source: &str) -> Lexer {
    Lexer::new(source)
}

#[test]
fn operators_and_punctuation() {
    assert_eq!(
        codes("a >>>= b === c ? d : e;"),
        vec![
            TokenCode::IDENTIFIER,
            TokenCode::UNSIGNED_RIGHT_SHIFT_ASSIGN,
            TokenCode::IDENTIFIER,
            TokenCode::STRICT_EQUAL,
            TokenCode::IDENTIFIER,
            TokenCode::QUESTION_MARK,
            TokenCode::IDENTIFIER,
            TokenCode::COLON,
            TokenCode::IDENTIFIER,
            TokenCode::SEMICOLON,
            TokenCode::END_OF_INPUT,
        ]
    );
    assert_eq!(
        codes("typeof x instanceof y"),
        vec![
            TokenCode::TYPEOF,
            TokenCode::IDENTIFIER,
            TokenCode::INSTANCEOF,
            TokenCode::IDENTIFIER,
            TokenCode::END_OF_INPUT,
        ]
    );
    assert_eq!(TokenCode::PLUS_ASSIGN.compound_operator(), Some(TokenCode::PLUS));
    assert_eq!(TokenCode::ASSIGN.compound_operator(), None);
}

#[test]
fn precedence_follows_operator_levels() {
    let ladder = [
        TokenCode::COMMA,
        TokenCode::ASSIGN,
        TokenCode::QUESTION_MARK,
        TokenCode::OR,
        TokenCode::AND,
        TokenCode::BIT_OR,
        TokenCode::BIT_XOR,
        TokenCode::BIT_AND,
        TokenCode::EQUAL,
        TokenCode::LESS,
        TokenCode::LEFT_SHIFT,
        TokenCode::PLUS,
        TokenCode::MULT,
        TokenCode::NOT,
        TokenCode::DOT,
    ];
    for pair in ladder.windows(2) {
        assert!(
            pair[0].precedence() < pair[1].precedence(),
            "{} should bind looser than {}",
            pair[0],
            pair[1]
        );
    }
    // The reserved low bit leaves room for right associative recursion.
    assert_eq!(TokenCode::AND.precedence() % 2, 0);
    assert_eq!(TokenCode::INSTANCEOF.precedence(), TokenCode::LESS.precedence());
    assert_eq!(TokenCode::SEMICOLON.precedence(), 0);
    assert_eq!(TokenCode::IDENTIFIER.precedence(), 0);
}

#[test]
fn slash_is_division_after_an_operand() {
    let divisions = [
        "a / 2",
        "2 / 2",
        "'s' / 2",
        "(a) / 2",
        "a[0] / 2",
        "a++ / 2",
        "a /* c */ / 2",
    ];
    for source in divisions {
        assert!(
            codes(source).contains(&TokenCode::DIVIDE),
            "`{}` should contain a division",
            source
        );
    }

    let mut lexer = first_token("x = /ab+c\\//gi;");
    assert!(lexer.forward());
    assert!(lexer.forward());
    assert!(lexer.is_regex());
    assert_eq!(lexer.read_regex().as_deref(), Some("/ab+c\\//gi"));
    assert_eq!(lexer.current_token(), TokenCode::SEMICOLON);

    assert_eq!(
        codes("= /abc"),
        vec![TokenCode::ASSIGN, TokenCode::ERROR_REGEX_UNTERMINATED]
    );
}

#[test]
fn comments_are_skipped_unless_requested() {
    assert_eq!(
        codes("1 // one\n+ /* two */ 2"),
        vec![
            TokenCode::INTEGER,
            TokenCode::PLUS,
            TokenCode::INTEGER,
            TokenCode::END_OF_INPUT,
        ]
    );

    let mut lexer = Lexer::with_comments("1 // one\n/* two */");
    assert!(lexer.forward());
    assert_eq!(lexer.current_token(), TokenCode::LINE_COMMENT);
    assert_eq!(lexer.read_comment().as_deref(), Some(" one"));
    assert_eq!(lexer.current_token(), TokenCode::STAR_COMMENT);
    assert_eq!(lexer.read_comment().as_deref(), Some(" two "));
    assert!(lexer.is_end_of_input());
}

#[test]
fn number_literals() {
    let cases: [(&str, TokenCode, f64); 8] = [
        ("42", TokenCode::INTEGER, 42.0),
        ("3.25", TokenCode::FLOAT, 3.25),
        (".5", TokenCode::FLOAT, 0.5),
        ("5.", TokenCode::FLOAT, 5.0),
        ("1e3", TokenCode::FLOAT, 1000.0),
        ("2.5E-1", TokenCode::FLOAT, 0.25),
        ("0x1F", TokenCode::HEX_NUMBER, 31.0),
        ("Infinity", TokenCode::INFINITY, f64::INFINITY),
    ];
    for (source, code, value) in cases {
        let mut lexer = first_token(source);
        assert_eq!(lexer.current_token(), code, "`{}`", source);
        assert_eq!(lexer.read_number(), Some(value), "`{}`", source);
        assert!(lexer.is_end_of_input());
    }

    let lexer = first_token("NaN");
    assert_eq!(lexer.current_token(), TokenCode::NAN);
    assert!(lexer.number().is_nan());
}

#[test]
fn malformed_numbers() {
    let cases = [
        ("45DD", TokenCode::ERROR_NUMBER_IDENTIFIER_STARTS_IMMEDIATELY),
        ("45.member", TokenCode::ERROR_NUMBER_IDENTIFIER_STARTS_IMMEDIATELY),
        (".45.01member", TokenCode::ERROR_NUMBER_IDENTIFIER_STARTS_IMMEDIATELY),
        ("1.2.3", TokenCode::ERROR_NUMBER_IDENTIFIER_STARTS_IMMEDIATELY),
        ("0x1G", TokenCode::ERROR_NUMBER_IDENTIFIER_STARTS_IMMEDIATELY),
        ("1e", TokenCode::ERROR_NUMBER_UNTERMINATED),
        ("1e+", TokenCode::ERROR_NUMBER_UNTERMINATED),
        ("0x", TokenCode::ERROR_NUMBER_UNTERMINATED),
    ];
    for (source, code) in cases {
        let lexer = first_token(source);
        assert_eq!(lexer.current_token(), code, "`{}`", source);
        assert!(lexer.is_error());
    }
    assert_eq!(
        TokenCode::ERROR_NUMBER_IDENTIFIER_STARTS_IMMEDIATELY.explain(),
        "identifier starts immediately after number"
    );
}

#[test]
fn string_literals_and_escapes() {
    let cases = [
        (r#""plain""#, "plain"),
        (r#"'it\'s'"#, "it's"),
        (r#""tab\there""#, "tab\there"),
        (r#"'\x41Bé'"#, "AB\u{e9}"),
        (r#"'back\\slash'"#, "back\\slash"),
        (r#"'\q'"#, "q"),
        ("'line \\\ncontinued'", "line continued"),
        ("'crlf \\\r\ncontinued'", "crlf continued"),
    ];
    for (source, expected) in cases {
        let mut lexer = first_token(source);
        assert!(lexer.is_string(), "`{}`", source);
        assert_eq!(lexer.read_string().as_deref(), Some(expected), "`{}`", source);
    }

    let errors = [
        ("'open", TokenCode::ERROR_STRING_UNTERMINATED),
        ("'new\nline'", TokenCode::ERROR_STRING_UNTERMINATED),
        (r#"'\u12'"#, TokenCode::ERROR_STRING_UNICODE_VALUE),
        (r#"'\xZ1'"#, TokenCode::ERROR_STRING_HEXA_VALUE),
        ("'cr \\\rx'", TokenCode::ERROR_STRING_CR_IN_CONTINUATION),
    ];
    for (source, code) in errors {
        assert_eq!(first_token(source).current_token(), code, "`{}`", source);
    }
}

#[test]
fn errors_and_end_of_input_are_sticky() {
    let mut lexer = first_token("a # b");
    assert!(!lexer.forward());
    assert_eq!(lexer.current_token(), TokenCode::ERROR_INVALID_CHAR);
    assert!(lexer.is_error_or_end_of_input());
    assert!(!lexer.forward());
    assert_eq!(lexer.current_token(), TokenCode::ERROR_INVALID_CHAR);

    let mut lexer = first_token("");
    assert!(lexer.is_end_of_input());
    assert!(!lexer.is_error());
    assert!(!lexer.forward());
    assert!(lexer.is_end_of_input());
    assert!(lexer.reset("x"));
    assert!(lexer.is_identifier_named("x"));
}

#[test]
fn tokens_carry_their_location() {
    let mut lexer = first_token("a +\n  bc");
    assert!(lexer.forward());
    assert!(lexer.forward());
    let location = lexer.location();
    assert_eq!((location.line, location.column), (2, 3));
    assert_eq!((location.span.start, location.span.end), (6, 8));
    let previous = lexer.prev_location();
    assert_eq!((previous.line, previous.column), (1, 3));
    assert_eq!(lexer.read_identifier().as_deref(), Some("bc"));
}

#[test]
fn explain_names_every_token() {
    assert_eq!(TokenCode::CLOSE_PAR.explain(), ")");
    assert_eq!(TokenCode::TYPEOF.explain(), "typeof");
    assert_eq!(TokenCode::END_OF_INPUT.explain(), "end of input");
    assert_eq!(TokenCode::IDENTIFIER.explain(), "identifier");
    assert_eq!(TokenCode::FLOAT.explain(), "number");
    assert_eq!(TokenCode::STRING.explain(), "string");
    assert_eq!(TokenCode::ERROR_STRING_UNTERMINATED.to_string(), "unterminated string");
}

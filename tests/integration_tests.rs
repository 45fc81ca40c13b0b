// Parser robustness tests
//
// The parser never fails outright: a case "fails" when the tree it returns
// holds a syntax error node, and the first such node's message is what gets
// checked. Each case runs under `catch_unwind` so a panic is reported as a
// crash of that case instead of aborting the suite.

use std::panic;
use stepjs::engine::syntax_diagnostics;
use stepjs::parser::Parser;
use stepjs::scope::ScopeOptions;

#[derive(Debug, Clone)]
enum Expectation {
    Parses,
    Fails,
    /// Fails with a message containing this text.
    FailsWith(String),
}

#[derive(Debug, Clone)]
struct TestCase {
    name: String,
    input: String,
    options: ScopeOptions,
    expect: Expectation,
}

impl TestCase {
    fn with_options(&mut self, options: ScopeOptions) {
        self.options = options;
    }

    /// `None` when the case behaves as expected, otherwise what went wrong.
    fn check(&self) -> Option<String> {
        let first_error = {
            let expr = Parser::new(self.options).parse(&self.input);
            syntax_diagnostics(&expr).into_iter().next().map(|d| d.message)
        };
        match (&self.expect, first_error) {
            (Expectation::Parses, None) => None,
            (Expectation::Parses, Some(message)) => {
                Some(format!("expected to parse, got: {}", message))
            }
            (_, None) => Some("expected a syntax error, but parsing succeeded".to_string()),
            (Expectation::FailsWith(expected), Some(message)) if !message.contains(expected) => {
                Some(format!("'{}' does not contain '{}'", message, expected))
            }
            _ => None,
        }
    }
}

struct TestSuite {
    name: &'static str,
    cases: Vec<TestCase>,
}

impl TestSuite {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            cases: Vec::new(),
        }
    }

    fn push(&mut self, name: &str, input: &str, expect: Expectation) -> &mut TestCase {
        self.cases.push(TestCase {
            name: name.to_string(),
            input: input.to_string(),
            options: ScopeOptions::default(),
            expect,
        });
        let last = self.cases.len() - 1;
        &mut self.cases[last]
    }

    fn parses(&mut self, name: &str, input: &str) -> &mut TestCase {
        self.push(name, input, Expectation::Parses)
    }

    fn fails(&mut self, name: &str, input: &str) -> &mut TestCase {
        self.push(name, input, Expectation::Fails)
    }

    fn fails_with(&mut self, name: &str, input: &str, message: &str) -> &mut TestCase {
        self.push(name, input, Expectation::FailsWith(message.to_string()))
    }

    fn run(&self) -> SuiteReport {
        println!("{}", self.name);
        let mut report = SuiteReport {
            name: self.name,
            total: self.cases.len(),
            failed: Vec::new(),
            crashed: Vec::new(),
        };
        for case in &self.cases {
            match panic::catch_unwind(|| case.check()) {
                Ok(None) => println!("  ok    {}", case.name),
                Ok(Some(problem)) => {
                    println!("  FAIL  {}: {}", case.name, problem);
                    report.failed.push(case.name.clone());
                }
                Err(payload) => {
                    let message = payload
                        .downcast_ref::<String>()
                        .cloned()
                        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
                        .unwrap_or_else(|| "unknown panic".to_string());
                    println!("  PANIC {}: {}", case.name, message);
                    report.crashed.push(case.name.clone());
                }
            }
        }
        report.print();
        report
    }
}

struct SuiteReport {
    name: &'static str,
    total: usize,
    failed: Vec<String>,
    crashed: Vec<String>,
}

impl SuiteReport {
    fn passed(&self) -> usize {
        self.total - self.failed.len() - self.crashed.len()
    }

    fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.crashed.is_empty()
    }

    fn print(&self) {
        println!(
            "  {}: {} passed, {} failed, {} crashed of {}\n",
            self.name,
            self.passed(),
            self.failed.len(),
            self.crashed.len(),
            self.total
        );
    }
}

fn no_masking() -> ScopeOptions {
    ScopeOptions {
        allow_masking: false,
        ..ScopeOptions::default()
    }
}

fn local_redefinition() -> ScopeOptions {
    ScopeOptions {
        allow_local_redefinition: true,
        ..ScopeOptions::default()
    }
}

fn malformed_expressions_suite() -> TestSuite {
    let mut suite = TestSuite::new("Malformed Expressions");

    suite.fails_with("unmatched_opening_paren", "(1 + 2", "Expected ')' but found end of input.");
    suite.fails_with(
        "unmatched_opening_paren_nested",
        "((1 + 2)",
        "Expected ')' but found end of input.",
    );
    suite.fails_with("unmatched_closing_paren", "1 + 2)", "Expected expression but found ).");
    suite.fails_with("empty_parentheses", "()", "Expected expression but found ).");
    suite.fails_with(
        "empty_parentheses_in_expression",
        "1 + ()",
        "Expected expression but found ).",
    );
    suite.fails_with("array_literal", "[1, 2]", "Expected expression but found [.");
    suite.fails_with("unmatched_opening_brace", "{ x = 1", "end of input");
    suite.fails_with("unmatched_closing_brace", "x = 1 }", "Expected expression but found }.");
    suite.fails_with("unclosed_indexer", "a[1", "Expected ']' but found end of input.");
    suite.fails_with("missing_member_name", "a.+b", "Expected member name");

    suite
}

fn edge_case_suite() -> TestSuite {
    let mut suite = TestSuite::new("Edge Cases");

    suite.fails_with("empty_input", "", "Expected expression but found end of input.");
    suite.fails_with("only_whitespace", "   \n\t  ", "Expected expression but found end of input.");
    suite.fails("only_a_comment", "// nothing here");
    suite.fails("unexpected_eof_after_operator", "1 +");
    suite.fails("unexpected_eof_in_expression", "1 + (");
    suite.parses("empty_statements", "1;;;2");
    suite.parses("comments_between_tokens", "1 /* one */ + // two\n 2");

    let deep_parens = "(".repeat(100) + "1" + &")".repeat(100);
    suite.parses("deeply_nested_parens", &deep_parens);

    suite
}

fn operator_suite() -> TestSuite {
    let mut suite = TestSuite::new("Operator Tests");

    suite.parses("unary_plus", "+ 1");
    suite.fails("missing_right_operand", "1 +");
    suite.fails("missing_both_operands", "+");
    suite.fails_with("postfix_on_constant", "1 ++ 2", "Invalid increment or decrement operand.");
    suite.fails_with("triple_plus", "6+++8", "Invalid increment or decrement operand.");
    suite.fails_with("prefix_on_constant", "--5", "Invalid increment or decrement operand.");
    suite.parses("mixed_operators", "1 +- 2");
    suite.parses("strict_comparison", "1 !== 2");
    suite.parses("unsigned_shift", "-1 >>> 60");
    suite.parses("typeof_operator", "typeof x == 'undefined'");
    suite.parses("ternary", "a ? b : c ? d : e");
    suite.fails_with("ternary_missing_colon", "a ? b", "Expected ':' but found end of input.");
    suite.parses("chained_assignment", "x = y = 3");
    suite.parses("compound_assignment", "x >>>= 2");

    suite
}

fn control_flow_suite() -> TestSuite {
    let mut suite = TestSuite::new("Control Flow Tests");

    suite.parses("valid_if", "if (true) { x = 1 }");
    suite.parses("if_else", "if (a) b; else c");
    suite.fails_with("if_missing_condition", "if { x = 1 }", "Expected '('");
    suite.fails("if_missing_body", "if (true)");
    suite.fails_with("dangling_else", "else x", "Unexpected 'else'.");
    suite.parses("valid_while", "while (x) x = x - 1");
    suite.fails("while_missing_body", "while (true)");
    suite.parses("do_while", "do x++; while (x < 3)");
    suite.fails_with("do_without_while", "do { x++ }", "Expected 'while' but found end of input.");
    suite.parses("flow_breaks", "while (1) { break; continue; }");
    suite.parses("bare_return", "return");

    suite
}

fn literal_suite() -> TestSuite {
    let mut suite = TestSuite::new("Literal Tests");

    suite.parses("integer_literal", "42");
    suite.parses("double_literal", "3.14");
    suite.parses("exponent_literal", "1.5e-3");
    suite.parses("hex_literal", "0x1F");
    suite.parses("named_numbers", "NaN + Infinity");
    suite.parses("string_literal", "\"hello\"");
    suite.parses("string_escapes", r"'A\x42\n'");
    suite.parses("keyword_constants", "true; false; null; undefined");

    suite.fails_with(
        "identifier_after_number",
        "45DD",
        "identifier starts immediately after number",
    );
    suite.fails_with(
        "identifier_after_number_in_expression",
        "1 + 45DD",
        "identifier starts immediately after number",
    );
    suite.fails_with("multiple_dots", "3.14.159", "identifier starts immediately after number");
    suite.fails_with("unterminated_string", "\"hello", "unterminated string");
    suite.fails_with("regex_literal", "x = /ab+c/g", "Regular expressions are not supported.");
    suite.parses("division_is_not_regex", "x = a / b / c");

    suite
}

fn function_suite() -> TestSuite {
    let mut suite = TestSuite::new("Function Tests");

    suite.parses("simple_call", "foo()");
    suite.parses("call_with_args", "foo(1, 2, 3)");
    suite.parses("method_chain", "a.b(c)[d].e()");
    suite.fails("missing_closing_paren", "foo(1, 2");
    suite.fails("trailing_comma", "foo(1, 2,)");
    suite.parses("function_declaration", "function add(a, b) { return a + b; } add(1, 2)");
    suite.parses("function_expression", "(function () { return 1; })()");
    suite.fails_with("missing_parameter_name", "function f(a, 1) {}", "Expected parameter name");
    suite.fails_with("missing_body", "function f()", "Expected '{'");

    suite
}

fn assignment_suite() -> TestSuite {
    let mut suite = TestSuite::new("Assignment Tests");

    suite.parses("simple_assignment", "x = 1");
    suite.parses("member_assignment", "a.b = 1 + 2");
    suite.fails("missing_value", "x =");
    suite.fails_with("invalid_target", "1 = x", "Invalid assignment target.");
    suite.fails_with("invalid_compound_target", "(a + b) += 1", "Invalid assignment target.");
    suite.fails_with("var_without_name", "var 5", "Expected variable name");

    suite
}

fn scope_suite() -> TestSuite {
    let mut suite = TestSuite::new("Scope Tests");

    suite.fails_with(
        "local_redeclaration",
        "var a = 1; var a = 2;",
        "Declaration conflicts with declaration at line 1, column 5.",
    );
    suite
        .parses(
            "local_redefinition_allowed",
            "var a = 1; var a = 2;",
        )
        .with_options(local_redefinition());
    suite.parses("masking_in_block", "var a = 1; { var a = 2; }");
    suite
        .fails_with(
            "masking_in_block_forbidden",
            "var a = 1; { var a = 2; }",
            "Masking is not allowed",
        )
        .with_options(no_masking());
    suite
        .fails_with(
            "masking_in_grandchild_forbidden",
            "var a = 1; { { var a = 2; } }",
            "Masking is not allowed",
        )
        .with_options(no_masking());
    suite
        .fails_with(
            "parameter_masks_variable",
            "var n = 1; function f(n) { return n; }",
            "Masking is not allowed",
        )
        .with_options(no_masking());
    suite
        .parses(
            "sibling_blocks_reuse_name",
            "{ var a = 1; } { var a = 2; }",
        )
        .with_options(no_masking());
    suite.fails_with(
        "duplicate_parameter",
        "function f(a, a) {}",
        "Declaration conflicts with declaration at line 1, column 12.",
    );

    suite
}

fn positive_suite() -> TestSuite {
    let mut suite = TestSuite::new("Positive Tests");

    suite.parses("simple_arithmetic", "1 + 2 * 3");
    suite.parses("parentheses", "(1 + 2) * 3");
    suite.parses("var_list", "var x = 42, y, z = x");
    suite.parses("string_concatenation", "\"hello\" + ' world'");
    suite.parses("logical_operations", "a && b || !c");
    suite.parses(
        "closure",
        "function counter() { var n = 0; return function () { return ++n; }; }",
    );

    suite
}


#[test]
fn comprehensive_parser_tests() {
    let suites = [
        malformed_expressions_suite(),
        edge_case_suite(),
        operator_suite(),
        control_flow_suite(),
        literal_suite(),
        function_suite(),
        assignment_suite(),
        scope_suite(),
        positive_suite(),
    ];

    let dirty: Vec<&str> = suites
        .iter()
        .map(TestSuite::run)
        .filter(|report| !report.is_clean())
        .map(|report| report.name)
        .collect();
    assert!(dirty.is_empty(), "suites with failures: {:?}", dirty);
}

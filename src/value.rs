use crate::ast::{Expr, FlowBreakKind, FunctionDef, VarDecl};
use crate::evaluator::CellId;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

pub const TYPE_UNDEFINED: &str = "undefined";
pub const TYPE_OBJECT: &str = "object";
pub const TYPE_BOOLEAN: &str = "boolean";
pub const TYPE_NUMBER: &str = "number";
pub const TYPE_STRING: &str = "string";
pub const TYPE_FUNCTION: &str = "function";

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Date(JsDate),
    Function(Rc<Closure>),
    Error(Rc<RuntimeError>),
    /// In-flight `break`, `continue` or `return`.
    Signal(Rc<Signal>),
    /// Variable storage: reads go to the cell's current value.
    Reference(CellId),
}

/// A function literal together with the cells its free variables were bound
/// to when the literal was evaluated.
#[derive(Debug)]
pub struct Closure {
    pub def: Rc<FunctionDef>,
    pub captures: Vec<(Rc<VarDecl>, CellId)>,
}

#[derive(Debug)]
pub struct RuntimeError {
    pub culprit: Rc<Expr>,
    pub message: String,
    pub previous: Option<Rc<RuntimeError>>,
}

impl RuntimeError {
    /// First error of the chain.
    pub fn origin(self: &Rc<Self>) -> Rc<RuntimeError> {
        let mut e = Rc::clone(self);
        while let Some(p) = e.previous.clone() {
            e = p;
        }
        e
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error: {} at {}.", self.message, self.culprit.location)
    }
}

#[derive(Debug)]
pub struct Signal {
    pub kind: FlowBreakKind,
    pub culprit: Rc<Expr>,
    pub value: Value,
}

impl Value {
    pub const UNDEFINED: Value = Value::Undefined;
    pub const NULL: Value = Value::Null;
    pub const TRUE: Value = Value::Boolean(true);
    pub const FALSE: Value = Value::Boolean(false);
    pub const ZERO: Value = Value::Number(0.0);
    pub const NAN: Value = Value::Number(f64::NAN);
    pub const INFINITY: Value = Value::Number(f64::INFINITY);
    pub const NEGATIVE_INFINITY: Value = Value::Number(f64::NEG_INFINITY);
    pub const EPOCH: Value = Value::Date(JsDate::EPOCH);

    /// Numbers are stored without a negative zero.
    pub fn number(n: f64) -> Value {
        Value::Number(if n == 0.0 { 0.0 } else { n })
    }

    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::String(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined | Value::Signal(_) => TYPE_UNDEFINED,
            Value::Null | Value::Date(_) | Value::Error(_) | Value::Reference(_) => TYPE_OBJECT,
            Value::Boolean(_) => TYPE_BOOLEAN,
            Value::Number(_) => TYPE_NUMBER,
            Value::String(_) => TYPE_STRING,
            Value::Function(_) => TYPE_FUNCTION,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_signal(&self) -> bool {
        matches!(self, Value::Signal(_))
    }

    /// Errors and flow signals: outcomes a parent adopts without evaluating
    /// anything else.
    pub fn is_error_or_signal(&self) -> bool {
        matches!(self, Value::Error(_) | Value::Signal(_))
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_nan())
    }

    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null | Value::Error(_) | Value::Signal(_) => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => !(*n == 0.0 || n.is_nan()),
            Value::String(s) => !s.is_empty(),
            Value::Date(_) | Value::Function(_) | Value::Reference(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Date(d) => d.millis as f64,
            _ => f64::NAN,
        }
    }

    /// Truncation used by the bitwise operators.
    pub fn to_int64(&self) -> i64 {
        to_int64(self.to_number())
    }

    /// Object-like values reduce to a primitive; primitives are returned as is.
    pub fn to_primitive(&self) -> Value {
        match self {
            Value::Date(d) => Value::Number(d.millis as f64),
            Value::Error(_) | Value::Signal(_) => Value::Undefined,
            Value::Function(_) => Value::string(self.to_js_string()),
            other => other.clone(),
        }
    }

    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.to_string(),
            Value::Date(d) => d.to_string(),
            Value::Function(c) => c.def.to_string(),
            Value::Error(e) => e.to_string(),
            Value::Signal(s) => s.kind.keyword().to_string(),
            Value::Reference(c) => format!("<ref {}>", c.index()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_js_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

pub fn to_int64(n: f64) -> i64 {
    if n.is_nan() || n.is_infinite() {
        0
    } else {
        n.trunc() as i64
    }
}

fn string_to_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return match u64::from_str_radix(hex, 16) {
            Ok(v) => v as f64,
            Err(_) => f64::NAN,
        };
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    // Rust also accepts "inf" and "nan" which are not numbers here.
    if !s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

/// JavaScript `Number.prototype.toString()` in base 10.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let s = format!("{:e}", n);
        // Rust writes "1e21" where JavaScript writes "1e+21".
        return match s.find('e') {
            Some(i) if !s[i + 1..].starts_with('-') => format!("{}e+{}", &s[..i], &s[i + 1..]),
            _ => s,
        };
    }
    format!("{}", n)
}

/// Formats `n` in `radix` (2..=36) by repeated division of the integral part
/// and repeated multiplication of the fractional part.
pub fn number_to_string_radix(n: f64, radix: u32) -> String {
    if radix == 10 || n.is_nan() || n.is_infinite() {
        return number_to_string(n);
    }
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let negative = n < 0.0;
    let abs = n.abs();
    let mut int_part = abs.trunc();
    let mut frac_part = abs - int_part;
    let r = f64::from(radix);

    let mut int_digits = Vec::new();
    if int_part == 0.0 {
        int_digits.push(b'0');
    }
    while int_part >= 1.0 {
        let d = (int_part % r) as usize;
        int_digits.push(DIGITS[d]);
        int_part = (int_part / r).trunc();
    }
    int_digits.reverse();

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.extend(int_digits.iter().map(|&b| b as char));
    if frac_part > 0.0 {
        out.push('.');
        let mut count = 0;
        while frac_part > 0.0 && count < 52 {
            frac_part *= r;
            let d = frac_part.trunc();
            out.push(DIGITS[d as usize] as char);
            frac_part -= d;
            count += 1;
        }
    }
    out
}

/// Double quoted source literal for `s`.
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000B}' => out.push_str("\\v"),
            '\u{000C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Milliseconds since 1970-01-01T00:00:00Z, proleptic Gregorian calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JsDate {
    pub millis: i64,
}

const MS_PER_DAY: i64 = 86_400_000;

impl JsDate {
    pub const EPOCH: JsDate = JsDate { millis: 0 };

    /// Builds a date from calendar parts (month and day are 1-based).
    /// Returns `None` when the parts do not name an existing instant.
    pub fn from_parts(parts: [i64; 7]) -> Option<JsDate> {
        let [year, month, day, hour, minute, second, ms] = parts;
        if !(1..=9999).contains(&year)
            || !(1..=12).contains(&month)
            || day < 1
            || day > days_in_month(year, month)
            || !(0..24).contains(&hour)
            || !(0..60).contains(&minute)
            || !(0..60).contains(&second)
            || !(0..1000).contains(&ms)
        {
            return None;
        }
        let days = days_from_civil(year, month, day);
        Some(JsDate {
            millis: days * MS_PER_DAY + ((hour * 60 + minute) * 60 + second) * 1000 + ms,
        })
    }

    /// Calendar parts: year, month (1-based), day, hour, minute, second, millisecond.
    pub fn parts(&self) -> [i64; 7] {
        let days = self.millis.div_euclid(MS_PER_DAY);
        let rem = self.millis.rem_euclid(MS_PER_DAY);
        let (y, m, d) = civil_from_days(days);
        [
            y,
            m,
            d,
            rem / 3_600_000,
            rem / 60_000 % 60,
            rem / 1000 % 60,
            rem % 1000,
        ]
    }

    pub fn weekday(&self) -> usize {
        // 1970-01-01 was a Thursday.
        (self.millis.div_euclid(MS_PER_DAY) + 4).rem_euclid(7) as usize
    }
}

impl fmt::Display for JsDate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const DAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
        const MONTHS: [&str; 12] = [
            "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
        ];
        let [y, m, d, h, mi, s, _] = self.parts();
        write!(
            f,
            "{}, {:02} {} {:04} {:02}:{:02}:{:02} GMT",
            DAYS[self.weekday()],
            d,
            MONTHS[(m - 1) as usize],
            y,
            h,
            mi,
            s
        )
    }
}

fn is_leap_year(y: i64) -> bool {
    (y % 4 == 0 && y % 100 != 0) || y % 400 == 0
}

fn days_in_month(y: i64, m: i64) -> i64 {
    match m {
        2 if is_leap_year(y) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = yoe + era * 400;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

/// Loose and strict equality, and relational comparison.
///
/// Loose comparison normalizes `null` to `undefined` and orders the pair by
/// type name so each rule only has to be written once.
pub struct Comparer {
    x: Value,
    y: Value,
    swapped: bool,
}

impl Comparer {
    pub fn new(x: &Value, y: &Value) -> Self {
        let normalize = |v: &Value| match v {
            Value::Null => Value::Undefined,
            other => other.clone(),
        };
        let (x, y) = (normalize(x), normalize(y));
        if x.type_name() > y.type_name() {
            Comparer {
                x: y,
                y: x,
                swapped: true,
            }
        } else {
            Comparer {
                x,
                y,
                swapped: false,
            }
        }
    }

    pub fn are_equal(&self) -> bool {
        let (x, y) = (&self.x, &self.y);
        if x.type_name() == y.type_name() {
            return match (x, y) {
                (Value::Undefined, Value::Undefined) => true,
                (Value::Number(a), Value::Number(b)) => a == b,
                (Value::String(a), Value::String(b)) => a == b,
                (Value::Boolean(a), Value::Boolean(b)) => a == b,
                (Value::Date(a), Value::Date(b)) => a == b,
                (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
                (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
                (Value::Reference(a), Value::Reference(b)) => a == b,
                _ => false,
            };
        }
        let (tx, ty) = (x.type_name(), y.type_name());
        if tx == TYPE_NUMBER && ty == TYPE_STRING {
            return x.to_number() == y.to_number();
        }
        if tx == TYPE_BOOLEAN || ty == TYPE_BOOLEAN {
            return x.to_boolean() == y.to_boolean();
        }
        if ty == TYPE_OBJECT && tx != TYPE_UNDEFINED {
            let p = y.to_primitive();
            return Comparer::new(x, &p).are_equal();
        }
        if tx == TYPE_OBJECT && ty != TYPE_UNDEFINED {
            let p = x.to_primitive();
            return Comparer::new(&p, y).are_equal();
        }
        false
    }

    /// Relational comparison; `None` means incomparable (every operator is false).
    pub fn compare(&self) -> Option<Ordering> {
        let (x, y) = (&self.x, &self.y);
        if matches!(y, Value::Undefined) {
            return matches!(x, Value::Undefined).then_some(Ordering::Equal);
        }
        let ordering = match (x, y) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            _ => {
                let a = x.to_number();
                let b = y.to_number();
                a.partial_cmp(&b)?
            }
        };
        Some(if self.swapped {
            ordering.reverse()
        } else {
            ordering
        })
    }
}

/// `===`: no coercion, `NaN` is never equal to itself.
pub fn strict_equals(x: &Value, y: &Value) -> bool {
    match (x, y) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Date(a), Value::Date(b)) => a == b,
        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
        (Value::Reference(a), Value::Reference(b)) => a == b,
        _ => false,
    }
}

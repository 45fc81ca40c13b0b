use super::{AccessorFrame, PExpr};
use crate::value::{number_to_string_radix, JsDate, Value};

/// Host hook resolving names no declaration binds (`Math`, `print`, ...).
///
/// The frame passed in is the unbound member. Return `PExpr::Unknown` for
/// names the context does not know: the evaluator reports them undefined.
pub trait GlobalContext {
    fn visit(&self, frame: &mut AccessorFrame<'_>) -> PExpr;
}

/// `Number`, `String`, `Boolean` and `Date` conversions.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardGlobals;

impl GlobalContext for StandardGlobals {
    fn visit(&self, frame: &mut AccessorFrame<'_>) -> PExpr {
        standard_globals(frame)
    }
}

/// The standard globals, for contexts that extend them:
///
/// ```ignore
/// fn visit(&self, frame: &mut AccessorFrame<'_>) -> PExpr {
///     match self.own_names(frame) {
///         PExpr::Unknown => standard_globals(frame),
///         outcome => outcome,
///     }
/// }
/// ```
pub fn standard_globals(frame: &mut AccessorFrame<'_>) -> PExpr {
    frame
        .matcher()
        .on("Number")
        .on_call(1, |f, args| {
            let n = args.first().map_or(0.0, |a| a.to_primitive().to_number());
            f.set_result(Value::number(n))
        })
        .on("String")
        .on_call(1, |f, args| {
            let s = args.first().map(Value::to_js_string).unwrap_or_default();
            f.set_result(s)
        })
        .on("Boolean")
        .on_call(1, |f, args| {
            f.set_result(args.first().map_or(false, Value::to_boolean))
        })
        .on("Date")
        .on_call(7, date)
        .resolve()
}

/// `Date(year, month, day, hours, minutes, seconds, ms)`, month 1-based.
/// Negative parts are zero, as are missing ones. Year, month and day are
/// clamped; a date that still does not exist is an error.
fn date(frame: &mut AccessorFrame<'_>, args: Vec<Value>) -> PExpr {
    let mut parts = [0i64; 7];
    for (part, arg) in parts.iter_mut().zip(&args) {
        *part = arg.to_int64().max(0);
    }
    parts[0] = parts[0].min(9999);
    parts[1] = parts[1].clamp(1, 12);
    parts[2] = parts[2].clamp(1, 31);
    match JsDate::from_parts(parts) {
        Some(date) => frame.set_result(Value::Date(date)),
        None => frame.set_error("Invalid date."),
    }
}

/// Members and methods of values: `toString` on every primitive and dates,
/// `length` and `charAt` on strings, `message` on errors.
pub fn visit_value(value: &Value, frame: &mut AccessorFrame<'_>) -> PExpr {
    match value {
        Value::Number(n) => {
            let n = *n;
            frame
                .on("toString")
                .on_call(1, move |f, args| {
                    let radix = args.first().map_or(10, Value::to_int64);
                    if !(2..=36).contains(&radix) {
                        return f.set_error("Radix must be between 2 and 36.");
                    }
                    f.set_result(number_to_string_radix(n, radix as u32))
                })
                .resolve()
        }
        Value::String(s) => {
            let (text, chars) = (s.clone(), s.clone());
            frame
                .matcher()
                .on_get("length", |f| {
                    f.set_result(Value::number(text.chars().count() as f64))
                })
                .on("charAt")
                .on_call(1, move |f, args| {
                    let index = args.first().map_or(0, Value::to_int64);
                    let c = usize::try_from(index)
                        .ok()
                        .and_then(|i| chars.chars().nth(i))
                        .map(String::from)
                        .unwrap_or_default();
                    f.set_result(c)
                })
                .on("toString")
                .on_call(0, |f, _| f.set_result(Value::String(s.clone())))
                .resolve()
        }
        Value::Boolean(_) | Value::Date(_) => {
            let text = value.to_js_string();
            frame
                .on("toString")
                .on_call(0, move |f, _| f.set_result(text))
                .resolve()
        }
        Value::Error(e) => frame
            .matcher()
            .on_get("message", |f| f.set_result(e.message.as_str()))
            .resolve(),
        _ => PExpr::Unknown,
    }
}

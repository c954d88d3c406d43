//! The pure builtins a snippet may call

use super::args::Args;
use super::budget::Budget;
use super::numeric;
use super::value::{format_number, Namespace, Value};
use super::ScriptError;

pub const FUNCTIONS: &[&str] = &[
    "range", "len", "abs", "min", "max", "sum", "round", "float", "int", "list", "print",
];

pub fn lookup(name: &str) -> Option<Value> {
    FUNCTIONS
        .iter()
        .copied()
        .find(|f| *f == name)
        .map(|f| Value::Function(Namespace::Builtins, f))
}

fn range(args: &Args, budget: &mut Budget) -> Result<Value, ScriptError> {
    args.allow_keywords(&[])?;
    args.max_positional(3)?;
    let ints = args
        .positional()
        .iter()
        .map(|v| v.expect_integer("range() argument"))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(ScriptError::Type("range expected at least 1 argument, got 0".into())),
    };
    if step == 0 {
        return Err(ScriptError::Value("range() arg 3 must not be zero".into()));
    }
    let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
    let span = if step > 0 { stop - start } else { start - stop };
    let len = usize::try_from((span + step.abs() - 1) / step.abs()).unwrap_or(0);
    budget.check_len(len)?;
    budget.charge(len)?;
    #[allow(clippy::cast_precision_loss)]
    let items = (0..len)
        .map(|i| Value::Number((start + step * i as i128) as f64))
        .collect();
    Ok(Value::List(items))
}

/// `min`/`max` over one iterable or several arguments
fn extreme(args: &Args, pick_max: bool) -> Result<Value, ScriptError> {
    let items = match args.positional() {
        [single] => single.iter_items()?,
        many => many.to_vec(),
    };
    let mut best: Option<f64> = None;
    for item in &items {
        let n = item.expect_number(&format!("{}() argument", args.name()))?;
        best = Some(match best {
            None => n,
            Some(b) if (pick_max && n > b) || (!pick_max && n < b) => n,
            Some(b) => b,
        });
    }
    best.map(Value::Number)
        .ok_or_else(|| ScriptError::Value(format!("{}() arg is an empty sequence", args.name())))
}

fn round(args: &Args) -> Result<Value, ScriptError> {
    let n = args.require(0, "number")?.expect_number("round() argument")?;
    match args.get(1, "ndigits") {
        None | Some(Value::None) => Ok(Value::Number(n.round_ties_even())),
        Some(digits) => {
            let digits = digits.expect_integer("ndigits")?.clamp(-300, 300);
            #[allow(clippy::cast_possible_truncation)]
            let scale = 10f64.powi(digits as i32);
            Ok(Value::Number((n * scale).round_ties_even() / scale))
        }
    }
}

fn convert(args: &Args, integer: bool) -> Result<Value, ScriptError> {
    let value = match args.get(0, "x") {
        None => return Ok(Value::Number(0.0)),
        Some(value) => value,
    };
    let n = match value {
        Value::Str(s) => s.trim().parse::<f64>().map_err(|_| {
            ScriptError::Value(format!(
                "could not convert string to {}: '{s}'",
                if integer { "int" } else { "float" }
            ))
        })?,
        other => other.expect_number(&format!("{}() argument", args.name()))?,
    };
    if integer {
        if !n.is_finite() {
            return Err(ScriptError::Value(format!(
                "cannot convert float {} to integer",
                format_number(n)
            )));
        }
        return Ok(Value::Number(n.trunc()));
    }
    Ok(Value::Number(n))
}

pub fn call(name: &'static str, args: &Args, budget: &mut Budget) -> Result<Value, ScriptError> {
    match name {
        "range" => range(args, budget),
        "len" => match args.require(0, "obj")? {
            Value::Str(s) => Ok(s.chars().count()),
            Value::Array(items) => Ok(items.len()),
            Value::List(items) | Value::Tuple(items) => Ok(items.len()),
            other => Err(ScriptError::Type(format!(
                "object of type '{}' has no len()",
                other.type_name()
            ))),
        }
        .map(|len| {
            #[allow(clippy::cast_precision_loss)]
            Value::Number(len as f64)
        }),
        "abs" => numeric::map_elements(args.require(0, "x")?, budget, f64::abs),
        "min" => extreme(args, false),
        "max" => extreme(args, true),
        "sum" => {
            let start = match args.get(1, "start") {
                Some(start) => start.expect_number("sum() start")?,
                None => 0.0,
            };
            let items = args.require(0, "iterable")?.to_array()?;
            match numeric::reduce("sum", &items, budget)? {
                Value::Number(total) => Ok(Value::Number(start + total)),
                other => Ok(other),
            }
        }
        "round" => round(args),
        "float" => convert(args, false),
        "int" => convert(args, true),
        "list" => match args.get(0, "iterable") {
            None => Ok(Value::List(Vec::new().into())),
            Some(value) => Ok(Value::List(value.iter_items()?.into())),
        },
        // Nothing is listening; output is dropped
        "print" => Ok(Value::None),
        other => Err(ScriptError::Name(other.to_string())),
    }
}

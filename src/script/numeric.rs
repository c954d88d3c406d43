//! Arithmetic and the `numpy` namespace
//!
//! Scalars follow Python float semantics, so dividing by zero raises.
//! Arrays follow numpy semantics: elementwise, broadcasting against
//! scalars, with IEEE infinities and NaN instead of errors.

use super::args::Args;
use super::ast::{BinOp, CmpOp};
use super::budget::Budget;
use super::value::{Namespace, Value};
use super::ScriptError;
use std::f64::consts;

/// Callable members of the numeric namespace
pub const FUNCTIONS: &[&str] = &[
    "linspace", "arange", "array", "asarray", "zeros", "ones", "sin", "cos", "tan", "arcsin",
    "arccos", "arctan", "arctan2", "sinh", "cosh", "tanh", "exp", "log", "log10", "log2",
    "sqrt", "abs", "absolute", "floor", "ceil", "radians", "degrees", "power", "maximum",
    "minimum", "where", "sum", "mean", "max", "min",
];

/// Attribute lookup on the numeric namespace
pub fn attribute(name: &str) -> Option<Value> {
    let constant = match name {
        "pi" => Some(consts::PI),
        "e" => Some(consts::E),
        "inf" => Some(f64::INFINITY),
        "nan" => Some(f64::NAN),
        _ => None,
    };
    constant.map(Value::Number).or_else(|| {
        FUNCTIONS
            .iter()
            .copied()
            .find(|f| *f == name)
            .map(|f| Value::Function(Namespace::Numpy, f))
    })
}

// ============================================================================
// Operators
// ============================================================================

fn scalar_op(op: BinOp, a: f64, b: f64) -> Result<f64, ScriptError> {
    let zero = |message: &str| Err(ScriptError::ZeroDivision(message.to_string()));
    match op {
        BinOp::Add => Ok(a + b),
        BinOp::Sub => Ok(a - b),
        BinOp::Mul => Ok(a * b),
        BinOp::Div if b == 0.0 => zero("division by zero"),
        BinOp::Div => Ok(a / b),
        BinOp::FloorDiv if b == 0.0 => zero("float floor division by zero"),
        BinOp::FloorDiv => Ok((a / b).floor()),
        BinOp::Mod if b == 0.0 => zero("float modulo"),
        BinOp::Mod => Ok(python_mod(a, b)),
        BinOp::Pow if a == 0.0 && b < 0.0 => zero("0.0 cannot be raised to a negative power"),
        BinOp::Pow => Ok(a.powf(b)),
    }
}

fn array_op(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::FloorDiv => (a / b).floor(),
        BinOp::Mod if b == 0.0 => f64::NAN,
        BinOp::Mod => python_mod(a, b),
        BinOp::Pow => a.powf(b),
    }
}

/// Modulo whose sign follows the divisor
fn python_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

fn unsupported(op: &str, lhs: &Value, rhs: &Value) -> ScriptError {
    ScriptError::Type(format!(
        "unsupported operand type(s) for {op}: '{}' and '{}'",
        lhs.type_name(),
        rhs.type_name()
    ))
}

/// Values that take part in elementwise numeric operations
fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) | Value::Bool(_) | Value::Array(_) => true,
        Value::List(items) | Value::Tuple(items) => items.iter().all(|i| i.as_number().is_some()),
        _ => false,
    }
}

/// Apply `f` pairwise, broadcasting a length-one side
pub fn broadcast(
    lhs: &[f64],
    rhs: &[f64],
    budget: &mut Budget,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Value, ScriptError> {
    let len = match (lhs.len(), rhs.len()) {
        (a, b) if a == b => a,
        (1, b) => b,
        (a, 1) => a,
        (a, b) => {
            return Err(ScriptError::Value(format!(
                "operands could not be broadcast together with shapes ({a},) ({b},)"
            )))
        }
    };
    budget.check_len(len)?;
    budget.charge(len)?;
    let at = |side: &[f64], i: usize| if side.len() == 1 { side[0] } else { side[i] };
    Ok(Value::array((0..len).map(|i| f(at(lhs, i), at(rhs, i))).collect()))
}

/// Apply `f` to every element, keeping scalars scalar
pub fn map_elements(
    value: &Value,
    budget: &mut Budget,
    f: impl Fn(f64) -> f64,
) -> Result<Value, ScriptError> {
    if let Some(n) = value.as_number() {
        return Ok(Value::Number(f(n)));
    }
    let items = value.to_array()?;
    budget.charge(items.len())?;
    Ok(Value::array(items.iter().map(|n| f(*n)).collect()))
}

pub fn binary(op: BinOp, lhs: &Value, rhs: &Value, budget: &mut Budget) -> Result<Value, ScriptError> {
    match (op, lhs, rhs) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => {
            let len = a.len().saturating_add(b.len());
            budget.check_text(len)?;
            budget.charge(len)?;
            Ok(Value::str(format!("{a}{b}")))
        }
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            budget.check_len(a.len() + b.len())?;
            budget.charge(a.len() + b.len())?;
            Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinOp::Mul, Value::Str(s), n) | (BinOp::Mul, n, Value::Str(s)) if n.as_number().is_some() => {
            let times = usize::try_from(n.expect_integer("repeat count")?.max(0)).unwrap_or(0);
            let len = s.len().saturating_mul(times);
            budget.check_text(len)?;
            budget.charge(len)?;
            Ok(Value::str(s.repeat(times)))
        }
        _ => {
            if let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) {
                budget.charge(1)?;
                return scalar_op(op, a, b).map(Value::Number);
            }
            let elementwise = matches!(lhs, Value::Array(_)) || matches!(rhs, Value::Array(_));
            if elementwise && is_numeric(lhs) && is_numeric(rhs) {
                return broadcast(&lhs.to_array()?, &rhs.to_array()?, budget, |a, b| {
                    array_op(op, a, b)
                });
            }
            Err(unsupported(op.symbol(), lhs, rhs))
        }
    }
}

#[allow(clippy::float_cmp)]
fn compare_scalars(op: CmpOp, a: f64, b: f64) -> bool {
    match op {
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
    }
}

/// Comparisons; arrays compare elementwise into 0/1 masks
pub fn compare(op: CmpOp, lhs: &Value, rhs: &Value, budget: &mut Budget) -> Result<Value, ScriptError> {
    if let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) {
        return Ok(Value::Bool(compare_scalars(op, a, b)));
    }
    let elementwise = matches!(lhs, Value::Array(_)) || matches!(rhs, Value::Array(_));
    if elementwise && is_numeric(lhs) && is_numeric(rhs) {
        return broadcast(&lhs.to_array()?, &rhs.to_array()?, budget, |a, b| {
            f64::from(u8::from(compare_scalars(op, a, b)))
        });
    }
    match (op, lhs, rhs) {
        (CmpOp::Eq, Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a == b)),
        (CmpOp::Ne, Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a != b)),
        (CmpOp::Eq, Value::None, Value::None) => Ok(Value::Bool(true)),
        (CmpOp::Eq | CmpOp::Ne, _, _) => Ok(Value::Bool(op == CmpOp::Ne)),
        _ => {
            let symbol = match op {
                CmpOp::Lt => "<",
                CmpOp::Le => "<=",
                CmpOp::Gt => ">",
                _ => ">=",
            };
            Err(ScriptError::Type(format!(
                "'{symbol}' not supported between instances of '{}' and '{}'",
                lhs.type_name(),
                rhs.type_name()
            )))
        }
    }
}

pub fn negate(value: &Value, budget: &mut Budget) -> Result<Value, ScriptError> {
    if value.as_number().is_some() || matches!(value, Value::Array(_)) {
        return map_elements(value, budget, |n| -n);
    }
    Err(ScriptError::Type(format!(
        "bad operand type for unary -: '{}'",
        value.type_name()
    )))
}

// ============================================================================
// numpy functions
// ============================================================================

fn unary_math(name: &str) -> Option<fn(f64) -> f64> {
    let f: fn(f64) -> f64 = match name {
        "sin" => f64::sin,
        "cos" => f64::cos,
        "tan" => f64::tan,
        "arcsin" => f64::asin,
        "arccos" => f64::acos,
        "arctan" => f64::atan,
        "sinh" => f64::sinh,
        "cosh" => f64::cosh,
        "tanh" => f64::tanh,
        "exp" => f64::exp,
        "log" => f64::ln,
        "log10" => f64::log10,
        "log2" => f64::log2,
        "sqrt" => f64::sqrt,
        "abs" | "absolute" => f64::abs,
        "floor" => f64::floor,
        "ceil" => f64::ceil,
        "radians" => f64::to_radians,
        "degrees" => f64::to_degrees,
        _ => return None,
    };
    Some(f)
}

fn binary_math(name: &str) -> Option<fn(f64, f64) -> f64> {
    let f: fn(f64, f64) -> f64 = match name {
        "power" => f64::powf,
        "maximum" => |a: f64, b: f64| if a.is_nan() || b.is_nan() { f64::NAN } else { a.max(b) },
        "minimum" => |a: f64, b: f64| if a.is_nan() || b.is_nan() { f64::NAN } else { a.min(b) },
        "arctan2" => f64::atan2,
        _ => return None,
    };
    Some(f)
}

fn sample_count(value: &Value, budget: &Budget) -> Result<usize, ScriptError> {
    let n = value.expect_integer("number of samples")?;
    let n = usize::try_from(n).map_err(|_| {
        ScriptError::Value(format!("Number of samples, {n}, must be non-negative."))
    })?;
    budget.check_len(n)?;
    Ok(n)
}

fn linspace(args: &Args, budget: &mut Budget) -> Result<Value, ScriptError> {
    args.max_positional(4)?;
    args.allow_keywords(&["start", "stop", "num", "endpoint"])?;
    let start = args.require(0, "start")?.expect_number("start")?;
    let stop = args.require(1, "stop")?.expect_number("stop")?;
    let num = match args.get(2, "num") {
        Some(value) => sample_count(value, budget)?,
        None => 50,
    };
    let endpoint = args.get(3, "endpoint").is_none_or(Value::truthy);
    budget.charge(num)?;

    let divisions = if endpoint { num.saturating_sub(1) } else { num };
    #[allow(clippy::cast_precision_loss)]
    let values = if divisions == 0 {
        vec![start; num]
    } else {
        let step = (stop - start) / divisions as f64;
        (0..num)
            .map(|i| {
                if endpoint && i + 1 == num {
                    stop
                } else {
                    start + step * i as f64
                }
            })
            .collect()
    };
    Ok(Value::array(values))
}

fn arange(args: &Args, budget: &mut Budget) -> Result<Value, ScriptError> {
    args.max_positional(3)?;
    args.allow_keywords(&["start", "stop", "step"])?;
    let (start, stop) = match (args.get(0, "start"), args.get(1, "stop")) {
        (Some(start), Some(stop)) => (start.expect_number("start")?, stop.expect_number("stop")?),
        (Some(stop), None) => (0.0, stop.expect_number("stop")?),
        (None, _) => return Err(ScriptError::Type("arange() requires stop to be specified.".into())),
    };
    let step = match args.get(2, "step") {
        Some(step) => step.expect_number("step")?,
        None => 1.0,
    };
    if step == 0.0 {
        return Err(ScriptError::ZeroDivision("division by zero".into()));
    }
    let span = ((stop - start) / step).ceil();
    if !span.is_finite() {
        return Err(ScriptError::Value("arange() bounds must be finite".into()));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let len = span.max(0.0).min(usize::MAX as f64) as usize;
    budget.check_len(len)?;
    budget.charge(len)?;
    #[allow(clippy::cast_precision_loss)]
    Ok(Value::array((0..len).map(|i| start + step * i as f64).collect()))
}

fn filled(args: &Args, budget: &mut Budget, fill: f64) -> Result<Value, ScriptError> {
    let shape = args.require(0, "shape")?;
    let n = match shape {
        Value::Tuple(items) | Value::List(items) if items.len() == 1 => sample_count(&items[0], budget)?,
        Value::Tuple(_) | Value::List(_) => {
            return Err(ScriptError::Value("only one-dimensional arrays are supported".into()))
        }
        other => sample_count(other, budget)?,
    };
    budget.charge(n)?;
    Ok(Value::array(vec![fill; n]))
}

fn where_(args: &Args, budget: &mut Budget) -> Result<Value, ScriptError> {
    args.max_positional(3)?;
    let condition = args.require(0, "condition")?.to_array()?;
    let yes = args.require(1, "x")?.to_array()?;
    let no = args.require(2, "y")?.to_array()?;

    let len = condition.len().max(yes.len()).max(no.len());
    if [&condition, &yes, &no]
        .iter()
        .any(|side| side.len() != 1 && side.len() != len)
    {
        return Err(ScriptError::Value(format!(
            "operands could not be broadcast together with shapes ({},) ({},) ({},)",
            condition.len(),
            yes.len(),
            no.len()
        )));
    }
    budget.check_len(len)?;
    budget.charge(len)?;
    let at = |side: &[f64], i: usize| if side.len() == 1 { side[0] } else { side[i] };
    Ok(Value::array(
        (0..len)
            .map(|i| {
                if at(&condition, i) != 0.0 {
                    at(&yes, i)
                } else {
                    at(&no, i)
                }
            })
            .collect(),
    ))
}

/// Reductions shared by `np.sum` and friends and the array methods
pub fn reduce(name: &str, items: &[f64], budget: &mut Budget) -> Result<Value, ScriptError> {
    budget.charge(items.len())?;
    let empty = || {
        ScriptError::Value(format!(
            "zero-size array to reduction operation {name} which has no identity"
        ))
    };
    #[allow(clippy::cast_precision_loss)]
    let value = match name {
        "sum" => items.iter().sum(),
        "mean" if items.is_empty() => f64::NAN,
        "mean" => items.iter().sum::<f64>() / items.len() as f64,
        "max" => items
            .iter()
            .copied()
            .reduce(|a, b| if a.is_nan() || b.is_nan() { f64::NAN } else { a.max(b) })
            .ok_or_else(empty)?,
        "min" => items
            .iter()
            .copied()
            .reduce(|a, b| if a.is_nan() || b.is_nan() { f64::NAN } else { a.min(b) })
            .ok_or_else(empty)?,
        other => return Err(ScriptError::Attribute(format!("no reduction named '{other}'"))),
    };
    Ok(Value::Number(value))
}

pub fn call(name: &'static str, args: &Args, budget: &mut Budget) -> Result<Value, ScriptError> {
    if let Some(f) = unary_math(name) {
        args.max_positional(1)?;
        return map_elements(args.require(0, "x")?, budget, f);
    }
    if let Some(f) = binary_math(name) {
        args.max_positional(2)?;
        let a = args.require(0, "x1")?;
        let b = args.require(1, "x2")?;
        if let (Some(a), Some(b)) = (a.as_number(), b.as_number()) {
            return Ok(Value::Number(f(a, b)));
        }
        return broadcast(&a.to_array()?, &b.to_array()?, budget, f);
    }
    match name {
        "linspace" => linspace(args, budget),
        "arange" => arange(args, budget),
        "array" | "asarray" => {
            let items = args.require(0, "object")?.to_array()?;
            budget.check_len(items.len())?;
            Ok(Value::Array(items))
        }
        "zeros" => filled(args, budget, 0.0),
        "ones" => filled(args, budget, 1.0),
        "where" => where_(args, budget),
        "sum" | "mean" | "max" | "min" => {
            let items = args.require(0, "a")?.to_array()?;
            reduce(name, &items, budget)
        }
        other => Err(ScriptError::Attribute(format!(
            "module 'numpy' has no attribute '{other}'"
        ))),
    }
}

//! Tree-walking evaluator
//!
//! Owns the figure for the duration of a run. Every node evaluated is
//! charged against the budget, so the interpreter stops on its own when a
//! snippet runs away.

use super::args::Args;
use super::ast::{Expr, FormatPart, Statement, StmtKind, Subscript, UnaryOp};
use super::budget::{Budget, Limits};
use super::value::{format_number, Lambda, Module, Namespace, Value};
use super::{builtins, numeric, pyplot, ScriptError};
use crate::render::Figure;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
pub struct Interpreter {
    globals: HashMap<String, Value>,
    frames: Vec<HashMap<String, Value>>,
    figure: Figure,
    budget: Budget,
}

impl Interpreter {
    /// Fresh interpreter with the capability set pre-bound
    pub fn new(figure: Figure, limits: Limits) -> Self {
        let mut globals = HashMap::new();
        globals.insert("np".to_string(), Value::Module(Module::Numpy));
        globals.insert("numpy".to_string(), Value::Module(Module::Numpy));
        globals.insert("plt".to_string(), Value::Module(Module::Pyplot));
        globals.insert("fig".to_string(), Value::Figure);
        globals.insert("ax".to_string(), Value::Axes);
        Self {
            globals,
            frames: Vec::new(),
            figure,
            budget: Budget::new(limits),
        }
    }

    pub fn run(&mut self, program: &[Statement]) -> Result<(), ScriptError> {
        for statement in program {
            self.exec(&statement.kind)
                .map_err(|e| e.at_line(statement.line))?;
        }
        Ok(())
    }

    pub fn into_figure(self) -> Figure {
        self.figure
    }

    fn exec(&mut self, stmt: &StmtKind) -> Result<(), ScriptError> {
        self.budget.charge(1)?;
        match stmt {
            StmtKind::Import { module, alias } => {
                let resolved = Module::resolve(module)
                    .ok_or_else(|| ScriptError::Import(format!("No module named '{module}'")))?;
                // `import matplotlib.pyplot` binds the top-level package
                let (name, value) = match alias {
                    Some(alias) => (alias.clone(), Value::Module(resolved)),
                    None if resolved == Module::Pyplot => {
                        ("matplotlib".to_string(), Value::Module(Module::Matplotlib))
                    }
                    None => (module.clone(), Value::Module(resolved)),
                };
                self.globals.insert(name, value);
            }
            StmtKind::FromImport { module, names } => {
                let resolved = Module::resolve(module)
                    .ok_or_else(|| ScriptError::Import(format!("No module named '{module}'")))?;
                for (name, alias) in names {
                    let value = self.module_attribute(resolved, name).map_err(|_| {
                        ScriptError::Import(format!(
                            "cannot import name '{name}' from '{module}'"
                        ))
                    })?;
                    self.globals.insert(alias.clone().unwrap_or_else(|| name.clone()), value);
                }
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval(value)?;
                self.assign(targets, value)?;
            }
            StmtKind::AugAssign { target, op, value } => {
                let current = self.lookup(target)?;
                let rhs = self.eval(value)?;
                let updated = numeric::binary(*op, &current, &rhs, &mut self.budget)?;
                self.globals.insert(target.clone(), updated);
            }
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
            StmtKind::Pass => {}
        }
        Ok(())
    }

    fn assign(&mut self, targets: &[String], value: Value) -> Result<(), ScriptError> {
        if let [single] = targets {
            self.globals.insert(single.clone(), value);
            return Ok(());
        }
        let items = value.iter_items()?;
        if items.len() != targets.len() {
            return Err(ScriptError::Value(if items.len() > targets.len() {
                format!("too many values to unpack (expected {})", targets.len())
            } else {
                format!(
                    "not enough values to unpack (expected {}, got {})",
                    targets.len(),
                    items.len()
                )
            }));
        }
        for (target, item) in targets.iter().zip(items) {
            self.globals.insert(target.clone(), item);
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<Value, ScriptError> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .or_else(|| self.globals.get(name))
            .cloned()
            .or_else(|| builtins::lookup(name))
            .ok_or_else(|| ScriptError::Name(name.to_string()))
    }

    fn module_attribute(&self, module: Module, name: &str) -> Result<Value, ScriptError> {
        let found = match module {
            Module::Numpy => numeric::attribute(name),
            Module::Pyplot => pyplot::lookup(Namespace::Pyplot, name),
            Module::Matplotlib => (name == "pyplot").then_some(Value::Module(Module::Pyplot)),
        };
        found.ok_or_else(|| {
            ScriptError::Attribute(format!(
                "module '{}' has no attribute '{name}'",
                module.name()
            ))
        })
    }

    fn attribute(&self, value: &Value, name: &str) -> Result<Value, ScriptError> {
        let missing = || {
            ScriptError::Attribute(format!(
                "'{}' object has no attribute '{name}'",
                value.type_name()
            ))
        };
        match value {
            Value::Module(module) => self.module_attribute(*module, name),
            Value::Axes => pyplot::lookup(Namespace::Axes, name).ok_or_else(missing),
            Value::Figure => pyplot::lookup(Namespace::Figure, name).ok_or_else(missing),
            Value::Array(items) => {
                #[allow(clippy::cast_precision_loss)]
                let len = items.len() as f64;
                let method = match name {
                    "size" => return Ok(Value::Number(len)),
                    "shape" => return Ok(Value::Tuple(Rc::from(vec![Value::Number(len)]))),
                    "sum" => "sum",
                    "mean" => "mean",
                    "max" => "max",
                    "min" => "min",
                    _ => return Err(missing()),
                };
                Ok(Value::ArrayMethod(Rc::clone(items), method))
            }
            _ => Err(missing()),
        }
    }

    fn subscript(&mut self, value: &Value, index: &Subscript) -> Result<Value, ScriptError> {
        match index {
            Subscript::Index(expr) => {
                let index = self.eval(expr)?;
                let len = match value {
                    Value::Array(items) => items.len(),
                    Value::List(items) | Value::Tuple(items) => items.len(),
                    other => {
                        return Err(ScriptError::Type(format!(
                            "'{}' object is not subscriptable",
                            other.type_name()
                        )))
                    }
                };
                let i = index.expect_integer("index")?;
                let resolved = if i < 0 {
                    i.saturating_add(i64::try_from(len).unwrap_or(i64::MAX))
                } else {
                    i
                };
                let position = usize::try_from(resolved)
                    .ok()
                    .filter(|p| *p < len)
                    .ok_or_else(|| ScriptError::Index("index out of range".into()))?;
                Ok(match value {
                    Value::Array(items) => Value::Number(items[position]),
                    Value::List(items) | Value::Tuple(items) => items[position].clone(),
                    _ => Value::None,
                })
            }
            Subscript::Slice { start, stop, step } => {
                let mut bound = |expr: Option<&Expr>| -> Result<Option<i64>, ScriptError> {
                    match expr {
                        None => Ok(None),
                        Some(e) => match self.eval(e)? {
                            Value::None => Ok(None),
                            v => v.expect_integer("slice index").map(Some),
                        },
                    }
                };
                let (start, stop, step) = (
                    bound(start.as_ref())?,
                    bound(stop.as_ref())?,
                    bound(step.as_ref())?,
                );
                let positions = |len: usize| slice_positions(len, start, stop, step);
                match value {
                    Value::Array(items) => {
                        let picked: Vec<f64> =
                            positions(items.len())?.into_iter().map(|i| items[i]).collect();
                        self.budget.charge(picked.len())?;
                        Ok(Value::array(picked))
                    }
                    Value::List(items) => Ok(Value::List(
                        positions(items.len())?
                            .into_iter()
                            .map(|i| items[i].clone())
                            .collect(),
                    )),
                    Value::Tuple(items) => Ok(Value::Tuple(
                        positions(items.len())?
                            .into_iter()
                            .map(|i| items[i].clone())
                            .collect(),
                    )),
                    other => Err(ScriptError::Type(format!(
                        "'{}' object is not subscriptable",
                        other.type_name()
                    ))),
                }
            }
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        self.budget.charge(1)?;
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::str(s)),
            Expr::FormatStr(parts) => {
                let mut out = String::new();
                for part in parts {
                    let piece = match part {
                        FormatPart::Literal(text) => text.clone(),
                        FormatPart::Field { expr, spec } => {
                            let value = self.eval(expr)?;
                            format_field(&value, spec)?
                        }
                    };
                    let len = out.len().saturating_add(piece.len());
                    self.budget.check_text(len)?;
                    self.budget.charge(piece.len())?;
                    out.push_str(&piece);
                }
                Ok(Value::str(out))
            }
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::None => Ok(Value::None),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => Ok(Value::List(self.eval_all(items)?.into())),
            Expr::Tuple(items) => Ok(Value::Tuple(self.eval_all(items)?.into())),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Neg => numeric::negate(&value, &mut self.budget),
                    UnaryOp::Pos if value.as_number().is_some() || matches!(value, Value::Array(_)) => {
                        Ok(value)
                    }
                    UnaryOp::Pos => Err(ScriptError::Type(format!(
                        "bad operand type for unary +: '{}'",
                        value.type_name()
                    ))),
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                numeric::binary(*op, &lhs, &rhs, &mut self.budget)
            }
            Expr::Compare { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                numeric::compare(*op, &lhs, &rhs, &mut self.budget)
            }
            Expr::Attribute { value, name } => {
                let value = self.eval(value)?;
                self.attribute(&value, name)
            }
            Expr::Call { func, args, kwargs } => {
                let func = self.eval(func)?;
                let positional = self.eval_all(args)?;
                let mut keyword = Vec::with_capacity(kwargs.len());
                for (name, expr) in kwargs {
                    keyword.push((name.clone(), self.eval(expr)?));
                }
                self.call(func, positional, keyword)
            }
            Expr::Subscript { value, index } => {
                let value = self.eval(value)?;
                self.subscript(&value, index)
            }
            Expr::Lambda { params, body } => Ok(Value::Lambda(Rc::new(Lambda {
                params: Rc::clone(params),
                body: Rc::clone(body),
            }))),
            Expr::ListComp { element, var, iter } => {
                let items = self.eval(iter)?.iter_items()?;
                self.budget.check_len(items.len())?;
                self.frames.push(HashMap::new());
                let result = items
                    .into_iter()
                    .map(|item| {
                        if let Some(frame) = self.frames.last_mut() {
                            frame.insert(var.clone(), item);
                        }
                        self.eval(element)
                    })
                    .collect::<Result<Vec<_>, _>>();
                self.frames.pop();
                Ok(Value::List(result?.into()))
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, ScriptError> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn call(
        &mut self,
        func: Value,
        positional: Vec<Value>,
        keyword: Vec<(String, Value)>,
    ) -> Result<Value, ScriptError> {
        match func {
            Value::Function(namespace, name) => {
                let args = Args::new(name, positional, keyword);
                match namespace {
                    Namespace::Builtins => builtins::call(name, &args, &mut self.budget),
                    Namespace::Numpy => numeric::call(name, &args, &mut self.budget),
                    Namespace::Pyplot => {
                        pyplot::call_pyplot(&mut self.figure, name, &args, &mut self.budget)
                    }
                    Namespace::Axes => {
                        pyplot::call_axes(&mut self.figure, name, &args, &mut self.budget)
                    }
                    Namespace::Figure => pyplot::call_figure(&mut self.figure, name, &args),
                }
            }
            Value::ArrayMethod(items, name) => {
                if !positional.is_empty() || !keyword.is_empty() {
                    return Err(ScriptError::Type(format!(
                        "{name}() takes no arguments in plot snippets"
                    )));
                }
                numeric::reduce(name, &items, &mut self.budget)
            }
            Value::Lambda(lambda) => self.call_lambda(&lambda, positional, keyword),
            other => Err(ScriptError::Type(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_lambda(
        &mut self,
        lambda: &Lambda,
        positional: Vec<Value>,
        keyword: Vec<(String, Value)>,
    ) -> Result<Value, ScriptError> {
        let params = &lambda.params;
        if positional.len() > params.len() {
            return Err(ScriptError::Type(format!(
                "<lambda>() takes {} positional arguments but {} were given",
                params.len(),
                positional.len()
            )));
        }
        let mut frame: HashMap<String, Value> = params.iter().cloned().zip(positional).collect();
        for (name, value) in keyword {
            if !params.contains(&name) {
                return Err(ScriptError::Type(format!(
                    "<lambda>() got an unexpected keyword argument '{name}'"
                )));
            }
            if frame.insert(name.clone(), value).is_some() {
                return Err(ScriptError::Type(format!(
                    "<lambda>() got multiple values for argument '{name}'"
                )));
            }
        }
        if let Some(missing) = params.iter().find(|p| !frame.contains_key(*p)) {
            return Err(ScriptError::Type(format!(
                "<lambda>() missing required positional argument: '{missing}'"
            )));
        }

        self.budget.enter_call()?;
        self.frames.push(frame);
        let result = self.eval(&lambda.body);
        self.frames.pop();
        self.budget.leave_call();
        result
    }
}

/// Python slice semantics over `len` elements
fn slice_positions(
    len: usize,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> Result<Vec<usize>, ScriptError> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(ScriptError::Value("slice step cannot be zero".into()));
    }
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let clamp = |index: i64, low: i64, high: i64| {
        let index = if index < 0 { index + len } else { index };
        index.clamp(low, high)
    };
    let mut positions = Vec::new();
    if step > 0 {
        let start = start.map_or(0, |s| clamp(s, 0, len));
        let stop = stop.map_or(len, |s| clamp(s, 0, len));
        let mut i = start;
        while i < stop {
            positions.push(i);
            i += step;
        }
    } else {
        let start = start.map_or(len - 1, |s| clamp(s, -1, len - 1));
        let stop = stop.map_or(-1, |s| clamp(s, -1, len - 1));
        let mut i = start;
        while i > stop {
            positions.push(i);
            i += step;
        }
    }
    Ok(positions
        .into_iter()
        .filter_map(|i| usize::try_from(i).ok())
        .collect())
}

/// Apply an f-string format spec
fn format_field(value: &Value, spec: &str) -> Result<String, ScriptError> {
    if spec.is_empty() {
        return Ok(value.to_string());
    }
    let n = value.as_number().ok_or_else(|| {
        ScriptError::Value(format!(
            "Unknown format code '{spec}' for object of type '{}'",
            value.type_name()
        ))
    })?;
    let precision = |digits: &str| {
        digits
            .parse::<usize>()
            .map_err(|_| ScriptError::Value(format!("Invalid format specifier '{spec}'")))
            .map(|p| p.min(20))
    };
    if let Some(digits) = spec.strip_prefix('.').and_then(|s| s.strip_suffix('f')) {
        return Ok(format!("{n:.*}", precision(digits)?));
    }
    if let Some(digits) = spec.strip_prefix('.').and_then(|s| s.strip_suffix('%')) {
        return Ok(format!("{:.*}%", precision(digits)?, n * 100.0));
    }
    match spec {
        "d" if n.fract() == 0.0 => Ok(format_number(n)),
        "g" => Ok(format_number(n)),
        "f" => Ok(format!("{n:.6}")),
        _ => Err(ScriptError::Value(format!("Invalid format specifier '{spec}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::{lines, parser};
    use super::*;

    fn run(source: &str) -> Result<Interpreter, ScriptError> {
        let program = parser::parse_program(&lines::split(source)?)?;
        let mut interpreter = Interpreter::new(Figure::new(), Limits::default());
        interpreter.run(&program)?;
        Ok(interpreter)
    }

    fn global(interpreter: &Interpreter, name: &str) -> Value {
        interpreter.lookup(name).unwrap()
    }

    fn number(interpreter: &Interpreter, name: &str) -> f64 {
        global(interpreter, name).as_number().unwrap()
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        let i = run("a = 2 + 3 * 4\nb = -2 ** 2\nc = 7 // 2\nd = 2 ** -1\ne = (1 + 2) * 3").unwrap();
        assert_eq!(number(&i, "a"), 14.0);
        assert_eq!(number(&i, "b"), -4.0);
        assert_eq!(number(&i, "c"), 3.0);
        assert_eq!(number(&i, "d"), 0.5);
        assert_eq!(number(&i, "e"), 9.0);
    }

    #[test]
    fn test_imports_and_aliases() {
        let i = run("import numpy\nfrom numpy import pi as PI, sin\nimport matplotlib.pyplot\ny = sin(PI / 2)\nz = numpy.cos(0)").unwrap();
        assert_eq!(number(&i, "y"), 1.0);
        assert_eq!(number(&i, "z"), 1.0);
        assert!(matches!(global(&i, "matplotlib"), Value::Module(Module::Matplotlib)));
        let err = run("from numpy import load").unwrap_err();
        assert_eq!(err.code(), "ImportError");
    }

    #[test]
    fn test_lambdas() {
        let err = run("f = lambda x, k=None: x * 2").unwrap_err();
        // default parameter values are not part of the language
        assert_eq!(err.code(), "SyntaxError");

        let i = run("f = lambda x, k: x * k\na = f(3, k=4)\nsq = lambda t: t ** 2\nys = sq(np.array([1, 2, 3]))").unwrap();
        assert_eq!(number(&i, "a"), 12.0);
        assert!(matches!(global(&i, "ys"), Value::Array(items) if items[2] == 9.0));

        assert_eq!(run("f = lambda x: x\nf()").unwrap_err().code(), "TypeError");
        assert_eq!(run("f = lambda x: x\nf(1, 2)").unwrap_err().code(), "TypeError");
    }

    #[test]
    fn test_lambda_scope_does_not_leak() {
        let err = run("f = lambda t: t + 1\nf(1)\nt").unwrap_err();
        assert_eq!(
            err,
            ScriptError::AtLine {
                line: 3,
                source: Box::new(ScriptError::Name("t".into()))
            }
        );
    }

    #[test]
    fn test_unpacking() {
        let i = run("a, b = 1, 2\n(c, d) = [3, 4]").unwrap();
        assert_eq!(number(&i, "b"), 2.0);
        assert_eq!(number(&i, "c"), 3.0);
        assert!(run("a, b = 1, 2, 3").is_err());
        assert!(run("a, b = 5").is_err());
    }

    #[test]
    fn test_subscripts_and_slices() {
        let i = run("x = np.arange(10)\na = x[-1]\nb = x[2:5]\nc = x[::-3]\nd = [1, 2, 3][1:]").unwrap();
        assert_eq!(number(&i, "a"), 9.0);
        assert!(matches!(global(&i, "b"), Value::Array(items) if &*items == [2.0, 3.0, 4.0]));
        assert!(matches!(global(&i, "c"), Value::Array(items) if &*items == [9.0, 6.0, 3.0, 0.0]));
        assert!(matches!(global(&i, "d"), Value::List(items) if items.len() == 2));
        assert_eq!(run("x = [1]\nx[3]").unwrap_err().code(), "IndexError");
    }

    #[test]
    fn test_comprehension_and_augmented_assignment() {
        let i = run("ys = [k ** 2 for k in range(4)]\ntotal = 0\ntotal += sum(ys)").unwrap();
        assert_eq!(number(&i, "total"), 14.0);
        let err = run("ys = [k for k in range(3)]\nk").unwrap_err();
        assert_eq!(err.code(), "NameError");
    }

    #[test]
    fn test_array_methods() {
        let i = run("x = np.array([3, 1, 2])\nm = x.max()\nn = x.size").unwrap();
        assert_eq!(number(&i, "m"), 3.0);
        assert_eq!(number(&i, "n"), 3.0);
        assert_eq!(run("np.array([1]).tofile('x')").unwrap_err().code(), "AttributeError");
    }

    #[test]
    fn test_format_strings() {
        let i = run("a = 1.23456\ns = f'a = {a:.2f}, n = {3}, p = {0.5:.0%}'").unwrap();
        assert!(matches!(global(&i, "s"), Value::Str(s) if &*s == "a = 1.23, n = 3, p = 50%"));
        assert_eq!(run("s = f'{\"x\":.2f}'").unwrap_err().code(), "ValueError");
    }

    #[test]
    fn test_slice_positions() {
        assert_eq!(slice_positions(5, None, None, None).unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(slice_positions(5, Some(-2), None, None).unwrap(), vec![3, 4]);
        assert_eq!(slice_positions(5, None, None, Some(-2)).unwrap(), vec![4, 2, 0]);
        assert_eq!(slice_positions(5, Some(10), Some(20), None).unwrap(), Vec::<usize>::new());
        assert!(slice_positions(5, None, None, Some(0)).is_err());
    }
}

//! Runtime values
//!
//! The only objects a snippet can reach are numbers, strings, arrays,
//! sequences, lambdas, and the fixed capability namespaces.

use super::ast::Expr;
use super::ScriptError;
use std::fmt;
use std::rc::Rc;

/// Namespaces whose functions a snippet may call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Builtins,
    Numpy,
    Pyplot,
    Axes,
    Figure,
}

/// Importable modules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    Numpy,
    Matplotlib,
    Pyplot,
}

impl Module {
    pub fn resolve(path: &str) -> Option<Self> {
        match path {
            "numpy" => Some(Module::Numpy),
            "matplotlib" => Some(Module::Matplotlib),
            "matplotlib.pyplot" => Some(Module::Pyplot),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Module::Numpy => "numpy",
            Module::Matplotlib => "matplotlib",
            Module::Pyplot => "matplotlib.pyplot",
        }
    }
}

#[derive(Debug)]
pub struct Lambda {
    pub params: Rc<[String]>,
    pub body: Rc<Expr>,
}

#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(Rc<[f64]>),
    List(Rc<[Value]>),
    Tuple(Rc<[Value]>),
    Module(Module),
    Function(Namespace, &'static str),
    ArrayMethod(Rc<[f64]>, &'static str),
    Lambda(Rc<Lambda>),
    Figure,
    Axes,
}

impl Value {
    pub fn array(values: Vec<f64>) -> Self {
        Value::Array(values.into())
    }

    pub fn str(text: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(text.as_ref()))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Number(_) => "float",
            Value::Str(_) => "str",
            Value::Array(_) => "numpy.ndarray",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Module(_) => "module",
            Value::Function(..) | Value::ArrayMethod(..) => "builtin_function_or_method",
            Value::Lambda(_) => "function",
            Value::Figure => "Figure",
            Value::Axes => "Axes",
        }
    }

    /// Scalar view of a number or bool
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            _ => None,
        }
    }

    pub fn expect_number(&self, what: &str) -> Result<f64, ScriptError> {
        self.as_number().ok_or_else(|| {
            ScriptError::Type(format!(
                "{what} must be a real number, not '{}'",
                self.type_name()
            ))
        })
    }

    /// Integer view, rejecting non-integral floats the way `range` does
    pub fn expect_integer(&self, what: &str) -> Result<i64, ScriptError> {
        let n = self.expect_number(what)?;
        if n.fract() != 0.0 || !n.is_finite() {
            return Err(ScriptError::Type(format!(
                "{what} must be an integer, got {}",
                format_number(n)
            )));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(n as i64)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    /// Elements of any iterable value
    pub fn iter_items(&self) -> Result<Vec<Value>, ScriptError> {
        match self {
            Value::Array(items) => Ok(items.iter().map(|n| Value::Number(*n)).collect()),
            Value::List(items) | Value::Tuple(items) => Ok(items.to_vec()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
            other => Err(ScriptError::Type(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Numeric array view of scalars and (nested-free) numeric sequences
    pub fn to_array(&self) -> Result<Rc<[f64]>, ScriptError> {
        match self {
            Value::Array(items) => Ok(Rc::clone(items)),
            Value::Number(_) | Value::Bool(_) => Ok(Rc::from(vec![self.expect_number("value")?])),
            Value::List(items) | Value::Tuple(items) => items
                .iter()
                .map(|item| {
                    item.as_number().ok_or_else(|| {
                        ScriptError::Type(format!(
                            "expected a sequence of numbers, found '{}'",
                            item.type_name()
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Rc::from),
            other => Err(ScriptError::Type(format!(
                "expected numeric data, got '{}'",
                other.type_name()
            ))),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            _ => true,
        }
    }
}

/// Render a number the way the snippet's author expects to read it
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "nan".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e16 {
        #[allow(clippy::cast_possible_truncation)]
        let whole = n as i64;
        whole.to_string()
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(items: &[Value], f: &mut fmt::Formatter<'_>) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                match item {
                    Value::Str(s) => write!(f, "'{s}'")?,
                    other => write!(f, "{other}")?,
                }
            }
            Ok(())
        }

        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Str(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, n) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    f.write_str(&format_number(*n))?;
                }
                f.write_str("]")
            }
            Value::List(items) => {
                f.write_str("[")?;
                join(items, f)?;
                f.write_str("]")
            }
            Value::Tuple(items) => {
                f.write_str("(")?;
                join(items, f)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Value::Module(module) => write!(f, "<module '{}'>", module.name()),
            Value::Function(_, name) | Value::ArrayMethod(_, name) => {
                write!(f, "<built-in function {name}>")
            }
            Value::Lambda(_) => f.write_str("<function <lambda>>"),
            Value::Figure => f.write_str("<Figure>"),
            Value::Axes => f.write_str("<Axes>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(-0.5), "-0.5");
        assert_eq!(format_number(f64::INFINITY), "inf");
        assert_eq!(format_number(f64::NAN), "nan");
    }

    #[test]
    fn test_to_array() {
        let list = Value::List(vec![Value::Number(1.0), Value::Bool(true)].into());
        assert_eq!(&*list.to_array().unwrap(), &[1.0, 1.0]);
        assert_eq!(&*Value::Number(3.0).to_array().unwrap(), &[3.0]);
        let bad = Value::List(vec![Value::str("a")].into());
        assert!(bad.to_array().is_err());
    }

    #[test]
    fn test_expect_integer() {
        assert_eq!(Value::Number(4.0).expect_integer("n").unwrap(), 4);
        assert!(Value::Number(4.5).expect_integer("n").is_err());
        assert!(Value::str("4").expect_integer("n").is_err());
    }

    #[test]
    fn test_display() {
        let tuple = Value::Tuple(vec![Value::Number(1.0), Value::str("a")].into());
        assert_eq!(tuple.to_string(), "(1, 'a')");
        assert_eq!(Value::array(vec![0.5, 2.0]).to_string(), "[0.5 2]");
    }
}

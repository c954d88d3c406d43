//! pest-based statement parser
//!
//! Each logical line is parsed on its own; operator precedence follows
//! Python, with `**` binding tighter than unary minus on its left.

use super::ast::{BinOp, CmpOp, Expr, FormatPart, Statement, StmtKind, Subscript, UnaryOp};
use super::lines::LogicalLine;
use super::ScriptError;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use std::rc::Rc;
use std::sync::LazyLock;

#[derive(pest_derive::Parser)]
#[grammar = "script/grammar.pest"]
struct SnippetParser;

static PRATT: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left)
            | Op::infix(Rule::eq, Assoc::Left)
            | Op::infix(Rule::ne, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::floordiv, Assoc::Left)
            | Op::infix(Rule::modulo, Assoc::Left))
        .op(Op::prefix(Rule::neg) | Op::prefix(Rule::pos))
        .op(Op::infix(Rule::pow, Assoc::Right))
        .op(Op::postfix(Rule::call) | Op::postfix(Rule::attribute) | Op::postfix(Rule::subscript))
});

type ParseResult<T> = Result<T, String>;

/// Parse every logical line, failing on the first syntax error
pub fn parse_program(lines: &[LogicalLine]) -> Result<Vec<Statement>, ScriptError> {
    lines
        .iter()
        .map(|line| {
            parse_statement(&line.text)
                .map(|kind| Statement {
                    line: line.number,
                    kind,
                })
                .map_err(|message| ScriptError::Syntax {
                    line: line.number,
                    message,
                })
        })
        .collect()
}

/// Parse a single logical line
pub fn parse_statement(text: &str) -> ParseResult<StmtKind> {
    let mut pairs = SnippetParser::parse(Rule::statement, text).map_err(|e| describe(&e))?;
    let statement = pairs.next().ok_or("empty statement")?;
    let stmt = statement
        .into_inner()
        .next()
        .ok_or("empty statement")?;
    build_statement(stmt)
}

fn parse_standalone_expr(text: &str) -> ParseResult<Expr> {
    let mut pairs = SnippetParser::parse(Rule::standalone, text).map_err(|e| describe(&e))?;
    let expr = pairs
        .next()
        .and_then(|p| p.into_inner().next())
        .ok_or("empty expression")?;
    build_expr(expr)
}

fn describe(error: &pest::error::Error<Rule>) -> String {
    let column = match error.line_col {
        pest::error::LineColLocation::Pos((_, col))
        | pest::error::LineColLocation::Span((_, col), _) => col,
    };
    format!("invalid syntax at column {column}")
}

fn build_statement(pair: Pair<Rule>) -> ParseResult<StmtKind> {
    match pair.as_rule() {
        Rule::import_stmt => {
            // `import a, b` is only meaningful with a single module here
            let mut items = pair.into_inner().filter(|p| p.as_rule() == Rule::import_item);
            let item = items.next().ok_or("expected module name")?;
            if items.next().is_some() {
                return Err("import one module per statement".to_string());
            }
            let mut inner = item.into_inner();
            let module = inner.next().ok_or("expected module name")?.as_str().to_string();
            let alias = inner
                .find(|p| p.as_rule() == Rule::identifier)
                .map(|p| p.as_str().to_string());
            Ok(StmtKind::Import { module, alias })
        }
        Rule::from_import_stmt => {
            let mut inner = pair.into_inner().filter(|p| {
                matches!(p.as_rule(), Rule::dotted_name | Rule::from_item)
            });
            let module = inner.next().ok_or("expected module name")?.as_str().to_string();
            let names = inner
                .map(|item| {
                    let mut parts = item.into_inner().filter(|p| p.as_rule() == Rule::identifier);
                    let name = parts.next().map(|p| p.as_str().to_string()).unwrap_or_default();
                    let alias = parts.next().map(|p| p.as_str().to_string());
                    (name, alias)
                })
                .collect();
            Ok(StmtKind::FromImport { module, names })
        }
        Rule::pass_stmt => Ok(StmtKind::Pass),
        Rule::assign_stmt => {
            let mut inner = pair.into_inner();
            let targets = inner
                .next()
                .ok_or("expected assignment target")?
                .into_inner()
                .map(|p| p.as_str().to_string())
                .collect();
            let value = build_expr_list(inner.next().ok_or("expected value")?)?;
            Ok(StmtKind::Assign { targets, value })
        }
        Rule::aug_assign_stmt => {
            let mut inner = pair.into_inner();
            let target = inner.next().ok_or("expected target")?.as_str().to_string();
            let op = match inner.next().ok_or("expected operator")?.as_str() {
                "+=" => BinOp::Add,
                "-=" => BinOp::Sub,
                "*=" => BinOp::Mul,
                "/=" => BinOp::Div,
                "//=" => BinOp::FloorDiv,
                "%=" => BinOp::Mod,
                _ => BinOp::Pow,
            };
            let value = build_expr(inner.next().ok_or("expected value")?)?;
            Ok(StmtKind::AugAssign { target, op, value })
        }
        Rule::expr_stmt => {
            let list = pair.into_inner().next().ok_or("expected expression")?;
            Ok(StmtKind::Expr(build_expr_list(list)?))
        }
        rule => Err(format!("unexpected {rule:?}")),
    }
}

/// `a, b` builds a tuple; a single expression without a trailing comma is itself
fn build_expr_list(pair: Pair<Rule>) -> ParseResult<Expr> {
    let mut items = Vec::new();
    let mut trailing = false;
    for p in pair.into_inner() {
        if p.as_rule() == Rule::trailing_comma {
            trailing = true;
        } else {
            items.push(build_expr(p)?);
        }
    }
    if items.len() == 1 && !trailing {
        return items.pop().ok_or_else(|| "expected expression".to_string());
    }
    Ok(Expr::Tuple(items))
}

fn build_expr(pair: Pair<Rule>) -> ParseResult<Expr> {
    match pair.as_rule() {
        Rule::arith => build_arith(pair.into_inner()),
        Rule::lambda_expr => {
            let mut params: Vec<String> = Vec::new();
            let mut body = None;
            for p in pair.into_inner() {
                match p.as_rule() {
                    Rule::kw_lambda => {}
                    Rule::param_list => {
                        params = p.into_inner().map(|i| i.as_str().to_string()).collect();
                    }
                    _ => body = Some(build_expr(p)?),
                }
            }
            Ok(Expr::Lambda {
                params: params.into(),
                body: Rc::new(body.ok_or("lambda needs a body")?),
            })
        }
        _ => build_primary(pair),
    }
}

fn build_arith(pairs: Pairs<Rule>) -> ParseResult<Expr> {
    PRATT
        .map_primary(build_primary)
        .map_prefix(|op, rhs| {
            let op = if op.as_rule() == Rule::neg {
                UnaryOp::Neg
            } else {
                UnaryOp::Pos
            };
            Ok(Expr::Unary {
                op,
                operand: Box::new(rhs?),
            })
        })
        .map_postfix(|lhs, op| build_postfix(lhs?, op))
        .map_infix(|lhs, op, rhs| {
            let (lhs, rhs) = (Box::new(lhs?), Box::new(rhs?));
            if let Some(op) = binary_op(op.as_rule()) {
                Ok(Expr::Binary { op, lhs, rhs })
            } else if let Some(op) = compare_op(op.as_rule()) {
                Ok(Expr::Compare { op, lhs, rhs })
            } else {
                Err(format!("unexpected operator '{}'", op.as_str()))
            }
        })
        .parse(pairs)
}

fn binary_op(rule: Rule) -> Option<BinOp> {
    Some(match rule {
        Rule::add => BinOp::Add,
        Rule::sub => BinOp::Sub,
        Rule::mul => BinOp::Mul,
        Rule::div => BinOp::Div,
        Rule::floordiv => BinOp::FloorDiv,
        Rule::modulo => BinOp::Mod,
        Rule::pow => BinOp::Pow,
        _ => return None,
    })
}

fn compare_op(rule: Rule) -> Option<CmpOp> {
    Some(match rule {
        Rule::lt => CmpOp::Lt,
        Rule::le => CmpOp::Le,
        Rule::gt => CmpOp::Gt,
        Rule::ge => CmpOp::Ge,
        Rule::eq => CmpOp::Eq,
        Rule::ne => CmpOp::Ne,
        _ => return None,
    })
}

fn build_postfix(lhs: Expr, op: Pair<Rule>) -> ParseResult<Expr> {
    match op.as_rule() {
        Rule::attribute => {
            let name = op.into_inner().next().ok_or("expected attribute name")?;
            Ok(Expr::Attribute {
                value: Box::new(lhs),
                name: name.as_str().to_string(),
            })
        }
        Rule::call => {
            let mut args = Vec::new();
            let mut kwargs = Vec::new();
            for arg in op.into_inner() {
                if arg.as_rule() == Rule::kwarg {
                    let mut inner = arg.into_inner();
                    let name = inner.next().ok_or("expected keyword")?.as_str().to_string();
                    let value = build_expr(inner.next().ok_or("expected keyword value")?)?;
                    if kwargs.iter().any(|(existing, _)| *existing == name) {
                        return Err(format!("keyword argument repeated: {name}"));
                    }
                    kwargs.push((name, value));
                } else if !kwargs.is_empty() {
                    return Err("positional argument follows keyword argument".to_string());
                } else {
                    args.push(build_expr(arg)?);
                }
            }
            Ok(Expr::Call {
                func: Box::new(lhs),
                args,
                kwargs,
            })
        }
        Rule::subscript => {
            let inner = op.into_inner().next().ok_or("expected index")?;
            let index = if inner.as_rule() == Rule::slice {
                let mut parts = inner
                    .into_inner()
                    .map(|part| part.into_inner().next().map(build_expr).transpose());
                let start = parts.next().transpose()?.flatten();
                let stop = parts.next().transpose()?.flatten();
                let step = parts.next().transpose()?.flatten();
                Subscript::Slice { start, stop, step }
            } else {
                Subscript::Index(build_expr(inner)?)
            };
            Ok(Expr::Subscript {
                value: Box::new(lhs),
                index: Box::new(index),
            })
        }
        rule => Err(format!("unexpected {rule:?}")),
    }
}

fn build_primary(pair: Pair<Rule>) -> ParseResult<Expr> {
    match pair.as_rule() {
        Rule::number => {
            let digits = pair.as_str().replace('_', "");
            digits
                .parse::<f64>()
                .map(Expr::Number)
                .map_err(|_| format!("invalid number literal '{}'", pair.as_str()))
        }
        Rule::string => build_string(pair),
        Rule::true_lit => Ok(Expr::Bool(true)),
        Rule::false_lit => Ok(Expr::Bool(false)),
        Rule::none_lit => Ok(Expr::None),
        Rule::identifier => Ok(Expr::Name(pair.as_str().to_string())),
        Rule::list => Ok(Expr::List(
            pair.into_inner().map(build_expr).collect::<ParseResult<_>>()?,
        )),
        Rule::list_comp => {
            let mut inner = pair.into_inner().filter(|p| p.as_rule() != Rule::kw_for && p.as_rule() != Rule::kw_in);
            let element = build_expr(inner.next().ok_or("expected element")?)?;
            let var = inner.next().ok_or("expected loop variable")?.as_str().to_string();
            let iter = build_expr(inner.next().ok_or("expected iterable")?)?;
            Ok(Expr::ListComp {
                element: Box::new(element),
                var,
                iter: Box::new(iter),
            })
        }
        Rule::paren => {
            let mut items = Vec::new();
            let mut trailing = false;
            for p in pair.into_inner() {
                if p.as_rule() == Rule::trailing_comma {
                    trailing = true;
                } else {
                    items.push(build_expr(p)?);
                }
            }
            if items.len() == 1 && !trailing {
                items.pop().ok_or_else(|| "expected expression".to_string())
            } else {
                Ok(Expr::Tuple(items))
            }
        }
        Rule::arith | Rule::lambda_expr => build_expr(pair),
        rule => Err(format!("unexpected {rule:?}")),
    }
}

fn build_string(pair: Pair<Rule>) -> ParseResult<Expr> {
    let mut prefix = String::new();
    let mut body = "";
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::string_prefix => prefix = p.as_str().to_ascii_lowercase(),
            _ => body = p.as_str(),
        }
    }
    let raw = prefix.contains('r');
    let text = if raw {
        body.to_string()
    } else {
        unescape(body)
    };
    if prefix.contains('f') {
        Ok(Expr::FormatStr(parse_format_string(&text)?))
    } else {
        Ok(Expr::Str(text))
    }
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Split f-string text into literal runs and `{expr[:spec]}` fields
fn parse_format_string(text: &str) -> ParseResult<Vec<FormatPart>> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '}' => return Err("f-string: single '}' is not allowed".to_string()),
            '{' => {
                let mut field = String::new();
                let mut depth = 0usize;
                let mut closed = false;
                for f in chars.by_ref() {
                    match f {
                        '(' | '[' | '{' => depth += 1,
                        ')' | ']' => depth = depth.saturating_sub(1),
                        '}' if depth == 0 => {
                            closed = true;
                            break;
                        }
                        '}' => depth -= 1,
                        _ => {}
                    }
                    field.push(f);
                }
                if !closed {
                    return Err("f-string: expecting '}'".to_string());
                }
                let (expr_text, spec) = split_format_spec(&field);
                if expr_text.trim().is_empty() {
                    return Err("f-string: empty expression not allowed".to_string());
                }
                if !literal.is_empty() {
                    parts.push(FormatPart::Literal(std::mem::take(&mut literal)));
                }
                parts.push(FormatPart::Field {
                    expr: parse_standalone_expr(expr_text.trim())?,
                    spec,
                });
            }
            _ => literal.push(c),
        }
    }
    if !literal.is_empty() {
        parts.push(FormatPart::Literal(literal));
    }
    Ok(parts)
}

/// Split `expr:spec` on the first top-level colon
fn split_format_spec(field: &str) -> (&str, String) {
    let mut depth = 0usize;
    for (i, c) in field.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => {
                let (expr, spec) = field.split_at(i);
                return (expr, spec.chars().skip(1).collect());
            }
            _ => {}
        }
    }
    (field, String::new())
}

// src/eval/template.rs

use super::parser::{self, BinaryOp, Expr};
use super::{EvalError, Evaluator, ExecutionContext, Runtime, Value, helpers};

const ORB_OPEN: &str = "@{";

/// A piece of a template: literal text or an `@{ ... }` block.
#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Literal(&'a str),
    Orb(&'a str),
}

/// The stock evaluator: `@{ ... }` templates over a small expression language.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateEvaluator;

impl TemplateEvaluator {
    /// The stock evaluator.
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for TemplateEvaluator {
    fn render(
        &self,
        template: &str,
        context: &ExecutionContext,
        runtime: &mut Runtime<'_>,
    ) -> Result<Value, EvalError> {
        let segments = split_template(template)?;

        // A single block surrounded by whitespace keeps its type.
        let mut orbs = segments.iter().filter_map(|s| match s {
            Segment::Orb(code) => Some(*code),
            Segment::Literal(_) => None,
        });
        let only_whitespace_around = segments
            .iter()
            .all(|s| matches!(s, Segment::Orb(_)) || matches!(s, Segment::Literal(l) if l.trim().is_empty()));
        if let (Some(code), None, true) = (orbs.next(), orbs.next(), only_whitespace_around) {
            log::trace!("Rendering single-block template '{}'", code.trim());
            return self.evaluate(code, context, runtime);
        }

        let mut rendered = String::with_capacity(template.len());
        for segment in segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Orb(code) => {
                    let value = self.evaluate(code, context, runtime)?;
                    rendered.push_str(&value.to_string());
                }
            }
        }
        Ok(Value::Str(rendered))
    }

    fn evaluate(
        &self,
        expression: &str,
        context: &ExecutionContext,
        runtime: &mut Runtime<'_>,
    ) -> Result<Value, EvalError> {
        let expr = parser::parse(expression)?;
        eval_expr(&expr, context, runtime)
    }
}

/// Splits a template into literal text and `@{ ... }` blocks.
///
/// The closing brace of a block is found outside string literals, so
/// `@{ '}' }` is a single block.
fn split_template(template: &str) -> Result<Vec<Segment<'_>>, EvalError> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find(ORB_OPEN) {
        let (literal, tail) = rest.split_at(start);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        let body = tail.get(ORB_OPEN.len()..).unwrap_or_default();
        let end = find_closing_brace(body).ok_or_else(|| {
            EvalError::Syntax(format!("unclosed '@{{' block in template '{}'", template.trim()))
        })?;
        segments.push(Segment::Orb(body.get(..end).unwrap_or_default()));
        rest = body.get(end + 1..).unwrap_or_default();
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    Ok(segments)
}

fn find_closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn eval_expr(
    expr: &Expr,
    context: &ExecutionContext,
    runtime: &mut Runtime<'_>,
) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::List(items) => items
            .iter()
            .map(|item| eval_expr(item, context, runtime))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Expr::Ident(name) => context
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownIdentifier(name.clone())),
        Expr::Member(target, name) => match eval_expr(target, context, runtime)? {
            Value::Map(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
            other => Err(EvalError::Type(format!(
                "cannot read member '{}' of a {}",
                name,
                other.type_name()
            ))),
        },
        Expr::Index(target, index) => {
            let target = eval_expr(target, context, runtime)?;
            let index = eval_expr(index, context, runtime)?;
            index_value(target, index)
        }
        Expr::Call(name, args) => {
            let args = args
                .iter()
                .map(|arg| eval_expr(arg, context, runtime))
                .collect::<Result<Vec<_>, _>>()?;
            helpers::call(name, args, runtime)
        }
        Expr::Not(inner) => Ok(Value::Bool(!expect_bool(
            eval_expr(inner, context, runtime)?,
            "!",
        )?)),
        Expr::Negate(inner) => match eval_expr(inner, context, runtime)? {
            Value::Int(i) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| EvalError::Type("integer overflow in negation".to_string())),
            other => Err(EvalError::Type(format!("cannot negate a {}", other.type_name()))),
        },
        Expr::Binary(BinaryOp::Or, left, right) => {
            if expect_bool(eval_expr(left, context, runtime)?, "||")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(expect_bool(eval_expr(right, context, runtime)?, "||")?))
        }
        Expr::Binary(BinaryOp::And, left, right) => {
            if !expect_bool(eval_expr(left, context, runtime)?, "&&")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(expect_bool(eval_expr(right, context, runtime)?, "&&")?))
        }
        Expr::Binary(op, left, right) => {
            let left = eval_expr(left, context, runtime)?;
            let right = eval_expr(right, context, runtime)?;
            binary(*op, left, right)
        }
        Expr::Ternary(condition, then, otherwise) => {
            if expect_bool(eval_expr(condition, context, runtime)?, "?:")? {
                eval_expr(then, context, runtime)
            } else {
                eval_expr(otherwise, context, runtime)
            }
        }
        Expr::Sequence(statements) => {
            let mut last = Value::Null;
            for statement in statements {
                last = eval_expr(statement, context, runtime)?;
            }
            Ok(last)
        }
    }
}

fn expect_bool(value: Value, operator: &str) -> Result<bool, EvalError> {
    value.as_bool().ok_or_else(|| {
        EvalError::Type(format!(
            "operator '{}' expects a boolean, found a {}",
            operator,
            value.type_name()
        ))
    })
}

fn index_value(target: Value, index: Value) -> Result<Value, EvalError> {
    match (target, index) {
        (Value::List(items), Value::Int(i)) => usize::try_from(i)
            .ok()
            .and_then(|i| items.get(i).cloned())
            .ok_or_else(|| {
                EvalError::Type(format!("index {} out of bounds for a list of {}", i, items.len()))
            }),
        (Value::Map(map), Value::Str(key)) => Ok(map.get(&key).cloned().unwrap_or(Value::Null)),
        (target, index) => Err(EvalError::Type(format!(
            "cannot index a {} with a {}",
            target.type_name(),
            index.type_name()
        ))),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    use BinaryOp::*;

    let overflow = || EvalError::Type("integer overflow".to_string());
    match (op, left, right) {
        (Eq, l, r) => Ok(Value::Bool(l == r)),
        (Ne, l, r) => Ok(Value::Bool(l != r)),
        (Lt | Le | Gt | Ge, Value::Int(l), Value::Int(r)) => Ok(Value::Bool(compare(op, l.cmp(&r)))),
        (Lt | Le | Gt | Ge, Value::Str(l), Value::Str(r)) => Ok(Value::Bool(compare(op, l.cmp(&r)))),
        (Add, Value::Int(l), Value::Int(r)) => l.checked_add(r).map(Value::Int).ok_or_else(overflow),
        (Add, Value::List(mut l), Value::List(r)) => {
            l.extend(r);
            Ok(Value::List(l))
        }
        (Add, Value::List(mut l), r) => {
            l.push(r);
            Ok(Value::List(l))
        }
        (Add, l @ Value::Str(_), r) | (Add, l, r @ Value::Str(_)) => {
            Ok(Value::Str(format!("{}{}", l, r)))
        }
        (Sub, Value::Int(l), Value::Int(r)) => l.checked_sub(r).map(Value::Int).ok_or_else(overflow),
        (Mul, Value::Int(l), Value::Int(r)) => l.checked_mul(r).map(Value::Int).ok_or_else(overflow),
        (Div | Rem, Value::Int(_), Value::Int(0)) => {
            Err(EvalError::Type("division by zero".to_string()))
        }
        (Div, Value::Int(l), Value::Int(r)) => l.checked_div(r).map(Value::Int).ok_or_else(overflow),
        (Rem, Value::Int(l), Value::Int(r)) => l.checked_rem(r).map(Value::Int).ok_or_else(overflow),
        (op, l, r) => Err(EvalError::Type(format!(
            "unsupported operands for {:?}: {} and {}",
            op,
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn compare(op: BinaryOp, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        BinaryOp::Lt => ordering == Less,
        BinaryOp::Le => ordering != Greater,
        BinaryOp::Gt => ordering == Greater,
        BinaryOp::Ge => ordering != Less,
        _ => false,
    }
}

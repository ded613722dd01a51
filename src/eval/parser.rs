//! Tokenizer and recursive descent parser for rule expressions.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! program    := ["return"] ternary (";" ["return"] ternary)* [";"]
//! ternary    := or ["?" ternary ":" ternary]
//! or         := and ("||" and)*
//! and        := equality ("&&" equality)*
//! equality   := comparison (("==" | "!=") comparison)*
//! comparison := additive (("<" | "<=" | ">" | ">=") additive)*
//! additive   := term (("+" | "-") term)*
//! term       := unary (("*" | "/" | "%") unary)*
//! unary      := ("!" | "-") unary | postfix
//! postfix    := primary ("." ident ["(" args ")"] | "[" ternary "]")*
//! primary    := literal | "[" args "]" | ident ["(" args ")"] | "(" ternary ")"
//! ```

use super::{EvalError, Value};

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    /// A helper call; method syntax `x.f(y)` is desugared to `f(x, y)`.
    Call(String, Vec<Expr>),
    Not(Box<Expr>),
    Negate(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Statements separated by `;`; the value is the last one's.
    Sequence(Vec<Expr>),
}

/// Binary operators, from loosest to tightest binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Str(String),
    Ident(String),
    Op(&'static str),
}

const OPERATORS: &[&str] = &[
    "==", "!=", "<=", ">=", "&&", "||", "(", ")", "[", "]", ",", ".", "?", ":", "!", "<", ">",
    "+", "-", "*", "/", "%", ";",
];

/// Parses an expression into its syntax tree.
pub fn parse(source: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_program()?;
    if let Some(tok) = parser.peek() {
        return Err(EvalError::Syntax(format!(
            "unexpected {:?} at end of expression '{}'",
            tok,
            source.trim()
        )));
    }
    Ok(expr)
}

fn tokenize(source: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
        } else if ch == '\'' || ch == '"' {
            chars.next();
            let mut s = String::new();
            let mut closed = false;
            while let Some((_, c)) = chars.next() {
                match c {
                    c if c == ch => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some((_, 'n')) => s.push('\n'),
                        Some((_, 't')) => s.push('\t'),
                        Some((_, other)) => s.push(other),
                        None => break,
                    },
                    c => s.push(c),
                }
            }
            if !closed {
                return Err(EvalError::Syntax(format!(
                    "unterminated string literal starting at offset {}",
                    start
                )));
            }
            tokens.push(Token::Str(s));
        } else if ch.is_ascii_digit() {
            let mut digits = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if !c.is_ascii_digit() {
                    break;
                }
                digits.push(c);
                chars.next();
            }
            let n = digits
                .parse::<i64>()
                .map_err(|e| EvalError::Syntax(format!("invalid integer '{}': {}", digits, e)))?;
            tokens.push(Token::Int(n));
        } else if ch.is_alphabetic() || ch == '_' || ch == '$' {
            let mut ident = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if !(c.is_alphanumeric() || c == '_' || c == '$') {
                    break;
                }
                ident.push(c);
                chars.next();
            }
            tokens.push(Token::Ident(ident));
        } else {
            let rest = source.get(start..).unwrap_or_default();
            let op = OPERATORS
                .iter()
                .find(|op| rest.starts_with(**op))
                .ok_or_else(|| {
                    EvalError::Syntax(format!("unexpected character '{}' at offset {}", ch, start))
                })?;
            for _ in 0..op.len() {
                chars.next();
            }
            tokens.push(Token::Op(*op));
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, op: &str) -> Result<(), EvalError> {
        if self.eat(op) {
            Ok(())
        } else {
            Err(EvalError::Syntax(match self.peek() {
                Some(tok) => format!("expected '{}' but found {:?}", op, tok),
                None => format!("expected '{}' but the expression ended", op),
            }))
        }
    }

    fn parse_program(&mut self) -> Result<Expr, EvalError> {
        let mut statements = Vec::new();
        loop {
            if matches!(self.peek(), Some(Token::Ident(i)) if i == "return") {
                self.advance();
            }
            statements.push(self.parse_ternary()?);
            if !self.eat(";") || self.peek().is_none() {
                break;
            }
        }
        Ok(match statements.len() {
            1 => statements.remove(0),
            _ => Expr::Sequence(statements),
        })
    }

    fn parse_ternary(&mut self) -> Result<Expr, EvalError> {
        let condition = self.parse_binary(0)?;
        if self.eat("?") {
            let then = self.parse_ternary()?;
            self.expect(":")?;
            let otherwise = self.parse_ternary()?;
            return Ok(Expr::Ternary(
                Box::new(condition),
                Box::new(then),
                Box::new(otherwise),
            ));
        }
        Ok(condition)
    }

    /// Precedence climbing over the binary operator levels.
    fn parse_binary(&mut self, level: usize) -> Result<Expr, EvalError> {
        const LEVELS: &[&[(&str, BinaryOp)]] = &[
            &[("||", BinaryOp::Or)],
            &[("&&", BinaryOp::And)],
            &[("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)],
            &[
                ("<=", BinaryOp::Le),
                (">=", BinaryOp::Ge),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
        ];

        let Some(operators) = LEVELS.get(level) else {
            return self.parse_unary();
        };

        let mut left = self.parse_binary(level + 1)?;
        'outer: loop {
            for (symbol, op) in operators.iter() {
                if self.eat(symbol) {
                    let right = self.parse_binary(level + 1)?;
                    left = Expr::Binary(*op, Box::new(left), Box::new(right));
                    continue 'outer;
                }
            }
            break;
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        if self.eat("!") {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        if self.eat("-") {
            return Ok(Expr::Negate(Box::new(self.parse_unary()?)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(".") {
                let name = match self.advance() {
                    Some(Token::Ident(name)) => name,
                    other => {
                        return Err(EvalError::Syntax(format!(
                            "expected a member name after '.', found {:?}",
                            other
                        )));
                    }
                };
                if self.eat("(") {
                    let mut args = vec![expr];
                    args.extend(self.parse_args(")")?);
                    expr = Expr::Call(name, args);
                } else {
                    expr = Expr::Member(Box::new(expr), name);
                }
            } else if self.eat("[") {
                let index = self.parse_ternary()?;
                self.expect("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            Some(Token::Int(n)) => Ok(Expr::Literal(Value::Int(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::Ident(ident)) => {
                let keyword = match ident.as_str() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    "null" | "nil" => Some(Value::Null),
                    _ => None,
                };
                if let Some(value) = keyword {
                    Ok(Expr::Literal(value))
                } else if self.eat("(") {
                    Ok(Expr::Call(ident, self.parse_args(")")?))
                } else {
                    Ok(Expr::Ident(ident))
                }
            }
            Some(Token::Op("(")) => {
                let inner = self.parse_ternary()?;
                self.expect(")")?;
                Ok(inner)
            }
            Some(Token::Op("[")) => Ok(Expr::List(self.parse_args("]")?)),
            Some(tok) => Err(EvalError::Syntax(format!("unexpected {:?}", tok))),
            None => Err(EvalError::Syntax("unexpected end of expression".to_string())),
        }
    }

    /// Parses a comma separated list up to and including `close`.
    fn parse_args(&mut self, close: &str) -> Result<Vec<Expr>, EvalError> {
        let mut args = Vec::new();
        if self.eat(close) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_ternary()?);
            if self.eat(close) {
                return Ok(args);
            }
            self.expect(",")?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.to_string()))
    }

    #[test]
    fn precedence_of_and_over_or() {
        let expr = parse("a || b && c").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Or,
                ident("a"),
                Box::new(Expr::Binary(BinaryOp::And, ident("b"), ident("c")))
            )
        );
    }

    #[test]
    fn method_calls_desugar_to_helpers() {
        let expr = parse("name.isEmpty()").unwrap();
        assert_eq!(
            expr,
            Expr::Call("isEmpty".into(), vec![Expr::Ident("name".into())])
        );
    }

    #[test]
    fn return_and_trailing_semicolon_are_accepted() {
        assert_eq!(
            parse("return value == 0;").unwrap(),
            Expr::Binary(
                BinaryOp::Eq,
                ident("value"),
                Box::new(Expr::Literal(Value::Int(0)))
            )
        );
    }

    #[test]
    fn member_index_and_lists() {
        let expr = parse("[parameters.shell, m['k']]").unwrap();
        assert_eq!(
            expr,
            Expr::List(vec![
                Expr::Member(ident("parameters"), "shell".into()),
                Expr::Index(ident("m"), Box::new(Expr::Literal(Value::from("k")))),
            ])
        );
    }

    #[test]
    fn ternary_nests_to_the_right() {
        let expr = parse("a ? 'x' : b ? 'y' : 'z'").unwrap();
        assert!(matches!(expr, Expr::Ternary(_, _, ref otherwise) if matches!(**otherwise, Expr::Ternary(..))));
    }

    #[test]
    fn syntax_errors_are_reported() {
        assert!(matches!(parse("(a"), Err(EvalError::Syntax(_))));
        assert!(matches!(parse("'open"), Err(EvalError::Syntax(_))));
        assert!(matches!(parse("a #"), Err(EvalError::Syntax(_))));
        assert!(matches!(parse("a b"), Err(EvalError::Syntax(_))));
    }
}

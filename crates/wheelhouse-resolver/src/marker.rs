//! Environment-marker expression parsing and evaluation.
//!
//! Markers are boolean combinations of atomic comparisons between
//! environment variables (`python_version`, `sys_platform`,
//! `platform_machine`, `implementation_name`, `extra`) and literal
//! strings. `and` binds tighter than `or`; parentheses group; unary
//! `not` negates. An atom
//! referencing a variable the target environment does not know evaluates
//! to false rather than failing, so a marker written for some exotic
//! interpreter simply filters the entry out.
//!
//! Parsed expressions are immutable syntax trees evaluated by a pure
//! recursive interpreter; precedence and parenthesization matter, so this
//! is a real recursive-descent parser, not a regex.

use wheelhouse_core::TargetEnvironment;
use wheelhouse_util::errors::{WheelhouseError, WheelhouseResult};

use crate::version::{Version, VersionReq};

/// A parsed marker expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerExpr {
    Comparison {
        lhs: Operand,
        op: CompareOp,
        rhs: Operand,
    },
    And(Box<MarkerExpr>, Box<MarkerExpr>),
    Or(Box<MarkerExpr>, Box<MarkerExpr>),
    Not(Box<MarkerExpr>),
}

/// One side of an atomic comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Variable(String),
    Literal(String),
}

/// The comparison operator of an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Compatible,
    In,
    NotIn,
}

impl MarkerExpr {
    /// Parse a marker expression string.
    pub fn parse(expr: &str) -> WheelhouseResult<Self> {
        let tokens = tokenize(expr)?;
        let mut parser = Parser {
            expr,
            tokens,
            pos: 0,
        };
        let parsed = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.malformed());
        }
        Ok(parsed)
    }

    /// Evaluate against a target environment.
    pub fn eval(&self, env: &TargetEnvironment) -> bool {
        match self {
            Self::And(a, b) => a.eval(env) && b.eval(env),
            Self::Or(a, b) => a.eval(env) || b.eval(env),
            Self::Not(inner) => !inner.eval(env),
            Self::Comparison { lhs, op, rhs } => eval_comparison(lhs, *op, rhs, env),
        }
    }
}

/// Parse and evaluate in one step.
pub fn eval_marker(expr: &str, env: &TargetEnvironment) -> WheelhouseResult<bool> {
    Ok(MarkerExpr::parse(expr)?.eval(env))
}

fn eval_comparison(lhs: &Operand, op: CompareOp, rhs: &Operand, env: &TargetEnvironment) -> bool {
    // Missing variables make the atom false, whatever the operator.
    let (Some(lhs_val), Some(rhs_val)) = (resolve(lhs, env), resolve(rhs, env)) else {
        return false;
    };

    match op {
        CompareOp::In => rhs_val.contains(lhs_val),
        CompareOp::NotIn => !rhs_val.contains(lhs_val),
        CompareOp::Compatible => {
            let Ok(version) = Version::parse(lhs_val) else {
                return false;
            };
            let Ok(req) = VersionReq::parse(&format!("~={rhs_val}")) else {
                return false;
            };
            req.matches(&version)
        }
        _ => {
            let versionish = is_version_operand(lhs, rhs);
            if versionish {
                if let (Ok(a), Ok(b)) = (Version::parse(lhs_val), Version::parse(rhs_val)) {
                    return ordering_holds(op, a.cmp(&b));
                }
            }
            ordering_holds(op, lhs_val.cmp(rhs_val))
        }
    }
}

fn is_version_operand(lhs: &Operand, rhs: &Operand) -> bool {
    [lhs, rhs].iter().any(|o| match o {
        Operand::Variable(v) => TargetEnvironment::is_version_variable(v),
        Operand::Literal(_) => false,
    })
}

fn ordering_holds(op: CompareOp, ord: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::{Equal, Greater, Less};
    match op {
        CompareOp::Eq => ord == Equal,
        CompareOp::Ne => ord != Equal,
        CompareOp::Lt => ord == Less,
        CompareOp::Le => ord != Greater,
        CompareOp::Gt => ord == Greater,
        CompareOp::Ge => ord != Less,
        CompareOp::Compatible | CompareOp::In | CompareOp::NotIn => unreachable!(),
    }
}

fn resolve<'a>(operand: &'a Operand, env: &'a TargetEnvironment) -> Option<&'a str> {
    match operand {
        Operand::Literal(s) => Some(s),
        Operand::Variable(v) => env.lookup(v),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Op(CompareOp),
    Not,
    In,
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> WheelhouseResult<Vec<Token>> {
    let malformed = |fragment: &str| WheelhouseError::MalformedConstraint {
        expr: expr.to_string(),
        fragment: fragment.to_string(),
    };

    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != quote {
                    end += 1;
                }
                if end == chars.len() {
                    let fragment: String = chars[i..].iter().collect();
                    return Err(malformed(&fragment));
                }
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            '=' | '!' | '<' | '>' | '~' => {
                let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
                let (op, len) = match two.as_str() {
                    "==" => (CompareOp::Eq, 2),
                    "!=" => (CompareOp::Ne, 2),
                    "<=" => (CompareOp::Le, 2),
                    ">=" => (CompareOp::Ge, 2),
                    "~=" => (CompareOp::Compatible, 2),
                    _ if c == '<' => (CompareOp::Lt, 1),
                    _ if c == '>' => (CompareOp::Gt, 1),
                    _ => return Err(malformed(&two)),
                };
                tokens.push(Token::Op(op));
                i += len;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "in" => Token::In,
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                });
            }
            _ => return Err(malformed(&c.to_string())),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    expr: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn malformed(&self) -> WheelhouseError {
        let fragment = match self.tokens.get(self.pos) {
            Some(Token::Ident(s)) | Some(Token::Str(s)) => s.clone(),
            Some(Token::And) => "and".to_string(),
            Some(Token::Or) => "or".to_string(),
            Some(Token::In) => "in".to_string(),
            Some(Token::Not) => "not".to_string(),
            Some(Token::LParen) => "(".to_string(),
            Some(Token::RParen) => ")".to_string(),
            Some(Token::Op(_)) => "<operator>".to_string(),
            None => "<end of expression>".to_string(),
        };
        WheelhouseError::MalformedConstraint {
            expr: self.expr.to_string(),
            fragment,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn parse_or(&mut self) -> WheelhouseResult<MarkerExpr> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = MarkerExpr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> WheelhouseResult<MarkerExpr> {
        let mut lhs = self.parse_atom()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.parse_atom()?;
            lhs = MarkerExpr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_atom(&mut self) -> WheelhouseResult<MarkerExpr> {
        // Unary negation; a `not` between operands is `not in` instead.
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let inner = self.parse_atom()?;
            return Ok(MarkerExpr::Not(Box::new(inner)));
        }
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.parse_or()?;
            if self.peek() != Some(&Token::RParen) {
                return Err(self.malformed());
            }
            self.pos += 1;
            return Ok(inner);
        }

        let lhs = self.parse_operand()?;
        let op = match self.peek() {
            Some(Token::Op(op)) => {
                let op = *op;
                self.pos += 1;
                op
            }
            Some(Token::In) => {
                self.pos += 1;
                CompareOp::In
            }
            Some(Token::Not) => {
                self.pos += 1;
                if self.peek() != Some(&Token::In) {
                    return Err(self.malformed());
                }
                self.pos += 1;
                CompareOp::NotIn
            }
            _ => return Err(self.malformed()),
        };
        let rhs = self.parse_operand()?;
        Ok(MarkerExpr::Comparison { lhs, op, rhs })
    }

    fn parse_operand(&mut self) -> WheelhouseResult<Operand> {
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(Operand::Variable(name))
            }
            Some(Token::Str(lit)) => {
                self.pos += 1;
                Ok(Operand::Literal(lit))
            }
            _ => Err(self.malformed()),
        }
    }
}

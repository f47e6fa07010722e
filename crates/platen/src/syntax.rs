// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Generic syntax trees for directive bodies.
//!
//! Directive text is parsed with a pest grammar (`expr.pest`) that covers a
//! conventional expression language: literals, names, operators, calls,
//! attribute access, subscripts and slices, displays, conditional
//! expressions, and assignment statements. The grammar is deliberately
//! wider than what the [`compiler`](crate::compiler) accepts: anything that
//! parses here but is not part of the compiled subset is rejected by name
//! instead of as an opaque parse failure.
//!
//! Parsing never evaluates anything.

use crate::value::Value;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use std::fmt;

/// Pest parser generated from `expr.pest`.
#[derive(Parser)]
#[grammar = "expr.pest"]
pub struct ExprParser;

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value.
    Constant(Value),
    /// A name reference.
    Name(String),
    /// `[a, b]`
    List(Vec<Expr>),
    /// `(a, b)` or `a, b`
    Tuple(Vec<Expr>),
    /// `{k: v}`
    Dict(Vec<(Expr, Expr)>),
    /// `value[index]`
    Subscript {
        /// The container.
        value: Box<Expr>,
        /// The index (an [`Expr::Slice`] for `a[x:y]`).
        index: Box<Expr>,
    },
    /// `lower:upper:step` inside a subscript.
    Slice {
        /// Lower bound.
        lower: Option<Box<Expr>>,
        /// Upper bound.
        upper: Option<Box<Expr>>,
        /// Step.
        step: Option<Box<Expr>>,
    },
    /// `value.attr`
    Attribute {
        /// The object.
        value: Box<Expr>,
        /// The attribute name.
        attr: String,
    },
    /// `func(args)`
    Call {
        /// The callee.
        func: Box<Expr>,
        /// Positional arguments.
        args: Vec<Expr>,
    },
    /// A binary operator other than comparisons and boolean operators.
    BinOp {
        /// The operator.
        op: BinOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// A unary operator.
    UnaryOp {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
    },
    /// `a and b and c` / `a or b or c`
    BoolOp {
        /// The operator.
        op: BoolOp,
        /// Two or more operands.
        values: Vec<Expr>,
    },
    /// `a < b <= c`
    Compare {
        /// The leftmost operand.
        left: Box<Expr>,
        /// One operator per comparator.
        ops: Vec<CmpOp>,
        /// The right-hand operands.
        comparators: Vec<Expr>,
    },
    /// `body if test else orelse`
    IfExp {
        /// The condition.
        test: Box<Expr>,
        /// Value when true.
        body: Box<Expr>,
        /// Value when false.
        orelse: Box<Expr>,
    },
}

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `t1 = t2 = value`
    Assign {
        /// Assignment targets, left to right.
        targets: Vec<Expr>,
        /// The assigned value.
        value: Expr,
    },
    /// `target op= value`
    AugAssign {
        /// The target.
        target: Expr,
        /// The operator text, e.g. `+=`.
        op: String,
        /// The value.
        value: Expr,
    },
    /// A bare expression.
    Expr(Expr),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `@`
    MatMul,
    /// `/`
    Div,
    /// `//`
    FloorDiv,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `<<`
    LShift,
    /// `>>`
    RShift,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&`
    BitAnd,
}

impl BinOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "@" => BinOp::MatMul,
            "/" => BinOp::Div,
            "//" => BinOp::FloorDiv,
            "%" => BinOp::Mod,
            "**" => BinOp::Pow,
            "<<" => BinOp::LShift,
            ">>" => BinOp::RShift,
            "|" => BinOp::BitOr,
            "^" => BinOp::BitXor,
            "&" => BinOp::BitAnd,
            _ => return None,
        })
    }

    /// The operator's source symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::MatMul => "@",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::BitAnd => "&",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `not`
    Not,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `~`
    Invert,
}

/// Boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    /// `and`
    And,
    /// `or`
    Or,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtE,
    /// `>`
    Gt,
    /// `>=`
    GtE,
    /// `in`
    In,
    /// `not in`
    NotIn,
    /// `is`
    Is,
    /// `is not`
    IsNot,
}

impl CmpOp {
    fn from_source(text: &str) -> Option<Self> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        Some(match normalized.as_str() {
            "==" => CmpOp::Eq,
            "!=" => CmpOp::NotEq,
            "<" => CmpOp::Lt,
            "<=" => CmpOp::LtE,
            ">" => CmpOp::Gt,
            ">=" => CmpOp::GtE,
            "in" => CmpOp::In,
            "not in" => CmpOp::NotIn,
            "is" => CmpOp::Is,
            "is not" => CmpOp::IsNot,
            _ => return None,
        })
    }

    /// The operator's source text.
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
        }
    }
}

/// A directive body that does not parse.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    /// What the parser expected.
    pub message: String,
    /// 1-indexed column inside the directive body.
    pub column: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid syntax at column {}: {}", self.column, self.message)
    }
}

impl std::error::Error for SyntaxError {}

impl From<pest::error::Error<Rule>> for SyntaxError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let column = match err.line_col {
            pest::error::LineColLocation::Pos((_, col)) => col,
            pest::error::LineColLocation::Span((_, col), _) => col,
        };
        SyntaxError {
            message: err.variant.message().to_string(),
            column,
        }
    }
}

type Built<T> = std::result::Result<T, SyntaxError>;

/// Parses an expression (or a bare comma-separated tuple).
pub fn parse_expression(source: &str) -> Built<Expr> {
    let root = single(ExprParser::parse(Rule::expression, source)?)?;
    let body = first_inner(root)?;
    build(body)
}

/// Parses an assignment, augmented assignment, or expression statement.
pub fn parse_statement(source: &str) -> Built<Stmt> {
    let root = single(ExprParser::parse(Rule::statement, source)?)?;
    let body = first_inner(root)?;
    match body.as_rule() {
        Rule::assign_stmt => {
            let mut parts: Vec<Expr> = body
                .into_inner()
                .filter(|p| p.as_rule() == Rule::expr_list)
                .map(build)
                .collect::<Built<_>>()?;
            let value = parts.pop().ok_or_else(|| malformed("assignment"))?;
            Ok(Stmt::Assign { targets: parts, value })
        }
        Rule::aug_assign_stmt => {
            let mut inner = body.into_inner();
            let target = build(next(&mut inner)?)?;
            let op = next(&mut inner)?.as_str().to_string();
            let value = build(next(&mut inner)?)?;
            Ok(Stmt::AugAssign { target, op, value })
        }
        _ => Ok(Stmt::Expr(build(body)?)),
    }
}

fn single(mut pairs: pest::iterators::Pairs<'_, Rule>) -> Built<Pair<'_, Rule>> {
    pairs.next().ok_or_else(|| malformed("empty parse"))
}

fn first_inner(pair: Pair<'_, Rule>) -> Built<Pair<'_, Rule>> {
    pair.into_inner().next().ok_or_else(|| malformed("empty directive"))
}

fn next<'i>(inner: &mut pest::iterators::Pairs<'i, Rule>) -> Built<Pair<'i, Rule>> {
    inner.next().ok_or_else(|| malformed("truncated parse tree"))
}

fn malformed(what: &str) -> SyntaxError {
    SyntaxError {
        message: format!("malformed {}", what),
        column: 1,
    }
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_if | Rule::kw_else | Rule::kw_and | Rule::kw_or | Rule::kw_not
    )
}

fn operands(pair: Pair<'_, Rule>) -> Built<Vec<Expr>> {
    pair.into_inner()
        .filter(|p| !is_keyword(p.as_rule()))
        .map(build)
        .collect()
}

fn build(pair: Pair<'_, Rule>) -> Built<Expr> {
    let column = pair.as_span().start() + 1;
    match pair.as_rule() {
        Rule::expr_list => {
            let mut items = Vec::new();
            let mut trailing = false;
            for p in pair.into_inner() {
                match p.as_rule() {
                    Rule::trailing_comma => trailing = true,
                    _ => items.push(build(p)?),
                }
            }
            if items.len() == 1 && !trailing {
                items.pop().ok_or_else(|| malformed("expression list"))
            } else {
                Ok(Expr::Tuple(items))
            }
        }
        Rule::expr => {
            let mut parts = operands(pair)?;
            match parts.len() {
                1 => parts.pop().ok_or_else(|| malformed("expression")),
                3 => {
                    let orelse = parts.pop().ok_or_else(|| malformed("conditional"))?;
                    let test = parts.pop().ok_or_else(|| malformed("conditional"))?;
                    let body = parts.pop().ok_or_else(|| malformed("conditional"))?;
                    Ok(Expr::IfExp {
                        test: Box::new(test),
                        body: Box::new(body),
                        orelse: Box::new(orelse),
                    })
                }
                _ => Err(malformed("conditional expression")),
            }
        }
        Rule::or_test | Rule::and_test => {
            let op = if pair.as_rule() == Rule::or_test { BoolOp::Or } else { BoolOp::And };
            let mut values = operands(pair)?;
            if values.len() == 1 {
                values.pop().ok_or_else(|| malformed("boolean operation"))
            } else {
                Ok(Expr::BoolOp { op, values })
            }
        }
        Rule::not_test => {
            let mut inner = pair.into_inner();
            let first = next(&mut inner)?;
            if first.as_rule() == Rule::kw_not {
                let operand = build(next(&mut inner)?)?;
                Ok(Expr::UnaryOp {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            } else {
                build(first)
            }
        }
        Rule::comparison => {
            let mut inner = pair.into_inner();
            let left = build(next(&mut inner)?)?;
            let mut ops = Vec::new();
            let mut comparators = Vec::new();
            while let Some(op) = inner.next() {
                let cmp = CmpOp::from_source(op.as_str()).ok_or_else(|| SyntaxError {
                    message: format!("unknown comparison operator `{}`", op.as_str()),
                    column: op.as_span().start() + 1,
                })?;
                ops.push(cmp);
                comparators.push(build(next(&mut inner)?)?);
            }
            if ops.is_empty() {
                Ok(left)
            } else {
                Ok(Expr::Compare {
                    left: Box::new(left),
                    ops,
                    comparators,
                })
            }
        }
        Rule::bit_or | Rule::bit_xor | Rule::bit_and | Rule::shift | Rule::arith | Rule::term => {
            let mut inner = pair.into_inner();
            let mut left = build(next(&mut inner)?)?;
            while let Some(op) = inner.next() {
                let op = BinOp::from_symbol(op.as_str()).ok_or_else(|| SyntaxError {
                    message: format!("unknown operator `{}`", op.as_str()),
                    column: op.as_span().start() + 1,
                })?;
                let right = build(next(&mut inner)?)?;
                left = Expr::BinOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                };
            }
            Ok(left)
        }
        Rule::factor => {
            let mut inner = pair.into_inner();
            let first = next(&mut inner)?;
            if first.as_rule() == Rule::unary_op {
                let operand = next(&mut inner)?;
                // `-9223372036854775808` only fits once the sign is applied.
                if first.as_str() == "-" && is_integer_literal(operand.as_str()) {
                    let text = format!("-{}", operand.as_str());
                    return parse_integer(&text, column).map(Expr::Constant);
                }
                let op = match first.as_str() {
                    "-" => UnaryOp::Minus,
                    "+" => UnaryOp::Plus,
                    _ => UnaryOp::Invert,
                };
                let operand = build(operand)?;
                Ok(Expr::UnaryOp {
                    op,
                    operand: Box::new(operand),
                })
            } else {
                build(first)
            }
        }
        Rule::power => {
            let mut inner = pair.into_inner();
            let base = build(next(&mut inner)?)?;
            match inner.next() {
                Some(_) => {
                    let exponent = build(next(&mut inner)?)?;
                    Ok(Expr::BinOp {
                        op: BinOp::Pow,
                        left: Box::new(base),
                        right: Box::new(exponent),
                    })
                }
                None => Ok(base),
            }
        }
        Rule::primary => {
            let mut inner = pair.into_inner();
            let mut value = build(next(&mut inner)?)?;
            for trailer in inner {
                value = apply_trailer(value, trailer)?;
            }
            Ok(value)
        }
        Rule::paren => match pair.into_inner().next() {
            Some(list) => build(list),
            None => Ok(Expr::Tuple(Vec::new())),
        },
        Rule::list_display => Ok(Expr::List(
            pair.into_inner().map(build).collect::<Built<_>>()?,
        )),
        Rule::dict_display => {
            let mut entries = Vec::new();
            for entry in pair.into_inner() {
                let mut kv = entry.into_inner();
                let key = build(next(&mut kv)?)?;
                let value = build(next(&mut kv)?)?;
                entries.push((key, value));
            }
            Ok(Expr::Dict(entries))
        }
        Rule::integer => parse_integer(pair.as_str(), column).map(Expr::Constant),
        Rule::float => pair
            .as_str()
            .parse::<f64>()
            .map(|f| Expr::Constant(Value::Float(f)))
            .map_err(|e| SyntaxError {
                message: format!("invalid float literal: {}", e),
                column,
            }),
        Rule::string => Ok(Expr::Constant(Value::Str(unescape(pair.as_str())))),
        Rule::kw_true => Ok(Expr::Constant(Value::Bool(true))),
        Rule::kw_false => Ok(Expr::Constant(Value::Bool(false))),
        Rule::kw_none => Ok(Expr::Constant(Value::None)),
        Rule::identifier => Ok(Expr::Name(pair.as_str().to_string())),
        other => Err(SyntaxError {
            message: format!("unexpected {:?}", other),
            column,
        }),
    }
}

fn apply_trailer(value: Expr, trailer: Pair<'_, Rule>) -> Built<Expr> {
    match trailer.as_rule() {
        Rule::call => Ok(Expr::Call {
            func: Box::new(value),
            args: trailer.into_inner().map(build).collect::<Built<_>>()?,
        }),
        Rule::attribute => {
            let attr = first_inner(trailer)?.as_str().to_string();
            Ok(Expr::Attribute {
                value: Box::new(value),
                attr,
            })
        }
        Rule::subscript => {
            let index = first_inner(trailer)?;
            let index = if index.as_rule() == Rule::slice {
                build_slice(index)?
            } else {
                build(index)?
            };
            Ok(Expr::Subscript {
                value: Box::new(value),
                index: Box::new(index),
            })
        }
        other => Err(SyntaxError {
            message: format!("unexpected trailer {:?}", other),
            column: trailer.as_span().start() + 1,
        }),
    }
}

fn build_slice(pair: Pair<'_, Rule>) -> Built<Expr> {
    let mut lower = None;
    let mut upper = None;
    let mut step = None;
    for part in pair.into_inner() {
        let rule = part.as_rule();
        let expr = Some(Box::new(build(first_inner(part)?)?));
        match rule {
            Rule::lower => lower = expr,
            Rule::upper => upper = expr,
            _ => step = expr,
        }
    }
    Ok(Expr::Slice { lower, upper, step })
}

fn is_integer_literal(text: &str) -> bool {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()),
        None => !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()),
    }
}

fn parse_integer(text: &str, column: usize) -> Built<Value> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) if negative => i64::from_str_radix(&format!("-{}", hex), 16),
        Some(hex) => i64::from_str_radix(hex, 16),
        None => text.parse::<i64>(),
    };
    parsed.map(Value::Int).map_err(|_| SyntaxError {
        message: format!("integer literal `{}` does not fit in 64 bits", text),
        column,
    })
}

/// Strips the quotes from a string literal and resolves escapes.
///
/// Unknown escapes keep their backslash.
fn unescape(literal: &str) -> String {
    let body = &literal[1..literal.len() - 1];
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
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('x') => push_code_point(&mut out, &mut chars, 2, 'x'),
            Some('u') => push_code_point(&mut out, &mut chars, 4, 'u'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn push_code_point(out: &mut String, chars: &mut std::str::Chars<'_>, digits: usize, marker: char) {
    let hex: String = chars.clone().take(digits).collect();
    let decoded = if hex.len() == digits {
        u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
    } else {
        None
    };
    match decoded {
        Some(c) => {
            out.push(c);
            for _ in 0..digits {
                chars.next();
            }
        }
        None => {
            out.push('\\');
            out.push(marker);
        }
    }
}

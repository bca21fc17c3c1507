use lazy_static::lazy_static;
use pest::Parser;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_derive::Parser;

use crate::ast::{BinaryOp, Class, Expr, FieldDecl, MethodDecl, Stmt, UnaryOp};
use crate::parser::{ParseError, ParseErrorKind, Span};

lazy_static! {
    // Note: precedence is defined lowest to highest.
    static ref PRATT_PARSER: PrattParser<Rule> = PrattParser::new()
        // (lowest precedence)
        .op(Op::infix(Rule::assign, Assoc::Right))       // `=`
        .op(Op::infix(Rule::or, Assoc::Left))            // `||`
        .op(Op::infix(Rule::and, Assoc::Left))           // `&&`
        .op(
            Op::infix(Rule::eq, Assoc::Left) |
            Op::infix(Rule::ne, Assoc::Left)
        )                                                // `==`, `!=`
        .op(
            Op::infix(Rule::lt, Assoc::Left) |
            Op::infix(Rule::le, Assoc::Left) |
            Op::infix(Rule::gt, Assoc::Left) |
            Op::infix(Rule::ge, Assoc::Left)
        )                                                // `<`, `<=`, `>`, `>=`
        .op(
            Op::infix(Rule::add, Assoc::Left) |
            Op::infix(Rule::sub, Assoc::Left)
        )                                                // `+`, `-`
        .op(
            Op::infix(Rule::mul, Assoc::Left) |
            Op::infix(Rule::div, Assoc::Left) |
            Op::infix(Rule::rem, Assoc::Left)
        )                                                // `*`, `/`, `%`
        .op(
            Op::prefix(Rule::neg) |
            Op::prefix(Rule::plus) |
            Op::prefix(Rule::not)
        )                                                // `-`, `+`, `!`
        // (highest precedence)
        ;
}

#[derive(Parser)]
#[grammar = "parser/duck.pest"]
pub struct DuckParser;

/// Magnitude of `i32::MIN`, only valid as the operand of a unary minus.
const MIN_MAGNITUDE: &str = "2147483648";

/// Parses a compilation unit into its classes.
pub fn parse(source: &str) -> Result<Vec<Class>, ParseError> {
    let mut pairs = DuckParser::parse(Rule::program, source)?;
    let Some(program) = pairs.next() else {
        return Ok(Vec::new());
    };
    program
        .into_inner()
        .filter(|pair| pair.as_rule() == Rule::class_decl)
        .map(parse_class)
        .collect()
}

/// Parses a single expression, such as `a + b * 2`.
pub fn parse_expr(source: &str) -> Result<Expr, ParseError> {
    let mut pairs = DuckParser::parse(Rule::expr_main, source)?;
    let main = pairs
        .next()
        .ok_or_else(|| missing("expression", Span::new(0, source.len())))?;
    let span = main.as_span();
    let expr = main
        .into_inner()
        .find(|pair| pair.as_rule() == Rule::expression)
        .ok_or_else(|| missing("expression", span))?;
    parse_expression(expr)
}

fn missing(what: &str, span: impl Into<Span>) -> ParseError {
    ParseError::new(
        ParseErrorKind::Syntax {
            message: format!("expected {}", what),
        },
        span,
    )
}

fn next_pair<'i>(
    pairs: &mut Pairs<'i, Rule>,
    what: &str,
    span: pest::Span<'i>,
) -> Result<Pair<'i, Rule>, ParseError> {
    pairs.next().ok_or_else(|| missing(what, span))
}

fn parse_class(pair: Pair<Rule>) -> Result<Class, ParseError> {
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let name = next_pair(&mut inner, "class name", span)?.as_str().to_string();

    let mut fields = Vec::new();
    let mut methods = Vec::new();
    for member in inner {
        match member.as_rule() {
            Rule::field_decl => {
                for var in member.into_inner() {
                    fields.push(parse_field(var)?);
                }
            }
            Rule::method_decl => methods.push(parse_method(member)?),
            rule => unreachable!("unexpected class member: {:?}", rule),
        }
    }

    Ok(Class {
        name,
        fields,
        methods,
    })
}

fn parse_field(pair: Pair<Rule>) -> Result<FieldDecl, ParseError> {
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let name = next_pair(&mut inner, "field name", span)?.as_str().to_string();
    let value = inner.next().map(parse_field_value).transpose()?;
    Ok(FieldDecl { name, value })
}

/// Field initializers are plain integer literals, optionally negated.
fn parse_field_value(pair: Pair<Rule>) -> Result<i32, ParseError> {
    let span = pair.as_span();
    let mut negative = false;
    let mut digits = None;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::minus => negative = true,
            Rule::integer => digits = Some(part),
            rule => unreachable!("unexpected field value part: {:?}", rule),
        }
    }
    let digits = digits.ok_or_else(|| missing("integer literal", span))?;
    let out_of_range = || {
        ParseError::new(
            ParseErrorKind::LiteralOutOfRange {
                text: span.as_str().to_string(),
            },
            span,
        )
    };
    let magnitude: i64 = digits.as_str().parse().map_err(|_| out_of_range())?;
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).map_err(|_| out_of_range())
}

fn parse_method(pair: Pair<Rule>) -> Result<MethodDecl, ParseError> {
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let name = next_pair(&mut inner, "method name", span)?.as_str().to_string();

    let mut params = Vec::new();
    let mut body = Vec::new();
    for part in inner {
        match part.as_rule() {
            Rule::params => {
                params = part.into_inner().map(|p| p.as_str().to_string()).collect();
            }
            Rule::block => body = parse_block(part)?,
            rule => unreachable!("unexpected method part: {:?}", rule),
        }
    }

    Ok(MethodDecl { name, params, body })
}

fn parse_block(pair: Pair<Rule>) -> Result<Vec<Stmt>, ParseError> {
    let mut stmts = Vec::new();
    for stmt in pair.into_inner() {
        stmts.extend(parse_statement(stmt)?);
    }
    Ok(stmts)
}

/// A single source statement can declare several locals at once, and an
/// empty statement produces nothing.
fn parse_statement(pair: Pair<Rule>) -> Result<Vec<Stmt>, ParseError> {
    let span = pair.as_span();
    match pair.as_rule() {
        Rule::block => Ok(vec![Stmt::Block(parse_block(pair)?)]),
        Rule::empty_stmt => Ok(Vec::new()),
        Rule::local_decl => pair.into_inner().map(parse_local_var).collect(),
        Rule::return_stmt => {
            let mut inner = pair.into_inner();
            let expr = parse_expression(next_pair(&mut inner, "return value", span)?)?;
            Ok(vec![Stmt::Return(expr)])
        }
        Rule::if_stmt => {
            let mut inner = pair.into_inner();
            let cond = parse_expression(next_pair(&mut inner, "condition", span)?)?;
            let then_branch = parse_branch(next_pair(&mut inner, "statement", span)?)?;
            let else_branch = inner.next().map(parse_branch).transpose()?;
            Ok(vec![Stmt::if_else(cond, then_branch, else_branch)])
        }
        Rule::while_stmt => {
            let mut inner = pair.into_inner();
            let cond = parse_expression(next_pair(&mut inner, "condition", span)?)?;
            let body = parse_branch(next_pair(&mut inner, "statement", span)?)?;
            Ok(vec![Stmt::while_loop(cond, body)])
        }
        Rule::expr_stmt => {
            let mut inner = pair.into_inner();
            let expr = parse_expression(next_pair(&mut inner, "expression", span)?)?;
            match expr {
                Expr::Assign { .. } | Expr::Call { .. } | Expr::Unsupported(_) => {
                    Ok(vec![Stmt::Expr(expr)])
                }
                _ => Err(ParseError::new(ParseErrorKind::NotAStatement, span)),
            }
        }
        rule => unreachable!("unexpected statement: {:?}", rule),
    }
}

/// The body of an `if` or `while` is one statement.
fn parse_branch(pair: Pair<Rule>) -> Result<Stmt, ParseError> {
    let mut stmts = parse_statement(pair)?;
    if stmts.len() == 1 {
        if let Some(stmt) = stmts.pop() {
            return Ok(stmt);
        }
    }
    Ok(Stmt::Block(stmts))
}

fn parse_local_var(pair: Pair<Rule>) -> Result<Stmt, ParseError> {
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let name = next_pair(&mut inner, "variable name", span)?.as_str();
    let init = inner.next().map(parse_expression).transpose()?;
    Ok(Stmt::local(name, init))
}

fn parse_expression(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    PRATT_PARSER
        .map_primary(parse_primary)
        .map_prefix(|op, rhs| match op.as_rule() {
            // Negative literals fold here, which is also the only place the
            // magnitude of `i32::MIN` is accepted.
            Rule::neg => match rhs {
                Ok(Expr::Literal(value)) => Ok(Expr::Literal(value.wrapping_neg())),
                Err(ParseError {
                    kind: ParseErrorKind::LiteralOutOfRange { text },
                    ..
                }) if text == MIN_MAGNITUDE => Ok(Expr::Literal(i32::MIN)),
                rhs => Ok(Expr::neg(rhs?)),
            },
            Rule::plus => Ok(Expr::unary(UnaryOp::Plus, rhs?)),
            Rule::not => Ok(Expr::unary(UnaryOp::Not, rhs?)),
            rule => unreachable!("Expr::parse expected prefix operation, found {:?}", rule),
        })
        .map_infix(|lhs, op, rhs| {
            let lhs = lhs?;
            let rhs = rhs?;
            let op = match op.as_rule() {
                Rule::assign => {
                    return match lhs {
                        Expr::Var(name) => Ok(Expr::assign(&name, rhs)),
                        Expr::FieldAccess(name) => {
                            Ok(Expr::Unsupported(format!("assignment to field `{}`", name)))
                        }
                        _ => Err(ParseError::new(
                            ParseErrorKind::InvalidAssignmentTarget,
                            op.as_span(),
                        )),
                    };
                }
                Rule::or => BinaryOp::Or,
                Rule::and => BinaryOp::And,
                Rule::eq => BinaryOp::Eq,
                Rule::ne => BinaryOp::Ne,
                Rule::lt => BinaryOp::Lt,
                Rule::le => BinaryOp::Le,
                Rule::gt => BinaryOp::Gt,
                Rule::ge => BinaryOp::Ge,
                Rule::add => BinaryOp::Add,
                Rule::sub => BinaryOp::Sub,
                Rule::mul => BinaryOp::Mul,
                Rule::div => BinaryOp::Div,
                Rule::rem => BinaryOp::Rem,
                rule => unreachable!("Expr::parse expected infix operation, found {:?}", rule),
            };
            Ok(Expr::binary(op, lhs, rhs))
        })
        .parse(pair.into_inner())
}

fn parse_primary(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    let span = pair.as_span();
    match pair.as_rule() {
        Rule::integer => pair.as_str().parse::<i32>().map(Expr::Literal).map_err(|_| {
            ParseError::new(
                ParseErrorKind::LiteralOutOfRange {
                    text: pair.as_str().to_string(),
                },
                span,
            )
        }),
        Rule::ident => Ok(Expr::var(pair.as_str())),
        Rule::field_access => {
            let mut inner = pair.into_inner();
            Ok(Expr::field(next_pair(&mut inner, "field name", span)?.as_str()))
        }
        Rule::call => {
            let mut inner = pair.into_inner();
            let method = next_pair(&mut inner, "method name", span)?.as_str();
            let args = inner.map(parse_expression).collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::call(method, args))
        }
        Rule::expression => parse_expression(pair),
        rule => unreachable!("Expr::parse expected atom, found {:?}", rule),
    }
}

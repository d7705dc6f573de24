//! Parses the s-expression query grammar (§6) into an `Expr` tree.
//!
//! ```text
//! expr   := '(' op arg* ')'
//! op     := Term | And | Andnot | Before | After | Minoc | Within | Scope
//! arg    := expr | constant
//! ```

use crate::core::error::{Error, ErrorKind, Result};
use crate::query::ast::{Const, Expr};
use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, tag};
use nom::character::complete::{alpha1, char, digit1, multispace0, none_of};
use nom::combinator::{map, opt, recognize, value};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded};
use nom::IResult;

/// Parses `input` into an expression tree. A malformed s-expression
/// (unbalanced parens, an atom that is neither a name nor a constant) is a
/// `QueryMalformed` error, distinct from the reducer's own soft/hard
/// failure handling over an already-parsed tree.
pub fn parse(input: &str) -> Result<Expr> {
    let (rest, expr) = expr(input.trim()).map_err(|e| {
        Error::new(ErrorKind::QueryMalformed, format!("could not parse query: {e}"))
    })?;
    if !rest.trim().is_empty() {
        return Err(Error::new(
            ErrorKind::QueryMalformed,
            format!("unexpected trailing input: {rest:?}"),
        ));
    }
    Ok(expr)
}

fn expr(input: &str) -> IResult<&str, Expr> {
    alt((tuple_expr, name_expr, const_expr))(input)
}

fn tuple_expr(input: &str) -> IResult<&str, Expr> {
    let (input, nodes) = delimited(
        char('('),
        many0(preceded(multispace0, expr)),
        preceded(multispace0, char(')')),
    )(input)?;
    Ok((input, Expr::Tuple(nodes)))
}

fn name_expr(input: &str) -> IResult<&str, Expr> {
    map(recognize(alpha1), |s: &str| Expr::Name(s.to_string()))(input)
}

fn const_expr(input: &str) -> IResult<&str, Expr> {
    alt((string_const, int_const))(input)
}

fn string_const(input: &str) -> IResult<&str, Expr> {
    let (input, s) = delimited(
        char('"'),
        opt(escaped_transform(none_of("\"\\"), '\\', alt((value('\\', char('\\')), value('"', char('"')))))),
        char('"'),
    )(input)?;
    Ok((input, Expr::Const(Const::Str(s.unwrap_or_default()))))
}

fn int_const(input: &str) -> IResult<&str, Expr> {
    map(recognize(pair(opt(char('-')), digit1)), |s: &str| {
        Expr::Const(Const::Int(s.parse().unwrap_or(0)))
    })(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_phrase_query() {
        let expr = parse(r#"(Before (Term "the") (Term "cat") (Term "sat"))"#).unwrap();
        let (op, args) = expr.as_operator().unwrap();
        assert_eq!(op, "Before");
        assert_eq!(args.len(), 3);
        let (inner_op, inner_args) = args[0].as_operator().unwrap();
        assert_eq!(inner_op, "Term");
        assert_eq!(inner_args[0].as_str_const(), Some("the"));
    }

    #[test]
    fn parses_within_with_numeric_operand() {
        let expr = parse(r#"(Within 2 (Term "a") (Term "b"))"#).unwrap();
        let (op, args) = expr.as_operator().unwrap();
        assert_eq!(op, "Within");
        assert_eq!(args[0].as_int_const(), Some(2));
    }

    #[test]
    fn unbalanced_parens_is_malformed() {
        let result = parse(r#"(Before (Term "the")"#);
        assert!(result.is_err());
    }
}

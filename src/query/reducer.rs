//! Walks a parsed expression tree and invokes the match-vector algebra (C8).

use crate::core::error::{Error, ErrorKind, Result};
use crate::query::algebra::{after_op, and_op, andnot_op, before_op, minoc_op, scope_op, within_op, MatchVector};
use crate::query::ast::Expr;
use std::collections::HashMap;

/// Resolves a bare word to its match vector. The base frame is the only one
/// consulted by default; it is how a reducer reaches the reverse index
/// without this module knowing anything about lexicons or partitions.
pub trait WordResolver {
    fn resolve(&self, word: &str) -> MatchVector;
}

impl<F: Fn(&str) -> MatchVector> WordResolver for F {
    fn resolve(&self, word: &str) -> MatchVector {
        self(word)
    }
}

/// A stack of `word -> MatchVector` frames over a base resolver. Nothing in
/// the current grammar pushes a frame (there is no binding form), but the
/// shape mirrors §4.7's "environment" and leaves room for one.
pub struct Environment<'a> {
    base: &'a dyn WordResolver,
    frames: Vec<HashMap<String, MatchVector>>,
}

impl<'a> Environment<'a> {
    pub fn new(base: &'a dyn WordResolver) -> Self {
        Environment { base, frames: Vec::new() }
    }

    pub fn push_frame(&mut self, frame: HashMap<String, MatchVector>) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    fn resolve(&self, word: &str) -> MatchVector {
        for frame in self.frames.iter().rev() {
            if let Some(mv) = frame.get(word) {
                return mv.clone();
            }
        }
        self.base.resolve(word)
    }
}

/// Reduces `expr` against `env`. Syntactically malformed subtrees yield an
/// empty result with a diagnostic; a `Scope` whose operands are not exactly
/// two `Term` nodes is a hard error.
pub fn reduce(expr: &Expr, env: &Environment) -> Result<MatchVector> {
    let Some((op, args)) = expr.as_operator() else {
        eprintln!("query reducer: expected an operator tuple, got {expr:?}");
        return Ok(MatchVector::empty());
    };

    match op {
        "Term" => reduce_term(args, env),
        "And" => Ok(and_op(reduce_all(args, env)?)),
        "Andnot" => reduce_andnot(args, env),
        "Before" => Ok(before_op(reduce_all(args, env)?)),
        "After" => Ok(after_op(reduce_all(args, env)?)),
        "Minoc" => reduce_minoc(args, env),
        "Within" => reduce_within(args, env),
        "Scope" => reduce_scope(args, env),
        other => {
            eprintln!("query reducer: unknown operator {other:?}");
            Ok(MatchVector::empty())
        }
    }
}

fn reduce_all(args: &[Expr], env: &Environment) -> Result<Vec<MatchVector>> {
    args.iter().map(|a| reduce(a, env)).collect()
}

fn reduce_term(args: &[Expr], env: &Environment) -> Result<MatchVector> {
    match args {
        [word] => match word.as_str_const() {
            Some(word) => Ok(env.resolve(word)),
            None => {
                eprintln!("query reducer: Term expects a string operand, got {word:?}");
                Ok(MatchVector::empty())
            }
        },
        _ => {
            eprintln!("query reducer: Term expects exactly one operand, got {}", args.len());
            Ok(MatchVector::empty())
        }
    }
}

fn reduce_andnot(args: &[Expr], env: &Environment) -> Result<MatchVector> {
    match args.split_first() {
        Some((left, others)) => {
            let left = reduce(left, env)?;
            let others = reduce_all(others, env)?;
            Ok(andnot_op(left, others))
        }
        None => {
            eprintln!("query reducer: Andnot expects at least one operand");
            Ok(MatchVector::empty())
        }
    }
}

fn reduce_minoc(args: &[Expr], env: &Environment) -> Result<MatchVector> {
    match args.split_first() {
        Some((n, rest)) => match n.as_int_const() {
            Some(n) if n >= 0 => Ok(minoc_op(n as usize, reduce_all(rest, env)?)),
            _ => {
                eprintln!("query reducer: Minoc expects a non-negative integer operand, got {n:?}");
                Ok(MatchVector::empty())
            }
        },
        None => {
            eprintln!("query reducer: Minoc expects a count operand");
            Ok(MatchVector::empty())
        }
    }
}

fn reduce_within(args: &[Expr], env: &Environment) -> Result<MatchVector> {
    match args.split_first() {
        Some((d, rest)) => match d.as_int_const() {
            Some(d) if d >= 0 => Ok(within_op(d as u32, reduce_all(rest, env)?)),
            _ => {
                eprintln!("query reducer: Within expects a non-negative integer operand, got {d:?}");
                Ok(MatchVector::empty())
            }
        },
        None => {
            eprintln!("query reducer: Within expects a distance operand");
            Ok(MatchVector::empty())
        }
    }
}

/// Scope's arity and operand-kind constraints are spec-mandated hard
/// errors, unlike the soft-empty-result handling everywhere else in this
/// module.
fn reduce_scope(args: &[Expr], env: &Environment) -> Result<MatchVector> {
    let [scope, scoped] = args else {
        return Err(Error::new(
            ErrorKind::QueryMalformed,
            format!("Scope requires exactly two operands, got {}", args.len()),
        ));
    };
    for arg in [scope, scoped] {
        match arg.as_operator() {
            Some(("Term", _)) => {}
            _ => {
                return Err(Error::new(
                    ErrorKind::QueryMalformed,
                    format!("Scope operands must be Term expressions, got {arg:?}"),
                ));
            }
        }
    }
    let scope_mv = reduce(scope, env)?;
    let scoped_mv = reduce(scoped, env)?;
    Ok(scope_op(scope_mv, scoped_mv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DocId, TermInstance};
    use crate::query::parser::parse;

    fn resolver() -> impl Fn(&str) -> MatchVector {
        |word: &str| match word {
            "the" => MatchVector::from_lookup(vec![
                (DocId(7), vec![TermInstance::leaf(0)]),
                (DocId(9), vec![TermInstance::leaf(1)]),
            ]),
            "cat" => MatchVector::from_lookup(vec![
                (DocId(7), vec![TermInstance::leaf(1)]),
                (DocId(9), vec![TermInstance::leaf(0)]),
            ]),
            "sat" => MatchVector::from_lookup(vec![
                (DocId(7), vec![TermInstance::leaf(2)]),
                (DocId(9), vec![TermInstance::leaf(2)]),
            ]),
            _ => MatchVector::empty(),
        }
    }

    #[test]
    fn reduces_phrase_query_to_single_match() {
        let expr = parse(r#"(Before (Term "the") (Term "cat") (Term "sat"))"#).unwrap();
        let base = resolver();
        let env = Environment::new(&base);
        let result = reduce(&expr, &env).unwrap().collect_all();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].doc_id, DocId(7));
    }

    #[test]
    fn scope_rejects_non_term_operands() {
        let expr = parse(r#"(Scope (Term "the") (And (Term "cat") (Term "sat")))"#).unwrap();
        let base = resolver();
        let env = Environment::new(&base);
        assert!(reduce(&expr, &env).is_err());
    }

    #[test]
    fn malformed_term_yields_empty_not_error() {
        let expr = parse(r#"(Term "the" "cat")"#).unwrap();
        let base = resolver();
        let env = Environment::new(&base);
        let result = reduce(&expr, &env).unwrap().collect_all();
        assert!(result.is_empty());
    }
}

// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A tree-walking evaluator. Callers are expected to have type-checked the expression first
//! ([`crate::types::infer`]); [`EvalError::UnboundVariable`] is the only failure an already
//! type-checked program can still hit, and it can't, since type-checking rejects unbound
//! variables first.

use alloc::collections::BTreeMap;
use alloc::string::String;

use crate::ast::{BinOp, Expr};
use crate::error::EvalError;

/// A runtime value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Value {
    /// A 64-bit signed integer.
    Int(i64),
    /// A boolean.
    Bool(bool),
}

/// Evaluates `expr` under the empty environment.
pub fn eval(expr: &Expr) -> Result<Value, EvalError> {
    eval_in(expr, &BTreeMap::new())
}

fn eval_in(expr: &Expr, env: &BTreeMap<String, Value>) -> Result<Value, EvalError> {
    match expr {
        Expr::Int(n) => Ok(Value::Int(*n)),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Var(name) => env
            .get(name.as_ref())
            .copied()
            .ok_or_else(|| EvalError::UnboundVariable(name.clone())),
        Expr::Neg(inner) => {
            let Value::Int(n) = eval_in(inner, env)? else {
                unreachable!("type-checked: Neg's operand is always Int")
            };
            Ok(Value::Int(-n))
        }
        Expr::BinOp(op, lhs, rhs) => eval_binop(*op, eval_in(lhs, env)?, eval_in(rhs, env)?),
        Expr::Let { name, value, body } => {
            let bound = eval_in(value, env)?;
            let mut inner_env = env.clone();
            inner_env.insert(String::from(name.as_ref()), bound);
            eval_in(body, &inner_env)
        }
        Expr::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let Value::Bool(cond) = eval_in(cond, env)? else {
                unreachable!("type-checked: if's condition is always Bool")
            };
            if cond {
                eval_in(then_branch, env)
            } else {
                eval_in(else_branch, env)
            }
        }
    }
}

fn eval_binop(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    match (op, lhs, rhs) {
        (BinOp::Add, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(b))),
        (BinOp::Sub, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(b))),
        (BinOp::Mul, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(b))),
        (BinOp::Div, Value::Int(_), Value::Int(0)) => Err(EvalError::DivisionByZero),
        (BinOp::Div, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a / b)),
        (BinOp::Eq, a, b) => Ok(Value::Bool(a == b)),
        (BinOp::Ne, a, b) => Ok(Value::Bool(a != b)),
        (BinOp::Lt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a < b)),
        (BinOp::Le, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a <= b)),
        (BinOp::Gt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a > b)),
        (BinOp::Ge, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a >= b)),
        _ => unreachable!("type-checked: comparisons other than ==/!= only ever see Int operands"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn run(src: &str) -> Value {
        eval(&parse_source(src).unwrap()).unwrap()
    }

    #[test]
    fn arithmetic_evaluates_left_to_right_with_precedence() {
        assert_eq!(run("1 + 2 * 3"), Value::Int(7));
    }

    #[test]
    fn let_binds_for_its_body_only() {
        assert_eq!(run("let x = 5 in x * x"), Value::Int(25));
    }

    #[test]
    fn if_selects_the_taken_branch() {
        assert_eq!(run("if 1 < 2 then 10 else 20"), Value::Int(10));
        assert_eq!(run("if 1 > 2 then 10 else 20"), Value::Int(20));
    }

    #[test]
    fn division_by_zero_is_an_eval_error() {
        let err = eval(&parse_source("1 / 0").unwrap()).unwrap_err();
        assert_eq!(err, EvalError::DivisionByZero);
    }

    #[test]
    fn equality_works_across_bools_too() {
        assert_eq!(run("true == false"), Value::Bool(false));
    }

    #[test]
    fn nested_let_shadows_the_outer_binding() {
        assert_eq!(run("let x = 1 in let x = 2 in x"), Value::Int(2));
    }
}

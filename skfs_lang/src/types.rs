// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A syntax-directed type checker. The language has no polymorphism and no type variables, so
//! inference is a single top-down pass threading a variable-name-to-type environment.

use alloc::collections::BTreeMap;
use alloc::string::String;

use crate::ast::{BinOp, Expr};
pub use crate::error::Ty;
use crate::error::TypeError;

/// Infers `expr`'s type under the empty environment.
pub fn infer(expr: &Expr) -> Result<Ty, TypeError> {
    infer_in(expr, &BTreeMap::new())
}

fn infer_in(expr: &Expr, env: &BTreeMap<String, Ty>) -> Result<Ty, TypeError> {
    match expr {
        Expr::Int(_) => Ok(Ty::Int),
        Expr::Bool(_) => Ok(Ty::Bool),
        Expr::Var(name) => env
            .get(name.as_ref())
            .copied()
            .ok_or_else(|| TypeError::UnboundVariable(name.clone())),
        Expr::Neg(inner) => expect(inner, env, Ty::Int),
        Expr::BinOp(op, lhs, rhs) => infer_binop(*op, lhs, rhs, env),
        Expr::Let { name, value, body } => {
            let value_ty = infer_in(value, env)?;
            let mut inner_env = env.clone();
            inner_env.insert(String::from(name.as_ref()), value_ty);
            infer_in(body, &inner_env)
        }
        Expr::If {
            cond,
            then_branch,
            else_branch,
        } => {
            expect(cond, env, Ty::Bool)?;
            let then_ty = infer_in(then_branch, env)?;
            let else_ty = infer_in(else_branch, env)?;
            if then_ty == else_ty {
                Ok(then_ty)
            } else {
                Err(TypeError::BranchMismatch { then_ty, else_ty })
            }
        }
    }
}

fn expect(expr: &Expr, env: &BTreeMap<String, Ty>, expected: Ty) -> Result<Ty, TypeError> {
    let found = infer_in(expr, env)?;
    if found == expected {
        Ok(found)
    } else {
        Err(TypeError::Mismatch { expected, found })
    }
}

fn infer_binop(op: BinOp, lhs: &Expr, rhs: &Expr, env: &BTreeMap<String, Ty>) -> Result<Ty, TypeError> {
    if op.is_arithmetic() {
        expect(lhs, env, Ty::Int)?;
        expect(rhs, env, Ty::Int)?;
        Ok(Ty::Int)
    } else {
        let lhs_ty = infer_in(lhs, env)?;
        expect(rhs, env, lhs_ty)?;
        Ok(Ty::Bool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn ty_of(src: &str) -> Ty {
        infer(&parse_source(src).unwrap()).unwrap()
    }

    #[test]
    fn arithmetic_is_int() {
        assert_eq!(ty_of("1 + 2 * 3"), Ty::Int);
    }

    #[test]
    fn comparison_is_bool() {
        assert_eq!(ty_of("1 < 2"), Ty::Bool);
    }

    #[test]
    fn let_extends_the_environment_for_its_body() {
        assert_eq!(ty_of("let x = 1 in x + 1"), Ty::Int);
    }

    #[test]
    fn if_requires_matching_branch_types() {
        let err = infer(&parse_source("if true then 1 else false").unwrap()).unwrap_err();
        assert_eq!(
            err,
            TypeError::BranchMismatch {
                then_ty: Ty::Int,
                else_ty: Ty::Bool,
            }
        );
    }

    #[test]
    fn if_condition_must_be_bool() {
        let err = infer(&parse_source("if 1 then 1 else 2").unwrap()).unwrap_err();
        assert_eq!(err, TypeError::Mismatch { expected: Ty::Bool, found: Ty::Int });
    }

    #[test]
    fn unbound_variable_is_rejected() {
        let err = infer(&parse_source("x + 1").unwrap()).unwrap_err();
        assert_eq!(err, TypeError::UnboundVariable("x".into()));
    }

    #[test]
    fn arithmetic_operands_must_be_int() {
        let err = infer(&parse_source("true + 1").unwrap()).unwrap_err();
        assert_eq!(err, TypeError::Mismatch { expected: Ty::Int, found: Ty::Bool });
    }
}

//! Tests for implicit evaluation by root finding

use crate::test_helpers::{drug_grid, numeric_derivative};
use approx::assert_relative_eq;
use partrafo::solver::{DiffMethod, NewtonConfig};
use partrafo::symbolic::EquationVector;
use partrafo::{
    compile, EvalMode, ImplicitOptions, ParVec, Predicate, Substitutions, TrafoError,
    TransformKind, Trafos, P,
};

fn linear_system() -> Trafos {
    Trafos::from(
        EquationVector::parse_pairs(&[("X", "X + Y - 2 * a"), ("Y", "X - Y - 2 * b")]).unwrap(),
    )
}

#[test]
fn test_implicit_solution_includes_outer_values() {
    let p = P(&linear_system(), EvalMode::Implicit).unwrap();
    assert_eq!(p.kind(), TransformKind::Implicit);
    assert_eq!(p.outer_parameters(), vec!["a", "b"]);

    let out = p.apply(&ParVec::from_pairs(&[("a", 3.0), ("b", 2.0)])).unwrap();
    assert_eq!(out.names(), vec!["X", "Y", "a", "b"]);
    assert_relative_eq!(out.get("X").unwrap(), 5.0, epsilon = 1e-9);
    assert_relative_eq!(out.get("Y").unwrap(), 1.0, epsilon = 1e-9);
    assert_eq!(out.get("a"), Some(3.0));
    assert_eq!(out.get("b"), Some(2.0));
}

#[test]
fn test_implicit_derivatives_match_finite_differences() {
    let eqs = EquationVector::parse_pairs(&[("x", "x^3 + x - k")]).unwrap();
    let p = P(&Trafos::from(eqs), EvalMode::Implicit).unwrap();
    let pars = ParVec::from_pairs(&[("k", 10.0)]);
    let out = p.apply(&pars).unwrap();

    assert_relative_eq!(out.get("x").unwrap(), 2.0, epsilon = 1e-9);
    // dx/dk = 1 / (3x^2 + 1)
    let d = out.deriv().unwrap().get("x", "k").unwrap();
    assert_relative_eq!(d, 1.0 / 13.0, epsilon = 1e-9);
    assert_relative_eq!(d, numeric_derivative(&p, None, &pars, "x", "k"), epsilon = 1e-4);
    assert_eq!(out.deriv().unwrap().get("k", "k"), Some(1.0));
}

#[test]
fn test_finite_difference_jacobian_with_guess() {
    let options = ImplicitOptions::new()
        .with_guess("x", 3.0)
        .with_newton(NewtonConfig::new().with_diff_method(DiffMethod::FiniteDifference));
    let eqs = EquationVector::parse_pairs(&[("x", "x^2 - k")]).unwrap();
    let p = compile(&Trafos::from(eqs), Some(EvalMode::Implicit), &options).unwrap();

    let out = p.apply(&ParVec::from_pairs(&[("k", 4.0)])).unwrap();
    assert_relative_eq!(out.get("x").unwrap(), 2.0, epsilon = 1e-8);
}

#[test]
fn test_no_root_is_an_error() {
    let eqs = EquationVector::parse_pairs(&[("x", "x^2 + k")]).unwrap();
    let p = P(&Trafos::from(eqs), EvalMode::Implicit).unwrap();
    let err = p.apply(&ParVec::from_pairs(&[("k", 1.0)])).unwrap_err();
    assert!(matches!(err, TrafoError::NoConvergence { .. }));
}

#[test]
fn test_branched_implicit_per_condition() {
    let trafos = linear_system()
        .branch(&drug_grid())
        .unwrap()
        .insert_where(
            "a ~ a * dose",
            &Substitutions::new().column("dose", "dose"),
            &Predicate::gt("dose", 0.0),
        )
        .unwrap();
    let p = P(&trafos, EvalMode::Implicit).unwrap();
    assert_eq!(p.kind(), TransformKind::Implicit);
    assert_eq!(p.conditions(), Some(vec!["ctrl", "treated"]));

    let pars = ParVec::from_pairs(&[("a", 3.0), ("b", 2.0)]);
    let out = p.call(&pars, None).unwrap();
    assert_eq!(out.conditions(), vec!["ctrl", "treated"]);

    // ctrl: X = a + b, Y = a - b
    let ctrl = out.get("ctrl").unwrap();
    assert_relative_eq!(ctrl.get("X").unwrap(), 5.0, epsilon = 1e-9);
    assert_relative_eq!(ctrl.get("Y").unwrap(), 1.0, epsilon = 1e-9);

    // treated: X = 2a + b, Y = 2a - b
    let treated = out.get("treated").unwrap();
    assert_relative_eq!(treated.get("X").unwrap(), 8.0, epsilon = 1e-9);
    assert_relative_eq!(treated.get("Y").unwrap(), 4.0, epsilon = 1e-9);
    assert_eq!(treated.get("a"), Some(3.0));
    assert_eq!(treated.get("b"), Some(2.0));

    let d = treated.deriv().unwrap();
    assert_relative_eq!(d.get("X", "a").unwrap(), 2.0, epsilon = 1e-9);
    assert_relative_eq!(d.get("Y", "b").unwrap(), -1.0, epsilon = 1e-9);
    assert_relative_eq!(
        d.get("Y", "a").unwrap(),
        numeric_derivative(&p, Some("treated"), &pars, "Y", "a"),
        epsilon = 1e-4
    );

    assert!(matches!(p.apply(&pars), Err(TrafoError::ConditionMismatch(_))));
    assert_eq!(p.call_parallel(&pars, None).unwrap().conditions(), out.conditions());
}

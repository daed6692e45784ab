//! Tests for explicit evaluation

use crate::test_helpers::{drug_grid, numeric_derivative};
use approx::assert_relative_eq;
use partrafo::symbolic::EquationVector;
use partrafo::{EvalMode, ParVec, Predicate, Substitutions, TrafoError, TransformKind, Trafos, P};

#[test]
fn test_explicit_sum_and_difference() {
    let eqs = EquationVector::parse_pairs(&[("X", "a + b"), ("Y", "a - b")]).unwrap();
    let p = P(&Trafos::from(eqs), EvalMode::Explicit).unwrap();
    assert_eq!(p.kind(), TransformKind::Explicit);
    assert!(p.is_global());

    let out = p.apply(&ParVec::from_pairs(&[("a", 3.0), ("b", 2.0)])).unwrap();
    assert_eq!(out.names(), vec!["X", "Y"]);
    assert_eq!(out.get("X"), Some(5.0));
    assert_eq!(out.get("Y"), Some(1.0));

    let d = out.deriv().unwrap();
    assert_eq!(d.get("X", "a"), Some(1.0));
    assert_eq!(d.get("Y", "b"), Some(-1.0));
}

#[test]
fn test_missing_outer_parameter() {
    let eqs = EquationVector::parse_pairs(&[("X", "a + b")]).unwrap();
    let p = P(&Trafos::from(eqs), EvalMode::Explicit).unwrap();
    let err = p.apply(&ParVec::from_pairs(&[("a", 3.0)])).unwrap_err();
    assert!(matches!(err, TrafoError::UnknownSymbol(_)));
}

#[test]
fn test_branched_evaluation_per_condition() {
    let trafos = Trafos::new()
        .define("x ~ x", &Substitutions::new().values("x", ["k1", "k2"]))
        .unwrap()
        .branch(&drug_grid())
        .unwrap()
        .insert_where(
            "k1 ~ k1 * dose",
            &Substitutions::new().column("dose", "dose"),
            &Predicate::gt("dose", 0.0),
        )
        .unwrap();
    let p = P(&trafos, EvalMode::Explicit).unwrap();
    assert_eq!(p.conditions(), Some(vec!["ctrl", "treated"]));

    let pars = ParVec::from_pairs(&[("k1", 1.5), ("k2", 4.0)]);
    let out = p.call(&pars, None).unwrap();
    assert_eq!(out.conditions(), vec!["ctrl", "treated"]);
    assert_eq!(out.get("ctrl").unwrap().get("k1"), Some(1.5));
    assert_eq!(out.get("treated").unwrap().get("k1"), Some(3.0));
    assert_eq!(out.get("treated").unwrap().get("k2"), Some(4.0));

    let subset = p.call(&pars, Some(&["treated".to_string()])).unwrap();
    assert_eq!(subset.conditions(), vec!["treated"]);
    assert_eq!(p.call_parallel(&pars, None).unwrap(), out);
}

#[test]
fn test_log_transform_derivatives() {
    let trafos = Trafos::new()
        .define("x ~ x", &Substitutions::new().values("x", ["k1", "k2"]))
        .unwrap()
        .insert("x ~ exp(x)", &Substitutions::new().current_symbols("x", &[]))
        .unwrap()
        .insert("k2 ~ k2 * k1", &Substitutions::new())
        .unwrap();
    let p = P(&trafos, EvalMode::Explicit).unwrap();
    let pars = ParVec::from_pairs(&[("k1", 0.3), ("k2", -0.2)]);
    let out = p.apply(&pars).unwrap();

    // k2 = exp(k2 * k1)
    assert_relative_eq!(out.get("k2").unwrap(), (-0.06f64).exp(), epsilon = 1e-12);
    let d = out.deriv().unwrap();
    for inner in ["k1", "k2"] {
        for outer in ["k1", "k2"] {
            assert_relative_eq!(
                d.get(inner, outer).unwrap(),
                numeric_derivative(&p, None, &pars, inner, outer),
                epsilon = 1e-6
            );
        }
    }
}

#[test]
fn test_singular_derivative_keeps_value() {
    let eqs = EquationVector::parse_pairs(&[("X", "sqrt(k)"), ("Y", "abs(a) + k")]).unwrap();
    let p = P(&Trafos::from(eqs), EvalMode::Explicit).unwrap();

    let out = p.apply(&ParVec::from_pairs(&[("k", 0.0), ("a", 0.0)])).unwrap();
    assert_eq!(out.get("X"), Some(0.0));
    assert_eq!(out.get("Y"), Some(0.0));

    let d = out.deriv().unwrap();
    assert_relative_eq!(d.get("X", "a").unwrap(), 0.0, epsilon = 1e-12);
    assert_relative_eq!(d.get("Y", "k").unwrap(), 1.0, epsilon = 1e-6);
    assert_relative_eq!(d.get("Y", "a").unwrap(), 1.0, epsilon = 1e-6);
    assert!(d.get("X", "k").unwrap().is_finite());
}

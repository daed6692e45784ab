//! Tests for `*` and `+` on transformations, predictions and condition maps

use crate::test_helpers::{drug_grid, numeric_derivative};
use approx::assert_relative_eq;
use partrafo::prediction::ExpressionPrediction;
use partrafo::symbolic::EquationVector;
use partrafo::{
    ConditionGrid, ConditionMap, EvalMode, ParVec, ParameterTransformation, Predicate,
    PredictionFn, Substitutions, TrafoError, TransformKind, Trafos, P,
};

fn log_scale() -> ParameterTransformation {
    let trafos = Trafos::new()
        .define("x ~ exp(x)", &Substitutions::new().values("x", ["k1", "k2"]))
        .unwrap();
    P(&trafos, EvalMode::Explicit).unwrap()
}

fn rates() -> ParameterTransformation {
    let eqs = EquationVector::parse_pairs(&[("ka", "k1 * k2"), ("kb", "k1 / k2")]).unwrap();
    P(&Trafos::from(eqs), EvalMode::Explicit).unwrap()
}

fn dosed() -> ParameterTransformation {
    let trafos = Trafos::new()
        .define("x ~ x", &Substitutions::new().values("x", ["k1", "k2"]))
        .unwrap()
        .branch(&drug_grid())
        .unwrap()
        .insert_where(
            "k1 ~ k1 * dose",
            &Substitutions::new().column("dose", "dose"),
            &Predicate::eq("drug", "A"),
        )
        .unwrap();
    P(&trafos, EvalMode::Explicit).unwrap()
}

#[test]
fn test_composition_equals_sequential_application() {
    let f = log_scale();
    let g = rates();
    let gf = (&g * &f).unwrap();
    assert_eq!(gf.kind(), TransformKind::Composite);

    let pars = ParVec::from_pairs(&[("k1", 0.1), ("k2", 0.4)]);
    assert_eq!(gf.apply(&pars).unwrap(), g.apply(&f.apply(&pars).unwrap()).unwrap());
}

#[test]
fn test_composite_derivatives_match_finite_differences() {
    let gf = (rates() * log_scale()).unwrap();
    let pars = ParVec::from_pairs(&[("k1", 0.1), ("k2", 0.4)]);
    let d = gf.apply(&pars).unwrap().deriv().unwrap().clone();

    assert_eq!(d.cols(), ["k1", "k2"]);
    for inner in ["ka", "kb"] {
        for outer in ["k1", "k2"] {
            assert_relative_eq!(
                d.get(inner, outer).unwrap(),
                numeric_derivative(&gf, None, &pars, inner, outer),
                epsilon = 1e-6
            );
        }
    }
    // ka = exp(k1 + k2)
    assert_relative_eq!(d.get("ka", "k1").unwrap(), 0.5f64.exp(), epsilon = 1e-12);
}

#[test]
fn test_explicit_after_implicit() {
    let residuals =
        EquationVector::parse_pairs(&[("X", "X + Y - 2 * a"), ("Y", "X - Y - 2 * b")]).unwrap();
    let f = P(&Trafos::from(residuals), EvalMode::Implicit).unwrap();
    // a and b reach g only through the outer values f passes on
    let outputs = EquationVector::parse_pairs(&[("Z", "X * a"), ("W", "Y^2 + b")]).unwrap();
    let g = P(&Trafos::from(outputs), EvalMode::Explicit).unwrap();
    let gf = (&g * &f).unwrap();

    let pars = ParVec::from_pairs(&[("a", 3.0), ("b", 2.0)]);
    let out = gf.apply(&pars).unwrap();
    assert_eq!(out.names(), vec!["Z", "W"]);
    assert_relative_eq!(out.get("Z").unwrap(), 15.0, epsilon = 1e-9);
    assert_relative_eq!(out.get("W").unwrap(), 3.0, epsilon = 1e-9);

    let sequential = g.apply(&f.apply(&pars).unwrap()).unwrap();
    assert_relative_eq!(out.get("Z").unwrap(), sequential.get("Z").unwrap());

    // X = a + b, Y = a - b
    let d = out.deriv().unwrap();
    assert_eq!(d.cols(), ["a", "b"]);
    assert_relative_eq!(d.get("Z", "a").unwrap(), 8.0, epsilon = 1e-8);
    assert_relative_eq!(d.get("Z", "b").unwrap(), 3.0, epsilon = 1e-8);
    assert_relative_eq!(d.get("W", "a").unwrap(), 2.0, epsilon = 1e-8);
    assert_relative_eq!(d.get("W", "b").unwrap(), -1.0, epsilon = 1e-8);
    for inner in ["Z", "W"] {
        for outer in ["a", "b"] {
            assert_relative_eq!(
                d.get(inner, outer).unwrap(),
                numeric_derivative(&gf, None, &pars, inner, outer),
                epsilon = 1e-4
            );
        }
    }
}

#[test]
fn test_global_operand_is_broadcast() {
    let composed = (&dosed() * &log_scale()).unwrap();
    assert_eq!(composed.conditions(), Some(vec!["ctrl", "treated"]));

    let pars = ParVec::from_pairs(&[("k1", 0.0), ("k2", 0.0)]);
    let out = composed.call(&pars, None).unwrap();
    assert_eq!(out.get("ctrl").unwrap().get("k1"), Some(1.0));
    assert_eq!(out.get("treated").unwrap().get("k1"), Some(2.0));
    assert_relative_eq!(
        out.get("treated").unwrap().deriv().unwrap().get("k1", "k1").unwrap(),
        2.0
    );
}

#[test]
fn test_composition_needs_matching_conditions() {
    let other_grid = ConditionGrid::new(&["dose"])
        .with_row(Some("ctrl"), vec![1.0.into()])
        .unwrap();
    let other = P(
        &Trafos::from(EquationVector::parse_pairs(&[("k1", "k1")]).unwrap())
            .branch(&other_grid)
            .unwrap(),
        EvalMode::Explicit,
    )
    .unwrap();

    assert!(matches!(dosed() * other, Err(TrafoError::ConditionMismatch(_))));
}

#[test]
fn test_union_of_transformations() {
    let grid = ConditionGrid::new(&["drug", "dose"])
        .with_row(Some("late"), vec!["B".into(), 5.0.into()])
        .unwrap();
    let late = P(
        &Trafos::from(EquationVector::parse_pairs(&[("k1", "k1"), ("k2", "k2")]).unwrap())
            .branch(&grid)
            .unwrap(),
        EvalMode::Explicit,
    )
    .unwrap();

    let joined = (dosed() + late).unwrap();
    assert_eq!(joined.conditions(), Some(vec!["ctrl", "treated", "late"]));
    assert!(matches!(
        dosed() + dosed(),
        Err(TrafoError::DuplicateCondition(_))
    ));
}

#[test]
fn test_condition_map_union() {
    let a: ConditionMap<f64> = vec![("c1".to_string(), 1.0)].into_iter().collect();
    let b: ConditionMap<f64> = vec![("c2".to_string(), 2.0)].into_iter().collect();
    let joined = (a.clone() + b).unwrap();
    assert_eq!(joined.conditions(), vec!["c1", "c2"]);
    assert!(matches!(a.clone() + a, Err(TrafoError::DuplicateCondition(_))));
}

#[test]
fn test_prediction_composed_per_condition() {
    let obs = EquationVector::parse_pairs(&[("A", "k2 * exp(-k1 * t)")]).unwrap();
    let model = PredictionFn::new(ExpressionPrediction::new(obs, "t"));
    let g = (&model * &dosed()).unwrap();
    assert_eq!(g.conditions(), Some(vec!["ctrl".to_string(), "treated".to_string()]));

    let pars = ParVec::from_pairs(&[("k1", 0.5), ("k2", 3.0)]);
    let all = g.predict_all(&[0.0, 1.0], &pars, None).unwrap();
    assert_relative_eq!(all.get("ctrl").unwrap().value("A", 1.0).unwrap(), 3.0 * (-0.5f64).exp());
    let treated = all.get("treated").unwrap().value("A", 1.0).unwrap();
    assert_relative_eq!(treated, 3.0 * (-1.0f64).exp());
}

//! Tests for objective functions composed with transformations

use crate::test_helpers::drug_grid;
use approx::assert_relative_eq;
use partrafo::objective::{DataPoint, NormL2, Prior};
use partrafo::prediction::ExpressionPrediction;
use partrafo::symbolic::EquationVector;
use partrafo::{
    ConditionMap, EvalMode, ObjectiveFn, ParVec, Predicate, PredictionFn, Substitutions,
    TrafoError, Trafos, P,
};

fn log_k1() -> partrafo::ParameterTransformation {
    let eqs = EquationVector::parse_pairs(&[("k1", "exp(logk1)")]).unwrap();
    P(&Trafos::from(eqs), EvalMode::Explicit).unwrap()
}

fn dosed() -> partrafo::ParameterTransformation {
    let trafos = Trafos::from(EquationVector::parse_pairs(&[("k1", "k1")]).unwrap())
        .branch(&drug_grid())
        .unwrap()
        .insert_where(
            "k1 ~ k1 * dose",
            &Substitutions::new().column("dose", "dose"),
            &Predicate::gt("dose", 0.0),
        )
        .unwrap();
    P(&trafos, EvalMode::Explicit).unwrap()
}

fn data(conditions: &[(&str, f64)]) -> ConditionMap<Vec<DataPoint>> {
    conditions
        .iter()
        .map(|(c, y)| (c.to_string(), vec![DataPoint::new("y", 0.0, *y, 1.0)]))
        .collect()
}

fn level_model() -> PredictionFn {
    let obs = EquationVector::parse_pairs(&[("y", "k1")]).unwrap();
    PredictionFn::new(ExpressionPrediction::new(obs, "t"))
}

#[test]
fn test_prior_chained_through_transformation() {
    let prior = ObjectiveFn::new(Prior::new(&[("k1", 1.0)], 1.0).unwrap());
    let obj = (&prior * &log_k1()).unwrap();

    let v = obj.evaluate(&ParVec::from_pairs(&[("logk1", 2.0f64.ln())])).unwrap();
    assert_eq!(v.names, vec!["logk1"]);
    assert_relative_eq!(v.value, 1.0, epsilon = 1e-12);
    // d/dlogk1 (k1 - 1)^2 = 2 (k1 - 1) k1
    assert_relative_eq!(v.gradient_of("logk1").unwrap(), 4.0, epsilon = 1e-12);
    assert_relative_eq!(v.hessian_of("logk1", "logk1").unwrap(), 8.0, epsilon = 1e-12);
}

#[test]
fn test_sum_of_objectives_at_shared_point() {
    let prior = ObjectiveFn::new(Prior::new(&[("k1", 1.0)], 1.0).unwrap());
    let on_log = ObjectiveFn::new(Prior::new(&[("logk1", 0.0)], 1.0).unwrap());
    let total = (&prior * &log_k1()).unwrap() + on_log;

    let l = 2.0f64.ln();
    let v = total.evaluate(&ParVec::from_pairs(&[("logk1", l)])).unwrap();
    assert_relative_eq!(v.value, 1.0 + l * l, epsilon = 1e-12);
    assert_relative_eq!(v.gradient_of("logk1").unwrap(), 4.0 + 2.0 * l, epsilon = 1e-12);
}

#[test]
fn test_data_fit_sums_over_conditions() {
    let fit = ObjectiveFn::new(
        NormL2::new(data(&[("ctrl", 1.0), ("treated", 2.0)]), level_model()).unwrap(),
    );
    let obj = (&fit * &dosed()).unwrap();
    assert_eq!(obj.conditions(), Some(vec!["ctrl".to_string(), "treated".to_string()]));

    let pars = ParVec::from_pairs(&[("k1", 1.5)]);
    let v = obj.evaluate(&pars).unwrap();
    // residuals 0.5 (ctrl) and 1.0 (treated, k1 doubled)
    assert_relative_eq!(v.value, 1.25, epsilon = 1e-12);
    assert_relative_eq!(v.gradient_of("k1").unwrap(), 5.0, epsilon = 1e-5);
    assert_relative_eq!(v.hessian_of("k1", "k1").unwrap(), 10.0, epsilon = 1e-4);

    let ctrl = obj.evaluate_condition(&pars, "ctrl").unwrap();
    assert_relative_eq!(ctrl.value, 0.25, epsilon = 1e-12);
}

#[test]
fn test_data_fit_conditions_must_match() {
    let fit = ObjectiveFn::new(NormL2::new(data(&[("ctrl", 1.0)]), level_model()).unwrap());
    assert!(matches!(fit * dosed(), Err(TrafoError::ConditionMismatch(_))));
}

//! Tests for the editing verbs

use crate::test_helpers::drug_grid;
use partrafo::symbolic::EquationVector;
use partrafo::{branch, define, insert, Predicate, Substitutions, TrafoError, Trafos};

fn base() -> Trafos {
    Trafos::new()
        .define("x ~ x", &Substitutions::new().values("x", ["A", "B", "k1", "k2"]))
        .unwrap()
}

#[test]
fn test_define_appends_in_order() {
    let trafos = base();
    assert_eq!(trafos.inner_parameters(), vec!["A", "B", "k1", "k2"]);
    assert_eq!(trafos.outer_parameters(), vec!["A", "B", "k1", "k2"]);
    assert!(!trafos.is_branched());
}

#[test]
fn test_define_is_idempotent() {
    let once = define(&base(), "k1 ~ exp(logk1)", &Substitutions::new()).unwrap();
    let twice = define(&once, "k1 ~ exp(logk1)", &Substitutions::new()).unwrap();
    assert_eq!(once, twice);
    assert_eq!(twice.inner_parameters(), vec!["A", "B", "k1", "k2"]);
}

#[test]
fn test_define_length_mismatch() {
    let err = define(
        &Trafos::new(),
        "x ~ y",
        &Substitutions::new().values("x", ["a", "b"]).values("y", ["c"]),
    )
    .unwrap_err();
    assert!(matches!(err, TrafoError::TemplateLengthMismatch { .. }));
}

#[test]
fn test_identity_insert_is_a_no_op() {
    let trafos = base();
    let edited = insert(&trafos, "x ~ x", &Substitutions::new().value("x", "k1"), None).unwrap();
    assert_eq!(edited, trafos);
}

#[test]
fn test_insert_zero_occurrences_keeps_shared_value() {
    let trafos = base();
    let edited = trafos
        .insert("zz ~ exp(zz)", &Substitutions::new())
        .unwrap();
    let before = trafos.as_single().unwrap();
    let after = edited.as_single().unwrap();
    assert!(after.shares_storage(before));
}

#[test]
fn test_insert_is_simultaneous() {
    let trafos = Trafos::from(EquationVector::parse_pairs(&[("X", "a + b")]).unwrap());
    let swapped = trafos
        .insert("x ~ y", &Substitutions::new().values("x", ["a", "b"]).values("y", ["b", "a"]))
        .unwrap();
    let x = swapped.as_single().unwrap().get("X").unwrap().to_string();
    assert_eq!(x, "b + a");
}

#[test]
fn test_current_symbols_after_earlier_edits() {
    let trafos = base()
        .insert("k1 ~ k1 * scale", &Substitutions::new())
        .unwrap()
        .insert(
            "x ~ exp(x)",
            &Substitutions::new().current_symbols("x", &["scale"]),
        )
        .unwrap();

    let t = trafos.as_single().unwrap();
    assert_eq!(t.get("k1").unwrap().to_string(), "exp(k1) * scale");
    assert_eq!(t.get("A").unwrap().to_string(), "exp(A)");
    assert_eq!(trafos.current_symbols(None).unwrap(), vec!["A", "B", "k1", "scale", "k2"]);
}

#[test]
fn test_current_symbols_unknown_exception() {
    let err = base()
        .insert("x ~ exp(x)", &Substitutions::new().current_symbols("x", &["nope"]))
        .unwrap_err();
    assert!(matches!(err, TrafoError::UnknownSymbol(_)));
}

#[test]
fn test_branch_keys_and_sharing() {
    let trafos = base();
    let branched = branch(&trafos, &drug_grid()).unwrap();
    assert_eq!(branched.conditions(), vec!["ctrl", "treated"]);

    let list = branched.as_list().unwrap();
    let single = trafos.as_single().unwrap();
    for (_, t) in list.iter() {
        assert!(t.shares_storage(single));
    }

    assert!(matches!(
        branch(&branched, &drug_grid()),
        Err(TrafoError::AlreadyBranched)
    ));
}

#[test]
fn test_conditioned_insert_touches_matching_rows_only() {
    let branched = base().branch(&drug_grid()).unwrap();
    let edited = branched
        .insert_where(
            "x ~ x_drug",
            &Substitutions::new().value("x", "k1").column("drug", "drug"),
            &Predicate::ne("drug", "none"),
        )
        .unwrap();

    let before = branched.as_list().unwrap();
    let after = edited.as_list().unwrap();
    assert!(after.get("ctrl").unwrap().shares_storage(before.get("ctrl").unwrap()));
    assert!(!after.get("treated").unwrap().shares_storage(before.get("treated").unwrap()));
    assert_eq!(
        after.get("treated").unwrap().get("k1").unwrap().to_string(),
        "k1_A"
    );
    assert_eq!(edited.current_symbols(Some("ctrl")).unwrap(), vec!["A", "B", "k1", "k2"]);
}

#[test]
fn test_numeric_column_insert() {
    let edited = base()
        .branch(&drug_grid())
        .unwrap()
        .insert("k2 ~ k2 * (1 + dose)", &Substitutions::new().column("dose", "dose"))
        .unwrap();
    assert_eq!(edited.outer_parameters(), vec!["A", "B", "k1", "k2"]);
    let treated = edited.as_list().unwrap().get("treated").unwrap();
    assert!(treated.get("k2").unwrap().contains_variable("k2"));
}

#[test]
fn test_column_outside_branch() {
    let err = base()
        .insert("k1 ~ k1_c", &Substitutions::new().column("c", "drug"))
        .unwrap_err();
    assert!(matches!(err, TrafoError::UnknownSymbol(_)));
}

#[test]
fn test_conditioned_insert_needs_branch() {
    let err = base()
        .insert_where("k1 ~ 2 * k1", &Substitutions::new(), &Predicate::is_true("x"))
        .unwrap_err();
    assert!(matches!(err, TrafoError::ConditionMismatch(_)));
}

#[test]
fn test_json_round_trip_of_branched_trafos() {
    let branched = base()
        .branch(&drug_grid())
        .unwrap()
        .insert("k1 ~ 2 * k1", &Substitutions::new())
        .unwrap();
    let back = Trafos::from_json(&branched.to_json().unwrap()).unwrap();
    assert_eq!(back, branched);
}

#[test]
fn test_dotted_names_in_define_and_insert() {
    let trafos = Trafos::new()
        .define("x ~ x", &Substitutions::new().values("x", ["k.on", "k.off"]))
        .unwrap()
        .insert("x ~ exp(x)", &Substitutions::new().current_symbols("x", &[]))
        .unwrap()
        .branch(&drug_grid())
        .unwrap()
        .insert_where(
            "k.on ~ k.on_drug",
            &Substitutions::new().column("drug", "drug"),
            &Predicate::eq("drug", "A"),
        )
        .unwrap();

    let treated = trafos.as_list().unwrap().get("treated").unwrap();
    assert_eq!(treated.get("k.on").unwrap().to_string(), "exp(k.on_A)");
    assert_eq!(trafos.outer_parameters(), vec!["k.on", "k.off", "k.on_A"]);
}

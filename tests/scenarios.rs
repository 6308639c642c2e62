//! End-to-end scenarios, encoded literally from the synthetic instances that
//! motivate each invariant: symmetric maximin, ILP rounding, symmetric
//! Nash, infeasibility, pipage idempotence, and Beck–Fiala's slack bound.

use std::collections::BTreeMap;

use sortition_core::{
    run, Feature, Objective, Pool, Quota, Respondent, RespondentId, Rounder, RunConfig,
};

fn respondent(id: &str, color: &str) -> Respondent {
    Respondent {
        id: RespondentId(id.to_string()),
        values: BTreeMap::from([("color".to_string(), color.to_string())]),
    }
}

fn symmetric_color_pool() -> Pool {
    let feature = Feature {
        name: "color".into(),
        quotas: BTreeMap::from([
            ("red".to_string(), Quota::new(1, 1)),
            ("blue".to_string(), Quota::new(1, 1)),
        ]),
    };
    let respondents = vec![
        respondent("1", "red"),
        respondent("2", "red"),
        respondent("3", "blue"),
        respondent("4", "blue"),
    ];
    Pool::new(respondents, vec![feature]).unwrap()
}

/// Scenario 1: n=4, k=2, quotas red:[1,1] blue:[1,1]. Maximin should return
/// marginal 0.5 for every respondent.
#[test]
fn scenario_1_maximin_symmetric_marginals() {
    let pool = symmetric_color_pool();
    let config = RunConfig::new(2, 1000, Objective::Maximin, Rounder::OptIlp, 1);
    let (uniform, _diag) = run(&pool, &config).unwrap();
    for i in 0..4 {
        assert!((uniform.marginal(i) - 0.5).abs() < 0.05);
    }
    for panel in &uniform.panels {
        assert!(panel.check_feasible(&pool, 2));
    }
}

/// Scenario 2: same setup with M=10. ILP rounding returns integer
/// multiplicities summing to 10, preserving 0.5 marginals.
#[test]
fn scenario_2_ilp_rounding_preserves_marginals_at_m10() {
    let pool = symmetric_color_pool();
    let config = RunConfig::new(2, 10, Objective::Maximin, Rounder::OptIlp, 1);
    let (uniform, _diag) = run(&pool, &config).unwrap();
    assert_eq!(uniform.total_multiplicity(), 10);
    for i in 0..4 {
        assert!((uniform.marginal(i) - 0.5).abs() < 1e-9);
    }
}

/// Scenario 3: n=3, k=2, unconstrained quotas. Nash should return marginals
/// (2/3, 2/3, 2/3).
#[test]
fn scenario_3_nash_unconstrained_triple() {
    let feature = Feature {
        name: "group".into(),
        quotas: BTreeMap::from([("only".to_string(), Quota::new(0, 3))]),
    };
    let respondents = vec![
        Respondent {
            id: RespondentId("1".into()),
            values: BTreeMap::from([("group".to_string(), "only".to_string())]),
        },
        Respondent {
            id: RespondentId("2".into()),
            values: BTreeMap::from([("group".to_string(), "only".to_string())]),
        },
        Respondent {
            id: RespondentId("3".into()),
            values: BTreeMap::from([("group".to_string(), "only".to_string())]),
        },
    ];
    let pool = Pool::new(respondents, vec![feature]).unwrap();
    let config = RunConfig::new(2, 1000, Objective::Nash, Rounder::OptIlp, 1);
    let (uniform, _diag) = run(&pool, &config).unwrap();
    for i in 0..3 {
        assert!((uniform.marginal(i) - 2.0 / 3.0).abs() < 0.05);
    }
}

/// Scenario 4: n=2, k=3 is infeasible; the oracle reports it at init, before
/// any solver or rounder runs.
#[test]
fn scenario_4_infeasible_panel_size() {
    let feature = Feature {
        name: "color".into(),
        quotas: BTreeMap::from([("red".to_string(), Quota::new(0, 2))]),
    };
    let respondents = vec![respondent("1", "red"), respondent("2", "red")];
    let pool = Pool::new(respondents, vec![feature]).unwrap();
    let config = RunConfig::new(3, 10, Objective::Maximin, Rounder::OptIlp, 1);
    let err = run(&pool, &config).unwrap_err();
    assert!(matches!(err, sortition_core::Error::InfeasibleQuotas { n: 2, k: 3 }));
}

/// Scenario 5: pipage on an already-integral target leaves it unchanged.
#[test]
fn scenario_5_pipage_idempotent_on_integral_input() {
    use sortition_core::panel::{Distribution, Panel};
    use sortition_core::rounding::pipage;

    let panels = vec![
        Panel::from_members(vec![0]),
        Panel::from_members(vec![1]),
        Panel::from_members(vec![2]),
    ];
    let input = Distribution::new(panels.clone(), vec![0.3, 0.3, 0.4]);
    let rounded = pipage::round(&panels, &input, 10, 99);
    assert_eq!(rounded.total_multiplicity(), 10);
    let mults: Vec<u64> = panels
        .iter()
        .map(|p| {
            rounded
                .panels
                .iter()
                .zip(&rounded.multiplicities)
                .find(|(rp, _)| *rp == p)
                .map(|(_, &m)| m)
                .unwrap_or(0)
        })
        .collect();
    assert_eq!(mults, vec![3, 3, 4]);
}

/// Scenario 6: Beck–Fiala on M·λ=(1.5,1.5,1.0,1.0), k=2 — every marginal
/// moves by at most 2/M.
#[test]
fn scenario_6_beck_fiala_within_k_over_m_slack() {
    use sortition_core::panel::{Distribution, Panel};
    use sortition_core::rounding::beck_fiala;

    let panels = vec![
        Panel::from_members(vec![0, 1]),
        Panel::from_members(vec![2, 3]),
        Panel::from_members(vec![0, 2]),
        Panel::from_members(vec![1, 3]),
    ];
    let m = 10u64;
    // M*lambda = (1.5, 1.5, 1.0, 1.0) induced by lambda = (0.075, 0.075, 0.05, 0.05)... normalized below.
    let weights = vec![0.3, 0.3, 0.2, 0.2];
    let input = Distribution::new(panels.clone(), weights);
    let k = 2usize;
    let rounded = beck_fiala::round(&panels, &input, k, m).unwrap();
    for i in 0..4 {
        let before = input.marginal(i);
        let after = rounded.marginal(i);
        assert!((before - after).abs() <= k as f64 / m as f64 + 1e-6);
    }
}

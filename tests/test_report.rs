use std::path::PathBuf;
use std::time::Duration;

use darwinian::error::AggregationInvariantViolation;
use darwinian::mutants::{Location, MutantId, MutantOutcome, MutantStatus, MutationPoint};
use darwinian::report::{Aggregator, MutationReport, ScoringPolicy};

fn outcome(id: MutantId, operator: &str, status: MutantStatus) -> MutantOutcome {
    MutantOutcome {
        id,
        point: MutationPoint {
            operator: operator.to_string(),
            file: PathBuf::from("app.py"),
            location: Location {
                line: id + 1,
                column: 5,
                start_byte: id * 10,
                end_byte: id * 10 + 1,
            },
            original: "<".to_string(),
            mutated: "<=".to_string(),
            context_before: vec![],
            context_after: vec![],
        },
        status,
        duration: Duration::from_millis(10),
        attempts: 1,
        diff: "- a < b\n+ a <= b\n".to_string(),
        detail: None,
    }
}

fn aggregate(outcomes: Vec<MutantOutcome>, policy: ScoringPolicy) -> MutationReport {
    let ids: Vec<_> = outcomes.iter().map(|o| o.id).collect();
    let mut agg = Aggregator::new(ids, policy);
    for o in outcomes {
        agg.record(o).unwrap();
    }
    agg.finish().unwrap()
}

#[test]
fn score_is_killed_over_killed_plus_survived() {
    let report = aggregate(
        vec![
            outcome(0, "relational_boundary", MutantStatus::Killed),
            outcome(1, "relational_boundary", MutantStatus::Killed),
            outcome(2, "relational_boundary", MutantStatus::Killed),
            outcome(3, "arithmetic", MutantStatus::Survived),
            outcome(4, "arithmetic", MutantStatus::Stillborn),
            outcome(5, "arithmetic", MutantStatus::Errored),
        ],
        ScoringPolicy::default(),
    );
    assert_eq!(report.score, Some(0.75));
    assert_eq!(report.counts.total(), 6);
    assert_eq!(report.counts.stillborn, 1);
    assert_eq!(report.counts.errored, 1);
}

#[test]
fn all_stillborn_has_no_score() {
    let report = aggregate(
        vec![
            outcome(0, "bool_flip", MutantStatus::Stillborn),
            outcome(1, "bool_flip", MutantStatus::Stillborn),
        ],
        ScoringPolicy::default(),
    );
    assert_eq!(report.score, None);
    assert!(!report.operators[0].weak);
}

#[test]
fn timeouts_scored_as_detected_when_enabled() {
    let outcomes = || {
        vec![
            outcome(0, "arithmetic", MutantStatus::Survived),
            outcome(1, "arithmetic", MutantStatus::TimedOut),
        ]
    };
    assert_eq!(aggregate(outcomes(), ScoringPolicy::default()).score, Some(0.0));
    let included = ScoringPolicy {
        include_timeouts: true,
        ..Default::default()
    };
    assert_eq!(aggregate(outcomes(), included).score, Some(0.5));
}

#[test]
fn arrival_order_does_not_matter() {
    let statuses = [
        MutantStatus::Killed,
        MutantStatus::Survived,
        MutantStatus::TimedOut,
        MutantStatus::Killed,
        MutantStatus::Skipped,
    ];
    let forward: Vec<_> = statuses
        .iter()
        .enumerate()
        .map(|(id, s)| outcome(id, "logical_flip", *s))
        .collect();
    let mut backward = forward.clone();
    backward.reverse();

    assert_eq!(
        aggregate(forward, ScoringPolicy::default()),
        aggregate(backward, ScoringPolicy::default())
    );
}

#[test]
fn mutants_are_ordered_by_id() {
    let report = aggregate(
        vec![
            outcome(2, "arithmetic", MutantStatus::Killed),
            outcome(0, "arithmetic", MutantStatus::Killed),
            outcome(1, "arithmetic", MutantStatus::Survived),
        ],
        ScoringPolicy::default(),
    );
    let ids: Vec<_> = report.mutants.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    assert_eq!(report.find("@m1").map(|m| m.status), Some(MutantStatus::Survived));
    assert_eq!(report.find("m2").map(|m| m.status), Some(MutantStatus::Killed));
    assert!(report.find("m9").is_none());
}

#[test]
fn operator_breakdown_follows_catalog_order() {
    let report = aggregate(
        vec![
            outcome(0, "call_statement_removal", MutantStatus::Killed),
            outcome(1, "relational_boundary", MutantStatus::Survived),
            outcome(2, "arithmetic", MutantStatus::Killed),
        ],
        ScoringPolicy::default(),
    );
    let ops: Vec<_> = report.operators.iter().map(|o| o.operator.as_str()).collect();
    assert_eq!(ops, vec!["relational_boundary", "arithmetic", "call_statement_removal"]);

    let mut merged = report.operators[0].counts;
    for o in &report.operators[1..] {
        merged.merge(&o.counts);
    }
    assert_eq!(merged, report.counts);
}

#[test]
fn operator_above_threshold_is_weak() {
    let report = aggregate(
        vec![
            outcome(0, "bool_flip", MutantStatus::Survived),
            outcome(1, "bool_flip", MutantStatus::Survived),
            outcome(2, "bool_flip", MutantStatus::Killed),
            outcome(3, "arithmetic", MutantStatus::Survived),
            outcome(4, "arithmetic", MutantStatus::Killed),
        ],
        ScoringPolicy::default(),
    );
    let weak: Vec<_> = report.weak_operators().map(|o| o.operator.as_str()).collect();
    // 2/3 survived is weak; exactly 1/2 is not.
    assert_eq!(weak, vec!["bool_flip"]);
}

#[test]
fn duplicate_status_is_rejected() {
    let mut agg = Aggregator::new([0, 1], ScoringPolicy::default());
    agg.record(outcome(0, "arithmetic", MutantStatus::Killed)).unwrap();
    let err = agg
        .record(outcome(0, "arithmetic", MutantStatus::Survived))
        .unwrap_err();
    assert_eq!(
        err,
        AggregationInvariantViolation::DuplicateStatus {
            id: 0,
            first: MutantStatus::Killed,
            second: MutantStatus::Survived,
        }
    );
    assert_eq!(agg.recorded(), 1);
}

#[test]
fn unknown_mutant_is_rejected() {
    let mut agg = Aggregator::new([0], ScoringPolicy::default());
    let err = agg.record(outcome(7, "arithmetic", MutantStatus::Killed)).unwrap_err();
    assert_eq!(err, AggregationInvariantViolation::UnknownMutant(7));
}

#[test]
fn non_terminal_status_is_rejected() {
    let mut agg = Aggregator::new([0], ScoringPolicy::default());
    let err = agg.record(outcome(0, "arithmetic", MutantStatus::Running)).unwrap_err();
    assert!(matches!(err, AggregationInvariantViolation::NonTerminal { id: 0, .. }));
}

#[test]
fn missing_status_fails_finish() {
    let mut agg = Aggregator::new([0, 1, 2], ScoringPolicy::default());
    agg.record(outcome(0, "arithmetic", MutantStatus::Killed)).unwrap();
    agg.record(outcome(2, "arithmetic", MutantStatus::Killed)).unwrap();
    assert_eq!(agg.finish().unwrap_err(), AggregationInvariantViolation::MissingStatus(1));
}

#[test]
fn empty_plan_produces_empty_report() {
    let report = Aggregator::new([], ScoringPolicy::default()).finish().unwrap();
    assert!(report.mutants.is_empty());
    assert_eq!(report.score, None);
    assert!(report.operators.is_empty());
}

#[test]
fn totals_cover_every_status() {
    let report = aggregate(
        vec![
            outcome(0, "relational_boundary", MutantStatus::Killed),
            outcome(1, "relational_boundary", MutantStatus::Skipped),
            outcome(2, "arithmetic", MutantStatus::Survived),
            outcome(3, "arithmetic", MutantStatus::Stillborn),
            outcome(4, "arithmetic", MutantStatus::TimedOut),
        ],
        ScoringPolicy::default(),
    );
    assert_eq!(report.total, 5);
    assert_eq!(report.total, report.counts.total());
    let totals: Vec<_> = report.operators.iter().map(|o| (o.operator.as_str(), o.total)).collect();
    assert_eq!(totals, vec![("relational_boundary", 2), ("arithmetic", 3)]);
}

#[test]
fn survivors_listed_with_location_and_diff() {
    let report = aggregate(
        vec![
            outcome(3, "arithmetic", MutantStatus::Survived),
            outcome(0, "relational_boundary", MutantStatus::Killed),
            outcome(1, "relational_boundary", MutantStatus::Survived),
        ],
        ScoringPolicy::default(),
    );
    let ids: Vec<_> = report.survivors.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1, 3]);

    let first = &report.survivors[0];
    assert_eq!(first.ref_id, "m1");
    assert_eq!(first.file, PathBuf::from("app.py"));
    assert_eq!(first.line, 2);
    assert_eq!(first.operator, "relational_boundary");
    assert_eq!(first.diff, "- a < b\n+ a <= b\n");

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["total"], 3);
    assert_eq!(json["survivors"][1]["operator"], "arithmetic");
    assert_eq!(json["operators"][0]["total"], 2);
}

#[test]
fn no_survivors_is_an_empty_list() {
    let report = aggregate(
        vec![outcome(0, "bool_flip", MutantStatus::Killed)],
        ScoringPolicy::default(),
    );
    assert!(report.survivors.is_empty());
    assert_eq!(report.total, 1);
}

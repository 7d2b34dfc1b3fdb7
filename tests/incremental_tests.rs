//! End-to-end tests for incremental (delta-maintenance) translation.

use datalog_ast::builders::{AtomBuilder, ClauseBuilder};
use datalog_ast::{Attribute, Program, Relation};
use deltalog::ram::{RamCondition, RamExpression, RamOperation, RamProgram, RamStatement};
use deltalog::translator::naming;
use deltalog::{translate_unit, AstTranslationUnit, Config};

fn walk<'a>(stmt: &'a RamStatement, visit: &mut dyn FnMut(&'a RamStatement)) {
    visit(stmt);
    for child in stmt.children() {
        walk(child, visit);
    }
}

fn statements(program: &RamProgram) -> Vec<&RamStatement> {
    let mut out = Vec::new();
    walk(program.main(), &mut |stmt| out.push(stmt));
    out
}

fn walk_op<'a>(op: &'a RamOperation, visit: &mut dyn FnMut(&'a RamOperation)) {
    visit(op);
    match op {
        RamOperation::Scan { body, .. }
        | RamOperation::UnpackRecord { body, .. }
        | RamOperation::Filter { body, .. }
        | RamOperation::Break { body, .. }
        | RamOperation::Aggregate { body, .. } => walk_op(body, visit),
        _ => {}
    }
}

fn operations(program: &RamProgram) -> Vec<&RamOperation> {
    let mut out = Vec::new();
    for stmt in statements(program) {
        if let RamStatement::Query(op) = stmt {
            walk_op(op, &mut |op| out.push(op));
        }
    }
    out
}

fn number_attributes(names: &[&str]) -> Vec<Attribute> {
    names
        .iter()
        .map(|name| Attribute::new(*name, "number"))
        .collect()
}

fn copy_program() -> Program {
    let mut program = Program::new();
    let mut q = Relation::new("q", number_attributes(&["x"]));
    q.is_input = true;
    program.add_relation(q);
    let mut p = Relation::new("p", number_attributes(&["x"]));
    p.is_output = true;
    p.add_clause(
        ClauseBuilder::new(AtomBuilder::new("p").var("x").build())
            .atom(AtomBuilder::new("q").var("x").build())
            .build(),
    );
    program.add_relation(p);
    program
}

fn tc_program() -> Program {
    let mut program = Program::new();
    let mut e = Relation::new("e", number_attributes(&["x", "y"]));
    e.is_input = true;
    program.add_relation(e);
    let mut tc = Relation::new("tc", number_attributes(&["x", "y"]));
    tc.is_output = true;
    tc.add_clause(
        ClauseBuilder::new(AtomBuilder::new("tc").var("x").var("y").build())
            .atom(AtomBuilder::new("e").var("x").var("y").build())
            .build(),
    );
    tc.add_clause(
        ClauseBuilder::new(AtomBuilder::new("tc").var("x").var("y").build())
            .atom(AtomBuilder::new("e").var("x").var("z").build())
            .atom(AtomBuilder::new("tc").var("z").var("y").build())
            .build(),
    );
    program.add_relation(tc);
    program
}

fn translate(program: Program) -> RamProgram {
    let _ = env_logger::builder().is_test(true).try_init();
    translate_unit(&AstTranslationUnit::new(program), &Config::incremental())
        .expect("translation succeeds")
        .program
}

/// The scan relations feeding a projection into `target`.
fn scans_projecting_into(program: &RamProgram, target: &str) -> Vec<String> {
    let mut out = Vec::new();
    for stmt in statements(program) {
        let RamStatement::Query(op) = stmt else { continue };
        let mut projects = false;
        walk_op(op, &mut |op| {
            if matches!(op, RamOperation::Project { relation, .. } if relation == target) {
                projects = true;
            }
        });
        if projects {
            walk_op(op, &mut |op| {
                if let RamOperation::Scan { relation, .. } = op {
                    out.push(relation.clone());
                }
            });
        }
    }
    out
}

// ----------------------------------------------------------------------
// Seed scenario 2: non-recursive copy rule
// ----------------------------------------------------------------------

#[test]
fn base_relations_gain_annotation_columns() {
    let ram = translate(copy_program());
    for name in ["q", "p"] {
        let relation = ram.relation(name).expect("registered");
        assert_eq!(relation.arity, 4);
        assert_eq!(
            relation.attribute_names[1..],
            [
                "@iteration".to_string(),
                "@prev_count".to_string(),
                "@current_count".to_string()
            ]
        );
    }
}

#[test]
fn variants_share_schema_with_base() {
    let ram = translate(copy_program());
    let base = ram.relation("q").unwrap().clone();
    for relation in ram.relations() {
        if naming::base_name(&relation.name) == "q" {
            assert_eq!(relation.arity, base.arity, "variant {}", relation.name);
            assert_eq!(
                relation.attribute_names, base.attribute_names,
                "variant {}",
                relation.name
            );
        }
    }
}

#[test]
fn insertion_rule_pivots_on_diff_plus_count() {
    let ram = translate(copy_program());
    let scans = scans_projecting_into(&ram, "diff_plus@_p");
    assert!(
        scans.contains(&"diff_plus_count@_q".to_string()),
        "scans were {:?}",
        scans
    );
}

#[test]
fn deletion_rule_pivots_on_diff_minus_count() {
    let ram = translate(copy_program());
    let scans = scans_projecting_into(&ram, "diff_minus@_p");
    assert!(
        scans.contains(&"diff_minus_count@_q".to_string()),
        "scans were {:?}",
        scans
    );
}

#[test]
fn inputs_load_into_diff_plus() {
    let ram = translate(copy_program());
    assert!(statements(&ram).iter().any(|stmt| matches!(
        stmt,
        RamStatement::Load { relation, .. } if relation == "diff_plus@_q"
    )));
}

#[test]
fn applied_variants_are_seeded_from_base_and_diffs() {
    let ram = translate(copy_program());
    let merges: Vec<(&str, &str)> = statements(&ram)
        .iter()
        .filter_map(|stmt| match stmt {
            RamStatement::Merge { target, source } => Some((target.as_str(), source.as_str())),
            _ => None,
        })
        .collect();
    assert!(merges.contains(&("diff_applied@_q", "q")));
    assert!(merges.contains(&("diff_applied@_q", "diff_plus@_q")));
    assert!(merges.contains(&("diff_applied@_q", "diff_minus@_q")));
}

#[test]
fn cleanup_subroutine_settles_counts() {
    let ram = translate(copy_program());
    let cleanup = ram
        .subroutine("incremental_cleanup")
        .expect("cleanup subroutine");

    // Diffs fold back into the base relations.
    let mut merges = Vec::new();
    walk(cleanup, &mut |stmt| {
        if let RamStatement::Merge { target, source } = stmt {
            merges.push((target.clone(), source.clone()));
        }
    });
    assert!(merges.contains(&("p".to_string(), "diff_plus@_p".to_string())));
    assert!(merges.contains(&("p".to_string(), "diff_minus@_p".to_string())));

    // Every surviving row is stamped with the settled sentinel.
    let mut sentinel_projects = 0;
    walk(cleanup, &mut |stmt| {
        if let RamStatement::Query(op) = stmt {
            walk_op(op, &mut |op| {
                if let RamOperation::Project { values, .. } = op {
                    let n = values.len();
                    if values[n - 2..] == [RamExpression::Number(-1), RamExpression::Number(-1)] {
                        sentinel_projects += 1;
                    }
                }
            });
        }
    });
    assert_eq!(sentinel_projects, 2, "one sentinel scan per relation");
}

#[test]
fn outputs_store_after_cleanup_exit() {
    let ram = translate(copy_program());
    let stmts = statements(&ram);
    let cleanup_pos = stmts
        .iter()
        .position(|stmt| {
            matches!(
                stmt,
                RamStatement::Exit {
                    condition: RamCondition::SubroutineCondition { name, .. },
                    exitable: false,
                } if name == "incremental_cleanup"
            )
        })
        .expect("cleanup invocation");
    let store_pos = stmts
        .iter()
        .position(|stmt| matches!(stmt, RamStatement::Store { relation, .. } if relation == "p"))
        .expect("store of p");
    assert!(cleanup_pos < store_pos, "stores must follow cleanup");
}

// ----------------------------------------------------------------------
// Seed scenario 4: recursive transitive closure
// ----------------------------------------------------------------------

#[test]
fn recursive_insertions_pivot_on_delta_diff_plus_count() {
    let ram = translate(tc_program());
    let scans = scans_projecting_into(&ram, "@new_diff_plus@_tc");
    assert!(
        scans.contains(&"@delta_diff_plus_count@_tc".to_string()),
        "scans were {:?}",
        scans
    );
}

#[test]
fn recursive_deletions_pivot_on_delta_diff_minus_count() {
    let ram = translate(tc_program());
    let scans = scans_projecting_into(&ram, "@new_diff_minus@_tc");
    assert!(
        scans.contains(&"@delta_diff_minus_count@_tc".to_string()),
        "scans were {:?}",
        scans
    );
}

#[test]
fn rederivation_probes_deleted_heads_first() {
    let ram = translate(tc_program());
    // The re-derivation versions scan the deleted-head probe at the
    // outermost level.
    assert!(operations(&ram).iter().any(|op| matches!(
        op,
        RamOperation::Scan {
            relation,
            level: 0,
            ..
        } if relation == "diff_minus_count@_tc"
    )));
    // And pivot the body through the applied delta.
    let scans = scans_projecting_into(&ram, "@new_diff_plus@_tc");
    assert!(scans.contains(&"@delta_diff_applied@_tc".to_string()));
}

#[test]
fn exit_is_gated_by_the_scc_exit_subroutine() {
    let ram = translate(tc_program());

    let exit = statements(&ram)
        .into_iter()
        .find_map(|stmt| match stmt {
            RamStatement::Exit {
                condition,
                exitable: true,
            } => Some(condition),
            _ => None,
        })
        .expect("loop exit");

    let mut has_subroutine_gate = false;
    let mut emptiness = Vec::new();
    fn conditions<'a>(cond: &'a RamCondition, visit: &mut dyn FnMut(&'a RamCondition)) {
        visit(cond);
        if let RamCondition::Conjunction(lhs, rhs) = cond {
            conditions(lhs, visit);
            conditions(rhs, visit);
        }
    }
    conditions(exit, &mut |cond| match cond {
        RamCondition::SubroutineCondition { name, .. } if name == "scc_1_exit" => {
            has_subroutine_gate = true;
        }
        RamCondition::EmptinessCheck { relation } => emptiness.push(relation.clone()),
        _ => {}
    });
    assert!(has_subroutine_gate);
    assert!(emptiness.contains(&"@new_diff_plus@_tc".to_string()));
    assert!(emptiness.contains(&"@new_diff_minus@_tc".to_string()));

    assert!(ram.subroutine("scc_1_exit").is_some());
}

#[test]
fn max_iteration_singleton_is_created_and_aggregated() {
    let ram = translate(tc_program());
    let max_iter = ram.relation("scc_1_@max_iter").expect("max-iter relation");
    assert_eq!(max_iter.arity, 1);
    assert_eq!(max_iter.attribute_names, vec!["max_iter".to_string()]);

    // Populated by a MAX aggregate over the iteration column (index 2 of
    // the 5-column annotated schema).
    assert!(operations(&ram).iter().any(|op| matches!(
        op,
        RamOperation::Aggregate {
            function: deltalog::ram::AggregateFunction::Max,
            relation,
            expression: RamExpression::TupleElement { column: 2, .. },
            ..
        } if relation == "tc"
    )));
}

#[test]
fn iteration_boundary_schedule_merges_new_diffs() {
    let ram = translate(tc_program());
    let stmts = statements(&ram);

    let merges: Vec<(&str, &str)> = stmts
        .iter()
        .filter_map(|stmt| match stmt {
            RamStatement::Merge { target, source } => Some((target.as_str(), source.as_str())),
            _ => None,
        })
        .collect();
    assert!(merges.contains(&("diff_minus@_tc", "@new_diff_minus@_tc")));
    assert!(merges.contains(&("diff_plus@_tc", "@new_diff_plus@_tc")));
    assert!(merges.contains(&("diff_applied@_tc", "@new_diff_plus@_tc")));

    // SemiMerge refreshes the count variants for re-derived rows.
    assert!(stmts.iter().any(|stmt| matches!(
        stmt,
        RamStatement::SemiMerge {
            target,
            source,
            restriction: Some(restriction),
        } if target == "diff_plus_count@_tc"
            && source == "@delta_tc"
            && restriction == "@new_diff_plus@_tc"
    )));

    // The per-iteration deltas are cleared before the exit check.
    let clears: Vec<&str> = stmts
        .iter()
        .filter_map(|stmt| match stmt {
            RamStatement::Clear { relation } => Some(relation.as_str()),
            _ => None,
        })
        .collect();
    for relation in [
        "@delta_tc",
        "@delta_diff_applied@_tc",
        "@temp_delta_diff_applied@_tc",
        "@delta_diff_minus_applied@_tc",
        "@delta_diff_minus_count@_tc",
        "@delta_diff_plus_count@_tc",
    ] {
        assert!(clears.contains(&relation), "missing clear of {}", relation);
    }
}

#[test]
fn postamble_drops_scc_scoped_variants() {
    let ram = translate(tc_program());
    let drops: Vec<&str> = statements(&ram)
        .iter()
        .filter_map(|stmt| match stmt {
            RamStatement::Drop { relation } => Some(relation.as_str()),
            _ => None,
        })
        .collect();
    for relation in [
        "@delta_tc",
        "@new_tc",
        "@previous_indexed_tc",
        "@delta_diff_applied@_tc",
        "@new_diff_plus@_tc",
        "@new_diff_minus@_tc",
    ] {
        assert!(drops.contains(&relation), "missing drop of {}", relation);
    }
    // Stable diff variants survive the SCC for the next epoch.
    assert!(!drops.contains(&"diff_plus@_tc"));
    assert!(!drops.contains(&"diff_applied@_tc"));
}

#[test]
fn loop_iteration_bound_simulates_delta_for_later_atoms() {
    // Two same-SCC body atoms: the version pivoting the first one must
    // bound the second one's iteration column to past iterations.
    let mut program = Program::new();
    let mut e = Relation::new("e", number_attributes(&["x", "y"]));
    e.is_input = true;
    program.add_relation(e);
    let mut tc = Relation::new("tc", number_attributes(&["x", "y"]));
    tc.is_output = true;
    tc.add_clause(
        ClauseBuilder::new(AtomBuilder::new("tc").var("x").var("y").build())
            .atom(AtomBuilder::new("e").var("x").var("y").build())
            .build(),
    );
    tc.add_clause(
        ClauseBuilder::new(AtomBuilder::new("tc").var("x").var("y").build())
            .atom(AtomBuilder::new("tc").var("x").var("z").build())
            .atom(AtomBuilder::new("tc").var("z").var("y").build())
            .build(),
    );
    program.add_relation(tc);

    let ram = translate(program);
    let found = operations(&ram).iter().any(|op| {
        matches!(
            op,
            RamOperation::Filter {
                condition: RamCondition::Constraint {
                    op: datalog_ast::BinaryConstraintOp::Lt,
                    rhs: RamExpression::IntrinsicOp { .. },
                    ..
                },
                ..
            }
        )
    });
    assert!(found, "expected an iteration-bound filter");
}

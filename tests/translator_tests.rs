//! End-to-end translation tests for the classic (non-incremental) paths.

use datalog_ast::builders::{AtomBuilder, ClauseBuilder};
use datalog_ast::{
    AggregateOp, Aggregator, Argument, Attribute, Clause, ExecutionPlan, Literal, Program, Relation,
};
use deltalog::ram::{RamCondition, RamExpression, RamOperation, RamProgram, RamStatement};
use deltalog::{translate_unit, AstTranslationUnit, Config, TranslatorError};

// ----------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------

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

/// `p(x) :- q(x).` with `q` input and `p` output.
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

/// Transitive closure with `e` input and `tc` output.
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

fn translate(program: Program, config: Config) -> RamProgram {
    let _ = env_logger::builder().is_test(true).try_init();
    translate_unit(&AstTranslationUnit::new(program), &config)
        .expect("translation succeeds")
        .program
}

// ----------------------------------------------------------------------
// Copy rule (seed scenario 1)
// ----------------------------------------------------------------------

#[test]
fn copy_rule_compiles_to_scan_and_project() {
    let ram = translate(copy_program(), Config::default());

    let scan = operations(&ram)
        .into_iter()
        .find_map(|op| match op {
            RamOperation::Scan {
                relation,
                level,
                body,
                ..
            } if relation == "q" => Some((*level, body.as_ref())),
            _ => None,
        })
        .expect("scan of q");
    assert_eq!(scan.0, 0);

    // Innermost operation projects q's first column into p.
    let mut found_project = false;
    walk_op(scan.1, &mut |op| {
        if let RamOperation::Project { relation, values } = op {
            assert_eq!(relation, "p");
            assert_eq!(
                values,
                &vec![RamExpression::TupleElement { level: 0, column: 0 }]
            );
            found_project = true;
        }
    });
    assert!(found_project);
}

#[test]
fn copy_rule_stratum_contains_lifecycle_statements() {
    let ram = translate(copy_program(), Config::default());
    let stmts = statements(&ram);

    let creates: Vec<&str> = stmts
        .iter()
        .filter_map(|stmt| match stmt {
            RamStatement::Create { relation } => Some(relation.as_str()),
            _ => None,
        })
        .collect();
    assert!(creates.contains(&"p"));
    assert!(creates.contains(&"q"));

    assert!(stmts.iter().any(
        |stmt| matches!(stmt, RamStatement::Load { relation, .. } if relation == "q")
    ));
    assert!(stmts.iter().any(
        |stmt| matches!(stmt, RamStatement::Store { relation, .. } if relation == "p")
    ));

    let drops: Vec<&str> = stmts
        .iter()
        .filter_map(|stmt| match stmt {
            RamStatement::Drop { relation } => Some(relation.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(drops, vec!["p", "q"]);
}

#[test]
fn load_directives_resolve_against_fact_dir() {
    let mut config = Config::default();
    config.fact_dir = "/facts".to_string();
    let ram = translate(copy_program(), config);

    let directives = statements(&ram)
        .into_iter()
        .find_map(|stmt| match stmt {
            RamStatement::Load {
                relation,
                directives,
            } if relation == "q" => Some(directives.clone()),
            _ => None,
        })
        .expect("load of q");
    assert_eq!(directives[0].get("IO"), Some("file"));
    assert_eq!(directives[0].file_name(), Some("/facts/q.facts"));
}

// ----------------------------------------------------------------------
// Transitive closure (seed scenario 3)
// ----------------------------------------------------------------------

#[test]
fn tc_fixpoint_scans_delta_and_exits_on_empty_new() {
    let ram = translate(tc_program(), Config::default());

    // Preamble merges the seeded relation into the delta.
    assert!(statements(&ram).iter().any(|stmt| matches!(
        stmt,
        RamStatement::Merge { target, source } if target == "@delta_tc" && source == "tc"
    )));

    // The recursive version pivots on the delta relation.
    assert!(operations(&ram).iter().any(|op| matches!(
        op,
        RamOperation::Scan { relation, .. } if relation == "@delta_tc"
    )));

    // Exit fires once nothing new is derived.
    let exit = statements(&ram)
        .into_iter()
        .find_map(|stmt| match stmt {
            RamStatement::Exit { condition, .. } => Some(condition),
            _ => None,
        })
        .expect("loop exit");
    assert_eq!(
        exit,
        &RamCondition::EmptinessCheck {
            relation: "@new_tc".to_string()
        }
    );

    // Postamble drops the fixpoint scratch relations.
    let drops: Vec<&str> = statements(&ram)
        .iter()
        .filter_map(|stmt| match stmt {
            RamStatement::Drop { relation } => Some(relation.as_str()),
            _ => None,
        })
        .collect();
    assert!(drops.contains(&"@delta_tc"));
    assert!(drops.contains(&"@new_tc"));
}

#[test]
fn tc_loop_body_is_parallel_and_negates_rederivation() {
    let ram = translate(tc_program(), Config::default());

    let parallel = statements(&ram)
        .into_iter()
        .find(|stmt| matches!(stmt, RamStatement::Parallel(_)))
        .expect("parallel loop body");
    let RamStatement::Parallel(children) = parallel else {
        unreachable!()
    };
    assert_eq!(children.len(), 1);

    // The delta version re-derives into @new_tc and filters out known
    // tuples.
    assert!(operations(&ram).iter().any(|op| matches!(
        op,
        RamOperation::Project { relation, .. } if relation == "@new_tc"
    )));
    assert!(operations(&ram).iter().any(|op| matches!(
        op,
        RamOperation::Filter {
            condition: RamCondition::Negation(inner),
            ..
        } if matches!(
            inner.as_ref(),
            RamCondition::ExistenceCheck { relation, .. } if relation == "tc"
        )
    )));
}

// ----------------------------------------------------------------------
// Aggregates (seed scenario 5)
// ----------------------------------------------------------------------

#[test]
fn count_aggregate_wraps_body_and_feeds_head() {
    let mut program = Program::new();
    let mut s = Relation::new("s", number_attributes(&["x", "y"]));
    s.is_input = true;
    program.add_relation(s);
    let mut t = Relation::new("t", number_attributes(&["x", "y"]));
    t.is_input = true;
    program.add_relation(t);

    let aggregator = Aggregator {
        op: AggregateOp::Count,
        target: None,
        body: vec![Literal::Atom(AtomBuilder::new("t").var("x").unnamed().build())],
    };
    let mut r = Relation::new("r", number_attributes(&["x", "n"]));
    r.is_output = true;
    r.add_clause(
        ClauseBuilder::new(
            AtomBuilder::new("r")
                .var("x")
                .arg(Argument::Aggregator(aggregator))
                .build(),
        )
        .atom(AtomBuilder::new("s").var("x").unnamed().build())
        .build(),
    );
    program.add_relation(r);

    let ram = translate(program, Config::default());

    // Levels: s at 0, aggregator at 1.
    let aggregate_level = operations(&ram)
        .into_iter()
        .find_map(|op| match op {
            RamOperation::Aggregate {
                function: deltalog::ram::AggregateFunction::Count,
                relation,
                level,
                ..
            } if relation == "t" => Some(*level),
            _ => None,
        })
        .expect("count aggregate over t");
    assert_eq!(aggregate_level, 1);

    let project = operations(&ram)
        .into_iter()
        .find_map(|op| match op {
            RamOperation::Project { relation, values } if relation == "r" => Some(values.clone()),
            _ => None,
        })
        .expect("projection into r");
    assert_eq!(
        project[1],
        RamExpression::TupleElement {
            level: aggregate_level,
            column: 0
        }
    );
}

// ----------------------------------------------------------------------
// Nullary heads (seed scenario 6)
// ----------------------------------------------------------------------

#[test]
fn nullary_head_guards_against_rederivation() {
    let mut program = Program::new();
    let mut ready = Relation::new("ready", Vec::new());
    ready.is_input = true;
    program.add_relation(ready);
    let mut done = Relation::new("done", Vec::new());
    done.is_output = true;
    done.add_clause(
        ClauseBuilder::new(AtomBuilder::new("done").build())
            .atom(AtomBuilder::new("ready").build())
            .build(),
    );
    program.add_relation(done);

    let ram = translate(program, Config::default());

    let query = statements(&ram)
        .into_iter()
        .find_map(|stmt| match stmt {
            RamStatement::Query(op) if matches!(op, RamOperation::Filter { .. }) => Some(op),
            _ => None,
        })
        .expect("compiled rule");

    // Outermost: only derive when done is still empty.
    let RamOperation::Filter { condition, body } = query else {
        panic!("expected filter, got {:?}", query);
    };
    assert_eq!(
        condition,
        &RamCondition::EmptinessCheck {
            relation: "done".to_string()
        }
    );

    // ready must be non-empty, and the innermost projection emits the
    // empty tuple.
    let RamOperation::Filter { condition, body } = body.as_ref() else {
        panic!("expected inner filter");
    };
    assert_eq!(
        condition,
        &RamCondition::Negation(Box::new(RamCondition::EmptinessCheck {
            relation: "ready".to_string()
        }))
    );
    let mut found = false;
    walk_op(body, &mut |op| {
        if let RamOperation::Project { relation, values } = op {
            assert_eq!(relation, "done");
            assert!(values.is_empty());
            found = true;
        }
    });
    assert!(found);
}

// ----------------------------------------------------------------------
// Execution plans
// ----------------------------------------------------------------------

#[test]
fn fixed_execution_plan_orders_scans() {
    let mut program = Program::new();
    for name in ["a", "b"] {
        let mut rel = Relation::new(name, number_attributes(&["x"]));
        rel.is_input = true;
        program.add_relation(rel);
    }
    let mut p = Relation::new("p", number_attributes(&["x", "y"]));
    p.is_output = true;
    let mut clause = ClauseBuilder::new(AtomBuilder::new("p").var("x").var("y").build())
        .atom(AtomBuilder::new("a").var("x").build())
        .atom(AtomBuilder::new("b").var("y").build())
        .build();
    let mut plan = ExecutionPlan::default();
    plan.orders.insert(0, vec![2, 1]);
    clause.plan = Some(plan);
    p.add_clause(clause);
    program.add_relation(p);

    let ram = translate(program, Config::default());

    // The outermost scan (level 0) follows the plan, not source order.
    let outer = operations(&ram)
        .into_iter()
        .find_map(|op| match op {
            RamOperation::Scan {
                relation, level: 0, ..
            } => Some(relation.clone()),
            _ => None,
        })
        .expect("outermost scan");
    assert_eq!(outer, "b");
}

// ----------------------------------------------------------------------
// Laws and failure modes
// ----------------------------------------------------------------------

#[test]
fn empty_program_translates_to_empty_sequence() {
    let ram = translate(Program::new(), Config::default());
    assert!(matches!(ram.main(), RamStatement::Sequence(stmts) if stmts.is_empty()));
}

#[test]
fn empty_program_with_profiling_wraps_in_log_timer() {
    let mut config = Config::default();
    config.profile = true;
    let ram = translate(Program::new(), config);
    match ram.main() {
        RamStatement::LogTimer { body, .. } => {
            assert!(matches!(body.as_ref(), RamStatement::Sequence(stmts) if stmts.is_empty()));
        }
        other => panic!("expected log timer, got {:?}", other),
    }
}

#[test]
fn non_incremental_ir_has_no_diff_variants() {
    let ram = translate(tc_program(), Config::default());
    assert!(ram.relations().all(|rel| !rel.name.contains("diff_")));
    assert!(!statements(&ram)
        .iter()
        .any(|stmt| matches!(stmt, RamStatement::SemiMerge { .. })));
}

#[test]
fn translation_is_deterministic() {
    let first = translate(tc_program(), Config::incremental());
    let second = translate(tc_program(), Config::incremental());
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn referenced_relations_are_registered_with_matching_arity() {
    let ram = translate(tc_program(), Config::incremental());
    for op in operations(&ram) {
        let (relation, width) = match op {
            RamOperation::Scan { relation, .. } => (relation, None),
            RamOperation::Project { relation, values } => (relation, Some(values.len())),
            RamOperation::Aggregate { relation, .. } => (relation, None),
            _ => continue,
        };
        let schema = ram
            .relation(relation)
            .unwrap_or_else(|| panic!("unregistered relation {}", relation));
        if let Some(width) = width {
            assert_eq!(schema.arity, width, "arity mismatch for {}", relation);
        }
    }
}

#[test]
fn ungrounded_head_variable_is_a_fatal_fault() {
    let mut program = Program::new();
    let mut q = Relation::new("q", number_attributes(&["x"]));
    q.is_input = true;
    program.add_relation(q);
    let mut p = Relation::new("p", number_attributes(&["x"]));
    p.is_output = true;
    p.add_clause(
        ClauseBuilder::new(AtomBuilder::new("p").var("lost").build())
            .atom(AtomBuilder::new("q").var("x").build())
            .build(),
    );
    program.add_relation(p);

    let result = translate_unit(&AstTranslationUnit::new(program), &Config::default());
    match result {
        Err(TranslatorError::UngroundedVariable { variable, .. }) => {
            assert_eq!(variable, "lost");
        }
        other => panic!("expected ungrounded variable fault, got {:?}", other.err()),
    }
}

#[test]
fn unknown_functor_is_a_fatal_fault() {
    let mut program = Program::new();
    let mut q = Relation::new("q", number_attributes(&["x"]));
    q.is_input = true;
    program.add_relation(q);
    let mut p = Relation::new("p", number_attributes(&["x"]));
    p.is_output = true;
    p.add_clause(
        ClauseBuilder::new(
            AtomBuilder::new("p")
                .arg(Argument::UserDefinedFunctor {
                    name: "mystery".to_string(),
                    arguments: vec![Argument::Variable("x".to_string())],
                })
                .build(),
        )
        .atom(AtomBuilder::new("q").var("x").build())
        .build(),
    );
    program.add_relation(p);

    let result = translate_unit(&AstTranslationUnit::new(program), &Config::default());
    match result {
        Err(TranslatorError::UnknownFunctor { name, .. }) => assert_eq!(name, "mystery"),
        other => panic!("expected unknown functor fault, got {:?}", other.err()),
    }
}

#[test]
fn facts_translate_to_fact_statements() {
    let mut program = Program::new();
    let mut e = Relation::new("e", number_attributes(&["x", "y"]));
    e.is_output = true;
    e.add_clause(Clause::fact(AtomBuilder::new("e").number(1).number(2).build()));
    program.add_relation(e);

    let ram = translate(program, Config::default());
    assert!(statements(&ram).iter().any(|stmt| matches!(
        stmt,
        RamStatement::Fact { relation, values }
            if relation == "e"
                && values == &vec![RamExpression::Number(1), RamExpression::Number(2)]
    )));
}

//! Incremental subroutines.
//!
//! Two subroutine families support incremental evaluation: the global
//! cleanup run after output, and the per-SCC exit condition consulting the
//! previous epoch's maximum iteration.

use super::naming::RelationVariant;
use super::AstTranslator;
use crate::ram::{RamCondition, RamExpression, RamOperation, RamStatement};
use datalog_ast::BinaryConstraintOp;

impl AstTranslator<'_> {
    /// Build the `incremental_cleanup` subroutine: fold this epoch's diffs
    /// into the base relations, clear every stable variant, and stamp the
    /// sentinel `(-1, -1)` count pair on all remaining rows so the next
    /// epoch starts from a settled state.
    pub(crate) fn make_incremental_cleanup_subroutine(&mut self) -> RamStatement {
        let program = self.program;
        let mut sequence: Option<RamStatement> = None;

        for relation in &program.relations {
            let base = self.variant_name(relation, RelationVariant::Base);

            for variant in [RelationVariant::DiffMinus, RelationVariant::DiffPlus] {
                let source = self.variant_name(relation, variant);
                RamStatement::append(
                    &mut sequence,
                    RamStatement::Merge {
                        target: base.clone(),
                        source,
                    },
                );
            }

            for variant in [
                RelationVariant::DiffPlus,
                RelationVariant::DiffMinus,
                RelationVariant::DiffPlusCount,
                RelationVariant::DiffMinusCount,
                RelationVariant::DiffPlusApplied,
                RelationVariant::DiffMinusApplied,
                RelationVariant::DiffApplied,
            ] {
                let name = self.variant_name(relation, variant);
                RamStatement::append(&mut sequence, RamStatement::Clear { relation: name });
            }

            // FOR t0 in R: INSERT (t0.0, ..., t0.iteration, -1, -1)
            let mut update_tuple: Vec<RamExpression> = (0..relation.arity() - 2)
                .map(|column| RamExpression::TupleElement { level: 0, column })
                .collect();
            update_tuple.push(RamExpression::Number(-1));
            update_tuple.push(RamExpression::Number(-1));

            let project = RamOperation::Project {
                relation: base.clone(),
                values: update_tuple,
            };
            let scan = RamOperation::Scan {
                relation: base,
                level: 0,
                body: Box::new(project),
                profile_text: None,
            };
            RamStatement::append(&mut sequence, RamStatement::Query(scan));
        }

        sequence.unwrap_or(RamStatement::Sequence(Vec::new()))
    }

    /// Build a `scc_<i>_exit` subroutine:
    ///
    /// ```text
    /// FOR t0 in scc_<i>_@max_iter:
    ///   IF t0.0 >= arg(0):
    ///     RETURN 0 NOW
    /// RETURN 1
    /// ```
    ///
    /// The fixpoint must not stop before replaying every iteration the
    /// previous epoch reached, even when nothing new is derived.
    pub(crate) fn make_incremental_exit_cond_subroutine(
        &mut self,
        max_iter_relation: &str,
    ) -> RamStatement {
        let return_false = RamOperation::SubroutineReturn {
            values: vec![RamExpression::Number(0)],
            early_exit: true,
        };
        let iteration_filter = RamOperation::Filter {
            condition: RamCondition::Constraint {
                op: BinaryConstraintOp::Ge,
                lhs: RamExpression::TupleElement { level: 0, column: 0 },
                rhs: RamExpression::SubroutineArgument(0),
            },
            body: Box::new(return_false),
        };
        let scan = RamOperation::Scan {
            relation: max_iter_relation.to_string(),
            level: 0,
            body: Box::new(iteration_filter),
            profile_text: None,
        };

        let return_true = RamOperation::SubroutineReturn {
            values: vec![RamExpression::Number(1)],
            early_exit: false,
        };

        RamStatement::Sequence(vec![
            RamStatement::Query(scan),
            RamStatement::Query(return_true),
        ])
    }
}

//! Program driver.
//!
//! Walks the SCCs of the precedence graph in topological order and emits
//! one stratum per SCC:
//!
//! ```text
//! Stratum_i(
//!   Create*          relation + variants
//!   Load*            inputs (into diff_plus when incremental)
//!   [seed merges]    applied/count variants (incremental)
//!   compute          C6 for flat SCCs, C7 fixpoint for recursive ones
//!   Store*           outputs (deferred to the last stratum when incremental)
//!   Drop*            expired relations
//! )
//! ```
//!
//! The final stratum of an incremental program invokes the cleanup
//! subroutine and only then stores every output relation.

use super::naming::RelationVariant;
use super::{log_statement, AstTranslator};
use crate::error::Result;
use crate::ram::{RamCondition, RamStatement};
use datalog_ast::{Program, Relation};

fn resolve<'p>(program: &'p Program, names: Vec<&str>) -> Vec<&'p Relation> {
    names
        .into_iter()
        .filter_map(|name| program.relation(name))
        .collect()
}

impl AstTranslator<'_> {
    /// Emit a `Load` for one relation. Incremental programs load input
    /// facts into `diff_plus` so the first epoch treats them as
    /// insertions.
    fn make_ram_load(
        &mut self,
        current: &mut Option<RamStatement>,
        relation: &Relation,
        file_path: Option<&str>,
        file_ext: &str,
    ) {
        let directives = self.input_io_directives(relation, file_path, Some(file_ext));
        let target = if self.config.incremental {
            self.variant_name(relation, RelationVariant::DiffPlus)
        } else {
            self.variant_name(relation, RelationVariant::Base)
        };
        let mut statement = RamStatement::Load {
            relation: target,
            directives,
        };
        if self.config.profile {
            let base = self.variant_name(relation, RelationVariant::Base);
            statement = RamStatement::LogRelationTimer {
                body: Box::new(statement),
                message: log_statement::t_relation_load_time(&relation.name, &Default::default()),
                relation: base,
            };
        }
        RamStatement::append(current, statement);
    }

    /// Emit a `Store` for one relation.
    fn make_ram_store(
        &mut self,
        current: &mut Option<RamStatement>,
        relation: &Relation,
        file_path: Option<&str>,
        file_ext: &str,
    ) {
        let directives = self.output_io_directives(relation, file_path, Some(file_ext));
        let base = self.variant_name(relation, RelationVariant::Base);
        let mut statement = RamStatement::Store {
            relation: base.clone(),
            directives,
        };
        if self.config.profile {
            statement = RamStatement::LogRelationTimer {
                body: Box::new(statement),
                message: log_statement::t_relation_save_time(&relation.name, &Default::default()),
                relation: base,
            };
        }
        RamStatement::append(current, statement);
    }

    fn make_ram_drop(&mut self, current: &mut Option<RamStatement>, relation: &Relation) {
        let base = self.variant_name(relation, RelationVariant::Base);
        RamStatement::append(current, RamStatement::Drop { relation: base });
    }

    /// Seed the applied and count variants of one relation from its base
    /// rows and the epoch's diffs. Used after computing non-recursive SCCs
    /// and before entering recursive ones (for their input relations).
    fn applied_seed_block(&mut self, relation: &Relation) -> Vec<RamStatement> {
        use super::naming::RelationVariant as V;
        let name = |t: &mut Self, v: V| t.variant_name(relation, v);

        let base = name(self, V::Base);
        let diff_minus = name(self, V::DiffMinus);
        let diff_plus = name(self, V::DiffPlus);
        let diff_minus_applied = name(self, V::DiffMinusApplied);
        let diff_plus_applied = name(self, V::DiffPlusApplied);
        let diff_applied = name(self, V::DiffApplied);
        let diff_minus_count = name(self, V::DiffMinusCount);
        let diff_plus_count = name(self, V::DiffPlusCount);

        let merge = |target: &str, source: &str| RamStatement::Merge {
            target: target.to_string(),
            source: source.to_string(),
        };
        let semi = |target: &str, source: &str| RamStatement::SemiMerge {
            target: target.to_string(),
            source: source.to_string(),
            restriction: None,
        };

        vec![
            merge(&diff_plus_applied, &base),
            merge(&diff_plus_applied, &diff_plus),
            merge(&diff_minus_applied, &base),
            merge(&diff_minus_applied, &diff_minus),
            merge(&diff_applied, &base),
            merge(&diff_applied, &diff_minus),
            merge(&diff_applied, &diff_plus),
            merge(&diff_plus_count, &diff_plus),
            semi(&diff_plus_count, &diff_minus_applied),
            merge(&diff_minus_count, &diff_minus),
            semi(&diff_minus_count, &diff_plus_applied),
        ]
    }

    /// Translate the whole program into the RAM main statement plus
    /// subroutines.
    pub(crate) fn translate_program(&mut self) -> Result<()> {
        let program = self.program;
        let scc_graph = self.scc_graph;
        let schedule = self.schedule;
        let incremental = self.config.incremental;
        let engine = self.config.engine.is_some();
        let output_dir = self.config.output_dir.clone();

        let mut main: Option<RamStatement> = None;
        let mut index_of_scc = 0usize;

        for scc in scc_graph.order() {
            let mut current: Option<RamStatement> = None;
            let is_recursive = scc_graph.is_recursive(scc);

            let members: Vec<&Relation> = scc_graph
                .internal_relations(scc)
                .iter()
                .filter_map(|name| program.relation(name))
                .collect();
            let inputs = resolve(program, scc_graph.internal_input_relations(scc));
            let outputs = resolve(program, scc_graph.internal_output_relations(scc));
            let extern_out_preds =
                resolve(program, scc_graph.external_output_predecessor_relations(scc));
            let extern_non_out_preds =
                resolve(program, scc_graph.external_non_output_predecessor_relations(scc));
            let intern_non_outs_with_extern_succs = resolve(
                program,
                scc_graph.internal_non_output_relations_with_external_successors(scc),
            );

            // Create the SCC's relations and their variants.
            for &rel in &members {
                let base = self.variant_name(rel, RelationVariant::Base);
                RamStatement::append(&mut current, RamStatement::Create { relation: base });

                if incremental {
                    for variant in [
                        RelationVariant::DiffMinus,
                        RelationVariant::DiffMinusApplied,
                        RelationVariant::DiffMinusCount,
                        RelationVariant::DiffPlus,
                        RelationVariant::DiffPlusApplied,
                        RelationVariant::DiffPlusCount,
                        RelationVariant::DiffApplied,
                    ] {
                        let name = self.variant_name(rel, variant);
                        RamStatement::append(&mut current, RamStatement::Create { relation: name });
                    }
                }

                if is_recursive {
                    for variant in [RelationVariant::Delta, RelationVariant::New] {
                        let name = self.variant_name(rel, variant);
                        RamStatement::append(&mut current, RamStatement::Create { relation: name });
                    }
                    if incremental {
                        for variant in [
                            RelationVariant::PreviousIndexed,
                            RelationVariant::NewDiffPlus,
                            RelationVariant::NewDiffMinus,
                            RelationVariant::DeltaDiffMinusApplied,
                            RelationVariant::DeltaDiffMinusCount,
                            RelationVariant::DeltaDiffPlusCount,
                            RelationVariant::TempDeltaDiffApplied,
                            RelationVariant::DeltaDiffApplied,
                        ] {
                            let name = self.variant_name(rel, variant);
                            RamStatement::append(
                                &mut current,
                                RamStatement::Create { relation: name },
                            );
                        }
                    }
                }
            }

            // Load inputs; with a communication engine, also intermediate
            // relations produced by earlier processes.
            for &rel in &inputs {
                self.make_ram_load(&mut current, rel, None, ".facts");
            }
            if engine {
                for &rel in &extern_out_preds {
                    self.make_ram_load(&mut current, rel, Some(&output_dir), ".csv");
                }
                for &rel in &extern_non_out_preds {
                    self.make_ram_load(&mut current, rel, Some(&output_dir), ".facts");
                }
            }

            if incremental && is_recursive {
                for &rel in &inputs {
                    for stmt in self.applied_seed_block(rel) {
                        RamStatement::append(&mut current, stmt);
                    }
                }
            }

            // Compute the SCC.
            let body = if is_recursive {
                self.translate_recursive_relation(scc)?
            } else {
                self.translate_non_recursive_relation(members[0])?
            };
            if let Some(body) = body {
                RamStatement::append(&mut current, body);
            }

            if incremental && !is_recursive {
                for &rel in &members {
                    for stmt in self.applied_seed_block(rel) {
                        RamStatement::append(&mut current, stmt);
                    }
                }
            }

            // Store results.
            if engine {
                for &rel in &intern_non_outs_with_extern_succs {
                    self.make_ram_store(&mut current, rel, Some(&output_dir), ".facts");
                }
            }
            if !incremental {
                for &rel in &outputs {
                    self.make_ram_store(&mut current, rel, None, ".csv");
                }
            }

            // Drop relations no later stratum needs. Incremental and
            // provenance runs keep everything alive for the next epoch /
            // proof queries.
            if !self.config.provenance.is_enabled() && !incremental {
                if engine {
                    for &rel in members
                        .iter()
                        .chain(&extern_out_preds)
                        .chain(&extern_non_out_preds)
                    {
                        self.make_ram_drop(&mut current, rel);
                    }
                } else {
                    for name in schedule.expired(scc) {
                        if let Some(rel) = program.relation(name) {
                            self.make_ram_drop(&mut current, rel);
                        }
                    }
                }
            }

            // The last stratum settles the epoch, then stores all outputs.
            if incremental && scc == scc_graph.num_sccs() - 1 {
                RamStatement::append(
                    &mut current,
                    RamStatement::Exit {
                        condition: RamCondition::SubroutineCondition {
                            name: "incremental_cleanup".to_string(),
                            arguments: Vec::new(),
                        },
                        exitable: false,
                    },
                );
                for later in scc_graph.order() {
                    for &rel in &resolve(program, scc_graph.internal_output_relations(later)) {
                        self.make_ram_store(&mut current, rel, None, ".csv");
                    }
                }
            }

            if let Some(body) = current {
                RamStatement::append(
                    &mut main,
                    RamStatement::Stratum {
                        index: index_of_scc,
                        body: Box::new(body),
                    },
                );
                index_of_scc += 1;
            }
        }

        let mut main = main.unwrap_or(RamStatement::Sequence(Vec::new()));
        if self.config.profile {
            main = RamStatement::LogTimer {
                body: Box::new(main),
                message: log_statement::runtime(),
            };
        }
        self.ram.set_main(main);

        if incremental {
            let cleanup = self.make_incremental_cleanup_subroutine();
            self.ram.add_subroutine("incremental_cleanup", cleanup);
        }
        Ok(())
    }
}

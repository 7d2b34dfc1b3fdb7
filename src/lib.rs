//! # Deltalog
//!
//! Incremental Datalog compilation core: translates a typed, normalized
//! Datalog program into a relational-algebra IR ("RAM") extended with the
//! machinery for incremental view maintenance, so a materialization can be
//! recomputed after facts are added or removed.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! Typed AST (datalog_ast)
//!     |
//! [Analyses]               -> SCC graph, topological order,
//!     |                       recursive clauses, type environment
//! [Incremental Annotator]  -> annotation columns + update-rule families
//!     |                       (incremental mode only)
//! [Translator]
//!     |- Clause Translator -> operator nests (scan/filter/aggregate/project)
//!     |- Relation Compiler -> non-recursive update rules
//!     |- SCC Orchestrator  -> semi-naive fixpoints with diff maintenance
//!     |- Program Driver    -> strata, loads/stores, cleanup subroutine
//!     v
//! RamProgram               -> downstream interpreter / compiler
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use deltalog::{translate_unit, AstTranslationUnit, Config};
//!
//! let unit = AstTranslationUnit::new(program);
//! let ram = translate_unit(&unit, &Config::incremental())?;
//! println!("{}", ram.program);
//! ```
//!
//! Translation is single threaded and deterministic: the same unit and
//! configuration always render the same IR. The emitted IR itself is
//! concurrent (per-SCC `Parallel` loop bodies); the schedule guarantees
//! each variant is read-only or write-only within one iteration.

pub mod analysis;
pub mod config;
pub mod error;
pub mod incremental;
pub mod ram;
pub mod report;
pub mod translator;

pub use config::{Config, ProvenanceMode};
pub use error::{Result, TranslatorError};
pub use ram::RamProgram;
pub use report::DebugReport;

use analysis::{RecursiveClauses, RelationSchedule, SccGraph, TypeEnvironment};
use incremental::IncrementalAnnotator;
use translator::AstTranslator;

/// The translator's input: a typed program plus its type environment. The
/// remaining analyses are derived here.
#[derive(Debug, Clone)]
pub struct AstTranslationUnit {
    pub program: datalog_ast::Program,
    pub type_env: TypeEnvironment,
}

impl AstTranslationUnit {
    pub fn new(program: datalog_ast::Program) -> Self {
        AstTranslationUnit {
            program,
            type_env: TypeEnvironment::new(),
        }
    }

    pub fn with_type_env(mut self, type_env: TypeEnvironment) -> Self {
        self.type_env = type_env;
        self
    }
}

/// The translator's output: the IR program and the collected debug report.
#[derive(Debug)]
pub struct RamTranslationUnit {
    pub program: RamProgram,
    pub report: DebugReport,
}

/// Translate one unit under the given configuration.
///
/// All fatal conditions surface as a single error carrying the offending
/// source location; no partial IR is returned.
pub fn translate_unit(unit: &AstTranslationUnit, config: &Config) -> Result<RamTranslationUnit> {
    let started = std::time::Instant::now();

    let mut program = unit.program.clone();
    let scc_graph = SccGraph::build(&program);

    if config.incremental {
        let recursive_clauses = RecursiveClauses::new(&scc_graph);
        IncrementalAnnotator::new(&scc_graph, &recursive_clauses).transform(&mut program);
    }

    let recursive_clauses = RecursiveClauses::new(&scc_graph);
    let schedule = RelationSchedule::build(&scc_graph);
    let mut translator = AstTranslator::new(
        config,
        &program,
        &scc_graph,
        &recursive_clauses,
        &unit.type_env,
        &schedule,
    );
    translator.translate_program()?;
    let ram = translator.into_ram();

    let mut report = DebugReport::new();
    if config.debug_report_enabled() {
        report.add_code_section(
            "ram-program",
            format!("RAM Program ({:.3}s)", started.elapsed().as_secs_f64()),
            ram.to_string(),
        );
    }

    Ok(RamTranslationUnit {
        program: ram,
        report,
    })
}

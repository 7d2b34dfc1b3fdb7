//! # RAM IR
//!
//! The relational-algebra intermediate representation produced by the
//! translator and consumed by the downstream interpreter/compiler.
//!
//! ## Shape
//!
//! ```text
//! RamProgram
//!   ├── relations   : mangled name -> RamRelation (schema)
//!   ├── main        : RamStatement tree (Sequence of Stratum nodes)
//!   └── subroutines : name -> RamStatement
//! ```
//!
//! Statements form the control skeleton (strata, loops, merges); their
//! leaves are `Query` nodes holding nested `RamOperation`s (scan / unpack /
//! filter / aggregate / project), parameterized by `RamExpression`s and
//! `RamCondition`s. All node kinds are plain tagged enums; passes over the
//! IR are pattern-matching folds, not visitor hierarchies.

mod condition;
mod expression;
mod operation;
mod program;
mod relation;
mod statement;

pub use condition::RamCondition;
pub use expression::RamExpression;
pub use operation::{AggregateFunction, RamOperation};
pub use program::RamProgram;
pub use relation::RamRelation;
pub use statement::RamStatement;

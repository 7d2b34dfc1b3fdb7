//! # Datalog AST - Shared Library
//!
//! Typed, normalized Abstract Syntax Tree for Datalog programs.
//! Produced by the front-end (parser + type checker) and consumed by the
//! semantic analyses and the AST-to-IR translator.
//!
//! The tree is fully owned: every rewrite pass clones subtrees into owned
//! values, so no shared substructure ever appears in a transformed program.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ============================================================================
// Source locations
// ============================================================================

/// Position of an AST node in the source program.
///
/// Carried through rewrites so diagnostics and debug info can point back at
/// the clause a compiled rule came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrcLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SrcLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        SrcLocation {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SrcLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

// ============================================================================
// Operators
// ============================================================================

/// Intrinsic functor operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctorOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Min,
    Max,
    Neg,
    BAnd,
    BOr,
    BXor,
    LAnd,
    LOr,
    LNot,
    Ord,
    StrLen,
    Cat,
}

impl FunctorOp {
    /// Symbolic name used in clause rendering.
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctorOp::Add => "+",
            FunctorOp::Sub => "-",
            FunctorOp::Mul => "*",
            FunctorOp::Div => "/",
            FunctorOp::Mod => "%",
            FunctorOp::Min => "min",
            FunctorOp::Max => "max",
            FunctorOp::Neg => "-",
            FunctorOp::BAnd => "band",
            FunctorOp::BOr => "bor",
            FunctorOp::BXor => "bxor",
            FunctorOp::LAnd => "land",
            FunctorOp::LOr => "lor",
            FunctorOp::LNot => "lnot",
            FunctorOp::Ord => "ord",
            FunctorOp::StrLen => "strlen",
            FunctorOp::Cat => "cat",
        }
    }
}

/// Binary constraint comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryConstraintOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryConstraintOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryConstraintOp::Eq => "=",
            BinaryConstraintOp::Ne => "!=",
            BinaryConstraintOp::Lt => "<",
            BinaryConstraintOp::Le => "<=",
            BinaryConstraintOp::Gt => ">",
            BinaryConstraintOp::Ge => ">=",
        }
    }
}

/// Aggregate operators usable in aggregator arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateOp {
    Min,
    Max,
    Count,
    Sum,
}

impl AggregateOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Count => "count",
            AggregateOp::Sum => "sum",
        }
    }
}

// ============================================================================
// Arguments
// ============================================================================

/// A nested record constructor, e.g. `[x, 1, [y, z]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordInit {
    pub arguments: Vec<Argument>,
}

impl RecordInit {
    pub fn new(arguments: Vec<Argument>) -> Self {
        RecordInit { arguments }
    }

    pub fn arity(&self) -> usize {
        self.arguments.len()
    }
}

/// An aggregator argument, e.g. `count : { t(x, _) }` or `min y : { s(x, y) }`.
///
/// The body is restricted by the front-end to at most one atom plus
/// constraints; the translator faults on anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregator {
    pub op: AggregateOp,
    /// Target expression; `None` for plain `count`.
    pub target: Option<Box<Argument>>,
    pub body: Vec<Literal>,
}

impl Aggregator {
    /// The single atom of the aggregate body, if present.
    pub fn atom(&self) -> Option<&Atom> {
        self.body.iter().find_map(|lit| match lit {
            Literal::Atom(atom) => Some(atom),
            _ => None,
        })
    }
}

/// Argument variants appearing in atoms and constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Argument {
    /// A named variable, e.g. `x`.
    Variable(String),
    /// The wildcard `_`.
    UnnamedVariable,
    /// A number constant. Carries the raw value, which doubles as the
    /// interned index in the evaluator's value domain.
    NumberConstant(i64),
    /// A string constant, pre-interned by the front-end's symbol table;
    /// only the symbol index survives into the AST.
    StringConstant(usize),
    /// Record constructor.
    Record(RecordInit),
    /// Intrinsic functor application, e.g. `x + 1`.
    IntrinsicFunctor {
        op: FunctorOp,
        arguments: Vec<Argument>,
    },
    /// User-defined functor application; the declaration lives on the program.
    UserDefinedFunctor {
        name: String,
        arguments: Vec<Argument>,
    },
    /// The `$` auto-increment counter.
    Counter,
    /// The current semi-naive iteration number (incremental evaluation only).
    IterationNumber,
    /// Aggregator, e.g. `count : { t(x, _) }`.
    Aggregator(Aggregator),
    /// Positional argument of a subroutine (provenance / exit conditions).
    SubroutineArgument(usize),
}

impl Argument {
    pub fn is_unnamed(&self) -> bool {
        matches!(self, Argument::UnnamedVariable)
    }

    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Argument::Variable(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Argument::NumberConstant(value) => Some(*value),
            _ => None,
        }
    }

    /// All named variables appearing in this argument, including inside
    /// records, functors, and aggregator bodies.
    pub fn variables(&self) -> HashSet<String> {
        let mut vars = HashSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut HashSet<String>) {
        match self {
            Argument::Variable(name) => {
                vars.insert(name.clone());
            }
            Argument::Record(record) => {
                for arg in &record.arguments {
                    arg.collect_variables(vars);
                }
            }
            Argument::IntrinsicFunctor { arguments, .. }
            | Argument::UserDefinedFunctor { arguments, .. } => {
                for arg in arguments {
                    arg.collect_variables(vars);
                }
            }
            Argument::Aggregator(agg) => {
                if let Some(target) = &agg.target {
                    target.collect_variables(vars);
                }
                for lit in &agg.body {
                    for var in lit.variables() {
                        vars.insert(var);
                    }
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Variable(name) => write!(f, "{}", name),
            Argument::UnnamedVariable => write!(f, "_"),
            Argument::NumberConstant(value) => write!(f, "{}", value),
            Argument::StringConstant(index) => write!(f, "@sym{}", index),
            Argument::Record(record) => {
                write!(f, "[")?;
                for (i, arg) in record.arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, "]")
            }
            Argument::IntrinsicFunctor { op, arguments } => {
                if arguments.len() == 2 {
                    write!(f, "({} {} {})", arguments[0], op.as_str(), arguments[1])
                } else {
                    write!(f, "{}(", op.as_str())?;
                    for (i, arg) in arguments.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ")")
                }
            }
            Argument::UserDefinedFunctor { name, arguments } => {
                write!(f, "@{}(", name)?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Argument::Counter => write!(f, "$"),
            Argument::IterationNumber => write!(f, "#iteration"),
            Argument::Aggregator(agg) => {
                write!(f, "{} ", agg.op.as_str())?;
                if let Some(target) = &agg.target {
                    write!(f, "{} ", target)?;
                }
                write!(f, ": {{ ")?;
                for (i, lit) in agg.body.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", lit)?;
                }
                write!(f, " }}")
            }
            Argument::SubroutineArgument(index) => write!(f, "arg({})", index),
        }
    }
}

// ============================================================================
// Atoms and literals
// ============================================================================

/// An atom like `edge(x, y)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub name: String,
    pub arguments: Vec<Argument>,
}

impl Atom {
    pub fn new(name: impl Into<String>, arguments: Vec<Argument>) -> Self {
        Atom {
            name: name.into(),
            arguments,
        }
    }

    pub fn arity(&self) -> usize {
        self.arguments.len()
    }

    pub fn add_argument(&mut self, arg: Argument) {
        self.arguments.push(arg);
    }

    /// Replace the argument at `index`, which must exist.
    pub fn set_argument(&mut self, index: usize, arg: Argument) {
        self.arguments[index] = arg;
    }

    /// True if every argument is the wildcard.
    pub fn all_arguments_unnamed(&self) -> bool {
        self.arguments.iter().all(Argument::is_unnamed)
    }

    pub fn variables(&self) -> HashSet<String> {
        let mut vars = HashSet::new();
        for arg in &self.arguments {
            vars.extend(arg.variables());
        }
        vars
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

/// Body literal variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Positive atom.
    Atom(Atom),
    /// Stratified negation `!R(...)`.
    Negation(Atom),
    /// Negation compiled against positive existence (incremental rewrites).
    PositiveNegation(Atom),
    /// Subsumption negation: fails if a tuple subsuming the given one exists,
    /// ignoring the trailing `subsumption_fields` columns.
    SubsumptionNegation {
        atom: Atom,
        subsumption_fields: usize,
    },
    /// Binary comparison between two values.
    BinaryConstraint {
        op: BinaryConstraintOp,
        lhs: Argument,
        rhs: Argument,
    },
    /// Conjunction of two constraints.
    Conjunction(Box<Literal>, Box<Literal>),
    /// Disjunction of two constraints.
    Disjunction(Box<Literal>, Box<Literal>),
    /// Positive existence probe on a concrete tuple.
    ExistenceCheck(Atom),
}

impl Literal {
    /// The underlying atom for atom-shaped literals.
    pub fn atom(&self) -> Option<&Atom> {
        match self {
            Literal::Atom(atom)
            | Literal::Negation(atom)
            | Literal::PositiveNegation(atom)
            | Literal::SubsumptionNegation { atom, .. }
            | Literal::ExistenceCheck(atom) => Some(atom),
            _ => None,
        }
    }

    pub fn is_positive_atom(&self) -> bool {
        matches!(self, Literal::Atom(_))
    }

    pub fn variables(&self) -> HashSet<String> {
        match self {
            Literal::Atom(atom)
            | Literal::Negation(atom)
            | Literal::PositiveNegation(atom)
            | Literal::SubsumptionNegation { atom, .. }
            | Literal::ExistenceCheck(atom) => atom.variables(),
            Literal::BinaryConstraint { lhs, rhs, .. } => {
                let mut vars = lhs.variables();
                vars.extend(rhs.variables());
                vars
            }
            Literal::Conjunction(lhs, rhs) | Literal::Disjunction(lhs, rhs) => {
                let mut vars = lhs.variables();
                vars.extend(rhs.variables());
                vars
            }
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Atom(atom) => write!(f, "{}", atom),
            Literal::Negation(atom) => write!(f, "!{}", atom),
            Literal::PositiveNegation(atom) => write!(f, "!+{}", atom),
            Literal::SubsumptionNegation { atom, .. } => write!(f, "!<={}", atom),
            Literal::BinaryConstraint { op, lhs, rhs } => {
                write!(f, "{} {} {}", lhs, op.as_str(), rhs)
            }
            Literal::Conjunction(lhs, rhs) => write!(f, "({} /\\ {})", lhs, rhs),
            Literal::Disjunction(lhs, rhs) => write!(f, "({} \\/ {})", lhs, rhs),
            Literal::ExistenceCheck(atom) => write!(f, "?{}", atom),
        }
    }
}

// ============================================================================
// Clauses
// ============================================================================

/// A fixed join order imposed by the front-end, keyed by rule version.
/// Orders are 1-based in source syntax.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub orders: std::collections::BTreeMap<usize, Vec<usize>>,
}

impl ExecutionPlan {
    pub fn has_order_for(&self, version: usize) -> bool {
        self.orders.contains_key(&version)
    }

    pub fn order_for(&self, version: usize) -> Option<&Vec<usize>> {
        self.orders.get(&version)
    }

    pub fn max_version(&self) -> usize {
        self.orders.keys().copied().max().unwrap_or(0)
    }
}

/// A single Datalog clause: head, body literals, and an optional execution
/// plan. A clause with an empty body is a fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub head: Atom,
    pub body: Vec<Literal>,
    pub plan: Option<ExecutionPlan>,
    /// Set when a plan has been applied, so plan handling is not re-entered.
    pub fixed_plan: bool,
    pub src_loc: SrcLocation,
}

impl Clause {
    pub fn new(head: Atom, body: Vec<Literal>) -> Self {
        Clause {
            head,
            body,
            plan: None,
            fixed_plan: false,
            src_loc: SrcLocation::default(),
        }
    }

    pub fn fact(head: Atom) -> Self {
        Clause::new(head, Vec::new())
    }

    pub fn with_src_loc(mut self, src_loc: SrcLocation) -> Self {
        self.src_loc = src_loc;
        self
    }

    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }

    pub fn is_rule(&self) -> bool {
        !self.is_fact()
    }

    /// All positive body atoms, in body order.
    pub fn atoms(&self) -> Vec<&Atom> {
        self.body
            .iter()
            .filter_map(|lit| match lit {
                Literal::Atom(atom) => Some(atom),
                _ => None,
            })
            .collect()
    }

    pub fn atoms_mut(&mut self) -> Vec<&mut Atom> {
        self.body
            .iter_mut()
            .filter_map(|lit| match lit {
                Literal::Atom(atom) => Some(atom),
                _ => None,
            })
            .collect()
    }

    /// All negated atoms, in body order.
    pub fn negations(&self) -> Vec<&Atom> {
        self.body
            .iter()
            .filter_map(|lit| match lit {
                Literal::Negation(atom) => Some(atom),
                _ => None,
            })
            .collect()
    }

    pub fn add_to_body(&mut self, literal: Literal) {
        self.body.push(literal);
    }

    /// Drop all plain negation literals. Used after a rewrite has replaced
    /// them with their incremental counterparts.
    pub fn clear_negations(&mut self) {
        self.body.retain(|lit| !matches!(lit, Literal::Negation(_)));
    }

    /// Reorder the positive atoms so that the atom currently at position
    /// `order[k]` ends up at atom position `k`. Non-atom literals keep their
    /// slots.
    pub fn reorder_atoms(&mut self, order: &[usize]) {
        let atom_slots: Vec<usize> = self
            .body
            .iter()
            .enumerate()
            .filter_map(|(i, lit)| lit.is_positive_atom().then_some(i))
            .collect();
        assert_eq!(atom_slots.len(), order.len(), "bad atom reordering");

        let atoms: Vec<Literal> = atom_slots
            .iter()
            .map(|&slot| self.body[slot].clone())
            .collect();
        for (k, &source) in order.iter().enumerate() {
            self.body[atom_slots[k]] = atoms[source].clone();
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        if !self.body.is_empty() {
            write!(f, " :- ")?;
            for (i, lit) in self.body.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", lit)?;
            }
        }
        write!(f, ".")
    }
}

// ============================================================================
// Relations
// ============================================================================

/// Storage representation hint forwarded to the IR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationRepresentation {
    #[default]
    Default,
    Btree,
    Brie,
    EqRel,
    Info,
}

/// A typed attribute of a relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub type_name: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Attribute {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// An input/output directive attached to a relation by the front-end.
/// Keys mirror the source syntax (`IO`, `filename`, `delimiter`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IoDirective {
    pub entries: std::collections::BTreeMap<String, String>,
    /// True for `.printsize` stores.
    pub print_size: bool,
}

impl IoDirective {
    pub fn new() -> Self {
        IoDirective::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }
}

/// A relation declaration with its clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub clauses: Vec<Clause>,
    pub representation: RelationRepresentation,
    pub is_input: bool,
    pub is_output: bool,
    pub loads: Vec<IoDirective>,
    pub stores: Vec<IoDirective>,
    /// Number of trailing height-parameter columns (provenance mode).
    pub height_parameters: usize,
}

impl Relation {
    pub fn new(name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Relation {
            name: name.into(),
            attributes,
            clauses: Vec::new(),
            representation: RelationRepresentation::default(),
            is_input: false,
            is_output: false,
            loads: Vec::new(),
            stores: Vec::new(),
            height_parameters: 0,
        }
    }

    pub fn arity(&self) -> usize {
        self.attributes.len()
    }

    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    pub fn add_clause(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.name.clone()).collect()
    }
}

// ============================================================================
// Programs
// ============================================================================

/// Declaration of a user-defined functor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctorDeclaration {
    pub name: String,
    /// Type signature string, e.g. "NN" for number x number -> ... as
    /// produced by the front-end.
    pub type_signature: String,
}

/// A complete typed Datalog program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub relations: Vec<Relation>,
    pub functors: std::collections::BTreeMap<String, FunctorDeclaration>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    pub fn add_relation(&mut self, relation: Relation) {
        self.relations.push(relation);
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|rel| rel.name == name)
    }

    pub fn relation_mut(&mut self, name: &str) -> Option<&mut Relation> {
        self.relations.iter_mut().find(|rel| rel.name == name)
    }

    pub fn functor_declaration(&self, name: &str) -> Option<&FunctorDeclaration> {
        self.functors.get(name)
    }

    /// Relation names in declaration order.
    pub fn relation_names(&self) -> Vec<&str> {
        self.relations.iter().map(|rel| rel.name.as_str()).collect()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for relation in &self.relations {
            for clause in &relation.clauses {
                writeln!(f, "{}", clause)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Fluent construction helpers used by tests and host tools.
pub mod builders {
    use super::*;

    /// Build an atom argument-by-argument.
    pub struct AtomBuilder {
        name: String,
        arguments: Vec<Argument>,
    }

    impl AtomBuilder {
        pub fn new(name: impl Into<String>) -> Self {
            AtomBuilder {
                name: name.into(),
                arguments: Vec::new(),
            }
        }

        pub fn var(mut self, name: impl Into<String>) -> Self {
            self.arguments.push(Argument::Variable(name.into()));
            self
        }

        pub fn unnamed(mut self) -> Self {
            self.arguments.push(Argument::UnnamedVariable);
            self
        }

        pub fn number(mut self, value: i64) -> Self {
            self.arguments.push(Argument::NumberConstant(value));
            self
        }

        pub fn arg(mut self, arg: Argument) -> Self {
            self.arguments.push(arg);
            self
        }

        pub fn build(self) -> Atom {
            Atom::new(self.name, self.arguments)
        }
    }

    /// Build a clause from a head and body literals.
    pub struct ClauseBuilder {
        head: Atom,
        body: Vec<Literal>,
    }

    impl ClauseBuilder {
        pub fn new(head: Atom) -> Self {
            ClauseBuilder {
                head,
                body: Vec::new(),
            }
        }

        pub fn atom(mut self, atom: Atom) -> Self {
            self.body.push(Literal::Atom(atom));
            self
        }

        pub fn negation(mut self, atom: Atom) -> Self {
            self.body.push(Literal::Negation(atom));
            self
        }

        pub fn constraint(mut self, op: BinaryConstraintOp, lhs: Argument, rhs: Argument) -> Self {
            self.body.push(Literal::BinaryConstraint { op, lhs, rhs });
            self
        }

        pub fn build(self) -> Clause {
            Clause::new(self.head, self.body)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

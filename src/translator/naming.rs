//! Relation variant name mangling.
//!
//! A base relation owns a family of auxiliary variants during incremental
//! evaluation. Mangling is a pure function: the same `(base, variant)` pair
//! always yields the same name, a mangled name determines its variant and
//! base uniquely, and no state is consulted.
//!
//! Variants prefixed with `@` are internal scratch relations (created and
//! dropped around an SCC); the rest persist across epochs.

/// The variant family of a base relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RelationVariant {
    /// The relation itself.
    Base,
    /// Rows discovered in the previous fixpoint iteration.
    Delta,
    /// Rows discovered in the current fixpoint iteration.
    New,
    /// Frozen copy of the previous epoch's rows, fully indexed.
    PreviousIndexed,
    /// Rows retracted in this epoch.
    DiffMinus,
    /// Rows asserted in this epoch.
    DiffPlus,
    /// Per-iteration additions to `DiffMinus`.
    NewDiffMinus,
    /// Per-iteration additions to `DiffPlus`.
    NewDiffPlus,
    /// Previous epoch with retractions applied.
    DiffMinusApplied,
    /// Previous epoch with assertions applied.
    DiffPlusApplied,
    /// Previous epoch with both diffs applied; the effective base for
    /// update-rule joins.
    DiffApplied,
    /// Retractions with final count columns for pivot joins.
    DiffMinusCount,
    /// Assertions with final count columns for pivot joins.
    DiffPlusCount,
    /// Delta of `DiffApplied`.
    DeltaDiffApplied,
    /// Scratch used while rebuilding `DeltaDiffApplied`.
    TempDeltaDiffApplied,
    /// Delta of `DiffMinusApplied`.
    DeltaDiffMinusApplied,
    /// Delta of `DiffMinusCount`.
    DeltaDiffMinusCount,
    /// Delta of `DiffPlusCount`.
    DeltaDiffPlusCount,
}

impl RelationVariant {
    /// The fixed name prefix of this variant.
    pub fn prefix(self) -> &'static str {
        match self {
            RelationVariant::Base => "",
            RelationVariant::Delta => "@delta_",
            RelationVariant::New => "@new_",
            RelationVariant::PreviousIndexed => "@previous_indexed_",
            RelationVariant::DiffMinus => "diff_minus@_",
            RelationVariant::DiffPlus => "diff_plus@_",
            RelationVariant::NewDiffMinus => "@new_diff_minus@_",
            RelationVariant::NewDiffPlus => "@new_diff_plus@_",
            RelationVariant::DiffMinusApplied => "diff_minus_applied@_",
            RelationVariant::DiffPlusApplied => "diff_plus_applied@_",
            RelationVariant::DiffApplied => "diff_applied@_",
            RelationVariant::DiffMinusCount => "diff_minus_count@_",
            RelationVariant::DiffPlusCount => "diff_plus_count@_",
            RelationVariant::DeltaDiffApplied => "@delta_diff_applied@_",
            RelationVariant::TempDeltaDiffApplied => "@temp_delta_diff_applied@_",
            RelationVariant::DeltaDiffMinusApplied => "@delta_diff_minus_applied@_",
            RelationVariant::DeltaDiffMinusCount => "@delta_diff_minus_count@_",
            RelationVariant::DeltaDiffPlusCount => "@delta_diff_plus_count@_",
        }
    }

    /// All variants, longest prefix first, for unambiguous prefix matching.
    fn by_prefix_length() -> &'static [RelationVariant] {
        // Sorted so that no listed prefix is a prefix of an earlier one.
        &[
            RelationVariant::TempDeltaDiffApplied,
            RelationVariant::DeltaDiffMinusApplied,
            RelationVariant::DeltaDiffMinusCount,
            RelationVariant::DeltaDiffPlusCount,
            RelationVariant::DeltaDiffApplied,
            RelationVariant::NewDiffMinus,
            RelationVariant::NewDiffPlus,
            RelationVariant::DiffMinusApplied,
            RelationVariant::DiffPlusApplied,
            RelationVariant::DiffMinusCount,
            RelationVariant::DiffPlusCount,
            RelationVariant::DiffApplied,
            RelationVariant::DiffMinus,
            RelationVariant::DiffPlus,
            RelationVariant::PreviousIndexed,
            RelationVariant::Delta,
            RelationVariant::New,
        ]
    }
}

/// Mangle `(base, variant)` into the variant relation's name.
pub fn mangled_name(base: &str, variant: RelationVariant) -> String {
    format!("{}{}", variant.prefix(), base)
}

/// The variant a mangled name denotes.
pub fn variant_of(name: &str) -> RelationVariant {
    for &variant in RelationVariant::by_prefix_length() {
        if name.starts_with(variant.prefix()) {
            return variant;
        }
    }
    RelationVariant::Base
}

/// Strip the variant prefix off a mangled name, recovering the base
/// relation name.
pub fn base_name(name: &str) -> &str {
    &name[variant_of(name).prefix().len()..]
}

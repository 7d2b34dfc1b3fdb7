//! Property-based invariant tests (proptest).

use datalog_ast::builders::{AtomBuilder, ClauseBuilder};
use datalog_ast::{Attribute, Program, Relation};
use deltalog::translator::naming::{self, RelationVariant};
use deltalog::{translate_unit, AstTranslationUnit, Config};
use proptest::prelude::*;

const ALL_VARIANTS: &[RelationVariant] = &[
    RelationVariant::Base,
    RelationVariant::Delta,
    RelationVariant::New,
    RelationVariant::PreviousIndexed,
    RelationVariant::DiffMinus,
    RelationVariant::DiffPlus,
    RelationVariant::NewDiffMinus,
    RelationVariant::NewDiffPlus,
    RelationVariant::DiffMinusApplied,
    RelationVariant::DiffPlusApplied,
    RelationVariant::DiffApplied,
    RelationVariant::DiffMinusCount,
    RelationVariant::DiffPlusCount,
    RelationVariant::DeltaDiffApplied,
    RelationVariant::TempDeltaDiffApplied,
    RelationVariant::DeltaDiffMinusApplied,
    RelationVariant::DeltaDiffMinusCount,
    RelationVariant::DeltaDiffPlusCount,
];

proptest! {
    /// A mangled name uniquely determines its base and variant.
    #[test]
    fn mangling_is_injective(name in "[a-z][a-z0-9_]{0,12}") {
        let mut seen = std::collections::BTreeSet::new();
        for &variant in ALL_VARIANTS {
            let mangled = naming::mangled_name(&name, variant);
            prop_assert!(seen.insert(mangled.clone()));
            prop_assert_eq!(naming::base_name(&mangled), name.as_str());
            prop_assert_eq!(naming::variant_of(&mangled), variant);
        }
    }

    /// Incremental mode adds exactly the three annotation columns to every
    /// relation, whatever the source arity.
    #[test]
    fn incremental_arity_is_source_plus_three(arity in 1usize..6) {
        let columns: Vec<Attribute> = (0..arity)
            .map(|i| Attribute::new(format!("c{}", i), "number"))
            .collect();

        let mut program = Program::new();
        let mut input = Relation::new("input", columns.clone());
        input.is_input = true;
        program.add_relation(input);

        let mut output = Relation::new("output", columns);
        output.is_output = true;
        let mut head = AtomBuilder::new("output");
        let mut body = AtomBuilder::new("input");
        for i in 0..arity {
            head = head.var(format!("v{}", i));
            body = body.var(format!("v{}", i));
        }
        output.add_clause(ClauseBuilder::new(head.build()).atom(body.build()).build());
        program.add_relation(output);

        let unit = AstTranslationUnit::new(program);
        let ram = translate_unit(&unit, &Config::incremental()).unwrap().program;

        for name in ["input", "output"] {
            let relation = ram.relation(name).unwrap();
            prop_assert_eq!(relation.arity, arity + 3);
        }
        // Variant coherence: every variant mirrors its base schema.
        for relation in ram.relations() {
            if relation.name.starts_with("scc_") {
                continue;
            }
            let base = ram.relation(naming::base_name(&relation.name)).unwrap();
            prop_assert_eq!(relation.arity, base.arity);
            prop_assert_eq!(&relation.attribute_names, &base.attribute_names);
        }
    }

    /// Byte-for-byte determinism across repeated translations.
    #[test]
    fn translation_is_deterministic(incremental in any::<bool>(), chain in 1usize..4) {
        let mut program = Program::new();
        let mut edge = Relation::new(
            "edge",
            vec![Attribute::new("x", "number"), Attribute::new("y", "number")],
        );
        edge.is_input = true;
        program.add_relation(edge);

        let mut previous = "edge".to_string();
        for i in 0..chain {
            let name = format!("hop{}", i);
            let mut rel = Relation::new(
                &name,
                vec![Attribute::new("x", "number"), Attribute::new("y", "number")],
            );
            rel.is_output = i == chain - 1;
            rel.add_clause(
                ClauseBuilder::new(AtomBuilder::new(&name).var("x").var("y").build())
                    .atom(AtomBuilder::new(&previous).var("x").var("z").build())
                    .atom(AtomBuilder::new(&previous).var("z").var("y").build())
                    .build(),
            );
            program.add_relation(rel);
            previous = name;
        }

        let mut config = Config::default();
        config.incremental = incremental;
        let unit = AstTranslationUnit::new(program);
        let first = translate_unit(&unit, &config).unwrap().program.to_string();
        let second = translate_unit(&unit, &config).unwrap().program.to_string();
        prop_assert_eq!(first, second);
    }
}

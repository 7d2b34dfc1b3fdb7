//! IO directive resolution.
//!
//! Load/Store statements carry directive maps telling the evaluator where
//! and how to read or write a relation. Directives come from the source
//! program; missing keys are filled with the documented defaults.

use super::naming::RelationVariant;
use super::AstTranslator;
use datalog_ast::Relation;
use std::collections::BTreeMap;
use std::fmt;

/// One resolved directive map. Keys mirror source syntax: `IO`, `filename`,
/// `delimiter`, `headers`, `attributeNames`, `intermediate`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoDirectives {
    entries: BTreeMap<String, String>,
}

impl IoDirectives {
    pub fn new() -> Self {
        IoDirectives::default()
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn io_type(&self) -> Option<&str> {
        self.get("IO")
    }

    pub fn set_io_type(&mut self, value: impl Into<String>) {
        self.set("IO", value);
    }

    pub fn file_name(&self) -> Option<&str> {
        self.get("filename")
    }

    pub fn set_file_name(&mut self, value: impl Into<String>) {
        self.set("filename", value);
    }

    pub fn relation_name(&self) -> Option<&str> {
        self.get("name")
    }

    pub fn set_relation_name(&mut self, value: impl Into<String>) {
        self.set("name", value);
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

impl fmt::Display for IoDirectives {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        write!(f, "}}")
    }
}

impl AstTranslator<'_> {
    /// Fill defaults into one directive: file IO, name-derived filename,
    /// directory joining for relative paths, and the tab-separated
    /// headerless layout of intermediate files.
    fn make_io_directive(
        &mut self,
        directive: &mut IoDirectives,
        relation: &Relation,
        file_path: &str,
        file_ext: &str,
        is_intermediate: bool,
    ) {
        let relation_name = self.variant_name(relation, RelationVariant::Base);
        directive.set_relation_name(relation_name.clone());

        if !directive.has("IO") {
            directive.set_io_type("file");
        }

        if directive.io_type() == Some("file") {
            if is_intermediate {
                directive.set("intermediate", "true");
                directive.set("delimiter", "\t");
                directive.set("headers", "false");
            }

            if !directive.has("filename") || is_intermediate {
                directive.set_file_name(format!("{}{}", relation_name, file_ext));
            }

            // Absolute paths are preserved; relative ones join the
            // configured directory.
            let file_name = directive.file_name().unwrap_or_default();
            if !file_name.starts_with('/') {
                directive.set_file_name(format!("{}/{}", file_path, file_name));
            }
        }
    }

    /// Resolve input directives for a relation. `file_path`/`file_ext`
    /// default to the fact directory and `.facts`.
    pub(crate) fn input_io_directives(
        &mut self,
        relation: &Relation,
        file_path: Option<&str>,
        file_ext: Option<&str>,
    ) -> Vec<IoDirectives> {
        let mut directives: Vec<IoDirectives> = relation
            .loads
            .iter()
            .map(|load| {
                let mut directive = IoDirectives::new();
                for (key, value) in &load.entries {
                    directive.set(key.clone(), value.clone());
                }
                directive
            })
            .collect();
        if directives.is_empty() {
            directives.push(IoDirectives::new());
        }

        let fact_dir = self.config.fact_dir.clone();
        let input_file_path = match file_path {
            Some(path) if !path.is_empty() => path.to_string(),
            _ => fact_dir,
        };
        let input_file_ext = match file_ext {
            Some(ext) if !ext.is_empty() => ext.to_string(),
            _ => ".facts".to_string(),
        };

        let is_intermediate = self.config.engine.is_some()
            && input_file_path == self.config.output_dir
            && input_file_ext == ".facts";

        for directive in &mut directives {
            self.make_io_directive(
                directive,
                relation,
                &input_file_path,
                &input_file_ext,
                is_intermediate,
            );
        }
        directives
    }

    /// Resolve output directives for a relation. With `output-dir = "-"`
    /// stores go to stdout (`stdoutprintsize` for print-size stores) with
    /// headers enabled.
    pub(crate) fn output_io_directives(
        &mut self,
        relation: &Relation,
        file_path: Option<&str>,
        file_ext: Option<&str>,
    ) -> Vec<IoDirectives> {
        let mut directives: Vec<IoDirectives> = Vec::new();

        if self.config.output_dir == "-" {
            let mut has_output = false;
            for store in &relation.stores {
                if store.print_size {
                    let mut directive = IoDirectives::new();
                    directive.set_io_type("stdoutprintsize");
                    directives.push(directive);
                } else if !has_output {
                    has_output = true;
                    let mut directive = IoDirectives::new();
                    directive.set_io_type("stdout");
                    directive.set("headers", "true");
                    directives.push(directive);
                }
            }
        } else {
            for store in &relation.stores {
                let mut directive = IoDirectives::new();
                for (key, value) in &store.entries {
                    directive.set(key.clone(), value.clone());
                }
                directives.push(directive);
            }
        }

        if directives.is_empty() {
            directives.push(IoDirectives::new());
        }

        let output_dir = self.config.output_dir.clone();
        let output_file_path = match file_path {
            Some(path) if !path.is_empty() => path.to_string(),
            _ => output_dir,
        };
        let output_file_ext = match file_ext {
            Some(ext) if !ext.is_empty() => ext.to_string(),
            _ => ".csv".to_string(),
        };

        let is_intermediate = self.config.engine.is_some()
            && output_file_path == self.config.output_dir
            && output_file_ext == ".facts";

        for directive in &mut directives {
            self.make_io_directive(
                directive,
                relation,
                &output_file_path,
                &output_file_ext,
                is_intermediate,
            );

            if !directive.has("attributeNames") {
                let delimiter = directive.get("delimiter").unwrap_or("\t").to_string();
                let mut names = relation.attribute_names();
                // Provenance columns are not written out.
                if self.config.provenance.is_enabled() {
                    names.truncate(names.len() - 1 - relation.height_parameters);
                }
                directive.set("attributeNames", names.join(&delimiter));
            }
        }
        directives
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{RecursiveClauses, RelationSchedule, SccGraph, TypeEnvironment};
    use crate::config::Config;
    use datalog_ast::{Attribute, IoDirective, Program};

    fn edge_program() -> Program {
        let mut program = Program::new();
        let mut edge = Relation::new(
            "edge",
            vec![Attribute::new("x", "number"), Attribute::new("y", "number")],
        );
        edge.is_input = true;
        program.add_relation(edge);
        program
    }

    fn with_translator<R>(
        config: Config,
        program: &Program,
        f: impl FnOnce(&mut AstTranslator<'_>) -> R,
    ) -> R {
        let scc_graph = SccGraph::build(program);
        let recursive = RecursiveClauses::new(&scc_graph);
        let type_env = TypeEnvironment::new();
        let schedule = RelationSchedule::build(&scc_graph);
        let mut translator = AstTranslator::new(
            &config,
            program,
            &scc_graph,
            &recursive,
            &type_env,
            &schedule,
        );
        f(&mut translator)
    }

    #[test]
    fn missing_keys_are_filled_with_defaults() {
        let program = edge_program();
        let mut config = Config::default();
        config.fact_dir = "/facts".to_string();
        with_translator(config, &program, |translator| {
            let relation = translator.program.relation("edge").unwrap();
            let directives = translator.input_io_directives(relation, None, None);
            assert_eq!(directives.len(), 1);
            assert_eq!(directives[0].io_type(), Some("file"));
            assert_eq!(directives[0].file_name(), Some("/facts/edge.facts"));
            assert_eq!(directives[0].relation_name(), Some("edge"));
        });
    }

    #[test]
    fn absolute_paths_are_preserved() {
        let mut program = edge_program();
        let mut load = IoDirective::new();
        load.set("filename", "/data/e.tsv");
        program.relation_mut("edge").unwrap().loads.push(load);

        with_translator(Config::default(), &program, |translator| {
            let relation = translator.program.relation("edge").unwrap();
            let directives = translator.input_io_directives(relation, None, None);
            assert_eq!(directives[0].file_name(), Some("/data/e.tsv"));
        });
    }

    #[test]
    fn stdout_mode_rewrites_output_directives() {
        let mut program = edge_program();
        {
            let edge = program.relation_mut("edge").unwrap();
            edge.is_output = true;
            edge.stores.push(IoDirective::new());
        }
        let mut config = Config::default();
        config.output_dir = "-".to_string();

        with_translator(config, &program, |translator| {
            let relation = translator.program.relation("edge").unwrap();
            let directives = translator.output_io_directives(relation, None, None);
            assert_eq!(directives[0].io_type(), Some("stdout"));
            assert_eq!(directives[0].get("headers"), Some("true"));
        });
    }

    #[test]
    fn output_attribute_names_default_to_schema() {
        let program = edge_program();
        with_translator(Config::default(), &program, |translator| {
            let relation = translator.program.relation("edge").unwrap();
            let directives = translator.output_io_directives(relation, None, None);
            assert_eq!(directives[0].get("attributeNames"), Some("x\ty"));
        });
    }
}

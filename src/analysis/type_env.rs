//! Type environment.

use std::collections::BTreeMap;

/// Maps declared type names to the single-character qualifiers carried on
/// IR relation attributes (`i` number, `u` unsigned, `f` float, `s` symbol,
/// `r` record).
///
/// The primitive types are always present; user-declared types are
/// registered by the front-end with the qualifier of their root primitive.
#[derive(Debug, Clone)]
pub struct TypeEnvironment {
    qualifiers: BTreeMap<String, String>,
}

impl TypeEnvironment {
    pub fn new() -> Self {
        let mut qualifiers = BTreeMap::new();
        qualifiers.insert("number".to_string(), "i".to_string());
        qualifiers.insert("unsigned".to_string(), "u".to_string());
        qualifiers.insert("float".to_string(), "f".to_string());
        qualifiers.insert("symbol".to_string(), "s".to_string());
        TypeEnvironment { qualifiers }
    }

    /// Register a user-declared type with its qualifier.
    pub fn register(&mut self, type_name: impl Into<String>, qualifier: impl Into<String>) {
        self.qualifiers.insert(type_name.into(), qualifier.into());
    }

    /// Qualifier for a type name; unknown names default to `i`, matching
    /// the numeric annotation columns added by the incremental rewrite.
    pub fn qualifier(&self, type_name: &str) -> &str {
        self.qualifiers
            .get(type_name)
            .map(String::as_str)
            .unwrap_or("i")
    }
}

impl Default for TypeEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_and_fallback() {
        let mut env = TypeEnvironment::new();
        assert_eq!(env.qualifier("symbol"), "s");
        assert_eq!(env.qualifier("number"), "i");
        assert_eq!(env.qualifier("no_such_type"), "i");
        env.register("node", "s");
        assert_eq!(env.qualifier("node"), "s");
    }
}

//! Declarative renaming of model tensor names.
//!
//! Exported models disagree on what they call their inputs (`module.`
//! prefixes, `input.1` style suffixes, renamed submodules). Instead of
//! ad-hoc string rewriting, a model declares the canonical names it needs
//! and an ordered rule list maps the names a file actually declares onto
//! them. Binding is strict: every canonical name must be bound exactly once
//! and no declared name may be left over.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One rewrite step. Rules run in order; each sees the previous output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RenameRule {
    /// Drop `prefix` when the name starts with it.
    StripPrefix { prefix: String },
    /// Drop `suffix` when the name ends with it.
    StripSuffix { suffix: String },
    /// Replace every occurrence of `from` with `to`.
    Replace { from: String, to: String },
    /// Rename an exact name.
    Exact { from: String, to: String },
}

impl RenameRule {
    pub fn apply(&self, name: &str) -> String {
        match self {
            Self::StripPrefix { prefix } => {
                name.strip_prefix(prefix.as_str()).unwrap_or(name).to_string()
            }
            Self::StripSuffix { suffix } => {
                name.strip_suffix(suffix.as_str()).unwrap_or(name).to_string()
            }
            Self::Replace { from, to } => name.replace(from.as_str(), to),
            Self::Exact { from, to } => {
                if name == from {
                    to.clone()
                } else {
                    name.to_string()
                }
            }
        }
    }
}

pub fn canonicalize(name: &str, rules: &[RenameRule]) -> String {
    rules
        .iter()
        .fold(name.to_string(), |acc, rule| rule.apply(&acc))
}

/// Canonical name -> name declared by the model file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameBinding {
    names: BTreeMap<String, String>,
}

impl NameBinding {
    /// Bind `declared` names onto `expected` canonical names.
    ///
    /// `model` only labels the error.
    pub fn bind(
        model: &str,
        declared: &[String],
        expected: &[&str],
        rules: &[RenameRule],
    ) -> Result<Self> {
        let mut names = BTreeMap::new();
        let mut unexpected = Vec::new();
        let mut duplicate = Vec::new();

        for name in declared {
            let canonical = canonicalize(name, rules);
            if !expected.contains(&canonical.as_str()) {
                unexpected.push(name.clone());
            } else if names.insert(canonical.clone(), name.clone()).is_some() {
                duplicate.push(canonical);
            }
        }

        let missing: Vec<&str> = expected
            .iter()
            .copied()
            .filter(|e| !names.contains_key(*e))
            .collect();

        if !missing.is_empty() || !unexpected.is_empty() || !duplicate.is_empty() {
            return Err(Error::unavailable(
                model,
                format!(
                    "tensor names do not bind: missing {missing:?}, \
                     unexpected {unexpected:?}, bound twice {duplicate:?}"
                ),
            ));
        }

        Ok(Self { names })
    }

    /// Declared name for a canonical name; falls back to the canonical name
    /// itself, which only happens for names that were never expected.
    pub fn name<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.names.get(canonical).map_or(canonical, String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rules_apply_in_order() {
        let rules = vec![
            RenameRule::StripPrefix {
                prefix: "module.".into(),
            },
            RenameRule::Replace {
                from: "net.".into(),
                to: "model.".into(),
            },
            RenameRule::Replace {
                from: ".block".into(),
                to: ".conv_block".into(),
            },
        ];
        assert_eq!(
            canonicalize("module.net.3.block.1", &rules),
            "model.3.conv_block.1"
        );
    }

    #[test]
    fn identity_binding_when_names_match() {
        let binding =
            NameBinding::bind("decoder", &declared(&["a", "b"]), &["a", "b"], &[]).unwrap();
        assert_eq!(binding.name("a"), "a");
    }

    #[test]
    fn renamed_inputs_are_bound() {
        let rules = vec![RenameRule::StripSuffix {
            suffix: ".1".into(),
        }];
        let binding = NameBinding::bind(
            "decoder",
            &declared(&["point_coords.1", "point_labels"]),
            &["point_coords", "point_labels"],
            &rules,
        )
        .unwrap();
        assert_eq!(binding.name("point_coords"), "point_coords.1");
        assert_eq!(binding.name("point_labels"), "point_labels");
    }

    #[test]
    fn partial_bindings_fail_fast() {
        let missing = NameBinding::bind("decoder", &declared(&["a"]), &["a", "b"], &[]);
        assert!(matches!(missing, Err(Error::BackendUnavailable { .. })));

        let extra = NameBinding::bind("decoder", &declared(&["a", "b", "c"]), &["a", "b"], &[]);
        assert!(matches!(extra, Err(Error::BackendUnavailable { .. })));

        let rules = vec![RenameRule::Exact {
            from: "x".into(),
            to: "a".into(),
        }];
        let twice = NameBinding::bind("decoder", &declared(&["a", "x"]), &["a"], &rules);
        assert!(matches!(twice, Err(Error::BackendUnavailable { .. })));
    }
}

use crate::error::{LinkError, Result};
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const BUILTIN_CATALOG: &str = include_str!("catalog.toml");

/// How a relation value and a target id are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Byte-for-byte
    Exact,

    /// Surrounding whitespace ignored
    #[default]
    Trim,

    /// Trimmed and lowercased
    CaseInsensitive,
}

impl Normalization {
    pub fn apply(self, raw: &str) -> String {
        match self {
            Normalization::Exact => raw.to_string(),
            Normalization::Trim => raw.trim().to_string(),
            Normalization::CaseInsensitive => raw.trim().to_lowercase(),
        }
    }
}

/// Where one record ends and the next begins inside a section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSeparator {
    /// A blank line closes the current record
    #[default]
    BlankLine,

    /// A field line starting with the prefix opens a new record
    Prefix(String),
}

/// One participating application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindDef {
    pub name: String,
    pub delimiter: String,

    #[serde(default = "default_id_field")]
    pub id_field: String,

    #[serde(default)]
    pub separator: RecordSeparator,
}

/// Field `field` of `from` records references ids of `to` records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationRule {
    pub name: String,
    pub from: String,
    pub field: String,
    pub to: String,

    #[serde(default)]
    pub normalize: Normalization,

    /// Value is a comma-separated list of ids
    #[serde(default)]
    pub list: bool,

    /// Output field, `<name>_target` when unset
    #[serde(default)]
    pub target_field: Option<String>,
}

impl RelationRule {
    pub fn target_field(&self) -> String {
        self.target_field
            .clone()
            .unwrap_or_else(|| format!("{}_target", self.name))
    }

    /// Raw ids referenced by `value`, empty items skipped.
    pub fn split_values<'a>(&self, value: &'a str) -> Vec<&'a str> {
        if self.list {
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .collect()
        } else if value.trim().is_empty() {
            Vec::new()
        } else {
            vec![value]
        }
    }
}

/// Kinds, delimiters, and relations: the whole linking configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Prefix identifying delimiter candidate lines
    #[serde(default = "default_marker")]
    pub marker: String,

    #[serde(default = "default_all_links_field")]
    pub all_links_field: String,

    #[serde(default = "default_debug_field")]
    pub debug_field: String,

    /// Kind whose records receive the debug listing
    #[serde(default)]
    pub aggregator: Option<String>,

    #[serde(default, rename = "kind")]
    pub kinds: Vec<KindDef>,

    #[serde(default, rename = "relation")]
    pub relations: Vec<RelationRule>,
}

fn default_version() -> u32 {
    1
}

fn default_marker() -> String {
    "---".to_string()
}

fn default_all_links_field() -> String {
    "all_links".to_string()
}

fn default_debug_field() -> String {
    "debug_links".to_string()
}

fn default_id_field() -> String {
    "id".to_string()
}

impl Catalog {
    /// Catalog shipped with the linker.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let catalog: Catalog =
            toml::from_str(text).map_err(|err| LinkError::Catalog(err.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let catalog: Catalog =
            serde_json::from_str(text).map_err(|err| LinkError::Catalog(err.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse a catalog file: JSON when it opens with `{`, TOML otherwise.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|err| LinkError::Catalog(format!("catalog is not UTF-8: {err}")))?;
        if text.trim_start().starts_with('{') {
            Self::from_json_str(text)
        } else {
            Self::from_toml_str(text)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.marker.trim().is_empty() {
            return Err(LinkError::Catalog("marker must not be empty".into()));
        }

        let mut names = HashSet::new();
        let mut delimiters = HashSet::new();
        for kind in &self.kinds {
            if kind.name.is_empty() {
                return Err(LinkError::Catalog("kind with empty name".into()));
            }
            if !names.insert(kind.name.as_str()) {
                return Err(LinkError::Catalog(format!("duplicate kind '{}'", kind.name)));
            }
            let delimiter = kind.delimiter.trim();
            if !delimiter.starts_with(self.marker.as_str()) {
                return Err(LinkError::Catalog(format!(
                    "delimiter '{}' of kind '{}' does not start with marker '{}'",
                    kind.delimiter, kind.name, self.marker
                )));
            }
            if !delimiters.insert(delimiter) {
                return Err(LinkError::Catalog(format!(
                    "delimiter '{}' declared twice",
                    kind.delimiter
                )));
            }
            if let RecordSeparator::Prefix(prefix) = &kind.separator {
                if prefix.is_empty() {
                    return Err(LinkError::Catalog(format!(
                        "kind '{}' has an empty record prefix",
                        kind.name
                    )));
                }
            }
        }

        if let Some(aggregator) = &self.aggregator {
            if !names.contains(aggregator.as_str()) {
                return Err(LinkError::Catalog(format!(
                    "aggregator '{aggregator}' is not a declared kind"
                )));
            }
        }

        if self.all_links_field == self.debug_field {
            return Err(LinkError::Catalog(
                "debug field collides with the all-links field".into(),
            ));
        }

        let mut rule_names = HashSet::new();
        for rule in &self.relations {
            for end in [&rule.from, &rule.to] {
                if !names.contains(end.as_str()) {
                    return Err(LinkError::Catalog(format!(
                        "relation '{}' references unknown kind '{end}'",
                        rule.name
                    )));
                }
            }
            if !rule_names.insert((rule.from.as_str(), rule.name.as_str())) {
                return Err(LinkError::Catalog(format!(
                    "relation '{}' declared twice for kind '{}'",
                    rule.name, rule.from
                )));
            }
        }

        for kind in &self.kinds {
            let mut outputs = HashSet::from([
                self.all_links_field.clone(),
                self.debug_field.clone(),
                kind.id_field.clone(),
            ]);
            let rules: Vec<&RelationRule> = self.rules_from(&kind.name).map(|(_, r)| r).collect();
            for rule in &rules {
                if !outputs.insert(rule.target_field()) {
                    return Err(LinkError::Catalog(format!(
                        "output field '{}' of relation '{}' collides with another field",
                        rule.target_field(),
                        rule.name
                    )));
                }
            }
            for rule in &rules {
                if outputs.contains(&rule.field) && rule.field != kind.id_field {
                    return Err(LinkError::Catalog(format!(
                        "relation '{}' reads from derived field '{}'",
                        rule.name, rule.field
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn kind(&self, name: &str) -> Option<&KindDef> {
        self.kinds.iter().find(|kind| kind.name == name)
    }

    pub fn kind_by_delimiter(&self, line: &str) -> Option<&KindDef> {
        let line = line.trim();
        self.kinds.iter().find(|kind| kind.delimiter.trim() == line)
    }

    pub fn is_delimiter_candidate(&self, line: &str) -> bool {
        line.trim_start().starts_with(self.marker.as_str())
    }

    /// Rules declared on `kind`, in declaration order, with their catalog index.
    pub fn rules_from<'a>(
        &'a self,
        kind: &'a str,
    ) -> impl Iterator<Item = (usize, &'a RelationRule)> + 'a {
        self.relations
            .iter()
            .enumerate()
            .filter(move |(_, rule)| rule.from == kind)
    }

    pub fn rules_between<'a>(
        &'a self,
        from: &'a str,
        to: &'a str,
    ) -> impl Iterator<Item = &'a RelationRule> + 'a {
        self.relations
            .iter()
            .filter(move |rule| rule.from == from && rule.to == to)
    }

    /// Kinds `kind` must wait for, excluding itself.
    pub fn depends_on<'a>(&'a self, kind: &'a str) -> Vec<&'a str> {
        let mut deps: Vec<&str> = Vec::new();
        for rule in self.relations.iter().filter(|rule| rule.from == kind) {
            if rule.to != kind && !deps.contains(&rule.to.as_str()) {
                deps.push(rule.to.as_str());
            }
        }
        deps
    }

    /// Field names the resolver owns on records of `kind`.
    pub fn derived_fields(&self, kind: &str) -> HashSet<String> {
        let mut fields: HashSet<String> = self
            .rules_from(kind)
            .map(|(_, rule)| rule.target_field())
            .collect();
        fields.insert(self.all_links_field.clone());
        fields.insert(self.debug_field.clone());
        fields
    }

    /// Kinds ordered so every relation target comes before its source.
    ///
    /// Self-relations are not dependencies; the aggregate relation is never part
    /// of this graph.
    pub fn dependency_order(&self) -> Result<Vec<String>> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for kind in &self.kinds {
            index.insert(kind.name.as_str(), graph.add_node(kind.name.as_str()));
        }

        for rule in &self.relations {
            if rule.from == rule.to {
                continue;
            }
            let (Some(&target), Some(&source)) =
                (index.get(rule.to.as_str()), index.get(rule.from.as_str()))
            else {
                return Err(LinkError::Catalog(format!(
                    "relation '{}' references an undeclared kind",
                    rule.name
                )));
            };
            graph.update_edge(target, source, ());
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(|idx| graph[idx].to_string()).collect()),
            Err(cycle) => {
                let start = cycle.node_id();
                let component = tarjan_scc(&graph)
                    .into_iter()
                    .find(|scc| scc.contains(&start))
                    .unwrap_or_else(|| vec![start]);
                let mut kinds: Vec<String> = self
                    .kinds
                    .iter()
                    .filter(|kind| component.iter().any(|&idx| graph[idx] == kind.name))
                    .map(|kind| kind.name.clone())
                    .collect();
                if let Some(first) = kinds.first().cloned() {
                    kinds.push(first);
                }
                Err(LinkError::DependencyCycle { kinds })
            }
        }
    }
}

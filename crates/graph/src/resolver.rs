use crate::builder::GraphBuilder;
use crate::catalog::{Catalog, RelationRule};
use crate::error::{LinkError, Result, UnresolvedLinkWarning};
use crate::types::{Document, LinkGraph, ResolvedLink, ALL_LINKS, DEBUG_LINKS};
use petgraph::graph::NodeIndex;
use std::collections::{HashMap, HashSet};

/// Order in which sections are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolveMode {
    /// Repeated passes in file order until every section is resolved
    #[default]
    Naive,

    /// Single pass in kind dependency order
    Fast,
}

impl ResolveMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            ResolveMode::Naive => "naive",
            ResolveMode::Fast => "fast",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    pub mode: ResolveMode,

    /// Attach the debug listing to the aggregator's records
    pub with_debug: bool,
}

/// Outcome of a successful resolution.
#[derive(Debug)]
pub struct LinkReport {
    pub mode: ResolveMode,
    pub sections: usize,
    pub records: usize,

    /// Resolved (source, target) pairs across all declared relations
    pub links: usize,

    /// Scheduling passes over the sections
    pub passes: usize,

    /// Kinds in the order their sections were resolved
    pub schedule: Vec<String>,

    pub warnings: Vec<UnresolvedLinkWarning>,

    pub graph: LinkGraph,
}

/// Resolved targets per record, grouped by rule index in declaration order.
type Resolution = HashMap<NodeIndex, Vec<(usize, Vec<NodeIndex>)>>;

pub struct Resolver<'a> {
    catalog: &'a Catalog,
    options: ResolveOptions,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a Catalog, options: ResolveOptions) -> Self {
        Self { catalog, options }
    }

    /// Resolve every declared relation, then the aggregate, into `document`.
    ///
    /// A cyclic catalog is rejected in both modes so they always agree.
    pub fn resolve(&self, document: &mut Document) -> Result<LinkReport> {
        let order = self.catalog.dependency_order()?;

        document.clear_resolved();
        let graph = GraphBuilder::new(self.catalog).build(document);
        let mut resolution = Resolution::new();

        let (schedule, passes) = match self.options.mode {
            ResolveMode::Naive => self.run_naive(document, &graph, &mut resolution)?,
            ResolveMode::Fast => self.run_fast(document, &graph, &order, &mut resolution),
        };

        self.aggregate(document, &graph, &resolution);
        if self.options.with_debug {
            self.attach_debug(document, &graph, &resolution);
        }

        let warnings = self.warnings(&graph);
        let links = resolution
            .values()
            .flat_map(|groups| groups.iter())
            .map(|(_, targets)| targets.len())
            .sum();

        log::info!(
            "Resolved {links} links across {} sections ({} mode, {passes} passes, {} unresolved)",
            document.sections.len(),
            self.options.mode.as_str(),
            warnings.len()
        );

        Ok(LinkReport {
            mode: self.options.mode,
            sections: document.sections.len(),
            records: document.record_count(),
            links,
            passes,
            schedule,
            warnings,
            graph,
        })
    }

    fn is_ready(&self, document: &Document, section_idx: usize, done: &HashSet<String>) -> bool {
        let kind = &document.sections[section_idx].kind;
        self.catalog
            .depends_on(kind)
            .into_iter()
            .all(|dep| done.contains(dep) || document.section(dep).is_none())
    }

    fn run_naive(
        &self,
        document: &mut Document,
        graph: &LinkGraph,
        resolution: &mut Resolution,
    ) -> Result<(Vec<String>, usize)> {
        let mut pending: Vec<usize> = (0..document.sections.len()).collect();
        let mut done: HashSet<String> = HashSet::new();
        let mut schedule = Vec::new();
        let mut passes = 0;

        while !pending.is_empty() {
            passes += 1;
            let before = pending.len();
            let mut waiting = Vec::new();

            for section_idx in pending {
                if self.is_ready(document, section_idx, &done) {
                    self.resolve_section(document, graph, section_idx, resolution);
                    let kind = document.sections[section_idx].kind.clone();
                    done.insert(kind.clone());
                    schedule.push(kind);
                } else {
                    waiting.push(section_idx);
                }
            }

            if waiting.len() == before {
                return Err(LinkError::DependencyCycle {
                    kinds: waiting
                        .iter()
                        .map(|&idx| document.sections[idx].kind.clone())
                        .collect(),
                });
            }
            log::debug!("Naive pass {passes}: {} sections waiting", waiting.len());
            pending = waiting;
        }

        Ok((schedule, passes))
    }

    fn run_fast(
        &self,
        document: &mut Document,
        graph: &LinkGraph,
        order: &[String],
        resolution: &mut Resolution,
    ) -> (Vec<String>, usize) {
        let mut scheduled: Vec<usize> = order
            .iter()
            .filter_map(|kind| document.sections.iter().position(|s| &s.kind == kind))
            .collect();
        // Kinds outside the catalog declare nothing; resolve them last.
        for idx in 0..document.sections.len() {
            if !scheduled.contains(&idx) {
                scheduled.push(idx);
            }
        }

        let mut schedule = Vec::with_capacity(scheduled.len());
        for section_idx in scheduled {
            self.resolve_section(document, graph, section_idx, resolution);
            schedule.push(document.sections[section_idx].kind.clone());
        }
        (schedule, 1)
    }

    /// Shared by both modes: resolve the declared relations of one section.
    fn resolve_section(
        &self,
        document: &mut Document,
        graph: &LinkGraph,
        section_idx: usize,
        resolution: &mut Resolution,
    ) {
        let kind = document.sections[section_idx].kind.clone();
        let rules: Vec<(usize, &RelationRule)> = self.catalog.rules_from(&kind).collect();
        if rules.is_empty() {
            return;
        }

        let section = &mut document.sections[section_idx];
        for (record_idx, record) in section.records.iter_mut().enumerate() {
            let Some(node) = graph.find_record(section_idx, record_idx) else {
                continue;
            };

            let mut groups = Vec::new();
            for &(rule_idx, rule) in &rules {
                let targets = graph.targets_for(node, rule_idx);
                if targets.is_empty() {
                    continue;
                }
                record.resolved.push(ResolvedLink {
                    relation: rule.name.clone(),
                    field: rule.target_field(),
                    targets: targets
                        .iter()
                        .filter_map(|&target| graph.get_node(target))
                        .map(|target| target.id.clone())
                        .collect(),
                });
                groups.push((rule_idx, targets));
            }
            resolution.insert(node, groups);
        }
    }

    /// Final pass: union of each record's resolved targets, grouped by relation.
    fn aggregate(&self, document: &mut Document, graph: &LinkGraph, resolution: &Resolution) {
        for (section_idx, section) in document.sections.iter_mut().enumerate() {
            for (record_idx, record) in section.records.iter_mut().enumerate() {
                let Some(groups) = graph
                    .find_record(section_idx, record_idx)
                    .and_then(|node| resolution.get(&node))
                else {
                    continue;
                };

                let mut seen = HashSet::new();
                let targets: Vec<String> = groups
                    .iter()
                    .flat_map(|(_, targets)| targets.iter())
                    .filter(|target| seen.insert(**target))
                    .map(|&target| graph.graph[target].to_string())
                    .collect();

                if !targets.is_empty() {
                    record.resolved.push(ResolvedLink {
                        relation: ALL_LINKS.to_string(),
                        field: self.catalog.all_links_field.clone(),
                        targets,
                    });
                }
            }
        }
    }

    /// Every link from every other kind, listed on the aggregator's records.
    fn attach_debug(&self, document: &mut Document, graph: &LinkGraph, resolution: &Resolution) {
        let Some(aggregator) = self.catalog.aggregator.as_deref() else {
            log::warn!("Debug links requested but the catalog declares no aggregator");
            return;
        };
        let Some(aggregator_idx) = document.sections.iter().position(|s| s.kind == aggregator)
        else {
            log::warn!("Debug links requested but no '{aggregator}' section is present");
            return;
        };

        let mut entries = Vec::new();
        for (section_idx, section) in document.sections.iter().enumerate() {
            if section.kind == aggregator {
                continue;
            }
            for record_idx in 0..section.records.len() {
                let Some(node) = graph.find_record(section_idx, record_idx) else {
                    continue;
                };
                for (rule_idx, targets) in resolution.get(&node).into_iter().flatten() {
                    let relation = &self.catalog.relations[*rule_idx].name;
                    for &target in targets {
                        entries.push(format!(
                            "{}>{relation}>{}",
                            graph.graph[node], graph.graph[target]
                        ));
                    }
                }
            }
        }

        if entries.is_empty() {
            return;
        }
        log::debug!("Attaching {} debug links to '{aggregator}'", entries.len());
        for record in &mut document.sections[aggregator_idx].records {
            record.resolved.push(ResolvedLink {
                relation: DEBUG_LINKS.to_string(),
                field: self.catalog.debug_field.clone(),
                targets: entries.clone(),
            });
        }
    }

    fn warnings(&self, graph: &LinkGraph) -> Vec<UnresolvedLinkWarning> {
        graph
            .dangling
            .iter()
            .filter_map(|dangling| {
                let node = graph.get_node(dangling.source)?;
                let rule = self.catalog.relations.get(dangling.relation)?;
                Some(UnresolvedLinkWarning {
                    kind: node.kind.clone(),
                    record: node.id.clone(),
                    relation: rule.name.clone(),
                    value: dangling.value.clone(),
                })
            })
            .collect()
    }
}

use crate::catalog::{Catalog, Normalization};
use crate::types::{Document, LinkGraph, LinkNode};
use std::collections::HashMap;

/// Normalized id -> record position, per (section, normalization).
type IdIndex = HashMap<(usize, Normalization), HashMap<String, usize>>;

/// Build the link graph of candidate cross-references from a parsed document
pub struct GraphBuilder<'a> {
    catalog: &'a Catalog,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn build(&self, document: &Document) -> LinkGraph {
        let mut graph = LinkGraph::new();

        // Phase 1: one node per record
        for (section_idx, section) in document.sections.iter().enumerate() {
            for (record_idx, record) in section.records.iter().enumerate() {
                graph.add_node(LinkNode {
                    kind: section.kind.clone(),
                    id: record.id.clone(),
                    section: section_idx,
                    record: record_idx,
                });
            }
        }

        // Phase 2: candidate edges, in section, record, then rule order
        let mut index: IdIndex = HashMap::new();
        for (section_idx, section) in document.sections.iter().enumerate() {
            for (record_idx, record) in section.records.iter().enumerate() {
                let Some(source) = graph.find_record(section_idx, record_idx) else {
                    continue;
                };

                for (rule_idx, rule) in self.catalog.rules_from(&section.kind) {
                    let Some(value) = record.field(&rule.field) else {
                        continue;
                    };
                    let target_section = document
                        .sections
                        .iter()
                        .position(|candidate| candidate.kind == rule.to);

                    for item in rule.split_values(value) {
                        let found = target_section.and_then(|target_idx| {
                            let ids = index.entry((target_idx, rule.normalize)).or_insert_with(|| {
                                id_lookup(document, target_idx, rule.normalize)
                            });
                            ids.get(&rule.normalize.apply(item))
                                .map(|&target_record| (target_idx, target_record))
                        });

                        match found.and_then(|(s, r)| graph.find_record(s, r)) {
                            Some(target) => graph.add_edge(source, target, rule_idx, &rule.name),
                            None => {
                                log::debug!(
                                    "{}:{} {} -> '{}' has no match in '{}'",
                                    section.kind,
                                    record.id,
                                    rule.name,
                                    item.trim(),
                                    rule.to
                                );
                                graph.add_dangling(source, rule_idx, item.trim());
                            }
                        }
                    }
                }
            }
        }

        log::info!(
            "Built link graph: {} nodes, {} edges, {} dangling",
            graph.node_count(),
            graph.edge_count(),
            graph.dangling.len()
        );

        graph
    }
}

/// First record wins when two ids normalize to the same key.
fn id_lookup(document: &Document, section: usize, normalize: Normalization) -> HashMap<String, usize> {
    let mut ids = HashMap::new();
    for (record_idx, record) in document.sections[section].records.iter().enumerate() {
        ids.entry(normalize.apply(&record.id)).or_insert(record_idx);
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::DocumentParser;
    use petgraph::visit::EdgeRef;

    fn build(text: &str) -> (Document, LinkGraph) {
        let catalog = Catalog::builtin().unwrap();
        let doc = DocumentParser::new(&catalog).parse(text).unwrap();
        let graph = GraphBuilder::new(&catalog).build(&doc);
        (doc, graph)
    }

    #[test]
    fn test_build_simple_graph() {
        let (_, graph) = build("--- quiz\nid=Q1\nreward=t7\n\n--- treasure\nid=T7\nname=Gold\n");

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        let edge = graph.graph.edge_references().next().unwrap();
        assert_eq!(graph.graph[edge.source()].id, "Q1");
        assert_eq!(graph.graph[edge.target()].id, "T7");
        assert_eq!(edge.weight().name, "reward");
        assert!(graph.dangling.is_empty());
    }

    #[test]
    fn missing_target_becomes_dangling() {
        let (_, graph) = build("--- quiz\nid=Q1\nreward=T9\n\n--- treasure\nid=T7\n");

        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.dangling.len(), 1);
        assert_eq!(graph.dangling[0].value, "T9");
    }

    #[test]
    fn missing_target_section_dangles_every_value() {
        let (_, graph) = build("--- hub\nid=H\nentry=Q1,Q2\n");

        assert_eq!(graph.edge_count(), 0);
        let values: Vec<&str> = graph.dangling.iter().map(|d| d.value.as_str()).collect();
        assert_eq!(values, vec!["Q1", "Q2"]);
    }

    #[test]
    fn self_reference_is_an_edge() {
        let (_, graph) = build("--- quiz\nid=Q1\nquest=Q1\n");

        assert_eq!(graph.edge_count(), 1);
        let edge = graph.graph.edge_references().next().unwrap();
        assert_eq!(edge.source(), edge.target());
    }

    #[test]
    fn discovery_order_follows_sections_records_and_rules() {
        let (_, graph) = build(
            "--- quiz\nid=Q1\nquest=Q2\nreward=T1\n\nid=Q2\nreward=T1\n\n--- treasure\nid=T1\n",
        );

        let mut edges: Vec<_> = graph.graph.edge_references().collect();
        edges.sort_by_key(|e| e.weight().order);
        let seen: Vec<(String, &str)> = edges
            .iter()
            .map(|e| (graph.graph[e.source()].id.clone(), e.weight().name.as_str()))
            .collect();
        assert_eq!(
            seen,
            vec![
                ("Q1".to_string(), "reward"),
                ("Q1".to_string(), "quest"),
                ("Q2".to_string(), "reward"),
            ]
        );
    }
}

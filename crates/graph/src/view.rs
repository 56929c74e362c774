use crate::types::{LinkGraph, LinkNode};
use linker_protocol::{GraphPreview, PreviewEdge, PreviewNode};
use petgraph::dot::Dot;
use petgraph::visit::EdgeRef;

fn preview_node(node: &LinkNode) -> PreviewNode {
    PreviewNode {
        kind: node.kind.clone(),
        id: node.id.clone(),
    }
}

impl LinkGraph {
    /// Read-only snapshot for preview renderers: records and resolved edges.
    pub fn preview(&self) -> GraphPreview {
        let nodes = self.nodes().map(|(_, node)| preview_node(node)).collect();

        let mut edges: Vec<_> = self.graph.edge_references().collect();
        edges.sort_by_key(|edge| edge.weight().order);
        let edges = edges
            .into_iter()
            .map(|edge| PreviewEdge {
                source: preview_node(&self.graph[edge.source()]),
                target: preview_node(&self.graph[edge.target()]),
                relation: edge.weight().name.clone(),
            })
            .collect();

        GraphPreview { nodes, edges }
    }

    /// Graphviz DOT text of the resolved graph.
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::new(&self.graph))
    }
}

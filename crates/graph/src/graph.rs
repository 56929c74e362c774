use crate::types::{LinkEdge, LinkGraph};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;

impl LinkGraph {
    /// Outgoing edges of `node` in discovery order.
    ///
    /// petgraph yields adjacency in reverse insertion order, so edges are sorted
    /// by their discovery stamp.
    pub fn outgoing(&self, node: NodeIndex) -> Vec<(&LinkEdge, NodeIndex)> {
        let mut edges: Vec<(&LinkEdge, NodeIndex)> = self
            .graph
            .edges(node)
            .map(|e| (e.weight(), e.target()))
            .collect();
        edges.sort_by_key(|(edge, _)| edge.order);
        edges
    }

    /// Distinct targets of `node` through one relation rule.
    pub fn targets_for(&self, node: NodeIndex, relation: usize) -> Vec<NodeIndex> {
        let mut targets: Vec<NodeIndex> = Vec::new();
        for (edge, target) in self.outgoing(node) {
            if edge.relation == relation && !targets.contains(&target) {
                targets.push(target);
            }
        }
        targets
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{LinkGraph, LinkNode};

    fn node(id: &str, record: usize) -> LinkNode {
        LinkNode {
            kind: "quiz".to_string(),
            id: id.to_string(),
            section: 0,
            record,
        }
    }

    #[test]
    fn outgoing_keeps_discovery_order_and_targets_dedupe() {
        let mut graph = LinkGraph::new();
        let a = graph.add_node(node("A", 0));
        let b = graph.add_node(node("B", 1));
        let c = graph.add_node(node("C", 2));

        graph.add_edge(a, c, 0, "quest");
        graph.add_edge(a, b, 0, "quest");
        graph.add_edge(a, c, 0, "quest");
        graph.add_edge(b, a, 1, "reward");

        let order: Vec<_> = graph.outgoing(a).into_iter().map(|(_, t)| t).collect();
        assert_eq!(order, vec![c, b, c]);
        assert_eq!(graph.targets_for(a, 0), vec![c, b]);
        assert!(graph.targets_for(a, 1).is_empty());
    }
}

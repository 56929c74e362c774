use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Relation name of the synthesized aggregate over every resolved relation.
pub const ALL_LINKS: &str = "ALL_LINKS";

/// Relation name of the aggregator's debug listing.
pub const DEBUG_LINKS: &str = "DEBUG_LINKS";

/// One line of a record body, kept verbatim for lossless output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// `key=value` line: key trimmed, value untouched, raw text kept for output
    Field {
        key: String,
        value: String,
        raw: String,
    },

    /// Blank line or `#` comment
    Raw(String),
}

/// Relation resolved for one record, written back as `field=targets`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub relation: String,
    pub field: String,
    pub targets: Vec<String>,
}

/// One entity inside a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,

    /// Source line of the record's first field (1-based)
    pub line: usize,

    pub lines: Vec<Line>,

    /// Populated by the resolver only
    pub resolved: Vec<ResolvedLink>,
}

impl Record {
    /// First value stored under `key`.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            Line::Field { key: k, value, .. } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| match line {
            Line::Field { key, value, .. } => Some((key.as_str(), value.as_str())),
            Line::Raw(_) => None,
        })
    }

    pub fn resolved(&self, relation: &str) -> Option<&ResolvedLink> {
        self.resolved.iter().find(|link| link.relation == relation)
    }
}

/// The block of text belonging to one application kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: String,

    /// Delimiter line exactly as found in the file
    pub delimiter: String,

    /// Raw lines between the delimiter and the first record
    pub header: Vec<String>,

    pub records: Vec<Record>,
}

impl Section {
    pub fn record(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }
}

/// A whole data file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Blank and comment lines before the first delimiter
    pub preamble: Vec<String>,

    pub sections: Vec<Section>,

    pub crlf: bool,
    pub trailing_newline: bool,
}

impl Document {
    pub fn section(&self, kind: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.kind == kind)
    }

    pub fn record_count(&self) -> usize {
        self.sections.iter().map(|section| section.records.len()).sum()
    }

    /// Drop every relation resolved by a previous run.
    pub fn clear_resolved(&mut self) {
        for record in self.sections.iter_mut().flat_map(|s| s.records.iter_mut()) {
            record.resolved.clear();
        }
    }
}

/// Node in the link graph: one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkNode {
    pub kind: String,
    pub id: String,

    /// Position of the record in the document
    pub section: usize,
    pub record: usize,
}

/// Candidate cross-reference discovered by the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEdge {
    /// Index of the relation rule in the catalog
    pub relation: usize,

    pub name: String,

    /// Discovery order across the whole graph
    pub order: usize,
}

impl std::fmt::Display for LinkEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

impl std::fmt::Display for LinkNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Relation value with no matching target record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingLink {
    pub source: NodeIndex,
    pub relation: usize,
    pub value: String,
}

/// Records joined by candidate cross-references.
#[derive(Debug)]
pub struct LinkGraph {
    /// Directed graph (source record -> target record per relation)
    pub graph: DiGraph<LinkNode, LinkEdge>,

    /// (section, record) -> NodeIndex mapping
    pub record_index: HashMap<(usize, usize), NodeIndex>,

    /// Unmatched relation values in discovery order
    pub dangling: Vec<DanglingLink>,

    next_order: usize,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            record_index: HashMap::new(),
            dangling: Vec::new(),
            next_order: 0,
        }
    }

    /// Add node to graph
    pub fn add_node(&mut self, node: LinkNode) -> NodeIndex {
        let key = (node.section, node.record);
        let idx = self.graph.add_node(node);
        self.record_index.insert(key, idx);
        idx
    }

    /// Add candidate edge, stamping its discovery order
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, relation: usize, name: &str) {
        let edge = LinkEdge {
            relation,
            name: name.to_string(),
            order: self.next_order,
        };
        self.next_order += 1;
        self.graph.add_edge(from, to, edge);
    }

    pub fn add_dangling(&mut self, source: NodeIndex, relation: usize, value: &str) {
        self.dangling.push(DanglingLink {
            source,
            relation,
            value: value.to_string(),
        });
    }

    /// Find node by record position
    pub fn find_record(&self, section: usize, record: usize) -> Option<NodeIndex> {
        self.record_index.get(&(section, record)).copied()
    }

    /// Get node data
    pub fn get_node(&self, idx: NodeIndex) -> Option<&LinkNode> {
        self.graph.node_weight(idx)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &LinkNode)> {
        self.graph
            .node_indices()
            .filter_map(move |idx| self.graph.node_weight(idx).map(|node| (idx, node)))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

impl Default for LinkGraph {
    fn default() -> Self {
        Self::new()
    }
}

//! # Linker Graph
//!
//! Cross-links records of several applications stored in one sectioned text file.
//!
//! ## Architecture
//!
//! ```text
//! data file text
//!     │
//!     ├──> Document Parser
//!     │      ├─ Split sections on delimiter lines
//!     │      ├─ Split records (blank line or prefix)
//!     │      └─ Keep every source line verbatim
//!     │
//!     ├──> Graph Builder (petgraph)
//!     │      ├─ Nodes: records
//!     │      ├─ Edges: relation values matching a target id
//!     │      └─ Dangling: values matching nothing
//!     │
//!     ├──> Resolver
//!     │      ├─ naive: repeated passes in file order
//!     │      ├─ fast: one pass in kind dependency order
//!     │      └─ ALL_LINKS (+ debug listing) in a final pass
//!     │
//!     └──> Serializer
//!            └─ Source lines + injected `field=targets` lines
//! ```

mod builder;
mod catalog;
mod error;
mod graph;
mod parser;
mod resolver;
mod serializer;
mod types;
mod view;

pub use builder::GraphBuilder;
pub use catalog::{Catalog, KindDef, Normalization, RecordSeparator, RelationRule};
pub use error::{LinkError, Result, UnresolvedLinkWarning};
pub use parser::DocumentParser;
pub use resolver::{LinkReport, ResolveMode, ResolveOptions, Resolver};
pub use serializer::serialize;
pub use types::{
    DanglingLink, Document, Line, LinkEdge, LinkGraph, LinkNode, Record, ResolvedLink, Section,
    ALL_LINKS, DEBUG_LINKS,
};

/// Parse, resolve, and serialize in one step.
///
/// Nothing is returned unless every stage succeeds.
pub fn link(text: &str, catalog: &Catalog, options: ResolveOptions) -> Result<(String, LinkReport)> {
    let mut document = DocumentParser::new(catalog).parse(text)?;
    let report = Resolver::new(catalog, options).resolve(&mut document)?;
    Ok((serialize(&document), report))
}

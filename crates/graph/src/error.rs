use thiserror::Error;

pub type Result<T> = std::result::Result<T, LinkError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Malformed input at line {line}: {message}")]
    MalformedInput { line: usize, message: String },

    #[error("Duplicate id '{id}' in section '{kind}' at line {line}")]
    DuplicateKey { kind: String, id: String, line: usize },

    #[error("Field outside any section at line {line}: {content}")]
    OrphanData { line: usize, content: String },

    #[error("Dependency cycle between kinds: {}", kinds.join(" -> "))]
    DependencyCycle { kinds: Vec<String> },

    #[error("Invalid relation catalog: {0}")]
    Catalog(String),
}

impl LinkError {
    pub(crate) fn malformed(line: usize, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            line,
            message: message.into(),
        }
    }

    /// Stable machine-readable code for reports and exit messages.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedInput { .. } => "malformed_input",
            Self::DuplicateKey { .. } => "duplicate_key",
            Self::OrphanData { .. } => "orphan_data",
            Self::DependencyCycle { .. } => "dependency_cycle",
            Self::Catalog(_) => "catalog",
        }
    }
}

/// A relation value that matched no record of the target kind.
///
/// Non-fatal: the relation field is left out of the output and the run goes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedLinkWarning {
    pub kind: String,
    pub record: String,
    pub relation: String,
    pub value: String,
}

impl std::fmt::Display for UnresolvedLinkWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} {} -> '{}' not found",
            self.kind, self.record, self.relation, self.value
        )
    }
}

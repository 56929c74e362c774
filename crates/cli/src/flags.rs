use clap::ValueEnum;
use linker_graph::ResolveMode;

#[derive(Copy, Clone, ValueEnum)]
pub(crate) enum ResolveModeFlag {
    Naive,
    Fast,
}

impl ResolveModeFlag {
    pub(crate) const fn as_domain(self) -> ResolveMode {
        match self {
            ResolveModeFlag::Naive => ResolveMode::Naive,
            ResolveModeFlag::Fast => ResolveMode::Fast,
        }
    }
}

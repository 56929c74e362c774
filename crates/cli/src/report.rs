use linker_graph::{LinkError, LinkReport, ResolveMode, UnresolvedLinkWarning};
use linker_protocol::{
    ErrorEnvelope, ResolveModeName, RunReport, WarningEntry, REPORT_SCHEMA_VERSION,
};
use std::path::Path;

const fn mode_name(mode: ResolveMode) -> ResolveModeName {
    match mode {
        ResolveMode::Naive => ResolveModeName::Naive,
        ResolveMode::Fast => ResolveModeName::Fast,
    }
}

fn warning_entry(warning: &UnresolvedLinkWarning) -> WarningEntry {
    WarningEntry {
        kind: warning.kind.clone(),
        record: warning.record.clone(),
        relation: warning.relation.clone(),
        value: warning.value.clone(),
    }
}

pub(crate) fn run_report(report: &LinkReport, dry_run: bool, output: Option<&Path>) -> RunReport {
    RunReport {
        schema_version: REPORT_SCHEMA_VERSION,
        mode: mode_name(report.mode),
        dry_run,
        sections: report.sections,
        records: report.records,
        links: report.links,
        warnings: report.warnings.iter().map(warning_entry).collect(),
        output: output.map(|path| path.display().to_string()),
    }
}

/// One-line summary printed when `--json` is off.
pub(crate) fn summary(report: &RunReport) -> String {
    let mut line = format!(
        "{} sections, {} records, {} links",
        report.sections, report.records, report.links
    );
    if !report.warnings.is_empty() {
        line.push_str(&format!(", {} unresolved", report.warnings.len()));
    }
    match (&report.output, report.dry_run) {
        (_, true) => line.push_str(" (dry run, nothing written)"),
        (Some(path), false) => line.push_str(&format!(" -> {path}")),
        (None, false) => line.push_str(" (unchanged)"),
    }
    line
}

pub(crate) fn error_code(err: &anyhow::Error) -> &'static str {
    if let Some(link) = err.downcast_ref::<LinkError>() {
        return link.code();
    }
    if err
        .chain()
        .any(|cause| cause.downcast_ref::<std::io::Error>().is_some())
    {
        return "io";
    }
    "internal"
}

fn hint(code: &str) -> Option<String> {
    let hint = match code {
        "malformed_input" => "check the reported line for a stray delimiter or missing '='",
        "duplicate_key" => "ids must be unique within a section",
        "orphan_data" => "move the field below a section delimiter",
        "dependency_cycle" => "remove one of the relations between the listed kinds",
        "catalog" => "fix the relation catalog passed via --catalog or LINKER_CATALOG",
        "io" => "check the path and its permissions",
        _ => return None,
    };
    Some(hint.to_string())
}

pub(crate) fn error_envelope(err: &anyhow::Error) -> ErrorEnvelope {
    let code = error_code(err);
    ErrorEnvelope {
        code: code.to_string(),
        message: format!("{err:#}"),
        hint: hint(code),
    }
}

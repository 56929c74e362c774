use crate::catalog::{Catalog, KindDef, RecordSeparator};
use crate::error::{LinkError, Result};
use crate::types::{Document, Line, Record, Section};
use std::collections::HashSet;

/// Turns data file text into sections and records.
pub struct DocumentParser<'a> {
    catalog: &'a Catalog,
}

/// Record being accumulated before its id is known.
struct RecordDraft {
    line: usize,
    lines: Vec<Line>,
    closed: bool,
}

/// Section being accumulated.
struct SectionDraft<'a> {
    kind: &'a KindDef,
    derived: HashSet<String>,
    section: Section,
    current: Option<RecordDraft>,
    ids: HashSet<String>,
}

enum Classified {
    Raw,
    Field { key: String, value: String },
}

fn classify(line: &str, line_no: usize) -> Result<Classified> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(Classified::Raw);
    }
    let Some((key, value)) = line.split_once('=') else {
        return Err(LinkError::malformed(
            line_no,
            format!("expected key=value, found '{trimmed}'"),
        ));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(LinkError::malformed(line_no, "field with empty key"));
    }
    Ok(Classified::Field {
        key: key.to_string(),
        value: value.to_string(),
    })
}

impl<'a> SectionDraft<'a> {
    fn new(catalog: &Catalog, kind: &'a KindDef, delimiter: &str) -> Self {
        Self {
            kind,
            derived: catalog.derived_fields(&kind.name),
            section: Section {
                kind: kind.name.clone(),
                delimiter: delimiter.to_string(),
                header: Vec::new(),
                records: Vec::new(),
            },
            current: None,
            ids: HashSet::new(),
        }
    }

    fn push_raw(&mut self, line: &str) {
        match self.current.as_mut() {
            Some(draft) => {
                if line.trim().is_empty() && self.kind.separator == RecordSeparator::BlankLine {
                    draft.closed = true;
                }
                draft.lines.push(Line::Raw(line.to_string()));
            }
            None => self.section.header.push(line.to_string()),
        }
    }

    fn push_field(&mut self, raw: &str, key: String, value: String, line_no: usize) -> Result<()> {
        // Output of an earlier run; recomputed from scratch.
        if self.derived.contains(&key) {
            return Ok(());
        }

        let starts_record = match (&self.current, &self.kind.separator) {
            (None, _) => true,
            (Some(draft), RecordSeparator::BlankLine) => draft.closed,
            (Some(_), RecordSeparator::Prefix(prefix)) => raw.trim_start().starts_with(prefix),
        };
        if !starts_record && key == self.kind.id_field {
            let has_id = self.current.as_ref().is_some_and(|draft| {
                draft
                    .lines
                    .iter()
                    .any(|line| matches!(line, Line::Field { key, .. } if *key == self.kind.id_field))
            });
            if has_id {
                return Err(LinkError::malformed(
                    line_no,
                    format!(
                        "second '{}' field in one record of section '{}' (records are separated by a blank line)",
                        self.kind.id_field, self.kind.name
                    ),
                ));
            }
        }

        if starts_record {
            self.finish_record()?;
            self.current = Some(RecordDraft {
                line: line_no,
                lines: Vec::new(),
                closed: false,
            });
        }

        if let Some(draft) = self.current.as_mut() {
            draft.lines.push(Line::Field {
                key,
                value,
                raw: raw.to_string(),
            });
        }
        Ok(())
    }

    fn finish_record(&mut self) -> Result<()> {
        let Some(draft) = self.current.take() else {
            return Ok(());
        };

        let mut record = Record {
            id: String::new(),
            line: draft.line,
            lines: draft.lines,
            resolved: Vec::new(),
        };
        let id = record
            .field(&self.kind.id_field)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                LinkError::malformed(
                    draft.line,
                    format!(
                        "record in section '{}' has no '{}' field",
                        self.kind.name, self.kind.id_field
                    ),
                )
            })?
            .to_string();

        if !self.ids.insert(id.clone()) {
            return Err(LinkError::DuplicateKey {
                kind: self.kind.name.clone(),
                id,
                line: draft.line,
            });
        }

        record.id = id;
        self.section.records.push(record);
        Ok(())
    }

    fn finish(mut self) -> Result<Section> {
        self.finish_record()?;
        Ok(self.section)
    }
}

impl<'a> DocumentParser<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn parse(&self, text: &str) -> Result<Document> {
        if text.trim().is_empty() {
            return Err(LinkError::malformed(1, "empty data file"));
        }

        let trailing_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(text);
        let mut document = Document {
            crlf: text.contains("\r\n"),
            trailing_newline,
            ..Document::default()
        };

        let mut seen: HashSet<&str> = HashSet::new();
        let mut current: Option<SectionDraft> = None;

        for (idx, line) in body.split('\n').enumerate() {
            let line_no = idx + 1;
            let line = line.strip_suffix('\r').unwrap_or(line);

            if self.catalog.is_delimiter_candidate(line) {
                let kind = self.catalog.kind_by_delimiter(line).ok_or_else(|| {
                    LinkError::malformed(
                        line_no,
                        format!("unknown section delimiter '{}'", line.trim()),
                    )
                })?;
                if !seen.insert(kind.name.as_str()) {
                    return Err(LinkError::malformed(
                        line_no,
                        format!("duplicate section '{}'", kind.name),
                    ));
                }
                if let Some(draft) = current.take() {
                    document.sections.push(draft.finish()?);
                }
                log::debug!("Section '{}' starts at line {line_no}", kind.name);
                current = Some(SectionDraft::new(self.catalog, kind, line));
                continue;
            }

            let classified = classify(line, line_no);
            match (current.as_mut(), classified) {
                (Some(draft), Ok(Classified::Raw)) => draft.push_raw(line),
                (Some(draft), Ok(Classified::Field { key, value })) => {
                    draft.push_field(line, key, value, line_no)?
                }
                (None, Ok(Classified::Raw)) => document.preamble.push(line.to_string()),
                (None, Ok(Classified::Field { .. })) => {
                    return Err(LinkError::OrphanData {
                        line: line_no,
                        content: line.trim().to_string(),
                    })
                }
                (_, Err(err)) => return Err(err),
            }
        }

        if let Some(draft) = current.take() {
            document.sections.push(draft.finish()?);
        }

        log::debug!(
            "Parsed {} sections, {} records",
            document.sections.len(),
            document.record_count()
        );

        Ok(document)
    }
}

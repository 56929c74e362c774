use crate::types::{Document, Line, Record};

/// Render a document back into the sectioned text format.
///
/// Source lines come out verbatim; resolved links are inserted right after the
/// record's last field so trailing blank lines keep separating records.
pub fn serialize(document: &Document) -> String {
    let newline = if document.crlf { "\r\n" } else { "\n" };
    let mut out: Vec<String> = document.preamble.clone();

    for section in &document.sections {
        out.push(section.delimiter.clone());
        out.extend(section.header.iter().cloned());
        for record in &section.records {
            push_record(&mut out, record);
        }
    }

    let mut text = out.join(newline);
    if document.trailing_newline {
        text.push_str(newline);
    }
    text
}

fn push_record(out: &mut Vec<String>, record: &Record) {
    let last_field = record
        .lines
        .iter()
        .rposition(|line| matches!(line, Line::Field { .. }));

    for (idx, line) in record.lines.iter().enumerate() {
        out.push(match line {
            Line::Field { raw, .. } => raw.clone(),
            Line::Raw(raw) => raw.clone(),
        });
        if Some(idx) == last_field {
            for link in &record.resolved {
                out.push(format!("{}={}", link.field, link.targets.join(",")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::parser::DocumentParser;
    use crate::resolver::{ResolveMode, ResolveOptions, Resolver};
    use pretty_assertions::assert_eq;

    fn roundtrip(text: &str) -> String {
        let catalog = Catalog::builtin().unwrap();
        serialize(&DocumentParser::new(&catalog).parse(text).unwrap())
    }

    #[test]
    fn unresolved_document_round_trips() {
        let text = "# header\n\n--- quiz\n\n# first\nid=Q1\nreward = T7\n\n\nid=Q2\n--- treasure\nid=T7\n  name=Gold\n";
        assert_eq!(roundtrip(text), text);
    }

    #[test]
    fn round_trip_keeps_missing_trailing_newline_and_crlf() {
        let text = "--- quiz\r\nid=Q1\r\n\r\nid=Q2";
        assert_eq!(roundtrip(text), text);
    }

    #[test]
    fn injects_links_after_last_field() {
        let catalog = Catalog::builtin().unwrap();
        let mut doc = DocumentParser::new(&catalog)
            .parse("--- quiz\nid=Q1\nreward=T7\n# note\n\n--- treasure\nid=T7\n")
            .unwrap();
        Resolver::new(&catalog, ResolveOptions::default())
            .resolve(&mut doc)
            .unwrap();

        assert_eq!(
            serialize(&doc),
            "--- quiz\nid=Q1\nreward=T7\nreward_target=T7\nall_links=treasure:T7\n# note\n\n--- treasure\nid=T7\n"
        );
    }

    #[test]
    fn dangling_relation_is_omitted() {
        let catalog = Catalog::builtin().unwrap();
        let text = "--- quiz\nid=Q1\nreward=T9\n\n--- treasure\nid=T7\n";
        let mut doc = DocumentParser::new(&catalog).parse(text).unwrap();
        let report = Resolver::new(&catalog, ResolveOptions::default())
            .resolve(&mut doc)
            .unwrap();

        assert_eq!(serialize(&doc), text);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn linked_output_is_a_fixpoint() {
        let catalog = Catalog::builtin().unwrap();
        let text = "--- hub\nid=H\nentry=Q1,Q2\n\n--- quiz\nid=Q1\nquest=Q2\n\nid=Q2\nreward=T1\n\n--- treasure\nid=T1\n";

        for mode in [ResolveMode::Naive, ResolveMode::Fast] {
            let options = ResolveOptions {
                mode,
                with_debug: true,
            };
            let link = |input: &str| {
                let mut doc = DocumentParser::new(&catalog).parse(input).unwrap();
                Resolver::new(&catalog, options).resolve(&mut doc).unwrap();
                serialize(&doc)
            };
            let once = link(text);
            let twice = link(&once);
            assert_eq!(twice, once);
        }
    }
}

const TOP_LEVEL_KEYWORDS: &[&str] = &[
    "sequenceDiagram",
    "graph",
    "flowchart",
    "classDiagram",
    "stateDiagram",
    "erDiagram",
    "journey",
    "gantt",
    "pie",
    "gitGraph",
    "C4Context",
    "mindmap",
    "timeline",
    "quadrantChart",
];

const BLOCK_OPENERS: &[&str] = &["alt ", "opt ", "loop ", "rect ", "par "];

fn is_top_level(line: &str) -> bool {
    TOP_LEVEL_KEYWORDS.iter().any(|kw| line.starts_with(kw))
}

/// `end` only as a whole word, so `endpoint` or `ending` stay put.
fn closes_block(line: &str) -> bool {
    if line.starts_with('}') {
        return true;
    }
    match line.strip_prefix("end") {
        Some(rest) => rest.chars().next().is_none_or(|c| !c.is_alphanumeric() && c != '_'),
        None => false,
    }
}

fn opens_block(line: &str) -> bool {
    line.ends_with('{') || BLOCK_OPENERS.iter().any(|kw| line.starts_with(kw))
}

pub fn format_source(text: &str) -> String {
    let mut indent: usize = 0;
    let mut out = Vec::new();

    for raw in text.split('\n') {
        let line = raw.trim();
        if line.is_empty() {
            out.push(String::new());
            continue;
        }

        if closes_block(line) {
            indent = indent.saturating_sub(1);
        }
        let top_level = is_top_level(line);
        if top_level {
            indent = 0;
        }

        out.push(format!("{}{}", "\t".repeat(indent), line));

        if top_level {
            indent += 1;
        }
        if opens_block(line) {
            indent += 1;
        }
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::format_source;

    #[test]
    fn sequence_blocks_are_indented() {
        let input = "sequenceDiagram\nAlice->>John: Hi\n  loop Every minute\nJohn->>Alice: Ping\n    end\n\n   Alice->>John: Bye  ";
        let expected = "sequenceDiagram\n\tAlice->>John: Hi\n\tloop Every minute\n\t\tJohn->>Alice: Ping\n\tend\n\n\tAlice->>John: Bye";
        assert_eq!(format_source(input), expected);
    }

    #[test]
    fn braces_indent_class_members() {
        let input = "classDiagram\nclass Animal {\n+name\n+eat()\n}\nAnimal <|-- Duck";
        let expected = "classDiagram\n\tclass Animal {\n\t\t+name\n\t\t+eat()\n\t}\n\tAnimal <|-- Duck";
        assert_eq!(format_source(input), expected);
    }

    #[test]
    fn stray_closers_never_go_negative() {
        assert_eq!(format_source("end\n}\nA-->B"), "end\n}\nA-->B");
    }

    #[test]
    fn end_prefix_of_identifier_does_not_dedent() {
        let input = "flowchart TD\nendpoint --> start";
        assert_eq!(format_source(input), "flowchart TD\n\tendpoint --> start");
    }

    #[test]
    fn formatting_is_stable() {
        let once = format_source("graph TD\nsubgraph one\n  a-->b\nend\nopt x\nc\nend");
        assert_eq!(format_source(&once), once);
    }
}

pub const QUOTE_MARKER: &str = "> ";

/// A run of lines rendered together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyBlock {
    Text(Vec<String>),
    Quote(Vec<String>),
}

/// Prefixes every line of `quoted` with the quote marker, then a blank line, then `body`.
pub fn quote_body(quoted: &str, body: &str) -> String {
    let quoted = quoted.replace("\r\n", "\n");
    let mut out = quoted
        .trim_end_matches('\n')
        .split('\n')
        .map(|line| format!("{QUOTE_MARKER}{line}"))
        .collect::<Vec<_>>()
        .join("\n");
    out.push_str("\n\n");
    out.push_str(body);
    out
}

fn quoted_line(line: &str) -> Option<&str> {
    line.strip_prefix(QUOTE_MARKER)
        .or_else(|| line.strip_prefix(QUOTE_MARKER.trim_end()))
}

/// Groups consecutive quote-marked lines into quote blocks, keeping line breaks.
pub fn render_body(text: &str) -> Vec<BodyBlock> {
    let mut blocks: Vec<BodyBlock> = Vec::new();
    for line in text.lines() {
        match (quoted_line(line), blocks.last_mut()) {
            (Some(inner), Some(BodyBlock::Quote(lines))) => lines.push(inner.to_string()),
            (Some(inner), _) => blocks.push(BodyBlock::Quote(vec![inner.to_string()])),
            (None, Some(BodyBlock::Text(lines))) => lines.push(line.to_string()),
            (None, _) => blocks.push(BodyBlock::Text(vec![line.to_string()])),
        }
    }
    blocks
}

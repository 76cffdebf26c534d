//! Metric label enrichment
//! Adds configured labels to Prometheus text-format sample lines

use std::collections::BTreeMap;

/// Add `labels` to one sample line.
///
/// Comments, blank lines and lines that do not look like samples are returned
/// unchanged. Keys already present in the line keep their original value.
pub fn enrich_line(line: &str, labels: &BTreeMap<String, String>) -> String {
    let trimmed = line.trim_start();
    if labels.is_empty() || trimmed.is_empty() || trimmed.starts_with('#') {
        return line.to_string();
    }

    let name_end = match line.find(|c: char| c == '{' || c.is_whitespace()) {
        Some(i) if i > 0 => i,
        _ => return line.to_string(),
    };
    let (name, rest) = line.split_at(name_end);

    if let Some(block) = rest.strip_prefix('{') {
        let Some(close) = find_block_end(block) else {
            return line.to_string();
        };
        let existing = &block[..close];
        // `m{a="1",}` is valid exposition text
        let existing = existing.trim_end().strip_suffix(',').unwrap_or(existing);
        let tail = &block[close + 1..];
        let present = label_keys(existing);

        let additions: Vec<String> = labels
            .iter()
            .filter(|(key, _)| !present.contains(&key.as_str()))
            .map(|(key, value)| format_label(key, value))
            .collect();
        if additions.is_empty() {
            return line.to_string();
        }

        let separator = if existing.trim().is_empty() { "" } else { "," };
        format!(
            "{}{{{}{}{}}}{}",
            name,
            existing,
            separator,
            additions.join(","),
            tail
        )
    } else {
        let block: Vec<String> = labels
            .iter()
            .map(|(key, value)| format_label(key, value))
            .collect();
        format!("{}{{{}}}{}", name, block.join(","), rest)
    }
}

/// Enrich every line of a metrics document
pub fn enrich_text(text: &str, labels: &BTreeMap<String, String>) -> String {
    text.lines()
        .map(|line| enrich_line(line, labels))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_label(key: &str, value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("{}=\"{}\"", key, escaped)
}

/// Index of the `}` closing a label block, skipping quoted values
fn find_block_end(block: &str) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in block.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '}' if !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

fn label_keys(block: &str) -> Vec<&str> {
    let mut keys = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in block.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                push_key(&block[start..i], &mut keys);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_key(&block[start..], &mut keys);
    keys
}

fn push_key<'a>(pair: &'a str, keys: &mut Vec<&'a str>) {
    if let Some((key, _)) = pair.split_once('=') {
        let key = key.trim();
        if !key.is_empty() {
            keys.push(key);
        }
    }
}

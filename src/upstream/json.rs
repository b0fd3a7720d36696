//! JSON decoding with enough context to debug upstream schema drift.

use anyhow::Result;

/// Deserialize `body`, reporting the failing JSON path and a short excerpt of
/// the offending line when decoding fails.
pub fn parse_json_with_context<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
        let inner = err.inner();
        let (line, column) = (inner.line(), inner.column());
        let path = err.path().to_string();

        let message = inner.to_string();
        let message = message
            .split(" at line ")
            .next()
            .unwrap_or(message.as_str())
            .to_string();

        let location = if path.is_empty() || path == "." {
            String::new()
        } else {
            format!("at '{path}': ")
        };

        anyhow::anyhow!(
            "{location}{message} (line {line} col {column}) near `{}`",
            excerpt(body, line, column, 24)
        )
    })
}

/// Up to `width` characters of line `line` centred on `column` (both 1-based).
fn excerpt(body: &str, line: usize, column: usize, width: usize) -> String {
    let Some(text) = body.lines().nth(line.saturating_sub(1)) else {
        return String::new();
    };
    let chars: Vec<char> = text.chars().collect();
    let centre = column.saturating_sub(1).min(chars.len());
    let start = centre.saturating_sub(width / 2);
    let end = (start + width).min(chars.len());
    chars[start..end].iter().collect()
}

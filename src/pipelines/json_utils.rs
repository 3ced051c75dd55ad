/// Utilities for pulling a schedule out of generator output.
///
/// Generators wrap JSON in code fences, prose or an envelope object and
/// sometimes leave trailing commas. Extraction is lenient about that noise;
/// the shape check afterwards is strict.
use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use crate::error::CollaboratorError;
use crate::schedule::{BlockDifficulty, BlockKind, ScheduleBlock};

/// Longest block a generator may propose, in minutes
pub const MAX_BLOCK_MINUTES: f64 = 240.0;

/// Strip code fences and smart quotes, drop trailing commas
pub fn sanitize_raw_output(raw: &str) -> String {
    let mut sanitized = raw.replace("```json", "").replace("```", "");
    sanitized = sanitized
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    remove_trailing_commas(sanitized.trim())
}

/// Remove commas that directly precede `}` or `]` outside of strings
pub fn remove_trailing_commas(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut result = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escape_next = false;

    for (i, &ch) in chars.iter().enumerate() {
        if escape_next {
            escape_next = false;
            result.push(ch);
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            ',' if !in_string => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next, Some('}') | Some(']')) {
                    continue;
                }
            }
            _ => {}
        }
        result.push(ch);
    }
    result
}

/// Byte range of the first balanced `{...}` or `[...]` in `text`
fn balanced_span(text: &str) -> Option<(usize, usize)> {
    let start = text.find(['{', '['])?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, start + offset + ch.len_utf8()));
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract the first JSON value from noisy generator output
pub fn extract_json(text: &str) -> anyhow::Result<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let sanitized = sanitize_raw_output(trimmed);
    if let Ok(value) = serde_json::from_str::<Value>(&sanitized) {
        return Ok(value);
    }

    let (start, end) = balanced_span(&sanitized)
        .with_context(|| format!("no balanced JSON found in {} bytes of output", text.len()))?;
    serde_json::from_str::<Value>(&sanitized[start..end])
        .context("Failed to extract JSON from generator output")
}

#[derive(Deserialize)]
struct RawBlock {
    kind: Option<String>,
    minutes: Option<f64>,
    difficulty: Option<String>,
    label: Option<String>,
}

fn parse_kind(raw: &str) -> Option<BlockKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "work" | "study" => Some(BlockKind::Work),
        "rest" | "break" => Some(BlockKind::Rest),
        _ => None,
    }
}

fn parse_difficulty(raw: &str) -> Option<BlockDifficulty> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "easy" => Some(BlockDifficulty::Easy),
        "medium" => Some(BlockDifficulty::Medium),
        "hard" => Some(BlockDifficulty::Hard),
        _ => None,
    }
}

fn validate_block(index: usize, value: Value) -> Result<ScheduleBlock, CollaboratorError> {
    let malformed = |reason: &str| {
        CollaboratorError::malformed(format!("block {}: {}", index, reason))
    };
    let raw: RawBlock = serde_json::from_value(value)
        .map_err(|e| malformed(&format!("not an object with the expected fields ({})", e)))?;

    let kind = raw
        .kind
        .as_deref()
        .and_then(parse_kind)
        .ok_or_else(|| malformed("missing or unknown kind"))?;
    let minutes = raw.minutes.ok_or_else(|| malformed("missing minutes"))?;
    if !minutes.is_finite() || minutes < 1.0 || minutes > MAX_BLOCK_MINUTES {
        return Err(malformed(&format!("minutes out of range: {}", minutes)));
    }

    let difficulty = match kind {
        BlockKind::Work => Some(
            raw.difficulty
                .as_deref()
                .and_then(parse_difficulty)
                .ok_or_else(|| malformed("work block without a valid difficulty"))?,
        ),
        BlockKind::Rest => None,
    };

    Ok(ScheduleBlock {
        kind,
        minutes: minutes.round() as u32,
        difficulty,
        label: raw.label.unwrap_or_else(|| match kind {
            BlockKind::Work => "study".to_string(),
            BlockKind::Rest => "rest".to_string(),
        }),
    })
}

/// Parse generator output into blocks.
///
/// Accepts a bare block array, an object with a `blocks` array, or an
/// envelope whose `response` string contains either. Fails on an empty list
/// or any block missing a required field. More than `max_blocks` blocks are
/// truncated.
pub fn parse_blocks(text: &str, max_blocks: usize) -> Result<Vec<ScheduleBlock>, CollaboratorError> {
    let value = extract_json(text)
        .map_err(|e| CollaboratorError::malformed(format!("{:#}", e)))?;
    blocks_from_value(value, max_blocks, 0)
}

fn blocks_from_value(
    value: Value,
    max_blocks: usize,
    depth: u8,
) -> Result<Vec<ScheduleBlock>, CollaboratorError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match (map.remove("blocks"), map.remove("response")) {
            (Some(Value::Array(items)), _) => items,
            (_, Some(Value::String(inner))) if depth == 0 => {
                let nested = extract_json(&inner)
                    .map_err(|e| CollaboratorError::malformed(format!("{:#}", e)))?;
                return blocks_from_value(nested, max_blocks, depth + 1);
            }
            _ => return Err(CollaboratorError::malformed("response has no block list")),
        },
        _ => return Err(CollaboratorError::malformed("response is not a JSON object or array")),
    };

    if items.is_empty() {
        return Err(CollaboratorError::malformed("block list is empty"));
    }

    let mut blocks = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| validate_block(i, item))
        .collect::<Result<Vec<_>, _>>()?;

    if blocks.len() > max_blocks {
        tracing::debug!(received = blocks.len(), max_blocks = max_blocks, "Truncating generated schedule");
        blocks.truncate(max_blocks);
    }
    Ok(blocks)
}

//! The policy rules file (spec §6 filesystem contract: `time_seconds
//! rule_tokens…`, whitespace separated, one rule per line), grounded on
//! `SystemAdmin::operator()` in
//! `examples/original_source/src/controller/system_admin.cpp`: the
//! original reads a file of staged rules and later replays them against the
//! wall clock. The staged-rule wire fields (`staged_rule[0]`,
//! `staged_rule[2..]`) become this crate's canonical `'|'`-delimited
//! `AdminPolicy` rule text via `ratectl_codec`'s own grammar instead of a
//! bespoke concatenation.

use std::path::Path;
use std::time::Duration;

use ratectl_codec::OperationTag;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEntry {
    /// Offset from the administrator's start at which this rule should be
    /// submitted.
    pub offset: Duration,
    /// The canonical `'|'`-delimited rule text, ready for
    /// `CoreControlApplication::enqueue_rule_in_queue`.
    pub rule_text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyFileError {
    #[error("could not read policy file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed policy line {line_number} ({reason}): {line}")]
    Malformed {
        line_number: usize,
        line: String,
        reason: &'static str,
    },
}

/// Parses a whitespace-tokenized line into a [`PolicyEntry`]. Token 0 is the
/// administrator's own rule id (kept only for logging — the core assigns
/// its own rule ids on dispatch), token 1 is the playback offset in
/// seconds, token 2 is the `AdminRule` keyword (`job`/`user`/`demand`/
/// `mds`), and everything after that is the keyword's own fields, carried
/// straight through into the canonical grammar.
fn parse_line(line_number: usize, line: &str) -> Result<PolicyEntry, PolicyFileError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(PolicyFileError::Malformed {
            line_number,
            line: line.to_string(),
            reason: "expected at least <rule_id> <time_seconds> <keyword>",
        });
    }

    let offset_seconds: u64 = tokens[1].parse().map_err(|_| PolicyFileError::Malformed {
        line_number,
        line: line.to_string(),
        reason: "time_seconds must be an unsigned integer",
    })?;

    let fields = tokens[2..].join("|");
    let rule_text = format!("{}|{fields}|", OperationTag::AdminPolicy as i32);

    Ok(PolicyEntry {
        offset: Duration::from_secs(offset_seconds),
        rule_text,
    })
}

/// Reads and parses every non-blank line of `path`.
pub fn load(path: &Path) -> Result<Vec<PolicyEntry>, PolicyFileError> {
    let contents = std::fs::read_to_string(path).map_err(|source| PolicyFileError::Read {
        path: path.display().to_string(),
        source,
    })?;

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| parse_line(index + 1, line))
        .collect()
}

//! The housekeeping rules file (spec §6 filesystem contract: whitespace
//! tokens, one rule per line, per the §4.6 grammar): the set of `channel`/
//! `object` creation rules the core concatenates into a single
//! `LOCAL_HANDSHAKE` rule and sends to every local at startup, grounded on
//! `CoreControlApplication`'s local-admission loop in
//! `include/cheferd/controller/core_control_application.hpp` (`pending_locals`
//! draining `local_handshake` with "the housekeeping list").

use std::path::Path;

use ratectl_codec::{encode, Rule};

#[derive(Debug, thiserror::Error)]
pub enum HousekeepingFileError {
    #[error("could not read housekeeping file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed housekeeping line {line_number} ({reason}): {line}")]
    Malformed {
        line_number: usize,
        line: String,
        reason: &'static str,
    },
}

fn parse_int(
    tokens: &[&str],
    index: usize,
    line_number: usize,
    line: &str,
    reason: &'static str,
) -> Result<i32, HousekeepingFileError> {
    tokens
        .get(index)
        .and_then(|t| t.parse().ok())
        .ok_or(HousekeepingFileError::Malformed {
            line_number,
            line: line.to_string(),
            reason,
        })
}

/// Parses one line into its canonical `CreateHskRule` wire text.
///
/// `channel <rule_id> <channel_id> <stage_name>` installs a channel;
/// `object <rule_id> <channel_id> <object_id> <stage_name>` installs an
/// object on a previously-created channel.
fn parse_line(line_number: usize, line: &str) -> Result<String, HousekeepingFileError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let malformed = |reason| HousekeepingFileError::Malformed {
        line_number,
        line: line.to_string(),
        reason,
    };

    match tokens.first().copied() {
        Some("channel") => {
            if tokens.len() != 4 {
                return Err(malformed(
                    "expected: channel <rule_id> <channel_id> <stage_name>",
                ));
            }
            let rule_id = parse_int(&tokens, 1, line_number, line, "rule_id must be an integer")?;
            let channel_id =
                parse_int(&tokens, 2, line_number, line, "channel_id must be an integer")?;
            Ok(encode(&Rule::CreateChannel {
                rule_id: rule_id as u64,
                channel_id,
                stage_name: tokens[3].to_string(),
            }))
        }
        Some("object") => {
            if tokens.len() != 5 {
                return Err(malformed(
                    "expected: object <rule_id> <channel_id> <object_id> <stage_name>",
                ));
            }
            let rule_id = parse_int(&tokens, 1, line_number, line, "rule_id must be an integer")?;
            let channel_id =
                parse_int(&tokens, 2, line_number, line, "channel_id must be an integer")?;
            let object_id =
                parse_int(&tokens, 3, line_number, line, "object_id must be an integer")?;
            Ok(encode(&Rule::CreateObject {
                rule_id: rule_id as u64,
                channel_id,
                object_id,
                stage_name: tokens[4].to_string(),
            }))
        }
        _ => Err(malformed("expected line to start with 'channel' or 'object'")),
    }
}

/// Reads `path` and returns each line's canonical housekeeping rule text, in
/// file order, ready to hand to `Rule::LocalHandshake`.
pub fn load(path: &Path) -> Result<Vec<String>, HousekeepingFileError> {
    let contents =
        std::fs::read_to_string(path).map_err(|source| HousekeepingFileError::Read {
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_channel_line() {
        let rule = parse_line(1, "channel 1 0 tensor").unwrap();
        assert_eq!(rule, "4|1|1|0+tensor|");
    }

    #[test]
    fn parses_an_object_line() {
        let rule = parse_line(1, "object 2 0 3 tensor").unwrap();
        assert_eq!(rule, "4|2|2|0+3+tensor|");
    }

    #[test]
    fn load_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("housekeeping.rules");
        std::fs::write(&path, "channel 1 0 tensor\n\nobject 2 0 3 tensor\n").unwrap();

        let rules = load(&path).unwrap();
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn unknown_keyword_is_malformed() {
        assert!(matches!(
            parse_line(1, "frobnicate 1 2 3"),
            Err(HousekeepingFileError::Malformed { .. })
        ));
    }
}

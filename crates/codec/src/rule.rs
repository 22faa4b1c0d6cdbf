//! The canonical `'|'`-delimited rule grammar (spec §4.6), grounded on
//! `src/utils/rules_file_parser.cpp` (token splitting) and the rule strings
//! assembled ad hoc in `core_control_application.cpp` (`STAGE_READY`,
//! `LOCAL_HANDSHAKE`, and the `job`/`user`/`demand`/`mds` admin sub-kinds).
//!
//! A rule string is a sequence of tokens separated by a single `|`. A
//! trailing `|` is tolerated (and always emitted by [`encode`]) because the
//! original writer always appends one before handing the string off.
//! Enforcement sub-rules nest a `*`-separated list of `env:rate` pairs in a
//! single token.

use crate::error::CodecError;
use crate::operation::{HousekeepingKind, OperationTag};

fn split_pipe(s: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = s.split('|').collect();
    if tokens.last() == Some(&"") {
        tokens.pop();
    }
    tokens
}

fn parse_i32(tokens: &[&str], index: usize) -> Result<i32, CodecError> {
    tokens
        .get(index)
        .ok_or(CodecError::WrongArity {
            expected: index + 1,
            found: tokens.len(),
        })?
        .parse()
        .map_err(|_| CodecError::MalformedField {
            index,
            reason: "expected integer".into(),
        })
}

fn parse_i64(tokens: &[&str], index: usize) -> Result<i64, CodecError> {
    tokens
        .get(index)
        .ok_or(CodecError::WrongArity {
            expected: index + 1,
            found: tokens.len(),
        })?
        .parse()
        .map_err(|_| CodecError::MalformedField {
            index,
            reason: "expected integer".into(),
        })
}

fn field<'a>(tokens: &[&'a str], index: usize) -> Result<&'a str, CodecError> {
    tokens.get(index).copied().ok_or(CodecError::WrongArity {
        expected: index + 1,
        found: tokens.len(),
    })
}

/// One `env:rate` enforcement sub-rule, nested `*`-separated inside an
/// [`Rule::Enforcement`] token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvRate {
    pub env: i32,
    pub rate: i64,
}

fn encode_env_rates(rates: &[EnvRate]) -> String {
    rates
        .iter()
        .map(|r| format!("{}:{}", r.env, r.rate))
        .collect::<Vec<_>>()
        .join("*")
}

fn decode_env_rates(s: &str) -> Result<Vec<EnvRate>, CodecError> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split('*')
        .map(|pair| {
            let (env, rate) = pair.split_once(':').ok_or_else(|| CodecError::MalformedField {
                index: 0,
                reason: format!("expected env:rate, found {pair:?}"),
            })?;
            Ok(EnvRate {
                env: env.parse().map_err(|_| CodecError::MalformedField {
                    index: 0,
                    reason: "expected integer env".into(),
                })?,
                rate: rate.parse().map_err(|_| CodecError::MalformedField {
                    index: 0,
                    reason: "expected integer rate".into(),
                })?,
            })
        })
        .collect()
}

/// Admin policy sub-kinds (spec §4.4.1-4.4.3), grounded on the `tokens[1]`
/// keyword switch in `core_control_application.cpp`'s rule-ingestion code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminRule {
    Job {
        rule_id: u64,
        job: String,
        operation: String,
        limit: i64,
    },
    User {
        rule_id: u64,
        user: String,
        operation: String,
        limit: i64,
    },
    Demand {
        rule_id: u64,
        job: String,
        operation: String,
        demand: i64,
    },
    Mds {
        rule_id: u64,
        operation: String,
        limit: i64,
    },
}

impl AdminRule {
    fn keyword(&self) -> &'static str {
        match self {
            AdminRule::Job { .. } => "job",
            AdminRule::User { .. } => "user",
            AdminRule::Demand { .. } => "demand",
            AdminRule::Mds { .. } => "mds",
        }
    }

    fn rule_id(&self) -> u64 {
        match self {
            AdminRule::Job { rule_id, .. }
            | AdminRule::User { rule_id, .. }
            | AdminRule::Demand { rule_id, .. }
            | AdminRule::Mds { rule_id, .. } => *rule_id,
        }
    }
}

/// A decoded control-plane rule. Variants map 1:1 to the operation tags in
/// [`OperationTag`] plus the internal [`AdminRule`] sub-grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    StageHandshake,
    StageReady {
        stage_name: String,
        stage_env: String,
    },
    LocalHandshake {
        housekeeping_rules: Vec<String>,
    },
    CreateChannel {
        rule_id: u64,
        channel_id: i32,
        stage_name: String,
    },
    CreateObject {
        rule_id: u64,
        channel_id: i32,
        object_id: i32,
        stage_name: String,
    },
    Enforcement {
        rule_id: u64,
        stage_name: String,
        operation: String,
        /// `Some((channel_id, object_id))` on a southbound sub-rule one of
        /// the fan-out pairs the local controller expanded a northbound
        /// `CreateEnforcementRule` into (spec §4.3's "Enforcement
        /// fan-out"); `None` on the northbound request itself, which
        /// carries no channel/object addressing of its own.
        channel_object: Option<(i32, i32)>,
        env_rates: Vec<EnvRate>,
    },
    CollectGlobalStats,
    CollectGlobalStatsAggregated,
    CollectEntityStats {
        stage_name: String,
    },
    AdminPolicy(AdminRule),
}

/// Render a [`Rule`] back into its canonical `'|'`-delimited wire form.
pub fn encode(rule: &Rule) -> String {
    match rule {
        Rule::StageHandshake => format!("{}|", OperationTag::StageHandshake as i32),
        Rule::StageReady {
            stage_name,
            stage_env,
        } => format!(
            "{}|{}+{}|",
            OperationTag::StageReady as i32,
            stage_name,
            stage_env
        ),
        Rule::LocalHandshake { housekeeping_rules } => {
            let mut s = format!("{}|", OperationTag::LocalHandshake as i32);
            for r in housekeeping_rules {
                s.push(':');
                s.push_str(r);
            }
            s
        }
        Rule::CreateChannel {
            rule_id,
            channel_id,
            stage_name,
        } => format!(
            "{}|{}|{}|{}|",
            OperationTag::CreateHskRule as i32,
            HousekeepingKind::CreateChannel as i32,
            rule_id,
            format!("{channel_id}+{stage_name}")
        ),
        Rule::CreateObject {
            rule_id,
            channel_id,
            object_id,
            stage_name,
        } => format!(
            "{}|{}|{}|{}+{}+{}|",
            OperationTag::CreateHskRule as i32,
            HousekeepingKind::CreateObject as i32,
            rule_id,
            channel_id,
            object_id,
            stage_name
        ),
        Rule::Enforcement {
            rule_id,
            stage_name,
            operation,
            channel_object,
            env_rates,
        } => match channel_object {
            None => format!(
                "{}|{}|{}|{}|{}|",
                OperationTag::CreateEnfRule as i32,
                rule_id,
                stage_name,
                operation,
                encode_env_rates(env_rates)
            ),
            Some((channel_id, object_id)) => format!(
                "{}|{}|{}|{}|{}|{}+{}|",
                OperationTag::CreateEnfRule as i32,
                rule_id,
                stage_name,
                operation,
                encode_env_rates(env_rates),
                channel_id,
                object_id
            ),
        },
        Rule::CollectGlobalStats => format!("{}|", OperationTag::CollectGlobalStats as i32),
        Rule::CollectGlobalStatsAggregated => {
            format!("{}|", OperationTag::CollectGlobalStatsAggregated as i32)
        }
        Rule::CollectEntityStats { stage_name } => format!(
            "{}|{}|",
            OperationTag::CollectEntityStats as i32,
            stage_name
        ),
        Rule::AdminPolicy(admin) => {
            let keyword = admin.keyword();
            match admin {
                AdminRule::Job {
                    job,
                    operation,
                    limit,
                    ..
                } => format!(
                    "{}|{keyword}|{job}|{operation}|{limit}|",
                    OperationTag::AdminPolicy as i32
                ),
                AdminRule::User {
                    user,
                    operation,
                    limit,
                    ..
                } => format!(
                    "{}|{keyword}|{user}|{operation}|{limit}|",
                    OperationTag::AdminPolicy as i32
                ),
                AdminRule::Demand {
                    job,
                    operation,
                    demand,
                    ..
                } => format!(
                    "{}|{keyword}|{job}|{operation}|{demand}|",
                    OperationTag::AdminPolicy as i32
                ),
                AdminRule::Mds {
                    operation, limit, ..
                } => format!(
                    "{}|{keyword}|{operation}|{limit}|",
                    OperationTag::AdminPolicy as i32
                ),
            }
        }
    }
}

/// Parse a canonical rule string (spec §4.6) into a [`Rule`].
pub fn decode(s: &str) -> Result<Rule, CodecError> {
    let tokens = split_pipe(s);
    if tokens.is_empty() {
        return Err(CodecError::Empty);
    }
    let tag = OperationTag::from_i32(parse_i32(&tokens, 0)?)?;
    match tag {
        OperationTag::StageHandshake => Ok(Rule::StageHandshake),
        OperationTag::StageReady => {
            let (stage_name, stage_env) =
                field(&tokens, 1)?.split_once('+').ok_or(CodecError::MalformedField {
                    index: 1,
                    reason: "expected stage_name+stage_env".into(),
                })?;
            Ok(Rule::StageReady {
                stage_name: stage_name.to_string(),
                stage_env: stage_env.to_string(),
            })
        }
        OperationTag::LocalHandshake => {
            let rest = s.splitn(2, '|').nth(1).unwrap_or("");
            let housekeeping_rules = rest
                .split(':')
                .filter(|t| !t.is_empty())
                .map(|t| t.to_string())
                .collect();
            Ok(Rule::LocalHandshake { housekeeping_rules })
        }
        OperationTag::CreateHskRule => {
            let kind = HousekeepingKind::from_i32(parse_i32(&tokens, 1)?)?;
            let rule_id = parse_i64(&tokens, 2)? as u64;
            match kind {
                HousekeepingKind::CreateChannel => {
                    let (channel_id, stage_name) = field(&tokens, 3)?
                        .split_once('+')
                        .ok_or(CodecError::MalformedField {
                            index: 3,
                            reason: "expected channel_id+stage_name".into(),
                        })?;
                    Ok(Rule::CreateChannel {
                        rule_id,
                        channel_id: channel_id.parse().map_err(|_| CodecError::MalformedField {
                            index: 3,
                            reason: "expected integer channel_id".into(),
                        })?,
                        stage_name: stage_name.to_string(),
                    })
                }
                HousekeepingKind::CreateObject => {
                    let payload = field(&tokens, 3)?;
                    let mut parts = payload.splitn(3, '+');
                    let channel_id = parts.next().ok_or(CodecError::MalformedField {
                        index: 3,
                        reason: "expected channel_id+object_id+stage_name".into(),
                    })?;
                    let object_id = parts.next().ok_or(CodecError::MalformedField {
                        index: 3,
                        reason: "expected channel_id+object_id+stage_name".into(),
                    })?;
                    let stage_name = parts.next().ok_or(CodecError::MalformedField {
                        index: 3,
                        reason: "expected channel_id+object_id+stage_name".into(),
                    })?;
                    Ok(Rule::CreateObject {
                        rule_id,
                        channel_id: channel_id.parse().map_err(|_| CodecError::MalformedField {
                            index: 3,
                            reason: "expected integer channel_id".into(),
                        })?,
                        object_id: object_id.parse().map_err(|_| CodecError::MalformedField {
                            index: 3,
                            reason: "expected integer object_id".into(),
                        })?,
                        stage_name: stage_name.to_string(),
                    })
                }
            }
        }
        OperationTag::CreateEnfRule => Ok(Rule::Enforcement {
            rule_id: parse_i64(&tokens, 1)? as u64,
            stage_name: field(&tokens, 2)?.to_string(),
            operation: field(&tokens, 3)?.to_string(),
            channel_object: None,
            env_rates: decode_env_rates(field(&tokens, 4)?)?,
        }),
        OperationTag::CollectGlobalStats => Ok(Rule::CollectGlobalStats),
        OperationTag::CollectGlobalStatsAggregated => Ok(Rule::CollectGlobalStatsAggregated),
        OperationTag::CollectEntityStats => Ok(Rule::CollectEntityStats {
            stage_name: field(&tokens, 1)?.to_string(),
        }),
        OperationTag::StageHandshakeInfo => Err(CodecError::UnknownOperation(tag as i32)),
        OperationTag::AdminPolicy => {
            let keyword = field(&tokens, 1)?;
            let rule_id = 0u64; // the admin sub-grammar carries no leading rule_id token of its own
            match keyword {
                "job" => Ok(Rule::AdminPolicy(AdminRule::Job {
                    rule_id,
                    job: field(&tokens, 2)?.to_string(),
                    operation: field(&tokens, 3)?.to_string(),
                    limit: parse_i64(&tokens, 4)?,
                })),
                "user" => Ok(Rule::AdminPolicy(AdminRule::User {
                    rule_id,
                    user: field(&tokens, 2)?.to_string(),
                    operation: field(&tokens, 3)?.to_string(),
                    limit: parse_i64(&tokens, 4)?,
                })),
                "demand" => Ok(Rule::AdminPolicy(AdminRule::Demand {
                    rule_id,
                    job: field(&tokens, 2)?.to_string(),
                    operation: field(&tokens, 3)?.to_string(),
                    demand: parse_i64(&tokens, 4)?,
                })),
                "mds" => Ok(Rule::AdminPolicy(AdminRule::Mds {
                    rule_id,
                    operation: field(&tokens, 2)?.to_string(),
                    limit: parse_i64(&tokens, 3)?,
                })),
                other => Err(CodecError::UnknownPolicyKeyword(other.to_string())),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn stage_ready_round_trips() {
        let rule = Rule::StageReady {
            stage_name: "tensor".into(),
            stage_env: "prod".into(),
        };
        let encoded = encode(&rule);
        assert_eq!(decode(&encoded).unwrap(), rule);
    }

    #[test]
    fn local_handshake_round_trips_empty_and_populated() {
        let empty = Rule::LocalHandshake {
            housekeeping_rules: vec![],
        };
        assert_eq!(decode(&encode(&empty)).unwrap(), empty);

        let populated = Rule::LocalHandshake {
            housekeeping_rules: vec!["4|1|1|0+tensor|".into(), "4|2|2|0+0+tensor|".into()],
        };
        assert_eq!(decode(&encode(&populated)).unwrap(), populated);
    }

    #[test]
    fn enforcement_round_trips_with_multiple_envs() {
        let rule = Rule::Enforcement {
            rule_id: 7,
            stage_name: "tensor".into(),
            operation: "read".into(),
            channel_object: None,
            env_rates: vec![
                EnvRate { env: 0, rate: 500 },
                EnvRate { env: 1, rate: 250 },
            ],
        };
        assert_eq!(decode(&encode(&rule)).unwrap(), rule);
    }

    #[test]
    fn enforcement_sub_rule_encodes_its_channel_and_object() {
        let rule = Rule::Enforcement {
            rule_id: 7,
            stage_name: "tensor".into(),
            operation: "read".into(),
            channel_object: Some((1000, 2000)),
            env_rates: vec![EnvRate { env: 0, rate: 250 }],
        };
        assert_eq!(encode(&rule), "6|7|tensor|read|0:250|1000+2000|");
    }

    #[test]
    fn admin_job_rule_round_trips() {
        let rule = Rule::AdminPolicy(AdminRule::Job {
            rule_id: 0,
            job: "tensor".into(),
            operation: "read".into(),
            limit: 500,
        });
        assert_eq!(decode(&encode(&rule)).unwrap(), rule);
    }

    #[test]
    fn admin_demand_rule_round_trips() {
        let rule = Rule::AdminPolicy(AdminRule::Demand {
            rule_id: 0,
            job: "tensor".into(),
            operation: "read".into(),
            demand: 100,
        });
        assert_eq!(decode(&encode(&rule)).unwrap(), rule);
    }

    #[test]
    fn trailing_pipe_is_tolerated() {
        let s = "1|tensor+prod|";
        assert!(decode(s).is_ok());
        let without_trailing = "1|tensor+prod";
        assert!(decode(without_trailing).is_ok());
    }

    #[test]
    fn unknown_operation_errors() {
        assert_eq!(decode("999|"), Err(CodecError::UnknownOperation(999)));
    }

    #[test]
    fn empty_string_errors() {
        assert_eq!(decode(""), Err(CodecError::Empty));
    }
}

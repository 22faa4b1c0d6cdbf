//! The rule text codec and protocol status type (spec §4.6, §7).
//!
//! This crate is pure data: parsing and rendering the canonical `'|'`
//! delimited rule grammar, the tri-state [`Status`] type, and the numeric
//! operation tags both ends of a connection agree on. It performs no I/O —
//! `ratectl-session` frames these strings (and the binary southbound
//! payloads) over an actual byte stream.

mod error;
mod operation;
mod rule;
mod status;

pub use error::CodecError;
pub use operation::{HousekeepingKind, OperationTag};
pub use rule::{decode, encode, AdminRule, EnvRate, Rule};
pub use status::{ErrorKind, Status};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn stage_name_strategy() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9_]{0,15}"
    }

    proptest! {
        #[test]
        fn stage_ready_round_trip(name in stage_name_strategy(), env in stage_name_strategy()) {
            let rule = Rule::StageReady { stage_name: name, stage_env: env };
            prop_assert_eq!(decode(&encode(&rule)).unwrap(), rule);
        }

        #[test]
        fn enforcement_round_trip(
            rule_id in 0u64..100_000,
            stage in stage_name_strategy(),
            op in stage_name_strategy(),
            rates in prop::collection::vec((0i32..8, 0i64..1_000_000), 0..6),
        ) {
            let env_rates = rates.into_iter().map(|(env, rate)| EnvRate { env, rate }).collect::<Vec<_>>();
            let rule = Rule::Enforcement {
                rule_id,
                stage_name: stage,
                operation: op,
                channel_object: None,
                env_rates,
            };
            prop_assert_eq!(decode(&encode(&rule)).unwrap(), rule);
        }

        #[test]
        fn admin_job_round_trip(job in stage_name_strategy(), op in stage_name_strategy(), limit in 0i64..1_000_000) {
            let rule = Rule::AdminPolicy(AdminRule::Job { rule_id: 0, job, operation: op, limit });
            prop_assert_eq!(decode(&encode(&rule)).unwrap(), rule);
        }
    }
}

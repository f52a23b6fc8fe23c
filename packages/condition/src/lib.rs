//! Declarative migration conditions: `(trait, operator, target)` triples
//! that decide whether a node is targeted by an event-driven migration.

mod dotted_version;
mod error;

pub use dotted_version::DottedVersion;
pub use error::ConditionError;

use fleet_migrate_types::ClusterNodeMetadata;
use regex::Regex;
use std::sync::OnceLock;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ConditionTrait {
    Kernel,
    Lsbrelease,
    InstanceType,
    Uptime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ConditionOperator {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
    In,
    #[strum(serialize = "notin")]
    NotIn,
}

impl ConditionOperator {
    fn is_list_op(self) -> bool {
        matches!(self, ConditionOperator::In | ConditionOperator::NotIn)
    }

    fn apply_ordering(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            ConditionOperator::Lt => ordering == Less,
            ConditionOperator::Le => ordering != Greater,
            ConditionOperator::Eq => ordering == Equal,
            ConditionOperator::Ne => ordering != Equal,
            ConditionOperator::Ge => ordering != Less,
            ConditionOperator::Gt => ordering == Greater,
            ConditionOperator::In | ConditionOperator::NotIn => unreachable!("list operator has no ordering"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionTarget {
    Kernel(semver::Version),
    Lsbrelease(DottedVersion),
    InstanceType(Vec<String>),
    Uptime(u64),
}

fn instance_type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9]*\.([a-z0-9]+)$").unwrap())
}

/// AWS-ish instance type syntax check: family token, dot, size token. This
/// does not maintain an enumerated catalog of real instance types — it
/// rejects strings that couldn't plausibly be one (missing a digit in the
/// family, e.g. `foobar.1xsmall`).
fn is_known_instance_type(lower: &str) -> bool {
    let family_has_digit = lower.split('.').next().map(|f| f.chars().any(|c| c.is_ascii_digit())).unwrap_or(false);
    instance_type_regex().is_match(lower) && family_has_digit
}

fn parse_uptime_seconds(target: &str) -> Option<u64> {
    if let Some(days) = target.strip_suffix('d') {
        return days.parse::<u64>().ok().map(|d| d * 24 * 60 * 60);
    }
    if let Some(hours) = target.strip_suffix('h') {
        return hours.parse::<u64>().ok().map(|h| h * 60 * 60);
    }
    target.parse::<u64>().ok()
}

/// `(trait, operator, target)` — parses from and serializes back to the
/// same three plain strings a condition is declared with.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationCondition {
    pub trait_: ConditionTrait,
    pub operator: ConditionOperator,
    pub target: ConditionTarget,
}

impl MigrationCondition {
    pub fn parse(trait_: &str, operator: &str, target: &str) -> Result<Self, ConditionError> {
        let trait_: ConditionTrait =
            trait_.parse().map_err(|_| ConditionError::UnknownTrait(trait_.to_string()))?;
        let operator: ConditionOperator =
            operator.parse().map_err(|_| ConditionError::UnknownOperator(operator.to_string()))?;

        let list_op = operator.is_list_op();
        let trait_takes_list = matches!(trait_, ConditionTrait::InstanceType);
        if list_op != trait_takes_list {
            return Err(ConditionError::OperatorTraitMismatch {
                trait_: trait_.to_string(),
                operator: operator.to_string(),
            });
        }

        let parsed_target = match trait_ {
            ConditionTrait::Kernel => {
                let version = semver::Version::parse(target)
                    .map_err(|_| ConditionError::UnparsableTarget { trait_: trait_.to_string(), target: target.to_string() })?;
                ConditionTarget::Kernel(version)
            }
            ConditionTrait::Lsbrelease => {
                let version = DottedVersion::parse(target)
                    .ok_or_else(|| ConditionError::UnparsableTarget { trait_: trait_.to_string(), target: target.to_string() })?;
                ConditionTarget::Lsbrelease(version)
            }
            ConditionTrait::InstanceType => {
                let types: Vec<String> = target.split(',').map(|s| s.trim().to_lowercase()).collect();
                for t in &types {
                    if !is_known_instance_type(t) {
                        return Err(ConditionError::UnknownInstanceType(t.clone()));
                    }
                }
                ConditionTarget::InstanceType(types)
            }
            ConditionTrait::Uptime => {
                let seconds = parse_uptime_seconds(target)
                    .ok_or_else(|| ConditionError::UnparsableTarget { trait_: trait_.to_string(), target: target.to_string() })?;
                ConditionTarget::Uptime(seconds)
            }
        };

        Ok(MigrationCondition { trait_, operator, target: parsed_target })
    }

    pub fn serialize(&self) -> (String, String, String) {
        let target = match &self.target {
            ConditionTarget::Kernel(v) => v.to_string(),
            ConditionTarget::Lsbrelease(v) => v.to_string(),
            ConditionTarget::InstanceType(types) => types.join(","),
            ConditionTarget::Uptime(seconds) => seconds.to_string(),
        };
        (self.trait_.to_string(), self.operator.to_string(), target)
    }

    /// `true` iff the node's trait value satisfies `operator target`.
    /// Nodes missing the relevant trait data never match.
    pub fn matches(&self, node: &ClusterNodeMetadata) -> bool {
        match (&self.target, self.trait_) {
            (ConditionTarget::Kernel(target), ConditionTrait::Kernel) => {
                let Some(raw) = &node.instance.kernel else { return false };
                let Ok(actual) = semver::Version::parse(raw) else { return false };
                self.operator.apply_ordering(actual.cmp(target))
            }
            (ConditionTarget::Lsbrelease(target), ConditionTrait::Lsbrelease) => {
                let Some(raw) = &node.instance.lsbrelease else { return false };
                let Some(actual) = DottedVersion::parse(raw) else { return false };
                self.operator.apply_ordering(actual.cmp(target))
            }
            (ConditionTarget::InstanceType(types), ConditionTrait::InstanceType) => {
                let actual = node.instance.instance_type.to_lowercase();
                let contained = types.contains(&actual);
                match self.operator {
                    ConditionOperator::In => contained,
                    ConditionOperator::NotIn => !contained,
                    _ => false,
                }
            }
            (ConditionTarget::Uptime(target), ConditionTrait::Uptime) => {
                let actual = node.instance.uptime.as_secs();
                self.operator.apply_ordering(actual.cmp(target))
            }
            _ => false,
        }
    }
}

/// A declarative, one-shot migration trigger: every node matched by
/// `label_selectors` and failing `condition` is a target.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationEvent {
    pub resource_name: String,
    pub cluster: String,
    pub pool: String,
    pub label_selectors: Vec<String>,
    pub condition: MigrationCondition,
}

impl MigrationEvent {
    /// A node is targeted iff it has an orchestrator identity and fails
    /// the event's condition.
    pub fn targets(&self, node: &ClusterNodeMetadata) -> bool {
        !node.agent.agent_id.is_empty() && !self.condition.matches(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("kernel", "ge", "1.2.3-4567-aws")]
    #[case("lsbrelease", "ge", "22.04")]
    #[case("instance_type", "in", "m5.4xlarge,r5.2xLARGE")]
    #[case("uptime", "lt", "30d")]
    #[case("uptime", "le", "1337")]
    fn parses_valid_conditions(#[case] trait_: &str, #[case] operator: &str, #[case] target: &str) {
        assert!(MigrationCondition::parse(trait_, operator, target).is_ok());
    }

    #[test]
    fn instance_type_target_is_lowercased_and_trimmed() {
        let cond = MigrationCondition::parse("instance_type", "in", "m5.4xlarge,r5.2xLARGE").unwrap();
        assert_eq!(
            cond.target,
            ConditionTarget::InstanceType(vec!["m5.4xlarge".to_string(), "r5.2xlarge".to_string()])
        );
    }

    #[test]
    fn uptime_suffix_days_converts_to_seconds() {
        let cond = MigrationCondition::parse("uptime", "lt", "30d").unwrap();
        assert_eq!(cond.target, ConditionTarget::Uptime(30 * 24 * 60 * 60));
    }

    #[rstest]
    #[case("kernel", "ne", "adjksfghlasdjk")]
    #[case("lsbrelease", "ne", "adjksfghlasdjk")]
    #[case("instance_type", "in", "m5.4xlarge,foobar.1xsmall")]
    #[case("uptime", "ge", "foobar")]
    #[case("instance_type", "ge", "m5.4xlarge")]
    #[case("uptime", "in", "1337")]
    fn rejects_invalid_conditions(#[case] trait_: &str, #[case] operator: &str, #[case] target: &str) {
        assert!(MigrationCondition::parse(trait_, operator, target).is_err());
    }

    #[rstest]
    #[case("lsbrelease", "ge", "1.2")]
    #[case("instance_type", "in", "m5.4xlarge,r5.2xlarge")]
    #[case("uptime", "lt", "1337")]
    #[case("kernel", "ge", "1.2.3")]
    fn round_trips_through_serialize(#[case] trait_: &str, #[case] operator: &str, #[case] target: &str) {
        let cond = MigrationCondition::parse(trait_, operator, target).unwrap();
        let (t, o, tgt) = cond.serialize();
        let reparsed = MigrationCondition::parse(&t, &o, &tgt).unwrap();
        assert_eq!(cond, reparsed);
    }
}

//! Condition bookkeeping for the `ClusterOperator` status.
//!
//! Each reconcile loop owns two entries, `<Name>ControllerAvailable` and
//! `<Name>ControllerDegraded`. The standard `Available`, `Degraded`,
//! `Progressing` and `Upgradeable` conditions are derived from all owned
//! entries on every write.

use super::Outcome;
use crate::crd::{ClusterOperatorStatusCondition, ConditionStatus};

pub const AVAILABLE: &str = "Available";
pub const DEGRADED: &str = "Degraded";
pub const PROGRESSING: &str = "Progressing";
pub const UPGRADEABLE: &str = "Upgradeable";

pub const REASON_AS_EXPECTED: &str = "AsExpected";
const REASON_MULTIPLE_DEGRADED: &str = "MultipleControllersDegraded";

const AVAILABLE_SUFFIX: &str = "ControllerAvailable";
const DEGRADED_SUFFIX: &str = "ControllerDegraded";

const AVAILABLE_MESSAGE: &str = "Cluster CAPI Operator is available";
const PROGRESSING_MESSAGE: &str = "Cluster CAPI Operator is not progressing";
const UPGRADEABLE_MESSAGE: &str = "Cluster CAPI Operator is upgradeable";

/// Condition types owned by one controller
pub fn owned_condition_types(controller: &str) -> (String, String) {
    (
        format!("{controller}{AVAILABLE_SUFFIX}"),
        format!("{controller}{DEGRADED_SUFFIX}"),
    )
}

fn condition(
    condition_type: String,
    status: ConditionStatus,
    reason: &str,
    message: &str,
) -> ClusterOperatorStatusCondition {
    ClusterOperatorStatusCondition {
        r#type: condition_type,
        status,
        last_transition_time: None,
        reason: Some(reason.to_string()),
        message: (!message.is_empty()).then(|| message.to_string()),
    }
}

/// The two entries a controller writes for an outcome
pub fn owned_conditions(controller: &str, outcome: &Outcome) -> [ClusterOperatorStatusCondition; 2] {
    let (available_type, degraded_type) = owned_condition_types(controller);
    match outcome {
        Outcome::Available { message } => [
            condition(available_type, ConditionStatus::True, REASON_AS_EXPECTED, message),
            condition(degraded_type, ConditionStatus::False, REASON_AS_EXPECTED, ""),
        ],
        Outcome::Degraded { reason, message } => [
            condition(available_type, ConditionStatus::False, reason, message),
            condition(degraded_type, ConditionStatus::True, reason, message),
        ],
    }
}

/// Insert or update a condition by type
///
/// `lastTransitionTime` moves to `now` only when the status flips or the
/// condition is new.
pub fn set_condition(
    conditions: &mut Vec<ClusterOperatorStatusCondition>,
    mut new: ClusterOperatorStatusCondition,
    now: &str,
) {
    match conditions.iter_mut().find(|c| c.r#type == new.r#type) {
        Some(existing) => {
            new.last_transition_time = if existing.status == new.status {
                existing
                    .last_transition_time
                    .clone()
                    .or_else(|| Some(now.to_string()))
            } else {
                Some(now.to_string())
            };
            *existing = new;
        }
        None => {
            new.last_transition_time = Some(now.to_string());
            conditions.push(new);
        }
    }
}

/// Aggregate conditions computed from every controller's owned entries
pub fn aggregate_conditions(
    conditions: &[ClusterOperatorStatusCondition],
) -> [ClusterOperatorStatusCondition; 4] {
    let degraded: Vec<&ClusterOperatorStatusCondition> = conditions
        .iter()
        .filter(|c| c.r#type.ends_with(DEGRADED_SUFFIX) && c.status == ConditionStatus::True)
        .collect();
    let unavailable: Vec<&ClusterOperatorStatusCondition> = conditions
        .iter()
        .filter(|c| c.r#type.ends_with(AVAILABLE_SUFFIX) && c.status == ConditionStatus::False)
        .collect();

    let available = match unavailable.as_slice() {
        [] => condition(
            AVAILABLE.to_string(),
            ConditionStatus::True,
            REASON_AS_EXPECTED,
            AVAILABLE_MESSAGE,
        ),
        entries => condition(
            AVAILABLE.to_string(),
            ConditionStatus::False,
            &summary_reason(entries),
            &summary_message(entries),
        ),
    };

    let degraded = match degraded.as_slice() {
        [] => condition(
            DEGRADED.to_string(),
            ConditionStatus::False,
            REASON_AS_EXPECTED,
            "",
        ),
        entries => condition(
            DEGRADED.to_string(),
            ConditionStatus::True,
            &summary_reason(entries),
            &summary_message(entries),
        ),
    };

    [
        available,
        degraded,
        condition(
            PROGRESSING.to_string(),
            ConditionStatus::False,
            REASON_AS_EXPECTED,
            PROGRESSING_MESSAGE,
        ),
        condition(
            UPGRADEABLE.to_string(),
            ConditionStatus::True,
            REASON_AS_EXPECTED,
            UPGRADEABLE_MESSAGE,
        ),
    ]
}

fn summary_reason(entries: &[&ClusterOperatorStatusCondition]) -> String {
    match entries {
        [single] => single
            .reason
            .clone()
            .unwrap_or_else(|| REASON_MULTIPLE_DEGRADED.to_string()),
        _ => REASON_MULTIPLE_DEGRADED.to_string(),
    }
}

fn summary_message(entries: &[&ClusterOperatorStatusCondition]) -> String {
    entries
        .iter()
        .map(|c| match c.message.as_deref() {
            Some(message) => format!("{}: {}", c.r#type, message),
            None => c.r#type.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

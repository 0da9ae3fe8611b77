//! Status transitions
//!
//! ```text
//! (new) ──created──▶ pending ─┬─▶ verified ◀─┐
//!        └─created─▶ suspicious ┴─▶ rejected ◀─┘ manually-overridden (reviewer only)
//! ```
//!
//! [`Transition`] and [`Genesis`] can only be built here, so the store's status
//! update methods cannot be reached with an unchecked status change.

use crate::scoring::Decision;
use chrono::{DateTime, Utc};
use clickguard_core::{
    AuditAction, AuditLogEntry, CoreError, Event, VerificationStatus, SYSTEM_ACTOR,
};

/// Who performs a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    System,
    Reviewer(String),
}

impl Actor {
    pub fn reviewer(id: impl Into<String>) -> Self {
        Actor::Reviewer(id.into())
    }

    pub fn performed_by(&self) -> &str {
        match self {
            Actor::System => SYSTEM_ACTOR,
            Actor::Reviewer(id) => id,
        }
    }
}

/// A validated status change together with its audit entry
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    event_id: String,
    from: VerificationStatus,
    to: VerificationStatus,
    entry: AuditLogEntry,
}

impl Transition {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// Status the event must still hold when the transition is applied
    pub fn from(&self) -> VerificationStatus {
        self.from
    }

    pub fn to(&self) -> VerificationStatus {
        self.to
    }

    pub fn entry(&self) -> &AuditLogEntry {
        &self.entry
    }

    pub fn is_override(&self) -> bool {
        self.entry.action == AuditAction::ManuallyOverridden
    }
}

/// A new event with the audit entries that create it
#[derive(Debug, Clone, PartialEq)]
pub struct Genesis {
    event: Event,
    entries: Vec<AuditLogEntry>,
}

impl Genesis {
    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn entries(&self) -> &[AuditLogEntry] {
        &self.entries
    }

    pub fn into_event(self) -> Event {
        self.event
    }

    #[cfg(test)]
    pub(crate) fn for_test(event: Event) -> Self {
        let entry = entry(
            &event.id,
            AuditAction::Created,
            None,
            event.status,
            &Actor::System,
            event.timestamp,
            None,
        );
        Self {
            event,
            entries: vec![entry],
        }
    }
}

fn entry(
    event_id: &str,
    action: AuditAction,
    old_value: Option<VerificationStatus>,
    new_value: VerificationStatus,
    actor: &Actor,
    at: DateTime<Utc>,
    notes: Option<String>,
) -> AuditLogEntry {
    AuditLogEntry {
        id: uuid::Uuid::new_v4().to_string(),
        conversion_id: event_id.to_string(),
        action,
        old_value,
        new_value,
        performed_by: actor.performed_by().to_string(),
        timestamp: at,
        notes,
    }
}

/// Build the genesis of a scored event.
///
/// A rejection is recorded as creation in `pending` followed by an automatic
/// rejection, so the trail shows what the system decided.
pub fn genesis(mut event: Event, decision: Decision, reasons: &[String]) -> Genesis {
    let at = event.timestamp;
    let initial = match decision {
        Decision::Suspicious => VerificationStatus::Suspicious,
        Decision::Pending | Decision::Rejected => VerificationStatus::Pending,
    };

    let mut entries = vec![entry(
        &event.id,
        AuditAction::Created,
        None,
        initial,
        &Actor::System,
        at,
        None,
    )];

    if decision == Decision::Rejected {
        entries.push(entry(
            &event.id,
            AuditAction::Rejected,
            Some(initial),
            VerificationStatus::Rejected,
            &Actor::System,
            at,
            Some(format!("automatic rejection: {}", reasons.join(", "))),
        ));
    }

    event.status = decision.status();
    Genesis { event, entries }
}

fn invalid(from: VerificationStatus, to: VerificationStatus, reason: &str) -> CoreError {
    CoreError::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
        reason: reason.to_string(),
    }
}

/// Validate a status change of `event` and produce the transition to apply
pub fn plan(
    event: &Event,
    to: VerificationStatus,
    actor: &Actor,
    notes: Option<String>,
    at: DateTime<Utc>,
) -> Result<Transition, CoreError> {
    let from = event.status;

    if from == to {
        return Err(invalid(from, to, "event already has this status"));
    }
    if !to.is_terminal() {
        return Err(invalid(from, to, "only verified or rejected can be entered"));
    }

    let action = if from.is_terminal() {
        if *actor == Actor::System {
            return Err(invalid(
                from,
                to,
                "a terminal status can only be overridden by a reviewer",
            ));
        }
        AuditAction::ManuallyOverridden
    } else if to == VerificationStatus::Verified {
        AuditAction::Verified
    } else {
        AuditAction::Rejected
    };

    Ok(Transition {
        event_id: event.id.clone(),
        from,
        to,
        entry: entry(&event.id, action, Some(from), to, actor, at, notes),
    })
}

/// Reconstruct the current status from an event's audit trail
pub fn replay(entries: &[AuditLogEntry]) -> Result<VerificationStatus, CoreError> {
    let (first, rest) = entries
        .split_first()
        .ok_or_else(|| CoreError::InvalidValue("empty audit trail".to_string()))?;

    if first.action != AuditAction::Created || first.old_value.is_some() {
        return Err(CoreError::InvalidValue(format!(
            "audit trail of {} does not start with creation",
            first.conversion_id
        )));
    }

    let mut status = first.new_value;
    for entry in rest {
        if entry.old_value != Some(status) {
            return Err(CoreError::InvalidValue(format!(
                "audit entry {} expects {:?}, trail is at {}",
                entry.id, entry.old_value, status
            )));
        }
        status = entry.new_value;
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clickguard_core::EventDetails;

    fn conversion(status: VerificationStatus) -> Event {
        Event {
            id: "conv-1".to_string(),
            affiliate_id: "aff".to_string(),
            campaign_id: "camp".to_string(),
            details: EventDetails::Conversion {
                amount: 10_000,
                commission: 1_000,
            },
            timestamp: Utc::now(),
            session_key: "s".to_string(),
            hashed_identifier: "h".to_string(),
            user_agent: String::new(),
            client_fingerprint: None,
            signature: String::new(),
            risk_score: 0,
            status,
            security_flags: vec![],
            webhook_validated: false,
        }
    }

    #[test]
    fn test_genesis_for_each_decision() {
        let event = conversion(VerificationStatus::Pending);

        let pending = genesis(event.clone(), Decision::Pending, &[]);
        assert_eq!(pending.event().status, VerificationStatus::Pending);
        assert_eq!(pending.entries().len(), 1);

        let suspicious = genesis(event.clone(), Decision::Suspicious, &[]);
        assert_eq!(suspicious.entries()[0].new_value, VerificationStatus::Suspicious);

        let reasons = vec!["blacklisted".to_string()];
        let rejected = genesis(event, Decision::Rejected, &reasons);
        assert_eq!(rejected.event().status, VerificationStatus::Rejected);
        let actions: Vec<_> = rejected.entries().iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Created, AuditAction::Rejected]);
        assert!(rejected.entries().iter().all(|e| e.is_automated()));
        assert_eq!(replay(rejected.entries()).unwrap(), VerificationStatus::Rejected);
    }

    #[test]
    fn test_plan_from_open_states() {
        let now = Utc::now();
        for from in [VerificationStatus::Pending, VerificationStatus::Suspicious] {
            let event = conversion(from);
            let verify = plan(&event, VerificationStatus::Verified, &Actor::System, None, now).unwrap();
            assert_eq!(verify.entry().action, AuditAction::Verified);
            assert_eq!(verify.from(), from);

            let reject = plan(
                &event,
                VerificationStatus::Rejected,
                &Actor::reviewer("alice"),
                Some("chargeback".into()),
                now,
            )
            .unwrap();
            assert_eq!(reject.entry().action, AuditAction::Rejected);
            assert_eq!(reject.entry().performed_by, "alice");
        }
    }

    #[test]
    fn test_override_requires_reviewer() {
        let now = Utc::now();
        let event = conversion(VerificationStatus::Verified);

        let err = plan(&event, VerificationStatus::Rejected, &Actor::System, None, now).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));

        let transition = plan(
            &event,
            VerificationStatus::Rejected,
            &Actor::reviewer("bob"),
            None,
            now,
        )
        .unwrap();
        assert!(transition.is_override());
        assert_eq!(transition.entry().old_value, Some(VerificationStatus::Verified));
    }

    #[test]
    fn test_invalid_transitions() {
        let now = Utc::now();
        let reviewer = Actor::reviewer("carol");

        let same = plan(
            &conversion(VerificationStatus::Verified),
            VerificationStatus::Verified,
            &reviewer,
            None,
            now,
        );
        assert!(same.is_err());

        let back = plan(
            &conversion(VerificationStatus::Rejected),
            VerificationStatus::Pending,
            &reviewer,
            None,
            now,
        );
        assert!(back.is_err());

        let sideways = plan(
            &conversion(VerificationStatus::Pending),
            VerificationStatus::Suspicious,
            &Actor::System,
            None,
            now,
        );
        assert!(sideways.is_err());
    }

    #[test]
    fn test_replay_follows_trail() {
        let now = Utc::now();
        let mut event = conversion(VerificationStatus::Pending);
        let created = genesis(event.clone(), Decision::Suspicious, &[]);
        let mut trail = created.entries().to_vec();

        event.status = VerificationStatus::Suspicious;
        let verified = plan(&event, VerificationStatus::Verified, &Actor::System, None, now).unwrap();
        trail.push(verified.entry().clone());

        event.status = VerificationStatus::Verified;
        let overridden = plan(
            &event,
            VerificationStatus::Rejected,
            &Actor::reviewer("dave"),
            None,
            now,
        )
        .unwrap();
        trail.push(overridden.entry().clone());

        assert_eq!(replay(&trail).unwrap(), VerificationStatus::Rejected);
        assert_eq!(replay(&trail[..2]).unwrap(), VerificationStatus::Verified);
    }

    #[test]
    fn test_replay_rejects_broken_trail() {
        assert!(replay(&[]).is_err());

        let now = Utc::now();
        let event = conversion(VerificationStatus::Pending);
        let transition = plan(&event, VerificationStatus::Verified, &Actor::System, None, now).unwrap();
        assert!(replay(&[transition.entry().clone()]).is_err());
    }
}

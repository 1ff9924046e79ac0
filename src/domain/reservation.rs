//! Reservation lifecycle and code generation.
//!
//! A reservation is born `PENDING`, becomes `APPROVED` when an admin
//! records a payment transaction id, or `VOIDED` when either side backs
//! out. `DELETED` is an administrative tombstone. `APPROVED` is terminal:
//! the idempotency guard on re-approval lives in the service layer and
//! keys off `confirmed_at`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReservationState {
    /// Created, awaiting admin approval.
    Pending,
    /// Payment verified by an admin; the slot is committed.
    Approved,
    /// Cancelled before approval.
    Voided,
    /// Administratively removed; kept for bookkeeping.
    Deleted,
}

impl ReservationState {
    /// Parses the database string form (`"PENDING"`, ...).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "APPROVED" => Some(Self::Approved),
            "VOIDED" => Some(Self::Voided),
            "DELETED" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// String form stored in `reservations.state`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Voided => "VOIDED",
            Self::Deleted => "DELETED",
        }
    }

    /// Whether the reservation still occupies its event date.
    ///
    /// Active reservations are what the date-overlap guard (and the
    /// partial unique index backing it) counts.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }

    /// Whether a transition from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Voided)
                | (Self::Pending, Self::Deleted)
                | (Self::Approved, Self::Deleted)
        )
    }
}

impl fmt::Display for ReservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generates a human-readable reservation code: `RES-NNNN-XXXX`.
///
/// Four random digits plus four hex characters from a fresh UUID. Not
/// collision-proof; the unique constraint on `reservations.code` is the
/// backstop and callers retry on a collision.
#[must_use]
pub fn generate_reservation_code() -> String {
    let number = rand::Rng::gen_range(&mut rand::thread_rng(), 1000..10000);
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(4)
        .collect::<String>()
        .to_uppercase();
    format!("RES-{number}-{suffix}")
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn state_strings_round_trip() {
        for state in [
            ReservationState::Pending,
            ReservationState::Approved,
            ReservationState::Voided,
            ReservationState::Deleted,
        ] {
            assert_eq!(ReservationState::parse(state.as_str()), Some(state));
        }
        assert_eq!(ReservationState::parse("CONFIRMED"), None);
    }

    #[test]
    fn pending_reaches_every_other_state() {
        let pending = ReservationState::Pending;
        assert!(pending.can_transition_to(ReservationState::Approved));
        assert!(pending.can_transition_to(ReservationState::Voided));
        assert!(pending.can_transition_to(ReservationState::Deleted));
    }

    #[test]
    fn approved_only_deletes() {
        let approved = ReservationState::Approved;
        assert!(approved.can_transition_to(ReservationState::Deleted));
        assert!(!approved.can_transition_to(ReservationState::Pending));
        assert!(!approved.can_transition_to(ReservationState::Voided));
        assert!(!approved.can_transition_to(ReservationState::Approved));
    }

    #[test]
    fn voided_and_deleted_are_terminal() {
        for state in [ReservationState::Voided, ReservationState::Deleted] {
            for next in [
                ReservationState::Pending,
                ReservationState::Approved,
                ReservationState::Voided,
                ReservationState::Deleted,
            ] {
                assert!(!state.can_transition_to(next));
            }
        }
    }

    #[test]
    fn only_pending_and_approved_are_active() {
        assert!(ReservationState::Pending.is_active());
        assert!(ReservationState::Approved.is_active());
        assert!(!ReservationState::Voided.is_active());
        assert!(!ReservationState::Deleted.is_active());
    }

    #[test]
    fn code_has_expected_shape() {
        let code = generate_reservation_code();
        let mut parts = code.split('-');
        assert_eq!(parts.next(), Some("RES"));
        let digits = parts.next().unwrap_or_default();
        assert_eq!(digits.len(), 4);
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
        let suffix = parts.next().unwrap_or_default();
        assert_eq!(suffix.len(), 4);
        assert!(parts.next().is_none());
    }
}

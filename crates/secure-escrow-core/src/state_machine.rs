use crate::domain::EscrowStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowAction {
    Approve,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: EscrowStatus,
    pub to: EscrowStatus,
    pub reason: &'static str,
}

impl StateTransition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Applies `action` to `status`. Approving an approved escrow is a no-op, not an error,
/// so the confirmation path and the event path can both run it.
pub fn escrow_transition(
    status: EscrowStatus,
    action: EscrowAction,
) -> (EscrowStatus, StateTransition) {
    let (to, reason) = match (status, action) {
        (EscrowStatus::NotApproved, EscrowAction::Approve) => (EscrowStatus::Approved, "approved"),
        (EscrowStatus::Approved, EscrowAction::Approve) => {
            (EscrowStatus::Approved, "already_approved")
        }
    };
    (
        to,
        StateTransition {
            from: status,
            to,
            reason,
        },
    )
}

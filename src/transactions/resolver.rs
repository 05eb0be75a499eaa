// Counterparty attribution for inbound payments.
//
// A payment identifies its counterparty only by mobile number. Zero local
// matches leaves the record unassigned; exactly one match auto-assigns;
// several matches across clients and providers park the record as a conflict
// until a human picks one.

use crate::directory::models::{Client, Provider};
use crate::error::{AppError, AppResult, PaymentError};
use crate::transactions::models::{
    ConflictCandidate, CounterpartyKind, EntryDirection, TransactionAssignment,
};
use uuid::Uuid;

/// Outcome of matching a counterparty mobile number against the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    /// Nobody matches: store unassigned, no conflict
    Unassigned,
    /// Exactly one match: assign immediately
    Auto {
        candidate: ConflictCandidate,
        direction: EntryDirection,
    },
    /// More than one match: hold for human disambiguation
    Ambiguous(Vec<ConflictCandidate>),
}

pub fn classify(clients: &[Client], providers: &[Provider]) -> Attribution {
    let mut candidates: Vec<ConflictCandidate> = clients
        .iter()
        .map(|c| ConflictCandidate {
            kind: CounterpartyKind::Client,
            id: c.id,
            name: c.name.clone(),
        })
        .collect();
    candidates.extend(providers.iter().map(|p| ConflictCandidate {
        kind: CounterpartyKind::Provider,
        id: p.id,
        name: p.name.clone(),
    }));

    match candidates.len() {
        0 => Attribution::Unassigned,
        1 => {
            let candidate = candidates.remove(0);
            let direction = match candidate.kind {
                CounterpartyKind::Client => EntryDirection::Revenue,
                CounterpartyKind::Provider => EntryDirection::Expense,
            };
            Attribution::Auto {
                candidate,
                direction,
            }
        }
        _ => Attribution::Ambiguous(candidates),
    }
}

/// Resolution is terminal: a record that already carries a resolution is
/// rejected with a Conflict carrying its state.
pub fn ensure_unresolved(assignment: &TransactionAssignment) -> AppResult<()> {
    if assignment.is_resolved() {
        return Err(PaymentError::InvalidTransition {
            entity: "transaction",
            current: "resolved".to_string(),
            requested: "resolved".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Validated disambiguation choice supplied by the caller
#[derive(Debug, Clone)]
pub struct Resolution {
    pub client_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub direction: EntryDirection,
    pub description: String,
    pub project_id: Option<Uuid>,
}

impl Resolution {
    /// Exactly one of client_id / provider_id must be supplied.
    pub fn validate(
        client_id: Option<Uuid>,
        provider_id: Option<Uuid>,
        direction: EntryDirection,
        description: String,
        project_id: Option<Uuid>,
    ) -> AppResult<Self> {
        match (client_id, provider_id) {
            (Some(_), None) | (None, Some(_)) => Ok(Self {
                client_id,
                provider_id,
                direction,
                description,
                project_id,
            }),
            _ => Err(AppError::Validation(
                "Exactly one of client_id or provider_id must be supplied".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn client(name: &str) -> Client {
        Client {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            name: name.to_string(),
            mobile: Some("+221770000001".to_string()),
            created_at: Utc::now(),
        }
    }

    fn provider(name: &str) -> Provider {
        Provider {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            name: name.to_string(),
            mobile: Some("+221770000001".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn no_match_stays_unassigned() {
        assert_eq!(classify(&[], &[]), Attribution::Unassigned);
    }

    #[test]
    fn single_client_auto_assigns_as_revenue() {
        let c = client("Awa Diop");
        match classify(&[c.clone()], &[]) {
            Attribution::Auto {
                candidate,
                direction,
            } => {
                assert_eq!(candidate.id, c.id);
                assert_eq!(candidate.kind, CounterpartyKind::Client);
                assert_eq!(direction, EntryDirection::Revenue);
            }
            other => panic!("unexpected attribution: {:?}", other),
        }
    }

    #[test]
    fn single_provider_auto_assigns_as_expense() {
        let p = provider("Studio K");
        match classify(&[], &[p.clone()]) {
            Attribution::Auto {
                candidate,
                direction,
            } => {
                assert_eq!(candidate.id, p.id);
                assert_eq!(direction, EntryDirection::Expense);
            }
            other => panic!("unexpected attribution: {:?}", other),
        }
    }

    #[test]
    fn two_clients_are_ambiguous() {
        let a = client("Awa Diop");
        let b = client("Awa Ndiaye");
        match classify(&[a, b], &[]) {
            Attribution::Ambiguous(candidates) => assert_eq!(candidates.len(), 2),
            other => panic!("unexpected attribution: {:?}", other),
        }
    }

    #[test]
    fn client_and_provider_sharing_a_number_are_ambiguous() {
        match classify(&[client("Awa Diop")], &[provider("Studio K")]) {
            Attribution::Ambiguous(candidates) => {
                assert_eq!(candidates.len(), 2);
                assert_eq!(candidates[0].kind, CounterpartyKind::Client);
                assert_eq!(candidates[1].kind, CounterpartyKind::Provider);
            }
            other => panic!("unexpected attribution: {:?}", other),
        }
    }

    fn assignment(resolved_at: Option<chrono::DateTime<Utc>>) -> TransactionAssignment {
        TransactionAssignment {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            external_ref: "tx-3e8d".to_string(),
            amount: dec!(25000),
            currency: "XOF".to_string(),
            counterparty_mobile: "+221770000001".to_string(),
            direction: None,
            client_id: None,
            provider_id: None,
            project_id: None,
            counterparty_name: None,
            description: None,
            needs_resolution: true,
            conflict_candidates: None,
            resolved_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn unresolved_assignment_passes_the_guard() {
        assert!(ensure_unresolved(&assignment(None)).is_ok());
    }

    #[test]
    fn resolving_twice_is_a_conflict() {
        let err = ensure_unresolved(&assignment(Some(Utc::now()))).unwrap_err();
        match err {
            AppError::Payment(PaymentError::InvalidTransition { current, .. }) => {
                assert_eq!(current, "resolved");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn resolution_requires_exactly_one_counterparty() {
        let id = Uuid::new_v4();
        assert!(Resolution::validate(
            Some(id),
            None,
            EntryDirection::Revenue,
            "wire".to_string(),
            None
        )
        .is_ok());
        assert!(Resolution::validate(
            None,
            None,
            EntryDirection::Revenue,
            "wire".to_string(),
            None
        )
        .is_err());
        assert!(Resolution::validate(
            Some(id),
            Some(Uuid::new_v4()),
            EntryDirection::Expense,
            "wire".to_string(),
            None
        )
        .is_err());
    }
}

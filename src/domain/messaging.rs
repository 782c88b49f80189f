use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::UserSummary;

#[derive(Debug, Clone, Serialize)]
pub struct ThreadSummary {
    pub id: Uuid,
    pub participants: Vec<UserSummary>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender: UserSummary,
    pub text: String,
    pub attachment_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ThreadSummary {
    /// The first participant who is not `viewer`.
    pub fn partner_of(&self, viewer: Uuid) -> Option<&UserSummary> {
        self.participants.iter().find(|user| user.id != viewer)
    }

    pub fn includes(&self, user_id: Uuid) -> bool {
        self.participants.iter().any(|user| user.id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partner_is_the_other_participant() {
        let ana = UserSummary::new(Uuid::new_v4(), "ana".into(), None);
        let bo = UserSummary::new(Uuid::new_v4(), "bo".into(), None);
        let thread = ThreadSummary {
            id: Uuid::new_v4(),
            participants: vec![ana.clone(), bo.clone()],
            created_at: OffsetDateTime::now_utc(),
        };

        assert_eq!(thread.partner_of(ana.id), Some(&bo));
        assert_eq!(thread.partner_of(bo.id), Some(&ana));
        assert!(thread.includes(ana.id));
        assert!(!thread.includes(Uuid::new_v4()));
    }
}

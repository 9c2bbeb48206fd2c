//! User records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MediaRef, UserId};

/// A user of the generation service.
///
/// Created on first authenticated sign-in from the identity provider's
/// claims. The credit balance is mutated only through ledger operations
/// in the store; this core never deletes users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// The user ID (from the identity provider's `sub` claim).
    pub id: UserId,

    /// Display name from the identity provider.
    pub display_name: String,

    /// Email address from the identity provider.
    pub email: String,

    /// Avatar image reference, if any.
    pub avatar_ref: Option<MediaRef>,

    /// Current credit balance. Never negative.
    pub credit_balance: i64,

    /// When the user record was created.
    pub created_at: DateTime<Utc>,

    /// When the user record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with zero credits.
    #[must_use]
    pub fn new(id: UserId, display_name: String, email: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            display_name,
            email,
            avatar_ref: None,
            credit_balance: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether the balance covers a debit of `amount` credits.
    #[must_use]
    pub fn has_sufficient_credits(&self, amount: i64) -> bool {
        self.credit_balance >= amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_has_zero_balance() {
        let user = User::new(UserId::generate(), "Ada".into(), "ada@example.com".into());
        assert_eq!(user.credit_balance, 0);
        assert!(user.avatar_ref.is_none());
    }

    #[test]
    fn sufficient_credits_boundary() {
        let mut user = User::new(UserId::generate(), "Ada".into(), "ada@example.com".into());
        user.credit_balance = 50;

        assert!(user.has_sufficient_credits(49));
        assert!(user.has_sufficient_credits(50));
        assert!(!user.has_sufficient_credits(51));
    }
}

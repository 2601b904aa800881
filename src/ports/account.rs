use uuid::Uuid;

use crate::domain::User;

/// Account ledger: the only component allowed to mutate a user's credits
///
/// `debit` and `credit` must be atomic per user: the check-and-subtract in
/// `debit` is a single step at commit time, so two concurrent debits can
/// never drive a balance negative even if both read a sufficient balance
/// beforehand.
#[mockall::automock]
#[async_trait::async_trait]
pub trait AccountPort: Send + Sync {
    async fn get_user(&self, user_id: Uuid) -> Result<User, Error>;

    /// Atomically subtract `amount` from the user's balance
    async fn debit(&self, user_id: Uuid, amount: u32) -> Result<User, Error>;

    /// Atomically add `amount` to the user's balance
    ///
    /// Refunds are unconditional; balances have no upper bound.
    async fn credit(&self, user_id: Uuid, amount: u32) -> Result<User, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Domain-level error when a user does not exist
    #[error("user {0} does not exist")]
    UserDoesNotExist(Uuid),

    /// Debit would drive the balance negative
    #[error("insufficient credits: you have {available} credits but the class requires {required} credits")]
    InsufficientFunds { available: u32, required: u32 },

    /// Concurrent modification detected by an optimistic adapter
    ///
    /// Lock-based adapters never return this; compare-and-swap adapters use
    /// it to tell the caller the whole operation is safe to retry.
    #[error("concurrent modification of account state")]
    Conflict,

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not
    /// part of the domain model, such as connectivity, configuration, or
    /// permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}

use crate::{
    adapters::ErasedPoisonError,
    domain::User,
    ports::account::{AccountPort, Error},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
};
use uuid::Uuid;

/// In-memory account ledger
///
/// Each user sits behind its own `Mutex`, so the read-modify-write in
/// `debit`/`credit` serializes per user while operations on independent
/// users only share the brief map read lock. No lock is held across an
/// `.await`.
#[derive(Clone, Debug, Default)]
pub struct MemoryAccounts {
    users: Arc<RwLock<HashMap<Uuid, Arc<Mutex<User>>>>>,
}

impl MemoryAccounts {
    /// Seed a user into the ledger
    pub fn insert_user(&self, user: User) -> Result<(), Error> {
        let user_id = user.user_id;
        self.users
            .write()?
            .insert(user_id, Arc::new(Mutex::new(user)));
        Ok(())
    }

    fn entry(&self, user_id: Uuid) -> Result<Arc<Mutex<User>>, Error> {
        self.users
            .read()?
            .get(&user_id)
            .cloned()
            .ok_or(Error::UserDoesNotExist(user_id))
    }
}

#[async_trait::async_trait]
impl AccountPort for MemoryAccounts {
    async fn get_user(&self, user_id: Uuid) -> Result<User, Error> {
        let entry = self.entry(user_id)?;
        let user = entry.lock()?;
        Ok(user.clone())
    }

    async fn debit(&self, user_id: Uuid, amount: u32) -> Result<User, Error> {
        let entry = self.entry(user_id)?;
        let mut user = entry.lock()?;
        // The balance check happens under the same lock as the subtraction,
        // so a stale read by the caller cannot drive the balance negative.
        if user.credits < amount {
            return Err(Error::InsufficientFunds {
                available: user.credits,
                required: amount,
            });
        }
        user.credits -= amount;
        Ok(user.clone())
    }

    async fn credit(&self, user_id: Uuid, amount: u32) -> Result<User, Error> {
        let entry = self.entry(user_id)?;
        let mut user = entry.lock()?;
        user.credits += amount;
        Ok(user.clone())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}

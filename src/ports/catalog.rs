use uuid::Uuid;

use crate::domain::Class;

/// Class catalog and capacity counter
///
/// The catalog is the only component allowed to mutate `current_bookings`.
/// `try_increment` is a single atomic check-and-increment: of N concurrent
/// callers racing for the last seat, exactly one succeeds.
#[mockall::automock]
#[async_trait::async_trait]
pub trait CatalogPort: Send + Sync {
    async fn get_class(&self, class_id: Uuid) -> Result<Class, Error>;

    async fn insert_class(&self, class: Class) -> Result<Class, Error>;

    /// All classes taught by the given instructor
    async fn find_by_instructor(&self, instructor: &str) -> Result<Vec<Class>, Error>;

    /// Atomically increment the booking counter, failing at capacity
    async fn try_increment(&self, class_id: Uuid) -> Result<Class, Error>;

    /// Atomically decrement the booking counter
    ///
    /// Decrementing a zero counter means an increment/decrement pairing bug
    /// somewhere upstream; it fails with [`Error::CounterUnderflow`] rather
    /// than clamping.
    async fn decrement(&self, class_id: Uuid) -> Result<Class, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Domain-level error when a class does not exist
    #[error("class {0} does not exist")]
    ClassDoesNotExist(Uuid),

    /// The class has no free spots left
    #[error("class {class_id} is already at capacity ({capacity})")]
    CapacityExceeded { class_id: Uuid, capacity: u32 },

    /// Decrement requested on a zero counter
    #[error("booking counter for class {0} is already zero")]
    CounterUnderflow(Uuid),

    /// Concurrent modification detected by an optimistic adapter
    ///
    /// Lock-based adapters never return this; compare-and-swap adapters use
    /// it to tell the caller the whole operation is safe to retry.
    #[error("concurrent modification of catalog state")]
    Conflict,

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not
    /// part of the domain model, such as connectivity, configuration, or
    /// permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::Booking;

/// Booking repository
///
/// Mutations go through conditional primitives so they serialize.
/// `insert_active` re-checks the user's schedule against the row's window
/// snapshot in the same atomic step as the write, and `cancel`/`reinstate`
/// are compare-and-set status flips: of two concurrent cancellations of the
/// same booking, exactly one flips the row and the other observes it no
/// longer active. The engine owns which transitions are legal; the port only
/// provides the atomic steps.
#[mockall::automock]
#[async_trait::async_trait]
pub trait BookingPort: Send + Sync {
    /// Atomically check the user's schedule and persist a new ACTIVE booking
    ///
    /// The check and the write happen in one step against the repository's
    /// own rows: the insert fails with [`Error::ClassAlreadyBooked`] if the
    /// user already holds an ACTIVE booking for the same class, or with
    /// [`Error::OverlappingWindow`] if any of their ACTIVE windows
    /// intersects the row's. Two concurrent inserts for the same user can
    /// therefore never both commit conflicting rows, whatever the callers
    /// read beforehand.
    async fn insert_active(&self, booking: Booking) -> Result<Booking, Error>;

    /// Atomically transition a booking from ACTIVE to CANCELLED
    ///
    /// Fails with [`Error::NotActive`] if the row is in any other state,
    /// including when a concurrent caller won the transition first.
    async fn cancel(&self, booking_id: Uuid, cancelled_at: DateTime<Utc>)
        -> Result<Booking, Error>;

    /// Roll a CANCELLED booking back to ACTIVE
    ///
    /// Compensation primitive for a cancellation unit that failed after the
    /// status flip. Not reachable from any user-facing operation.
    async fn reinstate(&self, booking_id: Uuid) -> Result<Booking, Error>;

    async fn find_by_id(&self, booking_id: Uuid) -> Result<Option<Booking>, Error>;

    /// All ACTIVE bookings held by the user
    async fn find_active_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>, Error>;

    /// The user's ACTIVE booking for a specific class, if any
    async fn find_active_by_user_and_class(
        &self,
        user_id: Uuid,
        class_id: Uuid,
    ) -> Result<Option<Booking>, Error>;

    /// All bookings held by the user, any status
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>, Error>;

    /// Every booking in the store, any status
    async fn list(&self) -> Result<Vec<Booking>, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Domain-level error when a booking does not exist
    #[error("booking {0} does not exist")]
    BookingDoesNotExist(Uuid),

    /// The user already holds an ACTIVE booking for this class
    #[error("user {user_id} already has an active booking for class {class_id}")]
    ClassAlreadyBooked { user_id: Uuid, class_id: Uuid },

    /// The user already holds an ACTIVE booking intersecting this window
    #[error("user {0} already has an active booking overlapping this window")]
    OverlappingWindow(Uuid),

    /// Cancellation requested on a booking that is not active
    #[error("booking {0} is not active")]
    NotActive(Uuid),

    /// Reinstatement requested on a booking that is not cancelled
    #[error("booking {0} is not cancelled")]
    NotCancelled(Uuid),

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not
    /// part of the domain model, such as connectivity, configuration, or
    /// permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}

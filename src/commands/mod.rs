use std::{borrow::Cow, sync::Arc};

use uuid::Uuid;

use crate::{
    ports::{account::AccountPort, booking::BookingPort, catalog::CatalogPort},
    schedule::ScheduleIndex,
};

pub mod cancel_booking;
pub mod create_booking;
pub mod create_class;
pub mod get_bookings;

/// Cancellations are rejected at or inside this many hours before class start
///
/// The boundary is strict: exactly this far before the class is already too
/// late.
pub const CANCELLATION_WINDOW_HOURS: i64 = 2;

/// The booking engine
///
/// Holds the three collaborators the engine orchestrates, wired explicitly at
/// construction. Each operation is a [`tower::Service`] implementation on
/// this struct.
pub struct DomainLogic<A, C, B> {
    account: Arc<A>,
    catalog: Arc<C>,
    bookings: Arc<B>,
    schedule: ScheduleIndex<B, C>,
}

impl<A, C, B> DomainLogic<A, C, B>
where
    A: AccountPort,
    C: CatalogPort,
    B: BookingPort,
{
    pub fn new(account: Arc<A>, catalog: Arc<C>, bookings: Arc<B>) -> Self {
        let schedule = ScheduleIndex::new(bookings.clone(), catalog.clone());
        Self {
            account,
            catalog,
            bookings,
            schedule,
        }
    }
}

impl<A, C, B> Clone for DomainLogic<A, C, B> {
    fn clone(&self) -> Self {
        Self {
            account: self.account.clone(),
            catalog: self.catalog.clone(),
            bookings: self.bookings.clone(),
            schedule: self.schedule.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("class {0} does not exist")]
    ClassNotFound(Uuid),

    #[error("user {0} does not exist")]
    UserNotFound(Uuid),

    #[error("booking {0} does not exist")]
    BookingNotFound(Uuid),

    #[error("class {0} is full")]
    ClassFull(Uuid),

    /// Carries both amounts so the caller sees what was missing
    #[error("insufficient credits: you have {available} credits but the class requires {required} credits")]
    InsufficientCredits { available: u32, required: u32 },

    #[error("you have an overlapping class booking")]
    OverlappingBooking,

    #[error("you have already booked this class")]
    DuplicateBooking,

    #[error("booking {0} is not active")]
    BookingNotActive(Uuid),

    #[error("cannot cancel booking less than 2 hours before class")]
    CancellationWindowClosed,

    #[error("invalid request: {0}")]
    InvalidRequest(Cow<'static, str>),

    #[error("instructor has overlapping class at this time")]
    InstructorOverlap,

    /// Concurrent modification reported by an optimistic adapter
    ///
    /// The only error kind where retrying the whole operation is safe.
    #[error("concurrent modification of {0}, retry the operation")]
    Conflict(Cow<'static, str>),

    /// Internal bug signal, e.g. a counter decremented below zero
    ///
    /// Never clamped or swallowed: it is logged at error level and surfaced
    /// as a server error.
    #[error("invariant violation: {0}")]
    InvariantViolation(Cow<'static, str>),

    #[error("account port error: {0:?}")]
    Account(#[source] crate::ports::account::Error),

    #[error("catalog port error: {0:?}")]
    Catalog(#[source] crate::ports::catalog::Error),

    #[error("booking port error: {0:?}")]
    Bookings(#[source] crate::ports::booking::Error),
}

/// Classification of [`Error`] for callers mapping to transport codes
///
/// This is the single mapping table from error to external status; nothing
/// in this crate (or above it) should ever match on message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Referenced entity absent; not retryable without new input
    NotFound,
    /// A validation failed; the caller must change input or state
    PreconditionFailed,
    /// Concurrent modification detected; safe to retry the whole operation
    Conflict,
    /// Internal bug signal
    InvariantViolation,
    /// Adapter failure (connectivity, configuration, ...)
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::PreconditionFailed => 400,
            ErrorKind::Conflict => 409,
            ErrorKind::InvariantViolation | ErrorKind::Internal => 500,
        }
    }

    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Conflict)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ClassNotFound(_) | Error::UserNotFound(_) | Error::BookingNotFound(_) => {
                ErrorKind::NotFound
            }
            Error::ClassFull(_)
            | Error::InsufficientCredits { .. }
            | Error::OverlappingBooking
            | Error::DuplicateBooking
            | Error::BookingNotActive(_)
            | Error::CancellationWindowClosed
            | Error::InvalidRequest(_)
            | Error::InstructorOverlap => ErrorKind::PreconditionFailed,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Error::Account(_) | Error::Catalog(_) | Error::Bookings(_) => ErrorKind::Internal,
        }
    }
}

impl From<crate::ports::account::Error> for Error {
    fn from(err: crate::ports::account::Error) -> Self {
        use crate::ports::account::Error as AccountError;
        match err {
            AccountError::UserDoesNotExist(user_id) => Error::UserNotFound(user_id),
            AccountError::InsufficientFunds {
                available,
                required,
            } => Error::InsufficientCredits {
                available,
                required,
            },
            AccountError::Conflict => Error::Conflict("account ledger".into()),
            err @ AccountError::Adapter(_) => Error::Account(err),
        }
    }
}

impl From<crate::ports::catalog::Error> for Error {
    fn from(err: crate::ports::catalog::Error) -> Self {
        use crate::ports::catalog::Error as CatalogError;
        match err {
            CatalogError::ClassDoesNotExist(class_id) => Error::ClassNotFound(class_id),
            CatalogError::CapacityExceeded { class_id, .. } => Error::ClassFull(class_id),
            CatalogError::CounterUnderflow(class_id) => Error::InvariantViolation(
                format!("booking counter for class {class_id} decremented below zero").into(),
            ),
            CatalogError::Conflict => Error::Conflict("class catalog".into()),
            err @ CatalogError::Adapter(_) => Error::Catalog(err),
        }
    }
}

impl From<crate::ports::booking::Error> for Error {
    fn from(err: crate::ports::booking::Error) -> Self {
        use crate::ports::booking::Error as BookingError;
        match err {
            BookingError::BookingDoesNotExist(booking_id) => Error::BookingNotFound(booking_id),
            BookingError::ClassAlreadyBooked { .. } => Error::DuplicateBooking,
            BookingError::OverlappingWindow(_) => Error::OverlappingBooking,
            BookingError::NotActive(booking_id) => Error::BookingNotActive(booking_id),
            BookingError::NotCancelled(booking_id) => Error::InvariantViolation(
                format!("booking {booking_id} could not be reinstated during rollback").into(),
            ),
            err @ BookingError::Adapter(_) => Error::Bookings(err),
        }
    }
}

impl From<crate::schedule::Error> for Error {
    fn from(err: crate::schedule::Error) -> Self {
        match err {
            crate::schedule::Error::DanglingClass {
                booking_id,
                class_id,
            } => Error::InvariantViolation(
                format!("booking {booking_id} references missing class {class_id}").into(),
            ),
            crate::schedule::Error::Booking(err) => err.into(),
            crate::schedule::Error::Catalog(err) => err.into(),
        }
    }
}

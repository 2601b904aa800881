use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A platform user as seen by the booking engine
///
/// Everything else about the user (credentials, profile, role) lives in other
/// services and is irrelevant here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    /// Unique identifier for the `User`
    ///
    /// This is also used by other services.
    pub user_id: Uuid,
    /// Current credit balance
    ///
    /// Unsigned on purpose: a balance can never be observed negative. All
    /// mutations go through the account port.
    pub credits: u32,
}

/// A time-boxed class in the catalog
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Class {
    pub class_id: Uuid,
    pub name: String,
    pub instructor: String,
    /// Class window, half-open: `[start_time, end_time)`
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Maximum simultaneous active bookings
    pub capacity: u32,
    /// Number of active bookings, `0..=capacity`
    ///
    /// Only the catalog port mutates this counter.
    pub current_bookings: u32,
    /// Credits a booking for this class consumes
    pub credits_required: u32,
}

impl Class {
    pub fn is_full(&self) -> bool {
        self.current_bookings >= self.capacity
    }

    pub fn available_spots(&self) -> u32 {
        self.capacity.saturating_sub(self.current_bookings)
    }

    /// Half-open interval overlap test against `[start, end)`
    ///
    /// Touching windows (one ends exactly when the other starts) do not
    /// overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && self.end_time > start
    }
}

/// Lifecycle state of a [`Booking`]
///
/// The only transitions are `Active -> Cancelled` (user cancellation) and
/// `Active -> Completed` (time-driven batch process, outside this crate).
/// Both end states are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookingStatus {
    Active,
    Cancelled,
    Completed,
}

/// A reservation linking one user to one class
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Booking {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub class_id: Uuid,
    pub status: BookingStatus,
    /// Credits consumed at booking time
    ///
    /// Snapshot of the class's `credits_required` when the booking was
    /// created; immutable afterwards, so a later price change refunds the
    /// amount that was actually paid.
    pub credits_used: u32,
    /// Class window at booking time, half-open: `[start_time, end_time)`
    ///
    /// Snapshot like `credits_used`. The booking repository checks new
    /// ACTIVE rows against these under its own lock, so the non-overlap
    /// guarantee never depends on a read from another store.
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// When the booking was cancelled, if it was
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Active
    }

    /// Half-open overlap test on the booked window, same rule as
    /// [`Class::overlaps`]
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && self.end_time > start
    }
}

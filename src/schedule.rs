use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::ports::{booking::BookingPort, catalog::CatalogPort};

/// Schedule-overlap queries for a user
///
/// Joins the user's ACTIVE bookings against the catalog to answer whether a
/// candidate window collides with anything already booked. Read-only: its
/// answer is only as fresh as the snapshot it reads, so the engine runs it
/// before applying effects and relies on the atomic port operations for the
/// authoritative enforcement.
pub struct ScheduleIndex<B, C> {
    bookings: Arc<B>,
    catalog: Arc<C>,
}

impl<B, C> Clone for ScheduleIndex<B, C> {
    fn clone(&self) -> Self {
        Self {
            bookings: self.bookings.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

impl<B, C> ScheduleIndex<B, C>
where
    B: BookingPort,
    C: CatalogPort,
{
    pub fn new(bookings: Arc<B>, catalog: Arc<C>) -> Self {
        Self { bookings, catalog }
    }

    /// Does the user hold an ACTIVE booking whose class window intersects
    /// `[start, end)`?
    ///
    /// Half-open test: a booking ending exactly at `start` (or starting
    /// exactly at `end`) does not collide.
    pub async fn has_overlap(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let active = self.bookings.find_active_by_user(user_id).await?;
        for booking in active {
            let class = match self.catalog.get_class(booking.class_id).await {
                Ok(class) => class,
                // An active booking pointing at a missing class is corrupt
                // state, not a user error.
                Err(crate::ports::catalog::Error::ClassDoesNotExist(class_id)) => {
                    return Err(Error::DanglingClass {
                        booking_id: booking.booking_id,
                        class_id,
                    })
                }
                Err(err) => return Err(err.into()),
            };
            if class.overlaps(start, end) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An ACTIVE booking references a class that no longer exists
    #[error("booking {booking_id} references missing class {class_id}")]
    DanglingClass { booking_id: Uuid, class_id: Uuid },

    #[error("booking port error: {0:?}")]
    Booking(#[from] crate::ports::booking::Error),

    #[error("catalog port error: {0:?}")]
    Catalog(#[from] crate::ports::catalog::Error),
}

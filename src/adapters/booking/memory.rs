use crate::{
    adapters::ErasedPoisonError,
    domain::{Booking, BookingStatus},
    ports::booking::{BookingPort, Error},
};
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};
use uuid::Uuid;

/// In-memory booking repository
///
/// Rows are small and every mutation is a short critical section, so a
/// single `RwLock` over the map is enough here. `insert_active` scans the
/// user's ACTIVE rows and inserts under the same write lock, and
/// `cancel`/`reinstate` do their status check the same way, which makes
/// every mutation a single check-and-apply step.
#[derive(Clone, Debug, Default)]
pub struct MemoryBookings {
    rows: Arc<RwLock<HashMap<Uuid, Booking>>>,
}

#[async_trait::async_trait]
impl BookingPort for MemoryBookings {
    async fn insert_active(&self, booking: Booking) -> Result<Booking, Error> {
        let mut rows = self.rows.write()?;
        // The schedule check runs against the rows' window snapshots under
        // the write lock, so no concurrent insert can slip a conflicting
        // row in between the scan and the write.
        for existing in rows.values() {
            if existing.user_id != booking.user_id || !existing.is_active() {
                continue;
            }
            if existing.class_id == booking.class_id {
                return Err(Error::ClassAlreadyBooked {
                    user_id: booking.user_id,
                    class_id: booking.class_id,
                });
            }
            if existing.overlaps(booking.start_time, booking.end_time) {
                return Err(Error::OverlappingWindow(booking.user_id));
            }
        }
        rows.insert(booking.booking_id, booking.clone());
        Ok(booking)
    }

    async fn cancel(
        &self,
        booking_id: Uuid,
        cancelled_at: DateTime<Utc>,
    ) -> Result<Booking, Error> {
        let mut rows = self.rows.write()?;
        let booking = rows
            .get_mut(&booking_id)
            .ok_or(Error::BookingDoesNotExist(booking_id))?;
        if booking.status != BookingStatus::Active {
            return Err(Error::NotActive(booking_id));
        }
        booking.status = BookingStatus::Cancelled;
        booking.cancelled_at = Some(cancelled_at);
        booking.updated_at = cancelled_at;
        Ok(booking.clone())
    }

    async fn reinstate(&self, booking_id: Uuid) -> Result<Booking, Error> {
        let mut rows = self.rows.write()?;
        let booking = rows
            .get_mut(&booking_id)
            .ok_or(Error::BookingDoesNotExist(booking_id))?;
        if booking.status != BookingStatus::Cancelled {
            return Err(Error::NotCancelled(booking_id));
        }
        booking.status = BookingStatus::Active;
        booking.cancelled_at = None;
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn find_by_id(&self, booking_id: Uuid) -> Result<Option<Booking>, Error> {
        Ok(self.rows.read()?.get(&booking_id).cloned())
    }

    async fn find_active_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>, Error> {
        Ok(self
            .rows
            .read()?
            .values()
            .filter(|b| b.user_id == user_id && b.status == BookingStatus::Active)
            .cloned()
            .collect())
    }

    async fn find_active_by_user_and_class(
        &self,
        user_id: Uuid,
        class_id: Uuid,
    ) -> Result<Option<Booking>, Error> {
        Ok(self
            .rows
            .read()?
            .values()
            .find(|b| {
                b.user_id == user_id
                    && b.class_id == class_id
                    && b.status == BookingStatus::Active
            })
            .cloned())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>, Error> {
        Ok(self
            .rows
            .read()?
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list(&self) -> Result<Vec<Booking>, Error> {
        Ok(self.rows.read()?.values().cloned().collect())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}

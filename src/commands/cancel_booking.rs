use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::{Duration, Utc};
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::Booking,
    ports::{account::AccountPort, booking::BookingPort, catalog::CatalogPort},
};

use super::{create_booking::unwind, DomainLogic, Error, CANCELLATION_WINDOW_HOURS};

pub struct CancelBookingRequest {
    pub user_id: Uuid,
    pub booking_id: Uuid,
}

impl<A, C, B> Service<CancelBookingRequest> for DomainLogic<A, C, B>
where
    A: AccountPort + 'static,
    C: CatalogPort + 'static,
    B: BookingPort + 'static,
{
    type Response = Booking;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CancelBookingRequest) -> Self::Future {
        let account = self.account.clone();
        let catalog = self.catalog.clone();
        let bookings = self.bookings.clone();
        Box::pin(async move {
            // A booking owned by someone else looks exactly like a missing
            // one; existence is not leaked across users.
            let booking = bookings
                .find_by_id(req.booking_id)
                .await?
                .filter(|b| b.user_id == req.user_id)
                .ok_or(Error::BookingNotFound(req.booking_id))?;
            if !booking.is_active() {
                return Err(Error::BookingNotActive(booking.booking_id));
            }

            let class = match catalog.get_class(booking.class_id).await {
                Ok(class) => class,
                Err(crate::ports::catalog::Error::ClassDoesNotExist(class_id)) => {
                    return Err(Error::InvariantViolation(
                        format!(
                            "booking {} references missing class {class_id}",
                            booking.booking_id
                        )
                        .into(),
                    ))
                }
                Err(err) => return Err(err.into()),
            };

            // Strict boundary: exactly the window far before the class is
            // already too late.
            let now = Utc::now();
            if class.start_time - now <= Duration::hours(CANCELLATION_WINDOW_HOURS) {
                return Err(Error::CancellationWindowClosed);
            }

            // Effects. The status flip is a compare-and-set, so of two
            // concurrent cancellations only one gets this far with effects;
            // the other fails above or right here with `BookingNotActive`.
            let cancelled = bookings.cancel(booking.booking_id, now).await?;

            if let Err(err) = account.credit(req.user_id, booking.credits_used).await {
                unwind(
                    bookings.reinstate(booking.booking_id).await,
                    "reinstate booking after failed refund",
                )?;
                return Err(err.into());
            }
            if let Err(err) = catalog.decrement(booking.class_id).await {
                // Both compensations run even if the first fails, so as much
                // state as possible is put back before the error surfaces.
                let took_back = unwind(
                    account.debit(req.user_id, booking.credits_used).await,
                    "take back refund after failed decrement",
                );
                let reinstated = unwind(
                    bookings.reinstate(booking.booking_id).await,
                    "reinstate booking after failed decrement",
                );
                took_back.and(reinstated)?;
                return Err(err.into());
            }

            tracing::info!(
                booking_id = %cancelled.booking_id,
                user_id = %cancelled.user_id,
                class_id = %cancelled.class_id,
                credits_refunded = cancelled.credits_used,
                "booking cancelled"
            );
            Ok(cancelled)
        })
    }
}

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::{DateTime, Utc};
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{Booking, BookingStatus},
    ports::booking::BookingPort,
};

use super::{DomainLogic, Error};

/// All bookings of one user, newest first
pub struct GetUserBookingsRequest {
    pub user_id: Uuid,
}

/// One booking, scoped to its owner
pub struct GetBookingRequest {
    pub user_id: Uuid,
    pub booking_id: Uuid,
}

/// Admin view over every booking, with optional filters
#[derive(Default)]
pub struct ListBookingsRequest {
    pub user_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
    pub created_after: Option<DateTime<Utc>>,
    pub credits_used: Option<u32>,
}

fn newest_first(mut bookings: Vec<Booking>) -> Vec<Booking> {
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    bookings
}

impl<A, C, B> Service<GetUserBookingsRequest> for DomainLogic<A, C, B>
where
    A: 'static,
    C: 'static,
    B: BookingPort + 'static,
{
    type Response = Vec<Booking>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: GetUserBookingsRequest) -> Self::Future {
        let bookings = self.bookings.clone();
        Box::pin(async move {
            let rows = bookings.find_by_user(req.user_id).await?;
            Ok(newest_first(rows))
        })
    }
}

impl<A, C, B> Service<GetBookingRequest> for DomainLogic<A, C, B>
where
    A: 'static,
    C: 'static,
    B: BookingPort + 'static,
{
    type Response = Booking;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: GetBookingRequest) -> Self::Future {
        let bookings = self.bookings.clone();
        Box::pin(async move {
            // Same ownership rule as cancellation: another user's booking
            // does not exist as far as this caller can tell.
            bookings
                .find_by_id(req.booking_id)
                .await?
                .filter(|b| b.user_id == req.user_id)
                .ok_or(Error::BookingNotFound(req.booking_id))
        })
    }
}

impl<A, C, B> Service<ListBookingsRequest> for DomainLogic<A, C, B>
where
    A: 'static,
    C: 'static,
    B: BookingPort + 'static,
{
    type Response = Vec<Booking>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ListBookingsRequest) -> Self::Future {
        let bookings = self.bookings.clone();
        Box::pin(async move {
            let rows = bookings.list().await?;
            let rows = rows
                .into_iter()
                .filter(|b| req.user_id.map_or(true, |user_id| b.user_id == user_id))
                .filter(|b| req.class_id.map_or(true, |class_id| b.class_id == class_id))
                .filter(|b| req.status.map_or(true, |status| b.status == status))
                .filter(|b| {
                    req.created_after
                        .map_or(true, |after| b.created_at >= after)
                })
                .filter(|b| {
                    req.credits_used
                        .map_or(true, |credits| b.credits_used == credits)
                })
                .collect();
            Ok(newest_first(rows))
        })
    }
}

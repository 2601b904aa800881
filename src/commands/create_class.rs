use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::{DateTime, Utc};
use tower::Service;
use uuid::Uuid;

use crate::{domain::Class, ports::catalog::CatalogPort};

use super::{DomainLogic, Error};

pub struct CreateClassRequest {
    pub name: String,
    pub instructor: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: u32,
    pub credits_required: u32,
}

impl<A, C, B> Service<CreateClassRequest> for DomainLogic<A, C, B>
where
    A: 'static,
    C: CatalogPort + 'static,
    B: 'static,
{
    type Response = Class;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CreateClassRequest) -> Self::Future {
        let catalog = self.catalog.clone();
        Box::pin(async move {
            if req.end_time <= req.start_time {
                return Err(Error::InvalidRequest(
                    "end time must be after start time".into(),
                ));
            }
            if req.capacity == 0 {
                return Err(Error::InvalidRequest("capacity must be at least 1".into()));
            }
            if req.credits_required == 0 {
                return Err(Error::InvalidRequest(
                    "credits required must be at least 1".into(),
                ));
            }

            // An instructor cannot teach two classes at once. Booking-time
            // checks never look at this again; it only has to hold here.
            let existing = catalog.find_by_instructor(&req.instructor).await?;
            if existing
                .iter()
                .any(|class| class.overlaps(req.start_time, req.end_time))
            {
                return Err(Error::InstructorOverlap);
            }

            let class = Class {
                class_id: Uuid::new_v4(),
                name: req.name,
                instructor: req.instructor,
                start_time: req.start_time,
                end_time: req.end_time,
                capacity: req.capacity,
                current_bookings: 0,
                credits_required: req.credits_required,
            };
            let class = catalog.insert_class(class).await?;
            tracing::info!(
                class_id = %class.class_id,
                instructor = %class.instructor,
                capacity = class.capacity,
                "class created"
            );
            Ok(class)
        })
    }
}

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::Utc;
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{Booking, BookingStatus},
    ports::{account::AccountPort, booking::BookingPort, catalog::CatalogPort},
};

use super::{DomainLogic, Error};

pub struct CreateBookingRequest {
    pub user_id: Uuid,
    pub class_id: Uuid,
}

impl<A, C, B> Service<CreateBookingRequest> for DomainLogic<A, C, B>
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

    fn call(&mut self, req: CreateBookingRequest) -> Self::Future {
        let account = self.account.clone();
        let catalog = self.catalog.clone();
        let bookings = self.bookings.clone();
        let schedule = self.schedule.clone();
        Box::pin(async move {
            // Validation order is a contract: class, user, capacity,
            // credits, overlap, duplicate. Nothing is mutated until every
            // check has passed.
            let class = catalog.get_class(req.class_id).await?;
            let user = account.get_user(req.user_id).await?;

            if class.is_full() {
                return Err(Error::ClassFull(class.class_id));
            }
            if user.credits < class.credits_required {
                return Err(Error::InsufficientCredits {
                    available: user.credits,
                    required: class.credits_required,
                });
            }
            if schedule
                .has_overlap(req.user_id, class.start_time, class.end_time)
                .await?
            {
                return Err(Error::OverlappingBooking);
            }
            if bookings
                .find_active_by_user_and_class(req.user_id, req.class_id)
                .await?
                .is_some()
            {
                return Err(Error::DuplicateBooking);
            }

            // Effects. Every check above was an advisory snapshot; the port
            // operations below each re-check their own invariant in the same
            // atomic step as the write (balance, capacity, and the schedule
            // via `insert_active`). A racer that passed the snapshot checks
            // fails here and gets its applied effects unwound.
            account.debit(req.user_id, class.credits_required).await?;

            if let Err(err) = catalog.try_increment(req.class_id).await {
                unwind(
                    account.credit(req.user_id, class.credits_required).await,
                    "refund debit after failed increment",
                )?;
                return Err(err.into());
            }

            let now = Utc::now();
            let booking = Booking {
                booking_id: Uuid::new_v4(),
                user_id: req.user_id,
                class_id: req.class_id,
                status: BookingStatus::Active,
                credits_used: class.credits_required,
                start_time: class.start_time,
                end_time: class.end_time,
                cancelled_at: None,
                created_at: now,
                updated_at: now,
            };
            match bookings.insert_active(booking).await {
                Ok(booking) => {
                    tracing::info!(
                        booking_id = %booking.booking_id,
                        user_id = %booking.user_id,
                        class_id = %booking.class_id,
                        credits_used = booking.credits_used,
                        "booking created"
                    );
                    Ok(booking)
                }
                Err(err) => {
                    unwind(
                        catalog.decrement(req.class_id).await,
                        "decrement counter after failed insert",
                    )?;
                    unwind(
                        account.credit(req.user_id, class.credits_required).await,
                        "refund debit after failed insert",
                    )?;
                    Err(err.into())
                }
            }
        })
    }
}

/// Check the outcome of a compensation step
///
/// A failed compensation leaves partially applied effects behind, which is
/// worse than the failure that triggered it: log it and surface an invariant
/// violation instead of the original error.
pub(crate) fn unwind<T, E>(res: Result<T, E>, action: &'static str) -> Result<(), Error>
where
    E: std::fmt::Debug,
{
    match res {
        Ok(_) => Ok(()),
        Err(err) => {
            tracing::error!(?err, action, "rollback failed, state may be inconsistent");
            Err(Error::InvariantViolation(
                format!("rollback failed: {action}").into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::{
            account::memory::MemoryAccounts, booking::memory::MemoryBookings,
            catalog::memory::MemoryCatalog,
        },
        commands::test_support,
        domain::{Class, User},
        ports::{
            account::MockAccountPort, booking::MockBookingPort, catalog::MockCatalogPort,
        },
    };
    use chrono::{DateTime, Duration, Utc};
    use mockall::predicate::*;
    use rstest::*;
    use speculoos::prelude::*;
    use std::sync::Arc;
    use tower::BoxError;

    struct World {
        accounts: Arc<MemoryAccounts>,
        catalog: Arc<MemoryCatalog>,
        bookings: Arc<MemoryBookings>,
        domain: DomainLogic<MemoryAccounts, MemoryCatalog, MemoryBookings>,
    }

    #[fixture]
    fn world() -> World {
        let accounts = Arc::new(MemoryAccounts::default());
        let catalog = Arc::new(MemoryCatalog::default());
        let bookings = Arc::new(MemoryBookings::default());
        let domain = DomainLogic::new(accounts.clone(), catalog.clone(), bookings.clone());
        World {
            accounts,
            catalog,
            bookings,
            domain,
        }
    }

    fn seed_user(world: &World, credits: u32) -> Uuid {
        let user = User {
            user_id: Uuid::new_v4(),
            credits,
        };
        world.accounts.insert_user(user.clone()).unwrap();
        user.user_id
    }

    fn class_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Class {
        Class {
            class_id: Uuid::new_v4(),
            name: "Yoga".to_string(),
            instructor: "Dana".to_string(),
            start_time: start,
            end_time: end,
            capacity: 20,
            current_bookings: 0,
            credits_required: 2,
        }
    }

    async fn seed_class(world: &World, class: Class) -> Uuid {
        let class_id = class.class_id;
        world.catalog.insert_class(class).await.unwrap();
        class_id
    }

    /// Tomorrow at `hour`:00, so the window is always in the future
    fn tomorrow_at(hour: i64) -> DateTime<Utc> {
        Utc::now() + Duration::days(1) + Duration::hours(hour)
    }

    async fn create(
        world: &World,
        user_id: Uuid,
        class_id: Uuid,
    ) -> Result<Booking, Error> {
        test_support::call(
            world.domain.clone(),
            CreateBookingRequest { user_id, class_id },
        )
        .await
    }

    #[rstest]
    #[tokio::test]
    async fn test_create_success(world: World) -> Result<(), BoxError> {
        // GIVEN a user with 10 credits and a class costing 2
        let user_id = seed_user(&world, 10);
        let class_id = seed_class(&world, class_window(tomorrow_at(10), tomorrow_at(11))).await;

        // WHEN creating a booking
        let res = create(&world, user_id, class_id).await;

        // THEN
        // * the booking is active and snapshots the cost
        // * the debit and the increment are committed
        assert_that!(res).is_ok().matches(|b| {
            b.user_id == user_id
                && b.class_id == class_id
                && b.status == BookingStatus::Active
                && b.credits_used == 2
                && b.cancelled_at.is_none()
        });
        let user = world.accounts.get_user(user_id).await?;
        assert_that!(user.credits).is_equal_to(8);
        let class = world.catalog.get_class(class_id).await?;
        assert_that!(class.current_bookings).is_equal_to(1);

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_class_not_found_before_user(world: World) {
        // Neither the class nor the user exists: the class check comes first
        let res = create(&world, Uuid::new_v4(), Uuid::new_v4()).await;
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::ClassNotFound(_)));
    }

    #[rstest]
    #[tokio::test]
    async fn test_user_not_found(world: World) {
        let class_id = seed_class(&world, class_window(tomorrow_at(10), tomorrow_at(11))).await;

        let res = create(&world, Uuid::new_v4(), class_id).await;
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::UserNotFound(_)));
    }

    #[rstest]
    #[tokio::test]
    async fn test_class_full_before_credits(world: World) {
        // A broke user booking a full class is told the class is full
        let user_id = seed_user(&world, 0);
        let mut class = class_window(tomorrow_at(10), tomorrow_at(11));
        class.capacity = 1;
        class.current_bookings = 1;
        let class_id = seed_class(&world, class).await;

        let res = create(&world, user_id, class_id).await;
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::ClassFull(_)));
    }

    #[rstest]
    #[tokio::test]
    async fn test_insufficient_credits_message(world: World) {
        // GIVEN a user with 1 credit and a class requiring 2
        let user_id = seed_user(&world, 1);
        let class_id = seed_class(&world, class_window(tomorrow_at(10), tomorrow_at(11))).await;

        // WHEN creating a booking
        let res = create(&world, user_id, class_id).await;

        // THEN the error carries both the actual and the required amounts
        let err = res.unwrap_err();
        let message = err.to_string();
        assert_that!(matches!(
            err,
            Error::InsufficientCredits {
                available: 1,
                required: 2,
            }
        ))
        .is_true();
        assert_that!(message.contains("1 credits")).is_true();
        assert_that!(message.contains("2 credits")).is_true();
    }

    #[rstest]
    #[tokio::test]
    async fn test_credits_checked_before_overlap(world: World) -> Result<(), BoxError> {
        // GIVEN a user holding a 10:00-11:00 booking, now broke
        let user_id = seed_user(&world, 2);
        let class_a = seed_class(&world, class_window(tomorrow_at(10), tomorrow_at(11))).await;
        create(&world, user_id, class_a).await?;
        let class_b = seed_class(&world, class_window(tomorrow_at(10), tomorrow_at(11))).await;

        // WHEN booking an overlapping class without credits
        let res = create(&world, user_id, class_b).await;

        // THEN the credit check fires before the overlap check
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::InsufficientCredits { .. }));
        Ok(())
    }

    /// 10:00-11:00 booked; 10:30-11:30 collides, 11:00-12:00 is fine
    #[rstest]
    #[tokio::test]
    async fn test_overlapping_booking(world: World) -> Result<(), BoxError> {
        let user_id = seed_user(&world, 10);
        let class_a = seed_class(&world, class_window(tomorrow_at(10), tomorrow_at(11))).await;
        create(&world, user_id, class_a).await?;

        let class_b = seed_class(
            &world,
            class_window(
                tomorrow_at(10) + Duration::minutes(30),
                tomorrow_at(11) + Duration::minutes(30),
            ),
        )
        .await;
        let res = create(&world, user_id, class_b).await;
        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::OverlappingBooking));

        // Touching boundary: starts exactly when the other ends
        let class_c = seed_class(&world, class_window(tomorrow_at(11), tomorrow_at(12))).await;
        let res = create(&world, user_id, class_c).await;
        assert_that!(res).is_ok();

        Ok(())
    }

    /// A failed validation leaves no row, no debit, no increment behind
    #[rstest]
    #[tokio::test]
    async fn test_validation_failure_mutates_nothing(world: World) -> Result<(), BoxError> {
        let user_id = seed_user(&world, 1);
        let class_id = seed_class(&world, class_window(tomorrow_at(10), tomorrow_at(11))).await;

        let res = create(&world, user_id, class_id).await;
        assert_that!(res).is_err();

        let user = world.accounts.get_user(user_id).await?;
        assert_that!(user.credits).is_equal_to(1);
        let class = world.catalog.get_class(class_id).await?;
        assert_that!(class.current_bookings).is_equal_to(0);
        let rows = world.bookings.list().await?;
        assert_that!(rows).is_empty();

        Ok(())
    }

    /// Ten users race for a single seat: one booking, nine `ClassFull`, and
    /// every loser keeps their credits
    #[rstest]
    #[tokio::test]
    async fn test_last_seat_race(world: World) -> Result<(), BoxError> {
        let mut class = class_window(tomorrow_at(10), tomorrow_at(11));
        class.capacity = 1;
        let class_id = seed_class(&world, class).await;
        let user_ids: Vec<_> = (0..10).map(|_| seed_user(&world, 10)).collect();

        let mut handles = Vec::new();
        for user_id in user_ids.clone() {
            let domain = world.domain.clone();
            handles.push(tokio::spawn(async move {
                test_support::call(domain, CreateBookingRequest { user_id, class_id }).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await? {
                Ok(_) => successes += 1,
                Err(err) => {
                    assert_that!(matches!(err, Error::ClassFull(_))).is_true();
                }
            }
        }
        assert_that!(successes).is_equal_to(1);

        // The winner was debited, every loser was made whole again
        let class = world.catalog.get_class(class_id).await?;
        assert_that!(class.current_bookings).is_equal_to(1);
        let mut debited = 0;
        for user_id in user_ids {
            let user = world.accounts.get_user(user_id).await?;
            if user.credits == 8 {
                debited += 1;
            } else {
                assert_that!(user.credits).is_equal_to(10);
            }
        }
        assert_that!(debited).is_equal_to(1);

        Ok(())
    }

    /// One user races themselves across two same-window classes: however
    /// the calls interleave, only one booking commits and the loser is
    /// fully unwound
    #[tokio::test]
    async fn test_same_user_overlap_race() -> Result<(), BoxError> {
        for _ in 0..50 {
            let world = world();
            let user_id = seed_user(&world, 10);
            let class_a = seed_class(&world, class_window(tomorrow_at(10), tomorrow_at(11))).await;
            let class_b = seed_class(&world, class_window(tomorrow_at(10), tomorrow_at(11))).await;

            let mut handles = Vec::new();
            for class_id in [class_a, class_b] {
                let domain = world.domain.clone();
                handles.push(tokio::spawn(async move {
                    test_support::call(domain, CreateBookingRequest { user_id, class_id }).await
                }));
            }
            let mut successes = 0;
            for handle in handles {
                match handle.await? {
                    Ok(_) => successes += 1,
                    Err(err) => {
                        assert_that!(matches!(err, Error::OverlappingBooking)).is_true();
                    }
                }
            }
            assert_that!(successes).is_equal_to(1);

            // One debit stands, one seat is taken, one row is active
            let user = world.accounts.get_user(user_id).await?;
            assert_that!(user.credits).is_equal_to(8);
            let seats = world.catalog.get_class(class_a).await?.current_bookings
                + world.catalog.get_class(class_b).await?.current_bookings;
            assert_that!(seats).is_equal_to(1);
            let active = world.bookings.find_active_by_user(user_id).await?;
            assert_that!(active).has_length(1);
        }
        Ok(())
    }

    /// Duplicate check fires when the overlap scan does not catch the class
    ///
    /// With consistent data a same-class rebooking is caught by the overlap
    /// check first, so the duplicate path is pinned down with mocks.
    #[rstest]
    #[tokio::test]
    async fn test_duplicate_booking() {
        let user_id = Uuid::new_v4();
        let class = class_window(tomorrow_at(10), tomorrow_at(11));
        let class_id = class.class_id;
        let (start_time, end_time) = (class.start_time, class.end_time);

        let mut catalog = MockCatalogPort::new();
        catalog
            .expect_get_class()
            .with(eq(class_id))
            .returning(move |_| Ok(class.clone()));
        let mut account = MockAccountPort::new();
        account.expect_get_user().returning(move |user_id| {
            Ok(User {
                user_id,
                credits: 10,
            })
        });
        let mut bookings = MockBookingPort::new();
        bookings
            .expect_find_active_by_user()
            .returning(|_| Ok(Vec::new()));
        let existing = Booking {
            booking_id: Uuid::new_v4(),
            user_id,
            class_id,
            status: BookingStatus::Active,
            credits_used: 2,
            start_time,
            end_time,
            cancelled_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        bookings
            .expect_find_active_by_user_and_class()
            .with(eq(user_id), eq(class_id))
            .returning(move |_, _| Ok(Some(existing.clone())));

        let domain = DomainLogic::new(
            Arc::new(account),
            Arc::new(catalog),
            Arc::new(bookings),
        );
        let res =
            test_support::call(domain, CreateBookingRequest { user_id, class_id }).await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::DuplicateBooking));
    }

    /// Losing the seat after the debit refunds the debit
    #[rstest]
    #[tokio::test]
    async fn test_increment_failure_refunds_debit() {
        let user_id = Uuid::new_v4();
        let class = class_window(tomorrow_at(10), tomorrow_at(11));
        let class_id = class.class_id;

        let mut catalog = MockCatalogPort::new();
        // Snapshot shows a free seat, but the atomic increment loses the race
        catalog
            .expect_get_class()
            .returning(move |_| Ok(class.clone()));
        catalog.expect_try_increment().times(1).returning(move |_| {
            Err(crate::ports::catalog::Error::CapacityExceeded {
                class_id,
                capacity: 20,
            })
        });
        let mut account = MockAccountPort::new();
        account.expect_get_user().returning(move |user_id| {
            Ok(User {
                user_id,
                credits: 10,
            })
        });
        account
            .expect_debit()
            .times(1)
            .with(eq(user_id), eq(2))
            .returning(move |user_id, _| Ok(User { user_id, credits: 8 }));
        account
            .expect_credit()
            .times(1)
            .with(eq(user_id), eq(2))
            .returning(move |user_id, _| {
                Ok(User {
                    user_id,
                    credits: 10,
                })
            });
        let mut bookings = MockBookingPort::new();
        bookings
            .expect_find_active_by_user()
            .returning(|_| Ok(Vec::new()));
        bookings
            .expect_find_active_by_user_and_class()
            .returning(|_, _| Ok(None));

        let account = Arc::new(account);
        let domain = DomainLogic::new(
            account.clone(),
            Arc::new(catalog),
            Arc::new(bookings),
        );
        let res =
            test_support::call(domain, CreateBookingRequest { user_id, class_id }).await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::ClassFull(_)));
        Arc::into_inner(account).unwrap().checkpoint();
    }
}

//! Booking-credit consistency engine for a class-booking platform.
//!
//! Users hold a credit balance and reserve time-boxed classes. This crate
//! implements the part with real invariants: reconciling a booking request
//! against the user's credit balance, the class capacity counter, and the
//! user's schedule, and reversing that reconciliation on cancellation.
//!
//! The crate follows a hexagonal layout:
//!
//! * [`domain`] contains plain data structures shared by all layers.
//! * [`ports`] defines the persistence capabilities the engine needs, as
//!   async traits with mock implementations for testing.
//! * [`adapters`] provides in-memory reference adapters for the ports.
//! * [`schedule`] answers schedule-overlap queries for a user.
//! * [`commands`] contains the booking engine itself, exposed as
//!   [`tower::Service`] implementations over [`commands::DomainLogic`].

pub mod adapters;
pub mod commands;
pub mod domain;
pub mod ports;
pub mod schedule;

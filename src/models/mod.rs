// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod session;
pub mod tour;

pub use session::KomootSession;
pub use tour::{PackagedTour, Tour, TourType};

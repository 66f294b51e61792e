//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// AI hint generation handlers.
pub mod ai;
/// Chapter point (lesson content) CRUD handlers.
pub mod chapter_points;
/// Chapter CRUD and completion handlers.
pub mod chapters;
/// Course CRUD handlers.
pub mod courses;
/// Login, logout and token check handlers.
pub mod login;
/// Code execution handler.
pub mod piston;
/// Platform statistics handler.
pub mod stats;
/// Signup, profile, enrollment and user administration handlers.
pub mod users;

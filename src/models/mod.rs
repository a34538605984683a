// src/models/mod.rs
pub mod attendance;
pub mod calendar;
pub mod leave;
pub mod person;

// src/services/mod.rs
pub mod approval_service;
pub mod attendance_service;
pub mod calendar_service;
pub mod daily_status;
pub mod leave_index;
pub mod leave_service;
pub mod person_service;

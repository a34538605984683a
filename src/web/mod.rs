// src/web/mod.rs
pub mod admin_handlers;
pub mod attendance_handlers;
pub mod leave_handlers;
pub mod mw_actor;
pub mod mw_admin;
pub mod routes;

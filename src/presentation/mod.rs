//! HTML rendering: askama templates and their view models.

pub mod views;

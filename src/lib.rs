//! brusio: a small social blogging service.
//!
//! Users publish short text posts, optionally filed under a group and
//! illustrated with an image link. Other users comment on posts and follow
//! authors. Feeds (global, per group, per author, per subscription set) are
//! paginated; the global feed is served through a time-bounded whole-page
//! cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;

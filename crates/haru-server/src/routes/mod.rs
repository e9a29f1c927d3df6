//! Request handlers, grouped by resource.

pub mod comments;
pub mod diaries;
pub mod follows;
pub mod media;
pub mod status;
pub mod users;

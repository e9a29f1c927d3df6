//! # haru-store
//!
//! Relational store for the haru diary backend, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model: users, follow edges, diary entries (with their like-sets and
//! emotion annotations) and comments.  Diary visibility and ordering rules
//! live here as well, so every caller goes through the same predicate.

pub mod comments;
pub mod database;
pub mod diaries;
pub mod follows;
pub mod migrations;
pub mod models;
pub mod users;

mod error;

pub use database::Database;
pub use diaries::{DiaryFilter, DiarySort, NewDiary};
pub use error::StoreError;
pub use models::*;

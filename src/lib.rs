//! Last Little Haven - community archive backend
//!
//! Entries about spaces, artifacts and photographs are submitted by the
//! community (anonymously or with an account), moderated by admins and
//! published with their authors, locations and media.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod storage;

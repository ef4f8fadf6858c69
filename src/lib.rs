//! Atom feed reader: a streaming feed parser, an article repository with
//! cache-then-fetch and single-flight refresh, tag and search filtering, and a
//! line-oriented terminal front end.

pub mod app;
pub mod config;
pub mod feed;
pub mod filter;
pub mod repository;
pub mod storage;
pub mod ui;
pub mod util;

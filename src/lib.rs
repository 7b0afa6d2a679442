//! Content authorization and reaction consistency engine for a blog platform.
//!
//! [`application::ContentMutationCoordinator`] is the entry point. It combines
//! the role policy, the like/dislike ledger, view deduplication, and the
//! tag-indexed cache over a [`application::repos::ContentRepo`] adapter.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;

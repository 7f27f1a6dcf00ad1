//! The library code for the `scrivener` blog generator. At its core is an
//! in-memory pipeline over post metadata that is loaded once:
//!
//! 1. Loading and sorting posts from markdown sources ([`crate::repository`])
//! 2. Narrowing them to a tag, ranking them against a fuzzy search query
//!    ([`crate::search`]), and slicing out a page ([`crate::page`]), all
//!    driven by a [`crate::query::QueryState`]
//!
//! Around that pipeline sit two ways of presenting the result. The static
//! build ([`crate::build`]) renders every post, every page of the home index
//! and every page of each tag index to disk, along with an Atom feed and a
//! JSON export of the post metadata. The preview server
//! ([`crate::serve`]) renders any view on demand, so that search results and
//! tag filters round-trip through shareable hrefs.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod feed;
pub mod fuzzy;
pub mod markdown;
pub mod page;
pub mod post;
pub mod query;
pub mod repository;
pub mod search;
pub mod serve;
pub mod tag;
pub mod theme;
pub mod value;
pub mod write;

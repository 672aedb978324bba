//! `epi-atlas`: flu surveillance and vaccination datasets, cleaned, joined to
//! department boundaries, cached for the life of the process and served in
//! cursor-paginated pages, plus a linear forecast of future campaigns.

pub mod app;
pub mod boundary;
pub mod cache;
pub mod clean;
pub mod config;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod merge;
pub mod output;
pub mod pagination;
pub mod pipeline;
pub mod records;
pub mod source;

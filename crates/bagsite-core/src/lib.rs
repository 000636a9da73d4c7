//! # bagsite core
//!
//! Pure logic for the bagsite tooling: the article catalog, search and
//! suggestion ranking, the category filter, the seasonal "bag love" widget,
//! URL normalisation and a small HTML tag scanner.
//!
//! This crate does no filesystem, network or process I/O. The `bagsite`
//! application crate loads data and drives these functions; presentation is
//! reached only through the [`view::SearchView`] port.

pub mod catalog;
pub mod category;
pub mod html;
pub mod models;
pub mod pace;
pub mod search;
pub mod suggest;
pub mod urls;
pub mod view;
pub mod widget;

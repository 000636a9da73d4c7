//! # bagsite
//!
//! Catalog, search and maintenance tooling for a bilingual (EN/ES) static
//! handbag review site.
//!
//! The pure logic (catalog validation, search ranking, suggestions, the
//! category filter, the seasonal widget and URL helpers) lives in
//! [`bagsite_core`]. This crate adds everything that touches the outside
//! world: configuration, the HTML tree on disk, git, and the live site.
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ catalog.toml │──▶│ bagsite-core │◀──│  CLI views   │
//! └──────────────┘   │ search/widget│   │ text / HTML  │
//!                    └──────────────┘   └──────────────┘
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  HTML tree   │──▶│ rewrite jobs │   │  live audits │──▶ origin
//! │  (site.root) │   │ sitemap/tags │   │ crawl/check  │
//! └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`catalog`] | Catalog file loading, `catalog check`, `index export` |
//! | [`search`] | `search`, `suggest` and `category` commands |
//! | [`render`] | Terminal and HTML-fragment search views |
//! | [`love`] | Bag-love widget with a JSON state file |
//! | [`walk`] | HTML file discovery |
//! | [`rewrite`] | Idempotent in-place rewrite batches with backups |
//! | [`sitemap`] | Sitemap generation, lint and coverage audit |
//! | [`canonicals`] | Canonical and `og:url` repair |
//! | [`tags`] | GTM cleanup/injection and AdSense injection |
//! | [`links`] | `.html` link normalisation and language switcher repair |
//! | [`inventory`] | Public URL inventory |
//! | [`git`] | Last-commit dates for `lastmod` |
//! | [`fetch`] | Paced HTTP client |
//! | [`audit`] | Live canonical crawl, sitemap coverage and redirect audit |
//! | [`consent`] | `ads.txt` check and Consent Mode / CMP ordering scan |
//! | [`pages`] | About, Contact and Terms page scaffolding |

pub mod audit;
pub mod canonicals;
pub mod catalog;
pub mod config;
pub mod consent;
pub mod fetch;
pub mod git;
pub mod inventory;
pub mod links;
pub mod love;
pub mod pages;
pub mod render;
pub mod rewrite;
pub mod search;
pub mod sitemap;
pub mod tags;
pub mod walk;

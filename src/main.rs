//! # bagsite CLI
//!
//! The `bagsite` binary drives the catalog search, the bag-love widget, the
//! HTML maintenance jobs and the live audits of the site.
//!
//! ## Usage
//!
//! ```bash
//! bagsite --config ./config/bagsite.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bagsite search "<query>"` | Search the article catalog |
//! | `bagsite suggest "<query>"` | Type-ahead suggestions and results |
//! | `bagsite category <slug>` | Resolve a category filter |
//! | `bagsite love` | Show or set the bag-love widget for a page |
//! | `bagsite sitemap generate\|check\|audit` | Build, lint or audit `sitemap.xml` |
//! | `bagsite canonicals fix` | Repair canonical and `og:url` tags |
//! | `bagsite tags gtm\|adsense` | Clean up and inject tracking tags |
//! | `bagsite links normalize\|lang-switcher` | Rewrite internal links |
//! | `bagsite inventory` | List every page with its URL and language |
//! | `bagsite index export` | Write the catalog as JSON for the search page |
//! | `bagsite pages scaffold` | Create the About, Contact and Terms pages |
//! | `bagsite audit canonicals\|redirects\|ads-txt\|consent` | Audit the live site |
//! | `bagsite catalog check` | Validate the catalog file |
//!
//! ## Examples
//!
//! ```bash
//! # Preview canonical fixes without writing
//! bagsite canonicals fix --dry-run
//!
//! # Spanish search rendered as HTML fragments
//! bagsite search "mochilas laptop" --lang es --html
//!
//! # Crawl the live site (exits 1 on any failing page)
//! bagsite audit canonicals
//! ```

use bagsite::{
    audit, canonicals, catalog, config, consent, inventory, links, love, pages, rewrite, search,
    sitemap, tags,
};
use bagsite_core::widget::Platform;
use chrono::NaiveDateTime;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// bagsite: catalog search, widget and maintenance tooling for a static
/// handbag review site.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/bagsite.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "bagsite",
    about = "Catalog search, widget logic and maintenance jobs for a bilingual static site",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/bagsite.toml`. Catalog and widget commands fall
    /// back to built-in defaults when the file is missing.
    #[arg(long, global = true, default_value = "./config/bagsite.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the article catalog.
    ///
    /// Queries shorter than two characters print nothing. When nothing
    /// matches, the four most relevant articles are suggested instead.
    Search {
        query: String,

        /// Catalog language (defaults to the catalog's default language).
        #[arg(long)]
        lang: Option<String>,

        /// Print the HTML fragments the search page injects.
        #[arg(long)]
        html: bool,
    },

    /// Type-ahead suggestions for a partial query, plus results once the
    /// query is long enough.
    Suggest {
        query: String,
        #[arg(long)]
        lang: Option<String>,
        #[arg(long)]
        html: bool,
    },

    /// Resolve a category filter button.
    ///
    /// `all`/`todos` filter in place, known slugs navigate to their
    /// category page, unknown slugs do nothing.
    Category {
        category: String,
        #[arg(long)]
        lang: Option<String>,

        /// Listing page whose `article-card` elements are filtered.
        #[arg(long)]
        page: Option<PathBuf>,
    },

    /// Show, and optionally set, the bag-love slider for a page.
    Love {
        /// Site path the value is saved under.
        #[arg(long, default_value = "/")]
        page: String,

        /// New slider value (clamped to 0-100).
        #[arg(long, allow_negative_numbers = true)]
        value: Option<i64>,

        /// User agent deciding same-tab or new-tab share navigation.
        #[arg(long, default_value = "")]
        ua: String,

        /// Only print the share link for this platform.
        #[arg(long)]
        platform: Option<Platform>,

        /// Evaluate the seasonal window at this local time
        /// (`YYYY-MM-DDTHH:MM:SS`) instead of now.
        #[arg(long)]
        at: Option<NaiveDateTime>,
    },

    /// Generate, lint or audit `sitemap.xml`.
    Sitemap {
        #[command(subcommand)]
        action: SitemapAction,
    },

    /// Repair canonical and `og:url` tags.
    Canonicals {
        #[command(subcommand)]
        action: CanonicalsAction,
    },

    /// Clean up and inject tracking tags.
    Tags {
        #[command(subcommand)]
        action: TagsAction,
    },

    /// Rewrite internal links.
    Links {
        #[command(subcommand)]
        action: LinksAction,
    },

    /// List every HTML page with its public URL and language.
    Inventory {
        /// Print JSON instead of grouped text.
        #[arg(long)]
        json: bool,
    },

    /// Scaffold static pages.
    Pages {
        #[command(subcommand)]
        action: PagesAction,
    },

    /// Export the search index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Audit the live site.
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },

    /// Catalog maintenance.
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum SitemapAction {
    /// Build `sitemap.xml` from the HTML tree and git history.
    Generate {
        /// Print to stdout instead of writing the file.
        #[arg(long)]
        stdout: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Lint sitemap `<loc>` entries. Exits 1 on any issue.
    Check {
        /// Sitemap file (defaults to the configured output).
        #[arg(long, conflicts_with = "live")]
        file: Option<PathBuf>,
        /// Fetch `<origin>/sitemap.xml` instead.
        #[arg(long)]
        live: bool,
    },
    /// Diff the sitemap against the HTML files. Exits 1 on any gap.
    Audit {
        /// Also write a markdown report.
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CanonicalsAction {
    /// Leave exactly one self-referencing canonical and `og:url` per page.
    Fix {
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum TagsAction {
    /// Remove stale GTM/GA tags and inject the configured container.
    Gtm {
        #[arg(long)]
        dry_run: bool,
    },
    /// Inject the AdSense loader.
    Adsense {
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum LinksAction {
    /// Rewrite internal `.html` links to trailing-slash URLs.
    Normalize {
        #[arg(long)]
        dry_run: bool,
    },
    /// Point EN/ES switcher links at the page's `hreflang` alternates.
    LangSwitcher {
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum PagesAction {
    /// Create About, Contact and Terms in both languages, with sitemap
    /// entries and `.html` redirects.
    Scaffold {
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Write the catalog as JSON (stdout unless `--out` is given).
    Export {
        /// Export one language instead of all.
        #[arg(long)]
        lang: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AuditAction {
    /// Crawl the site and check canonical and `og:url` tags. Exits 1 on
    /// any failing page.
    Canonicals,
    /// Propose `netlify.toml` redirects for missing variant redirects.
    Redirects,
    /// Check `<origin>/ads.txt` for the AdSense publisher record. Exits 1
    /// when it is missing.
    AdsTxt,
    /// Check consent defaults and CMP ordering on the home page. Exits 1
    /// on any issue.
    Consent {
        /// Scan a local HTML file instead of the live home page.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Validate the catalog and report drift between languages.
    Check,
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn exit_unless(ok: bool) {
    if !ok {
        std::process::exit(1);
    }
}

fn finish(report: rewrite::RewriteReport) {
    exit_unless(report.errors.is_empty());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that run without a config file
    match &cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "bagsite", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Search { .. }
        | Commands::Suggest { .. }
        | Commands::Category { .. }
        | Commands::Love { .. }
        | Commands::Index { .. }
        | Commands::Catalog { .. } => {
            let cfg = if cli.config.exists() {
                config::load_config(&cli.config)?
            } else {
                config::Config::minimal()
            };
            run_catalog_command(&cfg, cli.command)?;
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;
    let opts = |dry_run: bool| rewrite::RewriteOptions {
        dry_run,
        backup: cfg.site.backup,
    };

    match cli.command {
        Commands::Sitemap { action } => match action {
            SitemapAction::Generate { stdout, dry_run } => {
                sitemap::run_generate(&cfg, stdout, dry_run)?;
            }
            SitemapAction::Check { file, live } => {
                let source = if live {
                    sitemap::SitemapSource::Live
                } else {
                    sitemap::SitemapSource::File(file.unwrap_or_else(|| cfg.sitemap_path()))
                };
                exit_unless(sitemap::run_check(&cfg, source).await?);
            }
            SitemapAction::Audit { report } => {
                exit_unless(sitemap::run_audit(&cfg, report.as_deref())?);
            }
        },
        Commands::Canonicals {
            action: CanonicalsAction::Fix { dry_run },
        } => finish(canonicals::run_fix(&cfg, opts(dry_run))?),
        Commands::Tags { action } => match action {
            TagsAction::Gtm { dry_run } => finish(tags::run_gtm(&cfg, opts(dry_run))?),
            TagsAction::Adsense { dry_run } => finish(tags::run_adsense(&cfg, opts(dry_run))?),
        },
        Commands::Links { action } => match action {
            LinksAction::Normalize { dry_run } => {
                finish(links::run_normalize(&cfg, opts(dry_run))?)
            }
            LinksAction::LangSwitcher { dry_run } => {
                finish(links::run_lang_switcher(&cfg, opts(dry_run))?)
            }
        },
        Commands::Inventory { json } => inventory::run_inventory(&cfg, json)?,
        Commands::Pages {
            action: PagesAction::Scaffold { dry_run },
        } => pages::run_scaffold(&cfg, dry_run)?.print(),
        Commands::Audit { action } => match action {
            AuditAction::Canonicals => exit_unless(audit::run_canonicals(&cfg).await?),
            AuditAction::Redirects => audit::run_redirects(&cfg).await?,
            AuditAction::AdsTxt => exit_unless(consent::run_ads_txt(&cfg).await?),
            AuditAction::Consent { file } => {
                exit_unless(consent::run_consent(&cfg, file.as_deref()).await?)
            }
        },
        _ => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

fn run_catalog_command(cfg: &config::Config, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Search { query, lang, html } => {
            search::run_search(cfg, &query, lang.as_deref(), html)
        }
        Commands::Suggest { query, lang, html } => {
            search::run_suggest(cfg, &query, lang.as_deref(), html)
        }
        Commands::Category {
            category,
            lang,
            page,
        } => search::run_category(cfg, &category, lang.as_deref(), page.as_deref()),
        Commands::Love {
            page,
            value,
            ua,
            platform,
            at,
        } => {
            let now = at.unwrap_or_else(|| chrono::Local::now().naive_local());
            love::run_love(
                cfg,
                love::LoveArgs {
                    page: &page,
                    value,
                    user_agent: &ua,
                    platform,
                },
                now,
            )
        }
        Commands::Index {
            action: IndexAction::Export { lang, out },
        } => catalog::run_export(cfg, lang.as_deref(), out.as_deref()),
        Commands::Catalog {
            action: CatalogAction::Check,
        } => catalog::run_check(cfg),
        _ => unreachable!(),
    }
}

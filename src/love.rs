//! The `love` command: drive the bag-love widget from the terminal with
//! values persisted in a JSON state file.

use anyhow::{Context, Result};
use bagsite_core::urls::join_origin;
use bagsite_core::widget::{halloween_window, BagLoveWidget, OpenIn, Platform, SliderStore};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Slider values in a JSON object keyed by storage key. The file is read
/// once on open and rewritten on every save.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, u8>,
}

impl JsonFileStore {
    /// Open `path`; a missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        let values = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read widget state: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid widget state: {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }
}

impl SliderStore for JsonFileStore {
    type Error = anyhow::Error;

    fn load(&self, key: &str) -> Result<Option<u8>> {
        Ok(self.values.get(key).copied())
    }

    fn save(&mut self, key: &str, value: u8) -> Result<()> {
        self.values.insert(key.to_string(), value);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.values)?)
            .with_context(|| format!("Failed to write widget state: {}", self.path.display()))
    }
}

pub struct LoveArgs<'a> {
    pub page: &'a str,
    pub value: Option<i64>,
    pub user_agent: &'a str,
    pub platform: Option<Platform>,
}

/// Show (and with `value`, update) the widget for one page.
pub fn run_love(config: &Config, args: LoveArgs<'_>, now: NaiveDateTime) -> Result<()> {
    let mut store = JsonFileStore::open(&config.widget.state_path)?;
    let mut widget = BagLoveWidget::new(args.page, halloween_window(now));
    widget.restore(&store)?;

    let event = match args.value {
        Some(v) => {
            let event = widget.set(v);
            widget.commit(&mut store)?;
            tracing::debug!(key = %widget.key(), value = event.value, "saved widget value");
            event
        }
        None => widget.event(),
    };

    let frame = widget.frame();
    println!("Page: {}", widget.page());
    println!("Score: {}", frame.value_label);
    println!("Remark: {}", frame.remark.text);
    if let Some(icon) = frame.remark.icon {
        println!("Icon: {}", icon);
    }
    println!("Badge: {}", frame.badge_score);
    if !frame.badge_remark.is_empty() {
        println!("Badge remark: {}", frame.badge_remark);
    }

    let page_url = join_origin(config.origin(), widget.page());
    let platforms = match args.platform {
        Some(p) => vec![p],
        None => vec![Platform::Instagram, Platform::Facebook, Platform::Pinterest],
    };
    println!();
    for p in platforms {
        let link = widget.share_link(p, &page_url, args.user_agent);
        let target = match link.open_in {
            OpenIn::SameTab => "same tab",
            OpenIn::NewTab => "new tab",
        };
        println!("{:?} ({}): {}", p, target, link.url);
    }
    println!();
    println!("{}", serde_json::to_string(&event)?);
    Ok(())
}

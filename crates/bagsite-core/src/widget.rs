//! The seasonal "bag love" slider widget.
//!
//! A 0–100 slider whose value is persisted per page path. During the
//! Halloween window the value maps to one of five themed remark bands;
//! otherwise a neutral remark is shown. Share buttons build platform deep
//! links and decide between same-tab and new-tab navigation.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;

use crate::urls::encode_component;

pub const DEFAULT_VALUE: u8 = 60;
pub const MAX_VALUE: u8 = 100;
pub const STORAGE_PREFIX: &str = "ah_bag_love:";
pub const NEUTRAL_REMARK: &str = "Show your bag-lover energy!";

pub const ICON_PUMPKIN: &str = "/assets/img/widgets/pumpkin.svg";
pub const ICON_BAT: &str = "/assets/img/widgets/bat.svg";
pub const ICON_GHOST: &str = "/assets/img/widgets/ghost.svg";

/// Inclusive window inside `now`'s year, from start 00:00:00 to end 23:59:59.
/// Months are 0-based (`9` is October). Invalid dates yield `false`.
pub fn in_range(
    now: NaiveDateTime,
    start_month0: u32,
    start_day: u32,
    end_month0: u32,
    end_day: u32,
) -> bool {
    let year = now.year();
    let start = NaiveDate::from_ymd_opt(year, start_month0 + 1, start_day)
        .and_then(|d| d.and_hms_opt(0, 0, 0));
    let end = NaiveDate::from_ymd_opt(year, end_month0 + 1, end_day)
        .and_then(|d| d.and_hms_opt(23, 59, 59));
    match (start, end) {
        (Some(start), Some(end)) => now >= start && now <= end,
        _ => false,
    }
}

/// Whether the Halloween theme is active.
///
/// The window starts at `now`'s own date, so it is open every day from
/// January 1 through October 31 and closed from November 1.
pub fn halloween_window(now: NaiveDateTime) -> bool {
    in_range(now, now.month0(), now.day(), 9, 31)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remark {
    pub text: &'static str,
    pub icon: Option<&'static str>,
    pub alt: Option<&'static str>,
}

fn band(text: &'static str, icon: &'static str, alt: &'static str) -> Remark {
    Remark {
        text,
        icon: Some(icon),
        alt: Some(alt),
    }
}

/// Remark for a slider value. Bands: ≤20, ≤40, ≤70, ≤90, above 90.
pub fn remark_for(value: u8, seasonal: bool) -> Remark {
    if !seasonal {
        return Remark {
            text: NEUTRAL_REMARK,
            icon: None,
            alt: None,
        };
    }
    match value {
        0..=20 => band(
            "Looks like you'd rather carry a pumpkin than a purse… 🎃",
            ICON_PUMPKIN,
            "pumpkin",
        ),
        21..=40 => band("Half-hearted handbag haunter 👻", ICON_GHOST, "ghost"),
        41..=70 => band(
            "Wickedly stylish! 🦇 Your bag obsession is taking flight.",
            ICON_BAT,
            "bat",
        ),
        71..=90 => band("You're under a handbag spell ✨👜", ICON_PUMPKIN, "pumpkin"),
        _ => band(
            "Full moon handbag fanatic — the spirits approve! 🌕👜",
            ICON_BAT,
            "bat",
        ),
    }
}

pub fn emoji(seasonal: bool) -> &'static str {
    if seasonal {
        "🎃"
    } else {
        "👜"
    }
}

/// Storage key for a page path.
pub fn storage_key(page: &str) -> String {
    format!("{}{}", STORAGE_PREFIX, page)
}

/// Persistence for slider values, keyed by [`storage_key`].
pub trait SliderStore {
    type Error;
    fn load(&self, key: &str) -> Result<Option<u8>, Self::Error>;
    fn save(&mut self, key: &str, value: u8) -> Result<(), Self::Error>;
}

/// Volatile store for tests and previews.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, u8>,
}

impl SliderStore for MemoryStore {
    type Error = Infallible;

    fn load(&self, key: &str) -> Result<Option<u8>, Infallible> {
        Ok(self.values.get(key).copied())
    }

    fn save(&mut self, key: &str, value: u8) -> Result<(), Infallible> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Emitted on every value sync so other page scripts can react.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetEvent {
    pub value: u8,
    pub page: String,
}

/// Everything the widget displays for the current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetFrame {
    pub value_label: String,
    pub remark: Remark,
    pub badge_score: String,
    /// Empty outside the seasonal window.
    pub badge_remark: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Instagram,
    Facebook,
    Pinterest,
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "instagram" => Ok(Platform::Instagram),
            "facebook" => Ok(Platform::Facebook),
            "pinterest" => Ok(Platform::Pinterest),
            other => Err(format!(
                "unknown platform '{}': use instagram, facebook or pinterest",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenIn {
    SameTab,
    NewTab,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub url: String,
    pub open_in: OpenIn,
}

/// Mobile browsers get same-tab navigation to dodge popup blockers.
pub fn is_mobile_user_agent(ua: &str) -> bool {
    let ua = ua.to_ascii_lowercase();
    ["android", "iphone", "ipad", "ipod", "mobile"]
        .iter()
        .any(|m| ua.contains(m))
}

/// Slider state for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagLoveWidget {
    page: String,
    value: u8,
    seasonal: bool,
}

impl BagLoveWidget {
    pub fn new(page: impl Into<String>, seasonal: bool) -> Self {
        Self {
            page: page.into(),
            value: DEFAULT_VALUE,
            seasonal,
        }
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn seasonal(&self) -> bool {
        self.seasonal
    }

    pub fn key(&self) -> String {
        storage_key(&self.page)
    }

    /// Load the saved value for this page, if any.
    pub fn restore<S: SliderStore>(&mut self, store: &S) -> Result<(), S::Error> {
        if let Some(saved) = store.load(&self.key())? {
            self.value = saved.min(MAX_VALUE);
        }
        Ok(())
    }

    /// Move the slider (clamped to 0–100) and return the sync event.
    pub fn set(&mut self, value: i64) -> WidgetEvent {
        self.value = value.clamp(0, MAX_VALUE as i64) as u8;
        self.event()
    }

    /// Persist the current value, as the slider's change handler does.
    pub fn commit<S: SliderStore>(&self, store: &mut S) -> Result<(), S::Error> {
        store.save(&self.key(), self.value)
    }

    pub fn event(&self) -> WidgetEvent {
        WidgetEvent {
            value: self.value,
            page: self.page.clone(),
        }
    }

    pub fn frame(&self) -> WidgetFrame {
        let remark = remark_for(self.value, self.seasonal);
        WidgetFrame {
            value_label: format!("{}%", self.value),
            remark,
            badge_score: format!("{}% {}", self.value, emoji(self.seasonal)),
            badge_remark: if self.seasonal {
                remark.text.to_string()
            } else {
                String::new()
            },
        }
    }

    /// Share link for `platform`. `page_url` is the canonical URL when the
    /// page declares one, else the current URL.
    pub fn share_link(&self, platform: Platform, page_url: &str, user_agent: &str) -> ShareLink {
        let open_in = if is_mobile_user_agent(user_agent) {
            OpenIn::SameTab
        } else {
            OpenIn::NewTab
        };
        match platform {
            Platform::Instagram => ShareLink {
                url: "https://www.instagram.com/".to_string(),
                open_in: OpenIn::NewTab,
            },
            Platform::Facebook => ShareLink {
                url: format!(
                    "https://m.facebook.com/sharer.php?u={}",
                    encode_component(page_url)
                ),
                open_in,
            },
            Platform::Pinterest => {
                let text = format!(
                    "My handbag love score: {}% {}",
                    self.value,
                    emoji(self.seasonal)
                );
                ShareLink {
                    url: format!(
                        "https://www.pinterest.com/pin/create/button/?url={}&description={}",
                        encode_component(page_url),
                        encode_component(&text)
                    ),
                    open_in,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn window_open_through_october_31() {
        for (m, d) in [(1, 1), (6, 15), (10, 1), (10, 31)] {
            assert!(halloween_window(at(2025, m, d, 12)), "{}-{}", m, d);
        }
        assert!(halloween_window(
            NaiveDate::from_ymd_opt(2025, 10, 31)
                .unwrap()
                .and_hms_opt(23, 59, 59)
                .unwrap()
        ));
    }

    #[test]
    fn window_closed_from_november() {
        for (m, d) in [(11, 1), (11, 30), (12, 31)] {
            assert!(!halloween_window(at(2025, m, d, 0)), "{}-{}", m, d);
        }
    }

    #[test]
    fn in_range_fixed_window() {
        assert!(in_range(at(2025, 10, 15, 8), 9, 1, 9, 31));
        assert!(!in_range(at(2025, 9, 30, 23), 9, 1, 9, 31));
        assert!(!in_range(at(2025, 10, 15, 8), 1, 30, 9, 31));
    }

    #[test]
    fn remark_bands() {
        let alt = |v| remark_for(v, true).alt.unwrap();
        assert_eq!(alt(0), "pumpkin");
        assert_eq!(alt(20), "pumpkin");
        assert_eq!(alt(21), "ghost");
        assert_eq!(alt(40), "ghost");
        assert_eq!(alt(70), "bat");
        assert_eq!(alt(90), "pumpkin");
        assert_eq!(alt(91), "bat");
        assert_eq!(alt(100), "bat");
    }

    #[test]
    fn neutral_remark_outside_window() {
        let r = remark_for(95, false);
        assert_eq!(r.text, NEUTRAL_REMARK);
        assert!(r.icon.is_none());
    }

    #[test]
    fn value_round_trips_through_store() {
        let mut store = MemoryStore::default();
        let mut w = BagLoveWidget::new("/", true);
        w.set(83);
        w.commit(&mut store).unwrap();

        let mut reloaded = BagLoveWidget::new("/", true);
        reloaded.restore(&store).unwrap();
        assert_eq!(reloaded.value(), 83);

        let mut other_page = BagLoveWidget::new("/es/", true);
        other_page.restore(&store).unwrap();
        assert_eq!(other_page.value(), DEFAULT_VALUE);
    }

    #[test]
    fn set_clamps_and_emits_event() {
        let mut w = BagLoveWidget::new("/", false);
        assert_eq!(w.set(250).value, 100);
        let ev = w.set(-3);
        assert_eq!(ev, WidgetEvent { value: 0, page: "/".into() });
    }

    #[test]
    fn frame_reflects_season() {
        let mut w = BagLoveWidget::new("/", true);
        w.set(50);
        let f = w.frame();
        assert_eq!(f.value_label, "50%");
        assert_eq!(f.badge_score, "50% 🎃");
        assert_eq!(f.badge_remark, f.remark.text);

        let plain = BagLoveWidget::new("/", false).frame();
        assert_eq!(plain.badge_score, "60% 👜");
        assert!(plain.badge_remark.is_empty());
    }

    #[test]
    fn share_links() {
        let mut w = BagLoveWidget::new("/", false);
        w.set(75);
        let desktop = "Mozilla/5.0 (X11; Linux x86_64)";
        let phone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";

        let fb = w.share_link(Platform::Facebook, "https://shop.test/", desktop);
        assert_eq!(fb.url, "https://m.facebook.com/sharer.php?u=https%3A%2F%2Fshop.test%2F");
        assert_eq!(fb.open_in, OpenIn::NewTab);

        let pin = w.share_link(Platform::Pinterest, "https://shop.test/", phone);
        assert!(pin.url.starts_with(
            "https://www.pinterest.com/pin/create/button/?url=https%3A%2F%2Fshop.test%2F&description=My%20handbag%20love%20score%3A%2075%25%20"
        ));
        assert_eq!(pin.open_in, OpenIn::SameTab);

        let ig = w.share_link(Platform::Instagram, "https://shop.test/", phone);
        assert_eq!(ig.url, "https://www.instagram.com/");
        assert_eq!(ig.open_in, OpenIn::NewTab);
    }

    #[test]
    fn platform_parsing() {
        assert_eq!("Facebook".parse::<Platform>(), Ok(Platform::Facebook));
        assert!("myspace".parse::<Platform>().is_err());
    }
}

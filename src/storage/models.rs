use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fallback location name for memories recorded without one
pub const DEFAULT_LOCATION_NAME: &str = "Somewhere Special";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum MemoryCategory {
    #[serde(rename = "First Meeting")]
    FirstMeeting,
    #[serde(rename = "First Fight")]
    FirstFight,
    #[serde(rename = "First Trip")]
    FirstTrip,
    #[serde(rename = "Major Milestone")]
    MajorMilestone,
    #[default]
    #[serde(rename = "Just a Sweet Moment")]
    JustASweetMoment,
}

impl MemoryCategory {
    pub const ALL: [MemoryCategory; 5] = [
        Self::FirstMeeting,
        Self::FirstFight,
        Self::FirstTrip,
        Self::MajorMilestone,
        Self::JustASweetMoment,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::FirstMeeting => "First Meeting",
            Self::FirstFight => "First Fight",
            Self::FirstTrip => "First Trip",
            Self::MajorMilestone => "Major Milestone",
            Self::JustASweetMoment => "Just a Sweet Moment",
        }
    }

    /// Map a stored label back to a category, falling back to `JustASweetMoment`
    /// for labels written by newer or older clients.
    pub fn from_label_lossy(label: &str) -> Self {
        match label.parse() {
            Ok(category) => category,
            Err(_) => {
                log::warn!("Unknown memory category '{}', treating as sweet moment", label);
                Self::JustASweetMoment
            }
        }
    }
}

impl fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MemoryCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

/// Named place with percentage coordinates on the decorative map
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub name: String,
    pub x: f64,
    pub y: f64,
}

impl Location {
    pub fn new(name: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            name: name.into(),
            x: clamp_percent(x),
            y: clamp_percent(y),
        }
    }
}

pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        50.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    /// Client placeholder until the remote insert settles, then the server id
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    pub location: Location,
    pub category: MemoryCategory,
    pub note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Derived from the profile; never authoritative
    #[serde(default)]
    pub couple_names: Vec<String>,
}

/// Form input for a new memory, before it has an id or map position
#[derive(Debug, Clone, Default)]
pub struct MemoryDraft {
    pub title: String,
    pub date: Option<NaiveDate>,
    pub location_name: Option<String>,
    pub category: MemoryCategory,
    pub note: String,
    pub image_url: Option<String>,
}

impl MemoryDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn into_memory(self) -> Memory {
        let mut rng = rand::thread_rng();
        let location_name = self
            .location_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION_NAME.to_string());

        Memory {
            id: generate_client_id(),
            title: self.title,
            date: self.date.unwrap_or_else(|| Utc::now().date_naive()),
            location: Location::new(
                location_name,
                rng.gen_range(15..85) as f64,
                rng.gen_range(15..85) as f64,
            ),
            category: self.category,
            note: self.note,
            image_url: self.image_url,
            couple_names: Vec::new(),
        }
    }
}

/// Placeholder id for an optimistic add. Unique per call so that id
/// replacement after the remote insert can never hit a second entry.
pub fn generate_client_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("local-{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}

/// Everything the running client shows: the couple's profile plus their memories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub memories: Vec<Memory>,
    pub partner1: String,
    pub partner2: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner1_avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner2_avatar: Option<String>,
    pub start_date: NaiveDate,
    #[serde(default, rename = "isNightMode")]
    pub night_mode: bool,
}

impl AppState {
    /// Built-in state shown on first run and after sign-out
    pub fn sample() -> Self {
        let couple = vec!["Ayaan".to_string(), "Sara".to_string()];
        Self {
            partner1: "Ayaan".to_string(),
            partner2: "Sara".to_string(),
            partner1_avatar: None,
            partner2_avatar: None,
            start_date: ymd(2023, 1, 14),
            night_mode: false,
            memories: vec![
                Memory {
                    id: "1".to_string(),
                    title: "Our First Meeting".to_string(),
                    date: ymd(2023, 1, 14),
                    location: Location::new("The Coffee Bean Cafe", 25.0, 35.0),
                    category: MemoryCategory::FirstMeeting,
                    note: "I was so nervous I spilled my latte, but you just laughed and offered your napkin.".to_string(),
                    image_url: Some("https://images.unsplash.com/photo-1511920170033-f8396924c348?auto=format&fit=crop&w=400&q=80".to_string()),
                    couple_names: couple.clone(),
                },
                Memory {
                    id: "2".to_string(),
                    title: "Our First Trip Together".to_string(),
                    date: ymd(2023, 6, 20),
                    location: Location::new("Sunny Peak Mountains", 75.0, 15.0),
                    category: MemoryCategory::FirstTrip,
                    note: "The hiking was tough, but the view at the top was worth every step. Our first sunrise!".to_string(),
                    image_url: Some("https://images.unsplash.com/photo-1464822759023-fed622ff2c3b?auto=format&fit=crop&w=400&q=80".to_string()),
                    couple_names: couple,
                },
            ],
        }
    }

    pub fn memory(&self, id: &str) -> Option<&Memory> {
        self.memories.iter().find(|m| m.id == id)
    }

    pub fn couple_names(&self) -> Vec<String> {
        vec![self.partner1.clone(), self.partner2.clone()]
    }

    /// Newest first. `sort_by` is stable, so equal dates keep their current order.
    pub fn sort_memories(&mut self) {
        sort_newest_first(&mut self.memories);
    }

    pub fn apply(&mut self, patch: ProfilePatch) {
        if let Some(partner1) = patch.partner1 {
            self.partner1 = partner1;
        }
        if let Some(partner2) = patch.partner2 {
            self.partner2 = partner2;
        }
        if let Some(avatar) = patch.partner1_avatar {
            self.partner1_avatar = Some(avatar);
        }
        if let Some(avatar) = patch.partner2_avatar {
            self.partner2_avatar = Some(avatar);
        }
        if let Some(start_date) = patch.start_date {
            self.start_date = start_date;
        }
        if let Some(night_mode) = patch.night_mode {
            self.night_mode = night_mode;
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::sample()
    }
}

pub fn sort_newest_first(memories: &mut [Memory]) {
    memories.sort_by(|a, b| b.date.cmp(&a.date));
}

/// Partial profile update; `None` fields are left as they are
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    pub partner1: Option<String>,
    pub partner2: Option<String>,
    pub partner1_avatar: Option<String>,
    pub partner2_avatar: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub night_mode: Option<bool>,
}

/// Which partner an avatar or name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partner {
    First,
    Second,
}

impl Partner {
    /// Folder used for this partner's avatars in the blob store
    pub fn slug(&self) -> &'static str {
        match self {
            Self::First => "partner1",
            Self::Second => "partner2",
        }
    }

    pub fn avatar_patch(&self, url: String) -> ProfilePatch {
        match self {
            Self::First => ProfilePatch {
                partner1_avatar: Some(url),
                ..Default::default()
            },
            Self::Second => ProfilePatch {
                partner2_avatar: Some(url),
                ..Default::default()
            },
        }
    }
}

impl FromStr for Partner {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "partner1" => Ok(Self::First),
            "2" | "partner2" => Ok(Self::Second),
            other => Err(format!("unknown partner: {} (use 1 or 2)", other)),
        }
    }
}

/// Parse the date part of either `YYYY-MM-DD` or a full ISO-8601 timestamp
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(id: &str, date: &str) -> Memory {
        Memory {
            id: id.to_string(),
            title: id.to_string(),
            date: parse_calendar_date(date).unwrap(),
            location: Location::new("Here", 10.0, 10.0),
            category: MemoryCategory::JustASweetMoment,
            note: String::new(),
            image_url: None,
            couple_names: Vec::new(),
        }
    }

    #[test]
    fn test_sort_is_newest_first_and_stable() {
        let mut state = AppState::sample();
        state.memories = vec![
            memory("a", "2024-01-01"),
            memory("b", "2024-05-01"),
            memory("c", "2024-01-01"),
            memory("d", "2024-05-01"),
        ];
        state.sort_memories();

        let ids: Vec<_> = state.memories.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_cache_format_uses_camel_case_and_labels() {
        let json = serde_json::to_value(AppState::sample()).unwrap();
        assert_eq!(json["startDate"], "2023-01-14");
        assert_eq!(json["memories"][0]["category"], "First Meeting");
        assert!(json["memories"][0]["imageUrl"].is_string());
        assert_eq!(json["memories"][1]["coupleNames"][1], "Sara");
    }

    #[test]
    fn test_location_clamps_coordinates() {
        let loc = Location::new("Edge", -5.0, 140.0);
        assert_eq!(loc.x, 0.0);
        assert_eq!(loc.y, 100.0);
    }

    #[test]
    fn test_draft_defaults() {
        let memory = MemoryDraft::new("Picnic").into_memory();
        assert!(memory.id.starts_with("local-"));
        assert_eq!(memory.location.name, DEFAULT_LOCATION_NAME);
        assert!(memory.location.x >= 15.0 && memory.location.x < 85.0);
        assert_eq!(memory.category, MemoryCategory::JustASweetMoment);
        assert_eq!(memory.date, Utc::now().date_naive());
    }

    #[test]
    fn test_client_ids_are_unique() {
        let a = generate_client_id();
        let b = generate_client_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_profile_patch_is_shallow_merge() {
        let mut state = AppState::sample();
        state.apply(ProfilePatch {
            partner2: Some("Mira".to_string()),
            night_mode: Some(true),
            ..Default::default()
        });
        assert_eq!(state.partner1, "Ayaan");
        assert_eq!(state.partner2, "Mira");
        assert!(state.night_mode);
        assert_eq!(state.memories.len(), 2);
    }

    #[test]
    fn test_category_labels() {
        assert_eq!("first trip".parse::<MemoryCategory>().unwrap(), MemoryCategory::FirstTrip);
        assert_eq!(MemoryCategory::from_label_lossy("Anniversary"), MemoryCategory::JustASweetMoment);
    }

    #[test]
    fn test_parse_calendar_date_accepts_timestamps() {
        assert_eq!(
            parse_calendar_date("2024-02-29T10:11:12.000Z"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(parse_calendar_date("not a date"), None);
    }
}

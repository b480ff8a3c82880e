use serde::{Deserialize, Serialize};

use crate::storage::{
    parse_calendar_date, AppState, Location, Memory, MemoryCategory, ProfilePatch,
    DEFAULT_LOCATION_NAME,
};

/// A row of the `memories` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRow {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub title: String,
    pub date: String,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub location_x: Option<f64>,
    #[serde(default)]
    pub location_y: Option<f64>,
    pub category: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl MemoryRow {
    /// Flat snake_case row to the nested local shape. Rows whose date cannot be
    /// read are skipped, since every view orders by date.
    pub fn into_memory(self, couple_names: &[String]) -> Option<Memory> {
        let date = match parse_calendar_date(&self.date) {
            Some(date) => date,
            None => {
                log::warn!("Skipping memory {} with unreadable date '{}'", self.id, self.date);
                return None;
            }
        };

        Some(Memory {
            id: self.id,
            title: self.title,
            date,
            location: Location::new(
                self.location_name
                    .unwrap_or_else(|| DEFAULT_LOCATION_NAME.to_string()),
                self.location_x.unwrap_or(50.0),
                self.location_y.unwrap_or(50.0),
            ),
            category: MemoryCategory::from_label_lossy(&self.category),
            note: self.note.unwrap_or_default(),
            image_url: self.image_url,
            couple_names: couple_names.to_vec(),
        })
    }
}

/// Insert payload for the `memories` table; the server assigns the id
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewMemoryRow {
    pub user_id: String,
    pub title: String,
    pub date: String,
    pub location_name: String,
    pub location_x: f64,
    pub location_y: f64,
    pub category: String,
    pub note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl NewMemoryRow {
    pub fn from_memory(memory: &Memory, user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            title: memory.title.clone(),
            date: memory.date.format("%Y-%m-%d").to_string(),
            location_name: memory.location.name.clone(),
            location_x: memory.location.x,
            location_y: memory.location.y,
            category: memory.category.label().to_string(),
            note: memory.note.clone(),
            image_url: memory.image_url.clone(),
        }
    }
}

/// A row of the `profiles` table, keyed by account id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProfileRow {
    pub id: String,
    #[serde(default)]
    pub partner1_name: Option<String>,
    #[serde(default)]
    pub partner2_name: Option<String>,
    #[serde(default)]
    pub partner1_avatar: Option<String>,
    #[serde(default)]
    pub partner2_avatar: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
}

impl ProfileRow {
    /// Names to stamp onto memories loaded for this profile
    pub fn couple_names(&self) -> Vec<String> {
        vec![
            non_empty(&self.partner1_name).unwrap_or("Partner 1").to_string(),
            non_empty(&self.partner2_name).unwrap_or("Partner 2").to_string(),
        ]
    }

    /// Merge into local state. Missing names and dates keep the previous
    /// values; avatars always follow the row.
    pub fn merge_into(&self, state: &mut AppState) {
        if let Some(name) = non_empty(&self.partner1_name) {
            state.partner1 = name.to_string();
        }
        if let Some(name) = non_empty(&self.partner2_name) {
            state.partner2 = name.to_string();
        }
        state.partner1_avatar = self.partner1_avatar.clone();
        state.partner2_avatar = self.partner2_avatar.clone();
        if let Some(date) = self.start_date.as_deref().and_then(parse_calendar_date) {
            state.start_date = date;
        }
    }
}

/// Insert payload for a fresh account's profile
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewProfileRow {
    pub id: String,
    pub partner1_name: String,
    pub partner2_name: String,
    pub start_date: String,
}

/// Partial update of a profile row; `None` columns are left untouched
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct ProfileRowUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner1_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner2_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner1_avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner2_avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
}

impl ProfileRowUpdate {
    /// Night mode is a local display preference and has no column
    pub fn from_patch(patch: &ProfilePatch) -> Self {
        Self {
            partner1_name: patch.partner1.clone(),
            partner2_name: patch.partner2.clone(),
            partner1_avatar: patch.partner1_avatar.clone(),
            partner2_avatar: patch.partner2_avatar.clone(),
            start_date: patch.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row() -> MemoryRow {
        serde_json::from_value(serde_json::json!({
            "id": "abc-123",
            "user_id": "user-1",
            "title": "Picnic",
            "date": "2024-05-01",
            "location_name": "Park",
            "location_x": 40,
            "location_y": 60.5,
            "category": "Major Milestone",
            "note": "Sunny",
            "image_url": null
        }))
        .unwrap()
    }

    #[test]
    fn test_row_maps_to_nested_memory() {
        let names = vec!["A".to_string(), "B".to_string()];
        let memory = row().into_memory(&names).unwrap();

        assert_eq!(memory.id, "abc-123");
        assert_eq!(memory.date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(memory.location, Location::new("Park", 40.0, 60.5));
        assert_eq!(memory.category, MemoryCategory::MajorMilestone);
        assert_eq!(memory.image_url, None);
        assert_eq!(memory.couple_names, names);
    }

    #[test]
    fn test_row_with_bad_date_is_skipped() {
        let mut bad = row();
        bad.date = "someday".to_string();
        assert!(bad.into_memory(&[]).is_none());
    }

    #[test]
    fn test_insert_payload_is_flat() {
        let memory = row().into_memory(&[]).unwrap();
        let payload = serde_json::to_value(NewMemoryRow::from_memory(&memory, "user-1")).unwrap();

        assert_eq!(payload["user_id"], "user-1");
        assert_eq!(payload["location_name"], "Park");
        assert_eq!(payload["location_x"], 40.0);
        assert_eq!(payload["date"], "2024-05-01");
        assert!(payload.get("id").is_none());
        assert!(payload.get("image_url").is_none());
    }

    #[test]
    fn test_profile_merge_keeps_previous_names_when_missing() {
        let mut state = AppState::sample();
        let profile = ProfileRow {
            id: "user-1".to_string(),
            partner1_name: Some("Noor".to_string()),
            partner2_name: Some("  ".to_string()),
            partner1_avatar: Some("https://cdn/a.png".to_string()),
            partner2_avatar: None,
            start_date: Some("2022-03-04T00:00:00.000Z".to_string()),
        };
        profile.merge_into(&mut state);

        assert_eq!(state.partner1, "Noor");
        assert_eq!(state.partner2, "Sara");
        assert_eq!(state.partner1_avatar.as_deref(), Some("https://cdn/a.png"));
        assert_eq!(state.start_date, NaiveDate::from_ymd_opt(2022, 3, 4).unwrap());
        assert_eq!(profile.couple_names(), vec!["Noor", "Partner 2"]);
    }

    #[test]
    fn test_profile_update_skips_unset_columns() {
        let update = ProfileRowUpdate::from_patch(&ProfilePatch {
            start_date: NaiveDate::from_ymd_opt(2021, 7, 8),
            night_mode: Some(true),
            ..Default::default()
        });
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "start_date": "2021-07-08" }));
        assert!(ProfileRowUpdate::from_patch(&ProfilePatch {
            night_mode: Some(false),
            ..Default::default()
        })
        .is_empty());
    }
}

//! Read-only views over the application state: dashboard numbers, milestones,
//! the timeline and map pins. All take `today` explicitly.

use chrono::NaiveDate;
use serde::Serialize;

use crate::storage::{clamp_percent, sort_newest_first, AppState, Memory, MemoryCategory};

/// Whole days from `start` to `today`, negative when `start` is in the future
pub fn days_together(start: NaiveDate, today: NaiveDate) -> i64 {
    (today - start).num_days()
}

fn trip_count(memories: &[Memory]) -> usize {
    memories
        .iter()
        .filter(|m| m.category == MemoryCategory::FirstTrip)
        .count()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub partner1: String,
    pub partner2: String,
    pub start_date: NaiveDate,
    pub days_together: i64,
    pub memory_count: usize,
    pub trip_count: usize,
    pub milestone_count: usize,
    /// Most recent memories first, at most three
    pub recent: Vec<Memory>,
}

impl DashboardSummary {
    pub fn from_state(state: &AppState, today: NaiveDate) -> Self {
        Self {
            partner1: state.partner1.clone(),
            partner2: state.partner2.clone(),
            start_date: state.start_date,
            days_together: days_together(state.start_date, today),
            memory_count: state.memories.len(),
            trip_count: trip_count(&state.memories),
            milestone_count: state
                .memories
                .iter()
                .filter(|m| m.category == MemoryCategory::MajorMilestone)
                .count(),
            recent: timeline(&state.memories).into_iter().take(3).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneKind {
    Days,
    Memories,
    Trips,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MilestoneDef {
    pub id: &'static str,
    pub title: &'static str,
    pub kind: MilestoneKind,
    pub required: i64,
}

pub const MILESTONES: [MilestoneDef; 5] = [
    MilestoneDef {
        id: "1",
        title: "100 Days Together",
        kind: MilestoneKind::Days,
        required: 100,
    },
    MilestoneDef {
        id: "2",
        title: "1 Year Anniversary",
        kind: MilestoneKind::Days,
        required: 365,
    },
    MilestoneDef {
        id: "3",
        title: "First 10 Memories",
        kind: MilestoneKind::Memories,
        required: 10,
    },
    MilestoneDef {
        id: "4",
        title: "The Jetsetters",
        kind: MilestoneKind::Trips,
        required: 3,
    },
    MilestoneDef {
        id: "5",
        title: "5-Year Gold",
        kind: MilestoneKind::Days,
        required: 1825,
    },
];

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneStatus {
    pub id: &'static str,
    pub title: &'static str,
    pub kind: MilestoneKind,
    pub required: i64,
    pub progress: i64,
    pub unlocked: bool,
}

pub fn milestones(state: &AppState, today: NaiveDate) -> Vec<MilestoneStatus> {
    let days = days_together(state.start_date, today);
    let memories = state.memories.len() as i64;
    let trips = trip_count(&state.memories) as i64;

    MILESTONES
        .iter()
        .map(|def| {
            let progress = match def.kind {
                MilestoneKind::Days => days,
                MilestoneKind::Memories => memories,
                MilestoneKind::Trips => trips,
            };
            MilestoneStatus {
                id: def.id,
                title: def.title,
                kind: def.kind,
                required: def.required,
                progress,
                unlocked: progress >= def.required,
            }
        })
        .collect()
}

pub fn unlocked_count(statuses: &[MilestoneStatus]) -> usize {
    statuses.iter().filter(|s| s.unlocked).count()
}

/// Memories newest first; ties keep their stored order
pub fn timeline(memories: &[Memory]) -> Vec<Memory> {
    let mut sorted = memories.to_vec();
    sort_newest_first(&mut sorted);
    sorted
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PinIcon {
    Plane,
    Coffee,
    Heart,
}

impl PinIcon {
    pub fn for_category(category: MemoryCategory) -> Self {
        match category {
            MemoryCategory::FirstTrip => PinIcon::Plane,
            MemoryCategory::FirstMeeting => PinIcon::Coffee,
            _ => PinIcon::Heart,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MapPin {
    pub memory_id: String,
    pub title: String,
    pub location_name: String,
    /// Percent of map width, 0..=100
    pub x: f64,
    /// Percent of map height, 0..=100
    pub y: f64,
    pub icon: PinIcon,
}

pub fn map_pins(memories: &[Memory]) -> Vec<MapPin> {
    memories
        .iter()
        .map(|m| MapPin {
            memory_id: m.id.clone(),
            title: m.title.clone(),
            location_name: m.location.name.clone(),
            x: clamp_percent(m.location.x),
            y: clamp_percent(m.location.y),
            icon: PinIcon::for_category(m.category),
        })
        .collect()
}

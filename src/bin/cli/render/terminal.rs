use memory_lane_lib::stats::{MilestoneStatus, PinIcon};
use memory_lane_lib::storage::{Memory, MemoryCategory};

/// ANSI color codes
#[allow(dead_code)]
pub struct Color;

#[allow(dead_code)]
impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const ITALIC: &str = "\x1b[3m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

/// Wrap `text` in `color` when colors are on
pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

fn category_color(category: MemoryCategory) -> &'static str {
    match category {
        MemoryCategory::FirstMeeting => Color::CYAN,
        MemoryCategory::FirstFight => Color::RED,
        MemoryCategory::FirstTrip => Color::BLUE,
        MemoryCategory::MajorMilestone => Color::YELLOW,
        MemoryCategory::JustASweetMoment => Color::MAGENTA,
    }
}

/// One-line timeline entry: date, title, category and place
pub fn memory_line(memory: &Memory, use_color: bool) -> String {
    format!(
        "{}  {}  {} {}",
        paint(&memory.date.format("%b %d, %Y").to_string(), Color::DIM, use_color),
        paint(&memory.title, Color::BOLD, use_color),
        paint(&format!("[{}]", memory.category), category_color(memory.category), use_color),
        paint(&format!("@ {}", memory.location.name), Color::GRAY, use_color),
    )
}

/// Full memory card for `show`
pub fn render_memory(memory: &Memory, use_color: bool) -> Vec<String> {
    let mut lines = vec![
        paint(&memory.title, Color::BOLD, use_color),
        paint(
            &format!("{} | {} | {}", memory.date, memory.category, memory.location.name),
            Color::DIM,
            use_color,
        ),
    ];
    if !memory.couple_names.is_empty() {
        lines.push(paint(&memory.couple_names.join(" & "), Color::MAGENTA, use_color));
    }
    if !memory.note.is_empty() {
        lines.push(String::new());
        lines.extend(wrap_lines(&format!("\"{}\"", memory.note), "  ", 80));
    }
    if let Some(url) = &memory.image_url {
        lines.push(String::new());
        lines.push(format!("[Image: {}]", url));
    }
    lines.push(paint(&format!("id: {}", memory.id), Color::GRAY, use_color));
    lines
}

pub fn milestone_line(status: &MilestoneStatus, use_color: bool) -> String {
    let mark = if status.unlocked {
        paint("\u{2713}", Color::GREEN, use_color)
    } else {
        paint("\u{00b7}", Color::GRAY, use_color)
    };
    format!(
        "{} {} ({}/{})",
        mark,
        status.title,
        status.progress.max(0).min(status.required),
        status.required
    )
}

pub fn pin_symbol(icon: PinIcon) -> &'static str {
    match icon {
        PinIcon::Plane => "\u{2708}",
        PinIcon::Coffee => "\u{2615}",
        PinIcon::Heart => "\u{2665}",
    }
}

/// Word-wrap each line of `text` to `max_width`, prefixing every output line
pub fn wrap_lines(text: &str, prefix: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let effective_width = max_width.saturating_sub(prefix.len());

    for line in text.lines() {
        if line.len() <= effective_width {
            lines.push(format!("{}{}", prefix, line));
        } else {
            let words: Vec<&str> = line.split_whitespace().collect();
            let mut current_line = String::new();
            for word in words {
                if current_line.is_empty() {
                    current_line = word.to_string();
                } else if current_line.len() + 1 + word.len() <= effective_width {
                    current_line.push(' ');
                    current_line.push_str(word);
                } else {
                    lines.push(format!("{}{}", prefix, current_line));
                    current_line = word.to_string();
                }
            }
            if !current_line.is_empty() {
                lines.push(format!("{}{}", prefix, current_line));
            }
        }
    }

    if lines.is_empty() && !text.is_empty() {
        lines.push(format!("{}{}", prefix, text));
    }

    lines
}

use anyhow::Result;
use chrono::Local;

use memory_lane_lib::stats::{self, DashboardSummary};

use crate::app::App;
use crate::render::terminal::{self, paint, Color};
use crate::OutputFormat;

pub fn run_stats(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let summary = DashboardSummary::from_state(&app.session.snapshot(), Local::now().date_naive());

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Plain => {
            println!(
                "{}",
                paint(&format!("{} & {}", summary.partner1, summary.partner2), Color::BOLD, use_color)
            );
            println!("Together since {} ({} days)", summary.start_date.format("%B %d, %Y"), summary.days_together);
            println!(
                "{} memories, {} trips, {} milestones",
                summary.memory_count, summary.trip_count, summary.milestone_count
            );
            if !summary.recent.is_empty() {
                println!();
                println!("Recent:");
                for memory in &summary.recent {
                    println!("  {}", terminal::memory_line(memory, use_color));
                }
            }
        }
    }
    Ok(())
}

pub fn run_milestones(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let statuses = stats::milestones(&app.session.snapshot(), Local::now().date_naive());

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "unlocked": stats::unlocked_count(&statuses),
                "total": statuses.len(),
                "milestones": statuses,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            for status in &statuses {
                println!("{}", terminal::milestone_line(status, use_color));
            }
            println!();
            println!("{}/{} unlocked", stats::unlocked_count(&statuses), statuses.len());
        }
    }
    Ok(())
}

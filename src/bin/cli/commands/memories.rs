use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use memory_lane_lib::session::{AddOutcome, DeleteOutcome};
use memory_lane_lib::stats;
use memory_lane_lib::storage::{MemoryCategory, MemoryDraft};

use crate::app::App;
use crate::render::terminal::{self, paint, Color};
use crate::OutputFormat;

pub fn run_list(app: &App, limit: Option<usize>, format: &OutputFormat, use_color: bool) -> Result<()> {
    let mut memories = stats::timeline(&app.session.memories());
    if let Some(limit) = limit {
        memories.truncate(limit);
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&memories)?),
        OutputFormat::Plain => {
            if memories.is_empty() {
                println!("No memories yet. Add one with `memory-lane add`.");
            }
            for memory in &memories {
                println!("{}", terminal::memory_line(memory, use_color));
            }
        }
    }
    Ok(())
}

pub fn run_show(app: &App, query: &str, format: &OutputFormat, use_color: bool) -> Result<()> {
    let memory = app.find_memory(query)?;

    match format {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(&memory)?;
            if let Some(status) = app.session.sync_status(&memory.id) {
                value["syncStatus"] = serde_json::json!(format!("{:?}", status));
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Plain => {
            for line in terminal::render_memory(&memory, use_color) {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

pub struct AddArgs {
    pub title: String,
    pub date: Option<NaiveDate>,
    pub location: Option<String>,
    pub category: Option<MemoryCategory>,
    pub note: Option<String>,
    pub image: Option<String>,
}

pub async fn run_add(app: &App, args: AddArgs, format: &OutputFormat, use_color: bool) -> Result<()> {
    let mut draft = MemoryDraft::new(args.title);
    draft.date = args.date;
    draft.location_name = args.location;
    draft.category = args.category.unwrap_or_default();
    draft.note = args.note.unwrap_or_default();

    if let Some(image) = args.image {
        draft.image_url = Some(if image.starts_with("http://") || image.starts_with("https://") {
            image
        } else {
            upload_photo(app, Path::new(&image)).await?
        });
    }

    let memory = draft.into_memory();
    let outcome = app.session.add_memory(memory.clone()).await;
    let id = match &outcome {
        AddOutcome::Confirmed { server_id } | AddOutcome::Orphaned { server_id } => server_id.clone(),
        AddOutcome::LocalOnly | AddOutcome::Failed { .. } => memory.id.clone(),
    };

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "id": id,
                "title": memory.title,
                "date": memory.date,
                "outcome": format!("{:?}", outcome),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Added \"{}\" ({})", memory.title, id);
            match outcome {
                AddOutcome::Confirmed { .. } => println!("{}", paint("Saved to the cloud", Color::GREEN, use_color)),
                AddOutcome::LocalOnly => println!("{}", paint("Saved on this device only", Color::YELLOW, use_color)),
                AddOutcome::Failed { reason } => println!(
                    "{}",
                    paint(&format!("Error saving memory to the cloud: {}", reason), Color::RED, use_color)
                ),
                AddOutcome::Orphaned { .. } => {}
            }
        }
    }
    Ok(())
}

async fn upload_photo(app: &App, path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("jpg");
    let url = app
        .session
        .upload_memory_photo(bytes, extension)
        .await
        .context("Upload failed")?;
    log::info!("Uploaded {} to {}", path.display(), url);
    Ok(url)
}

pub async fn run_delete(app: &App, query: &str, format: &OutputFormat, use_color: bool) -> Result<()> {
    let memory = app.find_memory(query)?;
    let outcome = app.session.delete_memory(&memory.id).await;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "id": memory.id,
                "outcome": format!("{:?}", outcome),
                "warning": outcome.user_warning(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Deleted \"{}\"", memory.title);
            if let Some(warning) = outcome.user_warning() {
                println!("{}", paint(warning, Color::RED, use_color));
            } else if outcome == DeleteOutcome::LocalOnly {
                println!("{}", paint("Removed on this device only", Color::DIM, use_color));
            }
        }
    }
    Ok(())
}

pub fn run_map(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let pins = stats::map_pins(&app.session.memories());

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&pins)?),
        OutputFormat::Plain => {
            for pin in &pins {
                println!(
                    "{} {:>5.1}% {:>5.1}%  {} {}",
                    terminal::pin_symbol(pin.icon),
                    pin.x,
                    pin.y,
                    pin.title,
                    paint(&format!("@ {}", pin.location_name), Color::GRAY, use_color)
                );
            }
        }
    }
    Ok(())
}

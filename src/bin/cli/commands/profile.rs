use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use memory_lane_lib::storage::{Partner, ProfilePatch};

use crate::app::App;
use crate::render::terminal::{paint, Color};
use crate::OutputFormat;

pub struct ProfileArgs {
    pub partner1: Option<String>,
    pub partner2: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub night_mode: Option<bool>,
    pub avatar: Option<(Partner, String)>,
}

impl ProfileArgs {
    fn is_empty(&self) -> bool {
        self.partner1.is_none()
            && self.partner2.is_none()
            && self.start_date.is_none()
            && self.night_mode.is_none()
            && self.avatar.is_none()
    }
}

pub async fn run(app: &App, args: ProfileArgs, format: &OutputFormat, use_color: bool) -> Result<()> {
    if !args.is_empty() {
        update(app, args, use_color).await?;
    }

    let state = app.session.snapshot();
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "partner1": state.partner1,
                "partner2": state.partner2,
                "partner1Avatar": state.partner1_avatar,
                "partner2Avatar": state.partner2_avatar,
                "startDate": state.start_date,
                "isNightMode": state.night_mode,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("{}", paint(&format!("{} & {}", state.partner1, state.partner2), Color::BOLD, use_color));
            println!("Anniversary: {}", state.start_date.format("%B %d, %Y"));
            println!("Night mode:  {}", if state.night_mode { "on" } else { "off" });
            if let Some(url) = &state.partner1_avatar {
                println!("{}'s avatar: {}", state.partner1, url);
            }
            if let Some(url) = &state.partner2_avatar {
                println!("{}'s avatar: {}", state.partner2, url);
            }
        }
    }
    Ok(())
}

async fn update(app: &App, args: ProfileArgs, use_color: bool) -> Result<()> {
    if let Some((partner, path)) = args.avatar {
        let path = Path::new(&path);
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("jpg");
        app.session.upload_avatar(partner, bytes, extension).await?;
        let who = match partner {
            Partner::First => "Partner 1",
            Partner::Second => "Partner 2",
        };
        eprintln!("{}", paint(&format!("{} Avatar Updated!", who), Color::GREEN, use_color));
    }

    if let Some(date) = args.start_date {
        app.session
            .set_start_date(date)
            .await
            .context("Failed to update date. Please try again.")?;
        eprintln!("{}", paint("Anniversary Date Updated!", Color::GREEN, use_color));
    }

    let patch = ProfilePatch {
        partner1: args.partner1,
        partner2: args.partner2,
        night_mode: args.night_mode,
        ..Default::default()
    };
    if patch != ProfilePatch::default() {
        app.session.save_profile(patch).await?;
    }
    Ok(())
}

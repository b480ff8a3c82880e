use anyhow::Result;

use memory_lane_lib::session::{AuthPhase, Route};

use crate::app::App;
use crate::render::terminal::{paint, Color};
use crate::OutputFormat;

pub fn run(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let phase = app.session.phase();
    let route = app.session.route();

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "backend": if app.online { "cloud" } else { "offline" },
                "signedIn": phase.is_authenticated(),
                "userId": match &phase {
                    AuthPhase::Authenticated { user_id } => Some(user_id.as_str()),
                    _ => None,
                },
                "route": format!("{:?}", route).to_lowercase(),
                "sampleData": app.session.is_sample(),
                "memoryCount": app.session.memories().len(),
                "dataDir": app.session.slots().base_path().to_string_lossy(),
                "assistEnabled": app.assist.is_enabled(),
                "assistModel": app.config.assist.model,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            let account = match &phase {
                AuthPhase::Authenticated { user_id } => {
                    paint(&format!("signed in ({})", user_id), Color::GREEN, use_color)
                }
                AuthPhase::Anonymous => paint("not signed in", Color::YELLOW, use_color),
                AuthPhase::Loading => paint("loading", Color::DIM, use_color),
            };
            let next_step = match route {
                Route::Splash => "wait for the session to load",
                Route::Onboarding => "run `memory-lane signup`",
                Route::Login => "run `memory-lane login`",
                Route::Home => "you're all set",
            };
            let sample_note = if app.session.is_sample() { " (sample data)" } else { "" };

            println!("Backend:   {}", if app.online { "cloud" } else { "offline" });
            println!("Account:   {}", account);
            println!("Next step: {}", next_step);
            println!("Memories:  {}{}", app.session.memories().len(), sample_note);
            println!("Data dir:  {}", app.session.slots().base_path().display());
            if app.assist.is_enabled() {
                println!("AI assist: {}", app.config.assist.model);
            } else {
                println!("AI assist: disabled (set GEMINI_API_KEY)");
            }
        }
    }

    Ok(())
}

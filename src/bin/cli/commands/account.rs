use std::io::{self, BufRead, Write};

use anyhow::{bail, Result};

use memory_lane_lib::session::SignUpOutcome;

use crate::app::App;
use crate::render::terminal::{paint, Color};
use crate::OutputFormat;

/// Password from the flag, or from the first line of stdin
fn resolve_password(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("A password is required");
    }
    Ok(password)
}

pub async fn run_signup(
    app: &App,
    email: &str,
    password: Option<String>,
    name: &str,
    partner_name: &str,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    app.require_online()?;
    let password = resolve_password(password)?;
    let outcome = app.session.sign_up(email, &password, name, partner_name).await?;

    match format {
        OutputFormat::Json => {
            let output = match &outcome {
                SignUpOutcome::SignedIn(session) => serde_json::json!({
                    "status": "signed-in",
                    "userId": session.user_id,
                }),
                SignUpOutcome::ConfirmationPending => serde_json::json!({ "status": "confirmation-pending" }),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => match outcome {
            SignUpOutcome::SignedIn(_) => println!(
                "{}",
                paint(&format!("Welcome, {} & {}!", name, partner_name), Color::GREEN, use_color)
            ),
            SignUpOutcome::ConfirmationPending => println!(
                "Check {} for a confirmation link, then run `memory-lane login`.",
                email
            ),
        },
    }
    Ok(())
}

pub async fn run_login(
    app: &App,
    email: &str,
    password: Option<String>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    app.require_online()?;
    let password = resolve_password(password)?;
    let session = app.session.sign_in(email, &password).await?;
    let state = app.session.snapshot();

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "userId": session.user_id,
                "partner1": state.partner1,
                "partner2": state.partner2,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => println!(
            "{}",
            paint(
                &format!("Welcome back, {} & {}", state.partner1, state.partner2),
                Color::GREEN,
                use_color
            )
        ),
    }
    Ok(())
}

pub async fn run_logout(app: &App, use_color: bool) -> Result<()> {
    app.session.sign_out().await?;
    println!("{}", paint("Signed out. Local data on this device was cleared.", Color::DIM, use_color));
    Ok(())
}

pub async fn run_reset(app: &App, yes: bool, use_color: bool) -> Result<()> {
    if !yes {
        bail!("Resetting deletes all memories and profile data forever. Re-run with --yes to confirm.");
    }
    app.session.reset_app().await?;
    println!("{}", paint("App reset. All data was removed.", Color::YELLOW, use_color));
    Ok(())
}

mod app;
mod commands;
mod render;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use memory_lane_lib::storage::{parse_calendar_date, MemoryCategory, Partner};

#[derive(Parser)]
#[command(name = "memory-lane", about = "Memory Lane, a shared scrapbook for couples", version)]
struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Show account, backend and sync status
    Status,

    /// List memories, newest first
    List {
        /// Show at most this many
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show one memory
    Show {
        /// Memory id, id prefix or title prefix
        memory: String,
    },

    /// Add a memory
    Add {
        title: String,
        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        /// Where it happened
        #[arg(long)]
        location: Option<String>,
        /// First Meeting, First Fight, First Trip, Major Milestone or Just a Sweet Moment
        #[arg(long)]
        category: Option<MemoryCategory>,
        /// A short note (use "-" to read from stdin)
        #[arg(long)]
        note: Option<String>,
        /// Image file to upload, or an image URL
        #[arg(long)]
        image: Option<String>,
    },

    /// Delete a memory
    Delete {
        /// Memory id, id prefix or title prefix
        memory: String,
    },

    /// Days together and counts
    Stats,

    /// Milestones and which are unlocked
    Milestones,

    /// Memory pins on the love map
    Map,

    /// Show or edit the couple's profile
    Profile {
        #[arg(long)]
        partner1: Option<String>,
        #[arg(long)]
        partner2: Option<String>,
        /// Anniversary (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        start_date: Option<NaiveDate>,
        #[arg(long)]
        night_mode: Option<bool>,
        /// Partner whose avatar to upload (1 or 2); requires --avatar
        #[arg(long, requires = "avatar")]
        partner: Option<Partner>,
        /// Avatar image file
        #[arg(long, requires = "partner")]
        avatar: Option<String>,
    },

    /// Create an account for the two of you
    Signup {
        email: String,
        /// Your name
        #[arg(long)]
        name: String,
        /// Your partner's name
        #[arg(long)]
        partner_name: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign in to an existing account
    Login {
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign out and clear local data
    Logout,

    /// Delete all memories and profile data
    Reset {
        #[arg(long)]
        yes: bool,
    },

    /// Suggest a caption for a memory
    Caption {
        topic: String,
        #[arg(long, default_value = "happy")]
        mood: String,
    },

    /// Make a note more poetic
    Polish {
        /// Note text (use "-" to read from stdin)
        text: String,
    },
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    parse_calendar_date(raw).ok_or_else(|| format!("invalid date '{}', expected YYYY-MM-DD", raw))
}

/// Resolve "-" as stdin
fn resolve_content(content: Option<String>) -> anyhow::Result<Option<String>> {
    match content.as_deref() {
        Some("-") => {
            let mut buf = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf).context("Failed to read stdin")?;
            Ok(Some(buf.trim().to_string()))
        }
        _ => Ok(content),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && atty_check();

    let app = app::App::start().await?;
    let result = run(&app, cli.command, &cli.format, use_color).await;
    app.finish().await;
    result
}

async fn run(app: &app::App, command: Command, format: &OutputFormat, use_color: bool) -> anyhow::Result<()> {
    match command {
        Command::Status => commands::status::run(app, format, use_color),
        Command::List { limit } => commands::memories::run_list(app, limit, format, use_color),
        Command::Show { memory } => commands::memories::run_show(app, &memory, format, use_color),
        Command::Add { title, date, location, category, note, image } => {
            let args = commands::memories::AddArgs {
                title,
                date,
                location,
                category,
                note: resolve_content(note)?,
                image,
            };
            commands::memories::run_add(app, args, format, use_color).await
        }
        Command::Delete { memory } => commands::memories::run_delete(app, &memory, format, use_color).await,
        Command::Stats => commands::stats::run_stats(app, format, use_color),
        Command::Milestones => commands::stats::run_milestones(app, format, use_color),
        Command::Map => commands::memories::run_map(app, format, use_color),
        Command::Profile { partner1, partner2, start_date, night_mode, partner, avatar } => {
            let args = commands::profile::ProfileArgs {
                partner1,
                partner2,
                start_date,
                night_mode,
                avatar: partner.zip(avatar),
            };
            commands::profile::run(app, args, format, use_color).await
        }
        Command::Signup { email, name, partner_name, password } => {
            commands::account::run_signup(app, &email, password, &name, &partner_name, format, use_color).await
        }
        Command::Login { email, password } => {
            commands::account::run_login(app, &email, password, format, use_color).await
        }
        Command::Logout => commands::account::run_logout(app, use_color).await,
        Command::Reset { yes } => commands::account::run_reset(app, yes, use_color).await,
        Command::Caption { topic, mood } => commands::assist::run_caption(app, &topic, &mood, format).await,
        Command::Polish { text } => {
            let text = resolve_content(Some(text))?.unwrap_or_default();
            commands::assist::run_polish(app, &text, format).await
        }
    }
}

/// Check if stdout is a terminal (for color support)
fn atty_check() -> bool {
    unsafe { libc_isatty(1) != 0 }
}

extern "C" {
    #[link_name = "isatty"]
    fn libc_isatty(fd: i32) -> i32;
}

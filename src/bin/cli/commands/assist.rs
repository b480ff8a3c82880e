use anyhow::Result;

use crate::app::App;
use crate::OutputFormat;

pub async fn run_caption(app: &App, topic: &str, mood: &str, format: &OutputFormat) -> Result<()> {
    let caption = app.assist.suggest_caption(topic, mood).await;
    print_text("caption", &caption, format)
}

pub async fn run_polish(app: &App, text: &str, format: &OutputFormat) -> Result<()> {
    let polished = app.assist.polish_note(text).await;
    print_text("note", &polished, format)
}

fn print_text(key: &str, text: &str, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let mut output = serde_json::Map::new();
            output.insert(key.to_string(), serde_json::Value::from(text));
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => println!("{}", text),
    }
    Ok(())
}

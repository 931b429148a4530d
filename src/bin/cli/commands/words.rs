use anyhow::{bail, Context, Result};

use crate::app::App;
use crate::render::terminal::{bold, mastery_bar, seconds};
use crate::OutputFormat;

pub async fn run_add(app: &App, word: &str, translation: &str, format: &OutputFormat) -> Result<()> {
    app.load().await?;
    if app.session.mastery(word).is_some() {
        bail!("'{}' is already in your word list", word);
    }

    let id = app
        .session
        .add_word(word, translation)
        .await
        .context("Failed to add word")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "id": id,
                "word": word,
                "translation": translation,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => println!("Added {} = {}", word, translation),
    }
    Ok(())
}

pub async fn run_remove(app: &App, word: &str, format: &OutputFormat) -> Result<()> {
    app.load().await?;
    let removed = app
        .session
        .delete_word(word)
        .await
        .with_context(|| format!("Failed to remove '{}'", word))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "word": word, "removed": removed }));
        }
        OutputFormat::Plain => println!("Removed {}", word),
    }
    Ok(())
}

pub async fn run_translate(app: &App, word: &str, translation: &str, format: &OutputFormat) -> Result<()> {
    app.load().await?;
    app.session
        .update_translation(word, translation)
        .await
        .with_context(|| format!("Failed to update '{}'", word))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "word": word, "translation": translation }));
        }
        OutputFormat::Plain => println!("{} = {}", word, translation),
    }
    Ok(())
}

pub async fn run_list(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    app.load().await?;
    let stats = app.session.word_stats();
    let pending = app.session.pending_words();

    match format {
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = stats
                .iter()
                .map(|s| {
                    let mut value = serde_json::to_value(s).unwrap_or_default();
                    value["pending"] = serde_json::json!(pending.contains(&s.word));
                    value
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if stats.is_empty() {
                println!("(no words)");
                return Ok(());
            }
            let width = stats.iter().map(|s| s.word.chars().count()).max().unwrap_or(0);
            for s in &stats {
                let marker = if pending.contains(&s.word) { " *" } else { "" };
                println!(
                    "{}{}  {}  {}/{}  avg {}  {}{}",
                    bold(&s.word, use_color),
                    " ".repeat(width - s.word.chars().count()),
                    mastery_bar(&s.mastery, use_color),
                    s.correct_count,
                    s.total_attempts,
                    seconds(s.average_input_time),
                    s.translation,
                    marker
                );
            }
            if !pending.is_empty() {
                println!();
                println!("* not yet synced");
            }
        }
    }
    Ok(())
}

pub async fn run_clear(app: &App, confirmed: bool, format: &OutputFormat) -> Result<()> {
    if !confirmed {
        bail!("This deletes every word. Re-run with --yes to confirm");
    }
    app.require_user()?;
    app.session
        .remove_all_words()
        .await
        .context("Failed to remove words")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "cleared": true })),
        OutputFormat::Plain => println!("All words removed"),
    }
    Ok(())
}

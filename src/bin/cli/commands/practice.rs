use anyhow::{bail, Context, Result};

use crate::app::App;
use crate::render::terminal::mastery_bar;
use crate::OutputFormat;

pub async fn run_pick(app: &App, count: Option<usize>, format: &OutputFormat) -> Result<()> {
    app.load().await?;
    let count = count.unwrap_or(app.config.practice.max_random_words);
    let words = app.session.random_words(count);

    match format {
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = words
                .iter()
                .map(|(word, translation)| serde_json::json!({ "word": word, "translation": translation }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if words.is_empty() {
                println!("(no words to practice)");
            }
            for (word, translation) in &words {
                println!("{}  ({})", word, translation);
            }
        }
    }
    Ok(())
}

/// Record an answer. `seconds` is the typing time of a correct answer;
/// `None` records a miss.
pub async fn run_record(
    app: &App,
    word: &str,
    seconds: Option<f64>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    app.load().await?;
    let scheduler = app.start_sync();

    let recorded = match seconds {
        Some(s) => app.session.record_correct(word, s),
        None => app.session.record_incorrect(word),
    };
    if !recorded {
        scheduler.shutdown().await;
        bail!("Unknown word '{}'", word);
    }
    scheduler.teardown().await;

    let mastery = app
        .session
        .mastery(word)
        .context("Word disappeared while recording")?;
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "word": word,
                "correct": seconds.is_some(),
                "mastery": mastery,
                "pendingChanges": app.session.status().pending_changes,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("{}  {}", word, mastery_bar(&mastery, use_color));
        }
    }
    Ok(())
}

pub async fn run_reset(app: &App, word: Option<&str>, format: &OutputFormat) -> Result<()> {
    app.load().await?;

    let reset = match word {
        Some(word) => {
            app.session
                .reset_word(word)
                .await
                .with_context(|| format!("Failed to reset '{}'", word))?;
            1
        }
        None => app
            .session
            .reset_practice_records()
            .await
            .context("Failed to reset practice records")?,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "reset": reset })),
        OutputFormat::Plain => println!("Reset {} word(s)", reset),
    }
    Ok(())
}

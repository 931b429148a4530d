use anyhow::Result;

use wordpractice_lib::sync::FlushOutcome;

use crate::app::App;
use crate::OutputFormat;

pub async fn run_sync(app: &App, format: &OutputFormat) -> Result<()> {
    app.load().await?;
    let outcome = app.session.flush().await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Plain => match outcome {
            FlushOutcome::Paused => println!("Not signed in, nothing sent"),
            FlushOutcome::AlreadySyncing => println!("A sync is already running"),
            FlushOutcome::Empty => println!("Nothing to sync"),
            FlushOutcome::Completed { pushed, failed } => {
                println!("Synced {} word(s)", pushed);
                if failed > 0 {
                    println!("{} word(s) failed and stay queued", failed);
                }
            }
        },
    }
    Ok(())
}

pub async fn run_status(app: &App, format: &OutputFormat) -> Result<()> {
    if app.user_id().is_some() {
        app.load().await?;
    }
    let status = app.session.status();
    let queued = app.session.coordinator().queue().all().to_vec();

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "user": app.user_id(),
                "sync": status,
                "queue": queued,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("User:    {}", app.user_id().unwrap_or("(signed out)"));
            println!("Queue:   {}", app.queue_path().display());
            println!("Pending: {} word(s)", status.pending_changes);
            for item in &queued {
                let error = item
                    .last_error
                    .as_deref()
                    .map(|e| format!(" - {}", e))
                    .unwrap_or_default();
                println!(
                    "  {} ({}/{}), retries: {}{}",
                    item.word, item.data.correct_count, item.data.total_attempts, item.retry_count, error
                );
            }
        }
    }
    Ok(())
}

use anyhow::Result;
use colored::*;

use crate::models;
use crate::types::{ChatSession, DashboardSnapshot, ModelUsageData};
use crate::utils::{NumberFormatOptions, format_date_for_display, format_number};

/// Render the full usage dashboard as terminal tables.
pub fn show_dashboard(snapshot: &DashboardSnapshot, format_options: &NumberFormatOptions) -> Result<()> {
    println!();
    println!("{}", "AI FIESTA USAGE DASHBOARD".cyan().bold());
    println!("{}", "=========================".cyan().bold());
    println!();

    println!(
        "{:<22} {}",
        "Comparisons:".dimmed(),
        format_number(snapshot.metrics.total_comparisons, format_options)
    );
    println!(
        "{:<22} {}",
        "Models analyzed:".dimmed(),
        format_number(snapshot.metrics.models_analyzed, format_options)
    );
    println!(
        "{:<22} {}%",
        "Accuracy score:".dimmed(),
        snapshot.metrics.accuracy_score
    );
    println!(
        "{:<22} {}%",
        "API usage:".dimmed(),
        snapshot.metrics.api_usage
    );
    println!(
        "{:<22} {}",
        "API calls:".dimmed(),
        format_number(snapshot.usage.api_calls, format_options)
    );
    println!(
        "{:<22} {:.2} MB",
        "Stored sessions:".dimmed(),
        snapshot.usage.storage_mb
    );

    show_model_table("Avg response time (s)", &snapshot.response_times)?;
    show_model_table("Comparisons per model", &snapshot.messages_typed)?;
    show_model_table("Processing index", &snapshot.processing_times)?;

    if !snapshot.timeline.is_empty() {
        println!();
        println!("{}", "Daily avg response times (s)".cyan().bold());
        println!(
            "{:<15} {}",
            "Date".bold(),
            snapshot.timeline_models.join(" · ").dimmed()
        );
        for row in &snapshot.timeline {
            let cells: Vec<String> = snapshot
                .timeline_models
                .iter()
                .map(|label| match row.values.get(label) {
                    Some(value) => format!("{value:.2}"),
                    None => "-".to_string(),
                })
                .collect();
            println!(
                "{:<15} {}",
                format_date_for_display(&row.period),
                cells.join("        ")
            );
        }
    }

    println!();
    Ok(())
}

fn show_model_table(title: &str, rows: &[ModelUsageData]) -> Result<()> {
    println!();
    println!("{}", title.cyan().bold());
    if rows.is_empty() {
        println!("{}", "  (no data yet)".dimmed());
        return Ok(());
    }

    println!("{:<28} {:>10}", "Model".bold(), "Value".bold());
    for row in rows {
        println!("{:<28} {:>10.2}", row.name, row.value);
    }
    Ok(())
}

/// Render one comparison round, responses in selection order.
pub fn show_comparison(session: &ChatSession) -> Result<()> {
    println!();
    println!("{}", "COMPARISON".cyan().bold());
    println!("{} {}", "Prompt:".dimmed(), session.message);
    if let Some(total) = session.response_time {
        println!("{} {total:.2}s", "Total time:".dimmed());
    }

    for response in &session.responses {
        println!();
        let label = models::display_name(&response.model);
        if response.success {
            let mut header = format!("── {label} ");
            if let Some(t) = response.response_time {
                header.push_str(&format!("({t:.2}s) "));
            }
            if session.best_response.as_deref() == Some(response.model.as_str()) {
                header.push_str("★ best ");
            }
            println!("{}", header.green().bold());
            println!("{}", response.content);
        } else {
            println!("{}", format!("── {label} (failed)").red().bold());
            println!(
                "{}",
                response
                    .error
                    .as_deref()
                    .unwrap_or("Unknown error")
                    .red()
            );
        }
    }
    println!();
    Ok(())
}

/// List persisted sessions, newest first (the store's order).
pub fn show_session_list(sessions: &[ChatSession], format_options: &NumberFormatOptions) -> Result<()> {
    println!();
    println!(
        "{} ({} total)",
        "SAVED COMPARISONS".cyan().bold(),
        format_number(sessions.len() as u64, format_options)
    );
    println!();

    if sessions.is_empty() {
        println!("{}", "No saved comparisons.  Run `fiesta compare` with --save.".dimmed());
        return Ok(());
    }

    println!(
        "{:<18} {:<12} {:<30} {:<18} {}",
        "Id".bold(),
        "Date".bold(),
        "Models".bold(),
        "Best".bold(),
        "Prompt".bold()
    );

    for session in sessions {
        let date = session.timestamp.format("%Y-%m-%d").to_string();
        let model_labels: Vec<String> = session
            .selected_models
            .iter()
            .map(|m| models::display_name(m))
            .collect();
        let best = session
            .best_response
            .as_deref()
            .map(models::display_name)
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<18} {:<12} {:<30} {:<18} {}",
            session.id,
            format_date_for_display(&date),
            truncate(&model_labels.join(", "), 28),
            truncate(&best, 16),
            truncate(&session.message, 40).dimmed()
        );
    }
    println!();
    Ok(())
}

/// Print the static model catalog.
pub fn show_model_catalog() -> Result<()> {
    println!();
    println!("{}", "AVAILABLE MODELS".cyan().bold());
    println!();
    println!("{:<20} {:<22} {}", "Id".bold(), "Name".bold(), "Provider".bold());
    for (id, meta) in models::catalog_entries() {
        println!("{:<20} {:<22} {}", id, meta.display_name, meta.provider.dimmed());
    }
    println!();
    Ok(())
}

pub fn show_error(context: &str, message: &str) {
    eprintln!("{} {}", format!("❌ {context}:").red().bold(), message);
}

pub fn show_config_help() {
    println!();
    println!("To connect fiesta to your account:");
    println!("  1. Get your API tokens from the AI Fiesta webapp");
    println!("  2. Configure fiesta:");
    println!("     fiesta config set api-token YOUR_STORE_TOKEN");
    println!("     fiesta config set completion-token YOUR_PROVIDER_TOKEN");
    println!();
    println!("Check configuration:");
    println!("  fiesta config show");
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let prefix: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{prefix}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_text_alone() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
    }

    #[test]
    fn truncate_shortens_with_ellipsis() {
        let long = "a prompt that keeps going and going";
        let result = truncate(long, 10);
        assert_eq!(result.chars().count(), 10);
        assert!(result.ends_with('…'));
    }
}

// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatsink jobs` command implementation.
//!
//! Inspects the durable queue directly: lists jobs, shows per-status counts,
//! and re-queues failed jobs once the underlying problem is fixed.

use std::io::IsTerminal;

use chatsink_config::model::ChatsinkConfig;
use chatsink_core::types::{Job, JobStatus, QueueStats};
use chatsink_core::ChatsinkError;
use chatsink_storage::SqliteQueue;
use serde::Serialize;

/// Characters of payload shown per job in the table view.
const PREVIEW_CHARS: usize = 60;

/// One row of `jobs list --json`.
#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub id: i64,
    pub job_type: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub payload_preview: String,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            job_type: job.job_type.clone(),
            status: job.status,
            attempts: job.attempts,
            max_attempts: job.max_attempts,
            last_error: job.last_error.clone(),
            created_at: job.created_at.clone(),
            updated_at: job.updated_at.clone(),
            payload_preview: preview(&job.payload),
        }
    }
}

/// Run `chatsink jobs list`.
pub async fn run_list(
    config: &ChatsinkConfig,
    status: Option<JobStatus>,
    limit: u32,
    json: bool,
) -> Result<(), ChatsinkError> {
    let queue = SqliteQueue::open(&config.queue).await?;
    let jobs = queue.list(status, limit).await?;
    queue.close().await?;

    if json {
        let summaries: Vec<JobSummary> = jobs.iter().map(JobSummary::from).collect();
        println!("{}", to_json(&summaries)?);
        return Ok(());
    }

    let use_color = std::io::stdout().is_terminal();
    println!();
    println!("  chatsink jobs ({})", config.queue.name);
    println!("  {}", "-".repeat(72));
    if jobs.is_empty() {
        println!("    no jobs");
    }
    for job in &jobs {
        println!("{}", format_job_line(job, use_color));
        if let Some(error) = &job.last_error {
            println!("           last error: {error}");
        }
    }
    println!();
    Ok(())
}

/// Run `chatsink jobs stats`.
pub async fn run_stats(config: &ChatsinkConfig, json: bool) -> Result<(), ChatsinkError> {
    let queue = SqliteQueue::open(&config.queue).await?;
    let stats = queue.stats().await?;
    queue.close().await?;

    if json {
        println!("{}", to_json(&stats)?);
    } else {
        print_stats(&config.queue.name, &stats, std::io::stdout().is_terminal());
    }
    Ok(())
}

/// Run `chatsink jobs replay <ID>`.
pub async fn run_replay(config: &ChatsinkConfig, id: i64) -> Result<(), ChatsinkError> {
    let queue = SqliteQueue::open(&config.queue).await?;
    let replayed = queue.replay(id).await?;
    queue.close().await?;

    if replayed {
        println!("job {id} re-queued");
        Ok(())
    } else {
        Err(ChatsinkError::Internal(format!("no failed job with id {id}")))
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ChatsinkError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ChatsinkError::Internal(format!("failed to serialize output: {e}")))
}

/// Single-line payload excerpt, cut on a character boundary.
fn preview(payload: &str) -> String {
    let flat: String = payload
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    match flat.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

fn format_job_line(job: &Job, use_color: bool) -> String {
    let status = if use_color {
        use colored::Colorize;
        match job.status {
            JobStatus::Pending => "pending".yellow().to_string(),
            JobStatus::Processing => "processing".cyan().to_string(),
            JobStatus::Completed => "completed".green().to_string(),
            JobStatus::Failed => "failed".red().to_string(),
        }
    } else {
        job.status.to_string()
    };
    format!(
        "    #{:<6} {:<10} {}/{}  {}  {}",
        job.id,
        status,
        job.attempts,
        job.max_attempts,
        job.created_at,
        preview(&job.payload)
    )
}

fn print_stats(queue_name: &str, stats: &QueueStats, use_color: bool) {
    println!();
    println!("  chatsink queue ({queue_name})");
    println!("  {}", "-".repeat(35));
    println!("    Pending:    {}", stats.pending);
    println!("    Processing: {}", stats.processing);
    println!("    Completed:  {}", stats.completed);
    if use_color && stats.failed > 0 {
        use colored::Colorize;
        println!("    Failed:     {}", stats.failed.to_string().red());
    } else {
        println!("    Failed:     {}", stats.failed);
    }
    println!();
}

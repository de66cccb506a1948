use log::{error, info, warn};
use result_review::{Config, Database, ReviewWorkflow};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    // Initialize database
    let database = match Database::connect(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return;
        }
    };
    let workflow = ReviewWorkflow::new(database);

    let queue = match workflow.review_queue().await {
        Ok(queue) => queue,
        Err(e) => {
            error!("Failed to load review queue: {}", e);
            return;
        }
    };

    if queue.is_empty() {
        info!("No results are waiting for review.");
        return;
    }

    info!("{} result(s) waiting for review", queue.len());
    for record in queue {
        let reviewer = record
            .reviewed_by
            .as_ref()
            .map(|actor| actor.to_string())
            .unwrap_or_else(|| "nobody".to_string());

        match workflow.preview_winners(&record.id).await {
            Ok(tally) => {
                let winners: Vec<String> = tally
                    .winners()
                    .map(|standing| format!("{} ({} votes)", standing.candidate_id, standing.ballots))
                    .collect();
                info!(
                    "Contest {}: result {} [{}, claimed by {}], source \"{}\", projected winner(s): {}",
                    record.contest_id,
                    record.id,
                    record.review_status.as_str(),
                    reviewer,
                    record.source,
                    winners.join(", ")
                );
            }
            Err(e) => warn!(
                "Contest {}: result {} cannot be tallied: {}",
                record.contest_id, record.id, e
            ),
        }
    }
}

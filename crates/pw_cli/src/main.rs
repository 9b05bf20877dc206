mod delivery;

use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Utc};
use clap::Parser;
use tracing::{error, info};

use delivery::{deliver, ConsoleTransport};
use pw_core::{
    AggregationRequest, DateRange, Error, MarkupMode, Paper, Result, TopicQuery, Transport,
    WatchConfig,
};
use pw_message::{render_paper, render_papers};
use pw_sources::{Aggregator, ArxivSource, MedrxivSource, PaperSource};

const NO_PAPERS_MESSAGE: &str = "No papers found today for your topics.";

/// Durations like "30m", "1h15m", "1d"; a bare number means seconds.
#[derive(Debug, Clone)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if c.is_whitespace() {
                continue;
            } else {
                let num: u64 = current_number
                    .parse()
                    .map_err(|_| format!("missing number before unit '{}'", c))?;
                current_number.clear();
                match c {
                    's' => total_seconds += num,
                    'm' => total_seconds += num * 60,
                    'h' => total_seconds += num * 3600,
                    'd' => total_seconds += num * 86400,
                    _ => return Err(format!("invalid duration unit: {}", c)),
                }
            }
        }
        if !current_number.is_empty() {
            // Trailing bare number counts as seconds.
            total_seconds += current_number
                .parse::<u64>()
                .map_err(|_| "invalid number in duration".to_string())?;
        } else if total_seconds == 0 {
            return Err("duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Research paper watcher and digest delivery", long_about = None)]
struct Cli {
    /// Path to the watch config file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
    /// Transport message length ceiling
    #[arg(long, default_value_t = 4096)]
    max_message_length: usize,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Fetch and deliver a digest for the configured topics
    Digest {
        /// How many days back to include, ending today
        #[arg(long, default_value_t = 1)]
        days: u32,
    },
    /// Run digest cycles periodically
    Watch {
        /// Time between cycles (e.g. 30m, 1h, 1d)
        #[arg(long, default_value = "24h")]
        interval: HumanDuration,
        #[arg(long, default_value_t = 1)]
        days: u32,
    },
    /// Look up a single paper by identifier
    Lookup {
        /// Bare ID, compact ID, URL, or DOI
        id: String,
        #[arg(long, default_value = "arxiv")]
        source: String,
    },
    /// Show configured topics
    Topics,
}

fn ensure_days(days: u32) -> Result<()> {
    if days < 1 {
        return Err(Error::Config("--days must be >= 1".to_string()));
    }
    Ok(())
}

fn recipients_of(config: &WatchConfig) -> Vec<String> {
    if config.authorized_users.is_empty() {
        info!("No authorized users configured; printing to console only");
        vec!["console".to_string()]
    } else {
        config.authorized_users.clone()
    }
}

async fn run_digest(
    aggregator: &Aggregator,
    transport: &dyn Transport,
    config: &WatchConfig,
    days: u32,
) -> Result<()> {
    let today = Utc::now().date_naive();
    let start = today
        .checked_sub_days(Days::new(u64::from(days - 1)))
        .ok_or_else(|| Error::Config(format!("window of {} days is out of range", days)))?;
    let request = AggregationRequest {
        topics: config
            .topics
            .iter()
            .map(|t| TopicQuery::new(t.as_str()))
            .collect(),
        range: DateRange::new(start, today)?,
        max_results: config.max_results,
    };
    let recipients = recipients_of(config);

    info!(
        "🔎 Searching {} topic(s) from {} to {}",
        request.topics.len(),
        start,
        today
    );
    let result = match aggregator.aggregate(&request).await {
        Ok(result) => result,
        Err(e) => {
            error!("Aggregation failed: {}", e);
            deliver(transport, &recipients, NO_PAPERS_MESSAGE, MarkupMode::Html).await;
            return Ok(());
        }
    };

    if result.is_empty() {
        deliver(transport, &recipients, NO_PAPERS_MESSAGE, MarkupMode::Html).await;
        return Ok(());
    }

    for (topic, papers) in &result.by_topic {
        if papers.is_empty() {
            continue;
        }
        let message = render_papers(papers, &format!("{} Papers Today", topic));
        deliver(transport, &recipients, &message, MarkupMode::Html).await;
    }

    // Free-text matches carry no requested category tag and land in no
    // group; they still get delivered, under a generic heading.
    let grouped: HashSet<(&str, &str)> = result
        .by_topic
        .iter()
        .flat_map(|(_, papers)| papers.iter().map(|p| p.dedup_key()))
        .collect();
    let ungrouped: Vec<Paper> = result
        .papers
        .iter()
        .filter(|p| !grouped.contains(&p.dedup_key()))
        .cloned()
        .collect();
    if !ungrouped.is_empty() {
        let message = render_papers(&ungrouped, "More Papers Today");
        deliver(transport, &recipients, &message, MarkupMode::Html).await;
    }

    Ok(())
}

async fn run_lookup(source: &dyn PaperSource, transport: &dyn Transport, id: &str) -> Result<()> {
    // Accept the follow-up command token form straight from a digest.
    let raw = id
        .strip_prefix("/abstract")
        .or_else(|| id.strip_prefix("abstract"))
        .unwrap_or(id);
    match source.get_by_id(raw).await {
        Ok(Some(paper)) => {
            let message = render_paper(&paper);
            deliver(
                transport,
                &["console".to_string()],
                &message,
                MarkupMode::Html,
            )
            .await;
        }
        Ok(None) => println!("No paper found for {}.", id),
        Err(Error::InvalidIdentifier(_)) => println!("Could not understand that identifier."),
        Err(e) => {
            error!("Lookup failed: {}", e);
            println!("No paper found for {}.", id);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let config = WatchConfig::load(&cli.config)?;
    let transport = ConsoleTransport::new(cli.max_message_length);

    let mut aggregator = Aggregator::new();
    aggregator.add_source(Arc::new(ArxivSource::new()?));
    aggregator.add_source(Arc::new(MedrxivSource::new()?));
    info!("🔭 Sources initialized: arxiv, medrxiv");

    match cli.command {
        Commands::Digest { days } => {
            ensure_days(days)?;
            run_digest(&aggregator, &transport, &config, days).await?;
        }
        Commands::Watch { interval, days } => {
            ensure_days(days)?;
            info!(
                "⏰ Running a digest cycle every {}s",
                interval.0.as_secs()
            );
            loop {
                // Reload so config edits take effect without a restart.
                let config = WatchConfig::load(&cli.config)?;
                if let Err(e) = run_digest(&aggregator, &transport, &config, days).await {
                    error!("Digest cycle failed: {}", e);
                }
                info!("💤 Sleeping {}s until the next cycle", interval.0.as_secs());
                tokio::time::sleep(interval.0).await;
            }
        }
        Commands::Lookup { id, source } => match source.as_str() {
            "arxiv" => run_lookup(&ArxivSource::new()?, &transport, &id).await?,
            "medrxiv" => run_lookup(&MedrxivSource::new()?, &transport, &id).await?,
            other => {
                return Err(Error::Config(format!(
                    "unknown source '{}', expected arxiv or medrxiv",
                    other
                )))
            }
        },
        Commands::Topics => {
            println!("Current topics:");
            for topic in &config.topics {
                println!("- {}", topic);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_duration_units() {
        assert_eq!(
            HumanDuration::from_str("90").unwrap().0,
            Duration::from_secs(90)
        );
        assert_eq!(
            HumanDuration::from_str("30m").unwrap().0,
            Duration::from_secs(1800)
        );
        assert_eq!(
            HumanDuration::from_str("1h15m30s").unwrap().0,
            Duration::from_secs(4530)
        );
        assert_eq!(
            HumanDuration::from_str("1d").unwrap().0,
            Duration::from_secs(86400)
        );
    }

    #[test]
    fn test_human_duration_rejects_garbage() {
        assert!(HumanDuration::from_str("").is_err());
        assert!(HumanDuration::from_str("h").is_err());
        assert!(HumanDuration::from_str("10x").is_err());
    }
}

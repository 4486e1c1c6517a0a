use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use cine_review::{
    server, AppState, Config, LinearClassifier, Movie, MovieCatalog, ReviewDraft, ReviewFilter,
    ReviewStore, SentimentClassifier,
};

#[derive(Parser)]
#[command(name = "cine-review")]
#[command(about = "Movie review service with sentiment scoring")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(long, default_value = ".cine-review/config.yml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP review API
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        addr: Option<SocketAddr>,
    },

    /// List stored reviews
    List {
        /// Keep only reviews with this sentiment
        #[arg(long)]
        sentiment: Option<String>,

        /// Keep only reviews for this movie title
        #[arg(long)]
        movie: Option<String>,
    },

    /// Add a review; its sentiment is scored on the way in
    Add {
        /// Movie title the review is about
        #[arg(long)]
        movie: String,

        /// Review text
        #[arg(long)]
        text: String,
    },

    /// Re-word a stored review; its sentiment is re-scored
    Edit {
        /// Position in the stored order
        #[arg(long, conflicts_with = "id")]
        at: Option<usize>,

        /// Stable review id
        #[arg(long)]
        id: Option<Uuid>,

        /// Replacement text
        #[arg(long)]
        text: String,
    },

    /// Delete a stored review
    Delete {
        /// Position in the stored order
        #[arg(long, conflicts_with = "id")]
        at: Option<usize>,

        /// Stable review id
        #[arg(long)]
        id: Option<Uuid>,
    },

    /// Score a piece of text without storing anything
    Predict {
        /// Text to classify
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cine_review=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Serve { addr } => {
            run_server(config, addr).await?;
        }
        Commands::List { sentiment, movie } => {
            list_reviews(&config, sentiment, movie)?;
        }
        Commands::Add { movie, text } => {
            add_review(&config, movie, text)?;
        }
        Commands::Edit { at, id, text } => {
            edit_review(&config, at, id, &text)?;
        }
        Commands::Delete { at, id } => {
            delete_review(&config, at, id)?;
        }
        Commands::Predict { text } => {
            predict(&config, &text)?;
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<ReviewStore<LinearClassifier>> {
    let classifier = LinearClassifier::new(&config.classifier.model_file);
    let store = ReviewStore::open(&config.store.reviews_file, classifier)?;
    Ok(store)
}

async fn run_server(config: Config, addr: Option<SocketAddr>) -> Result<()> {
    let addr = addr.unwrap_or(config.server.bind_addr);

    let api_key = std::env::var("TMDB_API_KEY").ok();
    if api_key.is_none() {
        info!("TMDB_API_KEY not set, serving the fallback movie list");
    }

    let store = open_store(&config)?;
    let catalog = MovieCatalog::new(api_key, &config.catalog.dummy_file);

    let state = AppState {
        store: Arc::new(store),
        catalog: Arc::new(catalog),
    };

    server::serve(state, addr).await
}

fn list_reviews(config: &Config, sentiment: Option<String>, movie: Option<String>) -> Result<()> {
    let store = open_store(config)?;
    let filter = ReviewFilter { sentiment, movie };
    let reviews = store.list(&filter)?;

    if reviews.is_empty() {
        println!("No reviews match.");
        return Ok(());
    }

    for (position, review) in reviews.iter().enumerate() {
        println!(
            "[{}] {} - {} ({})",
            position,
            review.movie.title,
            review.sentiment,
            review.timestamp.to_rfc3339()
        );
        println!("    ID: {}", review.id);
        println!("    {}", review.text);
        println!();
    }

    Ok(())
}

fn add_review(config: &Config, movie: String, text: String) -> Result<()> {
    let store = open_store(config)?;
    let review = store.append(ReviewDraft {
        movie: Movie::titled(movie),
        text,
    })?;

    println!(
        "Stored {} review for {} (ID: {})",
        review.sentiment, review.movie.title, review.id
    );

    Ok(())
}

fn edit_review(config: &Config, at: Option<usize>, id: Option<Uuid>, text: &str) -> Result<()> {
    let store = open_store(config)?;

    let review = match (at, id) {
        (Some(position), None) => store.update_at(position, text)?,
        (None, Some(id)) => store.update(id, text)?,
        _ => anyhow::bail!("Must specify --at or --id"),
    };

    println!("Updated review {} ({})", review.id, review.sentiment);

    Ok(())
}

fn delete_review(config: &Config, at: Option<usize>, id: Option<Uuid>) -> Result<()> {
    let store = open_store(config)?;

    let review = match (at, id) {
        (Some(position), None) => store.delete_at(position)?,
        (None, Some(id)) => store.delete(id)?,
        _ => anyhow::bail!("Must specify --at or --id"),
    };

    println!("Deleted review {} for {}", review.id, review.movie.title);

    Ok(())
}

fn predict(config: &Config, text: &str) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("Review text must not be empty");
    }

    let classifier = LinearClassifier::new(&config.classifier.model_file);
    let sentiment = classifier.classify(text)?;

    println!("{}", sentiment);

    Ok(())
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::models::Movie;

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const POSTER_BASE_URL: &str = "https://image.tmdb.org/t/p/w200";

/// Movie listing source
///
/// With an API key the catalog serves the current TMDB popular page; without
/// one it falls back to a bundled JSON list so the rest of the service works
/// offline.
pub struct MovieCatalog {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    dummy_file: PathBuf,
}

#[derive(Debug, Deserialize)]
struct TmdbPage {
    #[serde(default)]
    results: Vec<TmdbMovie>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovie {
    title: String,
    overview: Option<String>,
    poster_path: Option<String>,
}

impl MovieCatalog {
    pub fn new(api_key: Option<String>, dummy_file: impl Into<PathBuf>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: TMDB_BASE_URL.to_string(),
            dummy_file: dummy_file.into(),
        }
    }

    /// Override the TMDB base URL (used by tests)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Current popular movies, or the fallback list when no API key is set
    #[instrument(skip(self))]
    pub async fn popular(&self) -> Result<Vec<Movie>> {
        match self.api_key {
            Some(ref api_key) => self.fetch_popular(api_key).await,
            None => self.load_fallback(),
        }
    }

    async fn fetch_popular(&self, api_key: &str) -> Result<Vec<Movie>> {
        let url = format!("{}/movie/popular", self.base_url);

        debug!(url = %url, "Requesting popular movies");

        let response = self
            .client
            .get(&url)
            .query(&[("api_key", api_key), ("language", "en-US"), ("page", "1")])
            .send()
            .await
            .context("Failed to send request to TMDB")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("TMDB API error ({}): {}", status, error_text);
        }

        let page: TmdbPage = response
            .json()
            .await
            .context("Failed to parse TMDB response")?;

        let movies: Vec<Movie> = page.results.into_iter().map(convert_movie).collect();

        info!(count = movies.len(), "Fetched popular movies from TMDB");

        Ok(movies)
    }

    fn load_fallback(&self) -> Result<Vec<Movie>> {
        let content = std::fs::read_to_string(&self.dummy_file).with_context(|| {
            format!("Failed to read movie list: {}", self.dummy_file.display())
        })?;

        let movies: Vec<Movie> =
            serde_json::from_str(&content).context("Failed to parse movie list")?;

        debug!(count = movies.len(), path = %self.dummy_file.display(), "Loaded fallback movie list");

        Ok(movies)
    }
}

fn convert_movie(movie: TmdbMovie) -> Movie {
    Movie {
        title: movie.title,
        overview: movie.overview,
        img: movie
            .poster_path
            .map(|path| format!("{}{}", POSTER_BASE_URL, path)),
    }
}

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::classifier::SentimentClassifier;
use crate::error::StoreError;
use crate::models::{Review, ReviewDraft, ReviewFilter};

/// File-backed store for the review collection
///
/// The store is the sole owner of its collection file: a single JSON array
/// holding every review in append order. Every mutation reads the whole
/// document, transforms it in memory, and atomically swaps the file; the
/// lock covers that entire cycle so overlapping writers cannot lose each
/// other's updates, while readers share access among themselves.
pub struct ReviewStore<C> {
    path: PathBuf,
    classifier: C,
    lock: RwLock<()>,
}

impl<C: SentimentClassifier> ReviewStore<C> {
    /// Open a store over `path`, creating an empty collection file if absent
    pub fn open(path: impl Into<PathBuf>, classifier: C) -> Result<Self, StoreError> {
        let store = Self {
            path: path.into(),
            classifier,
            lock: RwLock::new(()),
        };

        store.ensure_initialized()?;

        info!(path = %store.path.display(), "Opened review store");

        Ok(store)
    }

    /// The classifier this store scores text with
    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Read the full collection in stored order
    ///
    /// A vanished collection file reads as empty and is recreated instead of
    /// erroring.
    pub fn load(&self) -> Result<Vec<Review>, StoreError> {
        {
            let _guard = self.lock.read();
            if let Some(reviews) = self.try_read()? {
                return Ok(reviews);
            }
        }

        // File is gone; re-bootstrap under the write lock.
        let _guard = self.lock.write();
        self.read_or_bootstrap()
    }

    /// Read the collection, keeping only reviews that match `filter`
    pub fn list(&self, filter: &ReviewFilter) -> Result<Vec<Review>, StoreError> {
        let reviews = self.load()?;
        if filter.is_empty() {
            return Ok(reviews);
        }

        Ok(reviews.into_iter().filter(|r| filter.matches(r)).collect())
    }

    /// Validate, score, and persist a new review at the end of the collection
    pub fn append(&self, draft: ReviewDraft) -> Result<Review, StoreError> {
        let text = valid_text(&draft.text)?;
        if draft.movie.title.trim().is_empty() {
            return Err(StoreError::Validation("movie title must not be empty".into()));
        }

        // Classify before taking the write lock: a failed classification
        // must leave the collection untouched.
        let sentiment = self
            .classifier
            .classify(&text)
            .map_err(|e| StoreError::ClassifierUnavailable(e.to_string()))?;

        let review = Review {
            id: Uuid::new_v4(),
            movie: draft.movie,
            text,
            sentiment,
            timestamp: Utc::now(),
        };

        let _guard = self.lock.write();
        let mut reviews = self.read_or_bootstrap()?;
        reviews.push(review.clone());
        self.write_collection(&reviews)?;

        info!(
            id = %review.id,
            movie = %review.movie.title,
            sentiment = %review.sentiment,
            "Appended review"
        );

        Ok(review)
    }

    /// Replace the text of the review at `position`, re-scoring its sentiment
    ///
    /// The movie and id are untouched; the timestamp is refreshed. Positions
    /// are only stable until the next mutation; `update` addresses by id.
    pub fn update_at(&self, position: usize, text: &str) -> Result<Review, StoreError> {
        let text = valid_text(text)?;

        let _guard = self.lock.write();
        let mut reviews = self.read_or_bootstrap()?;
        check_bounds(position, reviews.len())?;

        self.edit_in_place(&mut reviews, position, text)
    }

    /// `update_at` addressed by stable id instead of position
    pub fn update(&self, id: Uuid, text: &str) -> Result<Review, StoreError> {
        let text = valid_text(text)?;

        let _guard = self.lock.write();
        let mut reviews = self.read_or_bootstrap()?;
        let position = position_of(&reviews, id)?;

        self.edit_in_place(&mut reviews, position, text)
    }

    /// Remove and return the review at `position`; later reviews shift down
    pub fn delete_at(&self, position: usize) -> Result<Review, StoreError> {
        let _guard = self.lock.write();
        let mut reviews = self.read_or_bootstrap()?;
        check_bounds(position, reviews.len())?;

        self.remove_in_place(&mut reviews, position)
    }

    /// `delete_at` addressed by stable id instead of position
    pub fn delete(&self, id: Uuid) -> Result<Review, StoreError> {
        let _guard = self.lock.write();
        let mut reviews = self.read_or_bootstrap()?;
        let position = position_of(&reviews, id)?;

        self.remove_in_place(&mut reviews, position)
    }

    fn edit_in_place(
        &self,
        reviews: &mut [Review],
        position: usize,
        text: String,
    ) -> Result<Review, StoreError> {
        let sentiment = self
            .classifier
            .classify(&text)
            .map_err(|e| StoreError::ClassifierUnavailable(e.to_string()))?;

        let record = &mut reviews[position];
        record.text = text;
        record.sentiment = sentiment;
        record.timestamp = Utc::now();
        let updated = record.clone();

        self.write_collection(reviews)?;

        info!(id = %updated.id, position, sentiment = %updated.sentiment, "Updated review");

        Ok(updated)
    }

    fn remove_in_place(
        &self,
        reviews: &mut Vec<Review>,
        position: usize,
    ) -> Result<Review, StoreError> {
        let removed = reviews.remove(position);

        self.write_collection(reviews)?;

        info!(id = %removed.id, position, "Deleted review");

        Ok(removed)
    }

    fn ensure_initialized(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Io(format!("failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        self.write_collection(&[])?;

        debug!(path = %self.path.display(), "Created empty review collection");

        Ok(())
    }

    /// Read the collection file, reporting an absent file as `None`
    fn try_read(&self) -> Result<Option<Vec<Review>>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Io(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let reviews = serde_json::from_str(&content).map_err(|e| {
            StoreError::Corrupt(format!(
                "{} is not a review collection: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(Some(reviews))
    }

    /// Read the collection, recreating an empty one if the file vanished
    ///
    /// Callers must hold the write lock.
    fn read_or_bootstrap(&self) -> Result<Vec<Review>, StoreError> {
        match self.try_read()? {
            Some(reviews) => Ok(reviews),
            None => {
                self.write_collection(&[])?;
                Ok(Vec::new())
            }
        }
    }

    fn write_collection(&self, reviews: &[Review]) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(reviews)
            .map_err(|e| StoreError::Corrupt(format!("failed to encode collection: {}", e)))?;

        // Write-then-rename so the durable file is always entirely the old
        // or entirely the new collection.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content)
            .map_err(|e| StoreError::Io(format!("failed to write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            StoreError::Io(format!("failed to replace {}: {}", self.path.display(), e))
        })?;

        debug!(count = reviews.len(), "Wrote review collection");

        Ok(())
    }
}

fn valid_text(text: &str) -> Result<String, StoreError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Validation("review text must not be empty".into()));
    }
    Ok(trimmed.to_string())
}

fn check_bounds(position: usize, len: usize) -> Result<(), StoreError> {
    if position >= len {
        return Err(StoreError::NotFound(format!(
            "position {} out of bounds (collection holds {})",
            position, len
        )));
    }
    Ok(())
}

fn position_of(reviews: &[Review], id: Uuid) -> Result<usize, StoreError> {
    reviews
        .iter()
        .position(|r| r.id == id)
        .ok_or_else(|| StoreError::NotFound(format!("no review with id {}", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{LinearClassifier, SentimentModel};
    use crate::models::{Movie, Sentiment};
    use anyhow::anyhow;
    use std::time::Duration;
    use tempfile::tempdir;

    struct Fixed(Sentiment);

    impl SentimentClassifier for Fixed {
        fn classify(&self, _text: &str) -> anyhow::Result<Sentiment> {
            Ok(self.0)
        }
    }

    struct Unavailable;

    impl SentimentClassifier for Unavailable {
        fn classify(&self, _text: &str) -> anyhow::Result<Sentiment> {
            Err(anyhow!("model not loaded"))
        }
    }

    fn scoring_classifier() -> LinearClassifier {
        LinearClassifier::from_model(SentimentModel {
            weights: [
                ("loved".to_string(), 2.0),
                ("great".to_string(), 1.5),
                ("terrible".to_string(), -2.0),
                ("boring".to_string(), -1.5),
            ]
            .into(),
            bias: 0.0,
        })
    }

    fn draft(title: &str, text: &str) -> ReviewDraft {
        ReviewDraft {
            movie: Movie::titled(title),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_append_then_list() {
        let dir = tempdir().unwrap();
        let store =
            ReviewStore::open(dir.path().join("reviews.json"), scoring_classifier()).unwrap();

        let stored = store.append(draft("Inception", "I loved every minute")).unwrap();
        assert_eq!(stored.sentiment, Sentiment::Positive);

        let reviews = store.list(&ReviewFilter::default()).unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].id, stored.id);
        assert_eq!(reviews[0].text, "I loved every minute");
        assert_eq!(reviews[0].movie.title, "Inception");
    }

    #[test]
    fn test_append_preserves_order() {
        let dir = tempdir().unwrap();
        let store =
            ReviewStore::open(dir.path().join("reviews.json"), Fixed(Sentiment::Positive)).unwrap();

        let first = store.append(draft("Heat", "one")).unwrap();
        let second = store.append(draft("Alien", "two")).unwrap();
        let third = store.append(draft("Up", "three")).unwrap();

        let ids: Vec<_> = store.load().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
    }

    #[test]
    fn test_open_bootstraps_a_single_file() {
        let dir = tempdir().unwrap();
        let store =
            ReviewStore::open(dir.path().join("reviews.json"), Fixed(Sentiment::Positive)).unwrap();

        assert!(store.load().unwrap().is_empty());
        assert!(store.load().unwrap().is_empty());

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_open_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("reviews.json");

        let store = ReviewStore::open(&path, Fixed(Sentiment::Positive)).unwrap();

        assert!(path.exists());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_load_recreates_vanished_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reviews.json");
        let store = ReviewStore::open(&path, Fixed(Sentiment::Positive)).unwrap();

        fs::remove_file(&path).unwrap();

        assert!(store.load().unwrap().is_empty());
        assert!(path.exists());
    }

    #[test]
    fn test_append_rejects_blank_text() {
        let dir = tempdir().unwrap();
        let store =
            ReviewStore::open(dir.path().join("reviews.json"), Fixed(Sentiment::Positive)).unwrap();

        let err = store.append(draft("Inception", "   ")).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_append_rejects_blank_movie_title() {
        let dir = tempdir().unwrap();
        let store =
            ReviewStore::open(dir.path().join("reviews.json"), Fixed(Sentiment::Positive)).unwrap();

        let err = store.append(draft("  ", "a fine movie")).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_append_stores_trimmed_text() {
        let dir = tempdir().unwrap();
        let store =
            ReviewStore::open(dir.path().join("reviews.json"), Fixed(Sentiment::Positive)).unwrap();

        let stored = store.append(draft("Up", "  lovely  ")).unwrap();
        assert_eq!(stored.text, "lovely");

        let reviews = store.load().unwrap();
        assert_eq!(reviews[0].text, "lovely");
    }

    #[test]
    fn test_list_filters_by_sentiment_case_insensitive() {
        let dir = tempdir().unwrap();
        let store =
            ReviewStore::open(dir.path().join("reviews.json"), scoring_classifier()).unwrap();

        store.append(draft("Inception", "I loved it")).unwrap();
        store.append(draft("Heat", "Truly terrible")).unwrap();
        store.append(draft("Alien", "Great fun")).unwrap();

        let filter = ReviewFilter {
            sentiment: Some("positive".to_string()),
            ..Default::default()
        };
        let positives = store.list(&filter).unwrap();
        assert_eq!(positives.len(), 2);
        assert!(positives.iter().all(|r| r.sentiment == Sentiment::Positive));

        let filter = ReviewFilter {
            sentiment: Some("NEGATIVE".to_string()),
            ..Default::default()
        };
        assert_eq!(store.list(&filter).unwrap().len(), 1);

        // Unrecognized labels match nothing rather than erroring
        let filter = ReviewFilter {
            sentiment: Some("lukewarm".to_string()),
            ..Default::default()
        };
        assert!(store.list(&filter).unwrap().is_empty());
    }

    #[test]
    fn test_list_filters_by_movie_title() {
        let dir = tempdir().unwrap();
        let store =
            ReviewStore::open(dir.path().join("reviews.json"), scoring_classifier()).unwrap();

        store.append(draft("Inception", "I loved it")).unwrap();
        store.append(draft("inception", "A bit boring")).unwrap();
        store.append(draft("Heat", "Great heist")).unwrap();

        let filter = ReviewFilter {
            movie: Some("INCEPTION".to_string()),
            ..Default::default()
        };
        assert_eq!(store.list(&filter).unwrap().len(), 2);

        // Filters are conjunctive
        let filter = ReviewFilter {
            sentiment: Some("positive".to_string()),
            movie: Some("inception".to_string()),
        };
        let matched = store.list(&filter).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].text, "I loved it");
    }

    #[test]
    fn test_update_rejects_out_of_bounds_position() {
        let dir = tempdir().unwrap();
        let store =
            ReviewStore::open(dir.path().join("reviews.json"), Fixed(Sentiment::Positive)).unwrap();

        store.append(draft("Heat", "fine")).unwrap();

        let err = store.update_at(1, "replacement").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        let err = store.update_at(0, "   ").unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_update_rescores_and_refreshes_timestamp() {
        let dir = tempdir().unwrap();
        let store =
            ReviewStore::open(dir.path().join("reviews.json"), scoring_classifier()).unwrap();

        let original = store.append(draft("Heat", "Truly terrible")).unwrap();
        assert_eq!(original.sentiment, Sentiment::Negative);

        std::thread::sleep(Duration::from_millis(5));

        let updated = store.update_at(0, "I loved it after all").unwrap();
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.movie.title, "Heat");
        assert_eq!(updated.sentiment, Sentiment::Positive);
        assert!(updated.timestamp > original.timestamp);

        let reviews = store.load().unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].text, "I loved it after all");
        assert_eq!(reviews[0].sentiment, Sentiment::Positive);
    }

    #[test]
    fn test_delete_shifts_later_positions_down() {
        let dir = tempdir().unwrap();
        let store =
            ReviewStore::open(dir.path().join("reviews.json"), Fixed(Sentiment::Positive)).unwrap();

        let a = store.append(draft("Heat", "one")).unwrap();
        let b = store.append(draft("Alien", "two")).unwrap();
        let c = store.append(draft("Up", "three")).unwrap();

        let removed = store.delete_at(0).unwrap();
        assert_eq!(removed.id, a.id);

        let reviews = store.load().unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].id, b.id);
        assert_eq!(reviews[1].id, c.id);

        let err = store.delete_at(2).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_update_and_delete_by_id() {
        let dir = tempdir().unwrap();
        let store =
            ReviewStore::open(dir.path().join("reviews.json"), scoring_classifier()).unwrap();

        let a = store.append(draft("Heat", "Truly terrible")).unwrap();
        let b = store.append(draft("Alien", "I loved it")).unwrap();

        let updated = store.update(a.id, "great on rewatch").unwrap();
        assert_eq!(updated.id, a.id);
        assert_eq!(updated.sentiment, Sentiment::Positive);

        let removed = store.delete(b.id).unwrap();
        assert_eq!(removed.id, b.id);

        let reviews = store.load().unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].id, a.id);

        let err = store.delete(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_classifier_failure_blocks_writes_but_not_reads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reviews.json");

        {
            let store = ReviewStore::open(&path, Fixed(Sentiment::Positive)).unwrap();
            store.append(draft("Heat", "seed review")).unwrap();
        }

        let store = ReviewStore::open(&path, Unavailable).unwrap();

        let err = store.append(draft("Alien", "new review")).unwrap_err();
        assert!(matches!(err, StoreError::ClassifierUnavailable(_)));

        let err = store.update_at(0, "reworded").unwrap_err();
        assert!(matches!(err, StoreError::ClassifierUnavailable(_)));

        // Reads and deletes never need the classifier
        let reviews = store.load().unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].text, "seed review");

        store.delete_at(0).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_surfaces_without_modification() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reviews.json");
        fs::write(&path, "not a collection {{").unwrap();

        let store = ReviewStore::open(&path, Fixed(Sentiment::Positive)).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));

        let err = store.append(draft("Heat", "fine")).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));

        // The damaged file is left as-is for inspection
        assert_eq!(fs::read_to_string(&path).unwrap(), "not a collection {{");
    }

    #[test]
    fn test_loads_collections_written_without_ids() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reviews.json");
        fs::write(
            &path,
            r#"[
  {
    "movie": {
      "title": "Inception",
      "overview": "A thief who steals corporate secrets",
      "img": "https://image.tmdb.org/t/p/w200/poster.jpg"
    },
    "review": "Mind-bending and brilliant",
    "sentiment": "Positive",
    "timestamp": "2024-05-01T12:00:00+00:00"
  }
]"#,
        )
        .unwrap();

        let store = ReviewStore::open(&path, Fixed(Sentiment::Negative)).unwrap();

        let reviews = store.load().unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].text, "Mind-bending and brilliant");
        assert_eq!(reviews[0].sentiment, Sentiment::Positive);

        // The next rewrite makes the generated ids durable
        store.append(draft("Heat", "tense")).unwrap();
        let rewritten: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        for entry in rewritten.as_array().unwrap() {
            assert!(entry.get("id").is_some());
        }
    }

    #[test]
    fn test_rewrite_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let store =
            ReviewStore::open(dir.path().join("reviews.json"), Fixed(Sentiment::Positive)).unwrap();

        store.append(draft("Heat", "one")).unwrap();
        store.append(draft("Alien", "two")).unwrap();
        store.delete_at(0).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}

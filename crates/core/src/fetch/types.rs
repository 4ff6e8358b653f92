use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct Article {
    /// May be empty; such articles still count toward the aggregate score.
    pub url: String,
    /// `None` when the source timestamp was absent or unparseable.
    pub published_at: Option<DateTime<Utc>>,
    /// Raw sentiment in [-1, 1].
    pub sentiment: f64,
}

//! Request and response payloads of the backend REST API

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

/// Book identifier. The backend hands these out as strings or integers
/// depending on the table; both are kept as their string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BookId(pub String);

impl BookId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BookId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = BookId;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string or integer id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<BookId, E> {
                Ok(BookId(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<BookId, E> {
                Ok(BookId(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<BookId, E> {
                Ok(BookId(v.to_string()))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

/// Genres arrive either as a single string or as a list.
fn string_or_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(s)) if s.is_empty() => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
        None => Vec::new(),
    })
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub genre: Vec<String>,
    #[serde(default)]
    pub is_pro: bool,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub rating_count: Option<u32>,
}

pub const GENRES: &[&str] = &[
    "Fiction",
    "Sci-Fi",
    "Mystery",
    "Horror",
    "Comedy",
    "Romance",
    "Thriller",
    "Biography",
    "Sad",
    "Murder",
    "Psychology",
    "Politics",
    "Other",
];

pub const DEFAULT_PAGE_SIZE: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub query: String,
    pub genre: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            genre: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl CatalogQuery {
    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        let genre = genre.into();
        self.genre = (!genre.is_empty()).then_some(genre);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn next_page(&self) -> Self {
        Self {
            page: self.page + 1,
            ..self.clone()
        }
    }

    /// Query-string pairs in the order the backend documents them.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("q", self.query.clone()),
            ("genre", self.genre.clone().unwrap_or_default()),
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogPage {
    #[serde(default)]
    pub books: Vec<Book>,
    #[serde(rename = "totalCount", default)]
    pub total_count: u64,
}

impl CatalogPage {
    pub fn total_pages(&self, limit: u32) -> u64 {
        let limit = u64::from(limit.max(1));
        self.total_count.div_ceil(limit)
    }

    /// More results exist past `query`'s page.
    pub fn has_more(&self, query: &CatalogQuery) -> bool {
        u64::from(query.page) < self.total_pages(query.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkRecord {
    pub page_number: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LibraryBookmark {
    #[serde(default)]
    pub bookmark_id: Option<BookId>,
    pub book_id: BookId,
    #[serde(default)]
    pub book_title: String,
    #[serde(default)]
    pub book_cover_url: Option<String>,
    pub page_number: i64,
}

/// A star rating, always within 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Rating(value as u8))
        } else {
            Err(format!("A rating between 1 and 5 is required, got {value}"))
        }
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> u8 {
        rating.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyRating {
    pub rating: Rating,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentOrder {
    pub id: String,
    /// Minor currency units.
    pub amount: u64,
    pub currency: String,
}

impl PaymentOrder {
    pub fn display_amount(&self) -> String {
        format!("{}.{:02} {}", self.amount / 100, self.amount % 100, self.currency)
    }
}

/// What the payment gateway hands back after the user pays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReceipt {
    pub payment_id: String,
    pub order_id: String,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct VerifyPaymentRequest<'a> {
    pub razorpay_payment_id: &'a str,
    pub razorpay_order_id: &'a str,
    pub razorpay_signature: &'a str,
    pub book_id: &'a BookId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sign_in_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_metadata: serde_json::Map<String, serde_json::Value>,
}

impl UserRecord {
    pub fn username(&self) -> Option<&str> {
        self.user_metadata.get("username").and_then(|v| v.as_str())
    }

    pub fn role_name(&self) -> &str {
        self.user_metadata
            .get("role")
            .and_then(|v| v.as_str())
            .unwrap_or("user")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MonthlySignups {
    pub month_start: NaiveDate,
    pub signup_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MonthlyActivity {
    pub month_start: NaiveDate,
    pub read_count: u64,
}

/// Full English month name for a series label.
pub fn month_label(date: NaiveDate) -> &'static str {
    const MONTHS: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    MONTHS[date.month0() as usize]
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub server_load: f64,
    pub db_connections: f64,
    pub storage_capacity: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PendingBook {
    pub id: BookId,
    pub title: String,
    pub author: String,
    #[serde(default, deserialize_with = "string_or_list")]
    pub genre: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Approved,
    Rejected,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusUpdate {
    pub status: SubmissionStatus,
}

/// Books picked by the backend's recommender, by reading history or topic.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Recommendations {
    #[serde(default)]
    pub recommendations: Vec<Book>,
}

/// How far a topic search may stray from the topic itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoverStyle {
    #[default]
    Similar,
    Surprise,
}

#[derive(Debug, Serialize)]
pub(crate) struct DiscoverRequest<'a> {
    pub topic_or_author: &'a str,
    pub style: DiscoverStyle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn book_accepts_numeric_id_and_string_genre() {
        let book: Book = serde_json::from_str(
            r#"{"id": 42, "title": "Dune", "author": "Herbert", "genre": "Sci-Fi",
                "is_pro": true, "price": 199.0, "average_rating": 4.5, "rating_count": 8}"#,
        )
        .unwrap();

        assert_eq!(book.id, BookId::new("42"));
        assert_eq!(book.genre, vec!["Sci-Fi".to_string()]);
        assert!(book.is_pro);
        assert_eq!(book.rating_count, Some(8));
    }

    #[test]
    fn book_tolerates_missing_optional_fields() {
        let book: Book = serde_json::from_str(
            r#"{"id": "b-1", "title": "T", "author": "A", "genre": ["Fiction", "Sad"], "summary": null}"#,
        )
        .unwrap();

        assert_eq!(book.genre.len(), 2);
        assert!(!book.is_pro);
        assert_eq!(book.price, None);
        assert_eq!(book.summary, None);
    }

    #[test]
    fn catalog_page_reads_total_count() {
        let page: CatalogPage =
            serde_json::from_str(r#"{"books": [], "totalCount": 25}"#).unwrap();
        let query = CatalogQuery::default().limit(10);

        assert_eq!(page.total_pages(10), 3);
        assert!(page.has_more(&query));
        assert!(page.has_more(&query.next_page()));
        assert!(!page.has_more(&query.next_page().next_page()));
    }

    #[test]
    fn catalog_query_params_match_backend_names() {
        let query = CatalogQuery::default().search("dune").genre("Sci-Fi").page(2);
        let params = query.to_params();

        assert_eq!(params[0], ("q", "dune".to_string()));
        assert_eq!(params[1], ("genre", "Sci-Fi".to_string()));
        assert_eq!(params[2], ("page", "2".to_string()));
        assert_eq!(params[3], ("limit", DEFAULT_PAGE_SIZE.to_string()));
    }

    #[test]
    fn empty_genre_means_all_genres() {
        let query = CatalogQuery::default().genre("");
        assert_eq!(query.genre, None);
        assert_eq!(CatalogQuery::default().page(0).page, 1);
    }

    #[test]
    fn rating_rejects_out_of_range() {
        assert!(Rating::try_from(0).is_err());
        assert!(Rating::try_from(6).is_err());
        assert_eq!(Rating::try_from(5).unwrap().value(), 5);

        assert!(serde_json::from_str::<MyRating>(r#"{"rating": 9}"#).is_err());
        let mine: MyRating = serde_json::from_str(r#"{"rating": 3}"#).unwrap();
        assert_eq!(serde_json::to_string(&mine).unwrap(), r#"{"rating":3}"#);
    }

    #[test]
    fn system_stats_use_camel_case() {
        let stats: SystemStats = serde_json::from_str(
            r#"{"serverLoad": 42, "dbConnections": 61, "storageCapacity": 12.5}"#,
        )
        .unwrap();
        assert_eq!(stats.server_load, 42.0);
        assert_eq!(stats.storage_capacity, 12.5);
    }

    #[test]
    fn monthly_series_labels() {
        let row: MonthlySignups =
            serde_json::from_str(r#"{"month_start": "2024-03-01", "signup_count": 17}"#).unwrap();
        assert_eq!(month_label(row.month_start), "March");
        assert_eq!(row.signup_count, 17);
    }

    #[test]
    fn payment_amount_is_formatted_from_minor_units() {
        let order: PaymentOrder = serde_json::from_str(
            r#"{"id": "order_1", "amount": 19950, "currency": "INR", "status": "created"}"#,
        )
        .unwrap();
        assert_eq!(order.display_amount(), "199.50 INR");
    }

    #[test]
    fn submission_status_is_lowercase() {
        let body = serde_json::to_string(&StatusUpdate {
            status: SubmissionStatus::Rejected,
        })
        .unwrap();
        assert_eq!(body, r#"{"status":"rejected"}"#);
    }

    #[test]
    fn user_record_reads_metadata() {
        let user: UserRecord = serde_json::from_str(
            r#"{"id": "u1", "email": "a@b.c", "created_at": "2024-01-02T03:04:05Z",
                "user_metadata": {"username": "ann", "role": "admin"}}"#,
        )
        .unwrap();
        assert_eq!(user.username(), Some("ann"));
        assert_eq!(user.role_name(), "admin");
    }

    #[test]
    fn recommendations_decode_books() {
        let recs: Recommendations = serde_json::from_str(
            r#"{"recommendations": [{"id": 3, "title": "Solaris", "author": "Lem",
                "genre": ["Sci-Fi"], "status": "approved", "file_url": "x.pdf"}]}"#,
        )
        .unwrap();

        assert_eq!(recs.recommendations.len(), 1);
        assert_eq!(recs.recommendations[0].id, BookId::new("3"));
        assert_eq!(recs.recommendations[0].title, "Solaris");
    }

    #[test]
    fn missing_recommendations_mean_none() {
        let recs: Recommendations = serde_json::from_str("{}").unwrap();
        assert!(recs.recommendations.is_empty());
    }

    #[test]
    fn discover_request_uses_backend_names() {
        let body = serde_json::to_value(DiscoverRequest {
            topic_or_author: "Ursula K. Le Guin",
            style: DiscoverStyle::Surprise,
        })
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({"topic_or_author": "Ursula K. Le Guin", "style": "surprise"})
        );
    }
}

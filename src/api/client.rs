//! Blocking client for the backend REST API
//!
//! Every call is authenticated with the bearer token of the [`Session`] the
//! client was built with. There is no ambient session lookup: whoever opens a
//! view obtains the session once and passes it in.

use std::collections::HashSet;
use std::time::Duration;

use log::{debug, warn};
use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::error::ApiError;
use super::types::{
    Book, BookId, BookmarkRecord, CatalogPage, CatalogQuery, DiscoverRequest, DiscoverStyle,
    GatewayReceipt, LibraryBookmark, MessageBody, MonthlyActivity, MonthlySignups, MyRating,
    PaymentOrder, PendingBook, Rating, Recommendations, StatusUpdate, SubmissionStatus,
    SystemStats, UserRecord, VerifyPaymentRequest,
};
use crate::auth::{Role, Session};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Session) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, session, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        session: Session,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("librovault/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.endpoint(path);
        debug!("{method} {url}");
        self.http
            .request(method, url)
            .bearer_auth(&self.session.access_token)
    }

    fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send()?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().unwrap_or_default();
            let err = ApiError::from_status(status, &body);
            warn!("Backend call failed: {err}");
            Err(err)
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let body = self.send(self.request(Method::GET, path))?.text()?;
        Ok(serde_json::from_str(&body)?)
    }

    fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send(self.request(method, path).json(body))?;
        Ok(serde_json::from_str(&response.text()?)?)
    }

    fn require_admin(&self) -> Result<(), ApiError> {
        if self.session.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden {
                message: "Admin access required!".to_string(),
            })
        }
    }

    // Catalog

    pub fn get_book(&self, id: &BookId) -> Result<Book, ApiError> {
        self.get_json(&format!("books/{id}"))
    }

    pub fn list_books(&self, query: &CatalogQuery) -> Result<CatalogPage, ApiError> {
        let builder = self.request(Method::GET, "books").query(&query.to_params());
        let body = self.send(builder)?.text()?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Raw document bytes through the backend's authenticated proxy.
    pub fn fetch_document(&self, id: &BookId) -> Result<Vec<u8>, ApiError> {
        let response = self.send(self.request(Method::GET, &format!("books/proxy/{id}")))?;
        Ok(response.bytes()?.to_vec())
    }

    /// The original file, for saving outside the reader.
    pub fn download_book(&self, id: &BookId) -> Result<Vec<u8>, ApiError> {
        let response = self.send(self.request(Method::GET, &format!("books/download/{id}")))?;
        Ok(response.bytes()?.to_vec())
    }

    // Bookmarks

    /// Saved page for `id`. Any non-success answer counts as "no bookmark".
    pub fn get_bookmark(&self, id: &BookId) -> Result<Option<i64>, ApiError> {
        let response = self
            .request(Method::GET, &format!("bookmarks/{id}"))
            .send()?;
        if !response.status().is_success() {
            debug!("No bookmark for {id} (HTTP {})", response.status());
            return Ok(None);
        }
        let record: Option<BookmarkRecord> = serde_json::from_str(&response.text()?)?;
        Ok(record.map(|r| r.page_number).filter(|page| *page >= 1))
    }

    pub fn save_bookmark(&self, id: &BookId, page: usize) -> Result<(), ApiError> {
        if page == 0 {
            return Err(ApiError::InvalidArgument(
                "Valid page number is required".to_string(),
            ));
        }
        let body = BookmarkRecord {
            page_number: page as i64,
        };
        let _: serde_json::Value =
            self.send_json(Method::PUT, &format!("bookmarks/{id}"), &body)?;
        Ok(())
    }

    pub fn my_bookmarks(&self) -> Result<Vec<LibraryBookmark>, ApiError> {
        self.get_json("my-bookmarks")
    }

    // Ratings

    pub fn my_rating(&self, id: &BookId) -> Result<Option<Rating>, ApiError> {
        let rating: Option<MyRating> = self.get_json(&format!("books/{id}/my-rating"))?;
        Ok(rating.map(|r| r.rating))
    }

    pub fn rate_book(&self, id: &BookId, rating: Rating) -> Result<(), ApiError> {
        let _: serde_json::Value =
            self.send_json(Method::POST, &format!("books/{id}/rate"), &MyRating { rating })?;
        Ok(())
    }

    // Purchases

    pub fn my_purchases(&self) -> Result<HashSet<BookId>, ApiError> {
        let ids: Vec<BookId> = self.get_json("my-purchases")?;
        Ok(ids.into_iter().collect())
    }

    pub fn create_payment_order(&self, id: &BookId) -> Result<PaymentOrder, ApiError> {
        self.send_json(Method::POST, "payment/order", &json!({ "book_id": id }))
    }

    /// Returns the backend's confirmation message.
    pub fn verify_payment(
        &self,
        id: &BookId,
        receipt: &GatewayReceipt,
    ) -> Result<String, ApiError> {
        let request = VerifyPaymentRequest {
            razorpay_payment_id: &receipt.payment_id,
            razorpay_order_id: &receipt.order_id,
            razorpay_signature: &receipt.signature,
            book_id: id,
        };
        let body: MessageBody = self.send_json(Method::POST, "payment/verify", &request)?;
        Ok(body
            .message
            .unwrap_or_else(|| "Payment successful!".to_string()))
    }

    // Recommendations

    /// Suggestions based on the user's recent reading history. Empty when
    /// there is no history yet.
    pub fn history_recommendations(&self) -> Result<Vec<Book>, ApiError> {
        let recs: Recommendations = self.get_json("ai/recommendations")?;
        Ok(recs.recommendations)
    }

    pub fn discover(
        &self,
        topic_or_author: &str,
        style: DiscoverStyle,
    ) -> Result<Vec<Book>, ApiError> {
        let topic_or_author = topic_or_author.trim();
        if topic_or_author.is_empty() {
            return Err(ApiError::InvalidArgument(
                "Topic or author is required".to_string(),
            ));
        }
        let request = DiscoverRequest {
            topic_or_author,
            style,
        };
        let recs: Recommendations = self.send_json(Method::POST, "ai/discover", &request)?;
        Ok(recs.recommendations)
    }

    // Admin

    pub fn list_users(&self) -> Result<Vec<UserRecord>, ApiError> {
        self.require_admin()?;
        self.get_json("admin/users")
    }

    pub fn monthly_signups(&self) -> Result<Vec<MonthlySignups>, ApiError> {
        self.require_admin()?;
        self.get_json("admin/stats/users")
    }

    pub fn monthly_activity(&self) -> Result<Vec<MonthlyActivity>, ApiError> {
        self.require_admin()?;
        self.get_json("admin/stats/activity")
    }

    pub fn system_stats(&self) -> Result<SystemStats, ApiError> {
        self.require_admin()?;
        self.get_json("admin/stats/system")
    }

    pub fn pending_books(&self) -> Result<Vec<PendingBook>, ApiError> {
        self.require_admin()?;
        self.get_json("admin/pending-books")
    }

    pub fn set_book_status(
        &self,
        id: &BookId,
        status: SubmissionStatus,
    ) -> Result<String, ApiError> {
        self.require_admin()?;
        let body: MessageBody = self.send_json(
            Method::PUT,
            &format!("admin/books/{id}/status"),
            &StatusUpdate { status },
        )?;
        Ok(body.message.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_helpers::test_session;

    #[test]
    fn endpoint_joins_paths() {
        let client = ApiClient::new("https://api.example.com/", test_session(Role::Reader)).unwrap();
        assert_eq!(
            client.endpoint("books/7"),
            "https://api.example.com/api/books/7"
        );
        assert_eq!(
            client.endpoint("/my-purchases"),
            "https://api.example.com/api/my-purchases"
        );
    }

    #[test]
    fn admin_calls_rejected_for_readers_without_request() {
        // Unroutable address: a request attempt would fail with a transport error.
        let client = ApiClient::new("http://127.0.0.1:9", test_session(Role::Reader)).unwrap();
        assert!(matches!(
            client.list_users(),
            Err(ApiError::Forbidden { .. })
        ));
        assert!(matches!(
            client.set_book_status(&BookId::new("1"), SubmissionStatus::Approved),
            Err(ApiError::Forbidden { .. })
        ));
    }

    #[test]
    fn zero_page_bookmark_is_rejected_locally() {
        let client = ApiClient::new("http://127.0.0.1:9", test_session(Role::Reader)).unwrap();
        assert!(matches!(
            client.save_bookmark(&BookId::new("1"), 0),
            Err(ApiError::InvalidArgument(_))
        ));
    }

    #[test]
    fn blank_discover_topic_is_rejected_locally() {
        let client = ApiClient::new("http://127.0.0.1:9", test_session(Role::Reader)).unwrap();
        assert!(matches!(
            client.discover("   ", DiscoverStyle::Similar),
            Err(ApiError::InvalidArgument(_))
        ));
    }
}

//! Catalog-side rules that live in the client: who may open a book, how a
//! rating is applied, and the purchase flow around the payment gateway.

use std::collections::HashSet;

use log::{info, warn};

use crate::api::{ApiClient, ApiError, Book, BookId, GatewayReceipt, PaymentOrder, Rating};
use crate::auth::Role;

/// Why a reader may (or may not) open a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Free,
    Purchased,
    /// Admins read PRO books without buying them.
    Admin,
    Locked,
}

impl Access {
    pub fn for_book(book: &Book, purchased: &HashSet<BookId>, role: Role) -> Self {
        if !book.is_pro {
            Access::Free
        } else if purchased.contains(&book.id) {
            Access::Purchased
        } else if role.is_admin() {
            Access::Admin
        } else {
            Access::Locked
        }
    }

    pub fn can_read(self) -> bool {
        self != Access::Locked
    }
}

/// The signed-in user's own rating of one book.
///
/// Updates are optimistic: the new value shows immediately and is rolled
/// back if the backend refuses it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingState {
    current: Option<Rating>,
}

impl RatingState {
    pub fn new(current: Option<Rating>) -> Self {
        Self { current }
    }

    pub fn current(&self) -> Option<Rating> {
        self.current
    }

    pub fn rate<F>(&mut self, rating: Rating, submit: F) -> Result<(), ApiError>
    where
        F: FnOnce(Rating) -> Result<(), ApiError>,
    {
        let previous = self.current.replace(rating);
        if let Err(e) = submit(rating) {
            warn!("Rating {} rejected, reverting: {e}", rating.value());
            self.current = previous;
            return Err(e);
        }
        Ok(())
    }
}

/// The two backend calls of a purchase.
pub trait CheckoutApi {
    fn create_payment_order(&self, id: &BookId) -> Result<PaymentOrder, ApiError>;

    fn verify_payment(&self, id: &BookId, receipt: &GatewayReceipt) -> Result<String, ApiError>;
}

impl CheckoutApi for ApiClient {
    fn create_payment_order(&self, id: &BookId) -> Result<PaymentOrder, ApiError> {
        ApiClient::create_payment_order(self, id)
    }

    fn verify_payment(&self, id: &BookId, receipt: &GatewayReceipt) -> Result<String, ApiError> {
        ApiClient::verify_payment(self, id, receipt)
    }
}

/// External checkout step that takes the user's money for an order.
pub trait PaymentGateway {
    /// `Ok(None)` when the user abandoned the payment.
    fn collect(&mut self, book: &Book, order: &PaymentOrder) -> anyhow::Result<Option<GatewayReceipt>>;
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("payment was not completed: {0}")]
    Gateway(#[source] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Backend confirmation message.
    Completed(String),
    AlreadyReadable(Access),
    Cancelled,
}

/// Books the signed-in user may read, as seen by this client.
#[derive(Debug, Clone, Default)]
pub struct Shelf {
    purchased: HashSet<BookId>,
    role: Role,
}

impl Shelf {
    pub fn new(purchased: HashSet<BookId>, role: Role) -> Self {
        Self { purchased, role }
    }

    pub fn access(&self, book: &Book) -> Access {
        Access::for_book(book, &self.purchased, self.role)
    }

    pub fn is_purchased(&self, id: &BookId) -> bool {
        self.purchased.contains(id)
    }

    /// Order, pay, verify. The book joins the shelf only once the backend
    /// has verified the payment.
    pub fn checkout(
        &mut self,
        api: &dyn CheckoutApi,
        gateway: &mut dyn PaymentGateway,
        book: &Book,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let access = self.access(book);
        if access.can_read() {
            return Ok(CheckoutOutcome::AlreadyReadable(access));
        }

        let order = api.create_payment_order(&book.id)?;
        info!("Created order {} for book {}", order.id, book.id);

        let receipt = match gateway.collect(book, &order).map_err(CheckoutError::Gateway)? {
            Some(receipt) => receipt,
            None => {
                info!("Payment for order {} abandoned", order.id);
                return Ok(CheckoutOutcome::Cancelled);
            }
        };

        let message = api.verify_payment(&book.id, &receipt)?;
        self.purchased.insert(book.id.clone());
        info!("Book {} purchased", book.id);
        Ok(CheckoutOutcome::Completed(message))
    }
}

/// Local file name for a downloaded book: the title reduced to
/// alphanumerics, spaces and underscores, the same filter the backend applies
/// to its attachment name. Falls back to the book id when nothing survives.
pub fn download_filename(book: &Book) -> String {
    let kept: String = book
        .title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_')
        .collect();
    let stem = kept.trim();
    if stem.is_empty() {
        let id: String = book
            .id
            .to_string()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        format!("book_{id}.pdf")
    } else {
        format!("{stem}.pdf")
    }
}

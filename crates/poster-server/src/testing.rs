//! Test fakes and fixtures for router tests

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{Router, body::Body, http::Request};
use poster_core::{ArtifactCatalog, CartItemId, EmailMessage, EmailSender};
use poster_media::{ArtifactName, FileStore};
use poster_payments::{
    CreatedSession, MemoryEventLedger, PaymentError, PaymentProvider, PaymentStatus,
    ProviderEvent, PurchasedItem, SessionRequest, SessionSnapshot, signature,
};
use tempfile::TempDir;

use crate::config::AppConfig;
use crate::routes::router;
use crate::state::AppState;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
pub struct FakePayments {
    pub created: Mutex<Vec<SessionRequest>>,
    pub session: Mutex<Option<SessionSnapshot>>,
    pub retrievals: AtomicUsize,
}

impl FakePayments {
    pub fn set_session(&self, session: SessionSnapshot) {
        *self.session.lock().unwrap() = Some(session);
    }
}

#[async_trait]
impl PaymentProvider for FakePayments {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> poster_payments::Result<CreatedSession> {
        self.created.lock().unwrap().push(request.clone());
        Ok(CreatedSession {
            id: "cs_test_new".into(),
            url: "https://checkout.test/cs_test_new".into(),
        })
    }

    fn verify_event(
        &self,
        payload: &str,
        signature_header: &str,
    ) -> poster_payments::Result<ProviderEvent> {
        signature::verify(
            payload.as_bytes(),
            signature_header,
            WEBHOOK_SECRET,
            unix_now(),
            signature::DEFAULT_TOLERANCE_SECS,
        )?;
        ProviderEvent::from_stripe_json(payload)
    }

    async fn retrieve_session(
        &self,
        session_id: &str,
        _with_items: bool,
    ) -> poster_payments::Result<SessionSnapshot> {
        self.retrievals.fetch_add(1, Ordering::SeqCst);
        self.session
            .lock()
            .unwrap()
            .clone()
            .filter(|s| s.id == session_id)
            .ok_or_else(|| PaymentError::Stripe(format!("No such checkout.session: {session_id}")))
    }
}

#[derive(Default)]
pub struct RecordingEmail {
    pub sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl EmailSender for RecordingEmail {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, message: &EmailMessage) -> poster_core::Result<String> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(format!("email_{}", sent.len()))
    }
}

/// Delegates to the real store and counts lookups
pub struct CountingCatalog {
    inner: Arc<FileStore>,
    lookups: AtomicUsize,
}

impl ArtifactCatalog for CountingCatalog {
    fn has_preview(&self, id: &CartItemId) -> bool {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.has_preview(id)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    _dir: TempDir,
    pub payments: Arc<FakePayments>,
    pub email: Arc<RecordingEmail>,
    pub ledger: Arc<MemoryEventLedger>,
    catalog: Arc<CountingCatalog>,
    state: AppState,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(true)
    }

    pub fn without_payments() -> Self {
        Self::build(false)
    }

    fn build(with_payments: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().to_string_lossy().into_owned();
        let config = AppConfig::from_lookup(|key| match key {
            "FRONTEND_URL" => Some("https://shop.test/".into()),
            "BACKEND_URL" => Some("https://api.test".into()),
            "STORAGE_DIR" => Some(storage.clone()),
            _ => None,
        });

        let store = Arc::new(FileStore::new(dir.path()));
        std::fs::create_dir_all(store.pdf_dir()).unwrap();
        std::fs::create_dir_all(store.preview_dir()).unwrap();

        let payments = Arc::new(FakePayments::default());
        let email = Arc::new(RecordingEmail::default());
        let catalog = Arc::new(CountingCatalog {
            inner: store.clone(),
            lookups: AtomicUsize::new(0),
        });

        let ledger = Arc::new(MemoryEventLedger::new());

        let mut state = AppState::new(
            config,
            with_payments.then(|| payments.clone() as Arc<dyn PaymentProvider>),
            Some(email.clone() as Arc<dyn EmailSender>),
            store,
            ledger.clone(),
        );
        state.catalog = catalog.clone();

        Self {
            _dir: dir,
            payments,
            email,
            ledger,
            catalog,
            state,
        }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    pub fn catalog_lookups(&self) -> usize {
        self.catalog.lookups.load(Ordering::SeqCst)
    }

    fn name(id: &str) -> ArtifactName {
        ArtifactName::from_upload(id)
    }

    pub fn pdf_path(&self, name: &str) -> PathBuf {
        self.state.store.pdf_path(&Self::name(name))
    }

    pub fn preview_path(&self, name: &str) -> PathBuf {
        self.state.store.preview_path(&Self::name(name))
    }

    pub fn write_pdf(&self, name: &str, bytes: &[u8]) {
        std::fs::write(self.pdf_path(name), bytes).unwrap();
    }

    pub fn write_preview(&self, name: &str) {
        std::fs::write(self.preview_path(name), [0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
    }

    /// Files in the PDF and preview directories
    pub fn stored_files(&self) -> usize {
        [self.state.store.pdf_dir(), self.state.store.preview_dir()]
            .iter()
            .map(|dir| std::fs::read_dir(dir).unwrap().count())
            .sum()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Hand-built `multipart/form-data` request body
pub struct MultipartBuilder {
    boundary: &'static str,
    body: Vec<u8>,
}

impl MultipartBuilder {
    pub fn new() -> Self {
        Self {
            boundary: "----poster-test-boundary",
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Request::post(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

/// PDF-looking bytes of the given size (not parseable; previews fall back to A4)
pub fn fake_pdf(size: usize) -> Vec<u8> {
    let mut bytes = b"%PDF-1.4\n".to_vec();
    bytes.resize(size, b'%');
    bytes
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Stripe-shaped event envelope about `cs_test_0001abcd`
pub fn completed_event_body(event_id: &str, event_type: &str) -> String {
    serde_json::json!({
        "id": event_id,
        "object": "event",
        "type": event_type,
        "data": { "object": { "id": "cs_test_0001abcd", "object": "checkout.session" } }
    })
    .to_string()
}

pub fn paid_session(email: Option<&str>, cart_item_ids: &[&str]) -> SessionSnapshot {
    SessionSnapshot {
        id: "cs_test_0001abcd".into(),
        payment_status: PaymentStatus::Paid,
        status: Some("complete".into()),
        customer_email: email.map(str::to_string),
        amount_total: Some(2990 * i64::try_from(cart_item_ids.len()).unwrap()),
        currency: Some("eur".into()),
        items: cart_item_ids
            .iter()
            .map(|id| PurchasedItem {
                name: format!("Poster {id}"),
                quantity: 1,
                amount_total: 2990,
                cart_item_id: Some((*id).to_string()),
            })
            .collect(),
    }
}

fn unix_now() -> i64 {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    i64::try_from(secs).unwrap()
}

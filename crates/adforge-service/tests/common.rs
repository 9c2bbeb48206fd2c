//! Common test utilities for adforge integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use tempfile::TempDir;

use adforge_core::{PricingConfig, User, UserId};
use adforge_service::auth::JwtClaims;
use adforge_service::crypto::hmac_sha256_hex;
use adforge_service::worker::GenerationWorker;
use adforge_service::{create_router, AppState, ServiceConfig};
use adforge_store::{RocksStore, Store};

/// JWT secret shared between the harness and the service under test.
pub const JWT_SECRET: &str = "test-jwt-secret";

/// Webhook secret shared between the harness and the service under test.
pub const WEBHOOK_SECRET: &str = "whsec_test";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct store handle for seeding and asserting on state.
    pub store: Arc<RocksStore>,
    /// App state (for exercising the reaper directly).
    pub state: AppState,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
    /// The service API key for service-to-service requests.
    pub service_api_key: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a harness with an injected worker.
    pub fn with_worker(worker: Arc<dyn GenerationWorker>) -> Self {
        Self::build(Some(worker))
    }

    fn build(worker: Option<Arc<dyn GenerationWorker>>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));

        let service_api_key = "test-service-key".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            auth_jwt_secret: Some(JWT_SECRET.into()),
            auth_audience: "adforge".into(),
            service_api_key: Some(service_api_key.clone()),
            payment_webhook_secret: Some(WEBHOOK_SECRET.into()),
            worker_url: None,
            worker_api_key: None,
            media_base_url: "http://localhost:8081/media".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            pending_job_timeout_seconds: 0,
            reaper_interval_seconds: 60,
            pricing: PricingConfig::default(),
        };

        let state = match worker {
            Some(worker) => AppState::with_worker(Arc::clone(&store), config, worker),
            None => AppState::new(Arc::clone(&store), config),
        };
        let router: Router = create_router(state.clone());

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_user_id = UserId::generate();

        Self {
            server,
            store,
            state,
            _temp_dir: temp_dir,
            test_user_id,
            service_api_key,
        }
    }

    /// Mint a signed JWT for the given user.
    pub fn jwt_for(user_id: &UserId) -> String {
        let now = Utc::now().timestamp();
        let claims = JwtClaims {
            sub: user_id.to_string(),
            aud: "adforge".into(),
            exp: now + 3600,
            iat: now,
            email: Some("ada@example.com".into()),
            name: Some("Ada".into()),
            picture: None,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("Failed to encode test JWT")
    }

    /// Get the authorization header for the harness's test user.
    pub fn user_auth_header(&self) -> String {
        format!("Bearer {}", Self::jwt_for(&self.test_user_id))
    }

    /// Get a different user's auth header (for testing isolation).
    pub fn other_user_auth_header() -> String {
        format!("Bearer {}", Self::jwt_for(&UserId::generate()))
    }

    /// Seed the test user with the given credit balance.
    pub fn seed_test_user(&self, balance: i64) {
        let mut user = User::new(self.test_user_id, "Ada".into(), "ada@example.com".into());
        user.credit_balance = balance;
        self.store.put_user(&user).expect("Failed to seed user");
    }

    /// The test user's current balance, read straight from the store.
    pub fn balance(&self) -> i64 {
        self.store
            .get_user(&self.test_user_id)
            .expect("Failed to read user")
            .expect("Test user not seeded")
            .credit_balance
    }

    /// Sign a webhook body the way the payment provider would.
    pub fn sign_webhook(body: &str) -> String {
        hmac_sha256_hex(WEBHOOK_SECRET, body)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

//! Shared harness for the router-level tests.
#![allow(dead_code)]

pub mod mocks;

use axum_test::TestServer;
use codepath::{
    api,
    db::{NewUser, User},
    types::Role,
    utils::config::Config,
    AppState, AuthService, Database, HintService, PistonClient, RateLimiter,
};
use mocks::{MockLlmClient, HINT_REPLY};
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const TOKEN_MINUTES: i64 = 30;
pub const PASSWORD: &str = "correct-horse-battery";

const LIMITED_ROUTES: [&str; 6] = ["login", "logout", "test_token", "signup", "hints", "execute"];

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub piston: MockServer,
    pub llm: Arc<MockLlmClient>,
}

impl TestApp {
    /// Router with every limited route at a budget no test reaches.
    pub async fn new() -> Self {
        Self::with_rate_limits(&[]).await
    }

    pub async fn with_rate_limits(overrides: &[(&str, &str)]) -> Self {
        let mut config = Config::default();
        for route in LIMITED_ROUTES {
            config
                .rate_limits
                .insert(route.to_string(), "1000/minute".to_string());
        }
        for (route, rule) in overrides {
            config
                .rate_limits
                .insert(route.to_string(), rule.to_string());
        }

        let piston = MockServer::start().await;
        config.piston.url = format!("{}/api/v2/execute", piston.uri());

        let llm = Arc::new(MockLlmClient::new(HINT_REPLY));
        let rules = config.rate_rules().expect("test rate rules should parse");

        let state = AppState {
            db: Arc::new(Database::new_memory().await.expect("in-memory database")),
            auth_service: Arc::new(AuthService::new(
                TEST_SECRET,
                chrono::Duration::minutes(TOKEN_MINUTES),
            )),
            rate_limiter: RateLimiter::in_memory(rules),
            piston: Arc::new(
                PistonClient::new(&config.piston.url, Duration::from_secs(2))
                    .expect("piston client"),
            ),
            hints: Arc::new(HintService::new(llm.clone())),
            config: Arc::new(config),
        };

        let server = TestServer::new(api::app(state.clone())).expect("test server");

        Self {
            server,
            state,
            piston,
            llm,
        }
    }

    pub async fn create_user(&self, email: &str, role: Role) -> User {
        let password_hash = self
            .state
            .auth_service
            .hash_password(PASSWORD)
            .await
            .expect("hash");

        self.state
            .db
            .create_user(&NewUser {
                email: email.to_string(),
                user_name: None,
                password_hash,
                role,
                is_active: true,
            })
            .await
            .expect("create user")
    }

    pub fn token_for(&self, user: &User) -> String {
        self.state
            .auth_service
            .issue_access_token(user.id)
            .expect("issue token")
    }

    pub async fn admin(&self) -> (User, String) {
        let user = self.create_user("admin@codepath.dev", Role::Admin).await;
        let token = self.token_for(&user);
        (user, token)
    }

    pub async fn learner(&self, email: &str) -> (User, String) {
        let user = self.create_user(email, Role::Learner).await;
        let token = self.token_for(&user);
        (user, token)
    }
}

use docvault_auth::HashCost;
use docvault_server::config::{AuthConfig, Config, StorageConfig};
use docvault_server::state::AppState;
use reqwest::Client;
use serde_json::{Value, json};
use std::net::SocketAddr;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const UPLOAD_LIMIT: usize = 64 * 1024;

pub struct TestServer {
    pub url: String,
    #[allow(dead_code)]
    pub addr: SocketAddr,
    pub state: AppState,
    _uploads: TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        let uploads = TempDir::new().unwrap();

        let config = Config {
            host: "127.0.0.1".into(),
            port: 0, // OS assigns port
            max_upload_bytes: UPLOAD_LIMIT,
            auth: AuthConfig {
                jwt_secret: Some("integration-test-secret".into()),
                // Cheap hashing keeps the suite fast
                hash_cost: HashCost {
                    memory_kib: 1024,
                    iterations: 1,
                    parallelism: 1,
                },
                ..Default::default()
            },
            storage: StorageConfig {
                backend: "local".into(),
                local_path: uploads.path().to_string_lossy().into_owned(),
                ..Default::default()
            },
        };

        let state = AppState::new(&config).await.unwrap();
        let app = docvault_server::routes::router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            addr,
            state,
            _uploads: uploads,
        }
    }

    /// Sign up and log in, returning the bearer token
    #[allow(dead_code)]
    pub async fn register(&self, client: &Client, email: &str) -> String {
        let response = client
            .post(format!("{}/auth/signup", self.url))
            .json(&json!({ "email": email, "password": "password123" }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 201);

        let response = client
            .post(format!("{}/auth/login", self.url))
            .json(&json!({ "email": email, "password": "password123" }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 200);

        let body: Value = response.json().await.expect("Failed to parse JSON");
        body["token"].as_str().unwrap().to_string()
    }
}

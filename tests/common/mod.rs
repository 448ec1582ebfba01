use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use jobportal::config::Config;
use jobportal::media::{MediaError, MediaStore, ResourceType, StoredAsset, UploadOptions};

pub const PASSWORD: &str = "password123";

/// Media store that keeps everything in memory and records what happened.
#[derive(Default)]
pub struct MemoryStore {
    pub uploads: Mutex<Vec<(String, String)>>,
    pub destroyed: Mutex<Vec<String>>,
    pub failing_folders: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn uploaded_folders(&self) -> Vec<String> {
        self.uploads.lock().unwrap().iter().map(|(f, _)| f.clone()).collect()
    }

    pub fn destroyed_ids(&self) -> Vec<String> {
        self.destroyed.lock().unwrap().clone()
    }

    pub fn uploaded_ids(&self) -> Vec<String> {
        self.uploads.lock().unwrap().iter().map(|(_, id)| id.clone()).collect()
    }

    /// Make every later upload into `folder` fail.
    pub fn fail_uploads_to(&self, folder: &str) {
        self.failing_folders.lock().unwrap().push(folder.to_string());
    }
}

#[async_trait]
impl MediaStore for MemoryStore {
    async fn upload(
        &self,
        data_uri: &str,
        options: UploadOptions<'_>,
    ) -> Result<StoredAsset, MediaError> {
        assert!(data_uri.starts_with("data:"), "expected a data URI");

        let folder = options.folder.unwrap_or_default().to_string();
        if self.failing_folders.lock().unwrap().contains(&folder) {
            return Err(MediaError::from("upload rejected"));
        }
        let public_id = format!("{folder}/{}", Uuid::now_v7().simple());
        self.uploads
            .lock()
            .unwrap()
            .push((folder, public_id.clone()));

        Ok(StoredAsset {
            url: format!(
                "https://media.test/{}/{public_id}",
                options.resource_type.as_str()
            ),
            public_id,
        })
    }

    async fn destroy(
        &self,
        public_id: &str,
        _resource_type: ResourceType,
    ) -> Result<(), MediaError> {
        self.destroyed.lock().unwrap().push(public_id.to_string());
        Ok(())
    }
}

/// A running test server instance with a dedicated test database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: PgPool,
    pub client: Client,
    pub db_name: String,
    pub media: Arc<MemoryStore>,
}

#[allow(dead_code)]
impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Register with a JSON body, return (body, status).
    pub async fn register(
        &self,
        fullname: &str,
        email: &str,
        phone: &str,
        role: &str,
    ) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/api/users/register"))
            .json(&json!({
                "fullname": fullname,
                "email": email,
                "phoneNumber": phone,
                "password": PASSWORD,
                "role": role,
            }))
            .send()
            .await
            .expect("register request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Log in, return (body, status, token cookie value if set).
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        role: &str,
    ) -> (Value, StatusCode, Option<String>) {
        let resp = self
            .client
            .post(self.url("/api/users/login"))
            .json(&json!({ "email": email, "password": password, "role": role }))
            .send()
            .await
            .expect("login request failed");
        let status = resp.status();
        let token = token_cookie(resp.headers());
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status, token)
    }

    /// Register and log in a user, return the session token.
    pub async fn signup(&self, email: &str, phone: &str, role: &str) -> String {
        let (body, status) = self.register("Test User", email, phone, role).await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        let (body, status, token) = self.login(email, PASSWORD, role).await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        token.expect("login did not set a token cookie")
    }

    pub async fn recruiter(&self) -> String {
        self.signup("recruiter@test.com", "5550001", "Recruiter").await
    }

    /// Register a company, return its id.
    pub async fn create_company(&self, token: &str, name: &str) -> String {
        let (body, status) = self
            .post_auth(
                "/api/company/register",
                token,
                &json!({ "companyName": name, "description": "We build things" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create company failed: {body}");
        body["company"]["_id"].as_str().unwrap().to_string()
    }

    /// Post a job, return its JSON.
    pub async fn post_job(&self, token: &str, company_id: &str, overrides: Value) -> Value {
        let mut job = json!({
            "title": "Backend Engineer",
            "description": "Build APIs",
            "requirements": "Rust, SQL",
            "salary": 100000,
            "location": "Remote",
            "jobType": "Full-time",
            "experience": 3,
            "position": 2,
            "companyId": company_id,
        });
        if let (Some(job), Some(overrides)) = (job.as_object_mut(), overrides.as_object()) {
            for (k, v) in overrides {
                job.insert(k.clone(), v.clone());
            }
        }
        let (body, status) = self.post_auth("/api/job/postjob", token, &job).await;
        assert_eq!(status, StatusCode::CREATED, "post job failed: {body}");
        body["job"].clone()
    }

    /// Make an authenticated GET request.
    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .header("cookie", format!("token={token}"))
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an authenticated POST request with JSON body.
    pub async fn post_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .header("cookie", format!("token={token}"))
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an authenticated POST request with a multipart body.
    pub async fn post_multipart(&self, path: &str, token: &str, form: Form) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .header("cookie", format!("token={token}"))
            .multipart(form)
            .send()
            .await
            .expect("multipart request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an authenticated PUT request with a multipart body.
    pub async fn put_multipart(&self, path: &str, token: &str, form: Form) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .header("cookie", format!("token={token}"))
            .multipart(form)
            .send()
            .await
            .expect("multipart request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make every UPDATE on `users` fail inside the database.
    pub async fn reject_user_updates(&self) {
        sqlx::query(
            "CREATE FUNCTION reject_user_update() RETURNS trigger AS $$
             BEGIN RAISE EXCEPTION 'user updates disabled'; END
             $$ LANGUAGE plpgsql",
        )
        .execute(&self.pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TRIGGER reject_user_update BEFORE UPDATE ON users
             FOR EACH ROW EXECUTE FUNCTION reject_user_update()",
        )
        .execute(&self.pool)
        .await
        .unwrap();
    }

    pub async fn user_count(&self) -> i64 {
        jobportal::db::users::count_all(&self.pool).await.unwrap()
    }
}

/// Value of the `token` cookie in a response's `Set-Cookie` headers.
pub fn token_cookie(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|c| c.strip_prefix("token="))
        .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
}

/// A multipart file part with an explicit content type.
pub fn file_part(bytes: &'static [u8], file_name: &str, mime: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(mime)
        .unwrap()
}

fn admin_url(base_url: &str) -> String {
    base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.to_string())
}

/// Spawn a test app with a fresh temporary database.
pub async fn spawn_app() -> TestApp {
    let _ = dotenvy::dotenv();

    let base_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");

    // Create a unique test database
    let db_name = format!("jobportal_test_{}", Uuid::now_v7().simple());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url(&base_url))
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    // Connect to test DB and run migrations
    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    let config = Config {
        database_url: test_url,
        jwt_secret: "test-jwt-secret-that-is-long-enough".to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        client_urls: vec!["http://localhost:5173".to_string()],
        max_body_size: 26_214_400,
        cookie_secure: false,
        log_level: "warn".to_string(),
        cloudinary: None,
    };

    let media = Arc::new(MemoryStore::default());
    let (app, _state) = jobportal::build_app_with_media(pool.clone(), config, media.clone());

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        pool,
        client,
        db_name,
        media,
    }
}

/// Drop the test database after tests complete.
pub async fn cleanup(app: TestApp) {
    let db_name = app.db_name.clone();
    app.pool.close().await;

    let base_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url(&base_url))
        .await
        .expect("Failed to connect for cleanup");

    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;
}

#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use lions_forum::{
    AppState,
    config::Config,
    create_app,
    database::{create_pool, run_migrations},
    session::{DynSessionStore, MemorySessionStore},
};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "readmore123";
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x06\0\0\0";
const BOUNDARY: &str = "forum-test-boundary";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub temp_dir: TempDir,
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

pub async fn spawn_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", temp_dir.path().join("forum.db").display());

    let db = create_pool(&url).await.unwrap();
    run_migrations(&db).await.unwrap();

    let config = Config {
        bcrypt_cost: 4,
        upload_dir: temp_dir.path().join("uploads").display().to_string(),
        max_file_size: 64 * 1024,
        ..Config::default()
    };

    let sessions: DynSessionStore = Arc::new(MemorySessionStore::new());
    let state = AppState::new(db, sessions, config);

    TestApp {
        app: create_app(state.clone()),
        state,
        temp_dir,
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, form: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(form.to_string())).unwrap())
            .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        parts: &[Part<'_>],
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File {
                    name,
                    filename,
                    content_type,
                    data,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            name, filename, content_type
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let mut builder = Request::builder().method("POST").uri(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Response<Body> {
        let form = format!("username={}&email={}&password={}", username, email, password);
        self.post_form("/register", &form, None).await
    }

    /// Logs in and returns the `Cookie` header value for the new session.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let form = format!("email={}&password={}", email, password);
        let response = self.post_form("/login", &form, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    pub async fn register_and_login(&self, username: &str) -> String {
        let email = format!("{}@example.com", username);
        let response = self.register(username, &email, PASSWORD).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        self.login(&email, PASSWORD).await
    }

    pub async fn create_post(&self, cookie: &str, title: &str, category: &str) -> i64 {
        let response = self
            .post_multipart(
                "/post/create",
                &[
                    Part::Text("title", title),
                    Part::Text("content", "Discuss."),
                    Part::Text("category", category),
                ],
                Some(cookie),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        sqlx::query_scalar("SELECT MAX(id) FROM posts")
            .fetch_one(&self.state.db)
            .await
            .unwrap()
    }

    pub async fn reply(&self, cookie: &str, post_id: i64, content: &str) -> i64 {
        let form = format!("post_id={}&content={}", post_id, content);
        let response = self.post_form("/post/reply", &form, Some(cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        sqlx::query_scalar("SELECT MAX(id) FROM comments")
            .fetch_one(&self.state.db)
            .await
            .unwrap()
    }

    pub async fn view_post(&self, post_id: i64, cookie: Option<&str>) -> Value {
        let response = self.get(&format!("/post/view?id={}", post_id), cookie).await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }

    pub async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar(sql)
            .fetch_one(&self.state.db)
            .await
            .unwrap()
    }
}

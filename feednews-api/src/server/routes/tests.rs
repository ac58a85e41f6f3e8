use crate::server::{ServerState, app, images::ImageStore, schema::Pagination};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Method, Request, StatusCode,
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, AUTHORIZATION, CONTENT_TYPE, ORIGIN},
    },
    response::Response,
};
use feednews_common::{
    auth::{password::PasswordHash, token::TokenCodec},
    model::user::{CreateUser, Email, User, UserName},
};
use feednews_db::{memory::MemoryStore, store::SharedStore};
use serde_json::{Value, json};
use std::{path::PathBuf, sync::Arc};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "feednews-test-boundary";

struct TestApp {
    router: Router,
    store: SharedStore,
    tokens: Arc<TokenCodec>,
    image_dir: PathBuf,
    _root: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let image_dir = root.path().join("images");
        std::fs::create_dir_all(&image_dir).unwrap();

        let store: SharedStore = Arc::new(MemoryStore::default());
        let tokens = Arc::new(TokenCodec::new(b"router test secret", None));
        let images = Arc::new(ImageStore::new(image_dir.clone()));
        let state = ServerState::new(
            Arc::clone(&store),
            Arc::clone(&tokens),
            images,
            Pagination { posts_per_page: 20 },
        );

        Self {
            router: app(state, 1024 * 1024),
            store,
            tokens,
            image_dir,
            _root: root,
        }
    }

    async fn user(&self) -> (User, String) {
        let user = self
            .store
            .create_user(&CreateUser {
                email: Email::new("uploader@example.com".to_owned()).unwrap(),
                name: UserName::new("Uploader".to_owned()).unwrap(),
                password_hash: PasswordHash::from_phc("$argon2id$unused".to_owned()),
            })
            .await
            .unwrap();
        let token = self.tokens.sign(user.id, &user.email).unwrap();

        (user, format!("Bearer {token}"))
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    fn image_files(&self) -> Vec<String> {
        let mut files: Vec<String> = std::fs::read_dir(&self.image_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        files.sort();
        files
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

enum Part<'a> {
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

fn multipart(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                        Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(authorization: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut request = Request::builder()
        .method(Method::POST)
        .uri("/post-image")
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(authorization) = authorization {
        request = request.header(AUTHORIZATION, authorization);
    }
    request.body(Body::from(multipart(parts))).unwrap()
}

const CAT: Part<'static> = Part::File {
    name: "image",
    file_name: "cat picture.png",
    content_type: "image/png",
    bytes: b"\x89PNG not really",
};

#[tokio::test]
async fn uploads_need_a_viewer() {
    let app = TestApp::new();

    let response = app.send(upload_request(None, &[CAT])).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        json!({ "message": "Not authenticated!", "status": 401 })
    );
    assert!(app.image_files().is_empty());
}

#[tokio::test]
async fn uploads_store_the_image_and_replace_the_old_one() {
    let app = TestApp::new();
    let (_, authorization) = app.user().await;
    std::fs::write(app.image_dir.join("old.png"), b"old").unwrap();
    let outside = app.image_dir.parent().unwrap().join("outside.png");
    std::fs::write(&outside, b"keep me").unwrap();

    let response = app
        .send(upload_request(
            Some(&authorization),
            &[
                CAT,
                Part::Text {
                    name: "oldPath",
                    value: "images/old.png",
                },
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["message"], "File Received");
    let file_path = body["filePath"].as_str().unwrap().to_owned();
    assert!(file_path.starts_with("images/"));
    assert!(file_path.ends_with("-cat_picture.png"));

    let stored = file_path.trim_start_matches("images/");
    assert_eq!(app.image_files(), [stored]);
    assert_eq!(
        std::fs::read(app.image_dir.join(stored)).unwrap(),
        b"\x89PNG not really"
    );

    let response = app
        .send(upload_request(
            Some(&authorization),
            &[
                CAT,
                Part::Text {
                    name: "oldPath",
                    value: "../outside.png",
                },
            ],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(outside.exists());
    assert_eq!(app.image_files().len(), 2);

    let response = app
        .send(
            Request::get(format!("/{file_path}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"\x89PNG not really");
}

#[tokio::test]
async fn uploads_without_a_file_change_nothing() {
    let app = TestApp::new();
    let (_, authorization) = app.user().await;
    std::fs::write(app.image_dir.join("old.png"), b"old").unwrap();

    let response = app
        .send(upload_request(
            Some(&authorization),
            &[Part::Text {
                name: "oldPath",
                value: "images/old.png",
            }],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "message": "No files sent!" })
    );
    assert_eq!(app.image_files(), ["old.png"]);
}

#[tokio::test]
async fn uploads_reject_other_types() {
    let app = TestApp::new();
    let (_, authorization) = app.user().await;

    let response = app
        .send(upload_request(
            Some(&authorization),
            &[Part::File {
                name: "image",
                file_name: "cat.gif",
                content_type: "image/gif",
                bytes: b"GIF89a",
            }],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(response).await["status"], 422);
    assert!(app.image_files().is_empty());
}

#[tokio::test]
async fn graphql_reads_the_authorization_header() {
    let app = TestApp::new();
    let (user, authorization) = app.user().await;
    let query = json!({ "query": "{ getUserData { _id email } }" }).to_string();

    let response = app
        .send(
            Request::post("/graphql")
                .header(CONTENT_TYPE, "application/json")
                .header(AUTHORIZATION, &authorization)
                .body(Body::from(query.clone()))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({
            "data": {
                "getUserData": { "_id": user.id.to_string(), "email": "uploader@example.com" },
            },
        })
    );

    let response = app
        .send(
            Request::post("/graphql")
                .header(CONTENT_TYPE, "application/json")
                .header(AUTHORIZATION, "Bearer forged.token.value")
                .body(Body::from(query))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({
            "data": null,
            "errors": [{ "message": "Not authenticated!", "status": 401 }],
        })
    );
}

#[tokio::test]
async fn malformed_graphql_bodies_get_the_error_envelope() {
    let app = TestApp::new();

    let response = app
        .send(
            Request::post("/graphql")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["status"], 400);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .starts_with("GraphQL request rejected: ")
    );
    assert_eq!(body.get("data"), None);
}

#[tokio::test]
async fn preflight_requests_are_answered() {
    let app = TestApp::new();

    let response = app
        .send(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/graphql")
                .header(ORIGIN, "https://client.example")
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let app = TestApp::new();

    let response = app
        .send(Request::get("/nowhere").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        json!({ "message": "Unknown route requested: /nowhere", "status": 404 })
    );
}

#[tokio::test]
async fn graphiql_is_served() {
    let app = TestApp::new();

    let response = app
        .send(Request::get("/graphql").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("graphiql"));
}

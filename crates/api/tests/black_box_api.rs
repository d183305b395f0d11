use chrono::{Duration as ChronoDuration, Utc};
use courseware_api::config::ApiConfig;
use courseware_core::UserId;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Same router as prod (in-memory store), bound to an ephemeral port.
        let app = courseware_api::app::build_app(&ApiConfig::new(jwt_secret))
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, sub: UserId, role: &str, token_type: &str) -> String {
    let now = Utc::now();
    let claims = json!({
        "sub": sub,
        "role": role,
        "token_type": token_type,
        "iat": now.timestamp(),
        "exp": (now + ChronoDuration::minutes(10)).timestamp(),
    });

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

/// Register a user and log in; returns (user id, access token).
async fn sign_up(client: &reqwest::Client, srv: &TestServer, username: &str, role: &str) -> (String, String) {
    let password = "s3cure-passw0rd";
    let res = client
        .post(srv.url("/register/"))
        .json(&json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": password,
            "password2": password,
            "role": role,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let user: Value = res.json().await.unwrap();
    assert_eq!(user["role"], role);

    let res = client
        .post(srv.url("/api/token/"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let tokens: Value = res.json().await.unwrap();

    (
        user["id"].as_str().unwrap().to_string(),
        tokens["access"].as_str().unwrap().to_string(),
    )
}

async fn create_course(client: &reqwest::Client, srv: &TestServer, token: &str, title: &str) -> String {
    let res = client
        .post(srv.url("/courses/"))
        .bearer_auth(token)
        .json(&json!({ "title": title, "description": "An introduction" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["is_published"], false);
    body["id"].as_str().unwrap().to_string()
}

async fn create_lesson(client: &reqwest::Client, srv: &TestServer, token: &str, course: &str, title: &str) -> String {
    let res = client
        .post(srv.url("/lessons/"))
        .bearer_auth(token)
        .json(&json!({
            "course": course,
            "title": title,
            "description": "Lesson body",
            "content": "Read this carefully."
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn missing_token_is_anonymous_and_bad_token_is_rejected() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["authenticated"], false);

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Signed with a different secret.
    let forged = mint_jwt("other-secret", UserId::new(), "admin", "access");
    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn actor_is_derived_from_token() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let user_id = UserId::new();
    let token = mint_jwt(jwt_secret, user_id, "instructor", "access");
    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user_id"].as_str().unwrap(), user_id.to_string());
    assert_eq!(body["role"], "instructor");

    // Refresh tokens are not bearer credentials.
    let refresh = mint_jwt(jwt_secret, user_id, "instructor", "refresh");
    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(&refresh)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_validates_input() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/register/"))
        .json(&json!({
            "username": "mallory",
            "password": "s3cure-passw0rd",
            "password2": "different-passw0rd",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "password: Passwords do not match.");

    sign_up(&client, &srv, "alice", "student").await;
    let res = client
        .post(srv.url("/register/"))
        .json(&json!({
            "username": "alice",
            "password": "s3cure-passw0rd",
            "password2": "s3cure-passw0rd",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/api/token/"))
        .json(&json!({ "username": "alice", "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_token_yields_new_access_token() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let password = "s3cure-passw0rd";

    let res = client
        .post(srv.url("/register/"))
        .json(&json!({ "username": "bob", "password": password, "password2": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let tokens: Value = client
        .post(srv.url("/api/token/"))
        .json(&json!({ "username": "bob", "password": password }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let res = client
        .post(srv.url("/api/token/refresh/"))
        .json(&json!({ "refresh": tokens["refresh"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let access = body["access"].as_str().unwrap();

    let whoami: Value = client
        .get(srv.url("/whoami"))
        .bearer_auth(access)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(whoami["role"], "student");

    // An access token cannot be used to refresh.
    let res = client
        .post(srv.url("/api/token/refresh/"))
        .json(&json!({ "refresh": tokens["access"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn course_lifecycle_publish_enroll_complete_progress() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    let (_, tutor) = sign_up(&client, &srv, "tutor", "instructor").await;
    let (student_id, student) = sign_up(&client, &srv, "student", "student").await;

    let course = create_course(&client, &srv, &tutor, "Rust 101").await;

    // Publishing an empty course fails.
    let res = client
        .post(srv.url(&format!("/courses/{course}/publish/")))
        .bearer_auth(&tutor)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "You can not publish course without lessons.");

    // Drafts are invisible to students.
    let listed: Value = client
        .get(srv.url("/courses/"))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.as_array().unwrap().is_empty());

    let mut lessons = Vec::new();
    for title in ["Ownership", "Borrowing", "Lifetimes", "Traits"] {
        lessons.push(create_lesson(&client, &srv, &tutor, &course, title).await);
    }

    let res = client
        .post(srv.url(&format!("/courses/{course}/publish/")))
        .bearer_auth(&tutor)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["is_published"], true);

    let listed: Value = client
        .get(srv.url("/courses/"))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["lessons_count"], 4);
    assert_eq!(listed[0]["is_enrolled"], false);
    assert_eq!(listed[0]["instructor"]["username"], "tutor");

    // Detail needs an enrollment.
    let res = client
        .get(srv.url(&format!("/courses/{course}/")))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Enroll is idempotent.
    let res = client
        .post(srv.url(&format!("/courses/{course}/enroll/")))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let res = client
        .post(srv.url(&format!("/courses/{course}/enroll/")))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let detail: Value = client
        .get(srv.url(&format!("/courses/{course}/")))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let titles: Vec<&str> = detail["lessons"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Ownership", "Borrowing", "Lifetimes", "Traits"]);

    for _ in 0..2 {
        let res = client
            .post(srv.url(&format!("/lessons/{}/mark_as_completed/", lessons[0])))
            .bearer_auth(&student)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = client
        .get(srv.url(&format!("/courses/{course}/get_progress/?user_id={student_id}")))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let progress: Value = res.json().await.unwrap();
    assert_eq!(progress["progress"], 25.0);
    assert_eq!(progress["completed_lessons"], 1);
    assert_eq!(progress["lessons_count"], 4);

    let res = client
        .get(srv.url(&format!("/courses/{course}/get_progress/")))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "user_id parameter is required.");

    // Enrolled filter.
    let enrolled: Value = client
        .get(srv.url("/courses/?enrolled=true"))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(enrolled.as_array().unwrap().len(), 1);
    assert_eq!(enrolled[0]["is_enrolled"], true);
}

#[tokio::test]
async fn role_checks_guard_writes() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    let (_, owner) = sign_up(&client, &srv, "owner", "instructor").await;
    let (_, rival) = sign_up(&client, &srv, "rival", "instructor").await;
    let (_, student) = sign_up(&client, &srv, "pupil", "student").await;

    // Anonymous create needs authentication.
    let res = client
        .post(srv.url("/courses/"))
        .json(&json!({ "title": "t", "description": "d" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Students never author.
    let res = client
        .post(srv.url("/courses/"))
        .bearer_auth(&student)
        .json(&json!({ "title": "t", "description": "d" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let course = create_course(&client, &srv, &owner, "Owned").await;
    create_lesson(&client, &srv, &owner, &course, "Intro").await;

    // Another instructor cannot see the draft at all.
    let res = client
        .patch(srv.url(&format!("/courses/{course}/")))
        .bearer_auth(&rival)
        .json(&json!({ "title": "Hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(srv.url(&format!("/courses/{course}/publish/")))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Once published it is visible but still not theirs.
    let res = client
        .delete(srv.url(&format!("/courses/{course}/")))
        .bearer_auth(&rival)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(srv.url(&format!("/courses/{course}/enroll/")))
        .bearer_auth(&rival)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(srv.url(&format!("/courses/{course}/unpublish/")))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .delete(srv.url(&format!("/courses/{course}/")))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(srv.url(&format!("/courses/{course}/")))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn course_update_toggles_lessons_in_one_request() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    let (_, tutor) = sign_up(&client, &srv, "author", "instructor").await;
    let course = create_course(&client, &srv, &tutor, "Batching").await;
    let first = create_lesson(&client, &srv, &tutor, &course, "First").await;
    let second = create_lesson(&client, &srv, &tutor, &course, "Second").await;

    let res = client
        .patch(srv.url(&format!("/courses/{course}/")))
        .bearer_auth(&tutor)
        .json(&json!({
            "title": "Batching, revised",
            "lessons": [
                { "id": first, "is_active": false },
                { "id": UserId::new(), "is_active": false }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let detail: Value = res.json().await.unwrap();
    assert_eq!(detail["title"], "Batching, revised");
    let ids: Vec<&str> = detail["lessons"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![second.as_str()]);

    // The deactivated lesson still exists for its owner.
    let res = client
        .get(srv.url(&format!("/lessons/{first}/")))
        .bearer_auth(&tutor)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let lesson: Value = res.json().await.unwrap();
    assert_eq!(lesson["is_active"], false);

    // PUT on a lesson needs a content payload; PATCH does not.
    let res = client
        .put(srv.url(&format!("/lessons/{second}/")))
        .bearer_auth(&tutor)
        .json(&json!({ "course": course, "title": "Second", "description": "d" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .patch(srv.url(&format!("/lessons/{second}/")))
        .bearer_auth(&tutor)
        .json(&json!({ "title": "Second, renamed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn listing_filters_on_publication_state() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    let (_, tutor) = sign_up(&client, &srv, "curator", "instructor").await;
    let (_, student) = sign_up(&client, &srv, "browser", "student").await;

    let draft = create_course(&client, &srv, &tutor, "Draft").await;
    let live = create_course(&client, &srv, &tutor, "Live").await;
    create_lesson(&client, &srv, &tutor, &live, "Intro").await;
    let res = client
        .post(srv.url(&format!("/courses/{live}/publish/")))
        .bearer_auth(&tutor)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url("/courses/?is_published=false"))
        .bearer_auth(&tutor)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let listed: Value = res.json().await.unwrap();
    let ids: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![draft.as_str()]);

    let listed: Value = client
        .get(srv.url("/courses/?is_published=true"))
        .bearer_auth(&tutor)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"].as_str().unwrap(), live);

    // Students never see drafts, filtered or not.
    let listed: Value = client
        .get(srv.url("/courses/?is_published=false"))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.as_array().unwrap().is_empty());

    // Editing the live course keeps it published.
    let res = client
        .patch(srv.url(&format!("/courses/{live}/")))
        .bearer_auth(&tutor)
        .json(&json!({ "title": "Live, revised" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["is_published"], true);
}

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use mesh_api::auth::create_token;
use mesh_api::{AppState, AppStateInner, router};
use mesh_db::Database;
use mesh_db::models::NewUser;
use mesh_gateway::ConnectionRegistry;
use mesh_gateway::dispatcher::Dispatcher;
use mesh_types::events::GatewayEvent;
use mesh_types::models::NotificationKind;

const SECRET: &str = "test-secret";

struct TestApp {
    app: Router,
    state: AppState,
    dispatcher: Dispatcher,
}

struct TestUser {
    id: Uuid,
    token: String,
}

impl TestApp {
    fn new() -> Self {
        let dispatcher = Dispatcher::new();
        let state = AppStateInner::new(
            Database::open_in_memory().unwrap(),
            SECRET.to_string(),
            Arc::new(dispatcher.clone()),
        );
        Self {
            app: router(state.clone()),
            state,
            dispatcher,
        }
    }

    /// Insert a user directly; password hashing is exercised by the
    /// register/login test only.
    fn user(&self, username: &str) -> TestUser {
        let id = Uuid::new_v4();
        self.state
            .db
            .create_user(&NewUser {
                id: &id.to_string(),
                username,
                email: &format!("{}@example.com", username),
                password_hash: "unused",
                avatar: None,
            })
            .unwrap();
        TestUser {
            id,
            token: create_token(SECRET, id, username).unwrap(),
        }
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        user: Option<&TestUser>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", user.token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn get(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(user), None).await
    }

    async fn post(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(user), Some(body)).await
    }

    async fn create_post(&self, user: &TestUser, content: &str) -> String {
        let (status, body) = self.post("/api/posts", user, json!({ "content": content })).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    async fn notification_kinds(&self, user: &TestUser) -> Vec<String> {
        let (status, body) = self.get("/api/notifications", user).await;
        assert_eq!(status, StatusCode::OK);
        let mut kinds: Vec<String> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["kind"].as_str().unwrap().to_string())
            .collect();
        kinds.sort();
        kinds
    }
}

#[tokio::test]
async fn liked_post_shows_in_follower_feed() {
    let t = TestApp::new();
    let alice = t.user("alice");
    let bob = t.user("bob");
    let carol = t.user("carol");

    let post_id = t.create_post(&alice, "hello world").await;

    let (status, body) = t.post(&format!("/api/posts/{}/like", post_id), &bob, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["liked"], true);
    assert_eq!(body["like_count"], 1);

    for target in [&alice, &bob] {
        let (status, _) = t.post(&format!("/api/user/{}/follow", target.id), &carol, json!({})).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, feed) = t.get("/api/posts/feed?page=1&limit=10&type=following", &carol).await;
    assert_eq!(status, StatusCode::OK);
    let feed = feed.as_array().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["id"], post_id.as_str());
    assert_eq!(feed[0]["like_count"], 1);
    assert_eq!(feed[0]["is_following"], true);
    assert_eq!(feed[0]["liked_by_viewer"], false);
    assert_eq!(feed[0]["author"]["username"], "alice");

    let (_, trending) = t.get("/api/posts/feed?type=trending", &carol).await;
    assert_eq!(trending[0]["trending"], true);
    assert_eq!(trending[0]["trending_score"], 1);

    assert_eq!(t.notification_kinds(&alice).await, vec!["follow", "like"]);
    assert_eq!(t.notification_kinds(&bob).await, vec!["follow"]);
}

#[tokio::test]
async fn unlike_does_not_notify_again() {
    let t = TestApp::new();
    let alice = t.user("alice");
    let bob = t.user("bob");
    let post_id = t.create_post(&alice, "post").await;
    let uri = format!("/api/posts/{}/like", post_id);

    t.post(&uri, &bob, json!({})).await;
    let (_, body) = t.post(&uri, &bob, json!({})).await;
    assert_eq!(body["liked"], false);
    assert_eq!(body["like_count"], 0);

    // Liking your own post is silent too.
    t.post(&uri, &alice, json!({})).await;
    assert_eq!(t.notification_kinds(&alice).await, vec!["like"]);
}

#[tokio::test]
async fn follow_then_unfollow_restores_counts() {
    let t = TestApp::new();
    let alice = t.user("alice");
    let bob = t.user("bob");
    let follow = format!("/api/user/{}/follow", alice.id);

    let (_, body) = t.post(&follow, &bob, json!({})).await;
    assert_eq!(body["following"], true);
    assert_eq!(body["follower_count"], 1);

    let (_, profile) = t.get(&format!("/api/user/{}", alice.id), &bob).await;
    assert_eq!(profile["is_following"], true);
    let (_, followers) = t.get(&format!("/api/user/{}/followers", alice.id), &bob).await;
    assert_eq!(followers[0]["username"], "bob");
    let (_, following) = t.get(&format!("/api/user/{}/following", bob.id), &bob).await;
    assert_eq!(following[0]["username"], "alice");

    let (_, body) = t.post(&follow, &bob, json!({})).await;
    assert_eq!(body["following"], false);
    assert_eq!(body["follower_count"], 0);

    let (_, alice_profile) = t.get(&format!("/api/user/{}", alice.id), &bob).await;
    assert_eq!(alice_profile["is_following"], false);
    assert_eq!(alice_profile["follower_count"], 0);
    assert_eq!(alice_profile["following_count"], 0);
    let (_, bob_profile) = t.get("/api/user/me", &bob).await;
    assert_eq!(bob_profile["follower_count"], 0);
    assert_eq!(bob_profile["following_count"], 0);

    // Only the first follow produced a notification.
    assert_eq!(t.notification_kinds(&alice).await, vec!["follow"]);
}

#[tokio::test]
async fn self_follow_is_rejected() {
    let t = TestApp::new();
    let alice = t.user("alice");
    let (status, body) = t.post(&format!("/api/user/{}/follow", alice.id), &alice, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn comment_thread_nests_and_notifies_each_user_once() {
    let t = TestApp::new();
    let alice = t.user("alice");
    let bob = t.user("bob");
    let carol = t.user("carol");
    let post_id = t.create_post(&alice, "thread").await;
    let comments = format!("/api/posts/{}/comments", post_id);

    let (status, top) = t.post(&comments, &bob, json!({ "text": "first! @carol look" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let top_id = top["id"].as_str().unwrap().to_string();

    let (status, reply) = t
        .post(
            &comments,
            &carol,
            json!({ "text": "@bob @alice thanks", "parent_comment": top_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let reply_id = reply["id"].as_str().unwrap().to_string();

    let (status, _) = t
        .post(&comments, &alice, json!({ "text": "deep", "parent_comment": reply_id }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, tree) = t.get(&comments, &bob).await;
    assert_eq!(status, StatusCode::OK);
    let tree = tree.as_array().unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0]["id"], top_id.as_str());
    assert_eq!(tree[0]["replies"][0]["id"], reply_id.as_str());
    assert_eq!(tree[0]["replies"][0]["replies"][0]["text"], "deep");

    // alice: two comments on her post; her mention in carol's reply is folded in.
    assert_eq!(t.notification_kinds(&alice).await, vec!["comment", "comment"]);
    // bob: carol replied to him, and alice replied to carol (not to bob).
    assert_eq!(t.notification_kinds(&bob).await, vec!["reply"]);
    // carol: mentioned by bob, replied to by alice. Alice is the post author,
    // so carol still gets the reply.
    assert_eq!(t.notification_kinds(&carol).await, vec!["mention", "reply"]);

    let (_, post) = t.get(&format!("/api/posts/{}", post_id), &bob).await;
    assert_eq!(post["comment_count"], 3);
}

#[tokio::test]
async fn comment_validation() {
    let t = TestApp::new();
    let alice = t.user("alice");
    let post_id = t.create_post(&alice, "a").await;
    let other_post = t.create_post(&alice, "b").await;

    let (status, _) = t
        .post(&format!("/api/posts/{}/comments", post_id), &alice, json!({ "text": "   " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .post(&format!("/api/posts/{}/comments", Uuid::new_v4()), &alice, json!({ "text": "x" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, foreign) = t
        .post(&format!("/api/posts/{}/comments", other_post), &alice, json!({ "text": "x" }))
        .await;
    let (status, _) = t
        .post(
            &format!("/api/posts/{}/comments", post_id),
            &alice,
            json!({ "text": "x", "parent_comment": foreign["id"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn repost_counts_once_and_notifies_original_author() {
    let t = TestApp::new();
    let alice = t.user("alice");
    let bob = t.user("bob");
    let post_id = t.create_post(&alice, "original").await;
    let uri = format!("/api/posts/{}/repost", post_id);

    let (status, repost) = t.post(&uri, &bob, json!({ "quote": "so true" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(repost["content"], "so true");
    assert_eq!(repost["repost"]["id"], post_id.as_str());
    assert_eq!(repost["repost"]["author"]["username"], "alice");

    let (status, _) = t.post(&uri, &bob, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, original) = t.get(&format!("/api/posts/{}", post_id), &alice).await;
    assert_eq!(original["repost_count"], 1);

    let (_, by_bob) = t.get(&format!("/api/posts/user/{}", bob.id), &alice).await;
    assert_eq!(by_bob.as_array().unwrap().len(), 1);

    assert_eq!(t.notification_kinds(&alice).await, vec!["repost"]);
}

#[tokio::test]
async fn mark_read_is_idempotent() {
    let t = TestApp::new();
    let alice = t.user("alice");
    let bob = t.user("bob");
    t.post(&format!("/api/user/{}/follow", alice.id), &bob, json!({})).await;

    let (_, list) = t.get("/api/notifications", &alice).await;
    let id = list[0]["id"].as_str().unwrap().to_string();
    assert_eq!(list[0]["is_read"], false);
    assert_eq!(list[0]["message"], "bob started following you");

    let uri = format!("/api/notifications/{}/read", id);
    let (status, first) = t.call(Method::PATCH, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["is_read"], true);

    let (status, second) = t.call(Method::PATCH, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second, first);

    let (status, _) = t.call(Method::PATCH, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn connected_recipient_gets_live_push() {
    let t = TestApp::new();
    let alice = t.user("alice");
    let bob = t.user("bob");
    let (_conn, mut rx) = t.dispatcher.register(alice.id).await;

    t.post(&format!("/api/user/{}/follow", alice.id), &bob, json!({})).await;

    match rx.try_recv() {
        Ok(GatewayEvent::Notification(n)) => {
            assert_eq!(n.kind, NotificationKind::Follow);
            assert_eq!(n.recipient_id, alice.id);
            assert_eq!(n.sender.id, bob.id);
        }
        other => panic!("expected a notification push, got {:?}", other),
    }

    // The stored copy is the same notification.
    let (_, list) = t.get("/api/notifications", &alice).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let t = TestApp::new();
    let (status, _) = t.call(Method::GET, "/api/posts/feed", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_post_is_rejected() {
    let t = TestApp::new();
    let alice = t.user("alice");
    let (status, body) = t.post("/api/posts", &alice, json!({ "content": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Content or image is required");

    let (status, body) = t.post("/api/posts", &alice, json!({ "image_url": "https://img/1.png" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["content"], "");
}

#[tokio::test]
async fn search_finds_users_and_posts() {
    let t = TestApp::new();
    let alice = t.user("alice");
    t.create_post(&alice, "Learning Rust today").await;

    let (status, body) = t.get("/api/posts/search?q=rust", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["posts"].as_array().unwrap().len(), 1);
    assert!(body["users"].as_array().unwrap().is_empty());

    let (_, body) = t.get("/api/posts/search?q=ALI", &alice).await;
    assert_eq!(body["users"][0]["username"], "alice");
    assert_eq!(body["posts"].as_array().unwrap().len(), 1);

    let (status, _) = t.get("/api/posts/search?q=", &alice).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_login_and_update_profile() {
    let t = TestApp::new();

    let (status, body) = t
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "dave", "email": "Dave@Example.com", "password": "hunter2hunter2" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = body["user_id"].as_str().unwrap().to_string();

    let (status, _) = t
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "dave2", "email": "dave@example.com", "password": "hunter2hunter2" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "dave@example.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, login) = t
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "DAVE@example.com", "password": "hunter2hunter2" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["user_id"], user_id.as_str());

    let dave = TestUser {
        id: user_id.parse().unwrap(),
        token: login["token"].as_str().unwrap().to_string(),
    };
    let (status, me) = t
        .call(Method::PUT, "/api/user/me", Some(&dave), Some(json!({ "avatar": "https://img/dave.png" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "dave");
    assert_eq!(me["email"], "dave@example.com");
    assert_eq!(me["avatar"], "https://img/dave.png");
    assert_eq!(me["is_verified"], false);
}

#[tokio::test]
async fn feed_query_is_read_leniently() {
    let t = TestApp::new();
    let alice = t.user("alice");
    let post_id = t.create_post(&alice, "mine").await;

    for uri in [
        "/api/posts/feed?page=-1",
        "/api/posts/feed?page=abc&limit=-3",
        "/api/posts/feed?type=latest",
        "/api/posts/feed?page=&limit=",
    ] {
        let (status, feed) = t.get(uri, &alice).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(feed[0]["id"], post_id.as_str(), "{}", uri);
        assert_eq!(feed[0]["trending"], false, "{}", uri);
    }

    let (status, posts) = t.get(&format!("/api/posts/user/{}?page=-2", alice.id), &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(posts.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_bodies_use_the_error_envelope() {
    let t = TestApp::new();
    let alice = t.user("alice");
    let post_id = t.create_post(&alice, "post").await;

    let (status, body) = t.post(&format!("/api/posts/{}/comments", post_id), &alice, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("text"));

    let (status, body) = t.post("/api/posts", &alice, json!({ "content": 42 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, body) = t.get("/api/posts/search", &alice).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn reply_depth_is_capped() {
    use mesh_api::comments::MAX_REPLY_DEPTH;

    let t = TestApp::new();
    let alice = t.user("alice");
    let post_id = t.create_post(&alice, "thread").await;
    let uri = format!("/api/posts/{}/comments", post_id);

    let mut parent: Option<String> = None;
    for _ in 0..MAX_REPLY_DEPTH {
        let (status, body) = t
            .post(&uri, &alice, json!({ "text": "deeper", "parent_comment": parent }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        parent = body["id"].as_str().map(str::to_string);
    }

    let (status, body) = t
        .post(&uri, &alice, json!({ "text": "too deep", "parent_comment": parent }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, tree) = t.get(&uri, &alice).await;
    assert_eq!(status, StatusCode::OK);
    let mut depth = 1;
    let mut node = &tree[0];
    while let Some(child) = node["replies"].get(0) {
        node = child;
        depth += 1;
    }
    assert_eq!(depth, MAX_REPLY_DEPTH);
}

#[tokio::test]
async fn comment_with_many_mentions_is_still_created() {
    let t = TestApp::new();
    let alice = t.user("alice");
    let bob = t.user("bob");
    let post_id = t.create_post(&alice, "post").await;

    let mut text = String::from("@bob ");
    for i in 0..40_000 {
        text.push_str(&format!("@ghost{} ", i));
    }

    let (status, body) = t
        .post(&format!("/api/posts/{}/comments", post_id), &bob, json!({ "text": text }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].is_string());

    let (_, tree) = t.get(&format!("/api/posts/{}/comments", post_id), &alice).await;
    assert_eq!(tree.as_array().unwrap().len(), 1);
    assert_eq!(t.notification_kinds(&alice).await, vec!["comment"]);
}

#[tokio::test]
async fn concurrent_duplicate_registration_is_a_conflict() {
    let t = TestApp::new();
    let register = |name: &'static str| {
        t.call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": name, "email": "same@example.com", "password": "hunter2hunter2" })),
        )
    };

    let ((first, _), (second, _)) = tokio::join!(register("erin"), register("frank"));
    let mut statuses = vec![first, second];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);
}

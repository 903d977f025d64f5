//! The client API surface against a live server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use speakspace_client::identity::{HttpIdentityProvider, IdentityError, IdentityProvider};
use speakspace_client::realtime::{RealtimeChannel, ReconnectConfig, TungsteniteConnector};
use speakspace_client::ApiClient;
use speakspace_server::{api_router, socket_router, AppState};
use speakspace_shared::{
    ApiError, CreateFeedbackRequest, CreateSessionRequest, CriterionRating, LoginRequest,
    OutgoingMessage, RegisterRequest, SessionStatus, User, UserRole,
};

async fn serve(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn spawn_api() -> SocketAddr {
    serve(api_router(AppState::new())).await
}

async fn register(addr: SocketAddr, name: &str, role: &str) -> User {
    HttpIdentityProvider::new(format!("http://{addr}"))
        .register(&RegisterRequest {
            name: name.to_string(),
            email: format!("{}@x.com", name.to_lowercase()),
            password: "pw".to_string(),
            role: role.to_string(),
        })
        .await
        .unwrap()
}

fn client(addr: SocketAddr, user: &User) -> ApiClient {
    ApiClient::new()
        .with_base_url(format!("http://{addr}"))
        .as_user(user.id.clone())
}

fn status_of(err: ApiError) -> u16 {
    match err {
        ApiError::Http { status, .. } => status,
        other => panic!("expected an HTTP error, got {other:?}"),
    }
}

fn registration(email: &str, role: &str) -> RegisterRequest {
    RegisterRequest {
        name: "Ana".to_string(),
        email: email.to_string(),
        password: "pw".to_string(),
        role: role.to_string(),
    }
}

#[tokio::test]
async fn test_health_check() {
    let addr = spawn_api().await;
    let health = ApiClient::new()
        .with_base_url(format!("http://{addr}"))
        .health()
        .await
        .unwrap();
    assert_eq!(health.message, "Backend is connected!");
}

#[tokio::test]
async fn test_register_and_login_over_http() {
    let addr = spawn_api().await;
    let provider = HttpIdentityProvider::new(format!("http://{addr}"));

    let user = provider
        .register(&registration("ana@x.com", "evaluator"))
        .await
        .unwrap();
    assert_eq!(user.role, UserRole::Evaluator);

    let again = provider
        .register(&registration("ana@x.com", "participant"))
        .await;
    assert!(matches!(again, Err(IdentityError::EmailTaken(_))));

    let bad_role = provider.register(&registration("bo@x.com", "admin")).await;
    assert!(matches!(bad_role, Err(IdentityError::InvalidRole(r)) if r == "admin"));

    let login = provider
        .login(&LoginRequest {
            email: "ana@x.com".to_string(),
            password: "pw".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(login, user);

    let wrong = provider
        .login(&LoginRequest {
            email: "ana@x.com".to_string(),
            password: "nope".to_string(),
        })
        .await;
    assert!(matches!(wrong, Err(IdentityError::InvalidCredentials)));
}

#[tokio::test]
async fn test_session_catalog_and_feedback() {
    let addr = spawn_api().await;
    let moderator = register(addr, "Mona", "moderator").await;
    let first = register(addr, "Pia", "participant").await;
    let second = register(addr, "Raj", "participant").await;
    let evaluator = register(addr, "Eli", "evaluator").await;

    let session = client(addr, &moderator)
        .create_session(&CreateSessionRequest {
            title: "Mock Interview: Software Engineering".to_string(),
            description: "Practice tech interview questions".to_string(),
            max_participants: Some(1),
            start_time: None,
            end_time: None,
        })
        .await
        .unwrap();

    let joined = client(addr, &first).join_session(&session.id).await.unwrap();
    assert_eq!(joined.participants, vec![first.id.clone()]);
    let full = client(addr, &second).join_session(&session.id).await.unwrap_err();
    assert_eq!(status_of(full.clone()), 409);
    assert_eq!(full.user_message(), "session is full (1 participants)");

    let pending = client(addr, &second)
        .sessions(Some(SessionStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);

    let active = client(addr, &moderator)
        .set_session_status(&session.id, SessionStatus::Active)
        .await
        .unwrap();
    assert_eq!(active.status, SessionStatus::Active);
    let left = client(addr, &first).leave_session(&session.id).await.unwrap_err();
    assert_eq!(status_of(left), 400);

    let evaluator_api = client(addr, &evaluator);
    let categories = evaluator_api.feedback_categories().await.unwrap();
    let criterion = &categories[0].criteria[0];
    let feedback = evaluator_api
        .submit_feedback(&CreateFeedbackRequest {
            session_id: session.id.clone(),
            recipient_id: first.id.clone(),
            ratings: vec![CriterionRating {
                criterion_id: criterion.id.clone(),
                rating: 4,
                comment: "Clear answers".to_string(),
            }],
        })
        .await
        .unwrap();

    assert_eq!(evaluator_api.feedback_given().await.unwrap(), vec![feedback.clone()]);
    assert_eq!(
        client(addr, &first).feedback_received().await.unwrap(),
        vec![feedback]
    );
    assert!(client(addr, &second).feedback_received().await.unwrap().is_empty());
    assert_eq!(
        client(addr, &second).session(&session.id).await.unwrap().status,
        SessionStatus::Active
    );
}

#[tokio::test]
async fn test_catalog_requires_known_user() {
    let addr = spawn_api().await;
    let anonymous = ApiClient::new().with_base_url(format!("http://{addr}"));
    assert_eq!(status_of(anonymous.sessions(None).await.unwrap_err()), 401);
    assert_eq!(
        status_of(anonymous.as_user("999").sessions(None).await.unwrap_err()),
        401
    );
}

#[tokio::test]
async fn test_room_history_follows_broker_chat() {
    let state = AppState::new();
    let api_addr = serve(api_router(state.clone())).await;
    let socket_addr = serve(socket_router(state)).await;
    let user = register(api_addr, "Pia", "participant").await;

    let channel = RealtimeChannel::with_connector(
        format!("ws://{socket_addr}"),
        ReconnectConfig::fixed(0, Duration::from_millis(10)),
        Arc::new(TungsteniteConnector),
    );
    let (tx, mut echoed) = tokio::sync::mpsc::unbounded_channel();
    let sub = channel.on_message(move |m| tx.send(m).unwrap());

    channel.connect(user.id.clone(), "lobby");
    let mut state_rx = channel.watch_state();
    tokio::time::timeout(Duration::from_secs(5), state_rx.wait_for(|s| s.is_connected()))
        .await
        .expect("connected in time")
        .unwrap();
    channel.join_session("lobby");
    channel.send_message(OutgoingMessage::text("hello lobby"));

    // The sender's own echo means the broker has recorded it
    let echo = tokio::time::timeout(Duration::from_secs(5), echoed.recv())
        .await
        .expect("echo in time")
        .unwrap();

    let history = client(api_addr, &user).room_messages("lobby").await.unwrap();
    assert_eq!(history, vec![echo]);

    sub.unsubscribe();
    channel.disconnect();
}

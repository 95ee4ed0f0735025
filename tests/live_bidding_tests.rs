use async_trait::async_trait;
use bidspace_live::api::{ApiConfig, AuctionApi};
use bidspace_live::auction::events::{ControlMessage, LiveBidMessage};
use bidspace_live::bidding::commands::BidCoordinator;
use bidspace_live::bidding::model::{Auction, ProductDetails, Viewer};
use bidspace_live::connection::{
    ConnectionConfig, ConnectionManager, ConnectionState, ControlChannel, StateWatcher,
};
use bidspace_live::floor::FloorPolicy;
use bidspace_live::listener::ListenerRegistry;
use bidspace_live::room::RoomTracker;
use bidspace_live::session::{open_session, AuctionSession, SessionHandle};
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 트레이싱 초기화
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .without_time()
        .with_target(false)
        .with_test_writer()
        .try_init();
}

// region:    --- Test Doubles

/// 가짜 컨트롤 채널: 내보낸 컨트롤 메시지를 기록만 한다
struct FakeChannel {
    state: Mutex<ConnectionState>,
    sent: Mutex<Vec<ControlMessage>>,
    watchers: Mutex<Vec<StateWatcher>>,
}

impl FakeChannel {
    fn with_state(state: ConnectionState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            sent: Mutex::new(Vec::new()),
            watchers: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<ControlMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// 상태를 바꾸고 관찰자에게 알린다 (연결 끊김/재연결 시나리오용)
    fn set_state(&self, next: ConnectionState) {
        *self.state.lock().unwrap() = next;
        let snapshot: Vec<StateWatcher> = self.watchers.lock().unwrap().clone();
        for watcher in snapshot {
            watcher(next);
        }
    }
}

#[async_trait]
impl ControlChannel for FakeChannel {
    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    async fn send_control(&self, message: ControlMessage) -> Result<(), String> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    fn watch_state(&self, watcher: StateWatcher) {
        self.watchers.lock().unwrap().push(watcher);
    }
}

/// 테스트용 경매 스냅샷
fn test_details(auction_id: i64, base_price: i64, current_price: Option<i64>) -> ProductDetails {
    ProductDetails {
        title: "입찰 테스트 아이템".to_string(),
        description: "라이브 입찰 기능 테스트를 위한 아이템입니다.".to_string(),
        auction: Auction {
            id: auction_id,
            base_price,
            current_price,
            end_time: Utc::now() + Duration::hours(2),
            sold: false,
            bids: Vec::new(),
        },
    }
}

fn test_viewer() -> Viewer {
    Viewer {
        user_id: 7,
        username: "viewer".to_string(),
    }
}

fn live_bid(auction_id: i64, user_id: i64, amount: i64) -> LiveBidMessage {
    LiveBidMessage {
        user_id,
        username: format!("bidder-{}", user_id),
        bid_amount: amount,
        timestamp: Utc::now(),
        auction_id,
        current_price: amount,
    }
}

/// 권위 API 모의 서버
/// 입찰 쓰기 횟수를 세고 설정된 응답을 돌려준다.
async fn spawn_api(
    details: ProductDetails,
    bid_response: serde_json::Value,
    bid_hits: Arc<AtomicUsize>,
    delay_millis: u64,
) -> String {
    use axum::extract::Json;
    use axum::routing::{get, post};
    use axum::Router;

    let details = Arc::new(details);
    let bid_response = Arc::new(bid_response);

    let app = Router::new()
        .route(
            "/auction/bid",
            post({
                let bid_response = Arc::clone(&bid_response);
                let bid_hits = Arc::clone(&bid_hits);
                move |_body: Json<serde_json::Value>| {
                    let bid_response = Arc::clone(&bid_response);
                    let bid_hits = Arc::clone(&bid_hits);
                    async move {
                        if delay_millis > 0 {
                            tokio::time::sleep(tokio::time::Duration::from_millis(delay_millis))
                                .await;
                        }
                        bid_hits.fetch_add(1, Ordering::SeqCst);
                        Json((*bid_response).clone())
                    }
                }
            }),
        )
        .route(
            "/product/details/:id",
            get({
                let details = Arc::clone(&details);
                move || {
                    let details = Arc::clone(&details);
                    async move { Json(serde_json::to_value(&*details).unwrap()) }
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn accepted_response(auction_id: i64, current_price: i64) -> serde_json::Value {
    json!({
        "success": true,
        "data": {
            "auction": {
                "id": auction_id,
                "basePrice": 60,
                "currentPrice": current_price,
                "endTime": Utc::now() + Duration::hours(2),
                "sold": false,
                "bids": []
            }
        }
    })
}

fn api_client(base_url: String) -> Arc<AuctionApi> {
    AuctionApi::new(ApiConfig {
        base_url,
        token: Some("test-token".to_string()),
    })
}

/// 세션 열기 공통 헬퍼 (모의 서버 스냅샷으로 시드)
async fn open_test_session(
    api: &AuctionApi,
    registry: &Arc<ListenerRegistry>,
    channel: Arc<FakeChannel>,
    viewer: Option<Viewer>,
    product_id: i64,
) -> (SessionHandle, Arc<RoomTracker>) {
    let rooms = Arc::new(RoomTracker::new(channel));
    let handle = open_session(
        api,
        registry,
        &rooms,
        viewer,
        product_id,
        FloorPolicy::default(),
    )
    .await
    .unwrap();
    (handle, rooms)
}

// endregion: --- Test Doubles

// region:    --- Submission Tests

/// 바닥 미달 입찰은 네트워크 호출 없이 거절된다
#[tokio::test]
async fn test_under_floor_bid_rejected_without_network() {
    init_tracing();
    let hits = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_api(
        test_details(1, 100, Some(180)),
        accepted_response(1, 190),
        Arc::clone(&hits),
        0,
    )
    .await;
    let api = api_client(base_url);
    let registry = Arc::new(ListenerRegistry::new());
    let channel = FakeChannel::with_state(ConnectionState::Connected);
    let (handle, _rooms) =
        open_test_session(&api, &registry, channel, Some(test_viewer()), 1).await;

    // 다른 입찰자의 푸시 이벤트로 바닥이 191로 올라간다
    registry.dispatch(&live_bid(1, 99, 190));
    assert_eq!(handle.session().lock().unwrap().minimum_bid(), Some(191));

    // 190 제출은 클라이언트에서 바로 거절
    let coordinator = BidCoordinator::new(api);
    let error = coordinator
        .submit_bid(&handle.session(), 190)
        .await
        .unwrap_err();
    assert_eq!(error["code"], "LOW_BID");
    assert_eq!(error["floor"], 191);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

/// 시작가 60, 입찰 없음: 바닥 60, 100 제출 성공 후 바닥 101
#[tokio::test]
async fn test_base_price_seeding_and_accepted_bid() {
    init_tracing();
    let hits = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_api(
        test_details(1, 60, None),
        accepted_response(1, 100),
        Arc::clone(&hits),
        0,
    )
    .await;
    let api = api_client(base_url);
    let registry = Arc::new(ListenerRegistry::new());
    let channel = FakeChannel::with_state(ConnectionState::Connected);
    let (handle, _rooms) =
        open_test_session(&api, &registry, channel, Some(test_viewer()), 1).await;

    let session = handle.session();
    assert_eq!(session.lock().unwrap().minimum_bid(), Some(60));

    let coordinator = BidCoordinator::new(api);
    coordinator.submit_bid(&session, 100).await.unwrap();

    let session = session.lock().unwrap();
    // 낙관적 항목이 피드 맨 앞에 "나"로 표시된다
    let first = &session.feed().entries()[0];
    assert!(first.mine);
    assert_eq!(first.amount, 100);
    assert_eq!(session.minimum_bid(), Some(101));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

/// 본인 입찰의 서버 에코는 피드에 중복 표시되지 않는다
#[tokio::test]
async fn test_self_echo_suppressed() {
    init_tracing();
    let hits = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_api(
        test_details(1, 60, None),
        accepted_response(1, 100),
        Arc::clone(&hits),
        0,
    )
    .await;
    let api = api_client(base_url);
    let registry = Arc::new(ListenerRegistry::new());
    let channel = FakeChannel::with_state(ConnectionState::Connected);
    let (handle, _rooms) =
        open_test_session(&api, &registry, channel, Some(test_viewer()), 1).await;

    let coordinator = BidCoordinator::new(api);
    coordinator.submit_bid(&handle.session(), 100).await.unwrap();

    // 같은 입찰이 리스너로 다시 도착 (user_id 가 뷰어와 동일)
    registry.dispatch(&live_bid(1, 7, 100));

    let session = handle.session();
    let session = session.lock().unwrap();
    assert_eq!(session.feed().len(), 1);
    assert!(session.feed().entries()[0].mine);
    // 에코는 억제돼도 바닥 계산에는 반영된다
    assert_eq!(session.minimum_bid(), Some(101));
}

/// 사전 조건 실패: 시드 전 세션, 비로그인 사용자
#[tokio::test]
async fn test_precondition_errors() {
    init_tracing();
    let hits = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_api(
        test_details(1, 60, None),
        accepted_response(1, 100),
        Arc::clone(&hits),
        0,
    )
    .await;
    let api = api_client(base_url);

    // 경매 정보가 아직 없는 세션
    let unseeded = Arc::new(Mutex::new(AuctionSession::new(Some(test_viewer()))));
    let coordinator = BidCoordinator::new(Arc::clone(&api));
    let error = coordinator.submit_bid(&unseeded, 100).await.unwrap_err();
    assert_eq!(error["code"], "MISSING_AUCTION");

    // 로그인하지 않은 뷰어
    let registry = Arc::new(ListenerRegistry::new());
    let channel = FakeChannel::with_state(ConnectionState::Connected);
    let (handle, _rooms) = open_test_session(&api, &registry, channel, None, 1).await;
    let error = coordinator
        .submit_bid(&handle.session(), 100)
        .await
        .unwrap_err();
    assert_eq!(error["code"], "NOT_LOGGED_IN");

    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

/// 서버 거절 메시지는 그대로 표시되고 3초 후 자동 해제된다
#[tokio::test]
async fn test_rejection_message_verbatim_and_auto_clear() {
    init_tracing();
    let hits = Arc::new(AtomicUsize::new(0));
    let rejection = json!({
        "success": false,
        "message": "이미 더 높은 입찰이 있습니다."
    });
    let base_url = spawn_api(
        test_details(1, 60, Some(100)),
        rejection,
        Arc::clone(&hits),
        0,
    )
    .await;
    let api = api_client(base_url);
    let registry = Arc::new(ListenerRegistry::new());
    let channel = FakeChannel::with_state(ConnectionState::Connected);
    let (handle, _rooms) =
        open_test_session(&api, &registry, channel, Some(test_viewer()), 1).await;

    let coordinator = BidCoordinator::new(api);
    let error = coordinator
        .submit_bid(&handle.session(), 150)
        .await
        .unwrap_err();
    assert_eq!(error["error"], "이미 더 높은 입찰이 있습니다.");
    assert_eq!(error["code"], "REJECTED");
    assert!(coordinator.last_error().is_some());

    // 자동 해제 대기
    tokio::time::sleep(tokio::time::Duration::from_millis(3500)).await;
    assert!(coordinator.last_error().is_none());

    // 해제 후 재제출은 막히지 않는다
    assert!(!coordinator.is_in_flight());
}

/// 진행 중인 제출이 있으면 같은 코디네이터의 두 번째 제출은 거절된다
#[tokio::test]
async fn test_in_flight_guard() {
    init_tracing();
    let hits = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_api(
        test_details(1, 60, None),
        accepted_response(1, 100),
        Arc::clone(&hits),
        300,
    )
    .await;
    let api = api_client(base_url);
    let registry = Arc::new(ListenerRegistry::new());
    let channel = FakeChannel::with_state(ConnectionState::Connected);
    let (handle, _rooms) =
        open_test_session(&api, &registry, channel, Some(test_viewer()), 1).await;

    let coordinator = Arc::new(BidCoordinator::new(api));
    let session = handle.session();

    let first = {
        let coordinator = Arc::clone(&coordinator);
        let session = Arc::clone(&session);
        tokio::spawn(async move { coordinator.submit_bid(&session, 100).await })
    };
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    let second = coordinator.submit_bid(&session, 110).await;
    assert_eq!(second.unwrap_err()["code"], "IN_FLIGHT");

    first.await.unwrap().unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

// endregion: --- Submission Tests

// region:    --- Room Tests

/// 참여한 적 없는 방의 퇴장은 무해하다
#[tokio::test]
async fn test_leave_never_joined_room() {
    init_tracing();
    let channel = FakeChannel::with_state(ConnectionState::Connected);
    let rooms = RoomTracker::new(channel.clone());

    rooms.leave_room(99).await.unwrap();
    assert!(channel.sent().is_empty());
}

/// 같은 방의 뷰 N개는 참여 1회, 퇴장 1회만 만든다
#[tokio::test]
async fn test_room_reference_counting() {
    init_tracing();
    let channel = FakeChannel::with_state(ConnectionState::Connected);
    let rooms = RoomTracker::new(channel.clone());

    rooms.join_room(1).await.unwrap();
    rooms.join_room(1).await.unwrap();
    assert_eq!(rooms.member_count(1), 2);
    assert_eq!(
        channel.sent(),
        vec![ControlMessage::JoinAuctionRoom { auction_id: 1 }]
    );

    // 첫 번째 뷰 언마운트: 아직 퇴장 메시지 없음
    rooms.leave_room(1).await.unwrap();
    assert_eq!(rooms.member_count(1), 1);
    assert_eq!(channel.sent().len(), 1);

    // 마지막 뷰 언마운트: 이제 퇴장
    rooms.leave_room(1).await.unwrap();
    assert_eq!(rooms.member_count(1), 0);
    assert_eq!(
        channel.sent(),
        vec![
            ControlMessage::JoinAuctionRoom { auction_id: 1 },
            ControlMessage::LeaveAuction { auction_id: 1 },
        ]
    );
}

/// 연결이 끊기면 방 카운트도 버려져 재연결 후의 참여가 다시 나간다
#[tokio::test]
async fn test_rejoin_after_reconnect() {
    init_tracing();
    let channel = FakeChannel::with_state(ConnectionState::Connected);
    let rooms = RoomTracker::new(channel.clone());

    rooms.join_room(1).await.unwrap();
    assert_eq!(
        channel.sent(),
        vec![ControlMessage::JoinAuctionRoom { auction_id: 1 }]
    );

    // 연결 끊김: 서버 쪽 멤버십과 함께 카운트도 사라진다
    channel.set_state(ConnectionState::Disconnected);
    assert_eq!(rooms.member_count(1), 0);

    // 재연결 후의 참여는 0→1 전이라서 다시 내보내야 한다
    channel.set_state(ConnectionState::Connected);
    rooms.join_room(1).await.unwrap();
    assert_eq!(
        channel.sent(),
        vec![
            ControlMessage::JoinAuctionRoom { auction_id: 1 },
            ControlMessage::JoinAuctionRoom { auction_id: 1 },
        ]
    );
}

/// 연결이 없으면 참여는 no-op 이지만 제출은 HTTP 로 계속 간다
#[tokio::test]
async fn test_join_gated_but_submission_is_not() {
    init_tracing();
    let hits = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_api(
        test_details(1, 60, None),
        accepted_response(1, 100),
        Arc::clone(&hits),
        0,
    )
    .await;
    let api = api_client(base_url);
    let registry = Arc::new(ListenerRegistry::new());
    let channel = FakeChannel::with_state(ConnectionState::Disconnected);
    let (handle, _rooms) = open_test_session(
        &api,
        &registry,
        channel.clone(),
        Some(test_viewer()),
        1,
    )
    .await;

    // 참여 컨트롤 메시지는 내보내지 않았다
    assert!(channel.sent().is_empty());

    // 마지막으로 알려진 권위 가격만으로 제출은 성공한다
    let coordinator = BidCoordinator::new(api);
    coordinator.submit_bid(&handle.session(), 100).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

// endregion: --- Room Tests

// region:    --- Connection Tests

/// 자격 증명이 없으면 연결하지 않는다 (치명적이지 않음)
#[tokio::test]
async fn test_connect_refused_without_credential() {
    init_tracing();
    let registry = Arc::new(ListenerRegistry::new());
    let manager = ConnectionManager::new(
        ConnectionConfig {
            ws_url: "ws://127.0.0.1:1/live".to_string(),
        },
        registry,
    );

    manager.connect(None).await.unwrap();
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

/// 연결 실패 시 Disconnected 로 돌아온다, 자동 재시도는 없다
#[tokio::test]
async fn test_connect_failure_returns_to_disconnected() {
    init_tracing();
    // 닫힌 포트를 확보한다
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let registry = Arc::new(ListenerRegistry::new());
    let manager = ConnectionManager::new(
        ConnectionConfig {
            ws_url: format!("ws://{}/live", addr),
        },
        registry,
    );

    assert!(manager.connect(Some("token")).await.is_err());
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

/// Error 를 거치는 전이도 관찰자에게 그대로 보인다
#[tokio::test]
async fn test_error_transition_is_observable() {
    init_tracing();
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let registry = Arc::new(ListenerRegistry::new());
    let manager = ConnectionManager::new(
        ConnectionConfig {
            ws_url: format!("ws://{}/live", addr),
        },
        registry,
    );

    let seen = Arc::new(Mutex::new(Vec::<ConnectionState>::new()));
    {
        let seen = Arc::clone(&seen);
        manager.watch_state(Arc::new(move |state| {
            seen.lock().unwrap().push(state);
        }));
    }

    assert!(manager.connect(Some("token")).await.is_err());
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Error,
            ConnectionState::Disconnected,
        ]
    );
}

/// 실제 웹소켓 왕복: 참여 메시지 송신 후 newBid 푸시 수신
#[tokio::test]
async fn test_live_push_over_websocket() {
    use futures::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    init_tracing();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // 모의 푸시 서버: 참여 메시지를 기다렸다가 newBid 하나를 내보낸다
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                if text.contains("joinAuctionRoom") {
                    break;
                }
            }
        }
        let push = json!({
            "event": "newBid",
            "data": {
                "userId": 42,
                "username": "rival",
                "bidAmount": 250,
                "timestamp": Utc::now(),
                "auctionId": 1,
                "currentPrice": 250
            }
        });
        ws.send(Message::Text(push.to_string())).await.unwrap();
        // 클라이언트가 읽을 때까지 연결을 유지한다
        while ws.next().await.is_some() {}
    });

    let registry = Arc::new(ListenerRegistry::new());
    let received = Arc::new(Mutex::new(Vec::<LiveBidMessage>::new()));
    {
        let received = Arc::clone(&received);
        registry.on_new_bid(move |message| {
            received.lock().unwrap().push(message.clone());
        });
    }

    let manager = Arc::new(ConnectionManager::new(
        ConnectionConfig {
            ws_url: format!("ws://{}/live", addr),
        },
        Arc::clone(&registry),
    ));
    manager.connect(Some("token")).await.unwrap();
    assert_eq!(manager.state(), ConnectionState::Connected);

    let rooms = RoomTracker::new(manager.clone());
    rooms.join_room(1).await.unwrap();

    // 푸시 도착 대기
    let mut waited = 0;
    loop {
        if !received.lock().unwrap().is_empty() {
            break;
        }
        waited += 50;
        assert!(waited < 3000, "newBid 푸시를 받지 못함");
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }

    let messages = received.lock().unwrap().clone();
    assert_eq!(messages[0].bid_amount, 250);
    assert_eq!(messages[0].auction_id, 1);

    manager.disconnect().await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

// endregion: --- Connection Tests

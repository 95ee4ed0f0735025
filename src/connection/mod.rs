/// 커넥션 매니저
/// 로그인 세션당 하나의 양방향 푸시 연결을 소유한다.
/// 자동 재시도 루프는 없다. 로그인 상태가 바뀔 때마다 호출자가
/// disconnect 후 connect 로 연결을 새로 만든다.
// region:    --- Imports
use crate::auction::events::{ControlMessage, LiveEvent};
use crate::listener::ListenerRegistry;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

// endregion: --- Imports

// region:    --- Connection State

/// 연결 상태 머신
/// Disconnected → Connecting → Connected → Disconnected,
/// 전송 계층 오류 시 Connected → Error → Disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

// endregion: --- Connection State

// region:    --- Control Channel Trait

/// 상태 전이 관찰자
/// 모든 전이마다 새 상태를 받는다. Error 처럼 머무르지 않는 상태도
/// 여기로는 관찰된다.
pub type StateWatcher = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// 컨트롤 메시지 송신 시임
/// 방 추적기는 이 트레이트만 보므로 테스트에서 가짜 전송으로 대체한다.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    fn state(&self) -> ConnectionState;
    async fn send_control(&self, message: ControlMessage) -> Result<(), String>;
    /// 상태 전이 관찰자 등록
    fn watch_state(&self, watcher: StateWatcher);
}

// endregion: --- Control Channel Trait

// region:    --- Connection Config

/// 푸시 전송 설정
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub ws_url: String,
}

impl ConnectionConfig {
    /// 환경 변수에서 설정을 읽는다
    pub fn from_env() -> Self {
        let ws_url = std::env::var("BIDSPACE_WS_URL")
            .unwrap_or_else(|_| "ws://localhost:4000/live".to_string());
        Self { ws_url }
    }
}

// endregion: --- Connection Config

// region:    --- Connection Manager

/// 커넥션 매니저
/// 수신 이벤트는 전부 리스너 레지스트리로 전달된다.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: Arc<RwLock<ConnectionState>>,
    watchers: Arc<Mutex<Vec<StateWatcher>>>,
    registry: Arc<ListenerRegistry>,
    send_tx: Mutex<Option<mpsc::Sender<ControlMessage>>>,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, registry: Arc<ListenerRegistry>) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            watchers: Arc::new(Mutex::new(Vec::new())),
            registry,
            send_tx: Mutex::new(None),
            shutdown_tx: Mutex::new(None),
        }
    }

    /// 리스너 레지스트리 반환
    pub fn get_registry(&self) -> Arc<ListenerRegistry> {
        Arc::clone(&self.registry)
    }

    /// 연결 수립
    /// 자격 증명이 없으면 경고만 남기고 연결하지 않는다 (치명적이지 않음,
    /// 라이브 업데이트만 없을 뿐이다).
    pub async fn connect(&self, credential: Option<&str>) -> Result<(), String> {
        let Some(token) = credential else {
            warn!(
                "{:<12} --> 자격 증명 없음: 라이브 연결을 생략합니다",
                "Connection"
            );
            return Ok(());
        };

        if self.state().is_connected() {
            warn!("{:<12} --> 이미 연결되어 있습니다", "Connection");
            return Ok(());
        }

        self.set_state(ConnectionState::Connecting);
        info!(
            "{:<12} --> 연결 시도: {}",
            "Connection", self.config.ws_url
        );

        // 베어러 토큰은 쿼리로 전달, 열린 연결 위에서의 토큰 교체는 없다
        let url = format!("{}?token={}", self.config.ws_url, token);
        let ws_stream = match connect_async(url.as_str()).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                error!("{:<12} --> 연결 실패: {}", "Connection", e);
                self.set_state(ConnectionState::Error);
                self.set_state(ConnectionState::Disconnected);
                return Err(format!("연결 실패: {}", e));
            }
        };

        let (send_tx, send_rx) = mpsc::channel::<ControlMessage>(64);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        *self.send_tx.lock().unwrap() = Some(send_tx);
        *self.shutdown_tx.lock().unwrap() = Some(shutdown_tx);

        self.set_state(ConnectionState::Connected);
        info!("{:<12} --> 연결 성공", "Connection");

        let state = Arc::clone(&self.state);
        let watchers = Arc::clone(&self.watchers);
        let registry = Arc::clone(&self.registry);
        tokio::spawn(Self::run_connection(
            ws_stream,
            send_rx,
            shutdown_rx,
            state,
            watchers,
            registry,
        ));

        Ok(())
    }

    /// 연결 해제 (명시적 로그아웃 경로)
    pub async fn disconnect(&self) {
        let shutdown_tx = self.shutdown_tx.lock().unwrap().take();
        if let Some(tx) = shutdown_tx {
            let _ = tx.send(()).await;
        }
        *self.send_tx.lock().unwrap() = None;
        self.set_state(ConnectionState::Disconnected);
        info!("{:<12} --> 연결 해제", "Connection");
    }

    fn set_state(&self, next: ConnectionState) {
        Self::transition(&self.state, &self.watchers, next);
    }

    /// 상태를 바꾸고 모든 관찰자에게 알린다
    /// 관찰자 호출은 잠금 밖에서 한다
    fn transition(
        state: &RwLock<ConnectionState>,
        watchers: &Mutex<Vec<StateWatcher>>,
        next: ConnectionState,
    ) {
        *state.write().unwrap() = next;
        let snapshot: Vec<StateWatcher> = watchers.lock().unwrap().clone();
        for watcher in snapshot {
            watcher(next);
        }
    }

    /// 수신/송신 루프
    /// 소켓을 읽는 유일한 태스크이므로 콜백 전달 순서는 도착 순서와 같다.
    async fn run_connection(
        ws_stream: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        mut send_rx: mpsc::Receiver<ControlMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
        state: Arc<RwLock<ConnectionState>>,
        watchers: Arc<Mutex<Vec<StateWatcher>>>,
        registry: Arc<ListenerRegistry>,
    ) {
        let (mut sink, mut stream) = ws_stream.split();

        loop {
            tokio::select! {
                // 명시적 종료
                _ = shutdown_rx.recv() => {
                    debug!("{:<12} --> 종료 신호 수신", "Connection");
                    let _ = sink.close().await;
                    break;
                }

                // 송신 컨트롤 메시지 (참여/퇴장은 fire-and-forget)
                Some(control) = send_rx.recv() => {
                    let text = match serde_json::to_string(&control) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("{:<12} --> 컨트롤 직렬화 오류: {}", "Connection", e);
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        error!("{:<12} --> 컨트롤 전송 오류: {}", "Connection", e);
                    }
                }

                // 수신 데이터 이벤트
                message = stream.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<LiveEvent>(&text) {
                                Ok(LiveEvent::NewBid(bid)) => {
                                    debug!(
                                        "{:<12} --> newBid 수신: auction={} amount={}",
                                        "Connection", bid.auction_id, bid.bid_amount
                                    );
                                    registry.dispatch(&bid);
                                }
                                Err(e) => {
                                    warn!("{:<12} --> 알 수 없는 메시지: {}", "Connection", e);
                                }
                            }
                        }
                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                        Some(Ok(Message::Close(_))) | None => {
                            info!("{:<12} --> 서버가 연결을 닫음", "Connection");
                            Self::transition(&state, &watchers, ConnectionState::Disconnected);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("{:<12} --> 전송 계층 오류: {}", "Connection", e);
                            Self::transition(&state, &watchers, ConnectionState::Error);
                            Self::transition(&state, &watchers, ConnectionState::Disconnected);
                            break;
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl ControlChannel for ConnectionManager {
    fn state(&self) -> ConnectionState {
        *self.state.read().unwrap()
    }

    async fn send_control(&self, message: ControlMessage) -> Result<(), String> {
        let tx = self.send_tx.lock().unwrap().clone();
        match tx {
            Some(tx) => tx
                .send(message)
                .await
                .map_err(|_| "송신 채널이 닫혔습니다".to_string()),
            None => Err("연결되지 않았습니다".to_string()),
        }
    }

    fn watch_state(&self, watcher: StateWatcher) {
        self.watchers.lock().unwrap().push(watcher);
    }
}

// endregion: --- Connection Manager

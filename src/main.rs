// region:    --- Imports
use bidspace_live::api::{ApiConfig, AuctionApi};
use bidspace_live::bidding::model::Viewer;
use bidspace_live::connection::{ConnectionConfig, ConnectionManager};
use bidspace_live::floor::FloorPolicy;
use bidspace_live::listener::ListenerRegistry;
use bidspace_live::room::RoomTracker;
use bidspace_live::session::open_session;
use std::sync::Arc;
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // API 클라이언트 생성
    let api_config = ApiConfig::from_env();
    let token = api_config.token.clone();
    let api = AuctionApi::new(api_config);

    // 커넥션 매니저 생성 및 연결
    let registry = Arc::new(ListenerRegistry::new());
    let connection = Arc::new(ConnectionManager::new(
        ConnectionConfig::from_env(),
        Arc::clone(&registry),
    ));
    if let Err(e) = connection.connect(token.as_deref()).await {
        // 라이브 업데이트 없이 스냅샷만으로 계속 동작한다
        error!("{:<12} --> 라이브 연결 실패: {}", "Main", e);
    }

    // 방 추적기 생성
    let rooms = Arc::new(RoomTracker::new(connection.clone()));

    // 로그인 사용자 (환경 변수, 없으면 비로그인 조회 전용)
    let viewer = match (
        std::env::var("BIDSPACE_USER_ID").ok(),
        std::env::var("BIDSPACE_USERNAME").ok(),
    ) {
        (Some(id), Some(username)) => Some(Viewer {
            user_id: id.parse()?,
            username,
        }),
        _ => None,
    };

    // 경매 뷰 세션 열기
    let product_id: i64 = std::env::var("AUCTION_ID")
        .unwrap_or_else(|_| "1".to_string())
        .parse()?;
    let handle = match open_session(
        &api,
        &registry,
        &rooms,
        viewer,
        product_id,
        FloorPolicy::default(),
    )
    .await
    {
        Ok(handle) => handle,
        Err(e) => {
            error!("{:<12} --> 세션 열기 실패: {}", "Main", e);
            return Err(e.into());
        }
    };

    info!(
        "{:<12} --> 라이브 입찰 세션 시작: auction={} (Ctrl-C 로 종료)",
        "Main", product_id
    );

    // 주기적으로 피드와 바닥을 출력
    let session = handle.session();
    let report = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(5));
        loop {
            interval.tick().await;
            let session = session.lock().unwrap();
            info!(
                "{:<12} --> 피드 {}건, 최소 입찰가 {:?}",
                "Main",
                session.feed().len(),
                session.minimum_bid()
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    report.abort();

    // 세션과 연결 정리
    handle.close().await;
    connection.disconnect().await;
    Ok(())
}
// endregion: --- Main

/// 경매 뷰 세션
/// 열려 있는 경매 상세 뷰 하나가 독점 소유하는 로컬 상태.
/// 먼저 권위 있는 스냅샷으로 시드하고, 그 다음에야 리스너의
/// 증분 이벤트를 신뢰한다 (seed-then-stream). 뷰가 닫히면 전부 버린다.
// region:    --- Imports
use crate::api::AuctionApi;
use crate::auction::events::LiveBidMessage;
use crate::bidding::model::{Auction, ProductDetails, Viewer};
use crate::feed::{BidFeed, FeedEntry};
use crate::floor::{FloorPolicy, FloorTracker};
use crate::listener::{ListenerId, ListenerRegistry};
use crate::room::RoomTracker;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

// endregion: --- Imports

// region:    --- Auction Session

pub type SharedSession = Arc<Mutex<AuctionSession>>;

pub struct AuctionSession {
    viewer: Option<Viewer>,
    auction: Option<Auction>,
    floor: Option<FloorTracker>,
    feed: BidFeed,
}

impl AuctionSession {
    pub fn new(viewer: Option<Viewer>) -> Self {
        Self {
            viewer,
            auction: None,
            floor: None,
            feed: BidFeed::new(),
        }
    }

    /// 1단계: 권위 있는 스냅샷으로 시드
    pub fn seed(&mut self, details: &ProductDetails, policy: FloorPolicy) {
        let auction = details.auction.clone();

        let mut floor = FloorTracker::new(auction.base_price, policy);
        if let Some(price) = auction.current_price {
            floor.observe_price(price);
        }
        self.floor = Some(floor);
        self.auction = Some(auction);
        info!(
            "{:<12} --> 세션 시드: auction={} floor={}",
            "Session",
            details.auction.id,
            self.minimum_bid().unwrap_or(0)
        );
    }

    /// 2단계: 수신 라이브 이벤트 적용
    /// 본인 입찰의 서버 에코는 피드에 다시 넣지 않는다. 낙관적 항목이
    /// 이미 있으므로 같은 입찰이 두 번 "나"로 보이면 안 된다.
    pub fn apply_live(&mut self, message: &LiveBidMessage) {
        if let Some(floor) = self.floor.as_mut() {
            floor.observe_bid(message.bid_amount);
            floor.observe_price(message.current_price);
        }

        let is_self_echo = self
            .viewer
            .as_ref()
            .is_some_and(|v| v.user_id == message.user_id);
        if is_self_echo {
            debug!(
                "{:<12} --> 본인 에코 억제: amount={}",
                "Session", message.bid_amount
            );
            return;
        }

        self.feed.append(FeedEntry {
            user_id: message.user_id,
            username: message.username.clone(),
            amount: message.bid_amount,
            timestamp: message.timestamp,
            mine: false,
        });
    }

    /// 제출 성공 직후의 낙관적 항목
    /// 타임스탬프는 로컬 시계라서 서버의 기록과 다를 수 있다.
    pub fn record_own_bid(&mut self, amount: i64) {
        if let Some(floor) = self.floor.as_mut() {
            floor.observe_bid(amount);
        }
        let Some(viewer) = self.viewer.clone() else {
            return;
        };
        self.feed.append(FeedEntry {
            user_id: viewer.user_id,
            username: viewer.username,
            amount,
            timestamp: Utc::now(),
            mine: true,
        });
    }

    /// 권위 있는 가격으로 재조정 (입찰 응답, 새로고침)
    /// 라이브 이벤트가 만든 바닥보다 낮으면 무시된다.
    pub fn reconcile_price(&mut self, price: i64) {
        if let Some(floor) = self.floor.as_mut() {
            floor.observe_price(price);
        }
    }

    /// 현재 최소 입찰가 (시드 전이면 None)
    pub fn minimum_bid(&self) -> Option<i64> {
        self.floor.as_ref().map(|f| f.minimum_bid())
    }

    pub fn auction_id(&self) -> Option<i64> {
        self.auction.as_ref().map(|a| a.id)
    }

    pub fn viewer(&self) -> Option<&Viewer> {
        self.viewer.as_ref()
    }

    pub fn feed(&self) -> &BidFeed {
        &self.feed
    }

    /// 경매 종료 여부 (종료 시간 경과 또는 낙찰)
    pub fn is_ended(&self, now: DateTime<Utc>) -> bool {
        self.auction.as_ref().is_some_and(|a| a.is_ended(now))
    }
}

// endregion: --- Auction Session

// region:    --- Session Handle

/// 열린 세션 핸들
/// 뷰 마운트 = open, 언마운트 = close. close 가 리스너를 떼고
/// 방 참조 카운트를 내린다.
pub struct SessionHandle {
    session: SharedSession,
    listener: ListenerId,
    registry: Arc<ListenerRegistry>,
    rooms: Arc<RoomTracker>,
    auction_id: i64,
}

impl SessionHandle {
    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    pub async fn close(self) {
        self.registry.off_new_bid(self.listener);
        if let Err(e) = self.rooms.leave_room(self.auction_id).await {
            tracing::warn!("{:<12} --> 방 퇴장 실패: {}", "Session", e);
        }
        info!("{:<12} --> 세션 종료: auction={}", "Session", self.auction_id);
    }
}

/// 경매 뷰 열기
/// 스냅샷 시드 → 리스너 등록 → 방 참여 순서를 지킨다.
pub async fn open_session(
    api: &AuctionApi,
    registry: &Arc<ListenerRegistry>,
    rooms: &Arc<RoomTracker>,
    viewer: Option<Viewer>,
    product_id: i64,
    policy: FloorPolicy,
) -> Result<SessionHandle, String> {
    let details = api.product_details(product_id).await?;
    let auction_id = details.auction.id;

    let mut session = AuctionSession::new(viewer);
    session.seed(&details, policy);
    let session = Arc::new(Mutex::new(session));

    // 레지스트리는 방 필터링을 하지 않으므로 여기서 경매 식별자로 거른다
    let listener = {
        let session = Arc::clone(&session);
        registry.on_new_bid(move |message| {
            if message.auction_id != auction_id {
                return;
            }
            session.lock().unwrap().apply_live(message);
        })
    };

    // 참여는 fire-and-forget, 연결이 없으면 스냅샷만으로 동작한다
    if let Err(e) = rooms.join_room(auction_id).await {
        tracing::warn!("{:<12} --> 방 참여 실패: {}", "Session", e);
    }

    Ok(SessionHandle {
        session,
        listener,
        registry: Arc::clone(registry),
        rooms: Arc::clone(rooms),
        auction_id,
    })
}

// endregion: --- Session Handle

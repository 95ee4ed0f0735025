/// 입찰 관련 커맨드 처리
/// 1. 입찰
/// 2. 즉시 구매
// region:    --- Imports
use crate::api::{AuctionApi, BidRequest, BuyNowRequest};
use crate::bidding::model::Auction;
use crate::session::SharedSession;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

// endregion: --- Imports

// region:    --- Commands

/// 입찰 명령
#[derive(Debug, Clone)]
pub struct PlaceBidCommand {
    pub auction_id: i64,
    pub bid_amount: i64,
}

// 오류 표시 시간 (자동 해제)
const ERROR_DISPLAY_MILLIS: u64 = 3000;

/// 입찰 제출 코디네이터
/// 모든 실패는 여기서 잡혀 일시적 인라인 메시지 하나로 변환된다.
/// 실패한 입찰이 경매 뷰를 깨뜨리는 일은 없다.
pub struct BidCoordinator {
    api: Arc<AuctionApi>,
    in_flight: AtomicBool,
    last_error: Arc<Mutex<(u64, Option<serde_json::Value>)>>,
}

impl BidCoordinator {
    pub fn new(api: Arc<AuctionApi>) -> Self {
        Self {
            api,
            in_flight: AtomicBool::new(false),
            last_error: Arc::new(Mutex::new((0, None))),
        }
    }

    /// 1. 입찰
    /// 사전 조건 검사는 네트워크 호출 전에 동기적으로 끝낸다.
    /// 제출은 라이브 연결 상태와 무관하게 HTTP 경로로 시도된다.
    pub async fn submit_bid(
        &self,
        session: &SharedSession,
        amount: i64,
    ) -> Result<Auction, serde_json::Value> {
        let cmd = {
            let session = session.lock().unwrap();

            // (a) 경매 정보 없음
            let Some(auction_id) = session.auction_id() else {
                return self.fail(serde_json::json!({
                    "error": "경매 정보가 없습니다. 새로고침 해주세요.",
                    "code": "MISSING_AUCTION"
                }));
            };

            // (b) 로그인하지 않음
            if session.viewer().is_none() {
                return self.fail(serde_json::json!({
                    "error": "입찰하려면 로그인해야 합니다.",
                    "code": "NOT_LOGGED_IN"
                }));
            }

            // 종료된 경매는 읽기 전용
            if session.is_ended(Utc::now()) {
                return self.fail(serde_json::json!({
                    "error": "경매가 이미 종료되었습니다.",
                    "code": "ALREADY_ENDED"
                }));
            }

            // (c) 바닥 미달
            let floor = session.minimum_bid().unwrap_or(0);
            if amount < floor {
                return self.fail(serde_json::json!({
                    "error": format!("최소 {} 코인 이상 입찰해야 합니다.", floor),
                    "code": "LOW_BID",
                    "floor": floor
                }));
            }

            PlaceBidCommand {
                auction_id,
                bid_amount: amount,
            }
        };

        // 같은 코디네이터에서의 동시 이중 제출 방지
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("{:<12} --> 이미 제출 진행 중", "Command");
            return Err(serde_json::json!({
                "error": "이미 제출이 진행 중입니다.",
                "code": "IN_FLIGHT"
            }));
        }

        info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Command", cmd);

        // 시도마다 새 멱등 키
        let request = BidRequest {
            auction_id: cmd.auction_id,
            bid_amount: cmd.bid_amount,
            submission_id: Uuid::new_v4(),
        };
        let result = self.api.place_bid(&request).await;
        self.in_flight.store(false, Ordering::SeqCst);

        match result {
            Ok(auction) => {
                self.clear_error();
                let mut session = session.lock().unwrap();
                session.record_own_bid(amount);
                if let Some(price) = auction.current_price {
                    session.reconcile_price(price);
                }
                info!(
                    "{:<12} --> 입찰 성공: auction={} amount={}",
                    "Command", cmd.auction_id, amount
                );
                Ok(auction)
            }
            Err(e) => self.fail_with(e),
        }
    }

    /// 2. 즉시 구매
    pub async fn submit_buy_now(
        &self,
        session: &SharedSession,
    ) -> Result<Auction, serde_json::Value> {
        let auction_id = {
            let session = session.lock().unwrap();

            let Some(auction_id) = session.auction_id() else {
                return self.fail(serde_json::json!({
                    "error": "경매 정보가 없습니다. 새로고침 해주세요.",
                    "code": "MISSING_AUCTION"
                }));
            };
            if session.viewer().is_none() {
                return self.fail(serde_json::json!({
                    "error": "구매하려면 로그인해야 합니다.",
                    "code": "NOT_LOGGED_IN"
                }));
            }
            if session.is_ended(Utc::now()) {
                return self.fail(serde_json::json!({
                    "error": "경매가 이미 종료되었습니다.",
                    "code": "ALREADY_ENDED"
                }));
            }
            auction_id
        };

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("{:<12} --> 이미 제출 진행 중", "Command");
            return Err(serde_json::json!({
                "error": "이미 제출이 진행 중입니다.",
                "code": "IN_FLIGHT"
            }));
        }

        info!(
            "{:<12} --> 즉시 구매 요청 처리 시작: auction={}",
            "Command", auction_id
        );

        let request = BuyNowRequest {
            auction_id,
            submission_id: Uuid::new_v4(),
        };
        let result = self.api.buy_now(&request).await;
        self.in_flight.store(false, Ordering::SeqCst);

        match result {
            Ok(auction) => {
                self.clear_error();
                Ok(auction)
            }
            Err(e) => self.fail_with(e),
        }
    }

    /// 현재 표시 중인 일시적 오류
    pub fn last_error(&self) -> Option<serde_json::Value> {
        self.last_error.lock().unwrap().1.clone()
    }

    /// 제출 진행 중 여부
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn fail<T>(&self, error: serde_json::Value) -> Result<T, serde_json::Value> {
        self.fail_with(error)
    }

    /// 오류를 일시적 메시지로 저장하고 3초 후 자동 해제한다.
    /// 해제는 이후 제출을 막지 않는다.
    fn fail_with<T>(&self, error: serde_json::Value) -> Result<T, serde_json::Value> {
        warn!("{:<12} --> 입찰 실패: {}", "Command", error);
        let generation = {
            let mut slot = self.last_error.lock().unwrap();
            slot.0 += 1;
            slot.1 = Some(error.clone());
            slot.0
        };

        // 더 새로운 오류가 표시 중이면 건드리지 않는다
        let last_error = Arc::clone(&self.last_error);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(ERROR_DISPLAY_MILLIS)).await;
            let mut slot = last_error.lock().unwrap();
            if slot.0 == generation {
                slot.1 = None;
            }
        });

        Err(error)
    }

    fn clear_error(&self) {
        let mut slot = self.last_error.lock().unwrap();
        slot.0 += 1;
        slot.1 = None;
    }
}

// endregion: --- Commands

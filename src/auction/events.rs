use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 서버가 경매 방으로 브로드캐스트하는 입찰 이벤트
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiveBidMessage {
    pub user_id: i64,
    pub username: String,
    pub bid_amount: i64,
    pub timestamp: DateTime<Utc>,
    pub auction_id: i64,
    /// 이 입찰 시점의 경매 현재 가격
    pub current_price: i64,
}

/// 수신 데이터 이벤트
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum LiveEvent {
    // 새 입찰 이벤트
    NewBid(LiveBidMessage),
}

/// 송신 컨트롤 이벤트
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ControlMessage {
    // 경매 방 입장
    #[serde(rename_all = "camelCase")]
    JoinAuctionRoom { auction_id: i64 },
    // 경매 방 퇴장
    #[serde(rename_all = "camelCase")]
    LeaveAuction { auction_id: i64 },
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 경매 모델
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub id: i64,
    /// 시작 가격
    pub base_price: i64,
    /// 현재 가격 (입찰이 없으면 None, 한번 정해지면 단조 증가)
    pub current_price: Option<i64>,
    pub end_time: DateTime<Utc>,
    pub sold: bool,
    /// 입찰 이력 (최신순)
    #[serde(default)]
    pub bids: Vec<Bid>,
}

impl Auction {
    /// 종료 시간이 지났거나 낙찰된 경매는 읽기 전용
    pub fn is_ended(&self, now: DateTime<Utc>) -> bool {
        self.sold || now > self.end_time
    }
}

// 입찰 모델
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub user_id: i64,
    pub username: String,
    pub bid_amount: i64,
    pub bid_time: DateTime<Utc>,
}

// 상품 상세 스냅샷 (뷰 마운트 시 1회 조회)
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    pub title: String,
    pub description: String,
    pub auction: Auction,
}

// 로그인한 사용자
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub user_id: i64,
    pub username: String,
}

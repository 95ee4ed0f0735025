/// 권위 있는 HTTP API 클라이언트
/// 입찰 쓰기와 뷰 마운트 시 1회 읽는 상품 스냅샷을 담당한다.
/// 입찰 기록의 원본은 전부 서버에 있고 이 크레이트는 상태를 소유하지 않는다.
// region:    --- Imports
use crate::bidding::model::{Auction, ProductDetails};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

// endregion: --- Imports

// region:    --- Api Config

/// API 설정
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
}

impl ApiConfig {
    /// 환경 변수에서 설정을 읽는다
    pub fn from_env() -> Self {
        let base_url = std::env::var("BIDSPACE_API_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let token = std::env::var("BIDSPACE_TOKEN").ok();
        Self { base_url, token }
    }
}

// endregion: --- Api Config

// region:    --- Wire Types

/// 입찰 쓰기 요청
/// submission_id 는 시도마다 새로 만드는 멱등 키로, 모호한 네트워크
/// 실패 후의 재제출이 서버에서 이중 적용되지 않게 한다.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BidRequest {
    pub auction_id: i64,
    pub bid_amount: i64,
    pub submission_id: Uuid,
}

/// 즉시 구매 요청
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BuyNowRequest {
    pub auction_id: i64,
    pub submission_id: Uuid,
}

/// 서버 응답 봉투: {success, data} 또는 {success: false, message}
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuctionData {
    auction: Auction,
}

// endregion: --- Wire Types

// region:    --- Auction Api

pub struct AuctionApi {
    client: reqwest::Client,
    config: ApiConfig,
}

impl AuctionApi {
    pub fn new(config: ApiConfig) -> Arc<Self> {
        Arc::new(Self {
            client: reqwest::Client::new(),
            config,
        })
    }

    /// 입찰 쓰기 (POST /auction/bid)
    /// 거절이든 네트워크 실패든 코디네이터가 같은 모양의 오류로 받는다.
    pub async fn place_bid(&self, request: &BidRequest) -> Result<Auction, serde_json::Value> {
        info!(
            "{:<12} --> 입찰 쓰기: auction={} amount={}",
            "Api", request.auction_id, request.bid_amount
        );
        let url = format!("{}/auction/bid", self.config.base_url);
        let response = self
            .authorized(self.client.post(&url))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!("{:<12} --> 입찰 쓰기 네트워크 오류: {}", "Api", e);
                serde_json::json!({"error": e.to_string(), "code": "NETWORK"})
            })?;

        let envelope: ApiEnvelope<AuctionData> = response.json().await.map_err(|e| {
            serde_json::json!({"error": format!("응답 해석 실패: {}", e), "code": "NETWORK"})
        })?;

        if envelope.success {
            envelope
                .data
                .map(|d| d.auction)
                .ok_or_else(|| serde_json::json!({"error": "응답에 경매 정보가 없습니다", "code": "NETWORK"}))
        } else {
            // 서버 메시지는 있는 그대로 사용자에게 보여 준다
            let message = envelope
                .message
                .unwrap_or_else(|| "입찰이 거절되었습니다".to_string());
            Err(serde_json::json!({"error": message, "code": "REJECTED"}))
        }
    }

    /// 즉시 구매 쓰기 (POST /auction/buy-now)
    pub async fn buy_now(&self, request: &BuyNowRequest) -> Result<Auction, serde_json::Value> {
        info!(
            "{:<12} --> 즉시 구매 쓰기: auction={}",
            "Api", request.auction_id
        );
        let url = format!("{}/auction/buy-now", self.config.base_url);
        let response = self
            .authorized(self.client.post(&url))
            .json(request)
            .send()
            .await
            .map_err(|e| serde_json::json!({"error": e.to_string(), "code": "NETWORK"}))?;

        let envelope: ApiEnvelope<AuctionData> = response.json().await.map_err(|e| {
            serde_json::json!({"error": format!("응답 해석 실패: {}", e), "code": "NETWORK"})
        })?;

        if envelope.success {
            envelope
                .data
                .map(|d| d.auction)
                .ok_or_else(|| serde_json::json!({"error": "응답에 경매 정보가 없습니다", "code": "NETWORK"}))
        } else {
            let message = envelope
                .message
                .unwrap_or_else(|| "즉시 구매가 거절되었습니다".to_string());
            Err(serde_json::json!({"error": message, "code": "REJECTED"}))
        }
    }

    /// 상품 상세 스냅샷 (GET /product/details/:id)
    /// 리스너에는 재생 버퍼가 없으므로 스트림을 믿기 전에 반드시
    /// 이 스냅샷으로 로컬 상태를 시드한다.
    pub async fn product_details(&self, product_id: i64) -> Result<ProductDetails, String> {
        info!("{:<12} --> 상품 상세 조회: id={}", "Api", product_id);
        let url = format!("{}/product/details/{}", self.config.base_url, product_id);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| format!("상품 조회 실패: {}", e))?;

        response
            .json::<ProductDetails>()
            .await
            .map_err(|e| format!("상품 응답 해석 실패: {}", e))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

// endregion: --- Auction Api

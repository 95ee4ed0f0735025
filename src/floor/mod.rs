/// 최소 입찰가 계산기
/// 권위 있는 현재 가격과 라이브 피드에서 관찰된 최고 입찰가 중
/// 큰 값에 증가분을 더한 값이 최소 입찰가가 된다.
/// 두 값이 모두 없으면 시작 가격으로 대체한다.
// region:    --- Floor Policy

/// 최소 입찰 증가분 정책
/// 증가분이 항상 1인지는 확정되지 않았으므로 정책 값으로 둔다.
#[derive(Debug, Clone, Copy)]
pub struct FloorPolicy {
    pub increment: i64,
}

impl Default for FloorPolicy {
    fn default() -> Self {
        Self { increment: 1 }
    }
}

// endregion: --- Floor Policy

// region:    --- Floor Tracker

/// 한 뷰 세션 동안의 최소 입찰가 추적기
/// 두 소스 모두 최대값 병합만 하므로 출력은 단조 비감소한다.
#[derive(Debug)]
pub struct FloorTracker {
    policy: FloorPolicy,
    base_price: i64,
    authoritative: Option<i64>,
    highest_live: Option<i64>,
}

impl FloorTracker {
    pub fn new(base_price: i64, policy: FloorPolicy) -> Self {
        Self {
            policy,
            base_price,
            authoritative: None,
            highest_live: None,
        }
    }

    /// 권위 있는 가격 갱신 (초기 로드, 새로고침)
    /// 라이브 이벤트가 이미 더 높은 바닥을 만들었으면 낮추지 않는다.
    pub fn observe_price(&mut self, price: i64) {
        self.authoritative = Some(self.authoritative.map_or(price, |p| p.max(price)));
    }

    /// 라이브 입찰 이벤트 관찰
    pub fn observe_bid(&mut self, amount: i64) {
        self.highest_live = Some(self.highest_live.map_or(amount, |a| a.max(amount)));
    }

    /// 새 입찰이 만족해야 하는 최소 금액
    /// 시작 가격 아래로는 절대 내려가지 않는다
    pub fn minimum_bid(&self) -> i64 {
        match (self.authoritative, self.highest_live) {
            (None, None) => self.base_price,
            (a, b) => {
                let best = a.max(b).unwrap_or(self.base_price);
                (best + self.policy.increment).max(self.base_price)
            }
        }
    }
}

// endregion: --- Floor Tracker

// region:    --- Tests


// endregion: --- Tests

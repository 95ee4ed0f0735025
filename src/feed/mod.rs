/// 로컬 입찰 피드
/// 현재 열려 있는 경매 뷰만을 위한 최신순 유한 로그.
/// 서버 푸시 이벤트와 본인의 낙관적 입찰을 합쳐 담는다.
// region:    --- Imports
use chrono::{DateTime, Utc};

// endregion: --- Imports

// region:    --- Feed Entry

/// 피드 용량 (최근 16건만 유지)
pub const FEED_CAPACITY: usize = 16;

/// 피드 항목: 입찰 한 건의 뷰 전용 투영
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub user_id: i64,
    pub username: String,
    pub amount: i64,
    pub timestamp: DateTime<Utc>,
    /// 본인이 방금 제출한 낙관적 항목인지 여부
    pub mine: bool,
}

// endregion: --- Feed Entry

// region:    --- Bid Feed

/// 유한 최신순 입찰 피드
/// 표시 순서는 도착 순서이며 이벤트 자체의 타임스탬프 순서가 아니다.
/// 입찰 식별자 기반 중복 제거는 하지 않는다. 본인 에코 억제는 호출자 몫이다.
#[derive(Debug, Default)]
pub struct BidFeed {
    entries: Vec<FeedEntry>,
}

impl BidFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// 맨 앞에 추가하고 용량을 넘는 오래된 항목은 버린다
    pub fn append(&mut self, entry: FeedEntry) {
        self.entries.insert(0, entry);
        self.entries.truncate(FEED_CAPACITY);
    }

    /// 최신순 항목
    pub fn entries(&self) -> &[FeedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// endregion: --- Bid Feed

// region:    --- Tests


// endregion: --- Tests

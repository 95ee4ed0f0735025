/// 입찰 이벤트 리스너 레지스트리
/// 현재 참여 중인 모든 방의 newBid 이벤트를 등록 순서대로
/// 모든 콜백에 전달한다. 방 단위 필터링은 하지 않으므로
/// 호출자가 이벤트의 경매 식별자를 보고 걸러야 한다.
// region:    --- Imports
use crate::auction::events::LiveBidMessage;
use std::sync::{Arc, Mutex};
use tracing::debug;

// endregion: --- Imports

// region:    --- Listener Registry

pub type BidCallback = Arc<dyn Fn(&LiveBidMessage) + Send + Sync>;

/// 등록 해제용 핸들 (동일성 비교로 제거)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

struct Inner {
    next_id: u64,
    listeners: Vec<(ListenerId, BidCallback)>,
}

/// 리스너 레지스트리
/// 과거 이벤트 재생 버퍼는 없다. 등록 이후 도착한 이벤트만 전달된다.
pub struct ListenerRegistry {
    inner: Mutex<Inner>,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 0,
                listeners: Vec::new(),
            }),
        }
    }

    /// 콜백 등록, 등록 순서가 곧 전달 순서
    pub fn on_new_bid<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&LiveBidMessage) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push((id, Arc::new(callback)));
        debug!("{:<12} --> 리스너 등록: {:?}", "Listener", id);
        id
    }

    /// 콜백 제거, 등록 시 받은 핸들과 동일해야 한다
    pub fn off_new_bid(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.listeners.len();
        inner.listeners.retain(|(lid, _)| *lid != id);
        inner.listeners.len() < before
    }

    /// 수신 이벤트를 모든 콜백에 순서대로 전달
    /// 단일 수신 태스크에서만 호출되므로 콜백 간 인터리빙은 없다.
    pub fn dispatch(&self, message: &LiveBidMessage) {
        // 콜백 안에서 등록/해제가 가능하도록 잠금 밖에서 호출한다
        let snapshot: Vec<BidCallback> = {
            let inner = self.inner.lock().unwrap();
            inner.listeners.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for callback in snapshot {
            callback(message);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// endregion: --- Listener Registry

// region:    --- Tests


// endregion: --- Tests

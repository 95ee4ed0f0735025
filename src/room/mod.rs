/// 방 멤버십 추적기
/// 하나의 연결 위에 경매별 참여/퇴장 의미를 얹는다.
/// 같은 경매를 보는 뷰가 N개여도 서버에는 참여 1회, 퇴장 1회만
/// 나가도록 방마다 명시적 참조 카운트를 유지한다. 참여 메시지는
/// 0→1 전이에서만, 퇴장 메시지는 1→0 전이에서만 내보낸다.
// region:    --- Imports
use crate::auction::events::ControlMessage;
use crate::connection::{ConnectionState, ControlChannel};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

// endregion: --- Imports

// region:    --- Room Tracker

pub struct RoomTracker {
    channel: Arc<dyn ControlChannel>,
    rooms: Arc<Mutex<HashMap<i64, usize>>>,
}

impl RoomTracker {
    pub fn new(channel: Arc<dyn ControlChannel>) -> Self {
        let rooms: Arc<Mutex<HashMap<i64, usize>>> = Arc::new(Mutex::new(HashMap::new()));

        // 연결이 끊기면 서버 쪽 멤버십도 함께 사라진다. 카운트를 그대로
        // 두면 재연결 후의 참여가 1→2 전이로 보여 참여 메시지가 다시
        // 나가지 않으므로, Connected 를 벗어나는 전이에서 전부 버린다.
        {
            let rooms = Arc::clone(&rooms);
            channel.watch_state(Arc::new(move |state| {
                if matches!(
                    state,
                    ConnectionState::Disconnected | ConnectionState::Error
                ) {
                    rooms.lock().unwrap().clear();
                }
            }));
        }

        Self { channel, rooms }
    }

    /// 경매 방 참여
    /// 연결이 Connected 가 아니면 경고 후 no-op 이다. 연결이 준비될 때를
    /// 기다려 큐에 쌓아 두지 않는다.
    pub async fn join_room(&self, auction_id: i64) -> Result<(), String> {
        if self.channel.state() != ConnectionState::Connected {
            warn!(
                "{:<12} --> 연결되지 않아 방 참여를 건너뜀: auction={}",
                "Room", auction_id
            );
            return Ok(());
        }

        let became_active = {
            let mut rooms = self.rooms.lock().unwrap();
            let count = rooms.entry(auction_id).or_insert(0);
            *count += 1;
            *count == 1
        };

        if !became_active {
            debug!(
                "{:<12} --> 이미 참여 중인 방: auction={}",
                "Room", auction_id
            );
            return Ok(());
        }

        info!("{:<12} --> 방 참여: auction={}", "Room", auction_id);
        if let Err(e) = self
            .channel
            .send_control(ControlMessage::JoinAuctionRoom { auction_id })
            .await
        {
            // 서버에 전달되지 못했으므로 카운트를 되돌린다
            self.rooms.lock().unwrap().remove(&auction_id);
            return Err(e);
        }
        Ok(())
    }

    /// 경매 방 퇴장
    /// 참여한 적 없는 방의 퇴장은 무해하다 (멱등).
    pub async fn leave_room(&self, auction_id: i64) -> Result<(), String> {
        let became_empty = {
            let mut rooms = self.rooms.lock().unwrap();
            match rooms.get_mut(&auction_id) {
                None => {
                    debug!(
                        "{:<12} --> 참여하지 않은 방 퇴장 요청: auction={}",
                        "Room", auction_id
                    );
                    return Ok(());
                }
                Some(count) if *count > 1 => {
                    *count -= 1;
                    false
                }
                Some(_) => {
                    rooms.remove(&auction_id);
                    true
                }
            }
        };

        if !became_empty {
            return Ok(());
        }

        info!("{:<12} --> 방 퇴장: auction={}", "Room", auction_id);
        if self.channel.state() != ConnectionState::Connected {
            // 연결이 이미 끊겼으면 서버 쪽 멤버십도 함께 사라졌다
            return Ok(());
        }
        self.channel
            .send_control(ControlMessage::LeaveAuction { auction_id })
            .await
    }

    /// 현재 방의 참조 카운트 (참여 중이 아니면 0)
    pub fn member_count(&self, auction_id: i64) -> usize {
        self.rooms
            .lock()
            .unwrap()
            .get(&auction_id)
            .copied()
            .unwrap_or(0)
    }
}

// endregion: --- Room Tracker

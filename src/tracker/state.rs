//! 用户对状态机
//!
//! ```text
//! Absent --enter--> Near --continue--> Near --exit--> Absent
//! ```
//!
//! 这里只做决策，不访问存储；执行由 [`super::ProximityTracker::handle_event`] 完成。

use crate::cache::models::PairState;
use crate::models::ProximityEvent;

/// 针对一个事件应执行的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairAction {
    /// 新建会话并写入接近状态
    Open,
    /// 会话仍有效，只刷新过期时间
    Keep(PairState),
    /// 状态缺失或指向无效会话：记录异常后按 enter 重新建立
    Reopen { stale: Option<PairState> },
    /// 关闭会话并累计时长
    Close(PairState),
    /// exit 但没有对应的会话：记录异常后忽略
    Ignore,
}

/// `session_open` 表示 `state` 指向的会话在账本中仍未关闭；没有状态时忽略该值。
pub fn decide(event: ProximityEvent, state: Option<PairState>, session_open: bool) -> PairAction {
    match (event, state) {
        (ProximityEvent::Enter, None) => PairAction::Open,
        (ProximityEvent::Enter | ProximityEvent::Continue, Some(state)) if session_open => {
            PairAction::Keep(state)
        }
        (ProximityEvent::Enter | ProximityEvent::Continue, Some(state)) => {
            PairAction::Reopen { stale: Some(state) }
        }
        (ProximityEvent::Continue, None) => PairAction::Reopen { stale: None },
        (ProximityEvent::Exit, Some(state)) => PairAction::Close(state),
        (ProximityEvent::Exit, None) => PairAction::Ignore,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn state() -> PairState {
        PairState {
            session_id: Uuid::new_v4(),
            start_time: 1_000,
        }
    }

    #[test]
    fn test_enter_from_absent_opens() {
        assert_eq!(decide(ProximityEvent::Enter, None, false), PairAction::Open);
    }

    #[test]
    fn test_repeated_enter_is_noop() {
        let current = state();
        assert_eq!(
            decide(ProximityEvent::Enter, Some(current.clone()), true),
            PairAction::Keep(current)
        );
    }

    #[test]
    fn test_continue_keeps_valid_session() {
        let current = state();
        assert_eq!(
            decide(ProximityEvent::Continue, Some(current.clone()), true),
            PairAction::Keep(current)
        );
    }

    #[test]
    fn test_continue_without_state_reopens() {
        assert_eq!(
            decide(ProximityEvent::Continue, None, false),
            PairAction::Reopen { stale: None }
        );
    }

    #[test]
    fn test_continue_with_closed_session_reopens() {
        let s = state();
        assert_eq!(
            decide(ProximityEvent::Continue, Some(s.clone()), false),
            PairAction::Reopen { stale: Some(s) }
        );
    }

    #[test]
    fn test_exit_closes_or_drops() {
        let s = state();
        assert_eq!(
            decide(ProximityEvent::Exit, Some(s.clone()), true),
            PairAction::Close(s)
        );
        assert_eq!(decide(ProximityEvent::Exit, None, false), PairAction::Ignore);
    }
}

//! # Valuation Notification
//!
//! 밸류에이션 리포트 알림 서비스.
//!
//! 지원 채널:
//! - DingTalk 로봇 (webhook, markdown/text 메시지)

pub mod dingtalk;
pub mod types;

pub use dingtalk::*;
pub use types::*;

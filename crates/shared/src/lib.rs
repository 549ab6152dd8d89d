//! # Mailflow 共有ユーティリティ
//!
//! コンシューマー、インフラ層から共通で使用するユーティリティを提供する。
//!
//! ## 設計方針
//!
//! - ビジネスロジックを含まない純粋なユーティリティのみを配置
//! - 外部クレートへの依存は feature で切り替え、最小限に抑える

pub mod event_log;
pub mod observability;

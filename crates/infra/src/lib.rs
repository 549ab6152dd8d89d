//! # Mailflow インフラ層
//!
//! 外部システム（SQS、SES、SMTP）との接続・通信を担当するインフラストラクチャ層。
//!
//! ## 設計方針
//!
//! ドメイン層で定義された型（[`OutgoingEmail`](mailflow_domain::account_email::OutgoingEmail)、
//! [`QueueMessage`](mailflow_domain::batch::QueueMessage)）を入出力とし、
//! 外部システムの詳細をトレイトの背後にカプセル化する。
//!
//! ## 依存関係
//!
//! ```text
//! consumer → infra → domain
//! ```
//!
//! ## モジュール構成
//!
//! - [`dispatch`] - メール送信（SES / SMTP / Noop）
//! - [`sqs`] - SQS キューの受信・削除
//! - [`error`] - インフラ層エラー定義
//! - `mock` - テスト用インメモリ実装（`test-utils` feature）

pub mod dispatch;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod sqs;

pub use error::{InfraError, InfraErrorKind};

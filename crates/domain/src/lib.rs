//! # Mailflow ドメイン層
//!
//! キューから受信したアカウント関連イベントをメール通知に変換する処理の
//! ドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! - **純粋性**: パースとバリデーションは I/O を行わない純粋関数
//! - **不変性**: パース済みの [`AccountEmailRequest`] は以降の処理で変更されない
//! - **エラー分類**: すべての失敗は一時的（再試行で回復しうる）か恒久的かに分類される
//!
//! ## 依存関係の方向
//!
//! ```text
//! consumer → infra → domain
//!     ↘        ↓
//!        shared
//! ```
//!
//! ドメイン層はインフラ層（SQS、SES、SMTP）に一切依存しない。
//!
//! ## モジュール構成
//!
//! - [`account_email`] - メール送信リクエストとレンダリング結果
//! - [`batch`] - バッチ入力と部分失敗レポート
//! - [`email`] - メールアドレス値オブジェクト
//! - [`error`] - 処理エラーの分類
//! - [`payload`] - メッセージ本文のパース
//!
//! ## 使用例
//!
//! ```rust
//! use mailflow_domain::{
//!     account_email::{MessageId, TemplateVariant},
//!     payload,
//! };
//!
//! let body = br#"{"data": {
//!     "recipient": "ada@example.com",
//!     "template_variant": "direct_html",
//!     "event_type": "account_created",
//!     "template_context": {"name": "Ada"}
//! }}"#;
//!
//! let request = payload::parse(MessageId::new("msg-1"), body).unwrap();
//! assert_eq!(request.template_variant(), TemplateVariant::DirectHtml);
//! ```

pub mod account_email;
pub mod batch;
pub mod email;
pub mod error;
pub mod payload;

pub use error::{DispatchError, DispatchFailureKind, FailureClass, ProcessingError};

//! # メール送信
//!
//! レンダリング済みメールの送信を担当するインフラストラクチャモジュール。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: `EmailDispatcher` trait でメール送信を抽象化
//! - **3 つの実装**: SES（本番用）、SMTP（Mailpit 開発用）、Noop（送信無効化）
//! - **失敗の分類**: 各実装は送信失敗を一時的 / 恒久的に分類して返す
//! - **重複排除キー**: メッセージ ID を送信側に渡し、再配信による二重送信を下流で識別可能にする

mod noop;
mod ses;
mod smtp;

use async_trait::async_trait;
use mailflow_domain::{DispatchError, account_email::OutgoingEmail};
pub use noop::NoopEmailDispatcher;
pub use ses::SesEmailDispatcher;
pub use smtp::SmtpEmailDispatcher;

/// メール送信トレイト
///
/// 送信の成否のみを返す。配信保証（at-most-once / at-least-once）は実装と
/// 送信サービス側の重複排除に依存する。
#[async_trait]
pub trait EmailDispatcher: Send + Sync {
    /// メールを送信する
    async fn send_email(&self, email: &OutgoingEmail) -> Result<(), DispatchError>;
}

/// 重複排除キーを外部サービスで使える文字集合に正規化する
///
/// 英数字・`-`・`_` 以外は `_` に置換し、256 文字に切り詰める。
/// SES のメッセージタグ値と SMTP の Message-ID の両方で安全な形式。
pub(crate) fn sanitize_dedup_key(key: &str) -> String {
    key.chars()
        .take(256)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid形式のキーはそのまま使える() {
        assert_eq!(
            sanitize_dedup_key("059f36b4-87a3-44ab-83d2-661975830a7d"),
            "059f36b4-87a3-44ab-83d2-661975830a7d"
        );
    }

    #[test]
    fn test_使えない文字はアンダースコアに置換される() {
        assert_eq!(sanitize_dedup_key("a/b+c=@d"), "a_b_c__d");
    }

    #[test]
    fn test_長いキーは256文字に切り詰める() {
        assert_eq!(sanitize_dedup_key(&"x".repeat(300)).len(), 256);
    }
}

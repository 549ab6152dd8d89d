//! Noop メール送信実装
//!
//! メールを実際に送信せず、ログ出力のみ行う。
//! ローカル検証や送信無効化時に使用する。

use async_trait::async_trait;
use mailflow_domain::{DispatchError, account_email::OutgoingEmail};

use super::EmailDispatcher;

/// Noop メール送信（ログ出力のみ）
#[derive(Debug, Clone)]
pub struct NoopEmailDispatcher;

#[async_trait]
impl EmailDispatcher for NoopEmailDispatcher {
    async fn send_email(&self, email: &OutgoingEmail) -> Result<(), DispatchError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            dedup_key = %email.dedup_key,
            body_bytes = email.html_body.len(),
            "Noop: メール送信をスキップ"
        );
        Ok(())
    }
}

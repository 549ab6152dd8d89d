//! SMTP メール送信実装
//!
//! lettre の `AsyncSmtpTransport` を使用してメールを送信する。
//! 開発環境では Mailpit（ローカル SMTP サーバー）に接続する。

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport,
    AsyncTransport,
    Tokio1Executor,
    message::{Mailbox, Message, SinglePart, header::ContentType},
    transport::smtp,
};
use mailflow_domain::{DispatchError, account_email::OutgoingEmail};

use super::{EmailDispatcher, sanitize_dedup_key};

/// SMTP メール送信
///
/// `lettre::AsyncSmtpTransport<Tokio1Executor>` をラップする。
pub struct SmtpEmailDispatcher {
    transport:    AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpEmailDispatcher {
    /// 新しい SMTP 送信インスタンスを作成
    ///
    /// # 引数
    ///
    /// - `host`: SMTP サーバーのホスト名（例: "localhost"）
    /// - `port`: SMTP サーバーのポート番号（例: 1025 for Mailpit）
    /// - `from_address`: 送信元メールアドレス
    pub fn new(host: &str, port: u16, from_address: String) -> Self {
        // builder_dangerous: TLS なしで接続（Mailpit 等のローカル SMTP 向け）
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .build();

        Self {
            transport,
            from_address,
        }
    }

    /// 送信元ドメイン（Message-ID のドメイン部に使用）
    fn from_domain(&self) -> &str {
        self.from_address
            .rsplit_once('@')
            .map_or("localhost", |(_, domain)| domain)
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message, DispatchError> {
        let from: Mailbox = self
            .from_address
            .parse()
            .map_err(|e| DispatchError::permanent(format!("送信元アドレス不正: {e}")))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| DispatchError::permanent(format!("宛先アドレス不正: {e}")))?;

        let message_id = format!(
            "<{}@{}>",
            sanitize_dedup_key(&email.dedup_key),
            self.from_domain()
        );

        Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject)
            .message_id(Some(message_id))
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(email.html_body.clone()),
            )
            .map_err(|e| DispatchError::permanent(format!("メッセージ構築失敗: {e}")))
    }
}

#[async_trait]
impl EmailDispatcher for SmtpEmailDispatcher {
    async fn send_email(&self, email: &OutgoingEmail) -> Result<(), DispatchError> {
        let message = self.build_message(email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| classify_smtp_error(&e))?;

        Ok(())
    }
}

/// SMTP エラーを分類する
///
/// 5xx 応答のみ恒久的とし、4xx 応答・タイムアウト・接続失敗は一時的とする。
fn classify_smtp_error(error: &smtp::Error) -> DispatchError {
    let reason = format!("SMTP 送信失敗: {error}");
    if error.is_permanent() {
        DispatchError::permanent(reason)
    } else {
        DispatchError::transient(reason)
    }
}

#[cfg(test)]
mod tests {
    use mailflow_domain::DispatchFailureKind;

    use super::*;

    fn make_email(to: &str) -> OutgoingEmail {
        OutgoingEmail {
            to:        to.to_string(),
            subject:   "アカウントを作成しました".to_string(),
            html_body: "<p>Ada</p>".to_string(),
            dedup_key: "059f36b4-87a3-44ab-83d2-661975830a7d".to_string(),
        }
    }

    #[test]
    fn トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SmtpEmailDispatcher>();
    }

    #[tokio::test]
    async fn 宛先アドレスが不正な場合は恒久的な失敗になる() {
        let dispatcher =
            SmtpEmailDispatcher::new("localhost", 1025, "noreply@example.com".to_string());

        let result = dispatcher.send_email(&make_email("not an address")).await;

        let error = result.unwrap_err();
        assert_eq!(error.kind(), DispatchFailureKind::Permanent);
    }

    #[tokio::test]
    async fn message_idに重複排除キーが使われる() {
        let dispatcher =
            SmtpEmailDispatcher::new("localhost", 1025, "noreply@example.com".to_string());

        let message = dispatcher
            .build_message(&make_email("ada@example.com"))
            .unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();

        assert!(formatted.contains(
            "Message-ID: <059f36b4-87a3-44ab-83d2-661975830a7d@example.com>"
        ));
    }
}

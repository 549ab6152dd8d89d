//! SES メール送信実装
//!
//! AWS SES v2 API を使用してメールを送信する。
//! 本番環境で使用する。

use async_trait::async_trait;
use aws_sdk_sesv2::{
    Client,
    config::http::HttpResponse,
    error::SdkError,
    operation::send_email::SendEmailError,
    types::{Body, Content, Destination, EmailContent, Message, MessageTag},
};
use mailflow_domain::{DispatchError, DispatchFailureKind, account_email::OutgoingEmail};

use super::{EmailDispatcher, sanitize_dedup_key};

/// 重複排除キーを格納するメッセージタグ名
const DEDUP_TAG_NAME: &str = "message_id";

/// SES メール送信
///
/// `aws_sdk_sesv2::Client` をラップする。
pub struct SesEmailDispatcher {
    client:       Client,
    from_address: String,
}

impl SesEmailDispatcher {
    /// 新しい SES 送信インスタンスを作成
    ///
    /// # 引数
    ///
    /// - `client`: AWS SES v2 クライアント
    /// - `from_address`: 送信元メールアドレス（SES で検証済みであること）
    pub fn new(client: Client, from_address: String) -> Self {
        Self {
            client,
            from_address,
        }
    }
}

#[async_trait]
impl EmailDispatcher for SesEmailDispatcher {
    async fn send_email(&self, email: &OutgoingEmail) -> Result<(), DispatchError> {
        let destination = Destination::builder().to_addresses(&email.to).build();

        let subject = Content::builder()
            .data(&email.subject)
            .build()
            .map_err(|e| DispatchError::permanent(format!("件名構築失敗: {e}")))?;
        let html = Content::builder()
            .data(&email.html_body)
            .build()
            .map_err(|e| DispatchError::permanent(format!("HTML 本文構築失敗: {e}")))?;

        let content = EmailContent::builder()
            .simple(
                Message::builder()
                    .subject(subject)
                    .body(Body::builder().html(html).build())
                    .build(),
            )
            .build();

        let dedup_tag = MessageTag::builder()
            .name(DEDUP_TAG_NAME)
            .value(sanitize_dedup_key(&email.dedup_key))
            .build()
            .map_err(|e| DispatchError::permanent(format!("メッセージタグ構築失敗: {e}")))?;

        self.client
            .send_email()
            .from_email_address(&self.from_address)
            .destination(destination)
            .content(content)
            .email_tags(dedup_tag)
            .send()
            .await
            .map_err(|e| {
                let reason = format!("SES 送信失敗: {e}");
                match classify_send_error(&e) {
                    DispatchFailureKind::Transient => DispatchError::transient(reason),
                    DispatchFailureKind::Permanent => DispatchError::permanent(reason),
                }
            })?;

        Ok(())
    }
}

/// SES の送信エラーを一時的 / 恒久的に分類する
///
/// - スロットリング（TooManyRequests / LimitExceeded）と 5xx は一時的
/// - タイムアウト、接続失敗、レスポンス解釈失敗は一時的
/// - メッセージ拒否、送信元未検証、アカウント停止などその他のサービスエラーは恒久的
/// - リクエスト構築失敗は恒久的
fn classify_send_error(error: &SdkError<SendEmailError, HttpResponse>) -> DispatchFailureKind {
    match error {
        SdkError::ServiceError(service) => {
            let err = service.err();
            if err.is_too_many_requests_exception()
                || err.is_limit_exceeded_exception()
                || service.raw().status().is_server_error()
            {
                DispatchFailureKind::Transient
            } else {
                DispatchFailureKind::Permanent
            }
        }
        SdkError::ConstructionFailure(_) => DispatchFailureKind::Permanent,
        _ => DispatchFailureKind::Transient,
    }
}

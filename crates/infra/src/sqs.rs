//! # SQS 接続管理
//!
//! Amazon SQS / LocalStack からのメッセージ受信と削除を行う。
//!
//! ## 設計方針
//!
//! - **ローカル開発**: LocalStack を使用（`SQS_ENDPOINT_URL` で接続先を指定）
//! - **本番環境**: エンドポイント未指定で AWS SQS に接続
//! - **削除は呼び出し側が決める**: 受信したメッセージは処理結果が確定するまで削除しない。
//!   可視性タイムアウトが切れると再配信される
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use mailflow_infra::sqs::{self, SqsConnection, SqsMessageQueue, ReceiveOptions};
//!
//! async fn setup() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = sqs::create_client(&SqsConnection::local("http://localhost:4566")).await;
//!     let queue_url = sqs::get_queue_url(&client, "account-email").await?;
//!     let queue = SqsMessageQueue::new(client, queue_url, ReceiveOptions::default());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use aws_sdk_sqs::{
    Client,
    config::Credentials,
    types::{Message, MessageSystemAttributeName},
};
use mailflow_domain::{account_email::MessageId, batch::QueueMessage};

use crate::InfraError;

/// SQS への接続設定
#[derive(Debug, Clone)]
pub struct SqsConnection {
    /// エンドポイント URL（LocalStack 使用時に設定、未設定で AWS SQS）
    pub endpoint_url:      Option<String>,
    /// リージョン
    pub region:            String,
    /// アクセスキー ID
    pub access_key_id:     String,
    /// シークレットアクセスキー
    pub secret_access_key: String,
}

impl SqsConnection {
    /// LocalStack 向けの接続設定（ダミー認証情報）
    pub fn local(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url:      Some(endpoint_url.into()),
            region:            "us-east-1".to_string(),
            access_key_id:     "test".to_string(),
            secret_access_key: "test".to_string(),
        }
    }
}

/// SQS クライアントを作成する
///
/// `endpoint_url` が指定されていれば LocalStack などのカスタムエンドポイントに接続する。
pub async fn create_client(connection: &SqsConnection) -> Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(connection.region.clone()))
        .credentials_provider(Credentials::new(
            connection.access_key_id.clone(),
            connection.secret_access_key.clone(),
            None,
            None,
            "mailflow",
        ));

    if let Some(endpoint_url) = &connection.endpoint_url {
        loader = loader.endpoint_url(endpoint_url);
    }

    Client::new(&loader.load().await)
}

/// キュー名からキュー URL を取得する
///
/// # エラー
///
/// - キューが存在しない場合は `InfraErrorKind::QueueNotFound`
/// - その他の失敗は `InfraErrorKind::Sqs`
pub async fn get_queue_url(client: &Client, queue_name: &str) -> Result<String, InfraError> {
    match client.get_queue_url().queue_name(queue_name).send().await {
        Ok(output) => output
            .queue_url()
            .map(ToString::to_string)
            .ok_or_else(|| InfraError::sqs(format!("キュー '{queue_name}' の URL が空です"))),
        Err(err) => {
            if err
                .as_service_error()
                .is_some_and(|e| e.is_queue_does_not_exist())
            {
                Err(InfraError::queue_not_found(queue_name))
            } else {
                Err(InfraError::sqs(format!(
                    "キュー '{queue_name}' の URL 取得に失敗: {err}"
                )))
            }
        }
    }
}

/// メッセージ受信オプション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// 1 回の受信で取得する最大件数（1〜10）
    pub max_messages:       i32,
    /// ロングポーリングの待機秒数
    pub wait_time_seconds:  i32,
    /// 可視性タイムアウト秒数
    pub visibility_timeout: i32,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_messages:       10,
            wait_time_seconds:  20,
            visibility_timeout: 30,
        }
    }
}

/// メッセージキューのインターフェース
///
/// ローカルポーラーが使用する。テスト時はモックに差し替え可能。
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// メッセージを受信する（ロングポーリング）
    async fn receive_messages(&self) -> Result<Vec<QueueMessage>, InfraError>;

    /// メッセージを削除する（処理完了の確認応答）
    async fn delete_message(&self, receipt_handle: &str) -> Result<(), InfraError>;
}

/// AWS SQS キュー
pub struct SqsMessageQueue {
    client:    Client,
    queue_url: String,
    options:   ReceiveOptions,
}

impl SqsMessageQueue {
    pub fn new(client: Client, queue_url: String, options: ReceiveOptions) -> Self {
        Self {
            client,
            queue_url,
            options,
        }
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl MessageQueue for SqsMessageQueue {
    async fn receive_messages(&self) -> Result<Vec<QueueMessage>, InfraError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(self.options.max_messages)
            .wait_time_seconds(self.options.wait_time_seconds)
            .visibility_timeout(self.options.visibility_timeout)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| InfraError::sqs(format!("メッセージ受信に失敗: {e}")))?;

        Ok(output.messages().iter().map(to_queue_message).collect())
    }

    async fn delete_message(&self, receipt_handle: &str) -> Result<(), InfraError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| InfraError::sqs(format!("メッセージ削除に失敗: {e}")))?;

        Ok(())
    }
}

/// SDK のメッセージをドメインの [`QueueMessage`] に変換する
fn to_queue_message(message: &Message) -> QueueMessage {
    let receive_count = message
        .attributes()
        .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
        .and_then(|count| count.parse().ok());

    QueueMessage {
        message_id: MessageId::new(message.message_id().unwrap_or_default()),
        body: message.body().map(ToString::to_string),
        receipt_handle: message.receipt_handle().map(ToString::to_string),
        receive_count,
    }
}

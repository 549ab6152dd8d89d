//! # テスト用モック
//!
//! バッチ処理・ポーラーのテストで使用するインメモリ実装。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! mailflow-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use mailflow_domain::{DispatchError, account_email::OutgoingEmail, batch::QueueMessage};

use crate::{InfraError, dispatch::EmailDispatcher, sqs::MessageQueue};

// ===== MockEmailDispatcher =====

/// 送信したメールを記録するモック
///
/// 宛先ごとに失敗を設定できる。遅延を設定するとタイムアウトの検証に使える。
#[derive(Clone, Default)]
pub struct MockEmailDispatcher {
    sent:     Arc<Mutex<Vec<OutgoingEmail>>>,
    failures: Arc<Mutex<HashMap<String, DispatchError>>>,
    delay:    Option<Duration>,
}

impl MockEmailDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 送信ごとに指定時間待機するモックを作成する
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// 指定した宛先への送信を失敗させる
    pub fn fail_for(&self, recipient: impl Into<String>, error: DispatchError) {
        self.failures
            .lock()
            .unwrap()
            .insert(recipient.into(), error);
    }

    /// 送信に成功したメール（送信順）
    pub fn sent_emails(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailDispatcher for MockEmailDispatcher {
    async fn send_email(&self, email: &OutgoingEmail) -> Result<(), DispatchError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failures.lock().unwrap().get(&email.to) {
            return Err(error.clone());
        }

        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

// ===== MockMessageQueue =====

/// 受信バッチを事前に積んでおくキューのモック
///
/// 積んだバッチを使い切った後は空のバッチを返す。
#[derive(Clone, Default)]
pub struct MockMessageQueue {
    batches:       Arc<Mutex<VecDeque<Result<Vec<QueueMessage>, String>>>>,
    deleted:       Arc<Mutex<Vec<String>>>,
    receive_calls: Arc<Mutex<usize>>,
}

impl MockMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 次回の受信で返すバッチを積む
    pub fn push_batch(&self, messages: Vec<QueueMessage>) {
        self.batches.lock().unwrap().push_back(Ok(messages));
    }

    /// 次回の受信を失敗させる
    pub fn push_receive_error(&self, message: impl Into<String>) {
        self.batches.lock().unwrap().push_back(Err(message.into()));
    }

    /// 削除された受信ハンドル（削除順）
    pub fn deleted_handles(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    /// 受信が呼ばれた回数
    pub fn receive_calls(&self) -> usize {
        *self.receive_calls.lock().unwrap()
    }
}

#[async_trait]
impl MessageQueue for MockMessageQueue {
    async fn receive_messages(&self) -> Result<Vec<QueueMessage>, InfraError> {
        *self.receive_calls.lock().unwrap() += 1;

        match self.batches.lock().unwrap().pop_front() {
            Some(Ok(messages)) => Ok(messages),
            Some(Err(message)) => Err(InfraError::sqs(message)),
            None => Ok(Vec::new()),
        }
    }

    async fn delete_message(&self, receipt_handle: &str) -> Result<(), InfraError> {
        self.deleted.lock().unwrap().push(receipt_handle.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mailflow_domain::account_email::MessageId;

    use super::*;

    fn make_email(to: &str) -> OutgoingEmail {
        OutgoingEmail {
            to:        to.to_string(),
            subject:   "件名".to_string(),
            html_body: "<p>本文</p>".to_string(),
            dedup_key: "msg-1".to_string(),
        }
    }

    #[tokio::test]
    async fn mock_email_dispatcherが送信メールを記録する() {
        let dispatcher = MockEmailDispatcher::new();

        dispatcher.send_email(&make_email("ada@example.com")).await.unwrap();

        assert_eq!(dispatcher.sent_emails().len(), 1);
    }

    #[tokio::test]
    async fn mock_email_dispatcherは指定した宛先で失敗する() {
        let dispatcher = MockEmailDispatcher::new();
        dispatcher.fail_for("bounce@example.com", DispatchError::permanent("rejected"));

        let result = dispatcher.send_email(&make_email("bounce@example.com")).await;

        assert_eq!(result, Err(DispatchError::permanent("rejected")));
        assert!(dispatcher.sent_emails().is_empty());
    }

    #[tokio::test]
    async fn mock_message_queueは積んだ順にバッチを返す() {
        let queue = MockMessageQueue::new();
        queue.push_batch(vec![QueueMessage {
            message_id:     MessageId::new("msg-1"),
            body:           None,
            receipt_handle: Some("h-1".to_string()),
            receive_count:  None,
        }]);
        queue.push_receive_error("接続拒否");

        assert_eq!(queue.receive_messages().await.unwrap().len(), 1);
        assert!(queue.receive_messages().await.is_err());
        assert!(queue.receive_messages().await.unwrap().is_empty());
        assert_eq!(queue.receive_calls(), 3);
    }
}

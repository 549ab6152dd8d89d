//! # バッチ入出力
//!
//! 1 回の呼び出しで受け取るメッセージのバッチと、処理結果の部分失敗レポートを定義する。
//!
//! ## 部分失敗レポート
//!
//! 呼び出し元（キューのイベントソース）は、レポートに列挙されたメッセージ ID だけを
//! 再配信し、列挙されなかったメッセージは成功としてキューから削除する。
//!
//! ```json
//! { "batchItemFailures": [ { "itemIdentifier": "msg-2" } ] }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{FailureClass, ProcessingError, account_email::MessageId};

/// キューイベント
///
/// バッチトリガーの呼び出しホストが渡すイベントの形式。
/// `Records` が存在しない場合は空のバッチとして扱う。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SqsEvent {
    #[serde(rename = "Records", default)]
    pub records: Option<Vec<SqsRecord>>,
}

/// キューイベント内の 1 レコード
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqsRecord {
    /// 空文字列の場合、呼び出しホストは失敗報告を不正とみなしバッチ全体を再配信する
    #[serde(default)]
    pub message_id:     String,
    pub receipt_handle: Option<String>,
    pub body:           Option<String>,
    #[serde(default)]
    pub attributes:     HashMap<String, String>,
}

/// 処理対象のメッセージ
///
/// キューイベントのレコード、またはポーリングで受信したメッセージから生成する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id:     MessageId,
    /// 本文（欠落している場合は `MalformedPayload` として失敗させる）
    pub body:           Option<String>,
    /// 受信ハンドル（ポーリングでの削除に使用）
    pub receipt_handle: Option<String>,
    /// おおよその受信回数（再配信の観測用）
    pub receive_count:  Option<u32>,
}

impl From<SqsRecord> for QueueMessage {
    fn from(record: SqsRecord) -> Self {
        let receive_count = record
            .attributes
            .get("ApproximateReceiveCount")
            .and_then(|count| count.parse().ok());

        Self {
            message_id: MessageId::new(record.message_id),
            body: record.body,
            receipt_handle: record.receipt_handle,
            receive_count,
        }
    }
}

/// 1 メッセージの処理結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// 送信完了（キューから削除してよい）
    Success,
    /// 失敗（再配信またはデッドレター退避の対象）
    Failure,
}

/// 失敗の詳細
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    /// エラー種別（例: `malformed_payload`）
    pub kind:   &'static str,
    /// 再試行可否の分類
    pub class:  FailureClass,
    /// 人間可読なメッセージ
    pub detail: String,
}

impl From<&ProcessingError> for ItemError {
    fn from(error: &ProcessingError) -> Self {
        Self {
            kind:   error.kind(),
            class:  error.class(),
            detail: error.to_string(),
        }
    }
}

/// メッセージ 1 件の処理結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItemResult {
    pub message_id: MessageId,
    pub outcome:    ItemOutcome,
    pub error:      Option<ItemError>,
}

impl BatchItemResult {
    pub fn success(message_id: MessageId) -> Self {
        Self {
            message_id,
            outcome: ItemOutcome::Success,
            error: None,
        }
    }

    pub fn failure(message_id: MessageId, error: &ProcessingError) -> Self {
        Self {
            message_id,
            outcome: ItemOutcome::Failure,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == ItemOutcome::Success
    }

    /// 恒久的な失敗（ポイズンメッセージ候補）かどうか
    pub fn is_permanent_failure(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|error| error.class == FailureClass::Permanent)
    }
}

/// バッチ全体の結果区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BatchStatus {
    /// メッセージなし
    Empty,
    /// 全件成功
    AllSucceeded,
    /// 一部失敗
    PartiallyFailed,
    /// 全件失敗
    AllFailed,
}

/// バッチ処理レポート
///
/// 入力と同じ順序で各メッセージの結果を保持する。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    items: Vec<BatchItemResult>,
}

impl BatchReport {
    pub fn new(items: Vec<BatchItemResult>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[BatchItemResult] {
        &self.items
    }

    /// 成功件数
    pub fn processed(&self) -> usize {
        self.items.iter().filter(|item| item.is_success()).count()
    }

    /// 失敗件数
    pub fn failed(&self) -> usize {
        self.items.len() - self.processed()
    }

    /// 失敗したメッセージ ID（入力順）
    pub fn failed_ids(&self) -> Vec<&MessageId> {
        self.items
            .iter()
            .filter(|item| !item.is_success())
            .map(|item| &item.message_id)
            .collect()
    }

    pub fn status(&self) -> BatchStatus {
        match (self.processed(), self.failed()) {
            (0, 0) => BatchStatus::Empty,
            (_, 0) => BatchStatus::AllSucceeded,
            (0, _) => BatchStatus::AllFailed,
            _ => BatchStatus::PartiallyFailed,
        }
    }

    /// 呼び出しホスト向けの部分失敗レスポンスに変換する
    pub fn to_batch_response(&self) -> SqsBatchResponse {
        SqsBatchResponse {
            batch_item_failures: self
                .failed_ids()
                .into_iter()
                .map(|id| BatchItemFailure {
                    item_identifier: id.as_str().to_string(),
                })
                .collect(),
        }
    }
}

/// 部分失敗レスポンス
///
/// 失敗したメッセージ ID のみを列挙する。列挙されていない ID は暗黙的に成功。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqsBatchResponse {
    pub batch_item_failures: Vec<BatchItemFailure>,
}

/// 部分失敗レスポンスの 1 要素
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

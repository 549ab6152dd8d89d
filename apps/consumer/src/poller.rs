//! # ローカルポーラー
//!
//! SQS（ローカル開発では LocalStack）をロングポーリングし、受信したバッチを
//! [`BatchProcessor`] で処理する開発用ハーネス。
//!
//! ## 設計方針
//!
//! - **確認応答は結果確定後**: バッチの処理結果が出てから削除する。処理中に停止しても
//!   未削除のメッセージは可視性タイムアウト後に再配信される
//! - **削除ポリシー**: 成功したメッセージは削除する。恒久的な失敗（ポイズンメッセージ）は
//!   設定に従って削除する。一時的な失敗は削除せず再配信に委ねる
//! - **受信エラー時は待機**: 受信に失敗した場合は一定時間待ってから再試行する
//! - **グレースフルシャットダウン**: 停止シグナルはバッチの合間で判定し、処理中のバッチは完了させる

use std::{future::Future, sync::Arc, time::Duration};

use mailflow_domain::batch::{BatchReport, QueueMessage};
use mailflow_infra::{InfraError, sqs::MessageQueue};
use mailflow_shared::{event_log::event, log_business_event};

use crate::usecase::BatchProcessor;

/// 受信エラー後の待機時間の既定値
pub const DEFAULT_RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// ポーラーの累計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    /// 処理したバッチ数（空のバッチを除く）
    pub batches:   usize,
    /// 送信に成功したメッセージ数
    pub processed: usize,
    /// 失敗したメッセージ数
    pub failed:    usize,
    /// キューから削除したメッセージ数
    pub deleted:   usize,
}

/// ローカルポーラー
pub struct QueuePoller {
    queue:                  Arc<dyn MessageQueue>,
    processor:              BatchProcessor,
    delete_poison_messages: bool,
    receive_error_backoff:  Duration,
}

impl QueuePoller {
    /// 新しいポーラーを作成
    ///
    /// # 引数
    ///
    /// - `queue`: 受信元のキュー
    /// - `processor`: バッチ処理
    /// - `delete_poison_messages`: 恒久的に失敗したメッセージを削除するか
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        processor: BatchProcessor,
        delete_poison_messages: bool,
    ) -> Self {
        Self {
            queue,
            processor,
            delete_poison_messages,
            receive_error_backoff: DEFAULT_RECEIVE_ERROR_BACKOFF,
        }
    }

    /// 受信エラー後の待機時間を変更する
    pub fn with_receive_error_backoff(mut self, backoff: Duration) -> Self {
        self.receive_error_backoff = backoff;
        self
    }

    /// 停止シグナルを受け取るまでポーリングを続ける
    ///
    /// 停止時に累計をログ出力して返す。
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> PollerStats {
        tokio::pin!(shutdown);
        let mut stats = PollerStats::default();

        tracing::info!("ポーリングを開始します");

        loop {
            let received = tokio::select! {
                biased;
                () = &mut shutdown => break,
                received = self.queue.receive_messages() => received,
            };

            match received {
                Ok(messages) if messages.is_empty() => {}
                Ok(messages) => {
                    let batch = self.process(&messages).await;
                    stats.batches += 1;
                    stats.processed += batch.processed;
                    stats.failed += batch.failed;
                    stats.deleted += batch.deleted;
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        backoff_secs = self.receive_error_backoff.as_secs(),
                        "メッセージ受信に失敗したため待機します"
                    );
                    tokio::select! {
                        biased;
                        () = &mut shutdown => break,
                        () = tokio::time::sleep(self.receive_error_backoff) => {}
                    }
                }
            }
        }

        tracing::info!(
            batches = stats.batches,
            processed = stats.processed,
            failed = stats.failed,
            deleted = stats.deleted,
            "ポーリングを停止しました"
        );
        stats
    }

    /// 1 回受信し、受信したバッチを処理して確認応答する
    ///
    /// 受信したメッセージがない場合は `None` を返す。
    pub async fn poll_once(&self) -> Result<Option<PolledBatch>, InfraError> {
        let messages = self.queue.receive_messages().await?;
        if messages.is_empty() {
            return Ok(None);
        }

        Ok(Some(self.process(&messages).await))
    }

    /// 受信したバッチを処理して確認応答する
    async fn process(&self, messages: &[QueueMessage]) -> PolledBatch {
        tracing::info!(count = messages.len(), "メッセージを受信");

        let report = self.processor.process_batch(messages).await;
        let deleted = self.acknowledge(messages, &report).await;

        PolledBatch {
            processed: report.processed(),
            failed: report.failed(),
            deleted,
        }
    }

    /// 削除ポリシーに従ってメッセージを削除し、削除件数を返す
    async fn acknowledge(&self, messages: &[QueueMessage], report: &BatchReport) -> usize {
        let mut deleted = 0;

        for (message, item) in messages.iter().zip(report.items()) {
            let poison = item.is_permanent_failure();
            if !(item.is_success() || (poison && self.delete_poison_messages)) {
                continue;
            }

            let Some(receipt_handle) = message.receipt_handle.as_deref() else {
                tracing::warn!(
                    message_id = %message.message_id,
                    "受信ハンドルがないため削除できません"
                );
                continue;
            };

            if let Err(e) = self.queue.delete_message(receipt_handle).await {
                tracing::error!(
                    error = %e,
                    message_id = %message.message_id,
                    "メッセージの削除に失敗"
                );
                continue;
            }

            deleted += 1;
            let action = if poison {
                event::action::POISON_MESSAGE_DELETED
            } else {
                event::action::MESSAGE_DELETED
            };
            log_business_event!(
                event.category = event::category::QUEUE,
                event.action = action,
                event.result = event::result::SUCCESS,
                event.message_id = %message.message_id,
                "メッセージをキューから削除"
            );
        }

        deleted
    }
}

/// 1 回のポーリングで処理したバッチの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolledBatch {
    pub processed: usize,
    pub failed:    usize,
    pub deleted:   usize,
}

/// SIGINT / SIGTERM を待つ
///
/// シグナルハンドラを登録できない場合は、そのシグナルを待たない。
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "SIGINT ハンドラの登録に失敗");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM ハンドラの登録に失敗");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("SIGINT を受信しました"),
        () = terminate => tracing::info!("SIGTERM を受信しました"),
    }
}

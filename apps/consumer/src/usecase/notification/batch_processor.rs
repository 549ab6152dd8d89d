//! # バッチ処理
//!
//! 1 回の呼び出しで受け取ったメッセージを 1 件ずつ パース → レンダリング → 送信 し、
//! 部分失敗レポートを生成する。
//!
//! ## 設計方針
//!
//! - **失敗の隔離**: どのエラーもメッセージ境界で捕捉し、バッチ全体は中断しない
//! - **入力順の維持**: 同時実行数を増やしてもレポートは入力と同じ順序になる
//! - **再実行に安全**: 永続化する状態を持たない。メッセージ ID を重複排除キーとして送信側に渡す
//! - **送信タイムアウト**: 応答しない送信は一時的な失敗として扱い、再配信に委ねる
//!
//! ## メッセージの状態遷移
//!
//! ```text
//! Received → Parsed → Rendered → Dispatched → Acknowledged
//!     │         │          │           │
//!     └─────────┴──────────┴───────────┴────→ Failed
//! ```

use std::{sync::Arc, time::Duration};

use futures::{StreamExt, stream};
use mailflow_domain::{
    DispatchError,
    ProcessingError,
    account_email::{AccountEmailRequest, OutgoingEmail},
    batch::{BatchItemResult, BatchReport, QueueMessage},
    payload,
};
use mailflow_infra::dispatch::EmailDispatcher;
use mailflow_shared::{event_log::event, log_business_event};
use tracing::Instrument;

use super::{TemplateRenderer, TemplateSource};

/// バッチ処理
///
/// テンプレートレンダラーと送信コラボレーターを保持し、メッセージのバッチを処理する。
pub struct BatchProcessor {
    renderer:         TemplateRenderer,
    dispatcher:       Arc<dyn EmailDispatcher>,
    concurrency:      usize,
    dispatch_timeout: Duration,
}

impl BatchProcessor {
    /// 新しいバッチ処理インスタンスを作成
    ///
    /// # 引数
    ///
    /// - `renderer`: テンプレートレンダラー
    /// - `dispatcher`: メール送信コラボレーター
    /// - `concurrency`: バッチ内で同時に処理するメッセージ数（0 は 1 として扱う）
    /// - `dispatch_timeout`: 1 件の送信に許容する時間
    pub fn new(
        renderer: TemplateRenderer,
        dispatcher: Arc<dyn EmailDispatcher>,
        concurrency: usize,
        dispatch_timeout: Duration,
    ) -> Self {
        Self {
            renderer,
            dispatcher,
            concurrency: concurrency.max(1),
            dispatch_timeout,
        }
    }

    /// レンダラーが使用するテンプレートの取得元
    pub fn template_source(&self) -> &TemplateSource {
        self.renderer.source()
    }

    /// メッセージのバッチを処理する
    ///
    /// 空のバッチは空のレポートを返す。レポートは入力と同じ順序で各メッセージの結果を持つ。
    pub async fn process_batch(&self, messages: &[QueueMessage]) -> BatchReport {
        let items: Vec<BatchItemResult> = stream::iter(messages)
            .map(|message| self.process_message(message))
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = BatchReport::new(items);
        let result = if report.failed() == 0 {
            event::result::SUCCESS
        } else {
            event::result::FAILURE
        };

        log_business_event!(
            event.category = event::category::QUEUE,
            event.action = event::action::BATCH_COMPLETED,
            event.result = result,
            batch.status = %report.status(),
            batch.size = messages.len(),
            batch.processed = report.processed(),
            batch.failed = report.failed(),
            "バッチ処理完了"
        );

        report
    }

    /// メッセージ 1 件を処理し、結果を返す
    async fn process_message(&self, message: &QueueMessage) -> BatchItemResult {
        let span = tracing::info_span!(
            "process_message",
            message_id = %message.message_id,
            receive_count = message.receive_count
        );

        async {
            match self.try_process(message).await {
                Ok(request) => {
                    log_business_event!(
                        event.category = event::category::NOTIFICATION,
                        event.action = event::action::NOTIFICATION_SENT,
                        event.result = event::result::SUCCESS,
                        event.message_id = %message.message_id,
                        notification.event_type = %request.event_type(),
                        notification.template_variant = %request.template_variant(),
                        notification.recipient = %request.recipient(),
                        "通知メール送信成功"
                    );
                    BatchItemResult::success(message.message_id.clone())
                }
                Err(e) => {
                    log_business_event!(
                        event.category = event::category::NOTIFICATION,
                        event.action = event::action::NOTIFICATION_FAILED,
                        event.result = event::result::FAILURE,
                        event.message_id = %message.message_id,
                        error.kind = e.kind(),
                        error.class = %e.class(),
                        error = %e,
                        "通知メール送信失敗"
                    );
                    BatchItemResult::failure(message.message_id.clone(), &e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// パース → レンダリング → 送信
    async fn try_process(
        &self,
        message: &QueueMessage,
    ) -> Result<AccountEmailRequest, ProcessingError> {
        let body = message.body.as_deref().ok_or_else(|| {
            ProcessingError::MalformedPayload("メッセージ本文がありません".to_string())
        })?;

        let request = payload::parse(message.message_id.clone(), body.as_bytes())?;
        tracing::debug!(
            template_variant = %request.template_variant(),
            event_type = %request.event_type(),
            source = request.metadata().source.as_deref(),
            "メッセージをパースしました"
        );

        let rendered = self.renderer.render(&request).await?;
        let email = OutgoingEmail::new(&request, rendered);

        self.dispatch(&email).await?;
        Ok(request)
    }

    /// タイムアウト付きで送信する
    async fn dispatch(&self, email: &OutgoingEmail) -> Result<(), DispatchError> {
        tokio::time::timeout(self.dispatch_timeout, self.dispatcher.send_email(email))
            .await
            .unwrap_or_else(|_| {
                Err(DispatchError::transient(format!(
                    "送信が {} ミリ秒以内に完了しませんでした",
                    self.dispatch_timeout.as_millis()
                )))
            })
    }
}

//! # Mailflow Consumer Lambda 関数
//!
//! SQS イベントソースマッピングから呼び出され、バッチを処理して部分失敗レスポンス
//! （`batchItemFailures`）を返す。イベントソースマッピングでは
//! `ReportBatchItemFailures` を有効にすること。
//!
//! 環境変数はローカルポーラーと共通（`SQS_*` は SES のリージョン以外使用しない）。
//!
//! ```bash
//! cargo lambda build --release --bin lambda
//! ```

use anyhow::Context as _;
use lambda_runtime::{LambdaEvent, service_fn};
use mailflow_consumer::{app_builder, config::ConsumerConfig, handler};
use mailflow_domain::batch::{SqsBatchResponse, SqsEvent};
use mailflow_shared::observability::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(&TracingConfig::from_env("mailflow-lambda"));

    let config = ConsumerConfig::from_env().context("設定の読み込みに失敗しました")?;

    // 依存コンポーネントはコールドスタート時に 1 回だけ初期化し、呼び出し間で共有する
    let dispatcher = app_builder::build_dispatcher(&config).await;
    let processor = app_builder::build_processor(&config, dispatcher);
    let processor = &processor;

    tracing::info!("Mailflow Consumer Lambda を起動します");

    lambda_runtime::run(service_fn(
        move |event: LambdaEvent<SqsEvent>| async move {
            tracing::debug!(request_id = %event.context.request_id, "呼び出しを受信");
            Ok::<SqsBatchResponse, lambda_runtime::Error>(
                handler::handle_sqs_event(processor, event.payload).await,
            )
        },
    ))
    .await
    .map_err(|e| anyhow::anyhow!(e))
}

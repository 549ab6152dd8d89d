//! # Mailflow Consumer ローカルポーラー
//!
//! SQS キュー（既定では LocalStack）をロングポーリングし、受信したメッセージを
//! メールに変換して送信する。
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `SQS_QUEUE_NAME` | **Yes** | 受信するキュー名 |
//! | `SQS_ENDPOINT_URL` | No | エンドポイント（デフォルト: `http://localhost:4566`、空で AWS SQS） |
//! | `SQS_REGION` | No | リージョン（デフォルト: `us-east-1`） |
//! | `SQS_POLL_WAIT_TIME` | No | ロングポーリング秒数（デフォルト: `20`） |
//! | `SQS_VISIBILITY_TIMEOUT` | No | 可視性タイムアウト秒数（デフォルト: `30`） |
//! | `SQS_DELETE_POISON_MESSAGES` | No | 恒久的な失敗を削除するか（デフォルト: `true`） |
//! | `DISPATCH_BACKEND` | No | `ses` / `smtp` / `noop`（デフォルト: `noop`） |
//! | `TEMPLATE_DIR` | No | テンプレートのディレクトリ（未設定の場合は同梱テンプレート） |
//! | `LOG_LEVEL` / `LOG_FORMAT` | No | ログレベル / `json` or `pretty` |
//!
//! ## 起動方法
//!
//! ```bash
//! # 開発環境（LocalStack + Noop 送信）
//! SQS_QUEUE_NAME=account-email cargo run -p mailflow-consumer
//!
//! # Mailpit に送信
//! SQS_QUEUE_NAME=account-email DISPATCH_BACKEND=smtp cargo run -p mailflow-consumer
//! ```

use std::sync::Arc;

use anyhow::Context as _;
use mailflow_consumer::{
    app_builder,
    config::ConsumerConfig,
    poller::{self, QueuePoller},
};
use mailflow_infra::sqs::{self, SqsMessageQueue};
use mailflow_shared::observability::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    init_tracing(&TracingConfig::from_env("mailflow-consumer"));

    let config = ConsumerConfig::from_env().context("設定の読み込みに失敗しました")?;
    let queue_name = config.sqs.require_queue_name()?;

    tracing::info!(
        queue = queue_name,
        endpoint = config.sqs.endpoint_url.as_deref().unwrap_or("aws"),
        region = %config.sqs.region,
        "Mailflow Consumer を起動します"
    );

    let client = sqs::create_client(&config.sqs.connection()).await;
    let queue_url = sqs::get_queue_url(&client, queue_name)
        .await
        .with_context(|| format!("キュー '{queue_name}' に接続できません"))?;
    tracing::info!(queue_url = %queue_url, "キューに接続しました");

    let queue = SqsMessageQueue::new(client, queue_url, config.sqs.receive_options());
    let dispatcher = app_builder::build_dispatcher(&config).await;
    let processor = app_builder::build_processor(&config, dispatcher);

    let poller = QueuePoller::new(
        Arc::new(queue),
        processor,
        config.sqs.delete_poison_messages,
    );
    let stats = poller.run(poller::shutdown_signal()).await;

    tracing::info!(
        processed = stats.processed,
        failed = stats.failed,
        "Mailflow Consumer を停止しました"
    );
    Ok(())
}

//! # 依存コンポーネントの組み立て
//!
//! 設定から送信コラボレーターとバッチ処理を構築する。
//! ポーラーと呼び出しハーネスの両方から使用する。

use std::sync::Arc;

use mailflow_infra::dispatch::{
    EmailDispatcher,
    NoopEmailDispatcher,
    SesEmailDispatcher,
    SmtpEmailDispatcher,
};

use crate::{
    config::{ConsumerConfig, DispatchBackend},
    usecase::{BatchProcessor, TemplateRenderer},
};

/// 設定に従って送信コラボレーターを作成する
///
/// SES の認証情報は AWS SDK の標準の解決順（環境変数、プロファイル、IAM ロール）に従う。
pub async fn build_dispatcher(config: &ConsumerConfig) -> Arc<dyn EmailDispatcher> {
    let dispatch = &config.dispatch;

    match dispatch.backend {
        DispatchBackend::Ses => {
            let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(aws_config::Region::new(config.sqs.region.clone()))
                .load()
                .await;
            let client = aws_sdk_sesv2::Client::new(&aws_config);
            tracing::info!(from = %dispatch.from_address, "SES 送信を使用します");
            Arc::new(SesEmailDispatcher::new(client, dispatch.from_address.clone()))
        }
        DispatchBackend::Smtp => {
            tracing::info!(
                host = %dispatch.smtp_host,
                port = dispatch.smtp_port,
                "SMTP 送信を使用します"
            );
            Arc::new(SmtpEmailDispatcher::new(
                &dispatch.smtp_host,
                dispatch.smtp_port,
                dispatch.from_address.clone(),
            ))
        }
        DispatchBackend::Noop => {
            tracing::info!("Noop 送信を使用します（メールは送信されません）");
            Arc::new(NoopEmailDispatcher)
        }
    }
}

/// 設定に従ってバッチ処理を作成する
pub fn build_processor(
    config: &ConsumerConfig,
    dispatcher: Arc<dyn EmailDispatcher>,
) -> BatchProcessor {
    let renderer = match &config.template_dir {
        Some(dir) => TemplateRenderer::from_dir(dir.clone()),
        None => TemplateRenderer::bundled(),
    };

    tracing::info!(
        template_source = ?renderer.source(),
        concurrency = config.batch_concurrency,
        dispatch_timeout_secs = config.dispatch.timeout.as_secs(),
        "バッチ処理を構成します"
    );

    BatchProcessor::new(
        renderer,
        dispatcher,
        config.batch_concurrency,
        config.dispatch.timeout,
    )
}

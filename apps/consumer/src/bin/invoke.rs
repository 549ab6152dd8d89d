//! # キューイベントの手動呼び出し
//!
//! キューイベントの JSON をファイルまたは標準入力から読み込み、呼び出しホストと同じ
//! 経路で処理して部分失敗レスポンスを標準出力に書き出す。
//!
//! ```bash
//! cargo run -p mailflow-consumer --bin invoke -- event.json
//! cat event.json | cargo run -p mailflow-consumer --bin invoke
//! ```

use anyhow::Context as _;
use mailflow_consumer::{app_builder, config::ConsumerConfig, handler};
use mailflow_shared::observability::{TracingConfig, init_tracing};
use tokio::io::AsyncReadExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing(&TracingConfig::from_env("mailflow-invoke"));

    let config = ConsumerConfig::from_env().context("設定の読み込みに失敗しました")?;

    let raw_event = match std::env::args().nth(1) {
        Some(path) => tokio::fs::read(&path)
            .await
            .with_context(|| format!("イベントファイル '{path}' を読み込めません"))?,
        None => {
            let mut buffer = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buffer)
                .await
                .context("標準入力からイベントを読み込めません")?;
            buffer
        }
    };

    let dispatcher = app_builder::build_dispatcher(&config).await;
    let processor = app_builder::build_processor(&config, dispatcher);

    let response = handler::handle_sqs_event_json(&processor, &raw_event)
        .await
        .context("キューイベントの JSON が不正です")?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

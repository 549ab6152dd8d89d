//! # 呼び出しハンドラ
//!
//! バッチトリガーの呼び出しホストから渡されるキューイベントを処理し、
//! 部分失敗レスポンスを返す。
//!
//! ## 設計方針
//!
//! - **薄いハンドラ**: イベントを [`QueueMessage`] に変換して [`BatchProcessor`] に渡すだけ
//! - **`Records` の欠落は空バッチ**: エラー応答（呼び出し失敗）にはせず、エラーログを出力して
//!   失敗なしのレスポンスを返す。呼び出し失敗はバッチ全体の再配信になるため
//! - **本文の欠落はメッセージ単位の失敗**: 該当メッセージだけが `MalformedPayload` になる

use mailflow_domain::batch::{QueueMessage, SqsBatchResponse, SqsEvent};

use crate::usecase::BatchProcessor;

/// キューイベントを処理する
///
/// 成功したメッセージは列挙せず、失敗したメッセージ ID だけを `batchItemFailures` に含める。
pub async fn handle_sqs_event(processor: &BatchProcessor, event: SqsEvent) -> SqsBatchResponse {
    let Some(records) = event.records else {
        tracing::error!("Records を含まないイベントを受信したため、空のバッチとして扱います");
        return SqsBatchResponse::default();
    };

    let messages: Vec<QueueMessage> = records.into_iter().map(QueueMessage::from).collect();
    tracing::info!(count = messages.len(), "キューイベントを受信");

    let response = processor.process_batch(&messages).await.to_batch_response();

    tracing::info!(
        failures = response.batch_item_failures.len(),
        "キューイベントの処理を完了"
    );
    response
}

/// JSON 文字列のキューイベントを処理する
///
/// # エラー
///
/// イベントが JSON として解釈できない場合は `serde_json::Error` を返す。
pub async fn handle_sqs_event_json(
    processor: &BatchProcessor,
    raw_event: &[u8],
) -> Result<SqsBatchResponse, serde_json::Error> {
    let event: SqsEvent = serde_json::from_slice(raw_event)?;
    Ok(handle_sqs_event(processor, event).await)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use mailflow_domain::batch::BatchItemFailure;
    use mailflow_infra::mock::MockEmailDispatcher;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::usecase::TemplateRenderer;

    fn make_processor() -> BatchProcessor {
        BatchProcessor::new(
            TemplateRenderer::bundled(),
            Arc::new(MockEmailDispatcher::new()),
            1,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn recordsのないイベントは失敗なしのレスポンスになる() {
        let response = handle_sqs_event_json(&make_processor(), b"{}").await.unwrap();

        assert_eq!(response, SqsBatchResponse::default());
    }

    #[tokio::test]
    async fn 本文のないレコードは失敗として報告される() {
        let event = json!({
            "Records": [
                {
                    "messageId": "msg-1",
                    "receiptHandle": "handle-1",
                    "attributes": {"ApproximateReceiveCount": "1"},
                    "eventSourceARN": "arn:aws:sqs:us-east-1:000000000000:account-email"
                }
            ]
        });

        let response = handle_sqs_event_json(&make_processor(), event.to_string().as_bytes())
            .await
            .unwrap();

        assert_eq!(
            response.batch_item_failures,
            vec![BatchItemFailure {
                item_identifier: "msg-1".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn lambdaのsqsイベントを処理できる() {
        // イベントソースマッピングが渡す形式（レコードの全フィールドを含む）
        let body = json!({
            "data": {
                "recipient": "ada@example.com",
                "template_variant": "responsive_markup",
                "event_type": "account_created",
                "template_context": {"name": "Ada"}
            },
            "metadata": {"timestamp": "2025-10-06T19:48:45.380843", "source": "account-service", "version": "1.0"}
        })
        .to_string();
        let event = json!({
            "Records": [
                {
                    "messageId": "059f36b4-87a3-44ab-83d2-661975830a7d",
                    "receiptHandle": "AQEBwJnKyrHigUMZj6rYigCgxlaS3SLy0a...",
                    "body": body,
                    "attributes": {
                        "ApproximateReceiveCount": "2",
                        "SentTimestamp": "1545082649183",
                        "SenderId": "AIDAIENQZJOLO23YVJ4VO",
                        "ApproximateFirstReceiveTimestamp": "1545082649185"
                    },
                    "messageAttributes": {
                        "source": {"stringValue": "account-service", "dataType": "String"}
                    },
                    "md5OfBody": "e4e68fb7bd0e697a0ae8f1bb342846b3",
                    "eventSource": "aws:sqs",
                    "eventSourceARN": "arn:aws:sqs:us-east-2:123456789012:account-email",
                    "awsRegion": "us-east-2"
                },
                {
                    "messageId": "2e1424d4-f796-459a-8184-9c92662be6da",
                    "receiptHandle": "AQEBzWwaftRI0KuVm4tP+/7q1rGgNqicHq...",
                    "body": "{\"data\": {}}",
                    "attributes": {"ApproximateReceiveCount": "1"},
                    "messageAttributes": {},
                    "md5OfBody": "e4e68fb7bd0e697a0ae8f1bb342846b3",
                    "eventSource": "aws:sqs",
                    "eventSourceARN": "arn:aws:sqs:us-east-2:123456789012:account-email",
                    "awsRegion": "us-east-2"
                }
            ]
        });
        let event: SqsEvent = serde_json::from_value(event).unwrap();

        let response = handle_sqs_event(&make_processor(), event).await;

        assert_eq!(
            response.batch_item_failures,
            vec![BatchItemFailure {
                item_identifier: "2e1424d4-f796-459a-8184-9c92662be6da".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn jsonとして不正なイベントはエラーになる() {
        let result = handle_sqs_event_json(&make_processor(), b"not json").await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn レスポンスはbatch_item_failures形式でシリアライズされる() {
        let event = json!({
            "Records": [
                {"messageId": "ok", "body": json!({
                    "data": {
                        "recipient": "ada@example.com",
                        "template_variant": "direct_html",
                        "event_type": "account_created",
                        "template_context": {"name": "Ada"}
                    }
                }).to_string()},
                {"messageId": "broken", "body": "{not json"}
            ]
        });

        let response = handle_sqs_event_json(&make_processor(), event.to_string().as_bytes())
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"batchItemFailures": [{"itemIdentifier": "broken"}]})
        );
    }
}

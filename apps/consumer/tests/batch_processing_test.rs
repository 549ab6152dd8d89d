//! バッチ処理の統合テスト
//!
//! 呼び出しハンドラからバッチ処理、テンプレートレンダリング、送信モックまでを通して
//! 部分失敗レポートの契約を検証する。
//!
//! ## テストケース
//!
//! - 3 件中 2 件目だけが不正な本文 → 2 件目だけが失敗として報告される
//! - MJML テンプレートの変数展開とコンパイル
//! - 未知のテンプレート種別はレンダリングに到達しない
//! - テンプレート変数の不足は送信に到達しない
//! - テンプレート欠落（デプロイ中）は一時的な失敗で、配置後の再配信で成功する
//! - 失敗レポートの ID は常に入力バッチの ID に含まれる

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use mailflow_consumer::{
    handler::handle_sqs_event,
    usecase::{BatchProcessor, TemplateRenderer},
};
use mailflow_domain::{
    FailureClass,
    account_email::MessageId,
    batch::{BatchItemFailure, BatchStatus, QueueMessage, SqsEvent, SqsRecord},
};
use mailflow_infra::mock::MockEmailDispatcher;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{Value, json};

// ===== ヘルパー =====

const TEMPLATE_ASSET_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/templates");

fn make_processor(renderer: TemplateRenderer, dispatcher: MockEmailDispatcher) -> BatchProcessor {
    BatchProcessor::new(
        renderer,
        Arc::new(dispatcher),
        1,
        Duration::from_secs(5),
    )
}

fn make_body(recipient: &str, variant: &str, context: Value) -> String {
    json!({
        "data": {
            "recipient": recipient,
            "template_variant": variant,
            "event_type": "account_created",
            "template_context": context
        },
        "metadata": {
            "timestamp": "2025-10-06T19:48:45.380843",
            "source": "account-service",
            "version": "1.0"
        }
    })
    .to_string()
}

fn make_message(id: &str, body: impl Into<String>) -> QueueMessage {
    QueueMessage {
        message_id:     MessageId::new(id),
        body:           Some(body.into()),
        receipt_handle: Some(format!("handle-{id}")),
        receive_count:  Some(1),
    }
}

fn make_record(id: &str, body: impl Into<String>) -> SqsRecord {
    SqsRecord {
        message_id: id.to_string(),
        receipt_handle: Some(format!("handle-{id}")),
        body: Some(body.into()),
        ..SqsRecord::default()
    }
}

/// テスト専用のテンプレートディレクトリ（空）を作成する
fn empty_template_dir() -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let dir = std::env::temp_dir().join(format!(
        "mailflow-batch-test-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// ===== シナリオ =====

#[tokio::test]
async fn test_2件目だけ不正な本文のバッチは2件目だけが失敗として報告される() {
    // Arrange
    let dispatcher = MockEmailDispatcher::new();
    let processor = make_processor(TemplateRenderer::bundled(), dispatcher.clone());
    let event = SqsEvent {
        records: Some(vec![
            make_record(
                "msg-1",
                make_body("ada@example.com", "direct_html", json!({"name": "Ada"})),
            ),
            make_record("msg-2", r#"{"data": {"recipient": "#),
            make_record(
                "msg-3",
                make_body("grace@example.com", "responsive_markup", json!({"name": "Grace"})),
            ),
        ]),
    };

    // Act
    let response = handle_sqs_event(&processor, event).await;

    // Assert
    assert_eq!(
        response.batch_item_failures,
        vec![BatchItemFailure {
            item_identifier: "msg-2".to_string(),
        }]
    );
    let recipients: Vec<String> = dispatcher
        .sent_emails()
        .into_iter()
        .map(|email| email.to)
        .collect();
    assert_eq!(recipients, vec!["ada@example.com", "grace@example.com"]);
}

#[tokio::test]
async fn test_mjmlテンプレートは変数展開後にhtmlへコンパイルされる() {
    let dispatcher = MockEmailDispatcher::new();
    let processor = make_processor(TemplateRenderer::bundled(), dispatcher.clone());

    let report = processor
        .process_batch(&[make_message(
            "msg-1",
            make_body("ada@example.com", "responsive_markup", json!({"name": "Ada"})),
        )])
        .await;

    assert_eq!(report.status(), BatchStatus::AllSucceeded);
    let sent = dispatcher.sent_emails();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Welcome, Ada");
    assert!(sent[0].html_body.contains("Ada"));
    assert!(!sent[0].html_body.contains("<mj-"));
    assert!(!sent[0].html_body.contains("{{"));
    assert!(!sent[0].html_body.contains("{%"));
}

#[tokio::test]
async fn test_direct_htmlは繰り返し処理しても同じ本文になる() {
    let dispatcher = MockEmailDispatcher::new();
    let processor = make_processor(TemplateRenderer::bundled(), dispatcher.clone());
    let message = make_message(
        "msg-1",
        make_body("ada@example.com", "direct_html", json!({"name": "Ada"})),
    );

    let first = processor.process_batch(std::slice::from_ref(&message)).await;
    let second = processor.process_batch(std::slice::from_ref(&message)).await;

    assert_eq!(first, second);
    let sent = dispatcher.sent_emails();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
}

#[tokio::test]
async fn test_未知のテンプレート種別はレンダリングに到達しない() {
    // テンプレートディレクトリが空なので、レンダリングに到達すれば TemplateNotFound になる
    let dispatcher = MockEmailDispatcher::new();
    let processor = make_processor(TemplateRenderer::from_dir(empty_template_dir()), dispatcher.clone());

    let report = processor
        .process_batch(&[make_message(
            "msg-1",
            make_body("ada@example.com", "amp_email", json!({"name": "Ada"})),
        )])
        .await;

    let error = report.items()[0].error.as_ref().unwrap();
    assert_eq!(error.kind, "unknown_template_variant");
    assert_eq!(error.class, FailureClass::Permanent);
    assert!(dispatcher.sent_emails().is_empty());
}

#[rstest]
#[case("responsive_markup")]
#[case("direct_html")]
#[tokio::test]
async fn test_テンプレート変数が不足するメッセージは送信に到達しない(#[case] variant: &str) {
    let dispatcher = MockEmailDispatcher::new();
    let processor = make_processor(TemplateRenderer::bundled(), dispatcher.clone());

    let report = processor
        .process_batch(&[make_message(
            "msg-1",
            make_body("ada@example.com", variant, json!({"nickname": "Ada"})),
        )])
        .await;

    let error = report.items()[0].error.as_ref().unwrap();
    assert_eq!(error.kind, "missing_context_variable");
    assert_eq!(error.class, FailureClass::Permanent);
    assert!(error.detail.contains("name"));
    assert!(dispatcher.sent_emails().is_empty());
}

#[tokio::test]
async fn test_テンプレート欠落は一時的な失敗で配置後の再配信で成功する() {
    let dir = empty_template_dir();
    let dispatcher = MockEmailDispatcher::new();
    let processor = make_processor(TemplateRenderer::from_dir(&dir), dispatcher.clone());
    let message = make_message(
        "msg-1",
        make_body("ada@example.com", "direct_html", json!({"name": "Ada"})),
    );

    let first = processor.process_batch(std::slice::from_ref(&message)).await;
    let error = first.items()[0].error.as_ref().unwrap();
    assert_eq!(error.kind, "template_not_found");
    assert_eq!(error.class, FailureClass::Transient);

    // デプロイ完了後に再配信される
    std::fs::copy(
        PathBuf::from(TEMPLATE_ASSET_DIR).join("account_email.html"),
        dir.join("account_email.html"),
    )
    .unwrap();
    let second = processor.process_batch(std::slice::from_ref(&message)).await;

    assert_eq!(second.status(), BatchStatus::AllSucceeded);
    assert_eq!(dispatcher.sent_emails().len(), 1);
}

#[tokio::test]
async fn test_失敗レポートのidは入力バッチのidに含まれる() {
    let dispatcher = MockEmailDispatcher::new();
    dispatcher.fail_for(
        "bounce@example.com",
        mailflow_domain::DispatchError::permanent("rejected"),
    );
    let processor = make_processor(TemplateRenderer::bundled(), dispatcher);

    let messages = vec![
        make_message("a", make_body("ada@example.com", "direct_html", json!({"name": "Ada"}))),
        make_message("b", "[]"),
        make_message("c", make_body("not-an-address", "direct_html", json!({"name": "C"}))),
        make_message(
            "d",
            make_body("bounce@example.com", "responsive_markup", json!({"name": "D"})),
        ),
        make_message("e", make_body("eve@example.com", "direct_html", json!({}))),
    ];

    let report = processor.process_batch(&messages).await;

    let failed: Vec<&str> = report
        .failed_ids()
        .into_iter()
        .map(MessageId::as_str)
        .collect();
    assert_eq!(failed, vec!["b", "c", "d", "e"]);
    assert!(failed.len() <= messages.len());
    assert!(
        failed
            .iter()
            .all(|id| messages.iter().any(|m| m.message_id.as_str() == *id))
    );
    assert_eq!(report.status(), BatchStatus::PartiallyFailed);
}

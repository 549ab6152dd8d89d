//! # Mailflow Consumer
//!
//! キューから受信したアカウント関連イベントをメールに変換して送信するコンシューマー。
//!
//! ## 処理の流れ
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  SQS Event   │────▶│    Parse     │────▶│    Render    │────▶│   Dispatch   │
//! │  / Poller    │     │  (domain)    │     │ (tera/mrml)  │     │ (SES/SMTP)   │
//! └──────────────┘     └──────────────┘     └──────────────┘     └──────────────┘
//!        ▲                                                               │
//!        └───────────────── batchItemFailures / 削除 ◀───────────────────┘
//! ```
//!
//! ## 入口
//!
//! - [`handler::handle_sqs_event`] - 呼び出しホストから渡されるキューイベントを処理する
//! - [`poller::QueuePoller`] - SQS をロングポーリングするローカル開発用ハーネス
//!
//! ## バイナリ
//!
//! - `mailflow-consumer` - ローカルポーラー
//! - `lambda` - Lambda ランタイム上で [`handler::handle_sqs_event`] を提供する
//! - `invoke` - イベント JSON を手動で処理する
//!
//! ## モジュール構成
//!
//! - [`app_builder`] - 設定からの依存コンポーネント組み立て
//! - [`config`] - 環境変数からの設定読み込み
//! - [`handler`] - キューイベントの呼び出しハンドラ
//! - [`poller`] - ローカルポーラー
//! - [`usecase`] - テンプレートレンダリングとバッチ処理

pub mod app_builder;
pub mod config;
pub mod handler;
pub mod poller;
pub mod usecase;

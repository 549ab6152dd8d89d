//! # ユースケース層
//!
//! Consumer のメッセージ処理ロジックを実装する。
//!
//! ## 設計方針
//!
//! - **依存性注入**: 送信コラボレーターを `Arc<dyn EmailDispatcher>` で外部から注入
//! - **薄い入口**: 呼び出しハンドラとポーラーは薄く保ち、ロジックはユースケースに集約
//!
//! ## モジュール構成
//!
//! - `notification`: アカウントメールのレンダリングと送信

pub mod notification;

pub use notification::{BatchProcessor, TemplateRenderer, TemplateSource};

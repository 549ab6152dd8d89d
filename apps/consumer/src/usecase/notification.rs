//! # 通知ユースケース
//!
//! キューから受信したアカウントイベントをメールに変換して送信する。
//!
//! ## モジュール構成
//!
//! - [`template_renderer`] - tera / mrml によるメール生成
//! - [`batch_processor`] - パース + レンダリング + 送信を統合し、部分失敗レポートを作るバッチ処理

pub mod batch_processor;
pub mod template_renderer;

pub use batch_processor::BatchProcessor;
pub use template_renderer::{TemplateRenderer, TemplateSource};

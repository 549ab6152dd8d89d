//! # 処理エラー定義
//!
//! メッセージ 1 件の処理（パース → レンダリング → 送信）で発生するエラーを表現する。
//!
//! ## 設計方針
//!
//! - **メッセージ境界で捕捉**: どのエラーもバッチ全体を中断させない
//! - **一時的 / 恒久的の分類**: キューの再配信ポリシー（redrive）の判断材料として
//!   [`FailureClass`] を公開する
//!
//! ## エラー種別と分類
//!
//! | エラー種別 | 分類 | 典型的な原因 |
//! |-----------|------|-------------|
//! | `MalformedPayload` | 恒久的 | JSON 不正、必須フィールド欠落 |
//! | `UnknownTemplateVariant` | 恒久的 | 未知のテンプレート種別 |
//! | `TemplateNotFound` | 一時的 | デプロイ中のアセット欠落 |
//! | `MissingContextVariable` | 恒久的 | テンプレート変数の不足 |
//! | `RenderCompilation` | 恒久的 | テンプレート構文エラー、MJML 不正 |
//! | `Dispatch` | 送信エラーに従う | レート制限（一時的）、宛先不正（恒久的） |

use strum::IntoStaticStr;
use thiserror::Error;

/// 失敗の分類
///
/// 一時的な失敗は再配信で回復しうる。恒久的な失敗は何度再試行しても失敗する
/// 「ポイズンメッセージ」候補で、デッドレターキューへの退避対象となる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FailureClass {
    /// 一時的な失敗（再配信で再試行する）
    Transient,
    /// 恒久的な失敗（再試行しても回復しない）
    Permanent,
}

/// メール送信失敗の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DispatchFailureKind {
    /// レート制限、ネットワーク断、タイムアウトなど
    Transient,
    /// 宛先不正、送信元未検証など
    Permanent,
}

/// メール送信エラー
///
/// 送信コラボレーター（SES / SMTP）が返す失敗。
/// 一時的か恒久的かを区別できることが送信側実装の責務となる。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {reason}")]
pub struct DispatchError {
    kind:   DispatchFailureKind,
    reason: String,
}

impl DispatchError {
    /// 一時的な送信エラーを生成する
    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            kind:   DispatchFailureKind::Transient,
            reason: reason.into(),
        }
    }

    /// 恒久的な送信エラーを生成する
    pub fn permanent(reason: impl Into<String>) -> Self {
        Self {
            kind:   DispatchFailureKind::Permanent,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> DispatchFailureKind {
        self.kind
    }

    pub fn is_transient(&self) -> bool {
        self.kind == DispatchFailureKind::Transient
    }
}

/// メッセージ処理エラー
///
/// バッチ処理の各ステージで発生しうるエラーの全種別。
/// [`kind()`](ProcessingError::kind) でログ用の種別名、
/// [`class()`](ProcessingError::class) で再試行可否を取得する。
#[derive(Debug, Error, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ProcessingError {
    /// メッセージ本文が不正（JSON 不正、必須フィールド欠落、型不一致）
    #[error("メッセージ本文が不正です: {0}")]
    MalformedPayload(String),

    /// 未知のテンプレート種別
    #[error("未知のテンプレート種別です: {0}")]
    UnknownTemplateVariant(String),

    /// テンプレートアセットが見つからない
    #[error("テンプレートが見つかりません: {path}")]
    TemplateNotFound {
        /// 読み込みを試みたパス
        path: String,
    },

    /// テンプレートが参照する変数がコンテキストに存在しない
    #[error("テンプレート変数がコンテキストにありません: {0}")]
    MissingContextVariable(String),

    /// テンプレートの構文エラー、または MJML から HTML への変換失敗
    #[error("テンプレートのコンパイルに失敗しました: {0}")]
    #[strum(serialize = "render_compilation_error")]
    RenderCompilation(String),

    /// メール送信の失敗
    #[error("メール送信に失敗しました: {0}")]
    #[strum(serialize = "dispatch_failure")]
    Dispatch(#[from] DispatchError),
}

impl ProcessingError {
    /// ログ・レポート用の種別名（snake_case）を返す
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// 再試行可否の分類を返す
    pub fn class(&self) -> FailureClass {
        match self {
            Self::TemplateNotFound { .. } => FailureClass::Transient,
            Self::Dispatch(e) if e.is_transient() => FailureClass::Transient,
            Self::MalformedPayload(_)
            | Self::UnknownTemplateVariant(_)
            | Self::MissingContextVariable(_)
            | Self::RenderCompilation(_)
            | Self::Dispatch(_) => FailureClass::Permanent,
        }
    }
}

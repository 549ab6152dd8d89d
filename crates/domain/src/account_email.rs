//! # アカウントメール
//!
//! アカウント関連イベント（作成、更新など）から生成するメールのドメインモデルを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 説明 |
//! |---|------------|------|
//! | [`AccountEmailRequest`] | メール送信リクエスト | パース・検証済みの処理単位 |
//! | [`TemplateVariant`] | テンプレート種別 | レスポンシブマークアップ（MJML）または直接 HTML |
//! | [`EventType`] | イベント種別 | `account_created` などの意味タグ |
//! | [`RenderedEmail`] | レンダリング済みメール | 件名と HTML 本文 |
//! | [`OutgoingEmail`] | 送信メール | 送信コラボレーターに渡す最終形 |
//!
//! ## 設計方針
//!
//! - **不変性**: [`AccountEmailRequest`] はパース後に変更されない（フィールドは非公開）
//! - **閉じた種別**: テンプレート種別は 2 値の enum で表現し、レンダリング関数を静的に選択する

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::IntoStaticStr;

use crate::email::Email;

/// キューが付与するメッセージ ID
///
/// 配信試行ごとに一意。再配信をまたいだ一意性は保証されない。
/// 部分失敗レポートの識別子と、送信側の重複排除キーとして使用する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct MessageId(String);

impl MessageId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// テンプレート種別
///
/// snake_case でシリアライズされる（`responsive_markup` / `direct_html`）。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TemplateVariant {
    /// MJML テンプレートを変数展開後に HTML へコンパイルする
    ResponsiveMarkup,
    /// HTML テンプレートを変数展開してそのまま本文とする
    DirectHtml,
}

impl TemplateVariant {
    /// テンプレートディレクトリ内のアセットファイル名を返す
    pub fn template_file(&self) -> &'static str {
        match self {
            Self::ResponsiveMarkup => "account_email.mjml",
            Self::DirectHtml => "account_email.html",
        }
    }
}

/// イベント種別
///
/// `account_created` のような意味タグ。共有テンプレート内でセクションを
/// 切り替えるためにテンプレートコンテキストへ `event_type` として渡される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Display)]
#[display("{_0}")]
pub struct EventType(String);

impl EventType {
    /// イベント種別を作成する
    ///
    /// 空文字列、または空白文字を含む値は `None` を返す。
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() || value.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// メッセージのメタデータ
///
/// 送信元サービスが付与する任意情報。処理には使用せず、ログ出力のみに使う。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub timestamp: Option<String>,
    pub source:    Option<String>,
    pub version:   Option<String>,
    pub host:      Option<String>,
    pub queue:     Option<String>,
}

/// メール送信リクエスト
///
/// メッセージ本文をパース・検証した処理単位。
/// 生成後は読み取り専用で、レンダリングによって変更されない。
#[derive(Debug, Clone, PartialEq)]
pub struct AccountEmailRequest {
    message_id:       MessageId,
    recipient:        Email,
    template_variant: TemplateVariant,
    template_context: Map<String, Value>,
    event_type:       EventType,
    metadata:         MessageMetadata,
}

impl AccountEmailRequest {
    pub fn new(
        message_id: MessageId,
        recipient: Email,
        template_variant: TemplateVariant,
        template_context: Map<String, Value>,
        event_type: EventType,
        metadata: MessageMetadata,
    ) -> Self {
        Self {
            message_id,
            recipient,
            template_variant,
            template_context,
            event_type,
            metadata,
        }
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    pub fn recipient(&self) -> &Email {
        &self.recipient
    }

    pub fn template_variant(&self) -> TemplateVariant {
        self.template_variant
    }

    /// テンプレートに渡す変数
    ///
    /// キーや構造はテンプレートごとに異なり、ドメイン層では制約しない。
    pub fn template_context(&self) -> &Map<String, Value> {
        &self.template_context
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn metadata(&self) -> &MessageMetadata {
        &self.metadata
    }
}

/// レンダリング済みメール
///
/// `html_body` はレスポンシブマークアップ経路ではコンパイル後の HTML であり、
/// MJML が残ることはない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    /// 件名（空でない）
    pub subject:   String,
    /// HTML 本文（空でない）
    pub html_body: String,
}

/// 送信メール
///
/// 送信コラボレーターに渡す最終形。
/// `dedup_key` にはメッセージ ID を設定し、再配信時の重複送信を送信側で識別できるようにする。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// 送信先メールアドレス
    pub to:        String,
    /// 件名
    pub subject:   String,
    /// HTML 本文
    pub html_body: String,
    /// 重複排除キー
    pub dedup_key: String,
}

impl OutgoingEmail {
    /// リクエストとレンダリング結果から送信メールを組み立てる
    pub fn new(request: &AccountEmailRequest, rendered: RenderedEmail) -> Self {
        Self {
            to:        request.recipient().as_str().to_string(),
            subject:   rendered.subject,
            html_body: rendered.html_body,
            dedup_key: request.message_id().as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_template_variantの文字列変換が正しい() {
        assert_eq!(
            TemplateVariant::ResponsiveMarkup.to_string(),
            "responsive_markup"
        );
        assert_eq!(TemplateVariant::DirectHtml.to_string(), "direct_html");

        assert_eq!(
            TemplateVariant::from_str("responsive_markup").unwrap(),
            TemplateVariant::ResponsiveMarkup
        );
        assert_eq!(
            TemplateVariant::from_str("direct_html").unwrap(),
            TemplateVariant::DirectHtml
        );
        assert!(TemplateVariant::from_str("amp_html").is_err());
    }

    #[test]
    fn test_template_variantごとにアセットファイルが異なる() {
        assert_eq!(
            TemplateVariant::ResponsiveMarkup.template_file(),
            "account_email.mjml"
        );
        assert_eq!(TemplateVariant::DirectHtml.template_file(), "account_email.html");
    }

    #[test]
    fn test_event_typeは空文字列と空白を拒否する() {
        assert!(EventType::new("account_created").is_some());
        assert!(EventType::new("").is_none());
        assert!(EventType::new("account created").is_none());
    }

    #[test]
    fn test_outgoing_emailの重複排除キーはメッセージidになる() {
        let mut context = Map::new();
        context.insert("name".to_string(), json!("Ada"));
        let request = AccountEmailRequest::new(
            MessageId::new("msg-42"),
            Email::new("ada@example.com").unwrap(),
            TemplateVariant::DirectHtml,
            context,
            EventType::new("account_created").unwrap(),
            MessageMetadata::default(),
        );
        let rendered = RenderedEmail {
            subject:   "ようこそ".to_string(),
            html_body: "<p>Ada</p>".to_string(),
        };

        let email = OutgoingEmail::new(&request, rendered);

        assert_eq!(
            email,
            OutgoingEmail {
                to:        "ada@example.com".to_string(),
                subject:   "ようこそ".to_string(),
                html_body: "<p>Ada</p>".to_string(),
                dedup_key: "msg-42".to_string(),
            }
        );
    }
}

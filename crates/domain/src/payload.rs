//! # メッセージ本文のパース
//!
//! キューから受信した生のメッセージ本文を検証し、[`AccountEmailRequest`] に変換する。
//!
//! ## 本文の形式
//!
//! ```json
//! {
//!   "data": {
//!     "recipient": "ada@example.com",
//!     "template_variant": "responsive_markup",
//!     "event_type": "account_created",
//!     "template_context": { "name": "Ada" }
//!   },
//!   "metadata": {
//!     "timestamp": "2025-10-06T19:48:45.380843",
//!     "source": "account-service",
//!     "version": "1.0",
//!     "host": "sqs-host",
//!     "queue": "account-email"
//!   }
//! }
//! ```
//!
//! - `data` は必須。`metadata` は任意で、形式が想定と異なる場合は無視する
//! - `template_context` は任意（省略時・`null` は空のオブジェクト）
//! - I/O を行わない純粋関数で、同じ入力には常に同じ結果を返す

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::{
    ProcessingError,
    account_email::{AccountEmailRequest, EventType, MessageId, MessageMetadata, TemplateVariant},
    email::Email,
};

/// メッセージ本文をパースする
///
/// # エラー
///
/// - [`ProcessingError::MalformedPayload`]: UTF-8 / JSON として不正、`data` や必須フィールド
///   （`recipient`, `template_variant`, `event_type`）の欠落、型不一致、宛先の形式不正
/// - [`ProcessingError::UnknownTemplateVariant`]: `template_variant` が既知の値ではない
pub fn parse(
    message_id: MessageId,
    raw_body: &[u8],
) -> Result<AccountEmailRequest, ProcessingError> {
    let body: Value = serde_json::from_slice(raw_body).map_err(|e| {
        ProcessingError::MalformedPayload(format!("JSON として解釈できません: {e}"))
    })?;

    let Value::Object(mut envelope) = body else {
        return Err(ProcessingError::MalformedPayload(
            "本文が JSON オブジェクトではありません".to_string(),
        ));
    };

    let data = match envelope.remove("data") {
        Some(Value::Object(data)) => data,
        Some(_) => {
            return Err(ProcessingError::MalformedPayload(
                "'data' フィールドがオブジェクトではありません".to_string(),
            ));
        }
        None => {
            return Err(ProcessingError::MalformedPayload(
                "'data' フィールドがありません".to_string(),
            ));
        }
    };

    let recipient = required_str(&data, "recipient")?;
    let template_variant = required_str(&data, "template_variant")?;
    let event_type = required_str(&data, "event_type")?;

    let recipient = Email::new(recipient)
        .map_err(|e| ProcessingError::MalformedPayload(format!("'recipient' が不正です: {e}")))?;

    let template_variant = TemplateVariant::from_str(template_variant)
        .map_err(|_| ProcessingError::UnknownTemplateVariant(template_variant.to_string()))?;

    let event_type = EventType::new(event_type).ok_or_else(|| {
        ProcessingError::MalformedPayload(format!("'event_type' が不正です: {event_type:?}"))
    })?;

    let template_context = match data.get("template_context") {
        Some(Value::Object(context)) => context.clone(),
        Some(Value::Null) | None => Map::new(),
        Some(_) => {
            return Err(ProcessingError::MalformedPayload(
                "'template_context' がオブジェクトではありません".to_string(),
            ));
        }
    };

    let metadata = envelope
        .remove("metadata")
        .and_then(|metadata| serde_json::from_value::<MessageMetadata>(metadata).ok())
        .unwrap_or_default();

    Ok(AccountEmailRequest::new(
        message_id,
        recipient,
        template_variant,
        template_context,
        event_type,
        metadata,
    ))
}

/// 必須の文字列フィールドを取り出す
fn required_str<'a>(data: &'a Map<String, Value>, field: &str) -> Result<&'a str, ProcessingError> {
    match data.get(field) {
        Some(Value::String(value)) => Ok(value),
        Some(Value::Null) | None => Err(ProcessingError::MalformedPayload(format!(
            "必須フィールド '{field}' がありません"
        ))),
        Some(_) => Err(ProcessingError::MalformedPayload(format!(
            "'{field}' は文字列である必要があります"
        ))),
    }
}

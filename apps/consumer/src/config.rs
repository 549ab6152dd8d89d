//! # Consumer 設定
//!
//! 環境変数から Consumer の設定を読み込む。
//!
//! ## 設計方針
//!
//! - **既定値で起動可能**: ローカル開発（LocalStack + Noop 送信）はすべて既定値で動く
//! - **不正値は起動時に拒否**: 数値・真偽値・列挙値の解釈に失敗した場合は [`ConfigError`] を返す
//! - **テスト容易性**: [`ConsumerConfig::from_lookup`] で環境変数の参照元を差し替えられる

use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use mailflow_infra::sqs::{ReceiveOptions, SqsConnection};
use thiserror::Error;

/// 設定エラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// 必須の環境変数が設定されていない
    #[error("{0} が設定されていません")]
    Missing(&'static str),

    /// 環境変数の値を解釈できない
    #[error("{name} の値が不正です（{value:?}）: {reason}")]
    Invalid {
        name:   &'static str,
        value:  String,
        reason: String,
    },
}

/// Consumer の設定
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// キュー接続・受信設定
    pub sqs:               SqsConfig,
    /// メール送信設定
    pub dispatch:          DispatchConfig,
    /// テンプレートアセットのディレクトリ（未設定の場合は同梱テンプレート）
    pub template_dir:      Option<PathBuf>,
    /// バッチ内で同時に処理するメッセージ数
    pub batch_concurrency: usize,
}

/// キュー接続・受信設定
#[derive(Debug, Clone)]
pub struct SqsConfig {
    /// エンドポイント URL（空文字列で AWS SQS）
    pub endpoint_url:           Option<String>,
    /// キュー名（ポーラーでのみ必須）
    pub queue_name:             Option<String>,
    /// リージョン
    pub region:                 String,
    /// アクセスキー ID
    pub access_key_id:          String,
    /// シークレットアクセスキー
    pub secret_access_key:      String,
    /// ロングポーリングの待機秒数
    pub poll_wait_time:         i32,
    /// 可視性タイムアウト秒数
    pub visibility_timeout:     i32,
    /// 1 回の受信で取得する最大件数（1〜10）
    pub max_messages:           i32,
    /// 恒久的に失敗したメッセージを削除するか
    pub delete_poison_messages: bool,
}

/// メール送信バックエンド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchBackend {
    /// Amazon SES v2
    Ses,
    /// SMTP サーバー（開発時は Mailpit）
    Smtp,
    /// 送信しない（ログ出力のみ）
    Noop,
}

impl FromStr for DispatchBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ses" => Ok(Self::Ses),
            "smtp" => Ok(Self::Smtp),
            "noop" => Ok(Self::Noop),
            _ => Err("ses / smtp / noop のいずれかを指定してください".to_string()),
        }
    }
}

/// メール送信設定
///
/// `DISPATCH_BACKEND` 環境変数で送信バックエンドを切り替える:
/// - `ses`: Amazon SES v2 経由で送信（本番）
/// - `smtp`: Mailpit（開発）/ SMTP サーバー経由で送信
/// - `noop`: 送信しない（ログ出力のみ）
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// 送信バックエンド
    pub backend:      DispatchBackend,
    /// SMTP ホスト（backend=smtp の場合に使用）
    pub smtp_host:    String,
    /// SMTP ポート（backend=smtp の場合に使用）
    pub smtp_port:    u16,
    /// 送信元メールアドレス
    pub from_address: String,
    /// 1 件の送信に許容する時間
    pub timeout:      Duration,
}

impl ConsumerConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 任意の参照元から設定を読み込む
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let batch_concurrency: usize = parse_or(&lookup, "BATCH_CONCURRENCY", 1)?;
        if batch_concurrency == 0 {
            return Err(invalid("BATCH_CONCURRENCY", "0", "1 以上を指定してください"));
        }

        Ok(Self {
            sqs: SqsConfig::from_lookup(&lookup)?,
            dispatch: DispatchConfig::from_lookup(&lookup)?,
            template_dir: lookup("TEMPLATE_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            batch_concurrency,
        })
    }
}

impl SqsConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let max_messages: i32 = parse_or(lookup, "SQS_MAX_MESSAGES", 10)?;
        if !(1..=10).contains(&max_messages) {
            return Err(invalid(
                "SQS_MAX_MESSAGES",
                max_messages,
                "1〜10 の範囲で指定してください",
            ));
        }

        Ok(Self {
            endpoint_url: match lookup("SQS_ENDPOINT_URL") {
                Some(url) if url.trim().is_empty() => None,
                Some(url) => Some(url),
                None => Some("http://localhost:4566".to_string()),
            },
            queue_name: lookup("SQS_QUEUE_NAME").filter(|name| !name.trim().is_empty()),
            region: lookup("SQS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            access_key_id: lookup("SQS_ACCESS_KEY_ID").unwrap_or_else(|| "test".to_string()),
            secret_access_key: lookup("SQS_SECRET_ACCESS_KEY")
                .unwrap_or_else(|| "test".to_string()),
            poll_wait_time: parse_or(lookup, "SQS_POLL_WAIT_TIME", 20)?,
            visibility_timeout: parse_or(lookup, "SQS_VISIBILITY_TIMEOUT", 30)?,
            max_messages,
            delete_poison_messages: parse_bool_or(lookup, "SQS_DELETE_POISON_MESSAGES", true)?,
        })
    }

    /// ポーラーが受信するキュー名
    pub fn require_queue_name(&self) -> Result<&str, ConfigError> {
        self.queue_name
            .as_deref()
            .ok_or(ConfigError::Missing("SQS_QUEUE_NAME"))
    }

    pub fn connection(&self) -> SqsConnection {
        SqsConnection {
            endpoint_url:      self.endpoint_url.clone(),
            region:            self.region.clone(),
            access_key_id:     self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
        }
    }

    pub fn receive_options(&self) -> ReceiveOptions {
        ReceiveOptions {
            max_messages:       self.max_messages,
            wait_time_seconds:  self.poll_wait_time,
            visibility_timeout: self.visibility_timeout,
        }
    }
}

impl DispatchConfig {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let timeout_secs: u64 = parse_or(lookup, "DISPATCH_TIMEOUT_SECS", 10)?;
        if timeout_secs == 0 {
            return Err(invalid(
                "DISPATCH_TIMEOUT_SECS",
                "0",
                "1 以上を指定してください",
            ));
        }

        Ok(Self {
            backend:      parse_or(lookup, "DISPATCH_BACKEND", DispatchBackend::Noop)?,
            smtp_host:    lookup("SMTP_HOST").unwrap_or_else(|| "localhost".to_string()),
            smtp_port:    parse_or(lookup, "SMTP_PORT", 1025)?,
            from_address: lookup("MAIL_FROM_ADDRESS")
                .unwrap_or_else(|| "noreply@example.com".to_string()),
            timeout:      Duration::from_secs(timeout_secs),
        })
    }
}

fn invalid(name: &'static str, value: impl Display, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// 値を解釈する（未設定の場合は既定値）
fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(name, &value, e.to_string())),
        None => Ok(default),
    }
}

/// 真偽値を解釈する（`true/false`, `1/0`, `yes/no`、大文字小文字は区別しない）
fn parse_bool_or(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = lookup(name) else {
        return Ok(default);
    };

    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(invalid(name, &value, "true または false を指定してください")),
    }
}

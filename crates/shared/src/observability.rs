//! # Observability 基盤
//!
//! トレーシング初期化とログ出力形式の設定を提供する。
//! ポーラー、呼び出しハーネスの各バイナリで共通のログ初期化ロジックを集約し、
//! 環境変数 `LOG_FORMAT` による JSON / Pretty 出力の切り替えに対応する。

/// ログ出力形式
///
/// 環境変数 `LOG_FORMAT` で切り替える。
/// 値が未設定または不正な場合は [`Pretty`](LogFormat::Pretty) にフォールバックする。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON 形式（本番環境向け）
    Json,
    /// 人間が読みやすい形式（開発環境向け）
    #[default]
    Pretty,
}

impl LogFormat {
    /// 文字列からログ形式をパースする
    ///
    /// 不正な値の場合は [`Pretty`](LogFormat::Pretty) にフォールバックし、
    /// stderr に警告を出力する。
    pub fn parse(s: &str) -> Self {
        match s {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            other => {
                eprintln!("WARNING: unknown LOG_FORMAT={other:?}, falling back to pretty");
                Self::Pretty
            }
        }
    }

    /// 環境変数 `LOG_FORMAT` から読み取る
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT") {
            Ok(val) => Self::parse(&val),
            Err(_) => Self::default(),
        }
    }
}

/// トレーシング初期化設定
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// サービス名（JSON ログの `span.service` フィールドに出力）
    pub service_name: String,
    /// ログ出力形式
    pub log_format:   LogFormat,
    /// `RUST_LOG` 未設定時に使うログレベル（`LOG_LEVEL` 環境変数）
    pub log_level:    Option<String>,
}

impl TracingConfig {
    /// 新しい設定を作成する
    pub fn new(service_name: impl Into<String>, log_format: LogFormat) -> Self {
        Self {
            service_name: service_name.into(),
            log_format,
            log_level: None,
        }
    }

    /// 環境変数から設定を読み取る
    ///
    /// `LOG_FORMAT` で出力形式を、`LOG_LEVEL` でデフォルトのログレベルを決定する。
    pub fn from_env(service_name: impl Into<String>) -> Self {
        Self {
            log_level: std::env::var("LOG_LEVEL").ok(),
            ..Self::new(service_name, LogFormat::from_env())
        }
    }

    /// `RUST_LOG` 未設定時に使うフィルタ文字列を返す
    ///
    /// `LOG_LEVEL` は大文字小文字を区別しない（`INFO` と `info` は同じ）。
    /// 未設定の場合は `"info,mailflow=debug"` とする。
    /// AWS SDK と HTTP クライアントは冗長なため `info` 以上に抑える。
    pub fn default_filter(&self) -> String {
        match self.log_level.as_deref().map(str::trim) {
            Some(level) if !level.is_empty() => format!(
                "{},aws_config=info,aws_smithy_runtime=info,hyper=info",
                level.to_lowercase()
            ),
            _ => "info,mailflow=debug".to_string(),
        }
    }
}

/// トレーシングを初期化する
///
/// `RUST_LOG` 環境変数でログレベルを制御可能。
/// 未設定の場合は [`TracingConfig::default_filter`] を使用する。
///
/// JSON モードでは以下のフィールドがトップレベルに出力される:
/// - `timestamp`, `level`, `target`, `message`
#[cfg(feature = "observability")]
pub fn init_tracing(config: &TracingConfig) {
    use tracing_subscriber::{Layer as _, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.default_filter().into());

    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::debug!(service = %config.service_name, "トレーシングを初期化しました");
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===== LogFormat::parse テスト =====

    #[test]
    fn test_parse_jsonでjsonを返す() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
    }

    #[test]
    fn test_parse_prettyでprettyを返す() {
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
    }

    #[test]
    fn test_parse_不正な値でprettyにフォールバックする() {
        assert_eq!(LogFormat::parse("unknown"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(""), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Pretty);
    }

    // ===== TracingConfig テスト =====

    #[test]
    fn test_newでフィールドが正しく設定される() {
        let config = TracingConfig::new("consumer", LogFormat::Json);

        assert_eq!(config.service_name, "consumer");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_level, None);
    }

    #[test]
    fn test_log_level未設定のデフォルトフィルタ() {
        let config = TracingConfig::new("consumer", LogFormat::Pretty);

        assert_eq!(config.default_filter(), "info,mailflow=debug");
    }

    #[test]
    fn test_log_levelは小文字化してフィルタに使う() {
        let config = TracingConfig {
            log_level: Some("DEBUG".to_string()),
            ..TracingConfig::new("consumer", LogFormat::Pretty)
        };

        assert!(config.default_filter().starts_with("debug,"));
    }
}

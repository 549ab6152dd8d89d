//! # メールアドレス
//!
//! 送信先メールアドレスの値オブジェクトを定義する。
//!
//! 生成時に構文を検証し、不正な宛先が送信ステージまで到達しないようにする。
//! 到達可能性（ドメインの MX レコード等）は検証しない。

use derive_more::Display;
use serde::Serialize;
use thiserror::Error;

/// メールアドレスの最大長（RFC 5321 の path 長制限）
const MAX_LENGTH: usize = 254;

/// メールアドレスのバリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("メールアドレスの形式が不正です: {0}")]
pub struct InvalidEmail(String);

/// メールアドレス（値オブジェクト）
///
/// `local@domain` 形式を要求する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Display)]
#[display("{_0}")]
pub struct Email(String);

impl Email {
    /// メールアドレスを作成する
    ///
    /// # バリデーション
    ///
    /// - 空白文字を含まない
    /// - `@` がちょうど 1 つ
    /// - ローカル部・ドメイン部が空ではない
    /// - ドメイン部が `.` を含み、`.` で始まらず終わらない
    /// - 最大 254 文字
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidEmail> {
        let value = value.into();

        if value.is_empty() {
            return Err(InvalidEmail("メールアドレスは必須です".to_string()));
        }

        if value.len() > MAX_LENGTH {
            return Err(InvalidEmail(format!(
                "メールアドレスは{MAX_LENGTH}文字以内である必要があります"
            )));
        }

        if value.chars().any(char::is_whitespace) {
            return Err(InvalidEmail(value));
        }

        let Some((local, domain)) = value.split_once('@') else {
            return Err(InvalidEmail(value));
        };

        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(InvalidEmail(value));
        }

        if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
            return Err(InvalidEmail(value));
        }

        Ok(Self(value))
    }

    /// 文字列参照を取得する
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("ada@example.com")]
    #[case("ada.lovelace+news@mail.example.co.jp")]
    fn test_正しい形式のメールアドレスを受け付ける(#[case] input: &str) {
        let email = Email::new(input).unwrap();
        assert_eq!(email.as_str(), input);
    }

    #[rstest]
    #[case("")]
    #[case("ada")]
    #[case("@example.com")]
    #[case("ada@")]
    #[case("ada@@example.com")]
    #[case("ada@localhost")]
    #[case("ada@.example.com")]
    #[case("ada@example.com.")]
    #[case("ada lovelace@example.com")]
    fn test_不正な形式のメールアドレスを拒否する(#[case] input: &str) {
        assert!(Email::new(input).is_err());
    }

    #[test]
    fn test_長すぎるメールアドレスを拒否する() {
        let input = format!("{}@example.com", "a".repeat(250));
        assert!(Email::new(input).is_err());
    }
}

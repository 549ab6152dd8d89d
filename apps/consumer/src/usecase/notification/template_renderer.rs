//! # テンプレートレンダラー
//!
//! tera テンプレートエンジンでアカウントメールの件名と HTML 本文を生成する。
//!
//! ## 設計方針
//!
//! - **2 つの経路**: テンプレート種別ごとにレンダリング関数を静的に選択する
//!   - `responsive_markup`: 変数展開 → MJML を mrml で HTML にコンパイル。件名は `<mj-title>`
//!   - `direct_html`: 変数展開の結果をそのまま本文とする。件名は `<title>`
//! - **厳格な変数展開**: 出力式（`{{ name }}`）がコンテキストにない変数を参照すると
//!   `MissingContextVariable` で失敗する。ただし tera の条件式（`{% if flag %}`）では
//!   未定義の変数は偽として評価されエラーにならない。任意の値は `{% if x is defined %}` で判定する
//! - **同梱テンプレート**: テンプレートは `include_str!` でバイナリに埋め込まれる。
//!   `TEMPLATE_DIR` を指定した場合のみディスクから読み込む
//! - **遅延読み込みとキャッシュ**: テンプレートは初回使用時に読み込み、種別ごとに
//!   プロセス存続期間キャッシュする。読み込みに失敗した場合はキャッシュしない
//! - **コンパイル済み出力のみ**: `responsive_markup` の本文に MJML 要素が残った場合は
//!   `RenderCompilation` で失敗する
//! - **自動エスケープ**: `.html` / `.mjml` ともにコンテキスト値を HTML エスケープする

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use mailflow_domain::{
    ProcessingError,
    account_email::{AccountEmailRequest, RenderedEmail, TemplateVariant},
};
use mrml::{mjml::Mjml, prelude::render::RenderOptions};
use regex::Regex;
use tera::{Context, Tera};
use tokio::sync::OnceCell;

const BUNDLED_RESPONSIVE_MARKUP: &str = include_str!("../../../templates/account_email.mjml");
const BUNDLED_DIRECT_HTML: &str = include_str!("../../../templates/account_email.html");

static TITLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("[Bug] <title> の正規表現が不正")
});

/// テンプレートの取得元
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// バイナリに埋め込まれたテンプレート
    Bundled,
    /// ディレクトリ内の `account_email.mjml` / `account_email.html`
    Directory(PathBuf),
}

/// テンプレートレンダラー
///
/// 複数メッセージから同時に呼び出しても安全（キャッシュの初期化は 1 回だけ行われる）。
pub struct TemplateRenderer {
    source:            TemplateSource,
    responsive_markup: OnceCell<Tera>,
    direct_html:       OnceCell<Tera>,
}

impl TemplateRenderer {
    /// 新しいレンダラーインスタンスを作成
    ///
    /// テンプレートはこの時点では読み込まない。
    pub fn new(source: TemplateSource) -> Self {
        Self {
            source,
            responsive_markup: OnceCell::new(),
            direct_html: OnceCell::new(),
        }
    }

    /// 同梱テンプレートを使うレンダラーを作成
    pub fn bundled() -> Self {
        Self::new(TemplateSource::Bundled)
    }

    /// ディレクトリのテンプレートを使うレンダラーを作成
    pub fn from_dir(template_dir: impl Into<PathBuf>) -> Self {
        Self::new(TemplateSource::Directory(template_dir.into()))
    }

    pub fn source(&self) -> &TemplateSource {
        &self.source
    }

    /// リクエストからメールの件名と本文を生成する
    ///
    /// 同じリクエストに対しては常に同じ結果を返す。
    ///
    /// # エラー
    ///
    /// - [`ProcessingError::TemplateNotFound`]: テンプレートファイルを読み込めない
    /// - [`ProcessingError::MissingContextVariable`]: テンプレートが参照する変数がない
    /// - [`ProcessingError::RenderCompilation`]: 構文エラー、MJML 変換失敗、件名・本文が空
    pub async fn render(
        &self,
        request: &AccountEmailRequest,
    ) -> Result<RenderedEmail, ProcessingError> {
        let variant = request.template_variant();
        let engine = self.engine(variant).await?;
        let context = build_context(request)?;

        let substituted = engine
            .render(variant.template_file(), &context)
            .map_err(|e| classify_tera_error(&e))?;

        match variant {
            TemplateVariant::ResponsiveMarkup => compile_responsive_markup(substituted),
            TemplateVariant::DirectHtml => finish_direct_html(substituted),
        }
    }

    /// 種別ごとのテンプレートエンジンを取得する（初回のみ読み込む）
    async fn engine(&self, variant: TemplateVariant) -> Result<&Tera, ProcessingError> {
        let cell = match variant {
            TemplateVariant::ResponsiveMarkup => &self.responsive_markup,
            TemplateVariant::DirectHtml => &self.direct_html,
        };

        cell.get_or_try_init(|| load_template(&self.source, variant))
            .await
    }
}

async fn load_template(
    source: &TemplateSource,
    variant: TemplateVariant,
) -> Result<Tera, ProcessingError> {
    let content = match source {
        TemplateSource::Bundled => bundled_template(variant).to_string(),
        TemplateSource::Directory(dir) => read_template(dir, variant).await?,
    };

    let mut engine = Tera::default();
    engine.autoescape_on(vec![".html", ".mjml"]);
    engine
        .add_raw_template(variant.template_file(), &content)
        .map_err(|e| ProcessingError::RenderCompilation(error_chain(&e)))?;

    tracing::debug!(
        source = ?source,
        template_variant = %variant,
        "テンプレートを読み込みました"
    );
    Ok(engine)
}

fn bundled_template(variant: TemplateVariant) -> &'static str {
    match variant {
        TemplateVariant::ResponsiveMarkup => BUNDLED_RESPONSIVE_MARKUP,
        TemplateVariant::DirectHtml => BUNDLED_DIRECT_HTML,
    }
}

async fn read_template(dir: &Path, variant: TemplateVariant) -> Result<String, ProcessingError> {
    let path = dir.join(variant.template_file());

    tokio::fs::read_to_string(&path).await.map_err(|e| {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "テンプレートの読み込みに失敗"
        );
        ProcessingError::TemplateNotFound {
            path: path.display().to_string(),
        }
    })
}

/// テンプレートコンテキストを構築する
///
/// リクエストの `template_context` に加えて `event_type` を渡す。
fn build_context(request: &AccountEmailRequest) -> Result<Context, ProcessingError> {
    let mut context = Context::from_serialize(request.template_context())
        .map_err(|e| ProcessingError::RenderCompilation(error_chain(&e)))?;
    context.insert("event_type", request.event_type().as_str());
    Ok(context)
}

/// tera のエラーを分類する
///
/// 未定義変数の参照は `Variable `name` not found in context ...` という
/// メッセージでエラーチェーンのいずれかに現れる。
fn classify_tera_error(error: &tera::Error) -> ProcessingError {
    let mut current: Option<&dyn std::error::Error> = Some(error);
    while let Some(err) = current {
        let message = err.to_string();
        if let Some(name) = message
            .contains("not found in context")
            .then(|| message.split('`').nth(1))
            .flatten()
        {
            return ProcessingError::MissingContextVariable(name.to_string());
        }
        current = err.source();
    }

    ProcessingError::RenderCompilation(error_chain(error))
}

/// エラーチェーン全体を 1 行にまとめる
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut current = error.source();
    while let Some(err) = current {
        message.push_str(": ");
        message.push_str(&err.to_string());
        current = err.source();
    }
    message
}

/// 変数展開済みの MJML を HTML にコンパイルする
fn compile_responsive_markup(markup: String) -> Result<RenderedEmail, ProcessingError> {
    let mjml = Mjml::parse(markup).map_err(|e| {
        ProcessingError::RenderCompilation(format!("MJML の解析に失敗: {e}"))
    })?;

    let subject = mjml.get_title().unwrap_or_default();
    let html_body = mjml.render(&RenderOptions::default()).map_err(|e| {
        ProcessingError::RenderCompilation(format!("MJML の HTML 変換に失敗: {e}"))
    })?;

    // mrml は未知の mj-* 要素をそのまま出力する
    if html_body.contains("<mj-") {
        return Err(ProcessingError::RenderCompilation(
            "HTML に変換されない MJML 要素が残っています".to_string(),
        ));
    }

    finish(&subject, html_body)
}

/// 変数展開済みの HTML から件名を取り出す
fn finish_direct_html(html: String) -> Result<RenderedEmail, ProcessingError> {
    let subject = TITLE_PATTERN
        .captures(&html)
        .and_then(|captures| captures.get(1))
        .map(|title| title.as_str().to_string())
        .unwrap_or_default();

    finish(&subject, html)
}

/// 件名を整形し、件名・本文が空でないことを確認する
///
/// 件名は HTML エスケープを戻し、改行を含む連続した空白を 1 つの空白にまとめる。
fn finish(raw_subject: &str, html_body: String) -> Result<RenderedEmail, ProcessingError> {
    let subject = unescape_html(raw_subject)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if subject.is_empty() {
        return Err(ProcessingError::RenderCompilation(
            "件名（タイトル要素）が空です".to_string(),
        ));
    }
    if html_body.trim().is_empty() {
        return Err(ProcessingError::RenderCompilation("本文が空です".to_string()));
    }

    Ok(RenderedEmail { subject, html_body })
}

/// tera の HTML エスケープを戻す
fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&#x2F;", "/")
        .replace("&#47;", "/")
        .replace("&amp;", "&")
}

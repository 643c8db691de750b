//! コンテンツストアの抽象化。
//!
//! 本番では Sanity の HTTP API、テストではメモリ上の実装を使う。

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

use super::records::{AuthorRecord, CreatedDocument, ImageRef, RecordKind};

/// 作者をメールアドレスで引く
pub const AUTHOR_BY_EMAIL: &str = r#"*[_type == "author" && email == $email][0]{ _id, name, slug }"#;

/// (種類, 日付, 作者) の件数
pub const COUNT_BY_AUTHOR_ON: &str =
    r#"count(*[_type == $type && date == $date && author._ref == $authorId])"#;

/// 指定年の日付の印（日付の昇順）
pub const DAY_MARKS_BY_YEAR: &str = r#"*[_type == "dayMark" && date >= $start && date <= $end] | order(date asc) {
  _id, _createdAt, date, note, photo,
  "author": author->{ name, slug }
}"#;

/// すべてのピン（新しい順）
pub const ALL_WALL_PINS: &str = r#"*[_type == "wallPin"] | order(date desc, _createdAt desc) {
  _id, _createdAt, date, pinType, photo, quote, songUrl, videoUrl, caption,
  "author": author->{ name, slug }
}"#;

/// 記事一覧（新しい順、本文なし）
pub const ALL_ENTRIES: &str = r#"*[_type == "entry"] | order(date desc) {
  _id, title, slug, date, excerpt, coverImage, tags, mood,
  author->{ name, slug, avatar }
}"#;

/// スラッグで引く記事（本文とギャラリーを含む）
pub const ENTRY_BY_SLUG: &str = r#"*[_type == "entry" && slug.current == $slug][0] {
  _id, title, slug, date, excerpt, coverImage, body, gallery, tags, mood,
  author->{ name, slug, avatar }
}"#;

/// タグのついた記事（新しい順、本文なし）
pub const ENTRIES_BY_TAG: &str = r#"*[_type == "entry" && $tag in tags] | order(date desc) {
  _id, title, slug, date, excerpt, coverImage, tags, mood,
  author->{ name, slug, avatar }
}"#;

/// 記事で使われているタグ（重複なし）
pub const ALL_TAGS: &str = r#"array::unique(*[_type == "entry" && defined(tags)].tags[])"#;

/// About ページの写真
pub const ABOUT_PAGE: &str = r#"*[_type == "aboutPage"][0]{ photos }"#;

/// GROQ パラメータ。キーの順序を固定してキャッシュキーに使う。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// パラメータを追加する。値は JSON として保持する。
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into().to_string());
        self
    }

    /// `(名前, JSON 文字列)` の組を順に返す。
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn cache_key(&self) -> String {
        self.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&")
    }
}

/// アップロードする画像。
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Failed to decode store response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// GROQ クエリを実行し、`result` をそのまま返す。
    async fn query(&self, query: &str, params: &QueryParams) -> Result<Value, StoreError>;

    /// 画像アセットをアップロードし、ドキュメントから参照できる形で返す。
    async fn upload_image(&self, upload: ImageUpload) -> Result<ImageRef, StoreError>;

    /// ドキュメントを作成する。同じ `_id` が既にあれば `AlreadyExists`。
    async fn create(&self, document: &Value) -> Result<CreatedDocument, StoreError>;

    async fn find_author_by_email(&self, email: &str) -> Result<Option<AuthorRecord>, StoreError> {
        let params = QueryParams::new().with("email", email);
        let value = self.query(AUTHOR_BY_EMAIL, &params).await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    async fn count_by_author_on(
        &self,
        kind: RecordKind,
        date: NaiveDate,
        author_id: &str,
    ) -> Result<u64, StoreError> {
        let params = QueryParams::new()
            .with("type", kind.type_name())
            .with("date", date.to_string())
            .with("authorId", author_id);
        let value = self.query(COUNT_BY_AUTHOR_ON, &params).await?;
        Ok(serde_json::from_value(value)?)
    }
}

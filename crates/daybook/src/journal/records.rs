//! ストアに保存するドキュメントと、クライアントに返す表示用の形。

use chrono::{DateTime, NaiveDate, Utc};
use daybook_core::{Mark, PinType};
use serde::{Deserialize, Serialize};

/// スラッグ（`{ "current": "..." }`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slug {
    pub current: String,
}

/// 作者ドキュメント。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub slug: Slug,
}

/// 表示用の作者情報（名前とスラッグのみ）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorView {
    pub name: String,
    pub slug: Slug,
}

impl From<&AuthorRecord> for AuthorView {
    fn from(author: &AuthorRecord) -> Self {
        Self {
            name: author.name.clone(),
            slug: author.slug.clone(),
        }
    }
}

/// ドキュメント参照。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "_type")]
    pub kind: String,
    #[serde(rename = "_ref")]
    pub id: String,
}

impl Reference {
    pub fn to(id: impl Into<String>) -> Self {
        Self {
            kind: "reference".to_string(),
            id: id.into(),
        }
    }
}

/// アップロード済み画像への参照。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(rename = "_type")]
    pub kind: String,
    pub asset: Reference,
}

impl ImageRef {
    pub fn asset(asset_id: impl Into<String>) -> Self {
        Self {
            kind: "image".to_string(),
            asset: Reference::to(asset_id),
        }
    }
}

/// 作成系ドキュメントの種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    DayMark,
    WallPin,
}

impl RecordKind {
    /// ストア上の `_type`
    pub fn type_name(self) -> &'static str {
        match self {
            RecordKind::DayMark => "dayMark",
            RecordKind::WallPin => "wallPin",
        }
    }

    /// (日付, 作者) ごとに一意なドキュメント ID。
    ///
    /// 同じ ID の `create` はストア側で拒否されるため、一意制約として働く。
    /// 作者 ID にドキュメント ID で使えない文字が含まれる場合は `None`。
    pub fn document_id(self, date: NaiveDate, author_id: &str) -> Option<String> {
        let usable = !author_id.is_empty()
            && author_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        usable.then(|| format!("{}-{}-{}", self.type_name(), date.format("%Y-%m-%d"), author_id))
    }
}

/// 新規作成する日付の印。
#[derive(Debug, Clone, Serialize)]
pub struct DayMarkDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_type")]
    pub kind: &'static str,
    pub date: NaiveDate,
    pub note: String,
    pub author: Reference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<ImageRef>,
}

/// 新規作成するピン。種類に対応する本体フィールドだけを持つ。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WallPinDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_type")]
    pub kind: &'static str,
    pub date: NaiveDate,
    pub pin_type: PinType,
    pub author: Reference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<ImageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

/// 作成結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedDocument {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// 日付の印の表示用データ。一覧クエリの結果と作成 API の応答で共通。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayMarkView {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_createdAt")]
    pub created_at: DateTime<Utc>,
    pub date: NaiveDate,
    pub note: String,
    #[serde(default)]
    pub photo: Option<ImageRef>,
    #[serde(default)]
    pub author: Option<AuthorView>,
}

impl Mark for DayMarkView {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn author_slug(&self) -> Option<&str> {
        self.author.as_ref().map(|a| a.slug.current.as_str())
    }
}

/// ピンの表示用データ。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WallPinView {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_createdAt")]
    pub created_at: DateTime<Utc>,
    pub date: NaiveDate,
    pub pin_type: PinType,
    #[serde(default)]
    pub photo: Option<ImageRef>,
    #[serde(default)]
    pub quote: Option<String>,
    #[serde(default)]
    pub song_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub author: Option<AuthorView>,
}

/// 画像のフォーカス位置。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub x: f64,
    pub y: f64,
    pub height: f64,
    pub width: f64,
}

/// 記事やページに置かれた画像。代替テキストとキャプションを持てる。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PictureView {
    #[serde(rename = "_type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "_key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotspot: Option<Hotspot>,
}

/// 記事に付く作者情報。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryAuthor {
    pub name: String,
    pub slug: Slug,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<PictureView>,
}

/// 日記の記事。
///
/// 一覧では `body` と `gallery` を取得しないので、どちらも `None` になる。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub slug: Slug,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<PictureView>,
    /// Portable Text のブロック列（そのまま返す）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gallery: Option<Vec<PictureView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<EntryAuthor>,
}

/// About ページ。ドキュメントがなければ写真なしとして扱う。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AboutPage {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub photos: Vec<PictureView>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

//! テスト用のメモリ上のコンテンツストア。

use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};

use super::records::{CreatedDocument, ImageRef};
use super::store::{
    ABOUT_PAGE, ALL_ENTRIES, ALL_TAGS, ALL_WALL_PINS, AUTHOR_BY_EMAIL, COUNT_BY_AUTHOR_ON,
    ContentStore, DAY_MARKS_BY_YEAR, ENTRIES_BY_TAG, ENTRY_BY_SLUG, ImageUpload, QueryParams,
    StoreError,
};

/// 一覧クエリで返す記事のフィールド
const ENTRY_SUMMARY_FIELDS: [&str; 8] =
    ["_id", "title", "slug", "date", "excerpt", "coverImage", "tags", "mood"];

/// 1 件取得で追加されるフィールド
const ENTRY_DETAIL_FIELDS: [&str; 2] = ["body", "gallery"];

/// 既知のクエリだけを解釈するストア。
#[derive(Default)]
pub struct MemoryStore {
    authors: Vec<Value>,
    documents: Mutex<Vec<Value>>,
    uploads: Mutex<Vec<ImageUpload>>,
    queries: AtomicUsize,
    /// 件数クエリが常に 0 を返す（作成の競合を再現する）
    stale_counts: AtomicBool,
    /// すべてのクエリを失敗させる
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_author(mut self, id: &str, name: &str, slug: &str, email: &str) -> Self {
        self.authors.push(json!({
            "_id": id,
            "name": name,
            "slug": { "current": slug },
            "email": email,
        }));
        self
    }

    /// 作成済みドキュメントを直接追加する。
    pub fn insert(&self, mut document: Value) {
        if document.get("_createdAt").is_none() {
            document["_createdAt"] = json!(created_at());
        }
        self.documents.lock().unwrap().push(document);
    }

    pub fn set_stale_counts(&self, stale: bool) {
        self.stale_counts.store(stale, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn documents(&self) -> Vec<Value> {
        self.documents.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<ImageUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn author_view(&self, reference: &Value) -> Value {
        let id = reference.get("_ref").and_then(Value::as_str);
        self.authors
            .iter()
            .find(|a| a.get("_id").and_then(Value::as_str) == id)
            .map(|a| json!({ "name": a["name"], "slug": a["slug"] }))
            .unwrap_or(Value::Null)
    }

    fn expand(&self, document: &Value) -> Value {
        let mut view = document.clone();
        view["author"] = self.author_view(&document["author"]);
        view
    }

    /// 記事を一覧・詳細の形に射影する。ない項目は `null`。
    fn project_entry(&self, entry: &Value, detail: bool) -> Value {
        let mut view = serde_json::Map::new();
        let extra: &[&str] = if detail { &ENTRY_DETAIL_FIELDS } else { &[] };
        for field in ENTRY_SUMMARY_FIELDS.iter().chain(extra) {
            view.insert(field.to_string(), entry.get(*field).cloned().unwrap_or(Value::Null));
        }
        let id = entry["author"].get("_ref").and_then(Value::as_str);
        let author = self
            .authors
            .iter()
            .find(|a| a.get("_id").and_then(Value::as_str) == id)
            .map(|a| {
                json!({
                    "name": a["name"],
                    "slug": a["slug"],
                    "avatar": a.get("avatar").cloned().unwrap_or(Value::Null),
                })
            })
            .unwrap_or(Value::Null);
        view.insert("author".to_string(), author);
        Value::Object(view)
    }

    /// 記事を新しい順に並べる。
    fn entries_where(&self, keep: impl Fn(&Value) -> bool) -> Vec<Value> {
        let mut entries: Vec<Value> = self.of_type("entry").into_iter().filter(|e| keep(e)).collect();
        entries.sort_by(|a, b| b["date"].as_str().cmp(&a["date"].as_str()));
        entries
    }

    fn of_type(&self, kind: &str) -> Vec<Value> {
        self.documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d["_type"] == kind)
            .cloned()
            .collect()
    }
}

fn created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
}

/// パラメータを JSON 値として取り出す。なければ `null`。
fn param(params: &QueryParams, key: &str) -> Value {
    params
        .iter()
        .find(|(name, _)| *name == key)
        .and_then(|(_, raw)| serde_json::from_str(raw).ok())
        .unwrap_or(Value::Null)
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn query(&self, query: &str, params: &QueryParams) -> Result<Value, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Api {
                status: 503,
                message: "store unavailable".to_string(),
            });
        }

        let result = match query {
            AUTHOR_BY_EMAIL => {
                let email = param(params, "email");
                self.authors
                    .iter()
                    .find(|a| a["email"] == email)
                    .map(|a| json!({ "_id": a["_id"], "name": a["name"], "slug": a["slug"] }))
                    .unwrap_or(Value::Null)
            }
            COUNT_BY_AUTHOR_ON => {
                if self.stale_counts.load(Ordering::SeqCst) {
                    return Ok(json!(0));
                }
                let kind = param(params, "type");
                let (date, author) = (param(params, "date"), param(params, "authorId"));
                let count = self
                    .documents
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|d| d["_type"] == kind && d["date"] == date && d["author"]["_ref"] == author)
                    .count();
                json!(count)
            }
            DAY_MARKS_BY_YEAR => {
                let start = param(params, "start");
                let end = param(params, "end");
                let (start, end) = (start.as_str().unwrap_or(""), end.as_str().unwrap_or(""));
                let mut marks: Vec<Value> = self
                    .of_type("dayMark")
                    .iter()
                    .filter(|d| {
                        let date = d["date"].as_str().unwrap_or("");
                        date >= start && date <= end
                    })
                    .map(|d| self.expand(d))
                    .collect();
                marks.sort_by(|a, b| a["date"].as_str().cmp(&b["date"].as_str()));
                Value::Array(marks)
            }
            ALL_WALL_PINS => {
                let mut pins: Vec<Value> = self.of_type("wallPin").iter().map(|d| self.expand(d)).collect();
                pins.sort_by(|a, b| {
                    (b["date"].as_str(), b["_createdAt"].as_str())
                        .cmp(&(a["date"].as_str(), a["_createdAt"].as_str()))
                });
                Value::Array(pins)
            }
            ALL_ENTRIES => Value::Array(
                self.entries_where(|_| true)
                    .iter()
                    .map(|e| self.project_entry(e, false))
                    .collect(),
            ),
            ENTRY_BY_SLUG => {
                let slug = param(params, "slug");
                self.entries_where(|e| e["slug"]["current"] == slug)
                    .first()
                    .map(|e| self.project_entry(e, true))
                    .unwrap_or(Value::Null)
            }
            ENTRIES_BY_TAG => {
                let tag = param(params, "tag");
                let tagged = |e: &Value| {
                    e["tags"]
                        .as_array()
                        .is_some_and(|tags| tags.contains(&tag))
                };
                Value::Array(
                    self.entries_where(tagged)
                        .iter()
                        .map(|e| self.project_entry(e, false))
                        .collect(),
                )
            }
            ALL_TAGS => {
                let mut tags: Vec<Value> = Vec::new();
                for entry in self.of_type("entry") {
                    for tag in entry["tags"].as_array().into_iter().flatten() {
                        if !tags.contains(tag) {
                            tags.push(tag.clone());
                        }
                    }
                }
                Value::Array(tags)
            }
            ABOUT_PAGE => self
                .of_type("aboutPage")
                .first()
                .map(|page| json!({ "photos": page.get("photos").cloned().unwrap_or(Value::Null) }))
                .unwrap_or(Value::Null),
            _ => Value::Null,
        };
        Ok(result)
    }

    async fn upload_image(&self, upload: ImageUpload) -> Result<ImageRef, StoreError> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(upload);
        Ok(ImageRef::asset(format!("image-{}-jpg", uploads.len())))
    }

    async fn create(&self, document: &Value) -> Result<CreatedDocument, StoreError> {
        let id = document["_id"].as_str().unwrap_or_default().to_string();
        let mut documents = self.documents.lock().unwrap();
        if documents.iter().any(|d| d["_id"] == id.as_str()) {
            return Err(StoreError::AlreadyExists(id));
        }
        let mut stored = document.clone();
        stored["_createdAt"] = json!(created_at());
        documents.push(stored);
        Ok(CreatedDocument {
            id,
            created_at: created_at(),
        })
    }
}

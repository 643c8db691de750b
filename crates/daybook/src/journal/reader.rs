//! 読み取り用のフェッチラッパー。
//!
//! ストア未設定なら既定値を返し、設定済みなら結果を TTL つきでキャッシュする。

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;

use super::records::{AboutPage, DayMarkView, EntryView, WallPinView};
use super::store::{
    ABOUT_PAGE, ALL_ENTRIES, ALL_TAGS, ALL_WALL_PINS, ContentStore, DAY_MARKS_BY_YEAR, ENTRIES_BY_TAG,
    ENTRY_BY_SLUG, QueryParams, StoreError,
};

struct CachedResult {
    fetched_at: Instant,
    value: Value,
}

pub struct ContentReader {
    store: Option<Arc<dyn ContentStore>>,
    /// ゼロならキャッシュしない
    ttl: Duration,
    cache: RwLock<HashMap<String, CachedResult>>,
}

impl ContentReader {
    pub fn new(store: Option<Arc<dyn ContentStore>>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.store.is_some()
    }

    /// クエリを実行して `T` に変換する。
    ///
    /// ストアが未設定のとき、または結果が `null` のときは `fallback` を返す。
    pub async fn fetch<T>(&self, query: &str, params: &QueryParams, fallback: T) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let Some(store) = &self.store else {
            return Ok(fallback);
        };

        let key = format!("{query}\n{}", params.cache_key());
        if let Some(value) = self.cached(&key).await {
            return decode(value, fallback);
        }

        let value = store.query(query, params).await?;
        if !self.ttl.is_zero() {
            self.cache.write().await.insert(
                key,
                CachedResult {
                    fetched_at: Instant::now(),
                    value: value.clone(),
                },
            );
        }
        decode(value, fallback)
    }

    async fn cached(&self, key: &str) -> Option<Value> {
        if self.ttl.is_zero() {
            return None;
        }
        let cache = self.cache.read().await;
        cache
            .get(key)
            .filter(|hit| hit.fetched_at.elapsed() < self.ttl)
            .map(|hit| hit.value.clone())
    }

    /// キャッシュを空にし、破棄した件数を返す。
    pub async fn invalidate_all(&self) -> usize {
        let mut cache = self.cache.write().await;
        let dropped = cache.len();
        cache.clear();
        dropped
    }

    /// 指定年の日付の印を日付順に取得する。
    pub async fn day_marks_in(&self, year: i32) -> Result<Vec<DayMarkView>, StoreError> {
        let params = QueryParams::new()
            .with("start", format!("{year:04}-01-01"))
            .with("end", format!("{year:04}-12-31"));
        self.fetch(DAY_MARKS_BY_YEAR, &params, Vec::new()).await
    }

    /// すべてのピンを新しい順に取得する。
    pub async fn wall_pins(&self) -> Result<Vec<WallPinView>, StoreError> {
        self.fetch(ALL_WALL_PINS, &QueryParams::new(), Vec::new()).await
    }

    /// 記事を新しい順に取得する。
    pub async fn entries(&self) -> Result<Vec<EntryView>, StoreError> {
        self.fetch(ALL_ENTRIES, &QueryParams::new(), Vec::new()).await
    }

    pub async fn entry_by_slug(&self, slug: &str) -> Result<Option<EntryView>, StoreError> {
        let params = QueryParams::new().with("slug", slug);
        self.fetch(ENTRY_BY_SLUG, &params, None).await
    }

    pub async fn entries_tagged(&self, tag: &str) -> Result<Vec<EntryView>, StoreError> {
        let params = QueryParams::new().with("tag", tag);
        self.fetch(ENTRIES_BY_TAG, &params, Vec::new()).await
    }

    /// 使われているタグを名前順に返す。
    pub async fn tags(&self) -> Result<Vec<String>, StoreError> {
        let mut tags: Vec<String> = self.fetch(ALL_TAGS, &QueryParams::new(), Vec::new()).await?;
        tags.sort();
        tags.dedup();
        Ok(tags)
    }

    pub async fn about_page(&self) -> Result<AboutPage, StoreError> {
        self.fetch(ABOUT_PAGE, &QueryParams::new(), AboutPage::default()).await
    }
}

fn decode<T: DeserializeOwned>(value: Value, fallback: T) -> Result<T, StoreError> {
    if value.is_null() {
        return Ok(fallback);
    }
    Ok(serde_json::from_value(value)?)
}

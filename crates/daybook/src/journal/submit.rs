//! 投稿処理に共通するエラーと手順。

use chrono::NaiveDate;
use daybook_core::{PinTable, ValidationError};
use thiserror::Error;

use super::records::{AuthorRecord, RecordKind};
use super::store::{ContentStore, StoreError};

/// 投稿処理の失敗。HTTP ステータスへの対応はサーバー側で行う。
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid PIN")]
    Auth,

    #[error(
        "Author not found. Make sure the author exists in the content store with a matching email."
    )]
    AuthorNotFound,

    #[error("{0}")]
    Conflict(&'static str),

    #[error("Server not configured for writing. Set SANITY_API_WRITE_TOKEN.")]
    NotConfigured,

    /// 詳細はログにだけ出す
    #[error("Something went wrong. Try again.")]
    Unknown(#[source] anyhow::Error),
}

impl From<StoreError> for SubmitError {
    fn from(e: StoreError) -> Self {
        SubmitError::Unknown(e.into())
    }
}

/// 投稿処理に必要なもの一式。
pub struct WriteContext<'a> {
    pub store: &'a dyn ContentStore,
    pub pins: &'a PinTable,
    /// 設定タイムゾーンでの今日
    pub today: NaiveDate,
}

impl WriteContext<'_> {
    /// PIN から作者ドキュメントを引く。
    pub async fn resolve_author(&self, pin: &str) -> Result<AuthorRecord, SubmitError> {
        let Some(email) = self.pins.resolve(pin) else {
            tracing::warn!("Rejected submission with an unknown PIN");
            return Err(SubmitError::Auth);
        };

        match self.store.find_author_by_email(email).await? {
            Some(author) => Ok(author),
            None => {
                tracing::warn!(email = %email, "No author document matches the configured email");
                Err(SubmitError::AuthorNotFound)
            }
        }
    }

    /// 作成するドキュメントの ID を決める。
    pub fn document_id(
        &self,
        kind: RecordKind,
        date: NaiveDate,
        author: &AuthorRecord,
    ) -> Result<String, SubmitError> {
        kind.document_id(date, &author.id).ok_or_else(|| {
            SubmitError::Unknown(anyhow::anyhow!(
                "Author id {:?} cannot be used in a document id",
                author.id
            ))
        })
    }

    /// (種類, 日付, 作者) がまだ使われていないことを確認する。
    pub async fn ensure_unclaimed(
        &self,
        kind: RecordKind,
        date: NaiveDate,
        author: &AuthorRecord,
        message: &'static str,
    ) -> Result<(), SubmitError> {
        let existing = self.store.count_by_author_on(kind, date, &author.id).await?;
        if existing > 0 {
            tracing::info!(kind = kind.type_name(), date = %date, author = %author.slug.current, "Duplicate submission rejected");
            return Err(SubmitError::Conflict(message));
        }
        Ok(())
    }
}

/// 作成時の `AlreadyExists` を重複エラーに読み替える。
pub fn conflict_on_existing(message: &'static str) -> impl FnOnce(StoreError) -> SubmitError {
    move |e| match e {
        StoreError::AlreadyExists(id) => {
            tracing::info!(id = %id, "Lost the race for a deterministic document id");
            SubmitError::Conflict(message)
        }
        other => other.into(),
    }
}

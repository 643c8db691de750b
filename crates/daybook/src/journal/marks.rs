//! 日付の印（その日を線で消す）の作成。

use daybook_core::submission::{DayMarkForm, check_day_mark};

use super::photo::{PhotoFile, prepare_upload};
use super::records::{AuthorView, DayMarkDocument, DayMarkView, RecordKind, Reference};
use super::store::StoreError;
use super::submit::{SubmitError, WriteContext, conflict_on_existing};

pub const ALREADY_MARKED: &str = "You already crossed out this day";

/// 今日の印を作成し、表示用の形で返す。
pub async fn mark_day(
    ctx: &WriteContext<'_>,
    form: &DayMarkForm<'_>,
    photo: Option<PhotoFile>,
) -> Result<DayMarkView, SubmitError> {
    let draft = check_day_mark(form, ctx.today)?;
    let author = ctx.resolve_author(draft.pin).await?;
    let id = ctx.document_id(RecordKind::DayMark, draft.date, &author)?;
    ctx.ensure_unclaimed(RecordKind::DayMark, draft.date, &author, ALREADY_MARKED)
        .await?;

    let photo = match photo.filter(|p| !p.is_empty()) {
        Some(file) => Some(ctx.store.upload_image(prepare_upload(file)).await?),
        None => None,
    };

    let document = DayMarkDocument {
        id,
        kind: RecordKind::DayMark.type_name(),
        date: draft.date,
        note: draft.note,
        author: Reference::to(author.id.as_str()),
        photo,
    };
    let value = serde_json::to_value(&document).map_err(StoreError::from)?;
    let created = ctx
        .store
        .create(&value)
        .await
        .map_err(conflict_on_existing(ALREADY_MARKED))?;

    tracing::info!(id = %created.id, date = %document.date, author = %author.slug.current, "Day crossed out");

    Ok(DayMarkView {
        id: created.id,
        created_at: created.created_at,
        date: document.date,
        note: document.note,
        photo: document.photo,
        author: Some(AuthorView::from(&author)),
    })
}

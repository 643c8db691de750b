//! ウォールのピン（写真・引用・曲・動画）の作成。

use daybook_core::submission::{PinFields, PinPayload, WallPinForm, check_pin_payload, check_wall_pin};

use super::photo::{PhotoFile, prepare_upload};
use super::records::{AuthorView, RecordKind, Reference, WallPinDocument, WallPinView};
use super::store::StoreError;
use super::submit::{SubmitError, WriteContext, conflict_on_existing};

pub const ALREADY_PINNED: &str = "You already pinned something today. Come back tomorrow!";

/// 今日のピンを作成し、表示用の形で返す。
///
/// 本体の検証は重複チェックの後に行う。
pub async fn pin_wall(
    ctx: &WriteContext<'_>,
    form: &WallPinForm<'_>,
    fields: PinFields<'_>,
    photo: Option<PhotoFile>,
) -> Result<WallPinView, SubmitError> {
    let header = check_wall_pin(form)?;
    let author = ctx.resolve_author(header.pin).await?;
    let date = ctx.today;
    let id = ctx.document_id(RecordKind::WallPin, date, &author)?;
    ctx.ensure_unclaimed(RecordKind::WallPin, date, &author, ALREADY_PINNED)
        .await?;

    let photo = photo.filter(|p| !p.is_empty());
    let fields = PinFields {
        photo_size: photo.as_ref().map_or(0, PhotoFile::len),
        ..fields
    };
    let payload = check_pin_payload(header.pin_type, &fields)?;

    let mut document = WallPinDocument {
        id,
        kind: RecordKind::WallPin.type_name(),
        date,
        pin_type: header.pin_type,
        author: Reference::to(author.id.as_str()),
        caption: header.caption,
        photo: None,
        quote: None,
        song_url: None,
        video_url: None,
    };
    match payload {
        PinPayload::Photo => {
            if let Some(file) = photo {
                document.photo = Some(ctx.store.upload_image(prepare_upload(file)).await?);
            }
        }
        PinPayload::Quote(quote) => document.quote = Some(quote),
        PinPayload::Song(url) => document.song_url = Some(url),
        PinPayload::Video(url) => document.video_url = Some(url),
    }

    let value = serde_json::to_value(&document).map_err(StoreError::from)?;
    let created = ctx
        .store
        .create(&value)
        .await
        .map_err(conflict_on_existing(ALREADY_PINNED))?;

    tracing::info!(id = %created.id, pin_type = %document.pin_type, author = %author.slug.current, "Wall pin created");

    Ok(WallPinView {
        id: created.id,
        created_at: created.created_at,
        date: document.date,
        pin_type: document.pin_type,
        photo: document.photo,
        quote: document.quote,
        song_url: document.song_url,
        video_url: document.video_url,
        caption: document.caption,
        author: Some(AuthorView::from(&author)),
    })
}

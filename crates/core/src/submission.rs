//! 投稿フォーム（日付の印・ウォールのピン）の検証。
//!
//! ここでは外部ストアに触れない検証だけを行う。
//! PIN の照合や重複チェックは呼び出し側が行う。

use std::{fmt, str::FromStr, sync::LazyLock};

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// メモの最大文字数
pub const MAX_NOTE_CHARS: usize = 500;
/// 引用の最大文字数
pub const MAX_QUOTE_CHARS: usize = 280;
/// キャプションの最大文字数
pub const MAX_CAPTION_CHARS: usize = 200;

static DATE_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));

/// 利用者が修正できる入力エラー。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// ピンの種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinType {
    Photo,
    Quote,
    Song,
    Video,
}

impl PinType {
    pub const ALL: [PinType; 4] = [PinType::Photo, PinType::Quote, PinType::Song, PinType::Video];

    pub fn as_str(self) -> &'static str {
        match self {
            PinType::Photo => "photo",
            PinType::Quote => "quote",
            PinType::Song => "song",
            PinType::Video => "video",
        }
    }
}

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PinType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PinType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::new("Invalid pin type"))
    }
}

/// 日付の印フォームの生の入力。
#[derive(Debug, Clone, Default)]
pub struct DayMarkForm<'a> {
    pub pin: Option<&'a str>,
    pub date: Option<&'a str>,
    pub note: Option<&'a str>,
}

/// 検証済みの日付の印。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayMarkDraft<'a> {
    pub pin: &'a str,
    pub date: NaiveDate,
    /// 前後の空白を除いたメモ
    pub note: String,
}

/// 日付の印フォームを検証する。
///
/// 必須項目 → 日付形式 → 今日であること → メモの長さ の順に確認し、
/// 最初に見つかった問題を返す。
pub fn check_day_mark<'a>(form: &DayMarkForm<'a>, today: NaiveDate) -> Result<DayMarkDraft<'a>, ValidationError> {
    let pin = present(form.pin);
    let date = present(form.date);
    let note = present(form.note);

    let (Some(pin), Some(date), Some(note)) = (pin, date, note) else {
        return Err(missing(&[("pin", pin), ("date", date), ("note", note)]));
    };

    let date = parse_date(date)?;
    if date != today {
        return Err(ValidationError::new("You can only cross out today"));
    }

    let note = note.trim();
    if note.chars().count() > MAX_NOTE_CHARS {
        return Err(ValidationError::new(format!(
            "Note must be {MAX_NOTE_CHARS} characters or less"
        )));
    }

    Ok(DayMarkDraft {
        pin,
        date,
        note: note.to_string(),
    })
}

/// ピンフォームの共通部分の生の入力。
#[derive(Debug, Clone, Default)]
pub struct WallPinForm<'a> {
    pub pin: Option<&'a str>,
    pub pin_type: Option<&'a str>,
    pub caption: Option<&'a str>,
}

/// 検証済みのピン共通部分。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallPinHeader<'a> {
    pub pin: &'a str,
    pub pin_type: PinType,
    /// 空なら `None`
    pub caption: Option<String>,
}

/// ピンの必須項目・種類・キャプションを検証する。
pub fn check_wall_pin<'a>(form: &WallPinForm<'a>) -> Result<WallPinHeader<'a>, ValidationError> {
    let pin = present(form.pin);
    let pin_type = present(form.pin_type);

    let (Some(pin), Some(pin_type)) = (pin, pin_type) else {
        return Err(missing(&[("pin", pin), ("pinType", pin_type)]));
    };

    let pin_type = pin_type.trim().parse::<PinType>()?;

    let caption = form.caption.map(str::trim).filter(|c| !c.is_empty());
    if let Some(caption) = caption
        && caption.chars().count() > MAX_CAPTION_CHARS
    {
        return Err(ValidationError::new(format!(
            "Caption must be {MAX_CAPTION_CHARS} characters or less"
        )));
    }

    Ok(WallPinHeader {
        pin,
        pin_type,
        caption: caption.map(str::to_string),
    })
}

/// ピン種類ごとの入力。写真はサイズだけを見る。
#[derive(Debug, Clone, Default)]
pub struct PinFields<'a> {
    pub quote: Option<&'a str>,
    pub song_url: Option<&'a str>,
    pub video_url: Option<&'a str>,
    pub photo_size: usize,
}

/// 検証済みのピン本体。写真のバイト列は呼び出し側が保持する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinPayload {
    Photo,
    Quote(String),
    Song(String),
    Video(String),
}

/// ピン種類に応じた本体を検証する。
pub fn check_pin_payload(pin_type: PinType, fields: &PinFields<'_>) -> Result<PinPayload, ValidationError> {
    match pin_type {
        PinType::Photo => {
            if fields.photo_size == 0 {
                return Err(ValidationError::new("Photo is required for photo pins"));
            }
            Ok(PinPayload::Photo)
        }
        PinType::Quote => {
            let Some(quote) = present(fields.quote) else {
                return Err(ValidationError::new("Quote text is required"));
            };
            // 長さは整形前の入力で数える
            if quote.chars().count() > MAX_QUOTE_CHARS {
                return Err(ValidationError::new(format!(
                    "Quote must be {MAX_QUOTE_CHARS} characters or less"
                )));
            }
            Ok(PinPayload::Quote(quote.trim().to_string()))
        }
        PinType::Song => link(fields.song_url, "Song").map(PinPayload::Song),
        PinType::Video => link(fields.video_url, "Video").map(PinPayload::Video),
    }
}

/// `YYYY-MM-DD` 形式の実在する日付を解析する。
pub fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
    if !DATE_FORMAT.is_match(value) {
        return Err(ValidationError::new("Invalid date format"));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ValidationError::new("Invalid date format"))
}

fn link(value: Option<&str>, label: &str) -> Result<String, ValidationError> {
    let Some(url) = present(value) else {
        return Err(ValidationError::new(format!("{label} URL is required")));
    };
    let url = url.trim();
    if !has_http_scheme(url) {
        return Err(ValidationError::new(format!("{label} URL must be an http(s) link")));
    }
    Ok(url.to_string())
}

/// スキームは大文字小文字を区別しない。
fn has_http_scheme(url: &str) -> bool {
    let Some((scheme, rest)) = url.split_once("://") else {
        return false;
    };
    !rest.is_empty() && (scheme.eq_ignore_ascii_case("https") || scheme.eq_ignore_ascii_case("http"))
}

/// 空白だけの値は未入力として扱う。
fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn missing(fields: &[(&str, Option<&str>)]) -> ValidationError {
    let names: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| *name)
        .collect();
    ValidationError::new(format!("Missing required fields: {}", names.join(", ")))
}

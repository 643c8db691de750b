//! 日記コンテンツ（記事・日付の印・ウォールのピン）の読み書き。
//!
//! 外部のコンテンツストアへのアクセスと、PIN で保護された投稿処理をまとめる。

mod marks;
mod photo;
mod pins;
mod reader;
mod records;
mod sanity;
mod store;
mod submit;

#[cfg(test)]
pub(crate) mod memory;

pub use marks::mark_day;
pub use photo::PhotoFile;
pub use pins::pin_wall;
pub use reader::ContentReader;
pub use records::{AboutPage, DayMarkView, EntryView, WallPinView};
pub use sanity::SanityClient;
pub use store::{ContentStore, StoreError};
pub use submit::{SubmitError, WriteContext};

use chrono::NaiveDate;
use chrono_tz::Tz;

/// 閲覧できる最後の年
pub const MAX_YEAR: i32 = 2100;

/// 「今日」の決め方。
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    /// 指定タイムゾーンでの現在日付
    Zoned(Tz),
    #[cfg(test)]
    Fixed(NaiveDate),
}

impl Clock {
    pub fn today(&self) -> NaiveDate {
        match self {
            Clock::Zoned(tz) => chrono::Utc::now().with_timezone(tz).date_naive(),
            #[cfg(test)]
            Clock::Fixed(date) => *date,
        }
    }
}

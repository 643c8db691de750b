//! 日記サイトの純粋な計算ロジック。
//!
//! 日照時間の計算、年間カレンダーのグリッド構築、投稿フォームの検証、
//! PIN による作者解決と編集権限の判定を提供する。I/O は一切行わない。

pub mod access;
pub mod calendar;
pub mod daylight;
pub mod submission;

pub use access::{DocumentKind, EditDecision, OwnedDocument, PinTable, edit_decision};
pub use calendar::{CalendarError, DayInfo, Mark, MonthLabel, YearGrid, YearLayout, annotate, build_year};
pub use daylight::{DaylightReport, LONDON_LATITUDE, Trend, daylight_minutes};
pub use submission::{PinType, ValidationError};

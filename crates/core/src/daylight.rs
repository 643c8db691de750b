//! 日の出方程式による日照時間の計算と、ヘッダー表示用のフレーズ生成。

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// 既定の緯度（ロンドン）。
pub const LONDON_LATITUDE: f64 = 51.5074;

/// 大気差 (~34') と太陽視半径 (~16') を含めた公式の天頂角。
const OFFICIAL_ZENITH_DEG: f64 = 90.833;

const MINUTES_PER_DAY: f64 = 24.0 * 60.0;

/// 指定日・緯度の日照時間（分）を計算する。
///
/// 赤緯は通日からの余弦モデル、時角は天頂角 90.833° から求める。
/// 白夜・極夜で時角の余弦が [-1, 1] を外れる場合は 1440 / 0 に丸める。
pub fn daylight_minutes(date: NaiveDate, latitude: f64) -> f64 {
    let day_of_year = f64::from(date.ordinal());

    let declination = (-23.45 * ((360.0 / 365.0) * (day_of_year + 10.0)).to_radians().cos())
        .to_radians();

    let lat = latitude.to_radians();
    let cos_hour_angle = (OFFICIAL_ZENITH_DEG.to_radians().cos() - lat.sin() * declination.sin())
        / (lat.cos() * declination.cos());

    if cos_hour_angle < -1.0 {
        return MINUTES_PER_DAY;
    }
    if cos_hour_angle > 1.0 {
        return 0.0;
    }

    let hour_angle = cos_hour_angle.acos().to_degrees();
    2.0 * hour_angle / 15.0 * 60.0
}

/// 分を "Xh Ym" 形式に整形する。
///
/// 分単位に丸めてから時と分に分けるので "8h 60m" にはならない。
pub fn format_daylight(total_minutes: f64) -> String {
    let rounded = total_minutes.round().max(0.0) as u32;
    format!("{}h {}m", rounded / 60, rounded % 60)
}

/// 日照時間の傾向。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// 夏至の前後
    Longest,
    /// 冬至の前後
    Shortest,
    Longer,
    Shorter,
}

fn is_near_summer_solstice(date: NaiveDate) -> bool {
    date.month() == 6 && (20..=22).contains(&date.day())
}

fn is_near_winter_solstice(date: NaiveDate) -> bool {
    date.month() == 12 && (20..=23).contains(&date.day())
}

/// 至点の前後なら固定値、それ以外は前日との比較で傾向を返す。
pub fn daylight_trend(date: NaiveDate, latitude: f64) -> Trend {
    if is_near_summer_solstice(date) {
        return Trend::Longest;
    }
    if is_near_winter_solstice(date) {
        return Trend::Shortest;
    }

    let Some(yesterday) = date.pred_opt() else {
        return Trend::Longer;
    };

    if daylight_minutes(date, latitude) >= daylight_minutes(yesterday, latitude) {
        Trend::Longer
    } else {
        Trend::Shorter
    }
}

/// ヘッダー用のフレーズ。例: "10h 42m of light - the day is getting longer"
pub fn daylight_phrase(date: NaiveDate, latitude: f64) -> String {
    let formatted = format_daylight(daylight_minutes(date, latitude));
    let tail = match daylight_trend(date, latitude) {
        Trend::Longest => "the longest day",
        Trend::Shortest => "the shortest day",
        Trend::Longer => "the day is getting longer",
        Trend::Shorter => "the day is getting shorter",
    };
    format!("{formatted} of light - {tail}")
}

/// メタデータ用の方向だけのフレーズ。
pub fn daylight_direction(date: NaiveDate, latitude: f64) -> &'static str {
    match daylight_trend(date, latitude) {
        Trend::Longest => "the longest day",
        Trend::Shortest => "the shortest day",
        Trend::Longer => "the days are getting longer",
        Trend::Shorter => "the days are getting shorter",
    }
}

/// 1 日分の日照情報をまとめたもの。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaylightReport {
    pub date: NaiveDate,
    pub latitude: f64,
    pub minutes: f64,
    pub formatted: String,
    pub trend: Trend,
    pub phrase: String,
    pub direction: String,
}

impl DaylightReport {
    pub fn new(date: NaiveDate, latitude: f64) -> Self {
        let minutes = daylight_minutes(date, latitude);
        Self {
            date,
            latitude,
            minutes,
            formatted: format_daylight(minutes),
            trend: daylight_trend(date, latitude),
            phrase: daylight_phrase(date, latitude),
            direction: daylight_direction(date, latitude).to_string(),
        }
    }
}

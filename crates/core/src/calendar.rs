//! 年間カレンダーのグリッド構築。
//!
//! 1 月 1 日から 12 月 31 日までの各日を (曜日, 週番号) の位置に並べる。
//! 曜日は月曜 = 0 〜 日曜 = 6、週番号は 1 月 1 日を含む月曜始まりの週を 0 とする。
//! すべて `NaiveDate` 上で計算するため、実行環境のタイムゾーンに依存しない。

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use thiserror::Error;

/// 1 週間の日数（グリッドの行数）。
pub const DAYS_PER_WEEK: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("Year {0} is out of the supported range")]
    YearOutOfRange(i32),
}

/// グリッド上の 1 日。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayInfo {
    pub date: NaiveDate,
    /// 月曜 = 0, 日曜 = 6
    pub day_of_week: u8,
    pub week_index: u32,
    /// 1 〜 12
    pub month: u32,
}

/// 月ラベルを置く位置（その月が始まる最初の週番号）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthLabel {
    pub month: u32,
    pub week_index: u32,
}

/// 1 年分の日付配置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearLayout {
    pub year: i32,
    pub days: Vec<DayInfo>,
    pub month_labels: Vec<MonthLabel>,
    pub total_weeks: u32,
}

/// 指定年の日付配置を構築する。
pub fn build_year(year: i32) -> Result<YearLayout, CalendarError> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1).ok_or(CalendarError::YearOutOfRange(year))?;
    let last = NaiveDate::from_ymd_opt(year, 12, 31).ok_or(CalendarError::YearOutOfRange(year))?;

    let start_dow = first.weekday().num_days_from_monday();

    let days: Vec<DayInfo> = first
        .iter_days()
        .take_while(|d| *d <= last)
        .enumerate()
        .map(|(day_index, date)| DayInfo {
            date,
            day_of_week: date.weekday().num_days_from_monday() as u8,
            week_index: (day_index as u32 + start_dow) / DAYS_PER_WEEK as u32,
            month: date.month(),
        })
        .collect();

    let mut month_labels = Vec::with_capacity(12);
    for day in &days {
        if day.date.day() == 1 {
            month_labels.push(MonthLabel {
                month: day.month,
                week_index: day.week_index,
            });
        }
    }

    let total_weeks = days.last().map_or(0, |d| d.week_index + 1);

    Ok(YearLayout {
        year,
        days,
        month_labels,
        total_weeks,
    })
}

impl YearLayout {
    /// 日数（365 または 366）。
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// (曜日, 週番号) の位置にある日を返す。年の前後の空きマスは `None`。
    ///
    /// 曜日が 7 以上のときも `None`。
    pub fn cell(&self, day_of_week: u8, week_index: u32) -> Option<&DayInfo> {
        if usize::from(day_of_week) >= DAYS_PER_WEEK {
            return None;
        }
        let first_dow = u32::from(self.days.first()?.day_of_week);
        let index = week_index
            .checked_mul(DAYS_PER_WEEK as u32)?
            .checked_add(u32::from(day_of_week))?
            .checked_sub(first_dow)?;
        self.days.get(index as usize)
    }

    /// 7 行 × `total_weeks` 列のグリッドを返す。
    pub fn rows(&self) -> Vec<Vec<Option<&DayInfo>>> {
        (0..DAYS_PER_WEEK as u8)
            .map(|dow| (0..self.total_weeks).map(|week| self.cell(dow, week)).collect())
            .collect()
    }
}

/// グリッドに載せる印（日付と作者を持つもの）。
pub trait Mark {
    fn date(&self) -> NaiveDate;
    fn author_slug(&self) -> Option<&str>;
}

/// 斜線の有無。作者順の 1 人目が `a`（\）、2 人目が `b`（/）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Strokes {
    pub a: bool,
    pub b: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell<M> {
    #[serde(flatten)]
    pub day: DayInfo,
    pub is_today: bool,
    pub is_future: bool,
    pub strokes: Strokes,
    pub marks: Vec<M>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridStats {
    /// 印が 1 つ以上ある日数
    pub marked_days: usize,
    /// 2 人とも印をつけた日数
    pub fully_crossed: usize,
}

/// 印を付与した年間グリッド。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearGrid<M> {
    pub year: i32,
    pub total_weeks: u32,
    pub month_labels: Vec<MonthLabel>,
    pub author_order: Vec<String>,
    pub stats: GridStats,
    /// `rows[曜日][週番号]`
    pub rows: Vec<Vec<Option<GridCell<M>>>>,
}

/// 日付配置に印を重ね、今日・未来の判定と統計を付与する。
///
/// 対象年以外の日付の印は無視する。
pub fn annotate<M, I>(layout: &YearLayout, marks: I, today: NaiveDate) -> YearGrid<M>
where
    M: Mark + Clone,
    I: IntoIterator<Item = M>,
{
    let mut by_date: BTreeMap<NaiveDate, Vec<M>> = BTreeMap::new();
    for mark in marks {
        if mark.date().year() == layout.year {
            by_date.entry(mark.date()).or_default().push(mark);
        }
    }

    let author_order: Vec<String> = by_date
        .values()
        .flatten()
        .filter_map(|m| m.author_slug())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let stats = GridStats {
        marked_days: by_date.len(),
        fully_crossed: by_date.values().filter(|m| m.len() >= 2).count(),
    };

    let rows = layout
        .rows()
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|day| {
                    day.map(|day| {
                        let marks = by_date.get(&day.date).cloned().unwrap_or_default();
                        let has = |index: usize| {
                            author_order.get(index).is_some_and(|slug| {
                                marks.iter().any(|m| m.author_slug() == Some(slug.as_str()))
                            })
                        };
                        GridCell {
                            day: *day,
                            is_today: day.date == today,
                            is_future: day.date > today,
                            strokes: Strokes { a: has(0), b: has(1) },
                            marks,
                        }
                    })
                })
                .collect()
        })
        .collect();

    YearGrid {
        year: layout.year,
        total_weeks: layout.total_weeks,
        month_labels: layout.month_labels.clone(),
        author_order,
        stats,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct TestMark {
        date: NaiveDate,
        author: &'static str,
    }

    impl Mark for TestMark {
        fn date(&self) -> NaiveDate {
            self.date
        }

        fn author_slug(&self) -> Option<&str> {
            Some(self.author)
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn layout_of_2026() {
        // 2026-01-01 は木曜日
        let layout = build_year(2026).unwrap();
        assert_eq!(layout.len(), 365);

        let jan1 = layout.days[0];
        assert_eq!(jan1.day_of_week, 3);
        assert_eq!(jan1.week_index, 0);

        // 最初の月曜日 (1/5) から週番号 1
        let jan5 = layout.days[4];
        assert_eq!(jan5.day_of_week, 0);
        assert_eq!(jan5.week_index, 1);

        // 12/31 も木曜日
        let dec31 = *layout.days.last().unwrap();
        assert_eq!(dec31.date, ymd(2026, 12, 31));
        assert_eq!(dec31.day_of_week, 3);
        assert_eq!(layout.total_weeks, dec31.week_index + 1);
        assert_eq!(layout.total_weeks, 53);
    }

    #[test]
    fn month_labels_point_at_the_first_day() {
        let layout = build_year(2026).unwrap();
        assert_eq!(layout.month_labels.len(), 12);
        assert_eq!(layout.month_labels[0], MonthLabel { month: 1, week_index: 0 });
        // 2026-02-01 は日曜日で、1/1 から 31 日目
        assert_eq!(layout.month_labels[1], MonthLabel { month: 2, week_index: (31 + 3) / 7 });
    }

    #[test]
    fn cell_lookup_matches_days() {
        let layout = build_year(2024).unwrap();
        for day in &layout.days {
            assert_eq!(layout.cell(day.day_of_week, day.week_index), Some(day));
        }
        // 2024-01-01 は月曜日なので前の空きマスはない
        assert_eq!(layout.cell(0, 0).map(|d| d.date), Some(ymd(2024, 1, 1)));

        let layout = build_year(2026).unwrap();
        assert_eq!(layout.cell(0, 0), None);
        assert_eq!(layout.cell(2, 0), None);
        assert_eq!(layout.cell(6, layout.total_weeks - 1), None);
        assert_eq!(layout.cell(0, layout.total_weeks), None);
    }

    #[test]
    fn cell_rejects_weekday_outside_the_week() {
        let layout = build_year(2024).unwrap();
        // 翌週の月曜に回り込まない
        assert_eq!(layout.cell(7, 0), None);
        assert_eq!(layout.cell(u8::MAX, 0), None);
        assert_eq!(layout.cell(0, u32::MAX), None);
        assert_eq!(layout.cell(6, u32::MAX), None);
    }

    #[test]
    fn rows_have_seven_rows_of_total_weeks() {
        let layout = build_year(2026).unwrap();
        let rows = layout.rows();
        assert_eq!(rows.len(), 7);
        assert!(rows.iter().all(|r| r.len() == layout.total_weeks as usize));
        let filled: usize = rows.iter().flatten().filter(|c| c.is_some()).count();
        assert_eq!(filled, 365);
    }

    #[test]
    fn out_of_range_year() {
        assert_eq!(build_year(i32::MAX), Err(CalendarError::YearOutOfRange(i32::MAX)));
    }

    #[test]
    fn annotate_marks_and_stats() {
        let layout = build_year(2026).unwrap();
        let marks = vec![
            TestMark { date: ymd(2026, 3, 1), author: "dom" },
            TestMark { date: ymd(2026, 3, 1), author: "jacky" },
            TestMark { date: ymd(2026, 3, 2), author: "jacky" },
            TestMark { date: ymd(2025, 3, 2), author: "jacky" },
        ];
        let today = ymd(2026, 3, 2);

        let grid = annotate(&layout, marks, today);
        assert_eq!(grid.author_order, vec!["dom".to_string(), "jacky".to_string()]);
        assert_eq!(grid.stats, GridStats { marked_days: 2, fully_crossed: 1 });

        let mar1 = layout.days.iter().find(|d| d.date == ymd(2026, 3, 1)).unwrap();
        let cell = grid.rows[mar1.day_of_week as usize][mar1.week_index as usize].as_ref().unwrap();
        assert_eq!(cell.marks.len(), 2);
        assert_eq!(cell.strokes, Strokes { a: true, b: true });
        assert!(!cell.is_today);
        assert!(!cell.is_future);

        let mar2 = layout.days.iter().find(|d| d.date == today).unwrap();
        let cell = grid.rows[mar2.day_of_week as usize][mar2.week_index as usize].as_ref().unwrap();
        assert_eq!(cell.strokes, Strokes { a: false, b: true });
        assert!(cell.is_today);

        let mar3 = layout.days.iter().find(|d| d.date == ymd(2026, 3, 3)).unwrap();
        let cell = grid.rows[mar3.day_of_week as usize][mar3.week_index as usize].as_ref().unwrap();
        assert!(cell.is_future);
        assert!(cell.marks.is_empty());
    }

    #[test]
    fn annotate_without_marks() {
        let layout = build_year(2027).unwrap();
        let grid = annotate::<TestMark, _>(&layout, Vec::new(), ymd(2026, 10, 18));
        assert!(grid.author_order.is_empty());
        assert_eq!(grid.stats, GridStats::default());
        assert!(grid.rows.iter().flatten().flatten().all(|c| c.is_future));
    }
}

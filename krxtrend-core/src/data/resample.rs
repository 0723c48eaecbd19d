//! Daily to weekly/monthly aggregation and trailing-period filtering.
//!
//! Weeks end on Friday and are labelled with that Friday (a Saturday or Sunday
//! bar belongs to the following week). Months are labelled with their last
//! calendar day. Per period: open = first, high = max, low = min,
//! close = last, volume = sum. Periods without bars produce nothing.

use crate::domain::{Bar, BarSeries, SeriesError, Timeframe};
use chrono::{Datelike, Days, Months, NaiveDate, Weekday};

/// The Friday closing the week that contains `date`.
pub fn week_ending(date: NaiveDate) -> NaiveDate {
    let from_monday = date.weekday().num_days_from_monday();
    let to_friday = (Weekday::Fri.num_days_from_monday() + 7 - from_monday) % 7;
    date + Days::new(u64::from(to_friday))
}

/// Last calendar day of the month containing `date`.
pub fn month_ending(date: NaiveDate) -> NaiveDate {
    let first = date.with_day(1).unwrap_or(date);
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

fn aggregate(bars: &[Bar], label: impl Fn(NaiveDate) -> NaiveDate) -> Vec<Bar> {
    let mut out: Vec<Bar> = Vec::new();
    for bar in bars {
        let period = label(bar.date);
        match out.last_mut() {
            Some(acc) if acc.date == period => {
                acc.high = acc.high.max(bar.high);
                acc.low = acc.low.min(bar.low);
                acc.close = bar.close;
                acc.volume += bar.volume;
            }
            _ => out.push(Bar { date: period, ..*bar }),
        }
    }
    out
}

fn from_daily(series: &BarSeries, to: Timeframe) -> Result<BarSeries, SeriesError> {
    let label: fn(NaiveDate) -> NaiveDate = match to {
        Timeframe::Weekly => week_ending,
        Timeframe::Monthly => month_ending,
        Timeframe::Daily => return Ok(series.clone()),
    };
    BarSeries::new(to, aggregate(series.bars(), label))
}

/// Resample `series` to `to`. Only daily input can be aggregated; asking for the
/// series' own timeframe returns a copy.
pub fn resample(series: &BarSeries, to: Timeframe) -> Result<BarSeries, SeriesError> {
    match series.timeframe() {
        from if from == to => Ok(series.clone()),
        Timeframe::Daily => from_daily(series, to),
        from => Err(SeriesError::CannotResample { from, to }),
    }
}

pub fn resample_weekly(series: &BarSeries) -> Result<BarSeries, SeriesError> {
    resample(series, Timeframe::Weekly)
}

pub fn resample_monthly(series: &BarSeries) -> Result<BarSeries, SeriesError> {
    resample(series, Timeframe::Monthly)
}

/// Bars dated on or after the last bar's date minus `years` calendar years.
/// A February 29 anchor falls back to February 28.
pub fn filter_period(series: BarSeries, years: u32) -> BarSeries {
    let Some(last) = series.last().map(|b| b.date) else {
        return series;
    };
    let start = last
        .checked_sub_months(Months::new(years.saturating_mul(12)))
        .unwrap_or(NaiveDate::MIN);
    series.retain(|b| b.date >= start)
}

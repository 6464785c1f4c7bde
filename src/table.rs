use crate::formatting::{
    format_large_number, format_market_value, format_optional, format_percent, format_signed,
    trend_class,
};
use stock_screen::model::{ScreeningRecord, View};
use stock_screen::normalize::DerivedScreeningRecord;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

#[derive(Clone, Copy)]
pub struct Column {
    pub title: &'static str,
    pub width: usize,
    pub numeric: bool,
}

const fn text(title: &'static str, width: usize) -> Column {
    Column {
        title,
        width,
        numeric: false,
    }
}

const fn num(title: &'static str, width: usize) -> Column {
    Column {
        title,
        width,
        numeric: true,
    }
}

const POS: Column = num("Pos", 3);
const CODE: Column = text("Code", 9);
const NAME: Column = text("Name", 12);

const UNDERVALUED_COLUMNS: [Column; 9] = [
    POS,
    CODE,
    NAME,
    num("Price", 8),
    num("1Y Avg", 8),
    num("Diff", 8),
    num("Diff %", 8),
    num("MV 100M", 7),
    num("PE", 6),
];

const WEEKLY_SURGE_COLUMNS: [Column; 10] = [
    POS,
    CODE,
    NAME,
    num("Price", 8),
    num("MV 100M", 8),
    num("PE", 6),
    num("Surge x", 7),
    num("Week %", 8),
    text("New", 3),
    text("Week", 10),
];

const BOTTOM_REVERSAL_COLUMNS: [Column; 9] = [
    POS,
    CODE,
    NAME,
    num("Price", 8),
    num("MV 100M", 8),
    num("Week %", 8),
    num("Surge x", 7),
    num("Down wk", 7),
    text("Week", 10),
];

const ETF_SURGE_COLUMNS: [Column; 8] = [
    POS,
    CODE,
    NAME,
    num("Surge x", 7),
    num("Amt 100M", 8),
    num("Vol", 9),
    num("Max vol", 9),
    text("Week end", 10),
];

const PORTFOLIO_COLUMNS: [Column; 7] = [
    POS,
    CODE,
    NAME,
    text("Strategy", 10),
    text("Industry", 10),
    text("Key metric", 14),
    num("Score", 5),
];

pub const fn columns(view: View) -> &'static [Column] {
    match view {
        View::Undervalued => &UNDERVALUED_COLUMNS,
        View::WeeklyVolumeSurge => &WEEKLY_SURGE_COLUMNS,
        View::BottomReversal => &BOTTOM_REVERSAL_COLUMNS,
        View::EtfVolumeSurge => &ETF_SURGE_COLUMNS,
        View::SmartPortfolio => &PORTFOLIO_COLUMNS,
    }
}

/// Rendered table cell; `class` is the CSS hint used by the HTML report.
pub struct Cell {
    pub text: String,
    pub class: &'static str,
}

impl Cell {
    fn plain(text: String) -> Self {
        Self { text, class: "" }
    }

    fn signed(text: String, value: Option<f64>) -> Self {
        Self {
            text,
            class: trend_class(value),
        }
    }
}

pub fn cells(position: usize, derived: &DerivedScreeningRecord) -> Vec<Cell> {
    let record = &derived.record;
    let mut row = vec![
        Cell::plain(position.to_string()),
        Cell::plain(record.ts_code().to_string()),
        Cell::plain(record.name().to_string()),
    ];
    match record {
        ScreeningRecord::Undervalued(r) => {
            row.push(Cell::plain(format!("{:.2}", r.current_close)));
            row.push(Cell::plain(format_optional(r.avg_close_1y)));
            row.push(Cell::signed(
                format_signed(derived.deviation),
                derived.deviation,
            ));
            row.push(Cell::signed(
                format_percent(derived.deviation_percent),
                derived.deviation_percent,
            ));
            row.push(Cell::plain(format_market_value(r.total_mv_10k)));
            row.push(Cell::plain(format_optional(r.pe_ttm)));
        }
        ScreeningRecord::WeeklyVolumeSurge(r) => {
            row.push(Cell::plain(format!("{:.2}", r.price)));
            row.push(Cell::plain(format!("{:.2}", r.market_value_yi)));
            row.push(Cell::plain(format_optional(r.pe_ttm)));
            row.push(Cell::plain(format!("{:.2}", r.surge_ratio)));
            row.push(Cell::signed(
                format_percent(Some(r.weekly_change_pct)),
                Some(r.weekly_change_pct),
            ));
            row.push(Cell::plain(
                if r.just_started { "yes" } else { "no" }.to_string(),
            ));
            row.push(Cell::plain(r.week_date.clone()));
        }
        ScreeningRecord::BottomReversal(r) => {
            row.push(Cell::plain(format!("{:.2}", r.price)));
            row.push(Cell::plain(format!("{:.2}", r.market_value_yi)));
            row.push(Cell::signed(
                format_percent(Some(r.weekly_change_pct)),
                Some(r.weekly_change_pct),
            ));
            row.push(Cell::plain(format!("{:.2}", r.surge_ratio)));
            row.push(Cell::plain(r.down_weeks.to_string()));
            row.push(Cell::plain(r.week_date.clone()));
        }
        ScreeningRecord::EtfVolumeSurge(r) => {
            row.push(Cell::plain(format!("{:.2}", r.surge_ratio)));
            row.push(Cell::plain(format!("{:.2}", r.last_week_amount_yi)));
            row.push(Cell::plain(format_large_number(r.last_week_volume)));
            row.push(Cell::plain(format_large_number(r.lookback_max_volume)));
            row.push(Cell::plain(r.week_end_date.clone()));
        }
        ScreeningRecord::SmartPortfolio(r) => {
            row.push(Cell::plain(r.strategy_tag.clone()));
            row.push(Cell::plain(r.industry.clone()));
            row.push(Cell::plain(r.key_metric.clone()));
            row.push(Cell::plain(format!("{:.1}", r.weight_score)));
        }
    }
    row
}

/// Pad cells to their column widths and join with `|`. Widths are terminal
/// columns, so CJK names take two per glyph.
pub fn format_line<S: AsRef<str>>(columns: &[Column], values: &[S]) -> String {
    columns
        .iter()
        .zip(values)
        .map(|(column, value)| {
            let value = value.as_ref();
            if column.numeric {
                let pad = column.width.saturating_sub(value.width());
                format!("{}{value}", " ".repeat(pad))
            } else {
                let (fitted, used) = truncate_to_width(value, column.width);
                format!("{fitted}{}", " ".repeat(column.width - used))
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Longest prefix of `value` that fits in `width` columns, and its width.
fn truncate_to_width(value: &str, width: usize) -> (&str, usize) {
    let mut used = 0;
    for (idx, ch) in value.char_indices() {
        let char_width = ch.width().unwrap_or(0);
        if used + char_width > width {
            return (&value[..idx], used);
        }
        used += char_width;
    }
    (value, used)
}

pub fn separator(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|column| "-".repeat(column.width))
        .collect::<Vec<_>>()
        .join("-+-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use stock_screen::model::UndervaluedRecord;
    use stock_screen::normalize::normalize;

    #[test]
    fn every_view_row_matches_its_columns() {
        let record = ScreeningRecord::Undervalued(UndervaluedRecord {
            ts_code: "600519.SH".to_string(),
            name: "Moutai".to_string(),
            total_mv_10k: 21_000_000.0,
            pe_ttm: None,
            current_close: 90.0,
            weekly_last_close: 91.0,
            avg_close_1y: Some(100.0),
        });
        let ranked = normalize(&[record]);
        let row = cells(1, &ranked[0]);
        assert_eq!(row.len(), columns(View::Undervalued).len());
        assert_eq!(row[5].text, "-10.00");
        assert_eq!(row[5].class, "down");
        assert_eq!(row[6].text, "-10.00%");
        assert_eq!(row[7].text, "2100");
        assert_eq!(row[8].text, "-");
    }

    #[test]
    fn lines_are_padded_per_column() {
        let columns = [num("Pos", 3), text("Code", 6)];
        assert_eq!(format_line(&columns, &["1", "AB"]), "  1 | AB    ");
        assert_eq!(separator(&columns), "----+-------");
    }

    #[test]
    fn wide_names_pad_by_display_width() {
        let columns = [text("Name", 6), num("Pos", 3)];
        assert_eq!(format_line(&columns, &["茅台", "1"]), "茅台   |   1");
        let line = format_line(&columns, &["贵州茅台股份", "12345"]);
        assert_eq!(line, "贵州茅 | 12345");
        assert_eq!(format_line(&[text("Name", 5)], &["贵州茅台"]), "贵州 ");
    }
}

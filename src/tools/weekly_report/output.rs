use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, FormatUnderline, Workbook, Worksheet, XlsxError,
};
use tracing::debug;

use super::{
    layout::{Block, BlockKind, ColNum, ReportLayout, RowNum, WeekColumn, LABEL_COL},
    processing::WeeklyFigures,
};

pub const SHEET_NAME: &str = "Nasmedia Data Request";

const NOTES: [&str; 3] = [
    "Week definition: Mon-Sun",
    "Daily is fine too, if they are able to provide.",
    "Starting period: From July '28 (or go forward basis)",
];

struct Formats {
    row1_base: Format,
    header: Format,
    title: Format,
    white_bg: Format,
    light_grey_bg: Format,
    summary_label: Format,
    summary_value: Format,
    breakdown: Format,
    group_header: Format,
    group_rev_bold: Format,
    number: Format,
    label: Format,
}

impl Formats {
    fn new() -> Self {
        let dark_grey = Color::RGB(0xA9A9A9);
        let light_grey = Color::RGB(0xF2F2F2);
        Self {
            row1_base: Format::new()
                .set_background_color(dark_grey)
                .set_border_bottom(FormatBorder::Thick),
            header: Format::new()
                .set_background_color(dark_grey)
                .set_font_color(Color::Black)
                .set_bold()
                .set_border_bottom(FormatBorder::Thick)
                .set_align(FormatAlign::Center),
            title: Format::new()
                .set_background_color(dark_grey)
                .set_font_color(Color::Black)
                .set_bold()
                .set_font_size(12)
                .set_border_bottom(FormatBorder::Thick),
            white_bg: Format::new().set_background_color(Color::White),
            light_grey_bg: Format::new().set_background_color(light_grey),
            summary_label: Format::new().set_background_color(light_grey).set_bold(),
            summary_value: Format::new()
                .set_background_color(light_grey)
                .set_bold()
                .set_num_format("#,##0"),
            breakdown: Format::new().set_bold().set_underline(FormatUnderline::Single),
            group_header: Format::new()
                .set_bold()
                .set_background_color(Color::RGB(0xFFFF00))
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            group_rev_bold: Format::new().set_bold().set_num_format("#,##0"),
            number: Format::new().set_num_format("#,##0"),
            label: Format::new().set_align(FormatAlign::Left),
        }
    }
}

/// Renders the planned layout into an in-memory xlsx file.
pub fn render_workbook(layout: &ReportLayout) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let formats = Formats::new();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    write_frame(worksheet, layout, &formats)?;
    for block in &layout.blocks {
        write_block(worksheet, block, &layout.weeks, &formats)?;
    }
    write_summary(worksheet, layout, &formats)?;

    let bytes = workbook.save_to_buffer()?;
    debug!("rendered workbook of {} bytes", bytes.len());
    Ok(bytes)
}

/// Header band, column setup, notes, and the labels around the summary.
fn write_frame(
    worksheet: &mut Worksheet,
    layout: &ReportLayout,
    formats: &Formats,
) -> Result<(), XlsxError> {
    worksheet.set_row_format(0, &formats.row1_base)?;
    worksheet.set_row_format(1, &formats.white_bg)?;
    for row in 2..5 {
        worksheet.set_row_format(row, &formats.light_grey_bg)?;
    }
    worksheet.set_column_width(0, 1.1)?;
    worksheet.set_column_width(1, 1.1)?;
    worksheet.set_column_width(LABEL_COL, 30)?;
    // D2
    worksheet.set_freeze_panes(1, 3)?;

    worksheet.write_with_format(0, 0, "Ads Revenue", &formats.title)?;
    worksheet.write_blank(0, 1, &formats.row1_base)?;
    worksheet.write_blank(0, 2, &formats.row1_base)?;
    worksheet.write_with_format(6, 1, "Revenue Breakdown", &formats.breakdown)?;

    for WeekColumn { label, column, hidden } in &layout.weeks {
        worksheet.write_with_format(0, *column, label.as_str(), &formats.header)?;
        worksheet.set_column_width(*column, 16)?;
        if *hidden {
            worksheet.set_column_hidden(*column)?;
        }
    }

    let note_col = layout.note_column;
    worksheet.write_with_format(0, note_col, "Note", &formats.header)?;
    worksheet.set_column_width(note_col, 30)?;
    for (row, note) in (2..).zip(NOTES) {
        worksheet.write_with_format(row, note_col, note, &formats.summary_label)?;
    }

    Ok(())
}

fn write_block(
    worksheet: &mut Worksheet,
    block: &Block,
    weeks: &[WeekColumn],
    formats: &Formats,
) -> Result<(), XlsxError> {
    let row = block.first_row;
    match block.kind {
        BlockKind::Group => {
            worksheet.merge_range(row, 1, row, LABEL_COL, &block.name, &formats.group_header)?;
        }
        BlockKind::Campaign => {
            // hidden rows still carry their numbers so they can be unhidden
            if block.hidden {
                for hidden_row in block.rows() {
                    worksheet.set_row_hidden(hidden_row)?;
                }
            }
            worksheet.write(row, LABEL_COL, block.name.as_str())?;
        }
    }
    write_data_rows(worksheet, row, &block.figures, weeks, formats)
}

/// The three measurement rows under a block's name row. Only positive values
/// are written, leaving empty weeks blank.
fn write_data_rows(
    worksheet: &mut Worksheet,
    start_row: RowNum,
    figures: &[WeeklyFigures],
    weeks: &[WeekColumn],
    formats: &Formats,
) -> Result<(), XlsxError> {
    worksheet.write_with_format(start_row + 1, LABEL_COL, "Ads revenue", &formats.label)?;
    worksheet.write_with_format(start_row + 2, LABEL_COL, "CPM", &formats.label)?;
    worksheet.write_with_format(
        start_row + 3,
        LABEL_COL,
        "Impressions (implied)",
        &formats.label,
    )?;

    for (week, figures) in weeks.iter().zip(figures) {
        let col: ColNum = week.column;
        let cpm = figures.cpm();
        if figures.revenue > 0 {
            worksheet.write_with_format(
                start_row + 1,
                col,
                figures.revenue as f64,
                &formats.group_rev_bold,
            )?;
        }
        if cpm > 0.0 {
            worksheet.write_with_format(start_row + 2, col, cpm, &formats.number)?;
        }
        if figures.impressions > 0 {
            worksheet.write_with_format(
                start_row + 3,
                col,
                figures.impressions as f64,
                &formats.number,
            )?;
        }
    }
    Ok(())
}

fn write_summary(
    worksheet: &mut Worksheet,
    layout: &ReportLayout,
    formats: &Formats,
) -> Result<(), XlsxError> {
    worksheet.write_with_format(2, 1, "Total Ads Revenue", &formats.summary_label)?;
    worksheet.write_with_format(3, 1, "Average CPM", &formats.summary_label)?;
    worksheet.write_with_format(4, 1, "Total Nasmedia Fees", &formats.summary_label)?;

    for (week, totals) in layout.weeks.iter().zip(&layout.weekly_totals) {
        let cpm = totals.cpm();
        if totals.revenue > 0 {
            worksheet.write_with_format(
                2,
                week.column,
                totals.revenue as f64,
                &formats.summary_value,
            )?;
        }
        if cpm > 0.0 {
            worksheet.write_with_format(3, week.column, cpm, &formats.summary_value)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeSet,
        io::{Cursor, Read as _},
    };

    use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        ad_rows::AdRow,
        config::ReportSettings,
        tools::weekly_report::{layout, processing},
    };

    fn layout_for(rows: &[AdRow]) -> ReportLayout {
        layout::plan(&processing::summarize(rows), &ReportSettings::default())
    }

    /// Twelve weeks of a running campaign plus one that only ran in W25.
    fn twelve_week_rows() -> Vec<AdRow> {
        let mut rows: Vec<AdRow> = (21..=32)
            .map(|w| AdRow::new("VOD", "Always On", format!("W{w}"), 1500.0, 4_000))
            .collect();
        rows.push(AdRow::new("VOD", "Paused", "W25", 2000.0, 3_000));
        rows
    }

    fn read_sheet(bytes: &[u8]) -> Range<Data> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).unwrap();
        workbook.worksheet_range(SHEET_NAME).unwrap()
    }

    fn sheet_xml(bytes: &[u8]) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut xml = String::new();
        archive.by_name("xl/worksheets/sheet1.xml").unwrap().read_to_string(&mut xml).unwrap();
        xml
    }

    fn attr<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
        let start = tag.find(&format!(" {name}=\""))? + name.len() + 3;
        let len = tag[start..].find('"')?;
        Some(&tag[start..start + len])
    }

    /// Every `<tag ...>` element in the sheet xml.
    fn tags<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
        let open = format!("<{tag} ");
        xml.match_indices(open.as_str())
            .filter_map(|(start, _)| {
                let end = xml[start..].find('>')?;
                Some(&xml[start..start + end])
            })
            .collect()
    }

    /// One-based row numbers marked hidden.
    fn hidden_rows(xml: &str) -> BTreeSet<u32> {
        tags(xml, "row")
            .into_iter()
            .filter(|tag| attr(tag, "hidden") == Some("1"))
            .filter_map(|tag| attr(tag, "r")?.parse().ok())
            .collect()
    }

    /// One-based column numbers marked hidden.
    fn hidden_columns(xml: &str) -> BTreeSet<u32> {
        tags(xml, "col")
            .into_iter()
            .filter(|tag| attr(tag, "hidden") == Some("1"))
            .flat_map(|tag| {
                let min: u32 = attr(tag, "min").and_then(|v| v.parse().ok()).unwrap_or(0);
                let max: u32 = attr(tag, "max").and_then(|v| v.parse().ok()).unwrap_or(0);
                min..=max
            })
            .collect()
    }

    fn is_blank(sheet: &Range<Data>, row: u32, col: u32) -> bool {
        matches!(sheet.get_value((row, col)), None | Some(Data::Empty))
    }

    #[test]
    fn renders_a_zip_container() {
        let bytes = render_workbook(&layout_for(&twelve_week_rows())).unwrap();
        assert!(bytes.len() > 1_000);
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn inactive_campaign_rows_are_hidden_in_the_file() {
        let layout = layout_for(&twelve_week_rows());
        let xml = sheet_xml(&render_workbook(&layout).unwrap());

        // "Paused" is the third block: rows 18..23 zero-based
        let expected: BTreeSet<u32> = (19..=23).collect();
        assert_eq!(hidden_rows(&xml), expected);
        assert_eq!(layout.hidden_rows().iter().map(|row| row + 1).collect::<BTreeSet<_>>(), expected);
    }

    #[test]
    fn only_the_latest_ten_week_columns_are_visible_in_the_file() {
        let xml = sheet_xml(&render_workbook(&layout_for(&twelve_week_rows())).unwrap());
        // W21 and W22 sit in columns D and E
        assert_eq!(hidden_columns(&xml), BTreeSet::from([4, 5]));
    }

    #[test]
    fn short_history_hides_no_columns() {
        let rows = vec![
            AdRow::new("VOD", "Always On", "W31", 1500.0, 4_000),
            AdRow::new("VOD", "Always On", "W32", 1500.0, 4_000),
        ];
        let xml = sheet_xml(&render_workbook(&layout_for(&rows)).unwrap());
        assert!(hidden_columns(&xml).is_empty());
        assert!(hidden_rows(&xml).is_empty());
    }

    #[test]
    fn cells_carry_labels_totals_and_block_values() {
        let sheet = read_sheet(&render_workbook(&layout_for(&twelve_week_rows())).unwrap());
        let text = |row, col| sheet.get_value((row, col)).map(|cell| cell.to_string());

        assert_eq!(text(0, 0).as_deref(), Some("Ads Revenue"));
        assert_eq!(text(0, 3).as_deref(), Some("W21"));
        assert_eq!(text(0, 15).as_deref(), Some("Note"));
        assert_eq!(text(2, 1).as_deref(), Some("Total Ads Revenue"));
        assert_eq!(text(6, 1).as_deref(), Some("Revenue Breakdown"));
        assert_eq!(text(8, 1).as_deref(), Some("VOD"));
        assert_eq!(text(13, 2).as_deref(), Some("Always On"));
        assert_eq!(text(18, 2).as_deref(), Some("Paused"));

        // D10: the group's W21 revenue; row 3 holds the summary
        assert_eq!(sheet.get_value((9, 3)), Some(&Data::Float(6_000.0)));
        assert_eq!(sheet.get_value((2, 3)), Some(&Data::Float(6_000.0)));
        assert_eq!(sheet.get_value((3, 3)), Some(&Data::Float(1_500.0)));
        assert_eq!(sheet.get_value((11, 3)), Some(&Data::Float(4_000.0)));
        // W25 includes the paused campaign
        assert_eq!(sheet.get_value((2, 7)), Some(&Data::Float(12_000.0)));
    }

    #[test]
    fn hidden_rows_keep_values_and_empty_weeks_stay_blank() {
        let sheet = read_sheet(&render_workbook(&layout_for(&twelve_week_rows())).unwrap());

        assert_eq!(sheet.get_value((19, 7)), Some(&Data::Float(6_000.0)));
        assert_eq!(sheet.get_value((21, 7)), Some(&Data::Float(3_000.0)));
        for col in (3..15).filter(|&col| col != 7) {
            assert!(is_blank(&sheet, 19, col), "revenue cell at column {col} is not blank");
            assert!(is_blank(&sheet, 20, col), "cpm cell at column {col} is not blank");
        }
    }

    #[test]
    fn renders_an_empty_layout() {
        let bytes = render_workbook(&layout_for(&[])).unwrap();
        let sheet = read_sheet(&bytes);
        assert_eq!(sheet.get_value((0, 3)).map(|cell| cell.to_string()).as_deref(), Some("Note"));
        assert!(hidden_columns(&sheet_xml(&bytes)).is_empty());
    }

    #[test]
    fn renders_with_many_hidden_week_columns() {
        let rows: Vec<AdRow> =
            (1..=30).map(|w| AdRow::new("VOD", "Long Run", format!("W{w}"), 900.0, 10_000)).collect();
        let xml = sheet_xml(&render_workbook(&layout_for(&rows)).unwrap());
        // D through W
        assert_eq!(hidden_columns(&xml), (4..=23).collect::<BTreeSet<_>>());
    }

    #[test]
    fn week_columns_past_the_sheet_limit_are_rejected() {
        let mut layout = layout_for(&[AdRow::new("VOD", "Always On", "W32", 1500.0, 4_000)]);
        layout.weeks[0].column = ColNum::MAX;
        assert!(render_workbook(&layout).is_err());
    }
}

/// CSV and spreadsheet export of a [`HazardReport`].
///
/// CSV files follow the Norwegian spreadsheet convention: UTF-8 with a byte
/// order mark, `;` between fields, a decimal comma, and timestamps as
/// `dd.mm.yyyy HH:MM` in Oslo time. Alarm flags are written as `1`/`0` and
/// nulls as empty fields.
///
/// The workbook export writes one worksheet per [`ExportGroup`], numbers as
/// numeric cells formatted to the configured number of decimals.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::config::{ExportConfig, MAX_DECIMALS};
use crate::logging::{self, DataSource};
use crate::model::Channel;
use crate::pipeline::{HazardReport, HazardRow};

const BOM: &[u8] = "\u{feff}".as_bytes();
const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Xlsx(XlsxError),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Io(e) => write!(f, "Export I/O error: {}", e),
            ExportError::Csv(e) => write!(f, "CSV error: {}", e),
            ExportError::Xlsx(e) => write!(f, "Spreadsheet error: {}", e),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::Csv(e)
    }
}

impl From<XlsxError> for ExportError {
    fn from(e: XlsxError) -> Self {
        ExportError::Xlsx(e)
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Raw(Channel),
    Smoothed(Channel),
    SnowPrecipitation,
    SnowDepthChange,
    SnowDriftAlarm,
    SlipperyRoadAlarm,
    SaltingRecommended,
    WindDirectionCategory,
    SnowDepthLower,
    SnowDepthUpper,
}

impl Column {
    pub fn header(self) -> String {
        match self {
            Column::Raw(c) => c.column_name().to_string(),
            Column::Smoothed(c) => format!("{}_smoothed", c.column_name()),
            Column::SnowPrecipitation => "snow_precipitation".to_string(),
            Column::SnowDepthChange => "snow_depth_change".to_string(),
            Column::SnowDriftAlarm => "snow_drift_alarm".to_string(),
            Column::SlipperyRoadAlarm => "slippery_road_alarm".to_string(),
            Column::SaltingRecommended => "salting_recommended".to_string(),
            Column::WindDirectionCategory => "wind_direction_category".to_string(),
            Column::SnowDepthLower => "snow_depth_lower".to_string(),
            Column::SnowDepthUpper => "snow_depth_upper".to_string(),
        }
    }

    fn value(self, row: &HazardRow) -> CellValue {
        let number = |v: Option<f64>| v.map_or(CellValue::Empty, CellValue::Number);
        let flag = |b: bool| CellValue::Flag(b);
        match self {
            Column::Raw(c) => number(row.raw.get(c)),
            Column::Smoothed(c) => number(row.smoothed.get(c)),
            Column::SnowPrecipitation => number(Some(row.snow_precipitation)),
            Column::SnowDepthChange => number(row.snow_depth_change),
            Column::SnowDriftAlarm => flag(row.snow_drift_alarm),
            Column::SlipperyRoadAlarm => flag(row.slippery_road_alarm),
            Column::SaltingRecommended => flag(row.salting_recommended),
            Column::WindDirectionCategory => row
                .wind_direction_category
                .map_or(CellValue::Empty, |o| CellValue::Text(o.label())),
            Column::SnowDepthLower => number(row.confidence.lower),
            Column::SnowDepthUpper => number(row.confidence.upper),
        }
    }

    fn cell(self, row: &HazardRow, decimals: usize) -> String {
        match self.value(row) {
            CellValue::Number(v) => format_decimal(v, decimals),
            CellValue::Flag(b) => String::from(if b { "1" } else { "0" }),
            CellValue::Text(t) => t.to_string(),
            CellValue::Empty => String::new(),
        }
    }
}

enum CellValue {
    Number(f64),
    Flag(bool),
    Text(&'static str),
    Empty,
}

/// Every column of the full export, in order.
pub fn all_columns() -> Vec<Column> {
    let mut columns = Vec::new();
    for channel in Channel::ALL {
        columns.push(Column::Raw(channel));
        columns.push(Column::Smoothed(channel));
    }
    columns.extend([
        Column::SnowPrecipitation,
        Column::SnowDepthChange,
        Column::SnowDriftAlarm,
        Column::SlipperyRoadAlarm,
        Column::SaltingRecommended,
        Column::WindDirectionCategory,
        Column::SnowDepthLower,
        Column::SnowDepthUpper,
    ]);
    columns
}

/// Logical column groups, one worksheet each in the workbook export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportGroup {
    Temperature,
    Precipitation,
    Snow,
    Wind,
    Alarms,
}

impl ExportGroup {
    pub const ALL: [ExportGroup; 5] = [
        ExportGroup::Temperature,
        ExportGroup::Precipitation,
        ExportGroup::Snow,
        ExportGroup::Wind,
        ExportGroup::Alarms,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExportGroup::Temperature => "temperature",
            ExportGroup::Precipitation => "precipitation",
            ExportGroup::Snow => "snow",
            ExportGroup::Wind => "wind",
            ExportGroup::Alarms => "alarms",
        }
    }

    pub fn columns(self) -> Vec<Column> {
        let pair = |c: Channel| [Column::Raw(c), Column::Smoothed(c)];
        match self {
            ExportGroup::Temperature => [
                pair(Channel::AirTemperature),
                pair(Channel::SurfaceTemperature),
                pair(Channel::DewPoint),
                pair(Channel::RelativeHumidity),
            ]
            .concat(),
            ExportGroup::Precipitation => {
                let mut columns = pair(Channel::Precipitation).to_vec();
                columns.push(Column::SnowPrecipitation);
                columns
            }
            ExportGroup::Snow => {
                let mut columns = pair(Channel::SnowDepth).to_vec();
                columns.extend([
                    Column::SnowDepthChange,
                    Column::SnowDepthLower,
                    Column::SnowDepthUpper,
                ]);
                columns
            }
            ExportGroup::Wind => {
                let mut columns = [pair(Channel::WindSpeed), pair(Channel::WindGust)].concat();
                columns.extend([
                    Column::Raw(Channel::WindFromDirection),
                    Column::WindDirectionCategory,
                ]);
                columns
            }
            ExportGroup::Alarms => vec![
                Column::SnowDriftAlarm,
                Column::SlipperyRoadAlarm,
                Column::SaltingRecommended,
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Round to `decimals` places, at most [`MAX_DECIMALS`].
fn round_to(value: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals.min(MAX_DECIMALS) as i32);
    let rounded = (value * factor).round() / factor;
    // avoid "-0,0"
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Round to `decimals` places and write with a decimal comma.
pub fn format_decimal(value: f64, decimals: usize) -> String {
    let decimals = decimals.min(MAX_DECIMALS);
    format!("{:.*}", decimals, round_to(value, decimals)).replace('.', ",")
}

/// Excel number format showing `decimals` places, e.g. `0.0`.
fn number_format(decimals: usize) -> String {
    match decimals.min(MAX_DECIMALS) {
        0 => "0".to_string(),
        n => format!("0.{}", "0".repeat(n)),
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Write the selected columns of `report` as CSV to `out`.
pub fn write_csv<W: Write>(
    report: &HazardReport,
    columns: &[Column],
    mut out: W,
    config: &ExportConfig,
) -> Result<(), ExportError> {
    out.write_all(BOM)?;
    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_writer(out);

    let mut header = vec!["timestamp".to_string()];
    header.extend(columns.iter().map(|c| c.header()));
    writer.write_record(&header)?;

    for row in report.rows() {
        let mut record = vec![row.timestamp.format(TIMESTAMP_FORMAT).to_string()];
        record.extend(columns.iter().map(|c| c.cell(&row, config.decimals)));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// The full export as a string, BOM included.
pub fn to_csv_string(report: &HazardReport, config: &ExportConfig) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    write_csv(report, &all_columns(), &mut buffer, config)?;
    String::from_utf8(buffer)
        .map_err(|e| ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Write the full export to `path`.
pub fn export_csv(
    report: &HazardReport,
    path: &Path,
    config: &ExportConfig,
) -> Result<(), ExportError> {
    let file = BufWriter::new(File::create(path)?);
    write_csv(report, &all_columns(), file, config)?;
    logging::info(
        DataSource::Export,
        Some(&report.station_id),
        &format!("wrote {} rows to {}", report.len(), path.display()),
    );
    Ok(())
}

/// Build a workbook with one worksheet per [`ExportGroup`], each starting
/// with the timestamp column.
pub fn build_workbook(
    report: &HazardReport,
    config: &ExportConfig,
) -> Result<Workbook, ExportError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let decimal_format = Format::new().set_num_format(number_format(config.decimals));

    for group in ExportGroup::ALL {
        let columns = group.columns();
        let sheet = workbook.add_worksheet();
        sheet.set_name(group.name())?;
        sheet.set_freeze_panes(1, 0)?;
        sheet.set_column_width(0, 17)?;

        sheet.write_string_with_format(0, 0, "timestamp", &header_format)?;
        for (col, column) in columns.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16 + 1, column.header(), &header_format)?;
        }

        for (i, row) in report.rows().enumerate() {
            let r = i as u32 + 1;
            sheet.write_string(r, 0, row.timestamp.format(TIMESTAMP_FORMAT).to_string())?;
            for (col, column) in columns.iter().enumerate() {
                let c = col as u16 + 1;
                match column.value(&row) {
                    CellValue::Number(v) => {
                        sheet.write_number_with_format(
                            r,
                            c,
                            round_to(v, config.decimals),
                            &decimal_format,
                        )?;
                    }
                    CellValue::Flag(b) => {
                        sheet.write_number(r, c, if b { 1.0 } else { 0.0 })?;
                    }
                    CellValue::Text(t) => {
                        sheet.write_string(r, c, t)?;
                    }
                    CellValue::Empty => {}
                }
            }
        }
    }
    Ok(workbook)
}

/// Write the grouped workbook to `path` (`.xlsx`).
pub fn export_workbook(
    report: &HazardReport,
    path: &Path,
    config: &ExportConfig,
) -> Result<(), ExportError> {
    let mut workbook = build_workbook(report, config)?;
    workbook.save(path)?;
    logging::info(
        DataSource::Export,
        Some(&report.station_id),
        &format!(
            "wrote {} sheets of {} rows to {}",
            ExportGroup::ALL.len(),
            report.len(),
            path.display()
        ),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::model::{ObservationSeries, Sample};
    use crate::pipeline::run;
    use chrono::{Duration, TimeZone};
    use chrono_tz::Europe::Oslo;

    fn report() -> HazardReport {
        let start = Oslo.with_ymd_and_hms(2024, 1, 10, 7, 0, 0).unwrap();
        let samples = (0..3)
            .map(|h| {
                let mut s = Sample::empty(start + Duration::hours(h));
                s.air_temperature = Some(-2.26);
                s.precipitation = Some(0.0);
                s.snow_depth = Some(40.0);
                s.wind_from_direction = Some(95.0);
                s
            })
            .collect();
        run(
            &ObservationSeries::from_samples("SN46220", samples),
            &PipelineConfig::default(),
        )
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(-2.26, 1), "-2,3");
        assert_eq!(format_decimal(12.0, 1), "12,0");
        assert_eq!(format_decimal(-0.04, 1), "0,0");
        assert_eq!(format_decimal(3.14159, 2), "3,14");
        assert_eq!(format_decimal(7.6, 0), "8");
    }

    #[test]
    fn test_csv_layout() {
        let text = to_csv_string(&report(), &ExportConfig::default()).unwrap();
        assert!(text.starts_with('\u{feff}'), "UTF-8 BOM first");

        let mut lines = text.trim_start_matches('\u{feff}').lines();
        let header: Vec<&str> = lines.next().unwrap().split(';').collect();
        assert_eq!(header[0], "timestamp");
        assert_eq!(header[1], "air_temperature");
        assert_eq!(header[2], "air_temperature_smoothed");
        assert_eq!(header.len(), 1 + all_columns().len());

        let first: Vec<&str> = lines.next().unwrap().split(';').collect();
        assert_eq!(first.len(), header.len());
        assert_eq!(first[0], "10.01.2024 07:00");
        assert_eq!(first[1], "-2,3");

        let col = |name: &str| header.iter().position(|h| *h == name).unwrap();
        assert_eq!(first[col("snow_depth_change")], "", "null at first row");
        assert_eq!(first[col("snow_drift_alarm")], "0");
        assert_eq!(first[col("wind_direction_category")], "E");
        assert_eq!(first[col("max_wind_speed")], "", "absent channel stays empty");
        assert_eq!(lines.count(), 2);
    }

    #[test]
    fn test_groups_cover_every_column() {
        let mut grouped: Vec<Column> = ExportGroup::ALL
            .iter()
            .flat_map(|g| g.columns())
            .collect();
        // direction is only exported raw
        grouped.push(Column::Smoothed(Channel::WindFromDirection));
        for column in all_columns() {
            assert!(grouped.contains(&column), "{:?} missing from groups", column);
        }
    }

    #[test]
    fn test_decimals_are_capped() {
        assert_eq!(format_decimal(1.5, 400), "1,500000");
        assert!(!format_decimal(-2.26, usize::MAX).contains("NaN"));
        assert_eq!(number_format(0), "0");
        assert_eq!(number_format(2), "0.00");
        assert_eq!(number_format(99), "0.000000");
    }

    #[test]
    fn test_workbook_has_one_sheet_per_group() {
        let mut workbook = build_workbook(&report(), &ExportConfig::default()).unwrap();

        let names: Vec<String> = workbook.worksheets().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["temperature", "precipitation", "snow", "wind", "alarms"]
        );

        let bytes = workbook.save_to_buffer().unwrap();
        assert!(bytes.starts_with(b"PK"), "xlsx is a zip container");
    }

    #[test]
    fn test_export_workbook_writes_file() {
        let path = std::env::temp_dir().join(format!("hazmon_export_{}.xlsx", std::process::id()));
        export_workbook(&report(), &path, &ExportConfig::default()).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"PK"));
        // zip entry names are stored uncompressed
        let entry = |name: &str| bytes.windows(name.len()).any(|w| w == name.as_bytes());
        assert!(entry("xl/worksheets/sheet5.xml"), "alarms sheet written");
        assert!(!entry("xl/worksheets/sheet6.xml"));

        std::fs::remove_file(&path).ok();
    }
}

//! 汇总表 CSV 导出

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::{Cell, ReportConfig, ReportType, SummaryRow};

/// Excel 打开 UTF-8 CSV 需要 BOM
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("写入导出文件 {path} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV 编码失败: {0}")]
    Csv(#[from] csv::Error),

    #[error("没有可导出的数据")]
    Empty,
}

/// 导出文件名
pub fn file_name(report_type: ReportType) -> String {
    format!(
        "summary_{}_snapshot.csv",
        report_type.as_str().to_ascii_lowercase()
    )
}

fn cell_text(row: &SummaryRow, column: &str) -> String {
    match row.cell(column) {
        Cell::Text(text) => text.to_string(),
        Cell::Number(n) => n.to_string(),
        Cell::Missing => String::new(),
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ExportError {
    let path = path.to_path_buf();
    move |source| ExportError::Io { path, source }
}

/// 写出 CSV：BOM、列名表头、每行一条；`dest` 用于错误信息
pub fn write_csv<W: Write>(
    mut writer: W,
    dest: &Path,
    rows: &[SummaryRow],
    config: &ReportConfig,
) -> Result<(), ExportError> {
    if rows.is_empty() {
        return Err(ExportError::Empty);
    }

    writer.write_all(UTF8_BOM).map_err(io_err(dest))?;

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(config.columns)?;
    for row in rows {
        csv_writer.write_record(config.columns.iter().map(|column| cell_text(row, column)))?;
    }
    csv_writer.flush().map_err(io_err(dest))?;
    Ok(())
}

/// 导出到目录，返回文件路径
pub fn export_to_dir(
    dir: &Path,
    report_type: ReportType,
    rows: &[SummaryRow],
) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir).map_err(io_err(dir))?;
    let path = dir.join(file_name(report_type));
    let file = File::create(&path).map_err(io_err(&path))?;
    write_csv(file, &path, rows, report_type.config())?;

    tracing::info!(path = %path.display(), rows = rows.len(), "汇总表已导出");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::B2B_CONFIG;

    fn sample() -> Vec<SummaryRow> {
        vec![
            SummaryRow {
                region: "Europe".into(),
                country: "DE, Berlin".into(),
                sku_count: Some(12.0),
                total_score_pct: Some(88.5),
                ..Default::default()
            }
            .with_score("title_tag_score", 18.0),
        ]
    }

    #[test]
    fn test_write_csv_layout() {
        let mut out = Vec::new();
        write_csv(&mut out, Path::new("out.csv"), &sample(), &B2B_CONFIG).unwrap();

        assert!(out.starts_with(UTF8_BOM));
        let text = String::from_utf8(out[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some(
                "region,country,sku_count,title_tag_score,description_tag_score,h1_tag_score,canonical_link_score,feature_alt_score,total_score_pct"
            )
        );
        assert_eq!(lines.next(), Some("Europe,\"DE, Berlin\",12,18,,,,,88.5"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_empty_export_is_error() {
        let mut out = Vec::new();
        assert!(matches!(
            write_csv(&mut out, Path::new("out.csv"), &[], &B2B_CONFIG),
            Err(ExportError::Empty)
        ));
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_reports_path() {
        let err = write_csv(FullDisk, Path::new("exports/b2b.csv"), &sample(), &B2B_CONFIG)
            .unwrap_err();
        match &err {
            ExportError::Io { path, source } => {
                assert_eq!(path, Path::new("exports/b2b.csv"));
                assert_eq!(source.to_string(), "disk full");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("exports/b2b.csv"));
    }

    #[test]
    fn test_export_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = export_to_dir(dir.path(), ReportType::B2B, &sample()).unwrap();
        assert_eq!(path.file_name().unwrap(), "summary_b2b_snapshot.csv");
        assert!(std::fs::read(&path).unwrap().len() > UTF8_BOM.len());
    }
}

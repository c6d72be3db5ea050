use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use hr_core::core::ExportError;
use tracing::info;

use crate::dataset::EmployeeTable;
use crate::risk::{RiskSelection, RiskSummary, ScoredRow};

/// Identity columns copied into the results file when the dataset has them.
pub const IDENTITY_COLUMNS: [&str; 8] = [
    "EmployeeNumber",
    "EmployeeName",
    "Department",
    "JobRole",
    "MonthlyIncome",
    "YearsAtCompany",
    "Age",
    "JobSatisfaction",
];
pub const PROBABILITY_COLUMN: &str = "pred_attrition_prob";
pub const LABEL_COLUMN: &str = "pred_attrition_label";

pub fn label_text(label: u8) -> &'static str {
    if label == 1 {
        "At Risk"
    } else {
        "Stable"
    }
}

/// Paths written by [`RiskReport::export`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportPaths {
    pub results: PathBuf,
    pub summary: PathBuf,
}

/// Selected at-risk rows of a scored table, ready to export.
///
/// The summary describes the whole table; the results list only the selection.
#[derive(Clone, Debug)]
pub struct RiskReport<'a> {
    table: &'a EmployeeTable,
    selection: RiskSelection,
    rows: Vec<ScoredRow>,
    summary: RiskSummary,
    generated_at: DateTime<Utc>,
}

impl<'a> RiskReport<'a> {
    pub fn new(
        table: &'a EmployeeTable,
        selection: RiskSelection,
        rows: Vec<ScoredRow>,
        summary: RiskSummary,
    ) -> Self {
        Self {
            table,
            selection,
            rows,
            summary,
            generated_at: Utc::now(),
        }
    }

    pub fn with_generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = at;
        self
    }

    pub fn rows(&self) -> &[ScoredRow] {
        &self.rows
    }

    pub fn summary(&self) -> &RiskSummary {
        &self.summary
    }

    pub fn identity_columns(&self) -> Vec<&'static str> {
        IDENTITY_COLUMNS
            .into_iter()
            .filter(|c| self.table.has_column(c))
            .collect()
    }

    pub fn write_results<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let identity = self.identity_columns();
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer
            .write_record(identity.iter().copied().chain([PROBABILITY_COLUMN, LABEL_COLUMN]))
            .map_err(encode_error)?;

        for row in &self.rows {
            let mut record: Vec<String> = identity
                .iter()
                .map(|c| {
                    self.table
                        .cell(row.index, c)
                        .map(ToString::to_string)
                        .unwrap_or_default()
                })
                .collect();
            record.push(row.probability.to_string());
            record.push(label_text(row.label).to_owned());
            csv_writer.write_record(&record).map_err(encode_error)?;
        }
        csv_writer.flush().map_err(|e| ExportError::Encode(e.to_string()))
    }

    pub fn summary_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Filter Criteria", self.selection.describe()),
            ("Total Employees", self.summary.total.to_string()),
            ("Filtered Results", self.rows.len().to_string()),
            (
                "Avg Risk Probability",
                format!("{:.1}%", self.summary.mean_probability * 100.0),
            ),
            (
                "Predicted Attrition",
                self.summary.predicted_attrition.to_string(),
            ),
            (
                "Attrition %",
                format!("{:.1}%", self.summary.attrition_percent),
            ),
            (
                "Export Time",
                self.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
        ]
    }

    pub fn write_summary<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer
            .write_record(["Metric", "Value"])
            .map_err(encode_error)?;
        for (metric, value) in self.summary_rows() {
            csv_writer
                .write_record([metric, value.as_str()])
                .map_err(encode_error)?;
        }
        csv_writer.flush().map_err(|e| ExportError::Encode(e.to_string()))
    }

    /// Writes `attrition_risk_<stamp>.csv` and `attrition_risk_<stamp>_summary.csv` into `dir`.
    pub fn export(&self, dir: impl AsRef<Path>) -> Result<ReportPaths, ExportError> {
        if self.rows.is_empty() {
            return Err(ExportError::Empty(
                "no employees match the selected criteria".into(),
            ));
        }
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let stamp = self.generated_at.format("%Y%m%d_%H%M%S");
        let paths = ReportPaths {
            results: dir.join(format!("attrition_risk_{stamp}.csv")),
            summary: dir.join(format!("attrition_risk_{stamp}_summary.csv")),
        };
        self.write_results(create_file(&paths.results)?)?;
        self.write_summary(create_file(&paths.summary)?)?;

        info!(
            results = %paths.results.display(),
            rows = self.rows.len(),
            "risk report exported"
        );
        Ok(paths)
    }
}

fn create_file(path: &Path) -> Result<File, ExportError> {
    File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn encode_error(err: csv::Error) -> ExportError {
    ExportError::Encode(err.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;
    use crate::dataset::Column;
    use crate::risk::select_at_risk;

    fn table() -> EmployeeTable {
        EmployeeTable::new(vec![
            Column::text("EmployeeNumber", ["1", "2", "3"]),
            Column::text("Department", ["Sales", "HR", "Research"]),
            Column::numeric("OverTimeHours", [4.0, 0.0, 9.0]),
        ])
        .expect("table")
    }

    fn report(table: &EmployeeTable, selection: RiskSelection) -> RiskReport<'_> {
        let probabilities = [0.2, 0.55, 0.9];
        let rows = select_at_risk(&probabilities, selection).expect("select");
        RiskReport::new(
            table,
            selection,
            rows,
            RiskSummary::from_probabilities(&probabilities),
        )
        .with_generated_at(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
                .single()
                .expect("valid time"),
        )
    }

    #[test]
    fn test_results_csv_uses_present_identity_columns() {
        let table = table();
        let report = report(&table, RiskSelection::Threshold(0.5));
        let mut out = Vec::new();
        report.write_results(&mut out).expect("write");

        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(
            text,
            "EmployeeNumber,Department,pred_attrition_prob,pred_attrition_label\n\
             3,Research,0.9,At Risk\n\
             2,HR,0.55,At Risk\n"
        );
    }

    #[test]
    fn test_summary_covers_whole_table() {
        let table = table();
        let report = report(&table, RiskSelection::TopN(1));
        let rows = report.summary_rows();
        assert_eq!(
            rows[0],
            (
                "Filter Criteria",
                "Top 1 employees by attrition probability".to_owned()
            )
        );
        assert_eq!(rows[1].1, "3");
        assert_eq!(rows[2].1, "1");
        assert_eq!(rows[3].1, "55.0%");
        assert_eq!(rows[4].1, "2");
        assert_eq!(rows[5].1, "66.7%");
        assert_eq!(rows[6].1, "2026-03-01 09:30:00");
    }

    #[test]
    fn test_export_writes_both_files() {
        let table = table();
        let dir = TempDir::new().expect("temp dir");
        let paths = report(&table, RiskSelection::TopN(2))
            .export(dir.path().join("reports"))
            .expect("export");

        assert!(paths
            .results
            .ends_with("attrition_risk_20260301_093000.csv"));
        let summary = std::fs::read_to_string(&paths.summary).expect("summary");
        assert!(summary.starts_with("Metric,Value\n"));
        assert!(summary.contains("Filtered Results,2\n"));
    }

    #[test]
    fn test_export_nothing_selected() {
        let table = table();
        let dir = TempDir::new().expect("temp dir");
        let err = report(&table, RiskSelection::Threshold(0.95))
            .export(dir.path())
            .unwrap_err();
        assert!(matches!(err, ExportError::Empty(_)));
    }
}

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use hr_cli::bootstrap::into_runtime;
use hr_cli::config::AppConfig;
use hr_cli::context::AppContext;
use hr_core::core::{Candidate, InterviewSession};
use tempfile::TempDir;

pub const EMPLOYEE_ROWS: usize = 120;
pub const SESSION_NAME: &str = "Q3 Platform Hiring";

// ---------------------------------------------------------------------------
// Employee dataset
// ---------------------------------------------------------------------------

/// Synthetic HR extract. Employees with low income and low satisfaction leave.
pub fn employee_csv() -> String {
    let departments = ["Sales", "Research & Development", "Human Resources"];
    let mut csv = String::from(
        "EmployeeNumber,Age,Department,JobRole,MonthlyIncome,JobSatisfaction,YearsAtCompany,OverTime,Attrition\n",
    );
    for i in 0..EMPLOYEE_ROWS {
        let income = 2_000 + (i * 137) % 7_000;
        let satisfaction = 1 + i % 4;
        let leaves = income < 4_500 && satisfaction <= 2;
        let age = if i % 17 == 0 {
            String::new()
        } else {
            (22 + i % 35).to_string()
        };
        let _ = writeln!(
            csv,
            "{},{},{},{},{},{},{},{},{}",
            1_000 + i,
            age,
            departments[i % departments.len()],
            if i % 2 == 0 { "Engineer" } else { "Analyst" },
            income,
            satisfaction,
            i % 12,
            if i % 3 == 0 { "Yes" } else { "No" },
            if leaves { "Yes" } else { "No" },
        );
    }
    csv
}

pub fn write_employees(dir: &Path) -> PathBuf {
    let path = dir.join("employees.csv");
    std::fs::write(&path, employee_csv()).expect("write employee csv");
    path
}

// ---------------------------------------------------------------------------
// TestApp: context rooted in a temp directory
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub dir: TempDir,
    pub ctx: AppContext,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let ctx = open_context(dir.path());
        Self { dir, ctx }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn employees(&self) -> PathBuf {
        write_employees(self.path())
    }

    /// A second context over the same database and model directory.
    pub fn reopen(&self) -> AppContext {
        open_context(self.path())
    }
}

pub fn test_config(root: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.database_path = root.join("data").join("hr.db").display().to_string();
    config.model.directory = root.join("model").display().to_string();
    config.training.n_estimators = 25;
    config.training.max_depth = 8;
    config.training.min_samples_split = 4;
    config.training.min_samples_leaf = 2;
    config
}

pub fn open_context(root: &Path) -> AppContext {
    let runtime = into_runtime(test_config(root)).expect("valid config");
    AppContext::open(runtime).expect("open context")
}

// ---------------------------------------------------------------------------
// Interview fixtures
// ---------------------------------------------------------------------------

pub fn sample_session() -> InterviewSession {
    let mut session = InterviewSession::new(
        SESSION_NAME,
        NaiveDate::from_ymd_opt(2026, 9, 14).expect("date"),
        "Dana Lee",
    )
    .with_custom_metrics(["Leadership"]);

    let roster = [
        ("Alice", 9.0, 6.0, Some(8.0)),
        ("Bob", 6.0, 9.0, None),
        ("Chen", 7.0, 7.0, Some(5.0)),
    ];
    for (name, technical, communication, leadership) in roster {
        let mut candidate = Candidate::new(name, "Platform Engineer")
            .with_score("Technical Skills", technical)
            .with_score("Communication", communication);
        if let Some(value) = leadership {
            candidate.scores.insert("Leadership", value);
        }
        session.add_candidate(candidate).expect("add candidate");
    }
    session
}

pub fn output(buf: Vec<u8>) -> String {
    String::from_utf8(buf).expect("utf8 output")
}

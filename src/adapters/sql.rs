// SQL adapter - one step per statement, with the statement and result set attached

use super::finish_step;
use crate::lifecycle::AllureLifecycle;
use crate::model::{Status, StepResult};
use crate::utils;
use std::sync::Arc;

const UNKNOWN_STATEMENT: &str = "UNKNOWN";

/// Tabular query result, attached as CSV
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultSet {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_row<I, S>(mut self, row: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.rows.push(row.into_iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_csv_line(&mut out, &self.columns);
        for row in &self.rows {
            push_csv_line(&mut out, row);
        }
        out
    }
}

fn push_csv_line(out: &mut String, fields: &[String]) {
    let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
    out.push_str(&line.join(","));
    out.push('\n');
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Step name for a batch: the statements joined by newlines
pub fn batch_step_name(statements: &[&str]) -> String {
    let non_empty: Vec<&str> = statements
        .iter()
        .copied()
        .filter(|s| !s.trim().is_empty())
        .collect();
    if non_empty.is_empty() {
        UNKNOWN_STATEMENT.to_string()
    } else {
        non_empty.join("\n")
    }
}

/// Reports database statements executed during a test
pub struct AllureSql {
    lifecycle: Arc<AllureLifecycle>,
    attach_statement: bool,
}

impl AllureSql {
    pub fn new() -> Self {
        Self::with_lifecycle(crate::allure::get_lifecycle())
    }

    pub fn with_lifecycle(lifecycle: Arc<AllureLifecycle>) -> Self {
        Self {
            lifecycle,
            attach_statement: true,
        }
    }

    /// Attach the statement text to the step (default)
    pub fn attach_statement(mut self, value: bool) -> Self {
        self.attach_statement = value;
        self
    }

    /// Runs a statement that returns no rows
    pub fn execute<T, E>(&self, sql: &str, run: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: std::error::Error + 'static,
    {
        self.run_step(sql, run, |_| None)
    }

    /// Runs a query and attaches its rows as `ResultSet`
    pub fn query<E>(
        &self,
        sql: &str,
        run: impl FnOnce() -> Result<ResultSet, E>,
    ) -> Result<ResultSet, E>
    where
        E: std::error::Error + 'static,
    {
        self.run_step(sql, run, |rows| Some(rows.to_csv()))
    }

    pub fn execute_batch<T, E>(
        &self,
        statements: &[&str],
        run: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: std::error::Error + 'static,
    {
        self.run_step(&batch_step_name(statements), run, |_| None)
    }

    fn run_step<T, E>(
        &self,
        sql: &str,
        run: impl FnOnce() -> Result<T, E>,
        csv: impl FnOnce(&T) -> Option<String>,
    ) -> Result<T, E>
    where
        E: std::error::Error + 'static,
    {
        if self.lifecycle.current_test_case_or_step().is_none() {
            return run();
        }

        let name = if sql.trim().is_empty() {
            UNKNOWN_STATEMENT
        } else {
            sql
        };
        let uuid = uuid::Uuid::new_v4().to_string();
        self.lifecycle.start_step(&uuid, StepResult::named(name));
        if self.attach_statement {
            self.lifecycle
                .add_attachment("Query", "application/sql", ".sql", name.as_bytes());
        }

        let outcome = run();
        match &outcome {
            Ok(value) => {
                if let Some(csv) = csv(value) {
                    self.lifecycle
                        .add_attachment("ResultSet", "text/csv", ".csv", csv.as_bytes());
                }
                finish_step(&self.lifecycle, &uuid, Status::Passed, None);
            }
            Err(e) => {
                let details = utils::status_details_from_error(e);
                finish_step(&self.lifecycle, &uuid, utils::status_from_error(e), Some(details));
            }
        }
        outcome
    }
}

impl Default for AllureSql {
    fn default() -> Self {
        Self::new()
    }
}

// List command - list test results of a results directory

use anyhow::Result;
use console::Style;

use crate::cli::args::ListArgs;
use crate::config::Config;
use crate::model::{Status, TestResult};
use crate::report::summary::{display_name, duration_ms};

use super::truncate_str;

const NAME_WIDTH: usize = 60;

fn status_style(status: Option<Status>) -> Style {
    match status {
        Some(Status::Passed) => Style::new().green(),
        Some(Status::Failed) => Style::new().red(),
        Some(Status::Broken) => Style::new().yellow(),
        _ => Style::new().dim(),
    }
}

/// Results matching the optional status filter, oldest first
pub fn select<'a>(results: &'a [TestResult], status: Option<Status>) -> Vec<&'a TestResult> {
    let mut selected: Vec<&TestResult> = results
        .iter()
        .filter(|r| status.is_none() || r.status == status)
        .collect();
    selected.sort_by_key(|r| (r.start.unwrap_or(i64::MAX), r.uuid.clone()));
    selected
}

pub fn handle_list(args: &ListArgs, config: &Config) -> Result<()> {
    let dir = args.dir.resolve(config);
    let results = super::load_results(&dir)?;
    let selected = select(&results.results, args.status);

    if args.is_json() {
        let tests: Vec<serde_json::Value> = selected
            .iter()
            .map(|r| {
                serde_json::json!({
                    "uuid": r.uuid,
                    "name": display_name(r),
                    "fullName": r.full_name,
                    "status": r.status,
                    "duration": duration_ms(r),
                    "historyId": r.history_id,
                })
            })
            .collect();

        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "tests": tests }))?
        );
    } else {
        for result in selected {
            let status = result.status.map(|s| s.as_str()).unwrap_or("unknown");
            let name = result
                .full_name
                .clone()
                .unwrap_or_else(|| display_name(result));
            println!(
                "{:<8} {:<width$} {:>6}ms",
                status_style(result.status).apply_to(status),
                truncate_str(&name, NAME_WIDTH),
                duration_ms(result),
                width = NAME_WIDTH
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_filters_and_orders() {
        let mut late = TestResult::new("late");
        late.start = Some(20);
        late.status = Some(Status::Failed);
        let mut early = TestResult::new("early");
        early.start = Some(10);
        early.status = Some(Status::Failed);
        let mut passed = TestResult::new("passed");
        passed.status = Some(Status::Passed);

        let results = vec![late, passed, early];
        let failed: Vec<_> = select(&results, Some(Status::Failed))
            .iter()
            .map(|r| r.uuid.as_str())
            .collect();
        assert_eq!(failed, ["early", "late"]);
        assert_eq!(select(&results, None).len(), 3);
    }
}

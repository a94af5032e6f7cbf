pub mod adapters;
pub mod allure;
pub mod attachment;
pub mod cli;
pub mod commands;
pub mod config;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod reader;
pub mod report;
pub mod time;
pub mod utils;
pub mod writer;

pub use lifecycle::AllureLifecycle;
pub use model::{Status, StatusDetails, StepResult, TestResult, TestResultContainer};
pub use writer::{FileSystemResultsWriter, InMemoryResultsWriter, ResultsWriter};

// Model module - Allure 2 result format

pub mod meta;
pub mod results;
pub mod status;

pub use meta::{Attachment, Label, Link, Parameter, ParameterMode};
pub use results::{
    FixtureResult, StepResult, TestResult, TestResultContainer, WithAttachments, WithSteps,
};
pub use status::{Stage, Status, StatusDetails};

pub const TEST_RESULT_FILE_SUFFIX: &str = "-result.json";
pub const TEST_RESULT_CONTAINER_FILE_SUFFIX: &str = "-container.json";
pub const ATTACHMENT_FILE_SUFFIX: &str = "-attachment";

/// File name for a test result with the given uuid
pub fn test_result_file_name(uuid: &str) -> String {
    format!("{}{}", uuid, TEST_RESULT_FILE_SUFFIX)
}

/// File name for a container with the given uuid
pub fn container_file_name(uuid: &str) -> String {
    format!("{}{}", uuid, TEST_RESULT_CONTAINER_FILE_SUFFIX)
}

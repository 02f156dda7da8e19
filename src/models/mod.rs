pub mod enums;
pub mod analyte;
pub mod submission;
pub mod result;

pub use analyte::{AnalyteDefinition, TestTypeDefinition};
pub use enums::{ProcessingStatus, TestDateSource};
pub use result::ExtractedResult;
pub use submission::SubmissionRecord;

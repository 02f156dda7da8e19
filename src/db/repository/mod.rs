pub mod analyte;
pub mod result;
pub mod submission;

//! Report output port trait.

use crate::domain::error::ScreenerError;
use crate::domain::ranking::ScreenReport;

/// Port for presenting the ranked matches of one run.
pub trait ReportPort {
    fn write_report(&self, formula_name: &str, report: &ScreenReport) -> Result<(), ScreenerError>;
}

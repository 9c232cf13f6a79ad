//! Report <-> `report` row.

use super::schema::{REPORT, ReportRow};
use super::{RowSource, delete_where, insert_row};
use crate::model::Report;
use crate::MlgateError;
use redb::WriteTransaction;

pub(crate) fn insert(txn: &WriteTransaction, header_id: u64, report: &Report) -> Result<u64, MlgateError> {
    insert_row(
        txn,
        REPORT,
        &ReportRow {
            header_id,
            summary: report.summary.clone(),
            test_results_id: report.test_results_id.clone(),
            comments: report.comments.clone(),
        },
    )
}

pub(crate) fn load(src: &impl RowSource, header_id: u64) -> Result<Report, MlgateError> {
    let (_, row) = src
        .scan_where::<ReportRow>(REPORT, |r| r.header_id == header_id)?
        .into_iter()
        .next()
        .ok_or_else(|| MlgateError::Backend(format!("artifact header {header_id} has no report")))?;
    Ok(Report {
        summary: row.summary,
        test_results_id: row.test_results_id,
        comments: row.comments,
    })
}

pub(crate) fn delete(txn: &WriteTransaction, header_id: u64) -> Result<(), MlgateError> {
    delete_where::<ReportRow>(txn, REPORT, |r| r.header_id == header_id)?;
    Ok(())
}

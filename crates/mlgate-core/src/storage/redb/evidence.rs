//! Evidence <-> `evidence` row.

use super::schema::{EVIDENCE, EvidenceMetadataRow, EvidenceRow};
use super::{RowSource, delete_where, from_json, insert_row, to_json};
use crate::model::{Evidence, EvidenceMetadata};
use crate::MlgateError;
use redb::WriteTransaction;

pub(crate) fn metadata_row(m: &EvidenceMetadata) -> EvidenceMetadataRow {
    EvidenceMetadataRow {
        test_case_id: m.test_case_id.clone(),
        measurement_type: m.measurement_type.clone(),
        info: m.info.clone(),
    }
}

pub(crate) fn metadata_model(m: EvidenceMetadataRow) -> EvidenceMetadata {
    EvidenceMetadata {
        test_case_id: m.test_case_id,
        measurement_type: m.measurement_type,
        info: m.info,
    }
}

pub(crate) fn insert(
    txn: &WriteTransaction,
    header_id: u64,
    evidence: &Evidence,
) -> Result<u64, MlgateError> {
    insert_row(
        txn,
        EVIDENCE,
        &EvidenceRow {
            header_id,
            metadata: metadata_row(&evidence.metadata),
            value: to_json(&evidence.value)?,
        },
    )
}

pub(crate) fn load(src: &impl RowSource, header_id: u64) -> Result<Evidence, MlgateError> {
    let (_, row) = src
        .scan_where::<EvidenceRow>(EVIDENCE, |e| e.header_id == header_id)?
        .into_iter()
        .next()
        .ok_or_else(|| MlgateError::Backend(format!("artifact header {header_id} has no evidence")))?;
    Ok(Evidence {
        metadata: metadata_model(row.metadata),
        value: from_json(&row.value)?,
    })
}

pub(crate) fn delete(txn: &WriteTransaction, header_id: u64) -> Result<(), MlgateError> {
    delete_where::<EvidenceRow>(txn, EVIDENCE, |e| e.header_id == header_id)?;
    Ok(())
}

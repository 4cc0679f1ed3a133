use models::NormalizedTable;

use crate::error::{PipelineError, Result};

/// Payables first, then receivables, each in source order, under one header.
///
/// Both tables come out of the same canonical schema, so a header mismatch
/// means a bug upstream rather than bad input.
pub fn combine(payables: NormalizedTable, receivables: NormalizedTable) -> Result<NormalizedTable> {
    if payables.header != receivables.header {
        return Err(PipelineError::SchemaMismatch {
            left: payables.header,
            right: receivables.header,
        });
    }

    let NormalizedTable { header, mut records } = payables;
    records.extend(receivables.records);
    Ok(NormalizedTable { header, records })
}

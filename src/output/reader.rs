use crate::error::{AnalysisError, Result};
use crate::models::{
    Api, IOPhase, NormalizedAccess, Operation, OperationMix, StragglerRole, StragglerRow, TraceSummary,
};
use arrow::array::{AsArray, GenericListArray, PrimitiveArray, StringArray};
use arrow::datatypes::{ArrowPrimitiveType, Float64Type, Schema, UInt32Type, UInt64Type};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::Path;

fn read_batches<T>(
    path: &Path,
    convert: impl Fn(&RecordBatch, &Schema) -> Result<Vec<T>>,
) -> Result<Vec<T>> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut results = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        results.extend(convert(&batch, &schema)?);
    }
    Ok(results)
}

fn invalid(column: &str, value: &str) -> AnalysisError {
    AnalysisError::InvalidValue {
        column: column.to_string(),
        value: value.to_string(),
    }
}

// Typed column access; a column of another type is an error
fn primitive_column<'a, T: ArrowPrimitiveType>(
    batch: &'a RecordBatch,
    schema: &Schema,
    name: &str,
) -> Result<&'a PrimitiveArray<T>> {
    batch
        .column(schema.index_of(name)?)
        .as_primitive_opt::<T>()
        .ok_or_else(|| invalid(name, &format!("expected {} column", T::DATA_TYPE)))
}

fn string_column<'a>(batch: &'a RecordBatch, schema: &Schema, name: &str) -> Result<&'a StringArray> {
    batch
        .column(schema.index_of(name)?)
        .as_string_opt::<i32>()
        .ok_or_else(|| invalid(name, "expected Utf8 column"))
}

fn list_column<'a>(
    batch: &'a RecordBatch,
    schema: &Schema,
    name: &str,
) -> Result<&'a GenericListArray<i32>> {
    batch
        .column(schema.index_of(name)?)
        .as_list_opt::<i32>()
        .ok_or_else(|| invalid(name, "expected List column"))
}

fn parse_api(value: &str) -> Result<Api> {
    Api::parse_str(value).ok_or_else(|| invalid("api", value))
}

/// Reads a normalized table written by `save_accesses`.
pub fn read_accesses(path: &Path) -> Result<Vec<NormalizedAccess>> {
    read_batches(path, convert_batch_to_accesses)
}

pub fn read_summary(path: &Path) -> Result<TraceSummary> {
    let rows = read_batches(path, |batch, schema| {
        let total_logs = primitive_column::<UInt64Type>(batch, schema, "total_logs")?;
        let runtime = primitive_column::<Float64Type>(batch, schema, "runtime")?;
        Ok((0..batch.num_rows())
            .map(|i| TraceSummary {
                total_logs: total_logs.value(i),
                runtime: runtime.value(i),
            })
            .collect())
    })?;
    rows.into_iter()
        .next()
        .ok_or_else(|| invalid("total_logs", "<missing row>"))
}

pub fn read_phases(path: &Path) -> Result<Vec<IOPhase>> {
    read_batches(path, convert_batch_to_phases)
}

pub fn read_stragglers(path: &Path) -> Result<Vec<StragglerRow>> {
    read_batches(path, |batch, schema| {
        let api_array = string_column(batch, schema, "api")?;
        let rank_array = primitive_column::<UInt32Type>(batch, schema, "rank")?;
        let start_array = primitive_column::<Float64Type>(batch, schema, "start")?;
        let end_array = primitive_column::<Float64Type>(batch, schema, "end")?;
        let duration_array = primitive_column::<Float64Type>(batch, schema, "duration")?;
        let role_array = string_column(batch, schema, "role")?;

        (0..batch.num_rows())
            .map(|i| {
                let role = match role_array.value(i) {
                    "fastest" => StragglerRole::Fastest,
                    "slowest" => StragglerRole::Slowest,
                    other => return Err(invalid("role", other)),
                };
                Ok(StragglerRow {
                    api: parse_api(api_array.value(i))?,
                    rank: rank_array.value(i),
                    start: start_array.value(i),
                    end: end_array.value(i),
                    duration: duration_array.value(i),
                    role,
                })
            })
            .collect()
    })
}

fn convert_batch_to_accesses(batch: &RecordBatch, schema: &Schema) -> Result<Vec<NormalizedAccess>> {
    let num_rows = batch.num_rows();
    let mut result = Vec::with_capacity(num_rows);

    let file_id_array = primitive_column::<UInt64Type>(batch, schema, "file_id")?;
    let api_array = string_column(batch, schema, "api")?;
    let rank_array = primitive_column::<UInt32Type>(batch, schema, "rank")?;
    let operation_array = string_column(batch, schema, "operation")?;
    let segment_array = primitive_column::<UInt64Type>(batch, schema, "segment")?;
    let offset_array = primitive_column::<UInt64Type>(batch, schema, "offset")?;
    let size_array = primitive_column::<UInt64Type>(batch, schema, "size")?;
    let start_array = primitive_column::<Float64Type>(batch, schema, "start")?;
    let end_array = primitive_column::<Float64Type>(batch, schema, "end")?;
    let osts_array = list_column(batch, schema, "osts")?;

    for i in 0..num_rows {
        let operation = operation_array.value(i);
        let osts = osts_array.value(i);
        let osts = osts
            .as_primitive_opt::<UInt64Type>()
            .ok_or_else(|| invalid("osts", "expected List<UInt64> column"))?;
        result.push(NormalizedAccess {
            file_id: file_id_array.value(i),
            api: parse_api(api_array.value(i))?,
            rank: rank_array.value(i),
            operation: Operation::parse_str(operation).ok_or_else(|| invalid("operation", operation))?,
            segment: segment_array.value(i),
            offset: offset_array.value(i),
            size: size_array.value(i),
            start: start_array.value(i),
            end: end_array.value(i),
            osts: osts.values().to_vec(),
        });
    }

    Ok(result)
}

fn convert_batch_to_phases(batch: &RecordBatch, schema: &Schema) -> Result<Vec<IOPhase>> {
    let num_rows = batch.num_rows();
    let mut result = Vec::with_capacity(num_rows);

    let index_array = primitive_column::<UInt64Type>(batch, schema, "index")?;
    let api_array = string_column(batch, schema, "api")?;
    let operation_array = string_column(batch, schema, "operation")?;
    let start_array = primitive_column::<Float64Type>(batch, schema, "start")?;
    let end_array = primitive_column::<Float64Type>(batch, schema, "end")?;
    let duration_array = primitive_column::<Float64Type>(batch, schema, "duration")?;
    let fastest_rank_array = primitive_column::<UInt32Type>(batch, schema, "fastest_rank")?;
    let fastest_start_array = primitive_column::<Float64Type>(batch, schema, "fastest_rank_start")?;
    let fastest_end_array = primitive_column::<Float64Type>(batch, schema, "fastest_rank_end")?;
    let fastest_duration_array = primitive_column::<Float64Type>(batch, schema, "fastest_rank_duration")?;
    let slowest_rank_array = primitive_column::<UInt32Type>(batch, schema, "slowest_rank")?;
    let slowest_start_array = primitive_column::<Float64Type>(batch, schema, "slowest_rank_start")?;
    let slowest_end_array = primitive_column::<Float64Type>(batch, schema, "slowest_rank_end")?;
    let slowest_duration_array = primitive_column::<Float64Type>(batch, schema, "slowest_rank_duration")?;
    let threshold_array = primitive_column::<Float64Type>(batch, schema, "threshold")?;

    for i in 0..num_rows {
        let operation = operation_array.value(i);
        result.push(IOPhase {
            index: index_array.value(i) as usize,
            api: parse_api(api_array.value(i))?,
            operation: OperationMix::parse_str(operation).ok_or_else(|| invalid("operation", operation))?,
            start: start_array.value(i),
            end: end_array.value(i),
            duration: duration_array.value(i),
            fastest_rank: fastest_rank_array.value(i),
            fastest_rank_start: fastest_start_array.value(i),
            fastest_rank_end: fastest_end_array.value(i),
            fastest_rank_duration: fastest_duration_array.value(i),
            slowest_rank: slowest_rank_array.value(i),
            slowest_rank_start: slowest_start_array.value(i),
            slowest_rank_end: slowest_end_array.value(i),
            slowest_rank_duration: slowest_duration_array.value(i),
            threshold: threshold_array.value(i),
        });
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::parquet::{save_accesses, save_phases, save_stragglers, save_summary};
    use crate::processors::bottleneck::straggler_rows;
    use crate::processors::detect_phases;

    fn sample_table() -> Vec<NormalizedAccess> {
        vec![
            NormalizedAccess {
                file_id: 11,
                api: Api::Posix,
                rank: 0,
                operation: Operation::Write,
                segment: 0,
                offset: 0,
                size: 1 << 20,
                start: 0.0,
                end: 1.0,
                osts: vec![10, 11, 12, 13],
            },
            NormalizedAccess {
                file_id: 11,
                api: Api::MpiIo,
                rank: 1,
                operation: Operation::Read,
                segment: 3,
                offset: 4096,
                size: 0,
                start: 2.5,
                end: 2.5,
                osts: vec![],
            },
        ]
    }

    #[test]
    fn test_tables_read_back_as_written() {
        let dir = tempfile::tempdir().unwrap();
        let table = sample_table();

        let accesses_path = dir.path().join("t.11.dxt.parquet");
        save_accesses(&table, &accesses_path, 1).unwrap();
        assert_eq!(read_accesses(&accesses_path).unwrap(), table);

        let phases = detect_phases(&table);
        let phases_path = dir.path().join("t.11.all.io_phases.parquet");
        save_phases(&phases, &phases_path).unwrap();
        assert_eq!(read_phases(&phases_path).unwrap(), phases);

        let stragglers = straggler_rows(&phases);
        let stragglers_path = dir.path().join("t.11.all.stragglers.parquet");
        save_stragglers(&stragglers, &stragglers_path).unwrap();
        assert_eq!(read_stragglers(&stragglers_path).unwrap(), stragglers);

        let summary = TraceSummary::from_table(&table);
        let summary_path = dir.path().join("t.11.summary.parquet");
        save_summary(&summary, &summary_path).unwrap();
        assert_eq!(read_summary(&summary_path).unwrap(), summary);
    }

    #[test]
    fn test_mismatched_column_type_is_an_error() {
        use arrow::array::Float64Array;
        use arrow::datatypes::{DataType, Field};
        use parquet::arrow::ArrowWriter;
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.11.summary.parquet");
        let schema = Arc::new(Schema::new(vec![
            Field::new("total_logs", DataType::Utf8, false),
            Field::new("runtime", DataType::Float64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["130"])),
                Arc::new(Float64Array::from(vec![1.0])),
            ],
        )
        .unwrap();
        let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        assert!(matches!(
            read_summary(&path),
            Err(AnalysisError::InvalidValue { ref column, .. }) if column == "total_logs"
        ));
        assert!(read_accesses(&path).is_err());
    }

    #[test]
    fn test_empty_tables_keep_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.dxt.parquet");
        save_accesses(&[], &path, 50_000).unwrap();
        assert!(read_accesses(&path).unwrap().is_empty());

        let phases_path = dir.path().join("empty.io_phases.parquet");
        save_phases(&[], &phases_path).unwrap();
        assert!(read_phases(&phases_path).unwrap().is_empty());
    }
}

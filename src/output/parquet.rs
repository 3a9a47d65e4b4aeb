use crate::error::Result;
use crate::models::{IOPhase, NormalizedAccess, StragglerRow, TraceSummary};
use arrow::array::{
    ArrayRef, Float64Array, ListBuilder, StringArray, UInt32Array, UInt64Array, UInt64Builder,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::{Compression, Encoding, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use rayon::prelude::*;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

// Pick the codec from the estimated payload size
fn select_compression(data_size: usize) -> Compression {
    let zstd = |level: i32| {
        ZstdLevel::try_new(level)
            .map(Compression::ZSTD)
            .unwrap_or(Compression::SNAPPY)
    };
    match data_size {
        n if n < 1024 * 1024 => Compression::SNAPPY,
        n if n < 10 * 1024 * 1024 => zstd(3),
        n if n < 100 * 1024 * 1024 => zstd(6),
        _ => zstd(9),
    }
}

fn compression_name(compression: &Compression) -> &'static str {
    match compression {
        Compression::SNAPPY => "SNAPPY",
        Compression::ZSTD(_) => "ZSTD",
        _ => "Other",
    }
}

fn create_writer_properties_with_compression(compression: Compression) -> WriterProperties {
    WriterProperties::builder()
        .set_compression(compression)
        .set_encoding(Encoding::PLAIN)
        .set_dictionary_enabled(true)
        .set_statistics_enabled(EnabledStatistics::Chunk)
        .set_max_row_group_size(1_000_000)
        .build()
}

fn osts_field() -> Field {
    Field::new("item", DataType::UInt64, true)
}

pub fn accesses_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("file_id", DataType::UInt64, false),
        Field::new("api", DataType::Utf8, false),
        Field::new("rank", DataType::UInt32, false),
        Field::new("operation", DataType::Utf8, false),
        Field::new("segment", DataType::UInt64, false),
        Field::new("offset", DataType::UInt64, false),
        Field::new("size", DataType::UInt64, false),
        Field::new("start", DataType::Float64, false),
        Field::new("end", DataType::Float64, false),
        Field::new("osts", DataType::List(Arc::new(osts_field())), false),
    ]))
}

pub fn summary_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("total_logs", DataType::UInt64, false),
        Field::new("runtime", DataType::Float64, false),
    ]))
}

pub fn phases_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("index", DataType::UInt64, false),
        Field::new("api", DataType::Utf8, false),
        Field::new("operation", DataType::Utf8, false),
        Field::new("start", DataType::Float64, false),
        Field::new("end", DataType::Float64, false),
        Field::new("duration", DataType::Float64, false),
        Field::new("fastest_rank", DataType::UInt32, false),
        Field::new("fastest_rank_start", DataType::Float64, false),
        Field::new("fastest_rank_end", DataType::Float64, false),
        Field::new("fastest_rank_duration", DataType::Float64, false),
        Field::new("slowest_rank", DataType::UInt32, false),
        Field::new("slowest_rank_start", DataType::Float64, false),
        Field::new("slowest_rank_end", DataType::Float64, false),
        Field::new("slowest_rank_duration", DataType::Float64, false),
        Field::new("threshold", DataType::Float64, false),
    ]))
}

pub fn stragglers_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("api", DataType::Utf8, false),
        Field::new("rank", DataType::UInt32, false),
        Field::new("start", DataType::Float64, false),
        Field::new("end", DataType::Float64, false),
        Field::new("duration", DataType::Float64, false),
        Field::new("role", DataType::Utf8, false),
    ]))
}

// Batches are written sequentially; an empty batch list still yields a file
// carrying the schema.
fn write_batches(
    path: &Path,
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
    estimated_size: usize,
) -> Result<()> {
    let compression = select_compression(estimated_size);
    crate::log_debug!(
        "Writing {} ({} batch(es), {} compression)",
        path.display(),
        batches.len(),
        compression_name(&compression)
    );

    let file = File::create(path)?;
    let props = create_writer_properties_with_compression(compression);
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    for batch in batches {
        writer.write(&batch)?;
    }
    writer.close()?;
    Ok(())
}

fn accesses_batch(schema: &SchemaRef, chunk: &[NormalizedAccess]) -> Result<RecordBatch> {
    let len = chunk.len();
    let mut file_id_vec = Vec::with_capacity(len);
    let mut api_vec = Vec::with_capacity(len);
    let mut rank_vec = Vec::with_capacity(len);
    let mut operation_vec = Vec::with_capacity(len);
    let mut segment_vec = Vec::with_capacity(len);
    let mut offset_vec = Vec::with_capacity(len);
    let mut size_vec = Vec::with_capacity(len);
    let mut start_vec = Vec::with_capacity(len);
    let mut end_vec = Vec::with_capacity(len);
    let mut osts_builder = ListBuilder::new(UInt64Builder::new()).with_field(Arc::new(osts_field()));

    for a in chunk {
        file_id_vec.push(a.file_id);
        api_vec.push(a.api.as_str());
        rank_vec.push(a.rank);
        operation_vec.push(a.operation.as_str());
        segment_vec.push(a.segment);
        offset_vec.push(a.offset);
        size_vec.push(a.size);
        start_vec.push(a.start);
        end_vec.push(a.end);
        osts_builder.values().append_slice(&a.osts);
        osts_builder.append(true);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from(file_id_vec)),
        Arc::new(StringArray::from(api_vec)),
        Arc::new(UInt32Array::from(rank_vec)),
        Arc::new(StringArray::from(operation_vec)),
        Arc::new(UInt64Array::from(segment_vec)),
        Arc::new(UInt64Array::from(offset_vec)),
        Arc::new(UInt64Array::from(size_vec)),
        Arc::new(Float64Array::from(start_vec)),
        Arc::new(Float64Array::from(end_vec)),
        Arc::new(osts_builder.finish()),
    ];
    Ok(RecordBatch::try_new(schema.clone(), columns)?)
}

/// Writes the normalized table. Columns follow [`accesses_schema`]; `osts`
/// is a list column.
pub fn save_accesses(table: &[NormalizedAccess], path: &Path, chunk_size: usize) -> Result<()> {
    let start_time = Instant::now();
    let schema = accesses_schema();
    let chunk_size = chunk_size.max(1);

    let batches = table
        .par_chunks(chunk_size)
        .map(|chunk| accesses_batch(&schema, chunk))
        .collect::<Result<Vec<_>>>()?;

    // ~100 bytes per row before compression
    write_batches(path, schema, batches, table.len() * 100)?;
    crate::log!(
        "Saved {} accesses to {} in {:.2}s",
        table.len(),
        path.display(),
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

pub fn save_summary(summary: &TraceSummary, path: &Path) -> Result<()> {
    let schema = summary_schema();
    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from(vec![summary.total_logs])),
        Arc::new(Float64Array::from(vec![summary.runtime])),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    write_batches(path, schema, vec![batch], 16)
}

pub fn save_phases(phases: &[IOPhase], path: &Path) -> Result<()> {
    let schema = phases_schema();
    if phases.is_empty() {
        return write_batches(path, schema, Vec::new(), 0);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(phases.iter().map(|p| p.index as u64))),
        Arc::new(StringArray::from_iter_values(phases.iter().map(|p| p.api.as_str()))),
        Arc::new(StringArray::from_iter_values(phases.iter().map(|p| p.operation.as_str()))),
        Arc::new(Float64Array::from_iter_values(phases.iter().map(|p| p.start))),
        Arc::new(Float64Array::from_iter_values(phases.iter().map(|p| p.end))),
        Arc::new(Float64Array::from_iter_values(phases.iter().map(|p| p.duration))),
        Arc::new(UInt32Array::from_iter_values(phases.iter().map(|p| p.fastest_rank))),
        Arc::new(Float64Array::from_iter_values(phases.iter().map(|p| p.fastest_rank_start))),
        Arc::new(Float64Array::from_iter_values(phases.iter().map(|p| p.fastest_rank_end))),
        Arc::new(Float64Array::from_iter_values(phases.iter().map(|p| p.fastest_rank_duration))),
        Arc::new(UInt32Array::from_iter_values(phases.iter().map(|p| p.slowest_rank))),
        Arc::new(Float64Array::from_iter_values(phases.iter().map(|p| p.slowest_rank_start))),
        Arc::new(Float64Array::from_iter_values(phases.iter().map(|p| p.slowest_rank_end))),
        Arc::new(Float64Array::from_iter_values(phases.iter().map(|p| p.slowest_rank_duration))),
        Arc::new(Float64Array::from_iter_values(phases.iter().map(|p| p.threshold))),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    write_batches(path, schema, vec![batch], phases.len() * 120)
}

pub fn save_stragglers(rows: &[StragglerRow], path: &Path) -> Result<()> {
    let schema = stragglers_schema();
    if rows.is_empty() {
        return write_batches(path, schema, Vec::new(), 0);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.api.as_str()))),
        Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.rank))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.start))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.end))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.duration))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.role.as_str()))),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    write_batches(path, schema, vec![batch], rows.len() * 48)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_compression_by_size() {
        assert_eq!(select_compression(10), Compression::SNAPPY);
        assert!(matches!(select_compression(5 * 1024 * 1024), Compression::ZSTD(_)));
        assert!(matches!(select_compression(500 * 1024 * 1024), Compression::ZSTD(_)));
    }

    #[test]
    fn test_accesses_columns_in_order() {
        let names: Vec<String> = accesses_schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(
            names,
            vec!["file_id", "api", "rank", "operation", "segment", "offset", "size", "start", "end", "osts"]
        );
        assert!(matches!(
            accesses_schema().field_with_name("osts").unwrap().data_type(),
            DataType::List(item) if item.data_type() == &DataType::UInt64
        ));
    }
}

//! One split-block bloom filter per stripe.
//!
//! The filters are produced by the parquet writer: the column is written
//! with one row group per stripe and the filters are read back from the
//! encoded file, so each stripe's filter is byte for byte what a parquet
//! reader would consult.

use std::{collections::HashSet, sync::Arc};

use arrow::array::{Int64Array, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use bytes::Bytes;
use parquet::{
    arrow::ArrowWriter,
    bloom_filter::Sbbf,
    errors::ParquetError,
    file::{
        properties::{ReaderProperties, WriterProperties},
        reader::{FileReader, RowGroupReader},
        serialized_reader::{ReadOptionsBuilder, SerializedFileReader},
    },
};
use tracing::debug;

use super::{IndexStructure, IndexStructureFactory, check_stripe_size};
use crate::{Column, Result, SieveError, compress::compressed_len};

#[derive(Debug)]
pub struct PerStripeBloom {
    fpp: f64,
    /// `None` for a stripe the writer produced no filter for; such a stripe
    /// always qualifies.
    filters: Vec<Option<Sbbf>>,
    /// The filters as the writer encoded them, slices of the parquet file.
    encoded: Vec<Bytes>,
    byte_size: usize,
}

impl PerStripeBloom {
    pub fn new(column: &Column, stripe_size: usize, fpp: f64) -> Result<Self> {
        let name = bloom_name(fpp);
        check_stripe_size(&name, stripe_size)?;
        if !(fpp > 0.0 && fpp < 1.0) {
            return Err(SieveError::Construction {
                index: name,
                reason: format!("false positive probability {fpp} is outside (0, 1)"),
            });
        }

        let ndv = column
            .values()
            .chunks(stripe_size)
            .map(|stripe| stripe.iter().collect::<HashSet<_>>().len())
            .max()
            .unwrap_or(0)
            .max(1);

        let schema = Arc::new(Schema::new(vec![Field::new(
            column.name(),
            DataType::Int64,
            false,
        )]));
        let props = WriterProperties::builder()
            .set_bloom_filter_enabled(true)
            .set_bloom_filter_fpp(fpp)
            .set_bloom_filter_ndv(ndv as u64)
            .set_max_row_group_size(stripe_size)
            .build();

        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, schema.clone(), Some(props))?;
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(Int64Array::from(column.values().to_vec()))],
        )?;
        writer.write(&batch)?;
        writer.close()?;

        let options = ReadOptionsBuilder::new()
            .with_reader_properties(
                ReaderProperties::builder()
                    .set_read_bloom_filter(true)
                    .build(),
            )
            .build();
        let file = Bytes::from(buf);
        let reader = SerializedFileReader::new_with_options(file.clone(), options)?;

        let num_row_groups = reader.num_row_groups();
        let mut filters = Vec::with_capacity(num_row_groups);
        let mut encoded = Vec::with_capacity(num_row_groups);
        let mut byte_size = 0;
        for idx in 0..num_row_groups {
            let row_group = reader.get_row_group(idx)?;
            filters.push(row_group.get_column_bloom_filter(0).cloned());

            let chunk = row_group.metadata().column(0);
            let (Some(offset), Some(length)) =
                (chunk.bloom_filter_offset(), chunk.bloom_filter_length())
            else {
                continue;
            };
            let start = offset as usize;
            let end = start + length as usize;
            if end > file.len() {
                return Err(ParquetError::General(format!(
                    "bloom filter of row group {idx} lies outside the file"
                ))
                .into());
            }
            byte_size += end - start;
            encoded.push(file.slice(start..end));
        }
        debug!(
            index = %name,
            stripes = num_row_groups,
            ndv,
            byte_size,
            "built bloom filters"
        );

        Ok(Self {
            fpp,
            filters,
            encoded,
            byte_size,
        })
    }

    pub fn num_stripes(&self) -> usize {
        self.filters.len()
    }
}

fn bloom_name(fpp: f64) -> String {
    format!("PerStripeBloom/{fpp}")
}

impl IndexStructure for PerStripeBloom {
    fn name(&self) -> String {
        bloom_name(self.fpp)
    }

    fn byte_size(&self) -> usize {
        self.byte_size
    }

    fn compressed_byte_size(&self) -> Result<usize> {
        compressed_len(&self.encoded.concat())
    }

    fn stripe_contains(&self, stripe_id: usize, value: i64) -> bool {
        match self.filters.get(stripe_id) {
            Some(Some(filter)) => filter.check(&value),
            Some(None) => true,
            None => false,
        }
    }
}

pub struct PerStripeBloomFactory {
    fpp: f64,
}

impl PerStripeBloomFactory {
    pub fn new(fpp: f64) -> Self {
        Self { fpp }
    }
}

impl IndexStructureFactory for PerStripeBloomFactory {
    fn create(&self, column: &Column, stripe_size: usize) -> Result<Box<dyn IndexStructure>> {
        Ok(Box::new(PerStripeBloom::new(column, stripe_size, self.fpp)?))
    }

    fn index_name(&self) -> String {
        bloom_name(self.fpp)
    }
}

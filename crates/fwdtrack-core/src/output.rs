use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow::{
    array::{ArrayRef, Float64Array, StringArray, UInt64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use log::info;
use parquet::arrow::ArrowWriter;

use crate::{
    analysis::{AnalysisReport, EfficiencyResults},
    config::AnalysisConfig,
    stats::{EfficiencyCurve, EfficiencyMap},
    FwdTrackResult,
};

/// Name of the per-bin table inside the output directory.
pub const BINS_FILE_NAME: &str = "efficiency_bins.parquet";

fn ensure_parent(path: &Path) -> FwdTrackResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Serialize the whole report as pretty-printed JSON.
pub fn write_results_json(report: &AnalysisReport, path: &Path) -> FwdTrackResult<()> {
    ensure_parent(path)?;
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, report)?;
    info!("Wrote results to {}", path.display());
    Ok(())
}

/// Read back a report written by [`write_results_json`].
pub fn read_results_json(path: &Path) -> FwdTrackResult<AnalysisReport> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

/// Column buffers of the per-bin table.
#[derive(Default)]
struct BinRows {
    object: Vec<String>,
    kind: Vec<String>,
    bin: Vec<u64>,
    x_low: Vec<f64>,
    x_high: Vec<f64>,
    y_low: Vec<f64>,
    y_high: Vec<f64>,
    passed: Vec<u64>,
    total: Vec<u64>,
    value: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl BinRows {
    fn push_curve(&mut self, kind: &str, curve: &EfficiencyCurve) {
        for point in &curve.points {
            self.object.push(curve.name.clone());
            self.kind.push(kind.to_string());
            self.bin.push(point.bin as u64);
            self.x_low.push(point.x_low);
            self.x_high.push(point.x_high);
            self.y_low.push(f64::NAN);
            self.y_high.push(f64::NAN);
            self.passed.push(point.passed);
            self.total.push(point.total);
            self.value.push(point.value);
            self.lower.push(point.lower);
            self.upper.push(point.upper);
        }
    }

    fn push_map(&mut self, kind: &str, map: &EfficiencyMap) {
        let nx = map.x_binning.n_bins();
        for cell in &map.cells {
            let (x_low, x_high) = map.x_binning.bin_bounds(cell.ix);
            let (y_low, y_high) = map.y_binning.bin_bounds(cell.iy);
            self.object.push(map.name.clone());
            self.kind.push(kind.to_string());
            self.bin.push((cell.iy * nx + cell.ix) as u64);
            self.x_low.push(x_low);
            self.x_high.push(x_high);
            self.y_low.push(y_low);
            self.y_high.push(y_high);
            self.passed.push(cell.passed);
            self.total.push(cell.total);
            self.value.push(cell.value);
            self.lower.push(cell.lower);
            self.upper.push(cell.upper);
        }
    }

    fn from_results(results: &EfficiencyResults) -> Self {
        let mut rows = Self::default();
        results
            .efficiency_curves
            .values()
            .for_each(|curve| rows.push_curve("efficiency", curve));
        results
            .purity_curves
            .values()
            .for_each(|curve| rows.push_curve("purity", curve));
        results
            .efficiency_maps
            .iter()
            .for_each(|map| rows.push_map("efficiency2d", map));
        results
            .purity_maps
            .iter()
            .for_each(|map| rows.push_map("purity2d", map));
        rows
    }

    fn len(&self) -> usize {
        self.object.len()
    }

    fn into_record_batch(self) -> FwdTrackResult<RecordBatch> {
        let floats = |name: &str| Field::new(name, DataType::Float64, false);
        let counts = |name: &str| Field::new(name, DataType::UInt64, false);
        let schema = Schema::new(vec![
            Field::new("object", DataType::Utf8, false),
            Field::new("kind", DataType::Utf8, false),
            counts("bin"),
            floats("x_low"),
            floats("x_high"),
            floats("y_low"),
            floats("y_high"),
            counts("passed"),
            counts("total"),
            floats("value"),
            floats("lower"),
            floats("upper"),
        ]);
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(self.object)),
            Arc::new(StringArray::from(self.kind)),
            Arc::new(UInt64Array::from(self.bin)),
            Arc::new(Float64Array::from(self.x_low)),
            Arc::new(Float64Array::from(self.x_high)),
            Arc::new(Float64Array::from(self.y_low)),
            Arc::new(Float64Array::from(self.y_high)),
            Arc::new(UInt64Array::from(self.passed)),
            Arc::new(UInt64Array::from(self.total)),
            Arc::new(Float64Array::from(self.value)),
            Arc::new(Float64Array::from(self.lower)),
            Arc::new(Float64Array::from(self.upper)),
        ];
        Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
    }
}

/// Write one row per non-empty bin of every efficiency and purity curve and map.
///
/// 1-D curves leave `y_low`/`y_high` as `NaN`; for maps `bin` is the flattened
/// `iy * nx + ix` cell index.
pub fn write_efficiency_bins(results: &EfficiencyResults, path: &Path) -> FwdTrackResult<()> {
    ensure_parent(path)?;
    let rows = BinRows::from_results(results);
    let n_rows = rows.len();
    let batch = rows.into_record_batch()?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    info!("Wrote {n_rows} efficiency bins to {}", path.display());
    Ok(())
}

/// Write every data file of `report` and return their paths.
pub fn write_report(
    report: &AnalysisReport,
    config: &AnalysisConfig,
) -> FwdTrackResult<Vec<PathBuf>> {
    let mut written = Vec::new();
    let results_path = config.results_path()?;
    write_results_json(report, &results_path)?;
    written.push(results_path);
    if let Some(results) = &report.efficiency {
        let bins_path = config.output_dir_path()?.join(BINS_FILE_NAME);
        write_efficiency_bins(results, &bins_path)?;
        written.push(bins_path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analysis::run_analysis, data::test_dataset};
    use arrow::array::AsArray;
    use arrow::datatypes::UInt64Type;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::tempdir;

    fn report() -> AnalysisReport {
        run_analysis(&test_dataset(), &AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn test_results_json_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("results.json");
        let report = report();
        write_results_json(&report, &path).unwrap();
        let loaded = read_results_json(&path).unwrap();
        let efficiency = loaded.efficiency.unwrap();
        assert_eq!(efficiency.counts.total_global, 4);
        assert_eq!(efficiency.scan.points.len(), 50);
        assert_eq!(loaded.config.pairs.len(), 6);
    }

    #[test]
    fn test_efficiency_bins_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(BINS_FILE_NAME);
        let report = report();
        let results = report.efficiency.as_ref().unwrap();
        write_efficiency_bins(results, &path).unwrap();

        let file = File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let n_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        // reference tracks share one bin per variable and one cell per pair; global muons
        // spread over two nClusters bins
        assert_eq!(n_rows, 5 + 6 + 6 + 8);
        let totals: u64 = batches
            .iter()
            .flat_map(|b| {
                b.column_by_name("total")
                    .unwrap()
                    .as_primitive::<UInt64Type>()
                    .values()
                    .to_vec()
            })
            .take(5)
            .sum();
        assert_eq!(totals, 2 * 5);
    }

    #[test]
    fn test_write_report_paths() {
        let dir = tempdir().unwrap();
        let config = AnalysisConfig {
            output_dir: dir.path().join("out").to_string_lossy().into_owned(),
            ..Default::default()
        };
        let written = write_report(&report(), &config).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|path| path.is_file()));
        assert!(written[0].ends_with("results.json"));
    }
}

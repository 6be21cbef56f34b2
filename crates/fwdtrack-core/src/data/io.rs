//! Table I/O: ROOT trees through oxyroot and Parquet directories through arrow.

use super::*;
use arrow::{
    array::{
        Array, ArrayRef, AsArray, Float64Array, Int32Array, Int64Array, UInt64Array, UInt8Array,
    },
    compute::{cast_with_options, CastOptions},
    datatypes::{
        ArrowPrimitiveType, DataType, Field, Float64Type, Int32Type, Int64Type, Schema, SchemaRef,
        UInt64Type, UInt8Type,
    },
    record_batch::RecordBatch,
};
use indexmap::IndexMap;
use log::{debug, info, warn};
use oxyroot::{Branch, Named, ReaderTree, RootFile};
use parquet::arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter};
use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};

const BATCH_SIZE: usize = 65_536;

const MC_MASK: &str = "fMcMask";
const MFT_CLUSTER_SIZES: &str = "fMFTClusterSizesAndTrackFlags";

/// Where the three tables live inside an input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetReadOptions {
    /// Name of the forward-track tree (or Parquet file stem).
    pub tracks_tree: String,
    /// Name of the truth-label tree.
    pub labels_tree: String,
    /// Name of the MFT-track tree.
    pub mft_tree: String,
    /// The ROOT directory holding the trees. When absent, a single `DF_*` directory is used if
    /// there is one, otherwise the trees are looked up at the top level.
    pub directory: Option<String>,
}

impl Default for DatasetReadOptions {
    fn default() -> Self {
        Self {
            tracks_tree: "O2fwdtrack".to_string(),
            labels_tree: "O2mcfwdtracklabel".to_string(),
            mft_tree: "O2mfttrack_001".to_string(),
            directory: None,
        }
    }
}

impl DatasetReadOptions {
    /// Create a new [`Default`] set of [`DatasetReadOptions`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the trees from the given ROOT directory instead of auto-detecting it.
    pub fn directory<S: AsRef<str>>(mut self, directory: S) -> Self {
        self.directory = Some(directory.as_ref().to_string());
        self
    }

    /// Override the forward-track tree name.
    pub fn tracks_tree<S: AsRef<str>>(mut self, name: S) -> Self {
        self.tracks_tree = name.as_ref().to_string();
        self
    }
}

fn canonicalize_dataset_path(file_path: &str) -> FwdTrackResult<PathBuf> {
    Ok(Path::new(&*shellexpand::full(file_path)?).canonicalize()?)
}

fn expand_output_path(file_path: &str) -> FwdTrackResult<PathBuf> {
    Ok(PathBuf::from(&*shellexpand::full(file_path)?))
}

/// Load a [`ForwardDataset`] from either a ROOT file or a directory of Parquet tables.
pub fn read_dataset(
    file_path: &str,
    options: &DatasetReadOptions,
) -> FwdTrackResult<ForwardDataset> {
    let path = canonicalize_dataset_path(file_path)?;
    if path.is_dir() {
        read_parquet(file_path, options)
    } else {
        read_root(file_path, options)
    }
}

/// Turn an absent optional table into `None`, keeping every other failure.
fn optional_table<T>(result: FwdTrackResult<T>) -> FwdTrackResult<Option<T>> {
    match result {
        Ok(table) => Ok(Some(table)),
        Err(FwdTrackError::MissingTable { name }) => {
            debug!("Optional table \"{name}\" not found");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn assemble_dataset(
    tracks: TrackTable,
    labels: Option<McLabelTable>,
    mft: Option<MftTable>,
    options: &DatasetReadOptions,
) -> FwdTrackResult<ForwardDataset> {
    if mft.is_none() {
        warn!(
            "MFT table \"{}\" not found, cluster counts will not include MFT clusters",
            options.mft_tree
        );
    }
    info!(
        "Loaded {} forward tracks (labels: {}, MFT tracks: {})",
        tracks.len(),
        labels
            .as_ref()
            .map_or_else(|| "none".to_string(), |l| l.len().to_string()),
        mft.as_ref()
            .map_or_else(|| "none".to_string(), |m| m.len().to_string()),
    );
    ForwardDataset::new(tracks, labels, mft)
}

// Parquet

/// Load a [`ForwardDataset`] from a directory holding `<tree>.parquet` files.
pub fn read_parquet(
    dir_path: &str,
    options: &DatasetReadOptions,
) -> FwdTrackResult<ForwardDataset> {
    let dir = canonicalize_dataset_path(dir_path)?;
    let tracks = read_parquet_tracks(&parquet_table_path(&dir, &options.tracks_tree))?;
    let labels = optional_table(read_parquet_labels(&parquet_table_path(
        &dir,
        &options.labels_tree,
    )))?;
    let mft = optional_table(read_parquet_mft(&parquet_table_path(
        &dir,
        &options.mft_tree,
    )))?;
    assemble_dataset(tracks, labels, mft, options)
}

fn parquet_table_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.parquet"))
}

fn table_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_parquet_batches(path: &Path) -> FwdTrackResult<(SchemaRef, Vec<RecordBatch>)> {
    if !path.is_file() {
        return Err(FwdTrackError::MissingTable {
            name: table_name(path),
        });
    }
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok((schema, batches))
}

/// Read one column of every batch, casting it to the primitive type `T`.
///
/// Nulls, and values which do not fit in `T`, are errors rather than zeros.
fn parquet_column<T: ArrowPrimitiveType>(
    schema: &SchemaRef,
    batches: &[RecordBatch],
    name: &str,
) -> FwdTrackResult<Vec<T::Native>> {
    if schema.column_with_name(name).is_none() {
        return Err(FwdTrackError::MissingColumn {
            name: name.to_string(),
        });
    }
    let mut values = Vec::with_capacity(batches.iter().map(|b| b.num_rows()).sum());
    for batch in batches {
        let column = batch
            .column_by_name(name)
            .ok_or_else(|| FwdTrackError::MissingColumn {
                name: name.to_string(),
            })?;
        if column.null_count() > 0 {
            return Err(FwdTrackError::InvalidColumn {
                name: name.to_string(),
                reason: format!("{} null values", column.null_count()),
            });
        }
        let options = CastOptions {
            safe: false,
            ..Default::default()
        };
        let column = cast_with_options(column, &T::DATA_TYPE, &options)?;
        values.extend(column.as_primitive::<T>().values().iter().copied());
    }
    Ok(values)
}

fn read_parquet_tracks(path: &Path) -> FwdTrackResult<TrackTable> {
    let (schema, batches) = read_parquet_batches(path)?;
    let floats = |name: &str| parquet_column::<Float64Type>(&schema, &batches, name);
    let tracks = TrackTable {
        x: floats("fX")?,
        y: floats("fY")?,
        z: floats("fZ")?,
        phi: floats("fPhi")?,
        tgl: floats("fTgl")?,
        signed_1pt: floats("fSigned1Pt")?,
        chi2: floats("fChi2")?,
        chi2_match_mch_mid: floats("fChi2MatchMCHMID")?,
        chi2_match_mch_mft: floats("fChi2MatchMCHMFT")?,
        match_score_mch_mft: floats("fMatchScoreMCHMFT")?,
        n_clusters: parquet_column::<Int32Type>(&schema, &batches, "fNClusters")?,
        track_type: parquet_column::<UInt8Type>(&schema, &batches, "fTrackType")?,
        index_mft_track: parquet_column::<Int64Type>(&schema, &batches, "fIndexMFTTracks")?,
        index_match_mch_track: parquet_column::<Int64Type>(
            &schema,
            &batches,
            "fIndexFwdTracks_MatchMCHTrack",
        )?,
    };
    tracks.check_lengths()?;
    Ok(tracks)
}

fn read_parquet_labels(path: &Path) -> FwdTrackResult<McLabelTable> {
    let (schema, batches) = read_parquet_batches(path)?;
    Ok(McLabelTable::new(parquet_column::<UInt8Type>(
        &schema, &batches, MC_MASK,
    )?))
}

fn read_parquet_mft(path: &Path) -> FwdTrackResult<MftTable> {
    let (schema, batches) = read_parquet_batches(path)?;
    Ok(MftTable::new(parquet_column::<UInt64Type>(
        &schema,
        &batches,
        MFT_CLUSTER_SIZES,
    )?))
}

/// Write the tables of `dataset` as `<tree>.parquet` files into the directory `dir_path`,
/// creating it if needed. Absent optional tables are skipped.
pub fn write_parquet(
    dataset: &ForwardDataset,
    dir_path: &str,
    options: &DatasetReadOptions,
) -> FwdTrackResult<()> {
    let dir = expand_output_path(dir_path)?;
    std::fs::create_dir_all(&dir)?;
    write_record_batch(
        &parquet_table_path(&dir, &options.tracks_tree),
        tracks_record_batch(&dataset.tracks)?,
    )?;
    if let Some(labels) = &dataset.labels {
        let schema = Arc::new(Schema::new(vec![Field::new(
            MC_MASK,
            DataType::UInt8,
            false,
        )]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(UInt8Array::from(labels.mc_mask.clone())) as ArrayRef],
        )?;
        write_record_batch(&parquet_table_path(&dir, &options.labels_tree), batch)?;
    }
    if let Some(mft) = &dataset.mft {
        let schema = Arc::new(Schema::new(vec![Field::new(
            MFT_CLUSTER_SIZES,
            DataType::UInt64,
            false,
        )]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(UInt64Array::from(mft.cluster_sizes_and_flags.clone())) as ArrayRef],
        )?;
        write_record_batch(&parquet_table_path(&dir, &options.mft_tree), batch)?;
    }
    Ok(())
}

fn tracks_record_batch(tracks: &TrackTable) -> FwdTrackResult<RecordBatch> {
    let float_columns: [(&str, &Vec<f64>); 10] = [
        ("fX", &tracks.x),
        ("fY", &tracks.y),
        ("fZ", &tracks.z),
        ("fPhi", &tracks.phi),
        ("fTgl", &tracks.tgl),
        ("fSigned1Pt", &tracks.signed_1pt),
        ("fChi2", &tracks.chi2),
        ("fChi2MatchMCHMID", &tracks.chi2_match_mch_mid),
        ("fChi2MatchMCHMFT", &tracks.chi2_match_mch_mft),
        ("fMatchScoreMCHMFT", &tracks.match_score_mch_mft),
    ];
    let mut fields = Vec::with_capacity(14);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(14);
    for (name, values) in float_columns {
        fields.push(Field::new(name, DataType::Float64, false));
        columns.push(Arc::new(Float64Array::from(values.clone())));
    }
    fields.push(Field::new("fNClusters", DataType::Int32, false));
    columns.push(Arc::new(Int32Array::from(tracks.n_clusters.clone())));
    fields.push(Field::new("fTrackType", DataType::UInt8, false));
    columns.push(Arc::new(UInt8Array::from(tracks.track_type.clone())));
    for (name, values) in [
        ("fIndexMFTTracks", &tracks.index_mft_track),
        ("fIndexFwdTracks_MatchMCHTrack", &tracks.index_match_mch_track),
    ] {
        fields.push(Field::new(name, DataType::Int64, false));
        columns.push(Arc::new(Int64Array::from(values.clone())));
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

fn write_record_batch(path: &Path, batch: RecordBatch) -> FwdTrackResult<()> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    let n_rows = batch.num_rows();
    let mut start = 0usize;
    while start < n_rows {
        let len = BATCH_SIZE.min(n_rows - start);
        writer.write(&batch.slice(start, len))?;
        start += len;
    }
    writer.close()?;
    debug!("Wrote {n_rows} rows to {}", path.display());
    Ok(())
}

// ROOT

/// Load a [`ForwardDataset`] from a ROOT file using the oxyroot backend.
pub fn read_root(file_path: &str, options: &DatasetReadOptions) -> FwdTrackResult<ForwardDataset> {
    let path = canonicalize_dataset_path(file_path)?;
    let mut file = RootFile::open(&path).map_err(|err| {
        FwdTrackError::Custom(format!(
            "Failed to open ROOT file '{}': {err}",
            path.display()
        ))
    })?;
    let directory = resolve_root_directory(&mut file, options.directory.as_deref())?;
    let tree_path = |name: &str| match &directory {
        Some(dir) => format!("{dir}/{name}"),
        None => name.to_string(),
    };

    let tracks = read_root_tracks(&mut file, &tree_path(&options.tracks_tree))?;
    let labels = optional_table(read_root_labels(&mut file, &tree_path(&options.labels_tree)))?;
    let mft = optional_table(read_root_mft(&mut file, &tree_path(&options.mft_tree)))?;
    assemble_dataset(tracks, labels, mft, options)
}

/// Read the trees of a ROOT file and write them as a Parquet directory.
pub fn convert_root_to_parquet(
    root_path: &str,
    dir_path: &str,
    options: &DatasetReadOptions,
) -> FwdTrackResult<()> {
    let dataset = read_root(root_path, options)?;
    write_parquet(&dataset, dir_path, options)?;
    info!("Converted '{root_path}' into '{dir_path}'");
    Ok(())
}

fn resolve_root_directory(
    file: &mut RootFile,
    requested: Option<&str>,
) -> FwdTrackResult<Option<String>> {
    if let Some(name) = requested {
        return Ok(Some(name.trim_end_matches('/').to_string()));
    }
    let directories: Vec<String> = file
        .keys()
        .into_iter()
        .filter(|key| key.class_name() == "TDirectoryFile" && key.name().starts_with("DF_"))
        .map(|key| key.name().to_string())
        .collect();
    match directories.len() {
        0 => Ok(None),
        1 => {
            debug!("Reading trees from directory '{}'", directories[0]);
            Ok(directories.into_iter().next())
        }
        _ => Err(FwdTrackError::Custom(format!(
            "Multiple data-frame directories found ({:?}); specify the directory to disambiguate",
            directories
        ))),
    }
}

fn open_root_tree(file: &mut RootFile, path: &str) -> FwdTrackResult<ReaderTree> {
    file.get_tree(path).map_err(|err| {
        debug!("Failed to open ROOT tree '{path}': {err}");
        FwdTrackError::MissingTable {
            name: path.to_string(),
        }
    })
}

fn read_root_tracks(file: &mut RootFile, path: &str) -> FwdTrackResult<TrackTable> {
    let tree = open_root_tree(file, path)?;
    let lookup = branch_lookup(&tree);
    let floats = |name: &str| read_branch(&lookup, name).map(RootColumn::into_f64);
    let ints = |name: &str| read_branch(&lookup, name).map(RootColumn::into_i64);
    let tracks = TrackTable {
        x: floats("fX")?,
        y: floats("fY")?,
        z: floats("fZ")?,
        phi: floats("fPhi")?,
        tgl: floats("fTgl")?,
        signed_1pt: floats("fSigned1Pt")?,
        chi2: floats("fChi2")?,
        chi2_match_mch_mid: floats("fChi2MatchMCHMID")?,
        chi2_match_mch_mft: floats("fChi2MatchMCHMFT")?,
        match_score_mch_mft: floats("fMatchScoreMCHMFT")?,
        n_clusters: narrow(ints("fNClusters")?, "fNClusters")?,
        track_type: narrow(ints("fTrackType")?, "fTrackType")?,
        index_mft_track: ints("fIndexMFTTracks")?,
        index_match_mch_track: ints("fIndexFwdTracks_MatchMCHTrack")?,
    };
    tracks.check_lengths()?;
    Ok(tracks)
}

fn read_root_labels(file: &mut RootFile, path: &str) -> FwdTrackResult<McLabelTable> {
    let tree = open_root_tree(file, path)?;
    let lookup = branch_lookup(&tree);
    let mask = read_branch(&lookup, MC_MASK)?.into_i64();
    Ok(McLabelTable::new(narrow(mask, MC_MASK)?))
}

/// Convert a widened integer column back to its table type, failing on the first value which
/// does not fit.
fn narrow<T: TryFrom<i64>>(values: Vec<i64>, name: &str) -> FwdTrackResult<Vec<T>> {
    values
        .into_iter()
        .map(|v| {
            T::try_from(v).map_err(|_| FwdTrackError::InvalidColumn {
                name: name.to_string(),
                reason: format!("value {v} is out of range"),
            })
        })
        .collect()
}

fn read_root_mft(file: &mut RootFile, path: &str) -> FwdTrackResult<MftTable> {
    let tree = open_root_tree(file, path)?;
    let lookup = branch_lookup(&tree);
    Ok(MftTable::new(
        read_branch(&lookup, MFT_CLUSTER_SIZES)?.into_u64(),
    ))
}

type BranchLookup<'a> = IndexMap<&'a str, (RootScalarKind, &'a Branch)>;

fn branch_lookup(tree: &ReaderTree) -> BranchLookup<'_> {
    let mut lookup: BranchLookup<'_> = IndexMap::new();
    for branch in tree.branches() {
        match scalar_kind(&branch.item_type_name()) {
            Some(kind) => {
                lookup.insert(branch.name(), (kind, branch));
            }
            None => debug!(
                "Skipping branch '{}' of unsupported type '{}'",
                branch.name(),
                branch.item_type_name()
            ),
        }
    }
    lookup
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RootScalarKind {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

fn scalar_kind(type_name: &str) -> Option<RootScalarKind> {
    let lower = type_name.to_ascii_lowercase();
    if lower.contains("vector") || lower.contains('[') {
        return None;
    }
    match lower.as_str() {
        "bool" | "bool_t" => Some(RootScalarKind::Bool),
        "char" | "char_t" | "int8_t" => Some(RootScalarKind::I8),
        "unsigned char" | "uchar_t" | "uint8_t" => Some(RootScalarKind::U8),
        "short" | "short_t" | "int16_t" => Some(RootScalarKind::I16),
        "unsigned short" | "ushort_t" | "uint16_t" => Some(RootScalarKind::U16),
        "int" | "int_t" | "int32_t" => Some(RootScalarKind::I32),
        "unsigned int" | "uint_t" | "uint32_t" => Some(RootScalarKind::U32),
        "long" | "long long" | "long64_t" | "int64_t" => Some(RootScalarKind::I64),
        "unsigned long" | "unsigned long long" | "ulong64_t" | "uint64_t" => {
            Some(RootScalarKind::U64)
        }
        "float" | "float_t" | "float32_t" => Some(RootScalarKind::F32),
        "double" | "double_t" | "double32_t" => Some(RootScalarKind::F64),
        _ => None,
    }
}

/// A branch read into the widest type of its family.
#[derive(Clone, Debug, PartialEq)]
enum RootColumn {
    Float(Vec<f64>),
    Signed(Vec<i64>),
    Unsigned(Vec<u64>),
}

impl RootColumn {
    fn into_f64(self) -> Vec<f64> {
        match self {
            Self::Float(values) => values,
            Self::Signed(values) => values.into_iter().map(|v| v as f64).collect(),
            Self::Unsigned(values) => values.into_iter().map(|v| v as f64).collect(),
        }
    }

    fn into_i64(self) -> Vec<i64> {
        match self {
            Self::Float(values) => values.into_iter().map(|v| v as i64).collect(),
            Self::Signed(values) => values,
            Self::Unsigned(values) => values.into_iter().map(|v| v as i64).collect(),
        }
    }

    fn into_u64(self) -> Vec<u64> {
        match self {
            Self::Float(values) => values.into_iter().map(|v| v as u64).collect(),
            Self::Signed(values) => values.into_iter().map(|v| v as u64).collect(),
            Self::Unsigned(values) => values,
        }
    }
}

macro_rules! collect_branch {
    ($branch:expr, $column_name:expr, $ty:ty, $variant:ident, $convert:expr) => {
        RootColumn::$variant(
            $branch
                .as_iter::<$ty>()
                .map_err(|err| {
                    map_root_error(&format!("Failed to read branch '{}'", $column_name), err)
                })?
                .map($convert)
                .collect(),
        )
    };
}

fn read_branch(lookup: &BranchLookup<'_>, column_name: &str) -> FwdTrackResult<RootColumn> {
    let (kind, branch) =
        lookup
            .get(column_name)
            .copied()
            .ok_or_else(|| FwdTrackError::MissingColumn {
                name: column_name.to_string(),
            })?;
    let column = match kind {
        RootScalarKind::Bool => collect_branch!(branch, column_name, bool, Signed, i64::from),
        RootScalarKind::I8 => collect_branch!(branch, column_name, i8, Signed, i64::from),
        RootScalarKind::U8 => collect_branch!(branch, column_name, u8, Signed, i64::from),
        RootScalarKind::I16 => collect_branch!(branch, column_name, i16, Signed, i64::from),
        RootScalarKind::U16 => collect_branch!(branch, column_name, u16, Signed, i64::from),
        RootScalarKind::I32 => collect_branch!(branch, column_name, i32, Signed, i64::from),
        RootScalarKind::U32 => collect_branch!(branch, column_name, u32, Signed, i64::from),
        RootScalarKind::I64 => collect_branch!(branch, column_name, i64, Signed, |v: i64| v),
        RootScalarKind::U64 => collect_branch!(branch, column_name, u64, Unsigned, |v: u64| v),
        RootScalarKind::F32 => collect_branch!(branch, column_name, f32, Float, f64::from),
        RootScalarKind::F64 => collect_branch!(branch, column_name, f64, Float, |v: f64| v),
    };
    Ok(column)
}

fn map_root_error<E: std::fmt::Display>(context: &str, err: E) -> FwdTrackError {
    FwdTrackError::Custom(format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use arrow::array::Int16Array;
    use tempfile::tempdir;

    fn write_mask_column(path: &Path, mask: Int16Array) {
        let schema = Arc::new(Schema::new(vec![Field::new(MC_MASK, DataType::Int16, true)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(mask) as ArrayRef]).unwrap();
        write_record_batch(path, batch).unwrap();
    }

    #[test]
    fn test_scalar_kinds() {
        assert_eq!(scalar_kind("Float_t"), Some(RootScalarKind::F32));
        assert_eq!(scalar_kind("double"), Some(RootScalarKind::F64));
        assert_eq!(scalar_kind("Char_t"), Some(RootScalarKind::I8));
        assert_eq!(scalar_kind("UChar_t"), Some(RootScalarKind::U8));
        assert_eq!(scalar_kind("Int_t"), Some(RootScalarKind::I32));
        assert_eq!(scalar_kind("ULong64_t"), Some(RootScalarKind::U64));
        assert_eq!(scalar_kind("vector<float>"), None);
        assert_eq!(scalar_kind("Float_t[3]"), None);
        assert_eq!(scalar_kind("TString"), None);
    }

    #[test]
    fn test_root_column_widening() {
        assert_eq!(RootColumn::Signed(vec![-1, 3]).into_f64(), vec![-1.0, 3.0]);
        assert_eq!(RootColumn::Float(vec![2.7]).into_i64(), vec![2]);
        assert_eq!(
            RootColumn::Unsigned(vec![0xFF]).into_u64(),
            vec![0xFF_u64]
        );
    }

    #[test]
    fn test_parquet_directory_io() {
        let dir = tempdir().unwrap();
        let path = dir.path().to_str().unwrap();
        let options = DatasetReadOptions::default();
        let dataset = test_dataset();
        write_parquet(&dataset, path, &options).unwrap();
        assert!(dir.path().join("O2fwdtrack.parquet").is_file());
        assert!(dir.path().join("O2mcfwdtracklabel.parquet").is_file());
        assert!(dir.path().join("O2mfttrack_001.parquet").is_file());

        let loaded = read_dataset(path, &options).unwrap();
        assert_eq!(loaded.n_tracks(), dataset.n_tracks());
        assert_eq!(loaded.tracks.track_type, dataset.tracks.track_type);
        assert_eq!(
            loaded.tracks.index_match_mch_track,
            dataset.tracks.index_match_mch_track
        );
        assert_relative_eq!(loaded.tracks.tgl[5], dataset.tracks.tgl[5]);
        assert_eq!(loaded.labels, dataset.labels);
        assert_eq!(loaded.mft, dataset.mft);
    }

    #[test]
    fn test_optional_tables_may_be_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().to_str().unwrap();
        let options = DatasetReadOptions::default();
        let mut dataset = test_dataset();
        dataset.labels = None;
        dataset.mft = None;
        write_parquet(&dataset, path, &options).unwrap();
        let loaded = read_parquet(path, &options).unwrap();
        assert!(loaded.labels.is_none());
        assert!(loaded.mft.is_none());
        assert_eq!(loaded.n_tracks(), 9);
    }

    #[test]
    fn test_missing_track_table_is_fatal() {
        let dir = tempdir().unwrap();
        let options = DatasetReadOptions::new().tracks_tree("NotThere");
        let result = read_parquet(dir.path().to_str().unwrap(), &options);
        assert!(matches!(
            result,
            Err(FwdTrackError::MissingTable { name }) if name == "NotThere"
        ));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("O2mcfwdtracklabel.parquet");
        let schema = Arc::new(Schema::new(vec![Field::new(
            "fWrongName",
            DataType::UInt8,
            false,
        )]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(UInt8Array::from(vec![0_u8, 1])) as ArrayRef],
        )
        .unwrap();
        write_record_batch(&path, batch).unwrap();
        assert!(matches!(
            read_parquet_labels(&path),
            Err(FwdTrackError::MissingColumn { name }) if name == "fMcMask"
        ));
    }

    #[test]
    fn test_null_mask_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("O2mcfwdtracklabel.parquet");
        write_mask_column(&path, Int16Array::from(vec![Some(1), None, Some(1)]));
        assert!(matches!(
            read_parquet_labels(&path),
            Err(FwdTrackError::InvalidColumn { name, .. }) if name == "fMcMask"
        ));
    }

    #[test]
    fn test_out_of_range_mask_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("O2mcfwdtracklabel.parquet");
        write_mask_column(&path, Int16Array::from(vec![1, 300, 2]));
        assert!(read_parquet_labels(&path).is_err());

        write_mask_column(&path, Int16Array::from(vec![1, 255, 0]));
        let labels = read_parquet_labels(&path).unwrap();
        assert_eq!(labels.mc_mask, vec![1, 255, 0]);
    }

    #[test]
    fn test_narrowing_root_integers() {
        let mask: Vec<u8> = narrow(vec![0, 1, 255], MC_MASK).unwrap();
        assert_eq!(mask, vec![0, 1, 255]);
        assert!(matches!(
            narrow::<u8>(vec![0, 256], MC_MASK),
            Err(FwdTrackError::InvalidColumn { name, .. }) if name == "fMcMask"
        ));
        assert!(narrow::<u8>(vec![-1], "fTrackType").is_err());
        assert!(narrow::<i32>(vec![i64::from(i32::MAX) + 1], "fNClusters").is_err());
    }

    #[test]
    fn test_large_indices_survive_parquet() {
        let dir = tempdir().unwrap();
        let path = dir.path().to_str().unwrap();
        let options = DatasetReadOptions::default();
        let mut dataset = test_dataset();
        dataset.labels = None;
        dataset.mft = None;
        let large = i64::from(i32::MAX) + 7;
        dataset.tracks.index_mft_track[0] = large;
        write_parquet(&dataset, path, &options).unwrap();
        let loaded = read_parquet(path, &options).unwrap();
        assert_eq!(loaded.tracks.index_mft_track[0], large);
    }
}

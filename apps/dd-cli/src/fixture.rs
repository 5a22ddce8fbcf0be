//! Synthetic datasets for demos and smoke tests.
//!
//! Layout matches the published dataset: `<root>/metadata.csv` next to
//! `<root>/h5/<id>.h5`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::{Path, PathBuf};

use dd_index::{DEFAULT_SIDECAR, GEOMETRY_ATTRIBUTE, ID_COLUMN, MATERIAL_ATTRIBUTE};
use dd_store::{AttributeValue, ContainerHeader, StoreError, write_container};

use crate::CliResult;

/// Directory under the root that holds the containers.
pub const FIXTURE_SUBDIR: &str = "h5";

const SIDECAR_COLUMNS: [&str; 7] = [
    "shape",
    "r1_mm",
    "r2_mm",
    "thickness_mm",
    "scale",
    "friction",
    "bhf_kn",
];

#[derive(Debug, Clone)]
pub struct FixtureOptions {
    pub count: usize,
    pub first_id: u64,
    /// The last `missing` files are written without material parameters.
    pub missing: usize,
    pub payload_bytes: usize,
    pub seed: u64,
}

/// One generated simulation, as recorded in the sidecar.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureRow {
    pub id: u64,
    pub geometry: [f64; 3],
    pub material: [f64; 4],
    pub complete: bool,
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn draw(rng: &mut ChaCha8Rng, id: u64, complete: bool) -> FixtureRow {
    let shape = f64::from(rng.gen_range(1u8..=3));
    FixtureRow {
        id,
        geometry: [
            shape,
            round3(rng.gen_range(20.0..80.0)),
            round3(rng.gen_range(2.0..15.0)),
        ],
        material: [
            round3(rng.gen_range(0.5..3.0)),
            1.0,
            round3(rng.gen_range(0.05..0.2)),
            round3(rng.gen_range(50.0..500.0)),
        ],
        complete,
    }
}

/// Write `count` containers plus the sidecar under `root`. Same options,
/// same bytes.
pub fn write_fixture(root: &Path, options: &FixtureOptions) -> CliResult<Vec<FixtureRow>> {
    let h5 = root.join(FIXTURE_SUBDIR);
    fs::create_dir_all(&h5).map_err(|source| StoreError::Io { path: h5, source })?;

    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    let complete_until = options.count.saturating_sub(options.missing);
    let mut rows = Vec::with_capacity(options.count);

    for i in 0..options.count {
        let row = draw(&mut rng, options.first_id + i as u64, i < complete_until);

        let mut header = ContainerHeader::new().with_attribute(
            GEOMETRY_ATTRIBUTE,
            AttributeValue::f64_vector(row.geometry.to_vec()),
        )?;
        if row.complete {
            header.set_attribute(
                MATERIAL_ATTRIBUTE,
                AttributeValue::f64_vector(row.material.to_vec()),
            )?;
        }

        let mut payload = vec![0u8; options.payload_bytes];
        rng.fill(&mut payload[..]);
        write_container(&container_path(root, row.id), &header, &payload)?;
        rows.push(row);
    }

    write_sidecar(&root.join(DEFAULT_SIDECAR), &rows)?;
    Ok(rows)
}

pub fn container_path(root: &Path, id: u64) -> PathBuf {
    root.join(FIXTURE_SUBDIR).join(format!("{id}.h5"))
}

fn write_sidecar(path: &Path, rows: &[FixtureRow]) -> CliResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(std::iter::once(ID_COLUMN).chain(SIDECAR_COLUMNS))?;
    for row in rows {
        let mut record = vec![row.id.to_string()];
        record.extend(row.geometry.iter().chain(&row.material).map(f64::to_string));
        writer.write_record(&record)?;
    }
    writer.flush().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

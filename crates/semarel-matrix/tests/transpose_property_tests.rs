use std::collections::BTreeMap;

use proptest::prelude::*;
use semarel_matrix::{transpose, MatrixError, MatrixReader, MatrixWriter, OpenMode, SparseRow};
use tempfile::TempDir;

fn write_rows(path: &std::path::Path, rows: &[SparseRow], max_page_bytes: usize) {
    let mut writer = MatrixWriter::create(path, max_page_bytes).unwrap();
    for row in rows {
        writer.append(row).unwrap();
    }
    writer.finish().unwrap();
}

/// Matrix contents as a set of (row, col, score) triples.
fn entry_set(reader: &MatrixReader) -> BTreeMap<(u32, u32), f32> {
    let mut out = BTreeMap::new();
    for row in reader.iter() {
        let row = row.unwrap();
        for &(col, score) in row.entries() {
            out.insert((row.row_id(), col), score);
        }
    }
    out
}

#[test]
fn transpose_swaps_rows_and_columns() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src.smx");
    let dst = dir.path().join("dst.smx");

    write_rows(
        &src,
        &[
            SparseRow::new(0, vec![(2, 0.5), (1, 0.4)]),
            SparseRow::new(1, vec![(2, 0.9)]),
            SparseRow::new(7, vec![(0, 0.1), (2, 0.3)]),
        ],
        64,
    );
    let reader = MatrixReader::open(&src, OpenMode::Eager, 0).unwrap();
    transpose(&reader, &dst, 3).unwrap();

    let t = MatrixReader::open(&dst, OpenMode::Eager, 0).unwrap();
    let ids: Vec<u32> = t.row_ids().collect();
    assert_eq!(ids, vec![0, 1, 2]);

    let col2 = t.get_row(2).unwrap();
    // Discovery order follows ascending source row ids.
    assert_eq!(col2.entries(), &[(0, 0.5), (1, 0.9), (7, 0.3)]);
    assert_eq!(t.get_row(0).unwrap().entries(), &[(7, 0.1)]);
    assert_eq!(t.get_row(1).unwrap().entries(), &[(0, 0.4)]);
}

#[test]
fn transpose_of_empty_matrix_is_empty() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src.smx");
    let dst = dir.path().join("dst.smx");
    write_rows(&src, &[], 64);

    let reader = MatrixReader::open(&src, OpenMode::Eager, 0).unwrap();
    transpose(&reader, &dst, 4).unwrap();
    let t = MatrixReader::open(&dst, OpenMode::Eager, 0).unwrap();
    assert!(t.is_empty());
}

#[test]
fn spill_files_are_removed() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src.smx");
    let dst = dir.path().join("dst.smx");
    write_rows(&src, &[SparseRow::new(0, vec![(5, 0.5)])], 64);

    let reader = MatrixReader::open(&src, OpenMode::Eager, 0).unwrap();
    transpose(&reader, &dst, 4).unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .filter(|name| name.contains("spill"))
        .collect();
    assert!(leftovers.is_empty(), "spill files left behind: {leftovers:?}");
}

#[test]
fn unwritable_spill_destination_is_disk_exhaustion() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src.smx");
    write_rows(&src, &[SparseRow::new(0, vec![(5, 0.5)])], 64);

    let reader = MatrixReader::open(&src, OpenMode::Eager, 0).unwrap();
    // Spill files land next to the output, and this directory does not exist.
    let dst = dir.path().join("missing").join("dst.smx");
    let err = transpose(&reader, &dst, 2).unwrap_err();
    assert!(matches!(err, MatrixError::DiskExhaustion(_)), "got {err:?}");
    assert!(!dst.exists());
}

/// Sparse matrices as `row -> col -> score`; BTreeMap keys give the writer
/// the ascending order it requires.
fn matrix_strategy() -> impl Strategy<Value = BTreeMap<u32, BTreeMap<u32, f32>>> {
    prop::collection::btree_map(
        0u32..400,
        prop::collection::btree_map(0u32..300, -1.0f32..1.0, 0..8),
        0..24,
    )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn double_transpose_is_row_equal_to_original(
        matrix in matrix_strategy(),
        fanout in 1usize..6,
        max_page_bytes in 16usize..256,
    ) {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.smx");
        let once = dir.path().join("once.smx");
        let twice = dir.path().join("twice.smx");

        let rows: Vec<SparseRow> = matrix
            .iter()
            .map(|(&row_id, cols)| {
                SparseRow::new(row_id, cols.iter().map(|(&c, &s)| (c, s)).collect())
            })
            .collect();
        write_rows(&src, &rows, max_page_bytes);

        let src_reader = MatrixReader::open(&src, OpenMode::Lazy, 2).unwrap();
        transpose(&src_reader, &once, fanout).unwrap();
        let once_reader = MatrixReader::open(&once, OpenMode::Lazy, 2).unwrap();
        transpose(&once_reader, &twice, fanout).unwrap();
        let twice_reader = MatrixReader::open(&twice, OpenMode::Eager, 0).unwrap();

        // Entries as a set; rows holding no entries vanish under transpose,
        // which the set view already ignores.
        prop_assert_eq!(entry_set(&twice_reader), entry_set(&src_reader));
    }
}

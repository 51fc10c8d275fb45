use boldclean::confounds::{parse_confound_matrix, write_confound_matrix, read_confound_matrix};
use boldclean::{drop_nonsteady, select_acompcor, ConfoundTable, DenoiseError};
use ndarray::{Array2, Array4};

/// `n` rows with one-hot non-steady-state columns at `flagged` and a
/// `global_signal` column equal to the row index.
fn table_with_flags(n: usize, flagged: &[usize]) -> ConfoundTable {
    let mut names = vec!["global_signal".to_string()];
    let mut columns = vec![(0..n).map(|t| t as f64).collect::<Vec<_>>()];
    for (j, &row) in flagged.iter().enumerate() {
        names.push(format!("non_steady_state_outlier{j:02}"));
        columns.push((0..n).map(|t| if t == row { 1.0 } else { 0.0 }).collect());
    }
    ConfoundTable::new(names, columns).unwrap()
}

// ── Non-steady-state trimming ─────────────────────────────────────────────────

#[test]
fn leading_nonsteady_frames_are_dropped_from_volume() {
    let series = Array4::from_shape_fn((2, 2, 1, 50), |(x, y, _, t)| (x * 1000 + y * 100 + t) as f64);
    let table = table_with_flags(50, &[0, 1, 2]);

    let (trimmed, tab) = drop_nonsteady(&series, &table).unwrap();
    assert_eq!(trimmed.dim(), (2, 2, 1, 47));
    assert_eq!(tab.n_rows(), 47);
    // Output frame 1 is input frame 4.
    assert_eq!(trimmed[[1, 1, 0, 1]], 1104.0);
    assert_eq!(tab.column("global_signal").unwrap()[1], 4.0);
}

#[test]
fn no_flags_returns_inputs_unchanged() {
    let series = Array2::from_shape_fn((3, 20), |(u, t)| (u + t) as f64);
    let table = table_with_flags(20, &[]);
    let (trimmed, tab) = drop_nonsteady(&series, &table).unwrap();
    assert_eq!(trimmed, series);
    assert_eq!(tab, table);
}

#[test]
fn nan_cells_do_not_flag_rows() {
    let tsv = "non_steady_state_outlier00\tcsf\n1\t0.1\nn/a\t0.2\n0\t0.3\n0\t0.4\n";
    let table = ConfoundTable::parse(tsv).unwrap();
    assert_eq!(table.nonsteady_rows(), vec![0]);
    let series = Array2::<f64>::zeros((2, 4));
    let (trimmed, _) = drop_nonsteady(&series, &table).unwrap();
    assert_eq!(trimmed.ncols(), 3);
}

#[test]
fn non_leading_flags_are_rejected() {
    let series = Array2::<f64>::zeros((1, 30));
    let table = table_with_flags(30, &[0, 5]);
    assert!(matches!(
        drop_nonsteady(&series, &table),
        Err(DenoiseError::Configuration { .. })
    ));
}

#[test]
fn table_length_must_match_series() {
    let series = Array2::<f64>::zeros((1, 30));
    let table = table_with_flags(29, &[0]);
    assert!(matches!(
        drop_nonsteady(&series, &table),
        Err(DenoiseError::DimensionMismatch { .. })
    ));
}

// ── aCompCor ──────────────────────────────────────────────────────────────────

fn acompcor_inputs() -> (ConfoundTable, serde_json::Value) {
    let names: Vec<String> = (0..8).map(|i| format!("a_comp_cor_{i:02}")).collect();
    let columns: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64; 10]).collect();
    let table = ConfoundTable::new(names, columns).unwrap();
    let metadata = serde_json::json!({
        "a_comp_cor_00": { "Mask": "CSF", "Retained": true,  "VarianceExplained": 0.3 },
        "a_comp_cor_01": { "Mask": "CSF", "Retained": true,  "VarianceExplained": 0.2 },
        "a_comp_cor_02": { "Mask": "CSF", "Retained": false, "VarianceExplained": 0.01 },
        "a_comp_cor_03": { "Mask": "CSF", "Retained": true,  "VarianceExplained": 0.1 },
        "a_comp_cor_04": { "Mask": "WM",  "Retained": true,  "VarianceExplained": 0.4 },
        "a_comp_cor_05": { "Mask": "WM",  "Retained": true,  "VarianceExplained": 0.2 },
        "a_comp_cor_06": { "Mask": "WM",  "Retained": true,  "VarianceExplained": 0.1 },
        "a_comp_cor_07": { "Mask": "combined", "Retained": true, "VarianceExplained": 0.5 },
        "t_comp_cor_00": { "Retained": true }
    });
    (table, metadata)
}

#[test]
fn acompcor_takes_csf_then_wm() {
    let (table, metadata) = acompcor_inputs();
    let (matrix, names) = select_acompcor(&table, &metadata, 2).unwrap();
    assert_eq!(names, ["a_comp_cor_00", "a_comp_cor_01", "a_comp_cor_04", "a_comp_cor_05"]);
    assert_eq!(matrix.dim(), (4, 10));
    assert_eq!(matrix[[2, 0]], 4.0);
}

#[test]
fn acompcor_skips_unretained_components() {
    let (table, metadata) = acompcor_inputs();
    let (_, names) = select_acompcor(&table, &metadata, 3).unwrap();
    assert_eq!(&names[..3], ["a_comp_cor_00", "a_comp_cor_01", "a_comp_cor_03"]);
}

#[test]
fn acompcor_needs_enough_components() {
    let (table, metadata) = acompcor_inputs();
    assert!(matches!(
        select_acompcor(&table, &metadata, 4),
        Err(DenoiseError::InsufficientData { .. })
    ));
}

#[test]
fn acompcor_column_must_exist() {
    let (_, metadata) = acompcor_inputs();
    let table = ConfoundTable::new(vec!["csf".into()], vec![vec![0.0; 10]]).unwrap();
    assert!(matches!(
        select_acompcor(&table, &metadata, 1),
        Err(DenoiseError::Configuration { .. })
    ));
}

// ── Matrix files ──────────────────────────────────────────────────────────────

#[test]
fn confound_matrix_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("confounds.txt");
    let m = parse_confound_matrix("0.5 1\n-2 3.25\n4 n/a\n").unwrap();
    assert_eq!(m.dim(), (2, 3));
    assert!(m[[1, 2]].is_nan());

    let finite = m.mapv(|v| if v.is_nan() { 0.0 } else { v });
    write_confound_matrix(&path, &finite).unwrap();
    assert_eq!(read_confound_matrix(&path).unwrap(), finite);
}

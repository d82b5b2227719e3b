//! CLI runs against the bundled FASTA and ONNX fixtures.
use assert_cmd::Command;
use ferritin_test_data::TestFile;

fn run_failing(args: &[&str]) -> String {
    let mut cmd = Command::cargo_bin("ferritin-extract").unwrap();
    cmd.args(args);
    let assert = cmd.assert().failure();
    String::from_utf8_lossy(&assert.get_output().stderr).into_owned()
}

#[test]
fn test_include_is_required() {
    let (fasta, _tmp) = TestFile::fasta_01().create_temp().unwrap();
    let out = tempfile::tempdir().unwrap();
    let stderr = run_failing(&[
        "esm2_t6_8M_UR50D",
        &fasta,
        out.path().to_str().unwrap(),
    ]);
    assert!(stderr.contains("--include"), "{stderr}");
}

#[test]
fn test_include_rejects_unknown_kind() {
    let (fasta, _tmp) = TestFile::fasta_01().create_temp().unwrap();
    let out = tempfile::tempdir().unwrap();
    let stderr = run_failing(&[
        "esm2_t6_8M_UR50D",
        &fasta,
        out.path().to_str().unwrap(),
        "--include",
        "logits",
    ]);
    assert!(stderr.contains("logits"), "{stderr}");
}

#[test]
fn test_layer_out_of_range() {
    let (fasta, _tmp) = TestFile::fasta_01().create_temp().unwrap();
    let out = tempfile::tempdir().unwrap();
    let records = out.path().join("records");
    for layer in ["7", "-8"] {
        let stderr = run_failing(&[
            "esm2_t6_8M_UR50D",
            &fasta,
            records.to_str().unwrap(),
            "--include",
            "mean",
            "--repr-layers",
            "0",
            layer,
        ]);
        assert!(stderr.contains("outside [-7, 6]"), "{stderr}");
        assert!(!records.exists());
    }
}

#[test]
fn test_msa_model_unsupported() {
    let (fasta, _tmp) = TestFile::fasta_01().create_temp().unwrap();
    let out = tempfile::tempdir().unwrap();
    let stderr = run_failing(&[
        "esm_msa1b_t12_100M_UR50S",
        &fasta,
        out.path().to_str().unwrap(),
        "--include",
        "mean",
    ]);
    assert!(stderr.contains("MSA"), "{stderr}");
}

#[test]
fn test_unknown_model() {
    let (fasta, _tmp) = TestFile::fasta_01().create_temp().unwrap();
    let out = tempfile::tempdir().unwrap();
    let stderr = run_failing(&[
        "not_a_model",
        &fasta,
        out.path().to_str().unwrap(),
        "--include",
        "mean",
    ]);
    assert!(stderr.contains("unknown model"), "{stderr}");
}

#[test]
fn test_concatenate_requires_mean() {
    let (fasta, _tmp) = TestFile::fasta_01().create_temp().unwrap();
    let out = tempfile::tempdir().unwrap();
    let concat = tempfile::tempdir().unwrap();
    let stderr = run_failing(&[
        "esm2_t6_8M_UR50D",
        &fasta,
        out.path().to_str().unwrap(),
        "--include",
        "per_tok",
        "--concatenate-dir",
        concat.path().to_str().unwrap(),
    ]);
    assert!(stderr.contains("--concatenate-dir"), "{stderr}");
}

#[test]
fn test_duplicate_identifiers() {
    let (fasta, _tmp) = TestFile::fasta_duplicates().create_temp().unwrap();
    let out = tempfile::tempdir().unwrap();
    let stderr = run_failing(&[
        "esm2_t6_8M_UR50D",
        &fasta,
        out.path().to_str().unwrap(),
        "--include",
        "mean",
    ]);
    assert!(stderr.contains("duplicate sequence identifier `seq_a`"), "{stderr}");
}

#[test]
fn test_headerless_fasta() {
    let (fasta, _tmp) = TestFile::fasta_headerless().create_temp().unwrap();
    let out = tempfile::tempdir().unwrap();
    let stderr = run_failing(&[
        "esm2_t6_8M_UR50D",
        &fasta,
        out.path().to_str().unwrap(),
        "--include",
        "bos",
    ]);
    assert!(stderr.contains("before the first"), "{stderr}");
}

#[test]
fn test_registry_name_needs_an_export() {
    let (fasta, _tmp) = TestFile::fasta_01().create_temp().unwrap();
    let out = tempfile::tempdir().unwrap();
    let stderr = run_failing(&[
        "esm2_t6_8M_UR50D",
        &fasta,
        out.path().to_str().unwrap(),
        "--include",
        "mean",
    ]);
    assert!(stderr.contains("hidden_states"), "{stderr}");
}

#[test]
fn test_empty_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let fasta = dir.path().join("empty.fasta");
    std::fs::write(&fasta, ">empty\n>b\nMKT\n").unwrap();
    let stderr = run_failing(&[
        "esm2_t6_8M_UR50D",
        fasta.to_str().unwrap(),
        dir.path().join("out").to_str().unwrap(),
        "--include",
        "mean",
    ]);
    assert!(stderr.contains("sequence `empty` is empty"), "{stderr}");
}

#[test]
fn test_extract_with_local_export() {
    let (model, _model) = TestFile::onnx_tiny_esm().create_temp().unwrap();
    let (fasta, _fasta) = TestFile::fasta_01().create_temp().unwrap();
    let out = tempfile::tempdir().unwrap();
    let concat = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("ferritin-extract").unwrap();
    cmd.args([
        model.as_str(),
        fasta.as_str(),
        out.path().to_str().unwrap(),
        "--include",
        "mean",
        "bos",
        "--repr-layers",
        "0",
        "-1",
        "--nogpu",
        "--concatenate-dir",
        concat.path().to_str().unwrap(),
    ]);
    cmd.assert().success();

    let records = std::fs::read_dir(out.path()).unwrap().count();
    assert_eq!(records, 3);
    let tables: Vec<_> = std::fs::read_dir(concat.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(tables.len(), 1);
    let table = std::fs::read_to_string(&tables[0]).unwrap();
    assert_eq!(table.lines().next(), Some("label,0,1,2"));
    assert_eq!(table.lines().count(), 4);
}

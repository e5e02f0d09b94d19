use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use extmsort::{iodirect, record};

fn extmsort(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_extmsort"))
        .args(args)
        .output()
        .unwrap()
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

struct Paths {
    _dir: tempfile::TempDir,
    input: PathBuf,
    output: PathBuf,
    tmp: PathBuf,
}

fn paths(values: &[u64]) -> Paths {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    let output = dir.path().join("output");
    let tmp = dir.path().join("tmp");
    fs::create_dir(&tmp).unwrap();
    fs::write(&input, record::to_bytes(values)).unwrap();
    Paths {
        _dir: dir,
        input,
        output,
        tmp,
    }
}

#[test]
fn test_missing_arguments() {
    let out = extmsort(&[]);
    assert_eq!(out.status.code(), Some(1));
    assert!(!out.stderr.is_empty());
}

#[test]
fn test_non_numeric_memory_limit() {
    let p = paths(&[1, 2, 3]);
    let out = extmsort(&[arg(&p.input), arg(&p.output), arg(&p.tmp), "lots", "64"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(!p.output.exists());
}

#[test]
fn test_help_succeeds() {
    let out = extmsort(&["--help"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Usage"));
}

#[test]
fn test_missing_tmp_dir_fails() {
    let p = paths(&[3, 1, 2]);
    let missing = p.tmp.join("nope");
    let out = extmsort(&[arg(&p.input), arg(&p.output), arg(&missing), "1024", "64"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("extmsort:"));
}

#[test]
fn test_memory_too_small_fails() {
    let p = paths(&[3, 1, 2]);
    let out = extmsort(&[arg(&p.input), arg(&p.output), arg(&p.tmp), "16", "8"]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn test_sort_and_verify() {
    let values: Vec<u64> = (0..500).map(|i| (i * 7_919) % 503).collect();
    let p = paths(&values);
    let out = extmsort(&[
        arg(&p.input),
        arg(&p.output),
        arg(&p.tmp),
        "24",
        "8",
        "--verify",
    ]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "OK");

    let mut expected = values;
    expected.sort_unstable();
    assert_eq!(record::from_bytes::<u64>(&fs::read(&p.output).unwrap()), expected);
    assert_eq!(fs::read_dir(&p.tmp).unwrap().count(), 0);
}

#[test]
fn test_sort_without_verify_prints_nothing() {
    let p = paths(&[2, 1]);
    let out = extmsort(&[arg(&p.input), arg(&p.output), arg(&p.tmp), "1024", "64"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(out.stdout.is_empty());
    assert_eq!(record::from_bytes::<u64>(&fs::read(&p.output).unwrap()), vec![1, 2]);
}

#[test]
fn test_direct_backend_verify() {
    let values: Vec<u64> = (0..3_000_u64).rev().collect();
    let p = paths(&values);
    if !iodirect::direct_io_supported(&p.tmp) {
        return;
    }
    let out = extmsort(&[
        arg(&p.input),
        arg(&p.output),
        arg(&p.tmp),
        "2048",
        "512",
        "--backend",
        "direct",
        "--verify",
    ]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "OK");
    assert_eq!(fs::metadata(&p.output).unwrap().len(), 24_000);
}

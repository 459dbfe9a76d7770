use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*;
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

/// bytes with enough repetition to build some table entries and enough
/// variety to touch most of the alphabet
fn sample_data() -> Vec<u8> {
    let mut ans = Vec::new();
    for i in 0..4000 {
        ans.push((i % 251) as u8);
        ans.push((i % 17) as u8);
        ans.push(b'x');
    }
    ans
}

fn roundtrip_test(extra_args: &[&str]) -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("expanded");
    let cmp_path = temp_dir.path().join("compressed");
    let out_path = temp_dir.path().join("roundtripped");
    std::fs::write(&in_path,sample_data())?;
    let mut cmd = Command::cargo_bin("alzw")?;
    cmd.arg("compress")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&cmp_path)
        .args(extra_args)
        .assert()
        .success();
    let mut cmd = Command::cargo_bin("alzw")?;
    cmd.arg("expand")
        .arg("-i").arg(&cmp_path)
        .arg("-o").arg(&out_path)
        .assert()
        .success();
    match (std::fs::read(&in_path),std::fs::read(&out_path)) {
        (Ok(v1),Ok(v2)) => {
            assert_eq!(v1,v2);
        },
        _ => panic!("unable to compare output with input")
    }
    Ok(())
}

#[test]
fn roundtrip_default() -> STDRESULT {
    roundtrip_test(&[])
}

#[test]
fn roundtrip_wide_codes() -> STDRESULT {
    roundtrip_test(&["-m","14"])
}

#[test]
fn roundtrip_pruned_escape() -> STDRESULT {
    roundtrip_test(&["-m","9","-p","64","-e"])
}

#[test]
fn roundtrip_through_pipes() -> STDRESULT {
    // omitting -i and -o moves the stream through stdin and stdout
    let data = sample_data();
    let mut cmd = assert_cmd::Command::cargo_bin("alzw")?;
    let compressed = cmd.arg("compress")
        .arg("-p").arg("200")
        .arg("-e")
        .write_stdin(data.clone())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let mut cmd = assert_cmd::Command::cargo_bin("alzw")?;
    let expanded = cmd.arg("expand")
        .write_stdin(compressed)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(data,expanded);
    Ok(())
}

#[test]
fn expand_rejects_foreign_stream() -> STDRESULT {
    // a header declaring no escapes followed by the escape control
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("foreign");
    let out_path = temp_dir.path().join("out");
    std::fs::write(&in_path,[0x60,0x00,0x00,0x00,0x00])?;
    let mut cmd = Command::cargo_bin("alzw")?;
    cmd.arg("expand")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&out_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("InvalidStream"));
    Ok(())
}

#[test]
fn expand_rejects_truncation() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("expanded");
    let cmp_path = temp_dir.path().join("compressed");
    let cut_path = temp_dir.path().join("truncated");
    let out_path = temp_dir.path().join("out");
    std::fs::write(&in_path,sample_data())?;
    let mut cmd = Command::cargo_bin("alzw")?;
    cmd.arg("compress")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&cmp_path)
        .assert()
        .success();
    let compressed = std::fs::read(&cmp_path)?;
    std::fs::write(&cut_path,&compressed[0..compressed.len()/2])?;
    let mut cmd = Command::cargo_bin("alzw")?;
    cmd.arg("expand")
        .arg("-i").arg(&cut_path)
        .arg("-o").arg(&out_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Stream"));
    Ok(())
}

use std::fs;
use std::process::Command;

use glsltex::template::DEFAULT_FRAGMENT;
use tempfile::TempDir;

fn glsltexd(root: &TempDir) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_glsltexd"));
    command
        .env("GLSLTEX_CONFIG_DIR", root.path().join("config"))
        .env("GLSLTEX_DATA_DIR", root.path().join("data"))
        .env("RUST_LOG", "warn");
    command
}

#[test]
fn template_writes_default_fragment() {
    let root = TempDir::new().unwrap();
    let target = root.path().join("shaders/new.frag");

    let status = glsltexd(&root)
        .arg("template")
        .arg(&target)
        .status()
        .expect("failed to run glsltexd template");

    assert!(status.success());
    assert_eq!(fs::read_to_string(&target).unwrap(), DEFAULT_FRAGMENT);
}

#[test]
fn template_refuses_to_overwrite_without_force() {
    let root = TempDir::new().unwrap();
    let target = root.path().join("edited.frag");
    fs::write(&target, "void main() {}\n").unwrap();

    let output = glsltexd(&root)
        .arg("template")
        .arg(&target)
        .output()
        .expect("failed to run glsltexd template");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--force"));
    assert_eq!(fs::read_to_string(&target).unwrap(), "void main() {}\n");

    let status = glsltexd(&root)
        .arg("template")
        .arg(&target)
        .arg("--force")
        .status()
        .expect("failed to rerun glsltexd template");

    assert!(status.success());
    assert_eq!(fs::read_to_string(&target).unwrap(), DEFAULT_FRAGMENT);
}

extern crate assert_cmd;
extern crate image;
extern crate predicates;
extern crate tempfile;

use assert_cmd::prelude::*;
use image::GenericImageView;
use predicates::prelude::*;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn renders_a_png_of_the_requested_size() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("set.png");
    Command::cargo_bin("mandelzoom")
        .unwrap()
        .args(&["-o", out.to_str().unwrap(), "-s", "64x48", "-t", "1"])
        .assert()
        .success();
    let img = image::open(&out).unwrap();
    assert_eq!(img.dimensions(), (64, 48));
}

#[test]
fn shader_and_scalar_paths_write_identical_images() {
    let dir = tempdir().unwrap();
    let scalar = dir.path().join("scalar.png");
    let shader = dir.path().join("shader.png");
    let common = [
        "-s", "40x30", "-c", "-0.75,0.1", "-z", "20", "-p", "fire", "--tier", "1000", "-t", "1",
    ];
    Command::cargo_bin("mandelzoom")
        .unwrap()
        .args(&common)
        .args(&["-o", scalar.to_str().unwrap()])
        .assert()
        .success();
    Command::cargo_bin("mandelzoom")
        .unwrap()
        .args(&common)
        .args(&["--shader", "-o", shader.to_str().unwrap()])
        .assert()
        .success();
    // Both budget curves hit the 1000 ceiling at this zoom.
    let a = image::open(&scalar).unwrap().to_rgba();
    let b = image::open(&shader).unwrap().to_rgba();
    assert_eq!(a.dimensions(), b.dimensions());
    assert!(a.into_raw() == b.into_raw());
}

#[test]
fn rejects_an_unknown_palette() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("nope.png");
    Command::cargo_bin("mandelzoom")
        .unwrap()
        .args(&["-o", out.to_str().unwrap(), "-p", "plaid"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("plaid"));
    assert!(!out.exists());
}

#[test]
fn rejects_a_zero_zoom() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("nope.png");
    Command::cargo_bin("mandelzoom")
        .unwrap()
        .args(&["-o", out.to_str().unwrap(), "-z", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Zoom must be greater than zero"));
}

#[test]
fn reports_an_empty_canvas() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("nope.png");
    Command::cargo_bin("mandelzoom")
        .unwrap()
        .args(&["-o", out.to_str().unwrap(), "-s", "0x10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Render failure: Invalid dimensions 0x10"));
}

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn write_scene(xml: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("temp scene");
    tmp.write_all(xml.as_bytes()).expect("write scene");
    tmp
}

#[test]
fn summary_uses_stock_scene_without_arguments() {
    let mut cmd = Command::cargo_bin("raymarch-plane").expect("binary exists");
    cmd.arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Camera fov=75.0 aspect=1.778 near=0.1 far=100"))
        .stdout(contains("Near plane 0.2728 x 0.1535"))
        .stdout(contains(
            "March eps=0.001 max_dis=1000 max_steps=100 on_exhaustion=Background",
        ))
        .stdout(contains("Shading diffuse=0.5 specular=3 ambient=0.15 shininess=16"))
        .stdout(contains("rays hit the surface"));
}

#[test]
fn summary_reflects_scene_file() {
    let scene = write_scene(
        r#"<scene>
  <camera>
    <fov>90</fov>
    <near>0.5</near>
    <position>0 0 6</position>
  </camera>
  <march>
    <max-steps>64</max-steps>
    <on-exhaustion>shade-last</on-exhaustion>
  </march>
  <shading>
    <shininess>8</shininess>
  </shading>
</scene>
"#,
    );
    let mut cmd = Command::cargo_bin("raymarch-plane").expect("binary exists");
    cmd.arg(scene.path()).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Camera fov=90.0 aspect=1.778 near=0.5 far=100"))
        .stdout(contains("max_steps=64 on_exhaustion=ShadeLast"))
        .stdout(contains("shininess=8"))
        .stdout(contains("Preview 48x20:"));
}

#[test]
fn preview_shows_hits_and_background() {
    let mut cmd = Command::cargo_bin("raymarch-plane").expect("binary exists");
    cmd.arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("#"))
        .stdout(contains("....."))
        .stdout(contains("Preview 48x20: 0 of").not());
}

#[test]
fn invalid_scene_is_rejected() {
    let scene = write_scene("<scene><camera><near>2</near><far>1</far></camera></scene>");
    let mut cmd = Command::cargo_bin("raymarch-plane").expect("binary exists");
    cmd.arg(scene.path()).arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("failed to parse scene file"))
        .stderr(contains("far distance"));
}

#[test]
fn missing_scene_file_is_reported() {
    let mut cmd = Command::cargo_bin("raymarch-plane").expect("binary exists");
    cmd.arg("/definitely/not/here.xml").arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("failed to read scene file"));
}

#[test]
fn unknown_flag_is_rejected() {
    let mut cmd = Command::cargo_bin("raymarch-plane").expect("binary exists");
    cmd.arg("--bogus");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --bogus"));
}

use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn bibarchive(root: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bibarchive");
    cmd.current_dir(root)
        .env("BIB_ROOT", root)
        .env("BIB_HOME", root)
        .env_remove("BIB_INSPECT_CATEGORIES")
        .env_remove("BIB_ADDITIONAL_CATEGORIES")
        .env_remove("BIB_CONFIG_PATH");
    cmd
}

fn seed_robotics(root: &Path) {
    fs::create_dir_all(root.join("bib")).expect("mkdir bib");
    fs::create_dir_all(root.join("PDF/Robotics")).expect("mkdir pdf");
    fs::write(
        root.join("bib/Robotics.bib"),
        "@Article{Smith-2020-Arms, Title={Robot Arms}, DOI={https://doi.org/10.1/x}}\n\n@article{Jones-2019-Legs, title={Legs}}\n",
    )
    .expect("write bib");
    for name in [
        "Smith-2020-Arms Robot Arms.pdf",
        "Smith-2020-Arms Robot Arms.png",
        "Jones-2019-Legs Legs.png",
    ] {
        fs::write(root.join("PDF/Robotics").join(name), "").expect("write asset");
    }
    fs::write(
        root.join("bibarchive.toml"),
        "[categories]\ninspect = [\"Robotics\"]\n",
    )
    .expect("write config");
}

#[test]
fn check_normalizes_and_writes_reports() {
    let tmp = tempdir().expect("tempdir");
    seed_robotics(tmp.path());

    bibarchive(tmp.path())
        .arg("check")
        .arg("--show-incomplete")
        .assert()
        .success()
        .stdout(predicate::str::contains("[check]"))
        .stdout(predicate::str::contains("√ entries=2"))
        .stdout(predicate::str::contains("√ complete=1"))
        .stdout(predicate::str::contains("√ incomplete_non_books=1"))
        .stdout(predicate::str::contains(
            "incomplete Robotics::Jones-2019-Legs type=article B=1 D=0 P=1",
        ));

    let bib = fs::read_to_string(tmp.path().join("bib/Robotics.bib")).expect("read bib");
    assert!(bib.starts_with("@article{Jones-2019-Legs,"));
    assert!(bib.contains("\tdoi = {10.1/x}"));
    assert!(bib.contains("\ttitle = {Robot Arms}"));

    let all = fs::read_to_string(tmp.path().join("BibCheckResultAll.md")).expect("report");
    assert!(all.contains("Smith-2020-Arms"));
    assert!(all.contains("| D "));
    assert!(tmp.path().join("BibCheckResultNonBooks.md").exists());

    let audit = fs::read_to_string(tmp.path().join(".bibarchive/logs/audit.log")).expect("audit");
    assert!(audit.contains("\"phase\":\"check\""));
}

#[test]
fn check_without_format_leaves_bib_untouched() {
    let tmp = tempdir().expect("tempdir");
    seed_robotics(tmp.path());
    let before = fs::read_to_string(tmp.path().join("bib/Robotics.bib")).expect("read");

    bibarchive(tmp.path())
        .args(["check", "--no-format"])
        .assert()
        .success();

    let after = fs::read_to_string(tmp.path().join("bib/Robotics.bib")).expect("read");
    assert_eq!(before, after);
}

#[test]
fn collision_across_categories_fails_without_reports() {
    let tmp = tempdir().expect("tempdir");
    seed_robotics(tmp.path());
    fs::write(
        tmp.path().join("bib/Books.bib"),
        "@book{Smith-2020-Arms, title={Arms Again}}\n",
    )
    .expect("write bib");

    bibarchive(tmp.path())
        .env("BIB_INSPECT_CATEGORIES", "Robotics,Books")
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "× short code collision: Smith-2020-Arms in Books,Robotics",
        ))
        .stdout(predicate::str::contains(
            "colliding Books::Smith-2020-Arms type=book B=1 D=0 P=0 title=Arms Again",
        ))
        .stdout(predicate::str::contains("colliding Robotics::Smith-2020-Arms type="));

    assert!(!tmp.path().join("BibCheckResultAll.md").exists());
}

#[test]
fn json_flag_prints_report_object() {
    let tmp = tempdir().expect("tempdir");
    seed_robotics(tmp.path());

    bibarchive(tmp.path())
        .args(["--json", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"command\": \"status\""))
        .stdout(predicate::str::contains("inspect_categories=Robotics"));
}

#[test]
fn invalid_config_is_reported() {
    let tmp = tempdir().expect("tempdir");
    seed_robotics(tmp.path());
    fs::write(
        tmp.path().join("bibarchive.toml"),
        "[watch]\npoll_interval_secs = 0\n",
    )
    .expect("write config");

    bibarchive(tmp.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("poll interval"));
}

//! Shared fixtures for CLI end-to-end tests

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const CALFRESH: &str =
    "name: CalFresh Benefits\ncategory: food\ngroup: families\narea: alameda\ncities: [Oakland]\n";

pub const FOOD_BANK: &str = "name: Food Bank\ncategory: food\ngroup: families\narea: alameda\n";

/// A project directory with reference tables and an empty records tree
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let reference = dir.path().join("data/reference");
        fs::create_dir_all(&reference).unwrap();
        fs::create_dir_all(dir.path().join("data/records")).unwrap();

        fs::write(
            reference.join("categories.yml"),
            "- key: food\n  label: Food\n  icon: utensils\n- key: housing\n  label: Housing\n",
        )
        .unwrap();
        fs::write(
            reference.join("groups.yml"),
            "- key: families\n  label: Families\n- key: seniors\n  label: Seniors\n",
        )
        .unwrap();
        fs::write(
            reference.join("areas.yml"),
            "- key: alameda\n  label: Alameda County\n- key: contra-costa\n  label: Contra Costa County\n",
        )
        .unwrap();
        fs::write(
            reference.join("cities.yml"),
            "Alameda: [Oakland, Berkeley]\nContra Costa: [Richmond]\n",
        )
        .unwrap();

        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn record(&self, relative: &str, yaml: &str) -> &Self {
        let path = self.root().join("data/records").join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, yaml).unwrap();
        self
    }

    pub fn reference(&self, file: &str, yaml: &str) -> &Self {
        fs::write(self.root().join("data/reference").join(file), yaml).unwrap();
        self
    }

    pub fn output(&self) -> PathBuf {
        self.root().join("dist/api")
    }

    pub fn read_json(&self, relative: &str) -> serde_json::Value {
        let content = fs::read_to_string(self.output().join(relative)).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    /// `cdp` running inside the project with a clean, reproducible environment
    pub fn cdp(&self) -> Command {
        let mut cmd = Command::cargo_bin("cdp").unwrap();
        cmd.current_dir(self.root())
            .env("NO_COLOR", "1")
            .env("SOURCE_DATE_EPOCH", "1700000000")
            .env_remove("CDP_CONFIG")
            .env_remove("CDP_RECORDS_DIR")
            .env_remove("CDP_REFERENCE_DIR")
            .env_remove("CDP_OUTPUT_DIR")
            .env_remove("CDP_CACHE_DIR")
            .env_remove("CDP_CONCURRENCY")
            .env_remove("LOG_LEVEL")
            .env_remove("LOG_OUTPUT");
        cmd
    }
}

/// Every file under `dir` with its bytes, in path order
pub fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    collect(dir, dir, &mut files);
    files.sort();
    files
}

fn collect(root: &Path, dir: &Path, files: &mut Vec<(String, Vec<u8>)>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(root, &path, files);
        } else {
            let relative = path.strip_prefix(root).unwrap().display().to_string();
            files.push((relative, fs::read(&path).unwrap()));
        }
    }
}

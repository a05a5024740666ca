//! Shared helpers for the CLI integration tests.

#![allow(dead_code)]

use assert_cmd::Command;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const STATION: &str = "BARCELONA AEROPUERTO, SP";

/// A `pluvio` command isolated from any ambient `pluvio.toml` or environment.
pub fn pluvio(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pluvio").unwrap();
    cmd.current_dir(cwd).env_remove("PLUVIO_TRACKING__URI").env_remove("PLUVIO_SOURCE__LOCATION");
    cmd
}

/// Write a daily station feed from a fixed-seed generator.
pub fn write_station_feed(dir: &Path, days: u64) -> PathBuf {
    let mut rng = StdRng::seed_from_u64(7);
    let start = NaiveDate::from_ymd_opt(1960, 1, 1).unwrap();
    let mut csv = String::from("STATION,DATE,NAME,PRCP\n");
    for day in 0..days {
        let u: f64 = rng.gen_range(0.0..1.0);
        let prcp = if u < 0.55 { 0.0 } else { ((u - 0.55) * 60.0).round() / 10.0 };
        let date = start + chrono::Days::new(day);
        writeln!(csv, "SP000008181,{date},\"{STATION}\",{prcp}").unwrap();
    }

    let path = dir.join("station.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

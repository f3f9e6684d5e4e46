use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use chrono::NaiveDate;

use crate::throttle::DEFAULT_MAX_IN_FLIGHT;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Runtime configuration, read from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub subreddit: String,
    pub out_directory: PathBuf,
    /// First archived day, inclusive (UTC).
    pub after: NaiveDate,
    /// Last archived day, inclusive (UTC).
    pub before: NaiveDate,
    pub verbose: bool,
    pub max_in_flight: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let subreddit =
            env::var("SUBREDDIT").context("SUBREDDIT environment variable must be set")?;
        let out_directory: PathBuf = env::var("OUT_DIRECTORY")
            .context("OUT_DIRECTORY environment variable must be set")?
            .into();
        let after = parse_date(
            &env::var("AFTER_DATE").context("AFTER_DATE environment variable must be set")?,
        )?;
        let before = parse_date(
            &env::var("BEFORE_DATE").context("BEFORE_DATE environment variable must be set")?,
        )?;
        ensure!(
            after <= before,
            "AFTER_DATE ({after}) must not be later than BEFORE_DATE ({before})"
        );

        let verbose = env::var("VERBOSITY")
            .ok()
            .and_then(|raw| raw.parse::<i32>().ok())
            .map(|level| level != 0)
            .unwrap_or(false);

        let max_in_flight = match env::var("MAX_IN_FLIGHT") {
            Ok(raw) => raw
                .parse()
                .context("MAX_IN_FLIGHT must be a positive number")?,
            Err(_) => DEFAULT_MAX_IN_FLIGHT,
        };

        Ok(Self {
            subreddit,
            out_directory,
            after,
            before,
            verbose,
            max_in_flight,
        })
    }

    /// The archived window as inclusive epoch-second bounds: midnight of the
    /// after-day through the last second of the before-day.
    pub fn window_bounds(&self) -> (i64, i64) {
        let lower = self
            .after
            .and_hms_opt(0, 0, 0)
            .unwrap() // midnight always exists
            .and_utc()
            .timestamp();
        let upper = self
            .before
            .and_hms_opt(23, 59, 59)
            .unwrap()
            .and_utc()
            .timestamp();
        (lower, upper)
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .with_context(|| format!("Invalid date '{raw}', expected YYYY-MM-DD"))
}

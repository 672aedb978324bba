use std::io::{self, Write};

use serde::Serialize;

use crate::app::{PreloadResult, StatsResult};
use crate::forecast::Prediction;
use crate::pagination::Connection;
use crate::records::Record;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_preload(result: &PreloadResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_page(page: &Connection<Record>) -> io::Result<()> {
        Self::print_json(page)
    }

    pub fn print_records(records: &[Record]) -> io::Result<()> {
        Self::print_json(&records)
    }

    pub fn print_stats(result: &StatsResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_prediction(prediction: &Prediction) -> io::Result<()> {
        Self::print_json(prediction)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

//! CF-1.6 NetCDF writing
//!
//! One output file holds a single valid time. Every data variable carries
//! the time stamps of its forecast (valid and init, as ISO strings and Unix
//! seconds) and the length of the period it accumulates over.

use crate::errors::Result;
use crate::timeutil::{unix_seconds, ISO_STAMP_FORMAT};
use chrono::{NaiveDateTime, Utc};
use ndarray::{Array2, Axis};
use netcdf::create;
use std::{fs, path::Path};

/// Missing-value marker written in place of non-finite values.
pub const MISSING_VALUE: f32 = 1.0e20;

pub const CONVENTIONS: &str = "CF-1.6";

const TIME_UNITS: &str = "seconds since 1970-01-01 00:00:00";

/// Horizontal coordinates of the written fields.
#[derive(Debug, Clone, PartialEq)]
pub enum GridCoords {
    /// Regular latitude/longitude axes: dims (time, lat, lon).
    Regular { lat: Vec<f32>, lon: Vec<f32> },
    /// 2-D latitude and longitude: dims (time, y, x).
    Curvilinear { lat: Array2<f32>, lon: Array2<f32> },
}

impl GridCoords {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            GridCoords::Regular { lat, lon } => (lat.len(), lon.len()),
            GridCoords::Curvilinear { lat, .. } => lat.dim(),
        }
    }

    fn dim_names(&self) -> (&'static str, &'static str) {
        match self {
            GridCoords::Regular { .. } => ("lat", "lon"),
            GridCoords::Curvilinear { .. } => ("y", "x"),
        }
    }
}

/// Forecast instants of one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepStamp {
    pub init: NaiveDateTime,
    pub valid: NaiveDateTime,
    /// Valid time of the preceding step, if any.
    pub previous: Option<NaiveDateTime>,
}

impl StepStamp {
    pub fn valid_ut(&self) -> i64 {
        unix_seconds(&self.valid)
    }

    pub fn init_ut(&self) -> i64 {
        unix_seconds(&self.init)
    }

    /// Seconds since initialization.
    pub fn since_init(&self) -> i64 {
        self.valid_ut() - self.init_ut()
    }

    /// Seconds since the preceding step.
    pub fn since_previous(&self) -> Option<i64> {
        self.previous.map(|p| self.valid_ut() - unix_seconds(&p))
    }
}

/// Accumulation period of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulation {
    /// Instantaneous value.
    None,
    /// Accumulated since initialization.
    SinceInit,
    /// Accumulated since the preceding step.
    SincePrevious,
}

/// A 2-D field with its CF metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CfField {
    pub name: &'static str,
    pub units: &'static str,
    pub standard_name: &'static str,
    pub long_name: &'static str,
    pub accumulation: Accumulation,
    pub data: Array2<f32>,
}

impl CfField {
    fn accum_seconds(&self, stamp: &StepStamp) -> i64 {
        match self.accumulation {
            Accumulation::None => 0,
            Accumulation::SinceInit => stamp.since_init(),
            Accumulation::SincePrevious => stamp.since_previous().unwrap_or(0),
        }
    }
}

/// `<model>_<YYYY-MM-DD_HH_MM_SS>.nc`
pub fn output_file_name(model: &str, valid: &NaiveDateTime) -> String {
    format!("{}_{}.nc", model, valid.format("%Y-%m-%d_%H_%M_%S"))
}

/// Writes CF files on one grid.
pub struct CfWriter<'a> {
    grid: &'a GridCoords,
    source: &'a str,
}

impl<'a> CfWriter<'a> {
    pub fn new(grid: &'a GridCoords, source: &'a str) -> Self {
        Self { grid, source }
    }

    /// Writes one valid time to `output_path`, replacing an existing file.
    pub fn write_step(&self, output_path: &Path, stamp: &StepStamp, fields: &[CfField]) -> Result<()> {
        if output_path.exists() {
            fs::remove_file(output_path)?;
        }

        let mut file = create(output_path)?;
        let (ny, nx) = self.grid.shape();
        let (y_dim, x_dim) = self.grid.dim_names();

        file.add_dimension("time", 1)?;
        file.add_dimension(y_dim, ny)?;
        file.add_dimension(x_dim, nx)?;

        {
            let mut time_var = file.add_variable::<f64>("time", &["time"])?;
            time_var.put_attribute("standard_name", "time")?;
            time_var.put_attribute("long_name", "valid time")?;
            time_var.put_attribute("units", TIME_UNITS)?;
            time_var.put_attribute("calendar", "standard")?;
            time_var.put_values(&[stamp.valid_ut() as f64], ..)?;
        }
        {
            let mut ref_var = file.add_variable::<f64>("forecast_reference_time", &["time"])?;
            ref_var.put_attribute("standard_name", "forecast_reference_time")?;
            ref_var.put_attribute("long_name", "initialization time")?;
            ref_var.put_attribute("units", TIME_UNITS)?;
            ref_var.put_attribute("calendar", "standard")?;
            ref_var.put_values(&[stamp.init_ut() as f64], ..)?;
        }

        match self.grid {
            GridCoords::Regular { lat, lon } => {
                let mut lat_var = file.add_variable::<f32>("lat", &["lat"])?;
                lat_var.put_attribute("standard_name", "latitude")?;
                lat_var.put_attribute("long_name", "latitude")?;
                lat_var.put_attribute("units", "degrees_north")?;
                lat_var.put_values(lat.as_slice(), ..)?;

                let mut lon_var = file.add_variable::<f32>("lon", &["lon"])?;
                lon_var.put_attribute("standard_name", "longitude")?;
                lon_var.put_attribute("long_name", "longitude")?;
                lon_var.put_attribute("units", "degrees_east")?;
                lon_var.put_values(lon.as_slice(), ..)?;
            }
            GridCoords::Curvilinear { lat, lon } => {
                let mut lat_var = file.add_variable::<f32>("lat", &["y", "x"])?;
                lat_var.put_attribute("standard_name", "latitude")?;
                lat_var.put_attribute("long_name", "latitude")?;
                lat_var.put_attribute("units", "degrees_north")?;
                lat_var.put(lat.view(), ..)?;

                let mut lon_var = file.add_variable::<f32>("lon", &["y", "x"])?;
                lon_var.put_attribute("standard_name", "longitude")?;
                lon_var.put_attribute("long_name", "longitude")?;
                lon_var.put_attribute("units", "degrees_east")?;
                lon_var.put(lon.view(), ..)?;
            }
        }

        let valid_time = stamp.valid.format(ISO_STAMP_FORMAT).to_string();
        let init_time = stamp.init.format(ISO_STAMP_FORMAT).to_string();
        for field in fields {
            let data = field
                .data
                .mapv(|v| if v.is_finite() { v } else { MISSING_VALUE });
            let mut var = file.add_variable::<f32>(field.name, &["time", y_dim, x_dim])?;
            var.put_attribute("units", field.units)?;
            var.put_attribute("standard_name", field.standard_name)?;
            var.put_attribute("long_name", field.long_name)?;
            var.put_attribute("missing_value", MISSING_VALUE)?;
            var.put_attribute("valid_time", valid_time.as_str())?;
            var.put_attribute("valid_time_ut", stamp.valid_ut())?;
            var.put_attribute("init_time", init_time.as_str())?;
            var.put_attribute("init_time_ut", stamp.init_ut())?;
            var.put_attribute("accum_time_sec", field.accum_seconds(stamp))?;
            if matches!(self.grid, GridCoords::Curvilinear { .. }) {
                var.put_attribute("coordinates", "lat lon")?;
            }
            var.put(data.view().insert_axis(Axis(0)), ..)?;
        }

        file.add_attribute("Conventions", CONVENTIONS)?;
        file.add_attribute("source", self.source)?;
        file.add_attribute(
            "history",
            format!("Created by gsvis on {}", Utc::now().to_rfc3339()),
        )?;

        Ok(())
    }
}

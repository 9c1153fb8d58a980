//! CF NetCDF rewriting of model history files
//!
//! A history file of either supported model is read once, the derived
//! diagnostics are computed for every time step, and each step is written
//! to its own CF-1.6 file, optionally regridded afterwards.

pub mod derive;
pub mod regrid;
pub mod writer;

use crate::config::load_yaml;
use crate::errors::{Result, VerifError};
use crate::timeutil::{parse_cycle, parse_hours};
use chrono::{Duration, NaiveDateTime};
use derive::{bucket_precip, destagger, integrated_transport, integrated_vapour, total_precip};
use log::{info, warn};
use ndarray::{Array2, Array3, Array4, ArrayD, Axis, Ix1, Ix2, Ix3, Ix4};
use netcdf::File;
use regrid::RegridSpec;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use writer::{output_file_name, Accumulation, CfField, CfWriter, GridCoords, StepStamp};

/// History file flavour.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Staggered Arakawa-C grid output.
    Wrf,
    /// Mesh output already interpolated to latitude/longitude.
    Mpas,
}

/// Variable names of one history flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableNames {
    pub rainc: &'static str,
    pub rainnc: &'static str,
    pub vapour: &'static str,
    pub zonal_wind: &'static str,
    pub meridional_wind: &'static str,
    /// Summed to give full pressure in Pa.
    pub pressure: &'static [&'static str],
    pub lat: &'static str,
    pub lon: &'static str,
    /// Leading dimension of every time-dependent field.
    pub time_dim: &'static str,
}

const WRF_NAMES: VariableNames = VariableNames {
    rainc: "RAINC",
    rainnc: "RAINNC",
    vapour: "QVAPOR",
    zonal_wind: "U",
    meridional_wind: "V",
    pressure: &["P", "PB"],
    lat: "XLAT",
    lon: "XLONG",
    time_dim: "Time",
};

const MPAS_NAMES: VariableNames = VariableNames {
    rainc: "rainc",
    rainnc: "rainnc",
    vapour: "qv",
    zonal_wind: "uReconstructZonal",
    meridional_wind: "uReconstructMeridional",
    pressure: &["pressure"],
    lat: "latitude",
    lon: "longitude",
    time_dim: "Time",
};

impl ModelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Wrf => "wrf",
            ModelKind::Mpas => "mpas",
        }
    }

    pub fn names(self) -> &'static VariableNames {
        match self {
            ModelKind::Wrf => &WRF_NAMES,
            ModelKind::Mpas => &MPAS_NAMES,
        }
    }
}

/// Parameters of a CF rewrite job.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewriteJob {
    pub model: ModelKind,

    /// History file to rewrite.
    pub input: PathBuf,

    /// Directory receiving one file per valid time.
    pub output_dir: PathBuf,

    /// Forecast initialization, `YYYYMMDDHH`.
    pub init: String,

    /// Valid time of the first step, `YYYYMMDDHH`. Defaults to `init`.
    #[serde(default)]
    pub valid_start: Option<String>,

    /// Hours between steps, `HH`.
    #[serde(default = "RewriteJob::default_interval")]
    pub interval: String,

    #[serde(default)]
    pub regrid: Option<RegridSpec>,
}

impl RewriteJob {
    fn default_interval() -> String {
        "1".to_string()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let job: RewriteJob = load_yaml(path)?;
        job.check()?;
        Ok(job)
    }

    pub fn check(&self) -> Result<()> {
        self.init_time()?;
        self.first_valid()?;
        parse_hours("interval", &self.interval)?;
        if !self.input.is_file() {
            return Err(VerifError::config("input", self.input.display(), "no such history file"));
        }
        if !self.output_dir.is_dir() {
            return Err(VerifError::MissingDirectory {
                path: self.output_dir.clone(),
            });
        }
        if let Some(regrid) = &self.regrid {
            regrid.check()?;
        }
        Ok(())
    }

    pub fn init_time(&self) -> Result<NaiveDateTime> {
        parse_cycle("init", &self.init)
    }

    pub fn first_valid(&self) -> Result<NaiveDateTime> {
        match &self.valid_start {
            Some(v) => parse_cycle("valid start", v),
            None => self.init_time(),
        }
    }

    /// Valid time of step `k`: `valid_start + k * interval`.
    pub fn valid_at(&self, step: usize) -> Result<NaiveDateTime> {
        let hours = parse_hours("interval", &self.interval)?;
        Ok(self.first_valid()? + Duration::hours(i64::from(hours) * step as i64))
    }
}

/// Fields derived from one history file, all on `grid`.
#[derive(Debug, Clone)]
pub struct DerivedFields {
    pub grid: GridCoords,
    /// (time, y, x), mm
    pub precip: Array3<f32>,
    /// (time, y, x), kg m-2
    pub iwv: Option<Array3<f32>>,
    /// (time, y, x), kg m-1 s-1
    pub ivt: Option<Array3<f32>>,
}

fn read_array(file: &File, name: &str) -> Result<ArrayD<f32>> {
    let var = file
        .variable(name)
        .ok_or_else(|| VerifError::VariableNotFound {
            var: name.to_string(),
        })?;
    let shape: Vec<usize> = var
        .dimensions()
        .iter()
        .map(netcdf::Dimension::len)
        .collect();
    let values = var.get_values::<f32, _>(..)?;
    Ok(ArrayD::from_shape_vec(shape, values)?)
}

/// Reads a field whose leading dimension must be the model's time dimension.
fn read_timed(file: &File, name: &str, model: ModelKind) -> Result<ArrayD<f32>> {
    let field = read_array(file, name)?;
    let time_dim = model.names().time_dim;
    let leading = file
        .variable(name)
        .and_then(|var| var.dimensions().first().map(|dim| dim.name()));
    if leading.as_deref() != Some(time_dim) {
        return Err(VerifError::DimensionNotFound {
            var: name.to_string(),
            dim: time_dim.to_string(),
        });
    }
    Ok(field)
}

fn read3(file: &File, name: &str, model: ModelKind) -> Result<Array3<f32>> {
    Ok(read_timed(file, name, model)?.into_dimensionality::<Ix3>()?)
}

/// Reads a (time, level, y, x) field; mesh output stores levels last.
fn read_column(file: &File, name: &str, model: ModelKind) -> Result<Array4<f32>> {
    let field = read_timed(file, name, model)?.into_dimensionality::<Ix4>()?;
    Ok(match model {
        ModelKind::Wrf => field,
        ModelKind::Mpas => field
            .permuted_axes([0, 3, 1, 2])
            .as_standard_layout()
            .into_owned(),
    })
}

/// First time slice of a 2-D or (time, y, x) coordinate.
fn read_plane(file: &File, name: &str) -> Result<Array2<f32>> {
    let field = read_array(file, name)?;
    match field.ndim() {
        2 => Ok(field.into_dimensionality::<Ix2>()?),
        3 => Ok(field
            .into_dimensionality::<Ix3>()?
            .index_axis(Axis(0), 0)
            .to_owned()),
        n => Err(VerifError::Data(format!(
            "coordinate {} has {} dimensions, expected 2 or 3",
            name, n
        ))),
    }
}

fn read_grid(file: &File, model: ModelKind) -> Result<GridCoords> {
    let names = model.names();
    match model {
        ModelKind::Wrf => Ok(GridCoords::Curvilinear {
            lat: read_plane(file, names.lat)?,
            lon: read_plane(file, names.lon)?,
        }),
        ModelKind::Mpas => {
            let lat = read_array(file, names.lat)?.into_dimensionality::<Ix1>()?;
            let lon = read_array(file, names.lon)?.into_dimensionality::<Ix1>()?;
            Ok(GridCoords::Regular {
                lat: lat.to_vec(),
                lon: lon.to_vec(),
            })
        }
    }
}

fn read_pressure(file: &File, model: ModelKind) -> Result<Array4<f32>> {
    let mut parts = model.names().pressure.iter();
    let first = parts.next().ok_or_else(|| VerifError::Generic("no pressure variables".to_string()))?;
    let mut total = read_column(file, first, model)?;
    for name in parts {
        total = total + read_column(file, name, model)?;
    }
    Ok(total)
}

/// Vapour and transport integrals, `None` when the file lacks the inputs.
fn read_moisture(file: &File, model: ModelKind) -> Result<Option<(Array3<f32>, Array3<f32>)>> {
    let names = model.names();
    let needed = [names.vapour, names.zonal_wind, names.meridional_wind]
        .into_iter()
        .chain(names.pressure.iter().copied());
    let missing: Vec<&str> = needed.filter(|n| file.variable(n).is_none()).collect();
    if !missing.is_empty() {
        warn!("Skipping IWV/IVT: {} missing", missing.join(", "));
        return Ok(None);
    }

    let q = read_column(file, names.vapour, model)?;
    let pressure = read_pressure(file, model)?;
    let mut u = read_column(file, names.zonal_wind, model)?;
    let mut v = read_column(file, names.meridional_wind, model)?;
    if model == ModelKind::Wrf {
        u = destagger(&u, 3)?;
        v = destagger(&v, 2)?;
    }
    let iwv = integrated_vapour(&q, &pressure)?;
    let ivt = integrated_transport(&q, &u, &v, &pressure)?;
    Ok(Some((iwv, ivt)))
}

/// Reads `path` and derives precipitation and moisture diagnostics.
pub fn read_history(path: &Path, model: ModelKind) -> Result<DerivedFields> {
    let file = netcdf::open(path)?;
    let names = model.names();
    let grid = read_grid(&file, model)?;
    let precip = total_precip(
        &read3(&file, names.rainc, model)?,
        &read3(&file, names.rainnc, model)?,
    )?;
    let (iwv, ivt) = match read_moisture(&file, model)? {
        Some((iwv, ivt)) => (Some(iwv), Some(ivt)),
        None => (None, None),
    };
    Ok(DerivedFields {
        grid,
        precip,
        iwv,
        ivt,
    })
}

/// CF fields of time step `step`.
pub fn step_fields(fields: &DerivedFields, step: usize) -> Vec<CfField> {
    let mut out = vec![CfField {
        name: "precip",
        units: "mm",
        standard_name: "precipitation_amount",
        long_name: "Total accumulated precipitation",
        accumulation: Accumulation::SinceInit,
        data: fields.precip.index_axis(Axis(0), step).to_owned(),
    }];
    if let Some(bucket) = bucket_precip(&fields.precip, step) {
        out.push(CfField {
            name: "precip_bkt",
            units: "mm",
            standard_name: "precipitation_amount",
            long_name: "Precipitation accumulated since the previous step",
            accumulation: Accumulation::SincePrevious,
            data: bucket,
        });
    }
    if let Some(iwv) = &fields.iwv {
        out.push(CfField {
            name: "IWV",
            units: "kg m-2",
            standard_name: "atmosphere_mass_content_of_water_vapor",
            long_name: "Integrated water vapor",
            accumulation: Accumulation::None,
            data: iwv.index_axis(Axis(0), step).to_owned(),
        });
    }
    if let Some(ivt) = &fields.ivt {
        out.push(CfField {
            name: "IVT",
            units: "kg m-1 s-1",
            standard_name: "integrated_water_vapor_transport",
            long_name: "Integrated water vapor transport",
            accumulation: Accumulation::None,
            data: ivt.index_axis(Axis(0), step).to_owned(),
        });
    }
    out
}

/// Rewrites the history file of `job`; returns the written paths in step order.
pub fn run_rewrite(job: &RewriteJob) -> Result<Vec<PathBuf>> {
    let init = job.init_time()?;
    let fields = read_history(&job.input, job.model)?;
    let steps = fields.precip.len_of(Axis(0));
    info!(
        "Rewriting {} steps of {} ({})",
        steps,
        job.input.display(),
        job.model.as_str()
    );

    let source = format!("{} history {}", job.model.as_str(), job.input.display());
    let writer = CfWriter::new(&fields.grid, &source);
    let mut written = Vec::with_capacity(steps);
    for step in 0..steps {
        let valid = job.valid_at(step)?;
        let previous = if step > 0 { Some(job.valid_at(step - 1)?) } else { None };
        let stamp = StepStamp { init, valid, previous };
        let path = job.output_dir.join(output_file_name(job.model.as_str(), &valid));

        match &job.regrid {
            Some(regrid) => {
                let native = path.with_extension("native.nc");
                writer.write_step(&native, &stamp, &step_fields(&fields, step))?;
                let regridded = regrid.run(&native, &path);
                let removed = fs::remove_file(&native);
                regridded?;
                removed?;
            }
            None => writer.write_step(&path, &stamp, &step_fields(&fields, step))?,
        }
        info!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

//! Regridding through the external `cdo` operators

use crate::errors::{Result, VerifError};
use log::{debug, info};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

/// Bilinear regrid to a target grid, optionally cut to a lon/lat box.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegridSpec {
    /// Target grid: a grid description file or a cdo grid name such as `r1440x720`.
    pub grid: String,

    /// `[lon0, lon1, lat0, lat1]`
    #[serde(default)]
    pub lonlat_box: Option<[f64; 4]>,

    #[serde(default = "RegridSpec::default_program")]
    pub program: String,
}

impl RegridSpec {
    fn default_program() -> String {
        "cdo".to_string()
    }

    pub fn check(&self) -> Result<()> {
        if self.grid.trim().is_empty() {
            return Err(VerifError::config("regrid grid", &self.grid, "must not be empty"));
        }
        if let Some([lon0, lon1, lat0, lat1]) = self.lonlat_box {
            if lon0 >= lon1 || lat0 >= lat1 {
                return Err(VerifError::config(
                    "regrid lonlat_box",
                    format!("{:?}", [lon0, lon1, lat0, lat1]),
                    "expected [lon0, lon1, lat0, lat1] with lon0 < lon1 and lat0 < lat1",
                ));
            }
        }
        Ok(())
    }

    /// Operator arguments turning `input` into `output`.
    pub fn args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = vec!["-O".to_string()];
        let remap = format!("remapbil,{}", self.grid);
        match self.lonlat_box {
            Some([lon0, lon1, lat0, lat1]) => {
                args.push(format!("-sellonlatbox,{},{},{},{}", lon0, lon1, lat0, lat1));
                args.push(format!("-{}", remap));
            }
            None => args.push(remap),
        }
        args.push(input.display().to_string());
        args.push(output.display().to_string());
        args
    }

    /// Runs the regridder; a non-zero exit is an error carrying its stderr.
    pub fn run(&self, input: &Path, output: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(input, output));
        debug!("executing {cmd:?}");

        let result = cmd.output().map_err(|e| VerifError::Command {
            program: self.program.clone(),
            message: e.to_string(),
        })?;
        if !result.status.success() {
            return Err(VerifError::Command {
                program: self.program.clone(),
                message: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        info!("{:?} completed with status {}", cmd.get_program(), result.status);
        info!("Regridded {} to {}", input.display(), output.display());
        Ok(())
    }
}

//! Derived diagnostics: accumulated precipitation, bucket precipitation,
//! and vertically integrated water vapour and vapour transport.

use crate::errors::{Result, VerifError};
use ndarray::{Array2, Array3, Array4, ArrayView3, Axis, Zip};

/// Standard gravity used in column integrals, m s-2.
pub const GRAVITY: f32 = 9.81;

/// Total accumulated precipitation `rainc + rainnc`, (time, y, x).
pub fn total_precip(rainc: &Array3<f32>, rainnc: &Array3<f32>) -> Result<Array3<f32>> {
    if rainc.dim() != rainnc.dim() {
        return Err(VerifError::Data(format!(
            "convective and non-convective rain differ in shape: {:?} vs {:?}",
            rainc.shape(),
            rainnc.shape()
        )));
    }
    Ok(rainc + rainnc)
}

/// Precipitation in the bucket ending at step `step` (`step >= 1`).
pub fn bucket_precip(precip: &Array3<f32>, step: usize) -> Option<Array2<f32>> {
    if step == 0 || step >= precip.len_of(Axis(0)) {
        return None;
    }
    Some(&precip.index_axis(Axis(0), step) - &precip.index_axis(Axis(0), step - 1))
}

/// Averages neighbouring points along a staggered `axis`, shrinking it by one.
pub fn destagger(field: &Array4<f32>, axis: usize) -> Result<Array4<f32>> {
    let len = field.len_of(Axis(axis));
    if len < 2 {
        return Err(VerifError::Data(format!(
            "cannot destagger axis {} of length {}",
            axis, len
        )));
    }
    let lower = field.slice_axis(Axis(axis), (0..len - 1).into());
    let upper = field.slice_axis(Axis(axis), (1..len).into());
    Ok((&lower + &upper) * 0.5)
}

/// Trapezoidal `1/g * integral of q dp` over the level axis of a
/// (level, y, x) column. Pressure may increase or decrease with level.
pub fn column_integral(q: ArrayView3<f32>, pressure: ArrayView3<f32>) -> Array2<f32> {
    let (levels, ny, nx) = q.dim();
    let mut out = Array2::<f32>::zeros((ny, nx));
    for k in 0..levels.saturating_sub(1) {
        let q0 = q.index_axis(Axis(0), k);
        let q1 = q.index_axis(Axis(0), k + 1);
        let p0 = pressure.index_axis(Axis(0), k);
        let p1 = pressure.index_axis(Axis(0), k + 1);
        Zip::from(&mut out)
            .and(&q0)
            .and(&q1)
            .and(&p0)
            .and(&p1)
            .for_each(|acc, &a, &b, &pa, &pb| {
                *acc += 0.5 * (a + b) * (pa - pb).abs();
            });
    }
    out / GRAVITY
}

/// Integrated water vapour per time step, kg m-2. Inputs are
/// (time, level, y, x) with pressure in Pa.
pub fn integrated_vapour(q: &Array4<f32>, pressure: &Array4<f32>) -> Result<Array3<f32>> {
    check_same_shape("pressure", q, pressure)?;
    let (nt, _, ny, nx) = q.dim();
    let mut out = Array3::<f32>::zeros((nt, ny, nx));
    for t in 0..nt {
        let column = column_integral(q.index_axis(Axis(0), t), pressure.index_axis(Axis(0), t));
        out.index_axis_mut(Axis(0), t).assign(&column);
    }
    Ok(out)
}

/// Integrated vapour transport magnitude per time step, kg m-1 s-1.
/// Winds must already sit on the mass grid.
pub fn integrated_transport(
    q: &Array4<f32>,
    u: &Array4<f32>,
    v: &Array4<f32>,
    pressure: &Array4<f32>,
) -> Result<Array3<f32>> {
    check_same_shape("pressure", q, pressure)?;
    check_same_shape("zonal wind", q, u)?;
    check_same_shape("meridional wind", q, v)?;
    let qu = q * u;
    let qv = q * v;
    let (nt, _, ny, nx) = q.dim();
    let mut out = Array3::<f32>::zeros((nt, ny, nx));
    for t in 0..nt {
        let p = pressure.index_axis(Axis(0), t);
        let east = column_integral(qu.index_axis(Axis(0), t), p);
        let north = column_integral(qv.index_axis(Axis(0), t), p);
        let magnitude = Zip::from(&east).and(&north).map_collect(|&e, &n| e.hypot(n));
        out.index_axis_mut(Axis(0), t).assign(&magnitude);
    }
    Ok(out)
}

fn check_same_shape(name: &str, reference: &Array4<f32>, other: &Array4<f32>) -> Result<()> {
    if reference.dim() != other.dim() {
        return Err(VerifError::Data(format!(
            "{} shape {:?} does not match vapour shape {:?}",
            name,
            other.shape(),
            reference.shape()
        )));
    }
    Ok(())
}

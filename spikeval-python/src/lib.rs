//! spikeval_python: PyO3 bindings for the spikeval-core scoring kernels.
//!
//! Exposes NumPy-compatible functions:
//! - normalize_units -> relabeled unit array (i64) plus the distinct count
//! - count_matches -> greedy temporal match count of two sorted time arrays
//! - evaluate -> (confusion (U, C) i64, cluster_to_unit i64, true_positive f64,
//!   false_discovery f64)
//!
//! Spike trains arrive as paired 1D arrays: times (i64) and unit labels
//! (i64, non-negative) of equal length.

use numpy::{ndarray, PyArray1, PyArray2, PyReadonlyArray1};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use spikeval_core::kernels::matching;
use spikeval_core::kernels::relabel;
use spikeval_core::kernels::score;
use spikeval_core::SpikeEvent;

fn build_events<'py>(
    times: PyReadonlyArray1<'py, i64>,
    units: PyReadonlyArray1<'py, i64>,
) -> PyResult<Vec<SpikeEvent>> {
    let ts = times.as_slice()?;
    let us = units.as_slice()?;
    if ts.len() != us.len() {
        return Err(PyValueError::new_err(
            "times and units must have equal length.",
        ));
    }

    let mut out = Vec::with_capacity(ts.len());
    for (&time, &unit) in ts.iter().zip(us) {
        let unit = u32::try_from(unit)
            .map_err(|_| PyValueError::new_err("unit labels must be non-negative."))?;
        out.push(SpikeEvent { time, unit });
    }
    Ok(out)
}

#[pyfunction(text_signature = "(times, units, /)")]
#[pyo3(name = "normalize_units")]
/// Relabel unit identifiers to a dense 0..U-1 range by raw-label rank.
/// Returns (units: i64 array, n_units: int).
fn normalize_units_py<'py>(
    py: Python<'py>,
    times: PyReadonlyArray1<'py, i64>,
    units: PyReadonlyArray1<'py, i64>,
) -> PyResult<(Py<PyArray1<i64>>, usize)> {
    let events = build_events(times, units)?;
    let (normalized, n_units) = relabel::normalize_units(&events);
    let labels: Vec<i64> = normalized.iter().map(|ev| ev.unit as i64).collect();
    Ok((PyArray1::from_vec(py, labels).to_owned(), n_units))
}

#[pyfunction(text_signature = "(reference, candidate, tolerance, /)")]
#[pyo3(name = "count_matches")]
/// Count temporal matches between two sorted spike-time arrays under the
/// given proximity tolerance (samples).
fn count_matches_py<'py>(
    reference: PyReadonlyArray1<'py, i64>,
    candidate: PyReadonlyArray1<'py, i64>,
    tolerance: i64,
) -> PyResult<usize> {
    Ok(matching::count_matches(
        reference.as_slice()?,
        candidate.as_slice()?,
        tolerance,
    ))
}

#[pyfunction(text_signature = "(ref_times, ref_units, cand_times, cand_units, tolerance, /)")]
#[pyo3(name = "evaluate")]
/// Score a candidate spike train against a reference one.
/// Returns (confusion (U, C) i64, cluster_to_unit i64, true_positive f64,
/// false_discovery f64).
#[allow(clippy::type_complexity)]
fn evaluate_py<'py>(
    py: Python<'py>,
    ref_times: PyReadonlyArray1<'py, i64>,
    ref_units: PyReadonlyArray1<'py, i64>,
    cand_times: PyReadonlyArray1<'py, i64>,
    cand_units: PyReadonlyArray1<'py, i64>,
    tolerance: i64,
) -> PyResult<(
    Py<PyArray2<i64>>,
    Py<PyArray1<i64>>,
    Py<PyArray1<f64>>,
    Py<PyArray1<f64>>,
)> {
    let reference = build_events(ref_times, ref_units)?;
    let candidate = build_events(cand_times, cand_units)?;

    let report = score::evaluate(&reference, &candidate, tolerance);

    let confusion: Vec<i64> = report.confusion.iter().map(|&v| v as i64).collect();
    let confusion = ndarray::Array2::from_shape_vec((report.n_units, report.n_clusters), confusion)
        .map_err(|_| PyValueError::new_err("Failed to reshape confusion matrix into (U, C)."))?;
    let cluster_to_unit: Vec<i64> = report.cluster_to_unit.iter().map(|&u| u as i64).collect();

    Ok((
        PyArray2::from_owned_array(py, confusion).to_owned(),
        PyArray1::from_vec(py, cluster_to_unit).to_owned(),
        PyArray1::from_vec(py, report.true_positive).to_owned(),
        PyArray1::from_vec(py, report.false_discovery).to_owned(),
    ))
}

#[pymodule]
fn spikeval_python(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(normalize_units_py, m)?)?;
    m.add_function(wrap_pyfunction!(count_matches_py, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_py, m)?)?;
    Ok(())
}

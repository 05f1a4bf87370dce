//! Block-level signal conditioning: Butterworth band-pass filtering and
//! neighborhood spatial whitening.
//!
//! Both entry points are pure over a `[time × channel]` row-major block and
//! keep no state between calls, so the batch stream can apply them to each
//! batch independently.

use crate::stream::sample_index;

/// Amplitude (in post-rescale units, i.e. standard deviations) above which a
/// sample is treated as signal rather than noise when estimating whitening
/// covariances.
const NOISE_CEILING: f32 = 4.0;

/// Ridge added to covariance diagonals before inversion.
const COV_RIDGE: f64 = 1e-6;

const JACOBI_SWEEPS: usize = 50;
const JACOBI_TOL: f64 = 1e-10;

/// Biquad (2nd-order IIR) section in normalized form (a0 = 1).
///
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
#[derive(Clone, Copy, Debug)]
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Biquad {
    /// 2nd-order Butterworth band-pass section.
    fn bandpass(sample_rate: f32, low_cut: f32, high_cut: f32) -> Self {
        use std::f32::consts::PI;

        let center = (low_cut * high_cut).sqrt();
        let bandwidth = high_cut - low_cut;

        let omega = 2.0 * PI * center / sample_rate;
        let cos_omega = omega.cos();
        let sin_omega = omega.sin();
        let bw = 2.0 * PI * bandwidth / sample_rate;
        let alpha = sin_omega * (bw / 2.0).sinh();

        let a0 = 1.0 + alpha;
        Self {
            b0: alpha / a0,
            b1: 0.0,
            b2: -alpha / a0,
            a1: -2.0 * cos_omega / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// Band-pass filters every channel of a block in place.
///
/// The pass band runs from `low_hz` to `high_frac` of the Nyquist frequency
/// (`low_hz < high_frac * sample_rate / 2` is the caller's responsibility).
/// The requested `order` is realized as a cascade of identical biquad
/// sections, one per two poles. Filtering is causal (single forward pass),
/// with section state reset per channel.
pub fn bandpass(
    block: &mut [f32],
    n_chan: usize,
    low_hz: f32,
    high_frac: f32,
    order: usize,
    sample_rate: f32,
) {
    if block.is_empty() || n_chan == 0 {
        return;
    }
    let high_hz = high_frac * sample_rate / 2.0;
    debug_assert!(low_hz < high_hz, "band-pass corners out of order");

    let section = Biquad::bandpass(sample_rate, low_hz, high_hz);
    let n_sections = order.div_ceil(2);
    let n_samples = block.len() / n_chan;

    for c in 0..n_chan {
        // State per section: [x1, x2, y1, y2]
        let mut state = vec![[0.0f32; 4]; n_sections];
        for t in 0..n_samples {
            let idx = sample_index(t, c, n_chan);
            let mut x = block[idx];
            for s in state.iter_mut() {
                let y = section.b0 * x + section.b1 * s[0] + section.b2 * s[1]
                    - section.a1 * s[2]
                    - section.a2 * s[3];
                s[1] = s[0];
                s[0] = x;
                s[3] = s[2];
                s[2] = y;
                x = y;
            }
            block[idx] = x;
        }
    }
}

/// Spatially whitens a block over channel neighborhoods.
///
/// For each channel, the covariance of its neighborhood is estimated from
/// quiet samples only: any sample within `noise_halfwidth` of an excursion
/// beyond the noise ceiling (on any neighborhood channel) is excluded, with a
/// full-block fallback when too few samples survive the mask. The channel's
/// output is the corresponding row of the neighborhood covariance's symmetric
/// inverse square root applied to the neighborhood signals.
///
/// `neighbors` must come from [`crate::Geometry::neighbors`], so every list
/// contains its own channel. Returns a new block of the same shape.
pub fn whiten(block: &[f32], n_chan: usize, neighbors: &[Vec<usize>], noise_halfwidth: usize) -> Vec<f32> {
    let n_samples = if n_chan == 0 { 0 } else { block.len() / n_chan };
    let mut out = vec![0.0f32; block.len()];
    if n_samples == 0 {
        return out;
    }

    for (c, hood) in neighbors.iter().enumerate() {
        let k = hood.len();
        let pos = match hood.iter().position(|&h| h == c) {
            Some(p) => p,
            // A malformed neighbor table row; pass the channel through.
            None => {
                for t in 0..n_samples {
                    out[sample_index(t, c, n_chan)] = block[sample_index(t, c, n_chan)];
                }
                continue;
            }
        };

        let quiet = quiet_mask(block, n_chan, hood, n_samples, noise_halfwidth);
        let n_quiet = quiet.iter().filter(|&&q| q).count();
        let use_all = n_quiet < 4 * k;

        // Neighborhood second-moment matrix over the selected samples.
        let mut cov = vec![0.0f64; k * k];
        let mut n_used = 0usize;
        for t in 0..n_samples {
            if !use_all && !quiet[t] {
                continue;
            }
            n_used += 1;
            for i in 0..k {
                let xi = block[sample_index(t, hood[i], n_chan)] as f64;
                for j in i..k {
                    let xj = block[sample_index(t, hood[j], n_chan)] as f64;
                    cov[i * k + j] += xi * xj;
                }
            }
        }
        for i in 0..k {
            for j in i..k {
                let v = cov[i * k + j] / n_used as f64;
                cov[i * k + j] = v;
                cov[j * k + i] = v;
            }
            cov[i * k + i] += COV_RIDGE;
        }

        let (values, vectors) = symmetric_eigen(cov, k);

        // Row `pos` of cov^(-1/2) = V diag(1/sqrt(λ)) V^T.
        let mut weights = vec![0.0f64; k];
        for m in 0..k {
            let inv_sqrt = 1.0 / values[m].max(COV_RIDGE).sqrt();
            let vp = vectors[pos * k + m];
            for (j, w) in weights.iter_mut().enumerate() {
                *w += vp * inv_sqrt * vectors[j * k + m];
            }
        }

        for t in 0..n_samples {
            let mut acc = 0.0f64;
            for (j, &h) in hood.iter().enumerate() {
                acc += weights[j] * block[sample_index(t, h, n_chan)] as f64;
            }
            out[sample_index(t, c, n_chan)] = acc as f32;
        }
    }
    out
}

/// Marks samples where every neighborhood channel stays below the noise
/// ceiling, excluding `halfwidth` samples on either side of each excursion.
fn quiet_mask(
    block: &[f32],
    n_chan: usize,
    hood: &[usize],
    n_samples: usize,
    halfwidth: usize,
) -> Vec<bool> {
    let mut quiet = vec![true; n_samples];
    for t in 0..n_samples {
        let loud = hood
            .iter()
            .any(|&h| block[sample_index(t, h, n_chan)].abs() >= NOISE_CEILING);
        if loud {
            let lo = t.saturating_sub(halfwidth);
            let hi = (t + halfwidth + 1).min(n_samples);
            for q in &mut quiet[lo..hi] {
                *q = false;
            }
        }
    }
    quiet
}

/// Cyclic Jacobi eigendecomposition of a symmetric k×k matrix.
///
/// Returns (eigenvalues, eigenvectors) with eigenvector `m` stored as column
/// `m` of the row-major vector matrix. Neighborhoods are small (radius-bound),
/// so O(k³) sweeps are cheap.
fn symmetric_eigen(mut a: Vec<f64>, k: usize) -> (Vec<f64>, Vec<f64>) {
    let mut v = vec![0.0f64; k * k];
    for i in 0..k {
        v[i * k + i] = 1.0;
    }
    if k <= 1 {
        return (a, v);
    }

    for _ in 0..JACOBI_SWEEPS {
        let mut off = 0.0f64;
        for p in 0..k {
            for q in (p + 1)..k {
                off += a[p * k + q] * a[p * k + q];
            }
        }
        if off < JACOBI_TOL {
            break;
        }

        for p in 0..k {
            for q in (p + 1)..k {
                let apq = a[p * k + q];
                if apq.abs() < JACOBI_TOL {
                    continue;
                }
                let app = a[p * k + p];
                let aqq = a[q * k + q];
                let tau = (aqq - app) / (2.0 * apq);
                let t = if tau >= 0.0 {
                    1.0 / (tau + (1.0 + tau * tau).sqrt())
                } else {
                    -1.0 / (-tau + (1.0 + tau * tau).sqrt())
                };
                let cos = 1.0 / (1.0 + t * t).sqrt();
                let sin = t * cos;

                a[p * k + p] = cos * cos * app - 2.0 * cos * sin * apq + sin * sin * aqq;
                a[q * k + q] = sin * sin * app + 2.0 * cos * sin * apq + cos * cos * aqq;
                a[p * k + q] = 0.0;
                a[q * k + p] = 0.0;
                for r in 0..k {
                    if r != p && r != q {
                        let arp = a[r * k + p];
                        let arq = a[r * k + q];
                        let new_rp = cos * arp - sin * arq;
                        let new_rq = sin * arp + cos * arq;
                        a[r * k + p] = new_rp;
                        a[p * k + r] = new_rp;
                        a[r * k + q] = new_rq;
                        a[q * k + r] = new_rq;
                    }
                }
                for r in 0..k {
                    let vrp = v[r * k + p];
                    let vrq = v[r * k + q];
                    v[r * k + p] = cos * vrp - sin * vrq;
                    v[r * k + q] = sin * vrp + cos * vrq;
                }
            }
        }
    }

    let mut values = vec![0.0f64; k];
    for i in 0..k {
        values[i] = a[i * k + i];
    }
    (values, v)
}

//! Spatial relocation of a template across the probe.

use crate::geometry::Geometry;
use crate::stream::sample_index;

/// Horizontal site pitch of the probe, in geometry coordinate units.
pub const X_SPACING: f64 = 20.0;
/// Channels carried along when a template is relocated.
pub const SPATIAL_SIZE: usize = 10;

/// Moves a waveform's spatial footprint horizontally across the probe.
///
/// `peak_channels` is the waveform's most energetic channel subset (see
/// [`crate::kernels::template::TemplateSet::peak_channels`]). Each of those
/// channels has its site translated by `dx` coordinate units; the channel
/// found at the translated site (via the geometry's quantized inverse
/// lookup) receives that channel's samples. A translated site with no
/// matching channel is dropped, leaving its samples silent — walking off
/// the probe edge thins the footprint rather than erroring.
///
/// Channels outside `peak_channels` are zero in the result.
pub fn relocate_waveform(
    waveform: &[f32],
    window_len: usize,
    geometry: &Geometry,
    peak_channels: &[usize],
    dx: f64,
) -> Vec<f32> {
    let n_chan = geometry.n_channels();
    let mut out = vec![0.0f32; waveform.len()];

    for &origin in peak_channels {
        let (x, y) = geometry.site(origin);
        let Some(target) = geometry.channel_at(x + dx, y) else {
            continue;
        };
        for t in 0..window_len {
            out[sample_index(t, target, n_chan)] = waveform[sample_index(t, origin, n_chan)];
        }
    }
    out
}

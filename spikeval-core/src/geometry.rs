use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::EvalError;

/// Resolution of the coordinate → channel lookup. Site coordinates are
/// quantized to this grid before keying, so positions produced by arithmetic
/// (e.g. a template shifted by a multiple of the site pitch) resolve to the
/// same channel as the parsed originals.
const SITE_QUANTUM: f64 = 1e-3;

#[inline]
fn quantize(v: f64) -> i64 {
    (v / SITE_QUANTUM).round() as i64
}

/// Probe geometry: one (x, y) site per channel, plus the inverse map from
/// site coordinates back to channel indices.
///
/// Line order in the geometry file is channel order. The inverse map is only
/// well defined when all quantized sites are unique; construction rejects
/// duplicates.
#[derive(Debug, Clone)]
pub struct Geometry {
    sites: Vec<(f64, f64)>,
    by_site: HashMap<(i64, i64), usize>,
}

impl Geometry {
    /// Builds a geometry from already-parsed sites.
    pub fn from_sites(sites: Vec<(f64, f64)>) -> Result<Self, EvalError> {
        let mut by_site = HashMap::with_capacity(sites.len());
        for (channel, &(x, y)) in sites.iter().enumerate() {
            if by_site.insert((quantize(x), quantize(y)), channel).is_some() {
                return Err(EvalError::DuplicateSite { x, y });
            }
        }
        Ok(Self { sites, by_site })
    }

    /// Parses a geometry text file: one line per channel, two
    /// whitespace-separated coordinates per line. Blank lines are skipped.
    pub fn parse(reader: impl BufRead) -> Result<Self, EvalError> {
        let mut sites = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut fields = trimmed.split_whitespace();
            let x = fields.next().and_then(|f| f.parse::<f64>().ok());
            let y = fields.next().and_then(|f| f.parse::<f64>().ok());
            match (x, y, fields.next()) {
                (Some(x), Some(y), None) => sites.push((x, y)),
                _ => return Err(EvalError::MalformedGeometry { line: idx + 1 }),
            }
        }
        Self::from_sites(sites)
    }

    /// Reads and parses a geometry file from disk.
    pub fn from_path(path: &Path) -> Result<Self, EvalError> {
        Self::parse(BufReader::new(File::open(path)?))
    }

    /// Number of channels (= parsed lines).
    #[inline]
    pub fn n_channels(&self) -> usize {
        self.sites.len()
    }

    /// Site coordinates of a channel.
    #[inline]
    pub fn site(&self, channel: usize) -> (f64, f64) {
        self.sites[channel]
    }

    /// Channel whose site quantizes to (x, y), if any.
    #[inline]
    pub fn channel_at(&self, x: f64, y: f64) -> Option<usize> {
        self.by_site.get(&(quantize(x), quantize(y))).copied()
    }

    /// For each channel, the channels within `radius` (inclusive, Euclidean),
    /// the channel itself included. Neighbor lists are sorted ascending.
    pub fn neighbors(&self, radius: f64) -> Vec<Vec<usize>> {
        let r2 = radius * radius;
        let n = self.sites.len();
        let mut out = Vec::with_capacity(n);
        for c in 0..n {
            let (cx, cy) = self.sites[c];
            let mut hood = Vec::new();
            for (other, &(ox, oy)) in self.sites.iter().enumerate() {
                let dx = ox - cx;
                let dy = oy - cy;
                if dx * dx + dy * dy <= r2 {
                    hood.push(other);
                }
            }
            out.push(hood);
        }
        out
    }
}

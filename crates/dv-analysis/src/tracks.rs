use std::collections::BTreeSet;

use dv_core::Cohort;

pub const ALL_TRACKS_SEGMENT: &str = "all";

/// Normalised set of track (origin) names. Empty means unrestricted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackFilter {
    tracks: BTreeSet<String>,
}

impl TrackFilter {
    pub fn new<I, S>(tracks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tracks = tracks
            .into_iter()
            .map(|track| normalize_track(track.as_ref()))
            .filter(|track| !track.is_empty())
            .collect();
        Self { tracks }
    }

    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// An explicit caller filter wins, then the cohort's own tracks.
    pub fn resolve(explicit: Option<&[String]>, cohort: &Cohort) -> Self {
        if let Some(explicit) = explicit {
            let filter = Self::new(explicit);
            if !filter.is_unrestricted() {
                return filter;
            }
        }
        Self::new(&cohort.tracks)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.is_unrestricted() || self.tracks.contains(&normalize_track(origin))
    }

    pub fn tracks(&self) -> Vec<String> {
        self.tracks.iter().cloned().collect()
    }

    /// Stable cache key segment: `all` or the blake3 hex of the joined tracks.
    pub fn digest(&self) -> String {
        if self.is_unrestricted() {
            return ALL_TRACKS_SEGMENT.to_owned();
        }
        let joined = self.tracks().join(",");
        blake3::hash(joined.as_bytes()).to_hex().to_string()
    }
}

/// `Small_Spender`, `small spender` and `SmallSpender` name the same origin.
fn normalize_track(track: &str) -> String {
    track
        .chars()
        .filter(|ch| *ch != '_' && *ch != '-' && !ch.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

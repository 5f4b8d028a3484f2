use serde::{Deserialize, Serialize};

/// Contiguous score range mapped to a named competency tier and badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelBand {
    pub min_score: u32,
    pub max_score: u32,
    pub badge_name: String,
    pub badge_color: String,
    pub rank: u32,
    /// Raw criteria authored for the tier, grouped for display by the criteria parser.
    #[serde(default)]
    pub criteria: Vec<String>,
}

impl LevelBand {
    pub fn contains(&self, score: u32) -> bool {
        self.min_score <= score && score <= self.max_score
    }
}

/// Resolves the band holding `score`.
///
/// Bands are scanned in ascending `min_score` order and the first containing band wins. A
/// score outside every band falls back to the last band in that order, so a misconfigured
/// catalog still renders a tier. Returns `None` only when `bands` is empty.
pub fn resolve(score: u32, bands: &[LevelBand]) -> Option<&LevelBand> {
    let mut ordered: Vec<&LevelBand> = bands.iter().collect();
    ordered.sort_by_key(|band| band.min_score);

    ordered
        .iter()
        .copied()
        .find(|band| band.contains(score))
        .or_else(|| ordered.last().copied())
}

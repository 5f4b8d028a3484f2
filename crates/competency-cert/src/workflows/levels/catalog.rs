use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::resolver::{resolve, LevelBand};
use crate::workflows::criteria::{group, CriteriaGroup};

const SCORE_FLOOR: u32 = 0;
const SCORE_CEILING: u32 = 100;

/// Read-only tier configuration consumed by the resolver and the criteria views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCatalog {
    pub bands: Vec<LevelBand>,
    /// Department-specific criteria lists keyed by department id, then by band rank.
    #[serde(default)]
    pub department_criteria: BTreeMap<String, BTreeMap<u32, Vec<String>>>,
}

impl LevelCatalog {
    pub fn new(bands: Vec<LevelBand>) -> Self {
        Self {
            bands,
            department_criteria: BTreeMap::new(),
        }
    }

    /// Built-in four tier catalog covering `[0, 100]`.
    pub fn standard() -> Self {
        Self::new(vec![
            standard_band(
                0,
                25,
                "Novice",
                "#9CA3AF",
                1,
                &[
                    "Mengenal peralatan kerja dasar\n- Menyebutkan fungsi alat\n- Menerapkan K3 di bengkel",
                ],
            ),
            standard_band(
                26,
                50,
                "Apprentice",
                "#3B82F6",
                2,
                &[
                    "Melaksanakan prosedur kerja dengan bimbingan",
                    "- Membaca lembar kerja",
                    "- Menyiapkan bahan praktik",
                ],
            ),
            standard_band(
                51,
                75,
                "Skilled",
                "#10B981",
                3,
                &[
                    "1. **Pekerjaan mandiri**",
                    "2. Menyelesaikan pekerjaan sesuai standar waktu",
                    "3. Memeriksa hasil kerja sendiri",
                ],
            ),
            standard_band(
                76,
                100,
                "Expert",
                "#F59E0B",
                4,
                &[
                    "Memecahkan masalah teknis kompleks",
                    "- Membimbing rekan praktik",
                    "Mendokumentasikan prosedur kerja",
                ],
            ),
        ])
    }

    /// Parses a JSON catalog from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LevelCatalogError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| LevelCatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| LevelCatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the catalog at `path`, falling back to [`LevelCatalog::standard`] on any failure.
    pub fn load_or_standard(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::standard();
        };

        let catalog = match Self::from_path(path) {
            Ok(catalog) if !catalog.bands.is_empty() => catalog,
            Ok(_) => {
                warn!(path = %path.display(), "level catalog has no bands; using standard tiers");
                return Self::standard();
            }
            Err(err) => {
                warn!(error = %err, "level catalog unreadable; using standard tiers");
                return Self::standard();
            }
        };

        for issue in catalog.issues() {
            warn!(path = %path.display(), %issue, "level catalog issue");
        }

        catalog
    }

    pub fn resolve(&self, score: u32) -> Option<&LevelBand> {
        resolve(score, &self.bands)
    }

    pub fn band_by_rank(&self, rank: u32) -> Option<&LevelBand> {
        self.bands.iter().find(|band| band.rank == rank)
    }

    /// Criteria groups for a tier, preferring the department's own list when authored.
    pub fn criteria_groups(&self, department_id: &str, rank: u32) -> Vec<CriteriaGroup> {
        if let Some(criteria) = self
            .department_criteria
            .get(department_id)
            .and_then(|by_rank| by_rank.get(&rank))
        {
            return group(criteria);
        }

        self.band_by_rank(rank)
            .map(|band| group(&band.criteria))
            .unwrap_or_default()
    }

    /// Configuration-time findings. The resolver tolerates all of them.
    pub fn issues(&self) -> Vec<CatalogIssue> {
        let mut ordered: Vec<&LevelBand> = self.bands.iter().collect();
        ordered.sort_by_key(|band| band.min_score);

        let (Some(first), Some(last)) = (ordered.first(), ordered.last()) else {
            return vec![CatalogIssue::Empty];
        };

        let mut issues = Vec::new();

        for band in &ordered {
            if band.min_score > band.max_score {
                issues.push(CatalogIssue::InvertedRange { rank: band.rank });
            }
        }

        for pair in ordered.windows(2) {
            let (lower, upper) = (pair[0], pair[1]);
            if upper.min_score <= lower.max_score {
                issues.push(CatalogIssue::Overlap {
                    lower_rank: lower.rank,
                    upper_rank: upper.rank,
                });
            } else if upper.min_score > lower.max_score.saturating_add(1) {
                issues.push(CatalogIssue::Gap {
                    from: lower.max_score + 1,
                    to: upper.min_score - 1,
                });
            }
        }

        if first.min_score > SCORE_FLOOR {
            issues.push(CatalogIssue::Gap {
                from: SCORE_FLOOR,
                to: first.min_score - 1,
            });
        }
        let top = ordered
            .iter()
            .map(|band| band.max_score)
            .max()
            .unwrap_or(last.max_score);
        if top < SCORE_CEILING {
            issues.push(CatalogIssue::Gap {
                from: top + 1,
                to: SCORE_CEILING,
            });
        }

        issues
    }
}

impl Default for LevelCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_band(
    min_score: u32,
    max_score: u32,
    badge_name: &str,
    badge_color: &str,
    rank: u32,
    criteria: &[&str],
) -> LevelBand {
    LevelBand {
        min_score,
        max_score,
        badge_name: badge_name.to_string(),
        badge_color: badge_color.to_string(),
        rank,
        criteria: criteria.iter().map(|item| item.to_string()).collect(),
    }
}

/// Problems found while validating a catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogIssue {
    #[error("catalog defines no bands")]
    Empty,
    #[error("band rank {rank} has min_score above max_score")]
    InvertedRange { rank: u32 },
    #[error("bands rank {lower_rank} and rank {upper_rank} overlap")]
    Overlap { lower_rank: u32, upper_rank: u32 },
    #[error("scores {from}..={to} are not covered by any band")]
    Gap { from: u32, to: u32 },
}

/// Failure to read a catalog file.
#[derive(Debug, thiserror::Error)]
pub enum LevelCatalogError {
    #[error("failed to read level catalog {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid level catalog {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(min_score: u32, max_score: u32, rank: u32) -> LevelBand {
        standard_band(min_score, max_score, "Tier", "#111111", rank, &[])
    }

    #[test]
    fn standard_catalog_covers_full_score_range() {
        let catalog = LevelCatalog::standard();
        assert!(catalog.issues().is_empty(), "{:?}", catalog.issues());
        assert_eq!(catalog.resolve(0).map(|band| band.rank), Some(1));
        assert_eq!(catalog.resolve(100).map(|band| band.rank), Some(4));
    }

    #[test]
    fn issues_report_gaps_overlaps_and_inverted_ranges() {
        let catalog = LevelCatalog::new(vec![
            band(10, 30, 1),
            band(25, 40, 2),
            band(60, 55, 3),
        ]);
        let issues = catalog.issues();
        assert!(issues.contains(&CatalogIssue::Gap { from: 0, to: 9 }));
        assert!(issues.contains(&CatalogIssue::Overlap {
            lower_rank: 1,
            upper_rank: 2
        }));
        assert!(issues.contains(&CatalogIssue::InvertedRange { rank: 3 }));
        assert!(issues.contains(&CatalogIssue::Gap { from: 41, to: 59 }));
        assert!(issues.contains(&CatalogIssue::Gap { from: 56, to: 100 }));
    }

    #[test]
    fn empty_catalog_is_reported() {
        assert_eq!(LevelCatalog::new(Vec::new()).issues(), vec![CatalogIssue::Empty]);
    }

    #[test]
    fn department_override_replaces_band_criteria() {
        let mut catalog = LevelCatalog::standard();
        catalog.department_criteria.insert(
            "tkj".to_string(),
            BTreeMap::from([(
                2,
                vec![
                    "Mengkonfigurasi router".to_string(),
                    "- Static routing".to_string(),
                ],
            )]),
        );

        let overridden = catalog.criteria_groups("tkj", 2);
        assert_eq!(overridden.len(), 1);
        assert_eq!(overridden[0].main, "Mengkonfigurasi router");
        assert_eq!(overridden[0].subs, vec!["Static routing".to_string()]);

        let fallback = catalog.criteria_groups("akl", 2);
        assert_eq!(
            fallback[0].main,
            "Melaksanakan prosedur kerja dengan bimbingan"
        );
        assert_eq!(fallback[0].subs.len(), 2);

        assert!(catalog.criteria_groups("tkj", 99).is_empty());
    }

    #[test]
    fn load_or_standard_tolerates_malformed_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("levels.json");
        fs::write(&path, "{ not json").expect("write catalog");

        assert!(matches!(
            LevelCatalog::from_path(&path),
            Err(LevelCatalogError::Parse { .. })
        ));
        assert_eq!(
            LevelCatalog::load_or_standard(Some(path.as_path())),
            LevelCatalog::standard()
        );
        assert_eq!(
            LevelCatalog::load_or_standard(Some(dir.path().join("missing.json").as_path())),
            LevelCatalog::standard()
        );
    }

    #[test]
    fn load_or_standard_reads_valid_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("levels.json");
        let catalog = LevelCatalog::new(vec![band(0, 49, 1), band(50, 100, 2)]);
        fs::write(&path, serde_json::to_string(&catalog).expect("serialize"))
            .expect("write catalog");

        let loaded = LevelCatalog::load_or_standard(Some(path.as_path()));
        assert_eq!(loaded, catalog);
        assert_eq!(loaded.resolve(50).map(|band| band.rank), Some(2));
    }
}

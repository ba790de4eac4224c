//! Variant keys
//!
//! Every output request maps to one [`VariantKey`]: whether the equalizer
//! branch is applied, and how the loudness-matched signal is finished.
//! Requests that share a key share one computed buffer.

use std::collections::BTreeSet;
use std::fmt;

use crate::config::OutputRequest;
use crate::error::{MatchError, Result};

/// Whether the spectral correction is part of the branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EqMode {
    Applied,
    Bypassed,
}

impl EqMode {
    pub(crate) fn index(self) -> usize {
        match self {
            EqMode::Applied => 0,
            EqMode::Bypassed => 1,
        }
    }
}

/// Terminal treatment of a loudness-matched branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Finish {
    /// Lookahead brickwall limiter
    Limited,
    /// Loudness-matched signal as it is
    AsIs,
    /// Peak-normalized to the threshold
    Normalized,
}

/// Identifies one distinct result buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantKey {
    pub eq: EqMode,
    pub finish: Finish,
}

/// Stages a branch passes through on its way to a finished buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchStage {
    Loaded,
    SpectrallyMatched,
    EqBypassed,
    LoudnessMatched,
    Limited,
    AsIs,
    Normalized,
    Finalized,
}

impl fmt::Display for BranchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BranchStage::Loaded => "loaded",
            BranchStage::SpectrallyMatched => "spectrally-matched",
            BranchStage::EqBypassed => "eq-bypassed",
            BranchStage::LoudnessMatched => "loudness-matched",
            BranchStage::Limited => "limited",
            BranchStage::AsIs => "as-is",
            BranchStage::Normalized => "normalized",
            BranchStage::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

impl VariantKey {
    pub const fn new(eq: EqMode, finish: Finish) -> Self {
        Self { eq, finish }
    }

    /// Key serving an output request
    ///
    /// The limiter takes precedence over normalization.
    pub fn for_request(request: &OutputRequest) -> Self {
        let eq = if request.no_eq {
            EqMode::Bypassed
        } else {
            EqMode::Applied
        };
        let finish = if request.use_limiter {
            Finish::Limited
        } else if request.normalize {
            Finish::Normalized
        } else {
            Finish::AsIs
        };
        Self { eq, finish }
    }

    /// Path through the processing stages for this key
    pub fn stages(&self) -> Vec<BranchStage> {
        let mut stages = vec![BranchStage::Loaded];
        stages.push(match self.eq {
            EqMode::Applied => BranchStage::SpectrallyMatched,
            EqMode::Bypassed => BranchStage::EqBypassed,
        });
        stages.push(BranchStage::LoudnessMatched);
        match self.finish {
            Finish::Limited => stages.push(BranchStage::Limited),
            Finish::AsIs => stages.push(BranchStage::AsIs),
            Finish::Normalized => {
                stages.push(BranchStage::AsIs);
                stages.push(BranchStage::Normalized);
            }
        }
        stages.push(BranchStage::Finalized);
        stages
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self.stages().iter().map(ToString::to_string).collect();
        f.write_str(&path.join(" -> "))
    }
}

/// Distinct variants needed to serve a set of requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedVariants {
    keys: BTreeSet<VariantKey>,
}

impl RequestedVariants {
    /// Collect the variants behind a list of output requests
    ///
    /// # Errors
    /// `EmptyRequest` when there are no requests
    pub fn from_requests(requests: &[OutputRequest]) -> Result<Self> {
        Self::from_keys(requests.iter().map(VariantKey::for_request))
    }

    /// Collect an explicit set of keys
    ///
    /// # Errors
    /// `EmptyRequest` when the set is empty
    pub fn from_keys(keys: impl IntoIterator<Item = VariantKey>) -> Result<Self> {
        let keys: BTreeSet<VariantKey> = keys.into_iter().collect();
        if keys.is_empty() {
            return Err(MatchError::EmptyRequest);
        }
        Ok(Self { keys })
    }

    /// Keys in a fixed order: EQ applied first, then limited, as-is, normalized
    pub fn keys(&self) -> impl Iterator<Item = VariantKey> + '_ {
        self.keys.iter().copied()
    }

    pub fn contains(&self, key: VariantKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn any_finish(&self, finish: Finish) -> bool {
        self.keys.iter().any(|k| k.finish == finish)
    }

    /// Some request wants the limited master
    pub fn need_default(&self) -> bool {
        self.any_finish(Finish::Limited)
    }

    /// Some request wants the loudness-matched signal without the limiter
    pub fn need_no_limiter(&self) -> bool {
        self.any_finish(Finish::AsIs)
    }

    /// Some request wants the unlimited signal peak-normalized
    pub fn need_no_limiter_normalized(&self) -> bool {
        self.any_finish(Finish::Normalized)
    }

    /// Some request bypasses the spectral correction
    pub fn need_no_equalizer(&self) -> bool {
        self.keys.iter().any(|k| k.eq == EqMode::Bypassed)
    }

    /// Some request needs the spectral correction
    pub fn need_equalizer(&self) -> bool {
        self.keys.iter().any(|k| k.eq == EqMode::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_for_request() {
        let limited = OutputRequest::pcm16("a.wav");
        assert_eq!(
            VariantKey::for_request(&limited),
            VariantKey::new(EqMode::Applied, Finish::Limited)
        );

        let normalized = OutputRequest::pcm24("b.wav").with_limiter(false);
        assert_eq!(VariantKey::for_request(&normalized).finish, Finish::Normalized);

        let raw = OutputRequest::float32("c.wav")
            .with_limiter(false)
            .with_normalize(false)
            .with_no_eq(true);
        assert_eq!(
            VariantKey::for_request(&raw),
            VariantKey::new(EqMode::Bypassed, Finish::AsIs)
        );

        // The limiter wins over normalization
        let both = OutputRequest::pcm16("d.wav").with_normalize(true);
        assert_eq!(VariantKey::for_request(&both).finish, Finish::Limited);
    }

    #[test]
    fn test_requests_share_keys() {
        let requests = vec![
            OutputRequest::pcm16("a.wav"),
            OutputRequest::pcm24("b.wav"),
            OutputRequest::float32("c.wav").with_limiter(false),
        ];
        let variants = RequestedVariants::from_requests(&requests).unwrap();
        assert_eq!(variants.len(), 2);
        assert!(variants.need_default());
        assert!(variants.need_no_limiter_normalized());
        assert!(!variants.need_no_limiter());
        assert!(!variants.need_no_equalizer());
        assert!(variants.need_equalizer());
    }

    #[test]
    fn test_empty_request() {
        let err = RequestedVariants::from_requests(&[]).unwrap_err();
        assert!(matches!(err, MatchError::EmptyRequest));
    }

    #[test]
    fn test_key_order() {
        let variants = RequestedVariants::from_keys([
            VariantKey::new(EqMode::Bypassed, Finish::Limited),
            VariantKey::new(EqMode::Applied, Finish::Normalized),
            VariantKey::new(EqMode::Applied, Finish::AsIs),
        ])
        .unwrap();
        let keys: Vec<VariantKey> = variants.keys().collect();
        assert_eq!(keys[0], VariantKey::new(EqMode::Applied, Finish::AsIs));
        assert_eq!(keys[2].eq, EqMode::Bypassed);
    }

    #[test]
    fn test_stage_paths() {
        let normalized = VariantKey::new(EqMode::Bypassed, Finish::Normalized);
        assert_eq!(
            normalized.stages(),
            vec![
                BranchStage::Loaded,
                BranchStage::EqBypassed,
                BranchStage::LoudnessMatched,
                BranchStage::AsIs,
                BranchStage::Normalized,
                BranchStage::Finalized,
            ]
        );
        assert_eq!(
            VariantKey::new(EqMode::Applied, Finish::Limited).to_string(),
            "loaded -> spectrally-matched -> loudness-matched -> limited -> finalized"
        );
    }
}

//! Variant assembly
//!
//! Builds every requested variant from one target, computing each shared
//! intermediate at most once. The spectral correction and the loudness
//! match per EQ mode are memoized in `OnceLock` slots; distinct variant
//! keys are finished on their own threads and meet in those slots.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use crate::config::Config;
use crate::dsp::limiter::Limiter;
use crate::dsp::loudness::LoudnessMatcher;
use crate::dsp::normalize::normalize_peak;
use crate::dsp::spectral::{CorrectionFilters, SpectralMatcher};
use crate::engine::buffer::{linear_to_db, AudioBuffer};
use crate::pipeline::reference::ReferenceProfile;
use crate::pipeline::variants::{EqMode, Finish, RequestedVariants, VariantKey};

/// Buffers produced for a set of requested variants
#[derive(Debug, Clone)]
pub struct AssembledVariants {
    buffers: BTreeMap<VariantKey, Arc<AudioBuffer>>,
    filters: Option<CorrectionFilters>,
    loudness_gains: BTreeMap<EqMode, f32>,
}

impl AssembledVariants {
    pub fn get(&self, key: VariantKey) -> Option<&Arc<AudioBuffer>> {
        self.buffers.get(&key)
    }

    /// Variants in key order
    pub fn iter(&self) -> impl Iterator<Item = (VariantKey, &Arc<AudioBuffer>)> {
        self.buffers.iter().map(|(k, b)| (*k, b))
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Correction filters, when the EQ branch ran
    pub fn filters(&self) -> Option<&CorrectionFilters> {
        self.filters.as_ref()
    }

    /// Linear loudness gain applied on a branch, when it ran
    pub fn loudness_gain(&self, eq: EqMode) -> Option<f32> {
        self.loudness_gains.get(&eq).copied()
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        BTreeMap<VariantKey, Arc<AudioBuffer>>,
        Option<CorrectionFilters>,
        BTreeMap<EqMode, f32>,
    ) {
        (self.buffers, self.filters, self.loudness_gains)
    }
}

/// Computes requested variants with shared intermediates
pub struct VariantAssembler<'a> {
    config: &'a Config,
    target: &'a AudioBuffer,
    reference: &'a ReferenceProfile,
    corrected: OnceLock<(AudioBuffer, CorrectionFilters)>,
    matched: [OnceLock<(Arc<AudioBuffer>, f32)>; 2],
}

impl<'a> VariantAssembler<'a> {
    pub fn new(config: &'a Config, target: &'a AudioBuffer, reference: &'a ReferenceProfile) -> Self {
        Self {
            config,
            target,
            reference,
            corrected: OnceLock::new(),
            matched: [OnceLock::new(), OnceLock::new()],
        }
    }

    /// Produce one buffer per requested key
    pub fn assemble(self, variants: &RequestedVariants) -> AssembledVariants {
        let keys: Vec<VariantKey> = variants.keys().collect();
        debug!(
            "Assembling {} variant(s) (equalized: {}, bypassed: {})",
            keys.len(),
            variants.need_equalizer(),
            variants.need_no_equalizer()
        );

        let buffers: BTreeMap<VariantKey, Arc<AudioBuffer>> = if keys.len() == 1 {
            keys.iter().map(|&key| (key, self.finish(key))).collect()
        } else {
            let this = &self;
            std::thread::scope(|scope| {
                let handles: Vec<_> = keys
                    .iter()
                    .map(|&key| (key, scope.spawn(move || this.finish(key))))
                    .collect();
                handles
                    .into_iter()
                    .map(|(key, handle)| {
                        let buffer = handle
                            .join()
                            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
                        (key, buffer)
                    })
                    .collect()
            })
        };

        let filters = self.corrected.into_inner().map(|(_, filters)| filters);
        let loudness_gains = [EqMode::Applied, EqMode::Bypassed]
            .into_iter()
            .zip(self.matched)
            .filter_map(|(eq, slot)| slot.into_inner().map(|(_, gain)| (eq, gain)))
            .collect();

        AssembledVariants {
            buffers,
            filters,
            loudness_gains,
        }
    }

    fn spectrally_matched(&self) -> &AudioBuffer {
        let (corrected, _) = self.corrected.get_or_init(|| {
            let matcher = SpectralMatcher::new(self.config);
            let (corrected, filters) = matcher.match_to(
                self.target,
                &self.reference.spectrum,
                self.reference.level_rms,
            );
            info!(
                "Spectral correction applied ({} taps, up to {:.1} dB)",
                filters.mid.len(),
                filters.max_deviation_db()
            );
            (corrected, filters)
        });
        corrected
    }

    fn loudness_matched(&self, eq: EqMode) -> &Arc<AudioBuffer> {
        let (matched, _) = self.matched[eq.index()].get_or_init(|| {
            let source = match eq {
                EqMode::Applied => self.spectrally_matched(),
                EqMode::Bypassed => self.target,
            };
            let (matched, gain) =
                LoudnessMatcher::new(self.config).apply(source, self.reference.match_rms);
            info!(
                "Loudness matched ({:?} EQ): gain {:+.2} dB",
                eq,
                linear_to_db(gain)
            );
            (Arc::new(matched), gain)
        });
        matched
    }

    fn finish(&self, key: VariantKey) -> Arc<AudioBuffer> {
        debug!("Variant {}", key);
        let matched = self.loudness_matched(key.eq);
        match key.finish {
            Finish::AsIs => Arc::clone(matched),
            Finish::Limited => {
                let mut limiter = Limiter::new(&self.config.limiter, matched.sample_rate());
                Arc::new(limiter.process(matched))
            }
            Finish::Normalized => {
                let (normalized, gain) =
                    normalize_peak(matched, self.config.threshold, self.config.min_value);
                debug!("Normalized by {:+.2} dB", linear_to_db(gain));
                Arc::new(normalized)
            }
        }
    }
}

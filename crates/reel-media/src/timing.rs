//! Allocation of display time across images.
//!
//! Every image gets the same nominal share `P = D / N` of the total duration.
//! When neighbouring images cross-fade by `T` seconds, each image after the
//! first is rendered `T` seconds longer so that the blended timeline still
//! ends exactly at `D`:
//!
//! ```text
//! rendered = Σ render_duration - (N - 1) * T
//!          = (D + (N - 1) * T) - (N - 1) * T
//!          = D
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Display window for one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingEntry {
    pub image_index: usize,
    /// Where the image's nominal window starts on the final timeline
    pub start_offset: f64,
    /// Nominal share of the timeline
    pub duration: f64,
    /// Length of the rendered segment, including any transition overlap
    pub render_duration: f64,
}

/// Display windows for every image, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingPlan {
    pub total_duration: f64,
    pub per_image_duration: f64,
    /// Transition overlap between neighbours (0 for hard cuts)
    pub overlap: f64,
    pub entries: Vec<TimingEntry>,
}

/// Clamp a requested transition so no image is entirely consumed by fades.
pub fn effective_transition(per_image_duration: f64, requested: f64) -> f64 {
    if !requested.is_finite() || requested <= 0.0 || per_image_duration <= 0.0 {
        return 0.0;
    }
    requested.min(per_image_duration / 2.0)
}

impl TimingPlan {
    /// Split `total_duration` equally across `image_count` images.
    ///
    /// `overlap` is clamped with [`effective_transition`].
    pub fn allocate(total_duration: f64, image_count: usize, overlap: f64) -> MediaResult<Self> {
        if image_count == 0 {
            return Err(MediaError::invalid_input("cannot allocate time to zero images"));
        }
        if !total_duration.is_finite() || total_duration <= 0.0 {
            return Err(MediaError::invalid_input(format!(
                "total duration must be positive, got {}",
                total_duration
            )));
        }

        let per_image = total_duration / image_count as f64;
        let overlap = if image_count > 1 {
            effective_transition(per_image, overlap)
        } else {
            0.0
        };

        let last = image_count - 1;
        let entries = (0..image_count)
            .map(|i| {
                // The last window absorbs rounding so the windows sum to the total.
                let duration = if i == last {
                    total_duration - last as f64 * per_image
                } else {
                    per_image
                };
                TimingEntry {
                    image_index: i,
                    start_offset: i as f64 * per_image,
                    duration,
                    render_duration: if i == 0 { duration } else { duration + overlap },
                }
            })
            .collect();

        Ok(Self {
            total_duration,
            per_image_duration: per_image,
            overlap,
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of nominal windows. Equals `total_duration` up to rounding.
    pub fn nominal_total(&self) -> f64 {
        self.entries.iter().map(|e| e.duration).sum()
    }

    /// Length of the timeline once rendered segments are overlapped.
    pub fn rendered_total(&self) -> f64 {
        let rendered: f64 = self.entries.iter().map(|e| e.render_duration).sum();
        rendered - self.overlap * self.entries.len().saturating_sub(1) as f64
    }

    /// Offsets at which each cross-fade starts, one per neighbouring pair.
    ///
    /// The fade into image `i` starts `T` seconds before its nominal window.
    pub fn transition_offsets(&self) -> Vec<f64> {
        self.entries
            .iter()
            .skip(1)
            .map(|e| (e.start_offset - self.overlap).max(0.0))
            .collect()
    }
}

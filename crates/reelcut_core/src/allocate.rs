use tracing::debug;

use crate::error::{CoreError, Result};
use crate::types::{MediaItem, MediaKind, Timeline, DURATION_EPSILON};

/// Every still gets at least this much screen time before capping.
pub const MIN_STILL_SECONDS: f64 = 1.0;

/// Duration a clip falls back to when probing reported nothing usable.
pub const CLIP_FALLBACK_SECONDS: f64 = 1.0;

/// Allocate screen time to each item so the total never exceeds `target`.
///
/// Fixed items (loops and clips) are placed first, in manifest order, each
/// trimmed to whatever budget is left. Once that budget is exhausted the rest
/// of the manifest is dropped, stills included. Stills then share the
/// leftover time evenly with a one-second floor, capped by the cumulative
/// running time so the total cannot pass `target`.
pub fn allocate(items: Vec<MediaItem>, target: f64) -> Result<Timeline> {
    if items.is_empty() {
        return Err(CoreError::EmptyInput);
    }
    if target <= 0.0 {
        return Err(CoreError::ZeroAudioDuration(target));
    }

    let total_items = items.len();
    let (mut retained, used) = place_fixed(items, target);
    debug!(
        target,
        used,
        retained = retained.len(),
        dropped = total_items - retained.len(),
        "placed fixed-duration items"
    );

    distribute_stills(&mut retained, target, used);
    retained.retain(|item| item.duration() > DURATION_EPSILON);

    if retained.is_empty() {
        return Err(CoreError::NoClipsProduced);
    }

    for item in &retained {
        debug!(
            kind = %item.kind,
            name = %item.name,
            duration = item.duration(),
            "allocated"
        );
    }

    Ok(Timeline {
        target,
        items: retained,
    })
}

/// First pass: trim loops and clips to the remaining budget, keep stills open.
fn place_fixed(items: Vec<MediaItem>, target: f64) -> (Vec<MediaItem>, f64) {
    let mut used = 0.0;
    let mut retained = Vec::with_capacity(items.len());

    for mut item in items {
        if used >= target - DURATION_EPSILON {
            break;
        }

        match item.kind {
            MediaKind::Still => {
                item.allocated_duration = None;
                retained.push(item);
            }
            MediaKind::Loop | MediaKind::Clip => {
                let dur = source_duration(&item).min(target - used);
                if dur > DURATION_EPSILON {
                    item.allocated_duration = Some(dur);
                    used += dur;
                    retained.push(item);
                }
            }
        }
    }

    (retained, used)
}

/// Second pass: share what is left between the stills.
fn distribute_stills(items: &mut [MediaItem], target: f64, used: f64) {
    let remaining = (target - used).max(0.0);
    let still_count = items.iter().filter(|i| i.kind == MediaKind::Still).count();
    let per_still = if still_count > 0 {
        (remaining / still_count as f64).max(MIN_STILL_SECONDS)
    } else {
        0.0
    };
    debug!(remaining, still_count, per_still, "distributing stills");

    let mut elapsed = 0.0;
    for item in items.iter_mut() {
        let budget = (target - elapsed).max(0.0);
        // A fixed item can only shrink here when earlier stills took their
        // one-second floor out of its share.
        let dur = match item.kind {
            MediaKind::Still => per_still.min(budget),
            MediaKind::Loop | MediaKind::Clip => item.duration().min(budget),
        };
        item.allocated_duration = Some(dur);
        elapsed += dur;
    }
}

fn source_duration(item: &MediaItem) -> f64 {
    let raw = item.probed_duration.unwrap_or(0.0).max(0.0);
    match item.kind {
        MediaKind::Clip if raw <= 0.0 => CLIP_FALLBACK_SECONDS,
        _ => raw,
    }
}

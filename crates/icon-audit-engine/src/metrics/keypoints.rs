//! Rotation-invariant binary-descriptor keypoint matching on binary masks.
//!
//! FAST-9 corners with non-maximum suppression, orientation from the intensity
//! centroid, steered 256-bit binary descriptors, and brute-force 2-NN Hamming
//! matching filtered by Lowe's ratio test.

use icon_audit_types::MetricFailure;

use crate::pipeline::preprocess::BinaryMask;

const FAST_THRESHOLD: i32 = 20;
const FAST_ARC: usize = 9;
const BORDER: usize = 16;
const MAX_KEYPOINTS: usize = 500;
const CENTROID_RADIUS: isize = 7;
const PATTERN_RADIUS: f64 = 9.0;
const DESCRIPTOR_BITS: usize = 256;
const RATIO: f64 = 0.75;

/// Bresenham circle of radius 3 in clockwise order.
const CIRCLE: [(isize, isize); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

struct Keypoint {
    x: usize,
    y: usize,
    score: i32,
}

type Descriptor = [u8; DESCRIPTOR_BITS / 8];

#[inline]
fn pixel(mask: &BinaryMask, x: usize, y: usize) -> i32 {
    mask.pixels[y * mask.width + x] as i32
}

fn fast_score(mask: &BinaryMask, x: usize, y: usize) -> i32 {
    let center = pixel(mask, x, y);
    CIRCLE
        .iter()
        .map(|&(dx, dy)| {
            let v = pixel(mask, (x as isize + dx) as usize, (y as isize + dy) as usize);
            ((v - center).abs() - FAST_THRESHOLD).max(0)
        })
        .sum()
}

fn is_fast_corner(mask: &BinaryMask, x: usize, y: usize) -> bool {
    let center = pixel(mask, x, y);
    let mut states = [0i8; 32];
    for (i, &(dx, dy)) in CIRCLE.iter().enumerate() {
        let v = pixel(mask, (x as isize + dx) as usize, (y as isize + dy) as usize);
        let state = if v > center + FAST_THRESHOLD {
            1
        } else if v < center - FAST_THRESHOLD {
            -1
        } else {
            0
        };
        states[i] = state;
        states[i + 16] = state;
    }
    let mut run = 0usize;
    let mut last = 0i8;
    for &state in &states {
        if state != 0 && state == last {
            run += 1;
            if run >= FAST_ARC {
                return true;
            }
        } else {
            run = usize::from(state != 0);
            last = state;
        }
    }
    false
}

fn detect_keypoints(mask: &BinaryMask) -> Vec<Keypoint> {
    if mask.width <= 2 * BORDER || mask.height <= 2 * BORDER {
        return Vec::new();
    }
    let mut scores = vec![0i32; mask.len()];
    for y in BORDER..mask.height - BORDER {
        for x in BORDER..mask.width - BORDER {
            if is_fast_corner(mask, x, y) {
                scores[y * mask.width + x] = fast_score(mask, x, y);
            }
        }
    }

    let mut keypoints = Vec::new();
    for y in BORDER..mask.height - BORDER {
        for x in BORDER..mask.width - BORDER {
            let score = scores[y * mask.width + x];
            if score == 0 {
                continue;
            }
            let mut is_maximum = true;
            'neighbors: for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let ni = (y as isize + dy) as usize * mask.width + (x as isize + dx) as usize;
                    if scores[ni] > score {
                        is_maximum = false;
                        break 'neighbors;
                    }
                }
            }
            if is_maximum {
                keypoints.push(Keypoint { x, y, score });
            }
        }
    }

    keypoints.sort_by(|a, b| b.score.cmp(&a.score));
    keypoints.truncate(MAX_KEYPOINTS);
    keypoints
}

/// Patch orientation from the intensity centroid.
fn orientation(mask: &BinaryMask, kp: &Keypoint) -> (f64, f64) {
    let mut m10 = 0.0f64;
    let mut m01 = 0.0f64;
    for dy in -CENTROID_RADIUS..=CENTROID_RADIUS {
        for dx in -CENTROID_RADIUS..=CENTROID_RADIUS {
            if dx * dx + dy * dy > CENTROID_RADIUS * CENTROID_RADIUS {
                continue;
            }
            let v = pixel(
                mask,
                (kp.x as isize + dx) as usize,
                (kp.y as isize + dy) as usize,
            ) as f64;
            m10 += dx as f64 * v;
            m01 += dy as f64 * v;
        }
    }
    let angle = m01.atan2(m10);
    (angle.cos(), angle.sin())
}

/// Deterministic descriptor sampling pattern: point pairs inside a disc of
/// radius `PATTERN_RADIUS`, drawn from a fixed-seed generator.
fn sampling_pattern() -> Vec<((f64, f64), (f64, f64))> {
    let mut state: u64 = 0x1234_5678_9ABC_DEF1;
    let mut draw = move || {
        loop {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let x = ((state >> 40) as f64 / (1u64 << 24) as f64) * 2.0 - 1.0;
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let y = ((state >> 40) as f64 / (1u64 << 24) as f64) * 2.0 - 1.0;
            if x * x + y * y <= 1.0 {
                return (x * PATTERN_RADIUS, y * PATTERN_RADIUS);
            }
        }
    };
    (0..DESCRIPTOR_BITS).map(|_| (draw(), draw())).collect()
}

fn describe(
    mask: &BinaryMask,
    kp: &Keypoint,
    pattern: &[((f64, f64), (f64, f64))],
) -> Descriptor {
    let (cos, sin) = orientation(mask, kp);
    let sample = |point: (f64, f64)| -> i32 {
        let rx = point.0 * cos - point.1 * sin;
        let ry = point.0 * sin + point.1 * cos;
        let x = (kp.x as f64 + rx).round() as isize;
        let y = (kp.y as f64 + ry).round() as isize;
        let x = x.clamp(0, mask.width as isize - 1) as usize;
        let y = y.clamp(0, mask.height as isize - 1) as usize;
        pixel(mask, x, y)
    };
    let mut descriptor = [0u8; DESCRIPTOR_BITS / 8];
    for (bit, &(p, q)) in pattern.iter().enumerate() {
        if sample(p) < sample(q) {
            descriptor[bit / 8] |= 1 << (bit % 8);
        }
    }
    descriptor
}

fn extract_descriptors(mask: &BinaryMask, pattern: &[((f64, f64), (f64, f64))]) -> Vec<Descriptor> {
    detect_keypoints(mask)
        .iter()
        .map(|kp| describe(mask, kp, pattern))
        .collect()
}

#[inline]
fn hamming(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x ^ y).count_ones())
        .sum()
}

/// Detects keypoints on both masks, matches anchor descriptors against query
/// descriptors with 2-NN Hamming search, and keeps a match only when its best
/// distance is strictly below `RATIO` times the second best.
///
/// Returns the retained match count (0 when anything prevents matching) and
/// the mean Hamming distance among retained matches, or the failure that left
/// it undefined.
pub fn descriptor_matches(
    anchor: &BinaryMask,
    query: &BinaryMask,
) -> (u32, Result<f64, MetricFailure>) {
    let pattern = sampling_pattern();
    let anchor_desc = extract_descriptors(anchor, &pattern);
    let query_desc = extract_descriptors(query, &pattern);
    if anchor_desc.is_empty() || query_desc.is_empty() {
        return (0, Err(MetricFailure::NoDescriptors));
    }
    if query_desc.len() < 2 {
        // 2-NN search needs two candidates on the query side.
        return (0, Err(MetricFailure::NoMatches));
    }

    let mut retained = Vec::new();
    for desc in &anchor_desc {
        let mut best = u32::MAX;
        let mut second = u32::MAX;
        for candidate in &query_desc {
            let dist = hamming(desc, candidate);
            if dist < best {
                second = best;
                best = dist;
            } else if dist < second {
                second = dist;
            }
        }
        if (best as f64) < RATIO * second as f64 {
            retained.push(best);
        }
    }

    if retained.is_empty() {
        return (0, Err(MetricFailure::NoMatches));
    }
    let count = retained.len() as u32;
    let mean = retained.iter().map(|&d| d as f64).sum::<f64>() / count as f64;
    (count, Ok(mean))
}

//! End-to-end recovery of planted particles from a synthetic micrograph.

use crosspick::{BankConfig, BestMatchMaps, ImageView, Picker, SearchMode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

const IMG_W: usize = 96;
const IMG_H: usize = 80;
const TPL_W: usize = 21;
const TPL_H: usize = 21;

/// Smooth asymmetric blob so the best angle is well defined.
fn make_template() -> Vec<f32> {
    let mut data = vec![0.0f32; TPL_W * TPL_H];
    let cx = (TPL_W as f32 - 1.0) * 0.5;
    let cy = (TPL_H as f32 - 1.0) * 0.5;
    for y in 0..TPL_H {
        for x in 0..TPL_W {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            // Two offset lobes of opposite sign break rotational symmetry.
            let lobe_a = (-((dx - 3.0).powi(2) + dy.powi(2)) / 8.0).exp();
            let lobe_b = (-((dx + 2.0).powi(2) + (dy - 3.0).powi(2)) / 12.0).exp();
            data[y * TPL_W + x] = 2.0 * lobe_a - 1.5 * lobe_b;
        }
    }
    data
}

fn plant(image: &mut [f32], pattern: &[f32], center_x: usize, center_y: usize, gain: f32) {
    let cx = TPL_W / 2;
    let cy = TPL_H / 2;
    for v in 0..TPL_H {
        for u in 0..TPL_W {
            let ix = center_x + u - cx;
            let iy = center_y + v - cy;
            image[iy * IMG_W + ix] += gain * pattern[v * TPL_W + u];
        }
    }
}

#[test]
fn picker_recovers_location_and_rotation_of_a_planted_particle() {
    let mut rng = StdRng::seed_from_u64(2024);
    let template = make_template();

    let step = TAU / 12.0; // 30 degree sampling
    let planted_angle = 2.0 * step;
    let (plant_x, plant_y) = (35usize, 46usize);

    let tpl_view = ImageView::from_slice(&template, TPL_W, TPL_H).unwrap();
    let rotated = crosspick::template::rotate::rotate_f32_bilinear(tpl_view, planted_angle, 0.0);

    let mut image: Vec<f32> = (0..IMG_W * IMG_H)
        .map(|_| rng.random_range(-0.1f32..0.1))
        .collect();
    plant(&mut image, rotated.data(), plant_x, plant_y, 3.0);

    let mut picker = Picker::new();
    let cfg = BankConfig {
        support_radius: 7.0,
        ..BankConfig::default()
    };
    picker
        .initialize(&template, TPL_W, TPL_H, 1, None, &cfg, IMG_W, IMG_H)
        .unwrap();
    let view = ImageView::from_slice(&image, IMG_W, IMG_H).unwrap();
    picker.set_image(view, None).unwrap();

    let mut maps = BestMatchMaps::with_sentinels(IMG_W, IMG_H).unwrap();
    picker
        .perform_correlation(SearchMode::FullCircle, step, &mut maps)
        .unwrap();

    let (peak_idx, &peak_score) = maps
        .score()
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .unwrap();
    let (peak_x, peak_y) = (peak_idx % IMG_W, peak_idx / IMG_W);
    assert!(
        peak_x.abs_diff(plant_x) <= 1 && peak_y.abs_diff(plant_y) <= 1,
        "peak at ({peak_x}, {peak_y}), planted at ({plant_x}, {plant_y})"
    );
    assert!(peak_score > 0.7, "peak score {peak_score} too weak");
    assert_eq!(maps.ref_index()[peak_idx], 0);
    assert!(
        (maps.angle()[peak_idx] - planted_angle).abs() < 1e-6,
        "best angle {} should be the planted grid angle {planted_angle}",
        maps.angle()[peak_idx]
    );
}

#[test]
fn best_reference_distinguishes_two_planted_species() {
    let mut rng = StdRng::seed_from_u64(99);
    let blob = make_template();
    // Second species: the same blob mirrored, a genuinely different pattern.
    let mut mirrored = vec![0.0f32; TPL_W * TPL_H];
    for y in 0..TPL_H {
        for x in 0..TPL_W {
            mirrored[y * TPL_W + x] = blob[y * TPL_W + (TPL_W - 1 - x)];
        }
    }

    let mut batch = Vec::with_capacity(2 * TPL_W * TPL_H);
    batch.extend_from_slice(&blob);
    batch.extend_from_slice(&mirrored);

    let mut image: Vec<f32> = (0..IMG_W * IMG_H)
        .map(|_| rng.random_range(-0.1f32..0.1))
        .collect();
    let (a_x, a_y) = (25usize, 24usize);
    let (b_x, b_y) = (68usize, 55usize);
    plant(&mut image, &blob, a_x, a_y, 3.0);
    plant(&mut image, &mirrored, b_x, b_y, 3.0);

    let mut picker = Picker::new();
    let cfg = BankConfig {
        support_radius: 7.0,
        ..BankConfig::default()
    };
    picker
        .initialize(&batch, TPL_W, TPL_H, 2, None, &cfg, IMG_W, IMG_H)
        .unwrap();
    let view = ImageView::from_slice(&image, IMG_W, IMG_H).unwrap();
    picker.set_image(view, None).unwrap();

    let mut maps = BestMatchMaps::with_sentinels(IMG_W, IMG_H).unwrap();
    picker
        .perform_correlation(SearchMode::FullCircle, TAU / 8.0, &mut maps)
        .unwrap();

    assert_eq!(maps.ref_index()[a_y * IMG_W + a_x], 0);
    assert_eq!(maps.ref_index()[b_y * IMG_W + b_x], 1);
    assert!(maps.score()[a_y * IMG_W + a_x] > 0.7);
    assert!(maps.score()[b_y * IMG_W + b_x] > 0.7);
}

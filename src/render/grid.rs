//! Per-sentence sample grid.
//!
//! ```text
//! +------+------------------------------+   128-row white caption band
//! | pad  | lr_0 | lr_1 | ...  | lr_7    |   Stage-I row
//! | pad  | hr_0 | hr_1 | ...  | hr_7    |   Stage-II row
//! +------+------------------------------+   64-row black band (> 8 samples)
//! | pad  | lr_8 | ...                   |
//! | pad  | hr_8 | ...                   |
//! ```

use image::{imageops, Rgb, RgbImage};

/// Samples per row group.
pub const SAMPLES_PER_GROUP: usize = 8;
/// Height of the white band holding the caption.
pub const CAPTION_BAND: u32 = 128;
/// Height of the black band between row groups.
pub const GROUP_GAP: u32 = 64;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Assemble the grid for one sentence.
///
/// `low_res` must already be resized to `tile x tile`; both slices hold one
/// image per sample, in generation order.
pub fn compose_grid(low_res: &[RgbImage], high_res: &[RgbImage], tile: u32) -> RgbImage {
    let samples = low_res.len().min(high_res.len());
    let head = samples.min(SAMPLES_PER_GROUP);
    let first = compose_group(&low_res[..head], &high_res[..head], tile);

    let body = if samples > SAMPLES_PER_GROUP {
        let second = compose_group(
            &low_res[SAMPLES_PER_GROUP..samples],
            &high_res[SAMPLES_PER_GROUP..samples],
            tile,
        );
        // Second group sits left-aligned on a black canvas the size of the first.
        let mut padded = RgbImage::from_pixel(first.width(), first.height(), BLACK);
        imageops::replace(&mut padded, &second, 0, 0);

        let mut body = RgbImage::from_pixel(first.width(), first.height() * 2 + GROUP_GAP, BLACK);
        imageops::replace(&mut body, &first, 0, 0);
        imageops::replace(&mut body, &padded, 0, i64::from(first.height() + GROUP_GAP));
        body
    } else {
        first
    };

    let mut grid = RgbImage::from_pixel(body.width(), body.height() + CAPTION_BAND, WHITE);
    imageops::replace(&mut grid, &body, 0, i64::from(CAPTION_BAND));
    grid
}

/// Two rows (Stage-I over Stage-II), each led by a white padding tile.
fn compose_group(low_res: &[RgbImage], high_res: &[RgbImage], tile: u32) -> RgbImage {
    let columns = low_res.len() as u32 + 1;
    let mut group = RgbImage::from_pixel(columns * tile, tile * 2, WHITE);
    for (idx, (low, high)) in low_res.iter().zip(high_res).enumerate() {
        let x = i64::from((idx as u32 + 1) * tile);
        imageops::replace(&mut group, low, x, 0);
        imageops::replace(&mut group, high, x, i64::from(tile));
    }
    group
}

/// Vertical text positions of the stage labels for a grid with `samples` samples.
pub fn stage_label_rows(samples: usize, tile: u32) -> Vec<(&'static str, u32)> {
    let mut rows = vec![
        ("Stage-I", CAPTION_BAND + tile / 2),
        ("Stage-II", CAPTION_BAND + tile + tile / 2),
    ];
    if samples > SAMPLES_PER_GROUP {
        let offset = CAPTION_BAND + tile * 2 + GROUP_GAP;
        rows.push(("Stage-I", offset + tile / 2));
        rows.push(("Stage-II", offset + tile + tile / 2));
    }
    rows
}

//! Isotropic diffusion inpainting
//!
//! The hole is seeded layer by layer from its rim (each pixel takes the mean
//! of the already filled pixels within the radius), then smoothed by a fixed
//! number of Jacobi relaxation sweeps of the discrete Laplace equation. Known
//! pixels act as Dirichlet boundary values and never change.

use super::Grid;
use crate::error::{PhotoEditError, Result};

/// Lower bound on relaxation sweeps, also used for shallow holes
const MIN_SWEEPS: usize = 16;
/// Upper bound on relaxation sweeps
const MAX_SWEEPS: usize = 400;

/// Fill the marked pixels of `pixels` in place
///
/// # Errors
/// - Every pixel is marked, so there is nothing to diffuse from
pub(super) fn inpaint(grid: &Grid, pixels: &mut [[f32; 3]], marked: &[bool], radius: u32) -> Result<()> {
    if marked.iter().all(|&m| m) {
        return Err(PhotoEditError::inpainting(
            "Mask covers the whole image; no known pixels to diffuse from",
        ));
    }

    let layers = onion_peel(grid, pixels, marked, radius);
    let sweeps = (layers * 4).clamp(MIN_SWEEPS, MAX_SWEEPS);
    relax(grid, pixels, marked, sweeps);
    Ok(())
}

/// Seed hole pixels from the rim inward, returns the number of layers peeled
fn onion_peel(grid: &Grid, pixels: &mut [[f32; 3]], marked: &[bool], radius: u32) -> usize {
    let mut filled: Vec<bool> = marked.iter().map(|&m| !m).collect();
    let mut remaining: Vec<usize> = (0..marked.len()).filter(|&i| marked[i]).collect();
    let r = i64::from(radius.max(1));
    let mut layers = 0;

    while !remaining.is_empty() {
        let mut layer = Vec::new();
        for &index in &remaining {
            let (x, y) = grid.coords(index);
            let touches_rim = [(x, y - 1), (x - 1, y), (x, y + 1), (x + 1, y)]
                .into_iter()
                .any(|(nx, ny)| grid.index(nx, ny).is_some_and(|ni| filled[ni]));
            if !touches_rim {
                continue;
            }

            let mut sum = [0.0_f32; 3];
            let mut count = 0.0_f32;
            for ny in (y - r)..=(y + r) {
                for nx in (x - r)..=(x + r) {
                    if let Some(ni) = grid.index(nx, ny).filter(|&ni| filled[ni]) {
                        for (acc, value) in sum.iter_mut().zip(pixels[ni]) {
                            *acc += value;
                        }
                        count += 1.0;
                    }
                }
            }
            layer.push((index, sum.map(|v| v / count)));
        }

        // Unreachable pixels cannot occur on a connected grid with a known pixel
        if layer.is_empty() {
            break;
        }

        for &(index, value) in &layer {
            pixels[index] = value;
            filled[index] = true;
        }
        remaining.retain(|&i| !filled[i]);
        layers += 1;
    }

    layers
}

fn relax(grid: &Grid, pixels: &mut [[f32; 3]], marked: &[bool], sweeps: usize) {
    let unknown: Vec<usize> = (0..marked.len()).filter(|&i| marked[i]).collect();
    let mut next = vec![[0.0_f32; 3]; unknown.len()];

    for _ in 0..sweeps {
        for (slot, &index) in next.iter_mut().zip(&unknown) {
            let (x, y) = grid.coords(index);
            let mut sum = [0.0_f32; 3];
            let mut count = 0.0_f32;
            for (nx, ny) in [(x, y - 1), (x - 1, y), (x, y + 1), (x + 1, y)] {
                if let Some(ni) = grid.index(nx, ny) {
                    for (acc, value) in sum.iter_mut().zip(pixels[ni]) {
                        *acc += value;
                    }
                    count += 1.0;
                }
            }
            *slot = sum.map(|v| v / count);
        }
        for (&index, value) in unknown.iter().zip(&next) {
            pixels[index] = *value;
        }
    }
}

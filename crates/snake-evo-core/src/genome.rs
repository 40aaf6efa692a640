use crate::nn::{Network, NetworkError};
use rand::Rng;

/// Return a mutated copy of `parent`.
///
/// Each weight matrix and bias vector gets an independent Bernoulli mask with
/// success probability `rate`; masked entries receive an additive U[-1, 1]
/// perturbation. Values are not clamped.
pub fn mutate<R: Rng + ?Sized>(parent: &Network, rate: f64, rng: &mut R) -> Network {
    debug_assert!(
        (0.0..=1.0).contains(&rate),
        "mutation rate must be a probability"
    );
    let mut child = parent.clone();
    let segments: Vec<_> = child
        .layers()
        .iter()
        .flat_map(|layer| [layer.weight_range(), layer.bias_range()])
        .collect();
    let params = child.parameters_mut();
    for range in segments {
        let segment = &mut params[range];
        let mask: Vec<bool> = (0..segment.len()).map(|_| rng.random_bool(rate)).collect();
        for (p, hit) in segment.iter_mut().zip(mask) {
            let delta = rng.random_range(-1.0f32..=1.0);
            if hit {
                *p += delta;
            }
        }
    }
    child
}

/// Single-point crossover of two networks with identical layer widths.
///
/// Each weight matrix is treated as its row-major flattening; a cut index is
/// drawn uniformly from `[0, len)` and the child takes `a` before the cut and
/// `b` from the cut on. Bias vectors are crossed the same way with their own
/// cut indices.
pub fn crossover<R: Rng + ?Sized>(
    a: &Network,
    b: &Network,
    rng: &mut R,
) -> Result<Network, NetworkError> {
    if !a.same_architecture(b) {
        return Err(NetworkError::ArchitectureMismatch {
            left: a.layer_widths().to_vec(),
            right: b.layer_widths().to_vec(),
        });
    }
    let mut child = a.clone();
    let weights = a.layers().iter().map(|l| l.weight_range());
    let biases = a.layers().iter().map(|l| l.bias_range());
    let segments: Vec<_> = weights.chain(biases).collect();

    let donor = b.parameters();
    let params = child.parameters_mut();
    for range in segments {
        let cut = rng.random_range(0..range.len());
        let tail = range.start + cut..range.end;
        params[tail.clone()].copy_from_slice(&donor[tail]);
    }
    Ok(child)
}

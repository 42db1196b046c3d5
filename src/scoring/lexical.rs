use crate::scoring::CrossEncoder;
use anyhow::Result;

pub const DEFAULT_DIM: usize = 256;

/// Model-free stand-in for a cross-encoder: hashed bag-of-words vectors for
/// query and passage, compared by cosine similarity and clamped to 0..=1.
pub struct LexicalCrossEncoder {
    dim: usize,
}

impl LexicalCrossEncoder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for token in tokenize(text) {
            let h = fnv1a_64(token.as_bytes());
            let idx = (h as usize) % self.dim;
            v[idx] += 1.0;
        }
        normalize_l2(&mut v);
        v
    }
}

impl CrossEncoder for LexicalCrossEncoder {
    fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        let q = self.vectorize(query);
        Ok(passages
            .iter()
            .map(|p| {
                let d = self.vectorize(p);
                let dot: f32 = q.iter().zip(d.iter()).map(|(a, b)| a * b).sum();
                dot.clamp(0.0, 1.0)
            })
            .collect())
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
}

fn normalize_l2(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn fnv1a_64(data: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x00000100000001b3;
    let mut hash = OFFSET;
    for b in data {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

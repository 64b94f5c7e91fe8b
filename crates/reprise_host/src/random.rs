//! The `Math.random` global.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use reprise_core::{EngineError, EngineResult};
use std::cell::RefCell;

/// Randomness exposed to application code
pub trait MathApi {
    /// A draw in `[0, 1)`
    ///
    /// # Errors
    ///
    /// Returns error if an interceptor cannot produce a value
    fn random(&self) -> EngineResult<f64>;
}

/// Seeded native source
pub struct NativeMath {
    rng: RefCell<ChaCha8Rng>,
}

impl NativeMath {
    /// Source seeded with `seed`
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: RefCell::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }
}

impl MathApi for NativeMath {
    fn random(&self) -> EngineResult<f64> {
        let mut rng = self
            .rng
            .try_borrow_mut()
            .map_err(|_| EngineError::invalid_state("random source is busy"))?;
        Ok(rng.r#gen::<f64>())
    }
}

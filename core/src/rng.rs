//! Seeded randomness for the synthetic generator.
//!
//! RULE: The generator never touches a platform RNG. Every draw comes from
//! a `TableRng` handed out by one `RngBank`.
//!
//! Streams are keyed by `TableSlot`, so appending a slot leaves the draws of
//! existing tables untouched.

use rand::{
    distributions::{Distribution, WeightedIndex},
    Rng, RngCore, SeedableRng,
};
use rand_pcg::Pcg64Mcg;

/// Odd multiplier that spreads consecutive slots across the seed space.
const SLOT_STRIDE: u64 = 0x9e37_79b9_7f4a_7c15;

/// The random stream feeding one generated table.
pub struct TableRng {
    slot: TableSlot,
    inner: Pcg64Mcg,
}

impl TableRng {
    fn seeded(master_seed: u64, slot: TableSlot) -> Self {
        let seed = master_seed ^ (slot as u64).wrapping_mul(SLOT_STRIDE);
        Self { slot, inner: Pcg64Mcg::seed_from_u64(seed) }
    }

    pub fn slot(&self) -> TableSlot {
        self.slot
    }

    /// Uniform in `[0, n)`; 0 when `n` is 0.
    pub fn below(&mut self, n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        self.gen_range(0..n)
    }

    pub fn chance(&mut self, p: f64) -> bool {
        self.gen::<f64>() < p
    }

    /// Pareto draw with scale `x_min` and shape `alpha`; never below `x_min`.
    pub fn pareto(&mut self, x_min: f64, alpha: f64) -> f64 {
        let u: f64 = self.gen();
        x_min * (1.0 - u).powf(-1.0 / alpha)
    }

    pub fn pick(&mut self, weights: &WeightedIndex<f64>) -> usize {
        weights.sample(self)
    }
}

impl RngCore for TableRng {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn for_table(&self, slot: TableSlot) -> TableRng {
        TableRng::seeded(self.master_seed, slot)
    }
}

/// NEVER reorder or remove entries, only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum TableSlot {
    Customers = 0,
    Transactions = 1,
    Revenue = 2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_draw_independent_streams() {
        let bank = RngBank::new(42);
        let a: Vec<u64> = (0..4).map(|_| bank.for_table(TableSlot::Customers).next_u64()).collect();
        let mut customers = bank.for_table(TableSlot::Customers);
        let mut revenue = bank.for_table(TableSlot::Revenue);
        assert_eq!(a[0], a[1], "same slot, same seed");
        assert_ne!(customers.next_u64(), revenue.next_u64());
        assert_eq!(revenue.slot(), TableSlot::Revenue);
    }

    #[test]
    fn pick_never_lands_on_a_zero_weight() {
        let weights = WeightedIndex::new([0.0, 3.0, 0.0, 1.0]).unwrap();
        let mut rng = RngBank::new(7).for_table(TableSlot::Customers);
        for _ in 0..500 {
            let index = rng.pick(&weights);
            assert!(index == 1 || index == 3, "picked {index}");
        }
    }

    #[test]
    fn pareto_respects_its_scale() {
        let mut rng = RngBank::new(1).for_table(TableSlot::Revenue);
        assert!((0..500).all(|_| rng.pareto(25.0, 2.5) >= 25.0));
        assert_eq!(rng.below(0), 0);
    }
}

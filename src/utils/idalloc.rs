use bitvec::vec::BitVec;

/// Hands out the lowest free slot index, growing when every slot is taken.
#[derive(Default)]
pub struct IdAlloc {
    bits: BitVec,
}

impl IdAlloc {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new(),
        }
    }
    pub fn alloc_one(&mut self) -> u32 {
        if let Some(indice) = self.bits.first_zero() {
            self.bits.set(indice, true);
            return indice as u32;
        }
        let indice = self.bits.len();
        self.bits.push(true);
        indice as u32
    }
    pub fn free(&mut self, id: u32) {
        if let Some(mut bit) = self.bits.get_mut(id as usize) {
            *bit = false;
        }
    }
    pub fn is_allocated(&self, id: u32) -> bool {
        self.bits.get(id as usize).is_some_and(|bit| *bit)
    }
    pub fn len(&self) -> usize {
        self.bits.count_ones()
    }
    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.bits.iter_ones().map(|i| i as u32)
    }
}

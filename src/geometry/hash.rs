const MURMUR_M: u32 = 0x5bd1e995;
const MURMUR_R: u32 = 24;

#[inline]
fn mmix(hash: &mut u32, mut k: u32) {
  k = k.wrapping_mul(MURMUR_M);
  k ^= k >> MURMUR_R;
  k = k.wrapping_mul(MURMUR_M);
  *hash = hash.wrapping_mul(MURMUR_M);
  *hash ^= k;
}

/// Incremental MurmurHash2A, 32-bit.
#[derive(Debug, Default, Clone, Copy)]
pub struct HalaMurmur2A {
  hash: u32,
  tail: u32,
  count: u32,
  size: u32,
}

impl HalaMurmur2A {
  pub fn new(seed: u32) -> Self {
    Self {
      hash: seed,
      ..Default::default()
    }
  }

  pub fn add(&mut self, mut data: &[u8]) {
    self.size = self.size.wrapping_add(data.len() as u32);

    data = self.mix_tail(data);
    while data.len() >= 4 {
      let k = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
      mmix(&mut self.hash, k);
      data = &data[4..];
    }
    self.mix_tail(data);
  }

  pub fn finish(mut self) -> u32 {
    mmix(&mut self.hash, self.tail);
    mmix(&mut self.hash, self.size);
    self.hash ^= self.hash >> 13;
    self.hash = self.hash.wrapping_mul(MURMUR_M);
    self.hash ^= self.hash >> 15;
    self.hash
  }

  fn mix_tail<'a>(&mut self, mut data: &'a [u8]) -> &'a [u8] {
    while !data.is_empty() && (data.len() < 4 || self.count != 0) {
      self.tail |= (data[0] as u32) << (self.count * 8);
      data = &data[1..];
      self.count += 1;
      if self.count == 4 {
        mmix(&mut self.hash, self.tail);
        self.tail = 0;
        self.count = 0;
      }
    }
    data
  }
}

/// Hash a byte slice in one call.
/// param data: The bytes.
/// return: The 32-bit hash.
pub fn murmur2a(data: &[u8]) -> u32 {
  let mut hasher = HalaMurmur2A::new(0);
  hasher.add(data);
  hasher.finish()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn incremental_matches_one_shot() {
    let data = (0u8..37).collect::<Vec<_>>();
    let mut hasher = HalaMurmur2A::new(0);
    hasher.add(&data[..3]);
    hasher.add(&data[3..10]);
    hasher.add(&data[10..]);
    assert_eq!(hasher.finish(), murmur2a(&data));
  }

  #[test]
  fn single_bit_changes_the_hash() {
    let a = [0u8; 12];
    let mut b = [0u8; 12];
    b[11] = 1;
    assert_ne!(murmur2a(&a), murmur2a(&b));
    assert_eq!(murmur2a(&a), murmur2a(&[0u8; 12]));
  }
}

//! Physical address decomposition
//!
//! A physical address is viewed two ways:
//! | page number | page offset |   for the pager, and
//! | tag | index | offset |       for the cache.

use super::mmu::PAGE_SIZE;

pub fn get_log_2(value: u32) -> u32 {
    assert!(value > 0);
    31 - value.leading_zeros()
}

pub fn is_pow_2(value: u32) -> bool {
    value != 0 && value & (value - 1) == 0
}

pub fn get_mask(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1 << bits) - 1
    }
}

/// (page number, page offset) of an address
pub fn split_page(address: u32) -> (u32, u32) {
    (address / PAGE_SIZE, address % PAGE_SIZE)
}

/// Splits physical addresses into cache fields
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressDecoder {
    offset_bits: u32,
    index_bits: u32,
}

impl AddressDecoder {
    pub fn new(offset_bits: u32, index_bits: u32) -> Self {
        assert!(offset_bits + index_bits < 32);
        Self {
            offset_bits,
            index_bits,
        }
    }

    /// (tag, index)
    pub fn split_cache(&self, address: u32) -> (u32, usize) {
        (self.get_tag(address), self.get_index(address))
    }

    pub fn get_tag(&self, address: u32) -> u32 {
        address >> (self.offset_bits + self.index_bits)
    }

    pub fn get_index(&self, address: u32) -> usize {
        ((address >> self.offset_bits) & get_mask(self.index_bits)) as usize
    }

    pub fn get_block_offset(&self, address: u32) -> u32 {
        address & get_mask(self.offset_bits)
    }

    /// Base address of the block holding `tag` in set `index`
    pub fn block_address(&self, tag: u32, index: usize) -> u32 {
        (tag << (self.offset_bits + self.index_bits))
            | ((index as u32) << self.offset_bits)
    }

    /// Physical page that backs the block holding `tag` in set `index`
    pub fn block_page(&self, tag: u32, index: usize) -> u32 {
        self.block_address(tag, index) / PAGE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_get_log_2() {
        for n in 1..123457 {
            let expected = {
                let mut count = 0;
                let mut t = n;
                while t > 1 {
                    count += 1;
                    t >>= 1;
                }
                count
            };
            assert_eq!(expected, get_log_2(n));
        }
    }

    #[test]
    fn test_is_pow_2() {
        assert!(is_pow_2(1));
        assert!(is_pow_2(64));
        assert!(!is_pow_2(0));
        assert!(!is_pow_2(48));
    }

    #[test]
    fn test_split() {
        // 16-byte blocks, 512 sets
        let decoder = AddressDecoder::new(4, 9);
        let address = 0x0123_4567;
        assert_eq!(split_page(address), (0x1234, 0x567));
        assert_eq!(decoder.get_block_offset(address), 0x7);
        // (0x1234567 >> 4) & 0x1ff
        assert_eq!(decoder.get_index(address), 0x056);
        assert_eq!(decoder.get_tag(address), 0x0123_4567 >> 13);
    }

    #[test]
    fn test_block_page() {
        let decoder = AddressDecoder::new(4, 9);
        let address = 0x0000_5a30;
        let (tag, index) = decoder.split_cache(address);
        assert_eq!(decoder.block_page(tag, index), 5);
    }

    proptest! {
        #[test]
        fn address_round_trip(
            offset_bits in 3u32..=6,
            index_bits in 0u32..=20,
            address in any::<u32>(),
        ) {
            let decoder = AddressDecoder::new(offset_bits, index_bits);
            let (tag, index) = decoder.split_cache(address);
            let offset = decoder.get_block_offset(address);
            prop_assert_eq!(
                decoder.block_address(tag, index) | offset,
                address
            );
        }
    }
}

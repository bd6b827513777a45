use std::fmt;

/// Largest compressed offset representable in the upper 48 bits.
pub const MAX_COMPRESSED_OFFSET: u64 = (1 << 48) - 1;

/// A BGZF virtual file offset.
///
/// The upper 48 bits address the start of a block in the compressed stream,
/// the lower 16 bits a byte inside that block's decompressed payload. The
/// natural integer ordering of the packed value is stream order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualOffset(u64);

impl VirtualOffset {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(u64::MAX);

    pub fn new(compressed: u64, uncompressed: u16) -> Self {
        debug_assert!(compressed <= MAX_COMPRESSED_OFFSET);
        Self(pack(compressed, uncompressed))
    }

    pub fn compressed(&self) -> u64 {
        self.0 >> 16
    }

    pub fn uncompressed(&self) -> u16 {
        self.0 as u16
    }

    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for VirtualOffset {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<VirtualOffset> for u64 {
    fn from(offset: VirtualOffset) -> Self {
        offset.0
    }
}

impl fmt::Display for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.compressed(), self.uncompressed())
    }
}

pub fn pack(compressed: u64, uncompressed: u16) -> u64 {
    (compressed << 16) | u64::from(uncompressed)
}

pub fn unpack(raw: u64) -> (u64, u16) {
    (raw >> 16, raw as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack_inverse() {
        let compressed = [0, 1, 28, 65_535, 65_536, 1 << 32, MAX_COMPRESSED_OFFSET];
        let uncompressed = [0, 1, 255, 32_768, u16::MAX];

        for &c in &compressed {
            for &u in &uncompressed {
                assert_eq!(unpack(pack(c, u)), (c, u));

                let offset = VirtualOffset::new(c, u);
                assert_eq!(offset.compressed(), c);
                assert_eq!(offset.uncompressed(), u);
            }
        }
    }

    #[test]
    fn test_ordering_is_stream_order() {
        // a later block always sorts after any position in an earlier block
        assert!(VirtualOffset::new(100, u16::MAX) < VirtualOffset::new(101, 0));
        assert!(VirtualOffset::new(100, 5) < VirtualOffset::new(100, 6));
        assert_eq!(
            VirtualOffset::new(7, 9).cmp(&VirtualOffset::new(7, 9)),
            std::cmp::Ordering::Equal
        );
    }

    #[test]
    fn test_raw_conversion() {
        let offset = VirtualOffset::from(0x0001_2345_0067);
        assert_eq!(offset.compressed(), 0x1_2345);
        assert_eq!(offset.uncompressed(), 0x0067);
        assert_eq!(u64::from(offset), 0x0001_2345_0067);
        assert_eq!(offset.to_string(), format!("{}:{}", 0x1_2345u64, 0x67));
    }
}

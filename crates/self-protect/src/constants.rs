use std::hint::black_box;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Closed set of protected constants the host workflow asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstantId {
    RecordBaseOffset,
    RecordStride,
    ValueFieldOffset,
    QuantityCap,
    HeaderMagic,
}

impl ConstantId {
    pub const ALL: [ConstantId; 5] = [
        Self::RecordBaseOffset,
        Self::RecordStride,
        Self::ValueFieldOffset,
        Self::QuantityCap,
        Self::HeaderMagic,
    ];

    /// Key the constant is filed under in the secure value store.
    pub fn key(self) -> &'static str {
        match self {
            Self::RecordBaseOffset => "const.record_base_offset",
            Self::RecordStride => "const.record_stride",
            Self::ValueFieldOffset => "const.value_field_offset",
            Self::QuantityCap => "const.quantity_cap",
            Self::HeaderMagic => "const.header_magic",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::RecordBaseOffset => 0,
            Self::RecordStride => 1,
            Self::ValueFieldOffset => 2,
            Self::QuantityCap => 3,
            Self::HeaderMagic => 4,
        }
    }

    fn handler(self) -> fn(&mut StdRng) -> u32 {
        match self {
            Self::RecordBaseOffset => record_base_offset,
            Self::RecordStride => record_stride,
            Self::ValueFieldOffset => value_field_offset,
            Self::QuantityCap => quantity_cap,
            Self::HeaderMagic => header_magic,
        }
    }
}

/// Produces protected constants through code paths that change per call.
#[derive(Debug)]
pub struct ConstantProvider {
    rng: StdRng,
}

impl ConstantProvider {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self { rng }
    }

    pub fn resolve(&mut self, id: ConstantId) -> u32 {
        let offset = self.rng.gen_range(1..ConstantId::ALL.len());
        let decoy = ConstantId::ALL[(id.index() + offset) % ConstantId::ALL.len()];
        let noise: u32 = self.rng.gen();
        black_box((decoy.handler())(&mut self.rng) ^ noise);

        (id.handler())(&mut self.rng)
    }
}

impl Default for ConstantProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn record_base_offset(rng: &mut StdRng) -> u32 {
    let r: u32 = rng.gen();
    match rng.gen_range(0..4) {
        0 => black_box(0x0190u32) + 0x0018,
        1 => (black_box(0x01A8u32) ^ r) ^ r,
        2 => r.wrapping_add(black_box(0x01A8)).wrapping_sub(r),
        _ => black_box(0x00D4u32) << 1,
    }
}

fn record_stride(rng: &mut StdRng) -> u32 {
    let r: u32 = rng.gen_range(1..0x1000);
    match rng.gen_range(0..3) {
        0 => black_box(0x0018u32) * 2,
        1 => (black_box(0x0030u32) + r) - r,
        _ => black_box(0x00C0u32) >> 2,
    }
}

fn value_field_offset(rng: &mut StdRng) -> u32 {
    let r: u32 = rng.gen();
    match rng.gen_range(0..4) {
        0 => black_box(0x0010u32) | 0x0004,
        1 => black_box(0x0014u32 ^ r) ^ r,
        2 => black_box(0x0028u32) / 2,
        _ => r.wrapping_sub(black_box(r.wrapping_sub(0x0014))),
    }
}

fn quantity_cap(rng: &mut StdRng) -> u32 {
    let r: u32 = rng.gen_range(1..1_000);
    match rng.gen_range(0..3) {
        0 => black_box(1_000_000u32) - 1,
        1 => black_box(999_000u32) + 999,
        _ => (black_box(999_999u32) * r) / r,
    }
}

fn header_magic(rng: &mut StdRng) -> u32 {
    let r: u32 = rng.gen();
    match rng.gen_range(0..3) {
        0 => u32::from_be_bytes(black_box(*b"ITEM")),
        1 => (black_box(0x4954_0000u32) | 0x454D) ^ r ^ r,
        _ => black_box(0x4954_454Du32).rotate_left(r % 32).rotate_right(r % 32),
    }
}

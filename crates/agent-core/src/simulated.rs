use self_protect::{ConstantId, ConstantProvider};
use shroud_host::{InMemoryHost, MemoryValue};

/// Load address of the simulated target image.
pub const SIMULATED_IMAGE_BASE: u64 = 0x0040_0000;

/// Builds a stand-in target: a header word followed by `records` inventory
/// records, each with a quantity field.
pub fn simulated_host(records: u32, provider: &mut ConstantProvider) -> InMemoryHost {
    let magic = provider.resolve(ConstantId::HeaderMagic);
    let layout = RecordLayout::resolve(SIMULATED_IMAGE_BASE, |id| provider.resolve(id));

    let mut cells = vec![(SIMULATED_IMAGE_BASE, MemoryValue::Dword(magic))];
    for record in 0..records {
        let quantity = 10 + record.wrapping_mul(37) % 90;
        cells.push((layout.quantity_address(record), MemoryValue::Dword(quantity)));
    }
    InMemoryHost::with_values(cells)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub first_record: u64,
    pub stride: u64,
    pub value_offset: u64,
}

impl RecordLayout {
    pub fn resolve(image_base: u64, mut constant: impl FnMut(ConstantId) -> u32) -> Self {
        Self {
            first_record: image_base + u64::from(constant(ConstantId::RecordBaseOffset)),
            stride: u64::from(constant(ConstantId::RecordStride)),
            value_offset: u64::from(constant(ConstantId::ValueFieldOffset)),
        }
    }

    pub fn quantity_address(&self, record: u32) -> u64 {
        self.first_record + self.stride * u64::from(record) + self.value_offset
    }
}

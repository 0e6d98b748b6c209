/// Reports whether the host's privileged inspection UI is on screen.
pub trait InspectionUi {
    fn is_visible(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverVisible;

impl InspectionUi for NeverVisible {
    fn is_visible(&self) -> bool {
        false
    }
}

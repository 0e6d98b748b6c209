use crate::engine::{GuardContext, StateRestorer};
use crate::error::GuardResult;

/// Wraps a host operation so each call is bracketed by checkpoints.
pub fn wrap<C>(inner: C) -> Guarded<C> {
    Guarded { inner, calls: 0 }
}

#[derive(Debug)]
pub struct Guarded<C> {
    inner: C,
    calls: u64,
}

impl<C: StateRestorer> Guarded<C> {
    /// Checkpoints, runs `op`, checkpoints again. A violation before the call
    /// means `op` never runs; the wrapped value doubles as the restorer.
    pub fn call<R>(
        &mut self,
        ctx: &mut GuardContext,
        op: impl FnOnce(&mut C) -> R,
    ) -> GuardResult<R> {
        ctx.checkpoint(&mut self.inner)?;
        self.calls += 1;
        let output = op(&mut self.inner);
        ctx.checkpoint(&mut self.inner)?;
        Ok(output)
    }
}

impl<C> Guarded<C> {
    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

/// Non-reentrancy lock held for the full duration of a mutating operation.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    active: Option<&'static str>,
}

impl ReentrancyGuard {
    pub fn enter(&mut self, operation: &'static str) -> Result<(), crate::error::StateError> {
        if let Some(active) = self.active {
            return Err(crate::error::StateError::ReentrantCall(active));
        }
        self.active = Some(operation);
        Ok(())
    }

    pub fn exit(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<&'static str> {
        self.active
    }
}

/// Tuning for the assignment transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationConfig {
    /// How many read-then-commit cycles an explicit move or discharge gets when another writer
    /// keeps changing the patient's ward underneath it.
    pub max_move_attempts: u8,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_move_attempts: 3,
        }
    }
}

//! Pass configuration.

/// Knobs for [`convert_to_tensors`](crate::convert_to_tensors).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebufOptions {
    /// Maximum pattern iterations before giving up. Default: 10.
    pub max_iterations: usize,
    /// Store each modified buffer's final value back with `tensor.export`
    /// before `func.return`. Default: true.
    pub export_results: bool,
    /// Validate use-chains and loop shapes after conversion. Default: true.
    pub verify: bool,
}

impl Default for DebufOptions {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            export_results: true,
            verify: true,
        }
    }
}

impl DebufOptions {
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_export_results(mut self, export: bool) -> Self {
        self.export_results = export;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}

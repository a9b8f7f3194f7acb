use serde::{Deserialize, Serialize};

/// Diagnostic switches bound to a matching library at construction.
///
/// Each library keeps its own copy, so a query reads a consistent snapshot
/// without touching shared mutable state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Route `find_best_solution` through the exhaustive evaluation path.
    #[serde(default)]
    pub enable_debug_selection: bool,
    /// Log every row visited while enumerating solutions.
    #[serde(default)]
    pub print_property_evaluation: bool,
    /// Log the library logic indices of top-K results.
    #[serde(default)]
    pub print_library_logic_index: bool,
}

impl Diagnostics {
    pub fn with_debug_selection(mut self, enabled: bool) -> Self {
        self.enable_debug_selection = enabled;
        self
    }

    pub fn with_property_evaluation(mut self, enabled: bool) -> Self {
        self.print_property_evaluation = enabled;
        self
    }

    pub fn with_library_logic_index(mut self, enabled: bool) -> Self {
        self.print_library_logic_index = enabled;
        self
    }
}

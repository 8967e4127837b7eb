//! Class index space of the discriminator output.

use std::fmt;

/// Number of output classes.
pub const NUM_CLASSES: usize = 4;

/// Output class of the tau discriminator.
///
/// The discriminant value is the column index in every `[batch, 4]` target
/// and output tensor. Reordering breaks every consumer of those tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TauClass {
    Electron = 0,
    Muon = 1,
    Tau = 2,
    Jet = 3,
}

impl TauClass {
    /// All classes in column order.
    pub const ALL: [TauClass; NUM_CLASSES] =
        [TauClass::Electron, TauClass::Muon, TauClass::Tau, TauClass::Jet];

    /// Column index along the class axis.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short name used in loss names and reports.
    pub const fn name(self) -> &'static str {
        match self {
            TauClass::Electron => "e",
            TauClass::Muon => "mu",
            TauClass::Tau => "tau",
            TauClass::Jet => "jet",
        }
    }

    /// Class for a column index, if in range.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for TauClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_order_is_fixed() {
        assert_eq!(TauClass::Electron.index(), 0);
        assert_eq!(TauClass::Muon.index(), 1);
        assert_eq!(TauClass::Tau.index(), 2);
        assert_eq!(TauClass::Jet.index(), 3);
        for (i, class) in TauClass::ALL.iter().enumerate() {
            assert_eq!(class.index(), i);
            assert_eq!(TauClass::from_index(i), Some(*class));
        }
        assert_eq!(TauClass::from_index(NUM_CLASSES), None);
    }

    #[test]
    fn test_display_names() {
        let names: Vec<String> = TauClass::ALL.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["e", "mu", "tau", "jet"]);
    }
}

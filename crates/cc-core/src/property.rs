//! Property results and the checker trait.

use std::fmt;

use crate::counterexample::Counterexample;

/// Outcome of checking one named invariant against a container.
#[derive(Debug, Clone)]
pub struct PropertyResult {
    /// Invariant name (e.g. "NoLostElements")
    pub name: &'static str,
    /// Container the invariant belongs to (e.g. "lock_free_stack")
    pub structure: &'static str,
    /// Whether the invariant held
    pub holds: bool,
    /// Description of the violation, if any
    pub violation: Option<String>,
    /// Failure path, if the checker could build one
    pub counterexample: Option<Counterexample>,
}

impl PropertyResult {
    /// A passing result.
    #[must_use]
    pub fn pass(name: &'static str, structure: &'static str) -> Self {
        Self {
            name,
            structure,
            holds: true,
            violation: None,
            counterexample: None,
        }
    }

    /// A failing result.
    #[must_use]
    pub fn fail(
        name: &'static str,
        structure: &'static str,
        violation: impl Into<String>,
        counterexample: Option<Counterexample>,
    ) -> Self {
        Self {
            name,
            structure,
            holds: false,
            violation: Some(violation.into()),
            counterexample,
        }
    }
}

impl fmt::Display for PropertyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.holds { "PASS" } else { "FAIL" };
        write!(f, "[{}] {}::{}", status, self.structure, self.name)?;
        if let Some(ref violation) = self.violation {
            write!(f, ": {}", violation)?;
        }
        Ok(())
    }
}

/// Something that can check a set of invariants.
pub trait PropertyChecker {
    /// Check every invariant and return one result per invariant.
    fn check_all(&self) -> Vec<PropertyResult>;

    /// True if every invariant holds.
    fn all_hold(&self) -> bool {
        self.check_all().iter().all(|r| r.holds)
    }

    /// Only the failing results.
    fn violations(&self) -> Vec<PropertyResult> {
        self.check_all().into_iter().filter(|r| !r.holds).collect()
    }

    /// One line per failing invariant, suitable for an assertion message.
    fn report(&self) -> String {
        self.violations()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<PropertyResult>);

    impl PropertyChecker for Fixed {
        fn check_all(&self) -> Vec<PropertyResult> {
            self.0.clone()
        }
    }

    #[test]
    fn test_all_hold_and_violations() {
        let checker = Fixed(vec![
            PropertyResult::pass("A", "test"),
            PropertyResult::fail("B", "test", "broken", None),
        ]);

        assert!(!checker.all_hold());
        assert_eq!(checker.violations().len(), 1);
        assert_eq!(checker.report(), "[FAIL] test::B: broken");
    }

    #[test]
    fn test_display_pass() {
        let r = PropertyResult::pass("NoDuplicates", "lock_free_stack");
        assert_eq!(r.to_string(), "[PASS] lock_free_stack::NoDuplicates");
    }
}

//! Transition rules for lifecycle enums.

use super::ValidationError;

/// A status enum whose values form a directed transition graph.
///
/// Implementors only describe the edges; checked transitions and
/// terminal detection come from the provided methods.
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Every status reachable in one step.
    fn valid_transitions(&self) -> Vec<Self>;

    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if !self.can_transition_to(&target) {
            return Err(ValidationError::invalid_format(
                "status",
                format!("{:?} cannot move to {:?}", self, target),
            ));
        }
        Ok(target)
    }

    /// A status with no outgoing edges.
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Trial {
        Running,
        Converted,
        Lapsed,
    }

    impl StateMachine for Trial {
        fn can_transition_to(&self, target: &Self) -> bool {
            self.valid_transitions().contains(target)
        }

        fn valid_transitions(&self) -> Vec<Self> {
            match self {
                Trial::Running => vec![Trial::Converted, Trial::Lapsed],
                Trial::Lapsed => vec![Trial::Converted],
                Trial::Converted => vec![],
            }
        }
    }

    #[test]
    fn allowed_edge_yields_target() {
        assert_eq!(Trial::Lapsed.transition_to(Trial::Converted), Ok(Trial::Converted));
    }

    #[test]
    fn missing_edge_is_a_validation_error() {
        let err = Trial::Converted.transition_to(Trial::Running).unwrap_err();
        assert!(err.to_string().contains("Converted"));
    }

    #[test]
    fn terminal_means_no_exits() {
        assert!(Trial::Converted.is_terminal());
        assert!(!Trial::Lapsed.is_terminal());
    }
}

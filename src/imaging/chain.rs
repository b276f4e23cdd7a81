//! Ordered manipulator chain.
//!
//! The chain is fixed when the pipeline is built and never changes afterwards.
//! Each invocation walks it front to back: bind parameters, run, hand the
//! result to the next step. The first failure ends the walk.

use super::codec::DecodedImage;
use super::manipulator::{ManipulationError, Manipulator};
use super::params::ParameterSet;
use super::registry::{ManipulatorKind, ManipulatorLimits};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Invalid chain composition, reported before any image is processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unknown manipulator '{0}' (see `glidekit manipulators`)")]
    UnknownManipulator(String),
    #[error("manipulator '{0}' appears more than once in the chain")]
    Duplicate(String),
}

pub struct ManipulatorChain {
    manipulators: Vec<Box<dyn Manipulator>>,
}

impl ManipulatorChain {
    /// Chain over already-constructed manipulators, in the order given.
    ///
    /// The element type guarantees every entry satisfies the contract, so
    /// construction cannot fail.
    pub fn new(manipulators: Vec<Box<dyn Manipulator>>) -> Self {
        Self { manipulators }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Build a chain from built-in manipulator names.
    pub fn from_names<S: AsRef<str>>(
        names: &[S],
        limits: &ManipulatorLimits,
    ) -> Result<Self, ConfigurationError> {
        let mut seen = HashSet::new();
        let mut manipulators = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref().trim();
            let kind = ManipulatorKind::from_name(name)
                .ok_or_else(|| ConfigurationError::UnknownManipulator(name.to_string()))?;
            if !seen.insert(kind) {
                return Err(ConfigurationError::Duplicate(kind.name().to_string()));
            }
            manipulators.push(kind.build(limits));
        }
        Ok(Self::new(manipulators))
    }

    /// Every built-in manipulator in its default order.
    pub fn default_chain(limits: &ManipulatorLimits) -> Self {
        Self::new(
            ManipulatorKind::ALL
                .iter()
                .map(|kind| kind.build(limits))
                .collect(),
        )
    }

    pub fn names(&self) -> Vec<&str> {
        self.manipulators.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.manipulators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manipulators.is_empty()
    }

    /// Run every manipulator in order over `image`.
    ///
    /// Each step binds `params`, then runs on whatever image the previous step
    /// returned. Later steps are skipped once one fails.
    pub fn apply(
        &self,
        mut image: DecodedImage,
        params: &ParameterSet,
    ) -> Result<DecodedImage, ManipulationError> {
        for manipulator in &self.manipulators {
            let stage = manipulator.set_params(params)?;
            image = stage.run(image)?;
            tracing::trace!(
                manipulator = manipulator.name(),
                width = image.width(),
                height = image.height(),
                "stage complete"
            );
        }
        Ok(image)
    }
}

impl fmt::Debug for ManipulatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{RecordedStep, RecordingManipulator, StepBehavior, solid_image};
    use std::sync::{Arc, Mutex};

    fn recording_chain(
        steps: &[(&str, StepBehavior)],
    ) -> (ManipulatorChain, Arc<Mutex<Vec<RecordedStep>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manipulators = steps
            .iter()
            .map(|(name, behavior)| {
                Box::new(RecordingManipulator::new(name, *behavior, Arc::clone(&log)))
                    as Box<dyn Manipulator>
            })
            .collect();
        (ManipulatorChain::new(manipulators), log)
    }

    #[test]
    fn runs_in_declared_order() {
        let (chain, log) = recording_chain(&[
            ("a", StepBehavior::Pass),
            ("b", StepBehavior::Pass),
            ("c", StepBehavior::Pass),
        ]);
        chain.apply(solid_image(10, 10), &ParameterSet::new()).unwrap();

        let ran: Vec<String> = log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|step| match step {
                RecordedStep::Run { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(ran, ["a", "b", "c"]);
    }

    #[test]
    fn params_bound_before_each_run() {
        let (chain, log) =
            recording_chain(&[("a", StepBehavior::Pass), ("b", StepBehavior::Pass)]);
        let params: ParameterSet = [("w", "10")].into_iter().collect();
        chain.apply(solid_image(4, 4), &params).unwrap();

        let log = log.lock().unwrap();
        assert!(matches!(&log[0], RecordedStep::SetParams { name, params: 1 } if name == "a"));
        assert!(matches!(&log[1], RecordedStep::Run { name, .. } if name == "a"));
        assert!(matches!(&log[2], RecordedStep::SetParams { name, .. } if name == "b"));
        assert!(matches!(&log[3], RecordedStep::Run { name, .. } if name == "b"));
    }

    #[test]
    fn next_step_sees_replaced_image() {
        let (chain, log) = recording_chain(&[
            ("a", StepBehavior::Resize(3, 2)),
            ("b", StepBehavior::Pass),
        ]);
        let out = chain.apply(solid_image(10, 10), &ParameterSet::new()).unwrap();

        assert_eq!((out.width(), out.height()), (3, 2));
        let log = log.lock().unwrap();
        assert!(log.contains(&RecordedStep::Run {
            name: "b".into(),
            width: 3,
            height: 2,
        }));
    }

    #[test]
    fn failure_stops_the_chain() {
        let (chain, log) = recording_chain(&[
            ("a", StepBehavior::Pass),
            ("b", StepBehavior::Fail),
            ("c", StepBehavior::Pass),
        ]);
        let err = chain
            .apply(solid_image(5, 5), &ParameterSet::new())
            .unwrap_err();

        assert_eq!(err.stage(), "b");
        assert!(
            !log.lock()
                .unwrap()
                .iter()
                .any(|step| matches!(step, RecordedStep::SetParams { name, .. } | RecordedStep::Run { name, .. } if name == "c"))
        );
    }

    #[test]
    fn empty_chain_is_identity() {
        let chain = ManipulatorChain::empty();
        let out = chain.apply(solid_image(7, 3), &ParameterSet::new()).unwrap();
        assert_eq!((out.width(), out.height()), (7, 3));
    }

    #[test]
    fn from_names_keeps_order() {
        let chain =
            ManipulatorChain::from_names(&["size", "flip", "blur"], &ManipulatorLimits::default())
                .unwrap();
        assert_eq!(chain.names(), ["size", "flip", "blur"]);
    }

    #[test]
    fn from_names_rejects_unknown() {
        let err = ManipulatorChain::from_names(&["size", "sparkle"], &ManipulatorLimits::default())
            .unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownManipulator("sparkle".into()));
    }

    #[test]
    fn from_names_rejects_duplicates() {
        let err = ManipulatorChain::from_names(&["size", "size"], &ManipulatorLimits::default())
            .unwrap_err();
        assert_eq!(err, ConfigurationError::Duplicate("size".into()));
    }

    #[test]
    fn default_chain_has_every_builtin() {
        let chain = ManipulatorChain::default_chain(&ManipulatorLimits::default());
        assert_eq!(chain.len(), ManipulatorKind::ALL.len());
        assert_eq!(chain.names().first(), Some(&"orientation"));
        assert_eq!(chain.names().last(), Some(&"background"));
    }
}

//! Verifier-style scenarios.
//!
//! A scenario is a closure over a [`Harness`] that builds, mutates, checks,
//! and destroys lists. Where a model checker would branch on a
//! nondeterministic value, a scenario asks the harness, which answers from an
//! explicit [`Choices`] script. A scenario run is then repeated over a range
//! of scripts with [`explore`].
//!
//! Two kinds of failed conditions are kept apart:
//!
//! - [`Harness::assume`] prunes the run. The path was never meant to be
//!   explored, so nothing is reported.
//! - [`Harness::check`] reports a [`Violation`]. The path is reachable and
//!   the condition is a defect.
//!
//! A run that finishes but leaves nodes live is reported as a leak.

use alloc::vec::Vec;
use allocator_api2::alloc::Allocator;
use allocator_api2::alloc::Global;
use core::fmt;
use core::ops::Deref;
use core::ops::DerefMut;
use core::ops::RangeInclusive;
use log::debug;
use log::warn;
use crate::Error;
use crate::Ptr;
use crate::Store;

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// PUBLIC TYPE AND TRAIT DEFINITIONS                                          //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

/// An explicit source of nondeterministic booleans.
///
/// Once a source is exhausted it answers `false` forever, so every loop that
/// is driven by it terminates.

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Choices(Source);

/// A failed invariant check, named by the label passed to
/// [`Harness::check`].

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Violation {
  /// What was being checked.
  pub label: &'static str,
}

/// Why a scenario stopped early.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stop {
  /// An assumption did not hold.
  Pruned,
  /// An invariant check failed.
  Violation(Violation),
  /// A list operation failed.
  Fault(Error),
}

/// The classified result of a scenario run.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
  /// The scenario ran to the end and released every node it created.
  Completed,
  /// The scenario was discarded by an assumption.
  Pruned,
  /// An invariant check failed.
  ViolationDetected(Violation),
  /// A list operation failed, or the scenario leaked nodes.
  Fault(Error),
}

/// The context a scenario runs in: a [`Store`] plus a [`Choices`] script.
///
/// The harness dereferences to its store, so list operations are called on
/// it directly. Store errors convert into [`Stop::Fault`] with `?`.

pub struct Harness<T, A: Allocator = Global> {
  store: Store<T, A>,
  choices: Choices,
  taken: usize,
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// PRIVATE TYPE AND TRAIT DEFINITIONS                                         //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Eq, PartialEq)]
enum Source {
  Repeat(usize),
  Script(Vec<bool>, usize),
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// Choices                                                                    //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

impl Choices {
  /// Answers `false` immediately.

  pub fn none() -> Self {
    Self(Source::Repeat(0))
  }

  /// Answers `true` exactly `n` times.

  pub fn repeat(n: usize) -> Self {
    Self(Source::Repeat(n))
  }

  /// Replays the given answers in order.

  pub fn script<I>(bits: I) -> Self
  where
    I: IntoIterator<Item = bool>
  {
    Self(Source::Script(bits.into_iter().collect(), 0))
  }

  /// The next answer.

  pub fn pick(&mut self) -> bool {
    match &mut self.0 {
      Source::Repeat(0) => false,
      Source::Repeat(n) => {
        *n = *n - 1;
        true
      }
      Source::Script(bits, i) => {
        let Some(&b) = bits.get(*i) else { return false };
        *i = *i + 1;
        b
      }
    }
  }
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// Violation, Stop, Outcome                                                   //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

impl Violation {
  /// A violation of the check named `label`.

  pub const fn new(label: &'static str) -> Self {
    Self { label }
  }
}

impl fmt::Display for Violation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "invariant violated: {}", self.label)
  }
}

impl From<Error> for Stop {
  fn from(e: Error) -> Self {
    Stop::Fault(e)
  }
}

impl From<Violation> for Stop {
  fn from(v: Violation) -> Self {
    Stop::Violation(v)
  }
}

impl fmt::Display for Outcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Outcome::Completed => write!(f, "completed"),
      Outcome::Pruned => write!(f, "pruned"),
      Outcome::ViolationDetected(v) => write!(f, "{}", v),
      Outcome::Fault(e) => write!(f, "fault: {}", e),
    }
  }
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// Harness                                                                    //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

impl<T> Harness<T, Global> {
  /// A harness over an empty store backed by the global allocator.

  pub fn new(choices: Choices) -> Self {
    Self::with_store(Store::new(), choices)
  }
}

impl<T, A: Allocator> Harness<T, A> {
  /// A harness over the given store.

  pub fn with_store(store: Store<T, A>, choices: Choices) -> Self {
    Self { store, choices, taken: 0 }
  }

  /// The number of nondeterministic answers drawn so far.

  pub fn taken(&self) -> usize {
    self.taken
  }

  /// Gives the store back.

  pub fn into_store(self) -> Store<T, A> {
    self.store
  }

  /// The next nondeterministic boolean.

  pub fn nondet_bool(&mut self) -> bool {
    self.taken = self.taken + 1;
    self.choices.pick()
  }

  /// Prunes the run unless `cond` holds.

  pub fn assume(&self, cond: bool) -> Result<(), Stop> {
    if cond { Ok(()) } else { Err(Stop::Pruned) }
  }

  /// Reports a violation of `label` unless `cond` holds.

  pub fn check(&self, cond: bool, label: &'static str) -> Result<(), Stop> {
    if cond { Ok(()) } else { Err(Stop::Violation(Violation::new(label))) }
  }

  /// Prunes the run unless `f` holds for every value of the list at `head`.

  pub fn assume_all<F>(&self, head: Option<Ptr>, f: F) -> Result<(), Stop>
  where
    F: FnMut(&T) -> bool
  {
    self.assume(self.store.all(head, f)?)
  }

  /// Reports a violation of `label` unless `f` holds for every value of the
  /// list at `head`.

  pub fn check_all<F>(&self, head: Option<Ptr>, label: &'static str, f: F) -> Result<(), Stop>
  where
    F: FnMut(&T) -> bool
  {
    self.check(self.store.all(head, f)?, label)
  }

  /// Runs `scenario` and classifies how it ended.
  ///
  /// A scenario that returns `Ok` but leaves any node it created live ends in
  /// [`Outcome::Fault`] with [`Error::Leak`]. Nodes that were live before the
  /// run are not counted.

  pub fn run<F>(&mut self, scenario: F) -> Outcome
  where
    F: FnOnce(&mut Self) -> Result<(), Stop>
  {
    let created = self.store.stats().created;

    let outcome =
      match scenario(self) {
        Ok(()) =>
          match self.store.live_since(created) {
            0 => Outcome::Completed,
            n => {
              warn!("oxlist: scenario leaked {} node(s)", n);
              Outcome::Fault(Error::Leak(n))
            }
          },
        Err(Stop::Pruned) =>
          Outcome::Pruned,
        Err(Stop::Violation(v)) =>
          Outcome::ViolationDetected(v),
        Err(Stop::Fault(e)) => {
          warn!("oxlist: scenario faulted: {}", e);
          Outcome::Fault(e)
        }
      };

    debug!("oxlist: scenario {} after {} choice(s)", outcome, self.taken);

    outcome
  }
}

impl<T, A: Allocator> Deref for Harness<T, A> {
  type Target = Store<T, A>;

  fn deref(&self) -> &Store<T, A> {
    &self.store
  }
}

impl<T, A: Allocator> DerefMut for Harness<T, A> {
  fn deref_mut(&mut self) -> &mut Store<T, A> {
    &mut self.store
  }
}

impl<T, A: Allocator> fmt::Debug for Harness<T, A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Harness")
      .field("store", &self.store)
      .field("taken", &self.taken)
      .finish()
  }
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// Entry points                                                               //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

/// Runs `scenario` once on a fresh harness.

pub fn run<T, F>(choices: Choices, scenario: F) -> Outcome
where
  F: FnOnce(&mut Harness<T>) -> Result<(), Stop>
{
  Harness::new(choices).run(scenario)
}

/// Runs `scenario` once for every count in `bounds`, each time on a fresh
/// harness whose choices answer `true` that many times.

pub fn explore<T, F>(bounds: RangeInclusive<usize>, scenario: F) -> Vec<(usize, Outcome)>
where
  F: FnMut(&mut Harness<T>) -> Result<(), Stop>
{
  let mut scenario = scenario;
  bounds.map(|n| (n, run(Choices::repeat(n), &mut scenario))).collect()
}

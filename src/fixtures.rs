//! Small list programs used as scenario fixtures.
//!
//! Each fixture is a scenario for [`Harness::run`] or
//! [`explore`](crate::scenario::explore). Its append loop is driven by the
//! harness's choices.

use allocator_api2::alloc::Allocator;
use crate::Ptr;
use crate::scenario::Harness;
use crate::scenario::Stop;
use crate::scenario::Violation;

// Builds `[x, x]` and returns only the head. The handle to the second node is
// dropped here, so that node stays reachable through the head's link alone.

fn pair<A: Allocator>(h: &mut Harness<i32, A>, x: i32) -> Result<Ptr, Stop> {
  let a = h.try_create_node(x)?;
  let b = h.try_create_node(x)?;
  h.link(a, b)?;
  Ok(a)
}

/// Appends `data` to a two-node list for as long as the choices allow. It then
/// assumes that every node holds `data`, and destroys the list.
///
/// Both starting nodes hold `head_value`. So unless `head_value == data`,
/// every run is pruned after the loop.

pub fn append_to_pair<A>(h: &mut Harness<i32, A>, head_value: i32, data: i32) -> Result<(), Stop>
where
  A: Allocator
{
  let mut head = Some(pair(h, head_value)?);

  while h.nondet_bool() {
    head = Some(h.try_append(head, data)?);
  }

  h.assume_all(head, |&x| x == data)?;

  let _: _ = h.destroy(head)?;

  Ok(())
}

/// Appends `data` to a two-node list for as long as the choices allow. It then
/// overwrites every node with `value`, checks that the overwrite reached every
/// node, and destroys the list.

pub fn append_overwrite<A>(h: &mut Harness<i32, A>, data: i32, value: i32) -> Result<(), Stop>
where
  A: Allocator
{
  let head = Some(pair(h, 0)?);

  while h.nondet_bool() {
    let _: _ = h.try_append(head, data)?;
  }

  let mut p = head;

  while let Some(q) = p {
    h.set(q, value)?;
    p = h.next(q)?;
  }

  h.check_all(head, "every node holds the overwritten value", |&x| x == value)?;

  let _: _ = h.destroy(head)?;

  Ok(())
}

/// Builds `[first, second]` and keeps only the head. It checks both values,
/// reaching the second one through the head's link, and destroys the list.
///
/// Each check compares a node against the value it was just given, so with
/// a correct store this fixture always completes. It never ends in
/// [`Outcome::ViolationDetected`](crate::scenario::Outcome::ViolationDetected).

pub fn two_values<A>(h: &mut Harness<i32, A>, first: i32, second: i32) -> Result<(), Stop>
where
  A: Allocator
{
  let a = {
    let a = h.try_create_node(first)?;
    let b = h.try_create_node(second)?;
    h.link(a, b)?;
    a
  };

  h.check(*h.get(a)? == first, "head holds the first value")?;

  let Some(b) = h.next(a)? else {
    return Err(Violation::new("head links to a second node").into());
  };

  h.check(*h.get(b)? == second, "second node holds the second value")?;

  let _: _ = h.destroy(Some(a))?;

  Ok(())
}

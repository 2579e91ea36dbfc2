#![doc = include_str!("../README.md")]
#![no_std]
#![cfg_attr(feature = "allocator_api", feature(allocator_api))]

extern crate alloc;

use alloc::vec::Vec;
use allocator_api2::alloc::Allocator;
use allocator_api2::alloc::Global;
use core::fmt;
use core::mem;
use log::debug;
use log::trace;

pub use ptr::Ptr;

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// SUBMODULES                                                                 //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

pub mod fixtures;

pub mod scenario;

mod ptr;

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// PUBLIC TYPE AND TRAIT DEFINITIONS                                          //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

/// An arena of singly-linked list nodes.
///
/// A list is named by the [`Ptr`] of its head node, or by `None` when it is
/// empty. Every node has at most one predecessor and at most one successor,
/// and the store refuses to make a link that would share a node between two
/// lists or close a cycle. Following the links from any node therefore always
/// terminates.
///
/// Released slots are reused. A [`Ptr`] to a released node keeps failing with
/// [`Error::UseAfterFree`] even after its slot has been reused.

pub struct Store<T, A: Allocator = Global> {
  entries: allocator_api2::vec::Vec<Entry<T>, A>,
  free: Option<u32>,
  live: usize,
  limit: usize,
  stats: Stats,
}

/// Cumulative node counters of a [`Store`].

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Stats {
  /// The number of nodes created.
  pub created: usize,
  /// The number of nodes released.
  pub released: usize,
}

/// An error from a list operation.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
  /// The node limit was reached, or the parent allocator failed.
  OutOfMemory,
  /// The handle does not name a slot of this store.
  InvalidPtr(Ptr),
  /// The handle names a node that has been released.
  UseAfterFree(Ptr),
  /// The handle names a list head that has already been released.
  DoubleFree(Ptr),
  /// The node already has a successor.
  AlreadyLinked(Ptr),
  /// The node has a predecessor, so it is not the head of a list.
  NotHead(Ptr),
  /// Making the link would close a cycle through the given head.
  Cycle(Ptr),
  /// The given number of nodes were still live when they should not be.
  Leak(usize),
}

/// An iterator over the values of a list in link order.

pub struct Iter<'a, T, A: Allocator = Global> {
  store: &'a Store<T, A>,
  next: Option<Ptr>,
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// PRIVATE TYPE AND TRAIT DEFINITIONS                                         //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

enum Entry<T> {
  Occupied(Node<T>),
  Vacant(Hole),
}

struct Node<T> {
  value: T,
  next: Option<Ptr>,
  owned: bool,
  generation: u32,
  serial: usize,
}

struct Hole {
  next_free: Option<u32>,
  generation: u32,
}

enum Panicked { }

trait Fail: Sized {
  fn fail<T>(_: Error) -> Result<T, Self>;
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// CONSTANTS                                                                  //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

const MAX_NODES: usize = u32::MAX as usize;

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// UTILITY FUNCTIONS                                                          //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

#[inline(always)]
fn unwrap<T>(x: Result<T, Panicked>) -> T {
  match x { Ok(x) => x, Err(e) => match e { } }
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// Fail                                                                       //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

impl Fail for Panicked {
  #[inline(never)]
  #[cold]
  fn fail<T>(e: Error) -> Result<T, Self> {
    panic!("oxlist: {}", e)
  }
}

impl Fail for Error {
  #[inline(always)]
  fn fail<T>(e: Error) -> Result<T, Self> {
    Err(e)
  }
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// Error                                                                      //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match *self {
      Error::OutOfMemory =>
        write!(f, "out of memory"),
      Error::InvalidPtr(p) =>
        write!(f, "{:?} does not belong to this store", p),
      Error::UseAfterFree(p) =>
        write!(f, "use of released node {:?}", p),
      Error::DoubleFree(p) =>
        write!(f, "release of already released node {:?}", p),
      Error::AlreadyLinked(p) =>
        write!(f, "{:?} already has a successor", p),
      Error::NotHead(p) =>
        write!(f, "{:?} is owned by a predecessor", p),
      Error::Cycle(p) =>
        write!(f, "link would close a cycle through {:?}", p),
      Error::Leak(n) =>
        write!(f, "{} node(s) still live", n),
    }
  }
}

impl core::error::Error for Error { }

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// Store                                                                      //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

fn store<T, A>(capacity: usize, allocator: A) -> Store<T, A>
where
  A: Allocator,
{
  Store {
    entries: allocator_api2::vec::Vec::with_capacity_in(capacity, allocator),
    free: None,
    live: 0,
    limit: MAX_NODES,
    stats: Stats::default(),
  }
}

fn create_node<T, A, E>(store: &mut Store<T, A>, value: T) -> Result<Ptr, E>
where
  A: Allocator,
  E: Fail,
{
  if store.live >= store.limit {
    return E::fail(Error::OutOfMemory);
  }

  let p =
    match store.free {
      Some(i) => {
        let slot = &mut store.entries[i as usize];
        let Entry::Vacant(hole) = slot else {
          unreachable!("oxlist: occupied slot on the free list")
        };
        let p = Ptr::new(i, hole.generation);
        store.free = hole.next_free;
        *slot = Entry::Occupied(Node::new(value, p.generation(), store.stats.created));
        p
      }
      None => {
        let i = store.entries.len();

        if i >= MAX_NODES || store.entries.try_reserve(1).is_err() {
          return E::fail(Error::OutOfMemory);
        }

        store.entries.push(Entry::Occupied(Node::new(value, 0, store.stats.created)));
        Ptr::new(i as u32, 0)
      }
    };

  store.live = store.live + 1;
  store.stats.created = store.stats.created + 1;

  trace!("oxlist: create {:?}", p);

  Ok(p)
}

fn append<T, A, E>(store: &mut Store<T, A>, head: Option<Ptr>, value: T) -> Result<Ptr, E>
where
  A: Allocator,
  E: Fail,
{
  let Some(head) = head else {
    return create_node(store, value);
  };

  // Find the tail before allocating so that a bad `head` leaks nothing.

  let tail =
    match store.tail(head) {
      Ok(tail) => tail,
      Err(e) => return E::fail(e),
    };

  let p = create_node(store, value)?;

  let Ok(t) = store.node_mut(tail) else { unreachable!("oxlist: tail vanished") };
  t.next = Some(p);
  let Ok(n) = store.node_mut(p) else { unreachable!("oxlist: new node vanished") };
  n.owned = true;

  trace!("oxlist: append {:?} after {:?}", p, tail);

  Ok(head)
}

impl<T> Node<T> {
  #[inline(always)]
  fn new(value: T, generation: u32, serial: usize) -> Self {
    Self { value, next: None, owned: false, generation, serial, }
  }
}

impl<T> Store<T, Global> {
  /// Creates an empty store backed by the global allocator.

  pub fn new() -> Self {
    store(0, Global)
  }

  /// Creates an empty store with room for `capacity` nodes, backed by the
  /// global allocator.
  ///
  /// # Panics
  ///
  /// Panics on failure to allocate memory.

  pub fn with_capacity(capacity: usize) -> Self {
    store(capacity, Global)
  }
}

impl<T, A: Allocator> Store<T, A> {
  /// Creates an empty store backed by the given allocator.

  pub fn new_in(allocator: A) -> Self {
    store(0, allocator)
  }

  /// Creates an empty store with room for `capacity` nodes, backed by the
  /// given allocator.
  ///
  /// # Panics
  ///
  /// Panics on failure to allocate memory.

  pub fn with_capacity_in(capacity: usize, allocator: A) -> Self {
    store(capacity, allocator)
  }

  /// A reference to the parent allocator.

  pub fn allocator(&self) -> &A {
    self.entries.allocator()
  }

  /// The maximum number of nodes that may be live at once.

  pub fn limit(&self) -> usize {
    self.limit
  }

  /// Bounds the number of live nodes. `None` removes the bound.
  ///
  /// Lowering the limit below the current number of live nodes does not
  /// release anything; it only makes further allocations fail.

  pub fn set_limit(&mut self, limit: Option<usize>) {
    self.limit =
      match limit {
        None => MAX_NODES,
        Some(n) => n.min(MAX_NODES),
      };
  }

  /// The number of live nodes.

  pub fn live(&self) -> usize {
    self.live
  }

  /// Cumulative counts of created and released nodes.

  pub fn stats(&self) -> Stats {
    self.stats
  }

  /// The number of live nodes among those created after the first
  /// `created` nodes, where `created` is an earlier [`Stats::created`].
  ///
  /// Nodes that were already live at that point are not counted, even if
  /// some of them have been released since.

  pub fn live_since(&self, created: usize) -> usize {
    self.entries.iter()
      .filter(|e| matches!(e, Entry::Occupied(n) if n.serial >= created))
      .count()
  }

  /// Whether `p` names a live node of this store.

  pub fn is_live(&self, p: Ptr) -> bool {
    self.node(p).is_ok()
  }

  /// Allocates a node holding `value` with an empty link.
  ///
  /// # Panics
  ///
  /// Panics if the node limit has been reached.

  pub fn create_node(&mut self, value: T) -> Ptr {
    unwrap(create_node(self, value))
  }

  /// Allocates a node holding `value` with an empty link.
  ///
  /// # Errors
  ///
  /// [`Error::OutOfMemory`] if the node limit has been reached or the parent
  /// allocator fails.

  pub fn try_create_node(&mut self, value: T) -> Result<Ptr, Error> {
    create_node(self, value)
  }

  /// Appends a new node holding `value` to the end of the list at `head`.
  ///
  /// Returns the new node if `head` is `None`, and `head` otherwise. The
  /// tail is found by walking the list, so this is linear in its length.
  ///
  /// # Panics
  ///
  /// Panics if `head` is not a live node or if allocation fails.

  pub fn append(&mut self, head: Option<Ptr>, value: T) -> Ptr {
    unwrap(append(self, head, value))
  }

  /// Appends a new node holding `value` to the end of the list at `head`.
  ///
  /// # Errors
  ///
  /// An error is returned if `head` is not a live node or if allocation
  /// fails. Nothing is allocated in either case.

  pub fn try_append(&mut self, head: Option<Ptr>, value: T) -> Result<Ptr, Error> {
    append(self, head, value)
  }

  /// Releases every node of the list at `head`, in link order, and returns
  /// how many were released.
  ///
  /// Each successor is read before its predecessor is released. Destroying
  /// the empty list releases nothing.
  ///
  /// # Errors
  ///
  /// - [`Error::DoubleFree`] if `head` has already been released.
  /// - [`Error::NotHead`] if `head` has a predecessor. Releasing it would
  ///   leave that predecessor with a dangling link.

  pub fn destroy(&mut self, head: Option<Ptr>) -> Result<usize, Error> {
    let Some(head) = head else { return Ok(0) };

    match self.node(head) {
      Ok(n) if n.owned => return Err(Error::NotHead(head)),
      Ok(_) => (),
      Err(Error::UseAfterFree(p)) => return Err(Error::DoubleFree(p)),
      Err(e) => return Err(e),
    }

    let mut count = 0;
    let mut p = Some(head);

    while let Some(q) = p {
      p = self.release(q);
      count = count + 1;
    }

    debug!("oxlist: destroyed {} node(s) from {:?}", count, head);

    Ok(count)
  }

  /// Sets the successor of `a` to `b`.
  ///
  /// # Errors
  ///
  /// - [`Error::AlreadyLinked`] if `a` already has a successor.
  /// - [`Error::NotHead`] if `b` already has a predecessor.
  /// - [`Error::Cycle`] if `a` can be reached from `b`.

  pub fn link(&mut self, a: Ptr, b: Ptr) -> Result<(), Error> {
    if self.node(a)?.next.is_some() {
      return Err(Error::AlreadyLinked(a));
    }

    if self.node(b)?.owned {
      return Err(Error::NotHead(b));
    }

    let mut p = Some(b);

    while let Some(q) = p {
      if q == a { return Err(Error::Cycle(b)); }
      p = self.node(q)?.next;
    }

    self.node_mut(a)?.next = Some(b);
    self.node_mut(b)?.owned = true;

    trace!("oxlist: link {:?} -> {:?}", a, b);

    Ok(())
  }

  /// The successor of `p`.

  pub fn next(&self, p: Ptr) -> Result<Option<Ptr>, Error> {
    Ok(self.node(p)?.next)
  }

  /// A reference to the value held by `p`.

  pub fn get(&self, p: Ptr) -> Result<&T, Error> {
    Ok(&self.node(p)?.value)
  }

  /// A mutable reference to the value held by `p`.

  pub fn get_mut(&mut self, p: Ptr) -> Result<&mut T, Error> {
    Ok(&mut self.node_mut(p)?.value)
  }

  /// Overwrites the value held by `p`.

  pub fn set(&mut self, p: Ptr, value: T) -> Result<(), Error> {
    self.node_mut(p)?.value = value;
    Ok(())
  }

  /// An iterator over the values of the list at `head`.
  ///
  /// # Errors
  ///
  /// An error is returned if `head` is not a live node.

  pub fn iter(&self, head: Option<Ptr>) -> Result<Iter<'_, T, A>, Error> {
    if let Some(p) = head { let _: _ = self.node(p)?; }
    Ok(Iter { store: self, next: head })
  }

  /// Whether `f` holds for every value of the list at `head`.

  pub fn all<F>(&self, head: Option<Ptr>, f: F) -> Result<bool, Error>
  where
    F: FnMut(&T) -> bool
  {
    let mut f = f;
    Ok(self.iter(head)?.all(|x| f(x)))
  }

  /// The number of nodes of the list at `head`.

  pub fn len(&self, head: Option<Ptr>) -> Result<usize, Error> {
    Ok(self.iter(head)?.count())
  }

  /// Copies the values of the list at `head` into a vector.

  pub fn values(&self, head: Option<Ptr>) -> Result<Vec<T>, Error>
  where
    T: Clone
  {
    Ok(self.iter(head)?.cloned().collect())
  }

  fn node(&self, p: Ptr) -> Result<&Node<T>, Error> {
    match self.entries.get(p.index()) {
      None => Err(Error::InvalidPtr(p)),
      Some(Entry::Occupied(n)) if n.generation == p.generation() => Ok(n),
      Some(_) => Err(Error::UseAfterFree(p)),
    }
  }

  fn node_mut(&mut self, p: Ptr) -> Result<&mut Node<T>, Error> {
    match self.entries.get_mut(p.index()) {
      None => Err(Error::InvalidPtr(p)),
      Some(Entry::Occupied(n)) if n.generation == p.generation() => Ok(n),
      Some(_) => Err(Error::UseAfterFree(p)),
    }
  }

  fn tail(&self, head: Ptr) -> Result<Ptr, Error> {
    let mut p = head;
    while let Some(q) = self.node(p)?.next { p = q; }
    Ok(p)
  }

  // `p` must name a live node. Returns its successor.

  fn release(&mut self, p: Ptr) -> Option<Ptr> {
    let hole = Hole {
      next_free: self.free,
      generation: p.generation().wrapping_add(1),
    };

    let next =
      match mem::replace(&mut self.entries[p.index()], Entry::Vacant(hole)) {
        Entry::Occupied(n) => n.next,
        Entry::Vacant(_) => unreachable!("oxlist: released a vacant slot"),
      };

    self.free = Some(p.index() as u32);
    self.live = self.live - 1;
    self.stats.released = self.stats.released + 1;

    trace!("oxlist: release {:?}", p);

    next
  }
}

impl<T> Default for Store<T, Global> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T, A: Allocator> fmt::Debug for Store<T, A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Store")
      .field("live", &self.live)
      .field("slots", &self.entries.len())
      .finish()
  }
}

////////////////////////////////////////////////////////////////////////////////
//                                                                            //
// Iter                                                                       //
//                                                                            //
////////////////////////////////////////////////////////////////////////////////

impl<'a, T, A: Allocator> Iterator for Iter<'a, T, A> {
  type Item = &'a T;

  fn next(&mut self) -> Option<&'a T> {
    // Links only ever point at live nodes, and `Store::iter` has already
    // checked the head.

    let Ok(n) = self.store.node(self.next?) else {
      unreachable!("oxlist: dangling link")
    };
    self.next = n.next;
    Some(&n.value)
  }
}

impl<'a, T, A: Allocator> fmt::Debug for Iter<'a, T, A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Iter").field(&self.next).finish()
  }
}

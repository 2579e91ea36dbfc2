use bumpalo::Bump;
use expect_test::expect;
use oxlist::Error;
use oxlist::Iter;
use oxlist::Ptr;
use oxlist::Stats;
use oxlist::Store;

fn init() {
  let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_api() {
  init();
  let mut store = Store::new();
  let _ = Store::<u64>::with_capacity(0);
  let _ = Store::<u64>::default();
  let _ = store.allocator();
  let _ = store.limit();
  store.set_limit(None);
  let a = store.create_node(1_u64);
  let _ = store.try_create_node(2_u64);
  let _ = store.append(Some(a), 3);
  let _ = store.try_append(Some(a), 4);
  let _ = store.next(a);
  let _ = store.get(a);
  let _ = store.get_mut(a);
  let _ = store.set(a, 5);
  let _ = store.iter(Some(a));
  let _ = store.all(Some(a), |&x| x > 0);
  let _ = store.len(Some(a));
  let _ = store.values(Some(a));
  let _ = store.is_live(a);
  let _ = store.live();
  let _ = store.stats();
  let _ = store.live_since(0);
  let _ = store.destroy(Some(a));
  let _ = format!("{:?}", store);
  let _ = format!("{:?}", store.iter(None));
  let _ = format!("{:?}", a);
  let _ = format!("{}", Error::OutOfMemory);
}

#[test]
fn test_special_traits() {
  fn is_send<T: Send>() {}
  fn is_sync<T: Sync>() {}
  fn is_error<T: std::error::Error>() {}

  is_send::<Store<u64>>();
  is_sync::<Store<u64>>();
  is_send::<Iter<'static, u64>>();
  is_sync::<Iter<'static, u64>>();
  is_send::<Ptr>();
  is_sync::<Ptr>();
  is_error::<Error>();
}

#[test]
fn test_debug() {
  let mut store = Store::new();
  expect!["Store { live: 0, slots: 0 }"].assert_eq(&format!("{:?}", store));
  let a = store.create_node(5);
  let b = store.create_node(7);
  store.link(a, b).unwrap();
  expect!["Ptr(1, 0)"].assert_eq(&format!("{:?}", b));
  expect!["Store { live: 2, slots: 2 }"].assert_eq(&format!("{:?}", store));
  expect!["Iter(Some(Ptr(0, 0)))"].assert_eq(&format!("{:?}", store.iter(Some(a)).unwrap()));
  let _ = store.destroy(Some(a)).unwrap();
  expect!["Store { live: 0, slots: 2 }"].assert_eq(&format!("{:?}", store));
}

#[test]
fn test_display() {
  let p = Store::new().create_node(0);
  expect!["out of memory"].assert_eq(&format!("{}", Error::OutOfMemory));
  expect!["Ptr(0, 0) does not belong to this store"].assert_eq(&format!("{}", Error::InvalidPtr(p)));
  expect!["use of released node Ptr(0, 0)"].assert_eq(&format!("{}", Error::UseAfterFree(p)));
  expect!["release of already released node Ptr(0, 0)"].assert_eq(&format!("{}", Error::DoubleFree(p)));
  expect!["Ptr(0, 0) already has a successor"].assert_eq(&format!("{}", Error::AlreadyLinked(p)));
  expect!["Ptr(0, 0) is owned by a predecessor"].assert_eq(&format!("{}", Error::NotHead(p)));
  expect!["link would close a cycle through Ptr(0, 0)"].assert_eq(&format!("{}", Error::Cycle(p)));
  expect!["3 node(s) still live"].assert_eq(&format!("{}", Error::Leak(3)));
}

#[test]
fn test_append_to_empty() {
  init();
  let mut store = Store::new();
  let head = store.append(None, 42);
  assert!(store.values(Some(head)).unwrap() == [42]);
  assert!(store.next(head).unwrap().is_none());
  assert!(store.live() == 1);
}

#[test]
fn test_append_preserves_order() {
  let mut store = Store::new();
  let mut head = None;
  for i in 0 .. 10 {
    head = Some(store.append(head, i));
    let values = store.values(head).unwrap();
    assert!(values == (0 ..= i).collect::<Vec<_>>());
    assert!(*values.last().unwrap() == i);
  }
}

#[test]
fn test_append_returns_head() {
  let mut store = Store::new();
  let a = store.create_node(1);
  assert!(store.append(Some(a), 2) == a);
  assert!(store.try_append(Some(a), 3) == Ok(a));
  assert!(store.values(Some(a)).unwrap() == [1, 2, 3]);
}

#[test]
fn test_destroy_counts() {
  init();
  let mut store = Store::new();
  assert!(store.destroy(None) == Ok(0));
  assert!(store.stats() == Stats::default());
  for n in 1 .. 8 {
    let mut head = None;
    for i in 0 .. n { head = Some(store.append(head, i)); }
    let before = store.stats();
    assert!(store.destroy(head) == Ok(n));
    assert!(store.stats().released - before.released == n);
    assert!(store.live() == 0);
  }
}

#[test]
fn test_round_trip() {
  let mut store = Store::new();
  let x = store.create_node('x');
  let head = store.append(Some(x), 'y');
  let head = store.append(Some(head), 'z');
  let visited = store.iter(Some(head)).unwrap().collect::<String>();
  expect!["xyz"].assert_eq(&visited);
  assert!(store.destroy(Some(head)) == Ok(3));
  assert!(store.destroy(Some(head)) == Err(Error::DoubleFree(head)));
  assert!(store.stats() == Stats { created: 3, released: 3 });
}

#[test]
fn test_destroy_releases_in_link_order() {
  use std::cell::RefCell;
  use std::rc::Rc;

  struct Tag(char, Rc<RefCell<Vec<char>>>);

  impl Drop for Tag {
    fn drop(&mut self) {
      self.1.borrow_mut().push(self.0);
    }
  }

  let log = Rc::new(RefCell::new(Vec::new()));
  let mut store = Store::new();
  let x = store.create_node(Tag('x', Rc::clone(&log)));
  let head = store.append(Some(x), Tag('y', Rc::clone(&log)));
  let head = store.append(Some(head), Tag('z', Rc::clone(&log)));
  assert!(log.borrow().is_empty());
  assert!(store.destroy(Some(head)) == Ok(3));
  assert!(*log.borrow() == ['x', 'y', 'z']);
}

#[test]
fn test_live_since() {
  let mut store = Store::new();
  let old = store.create_node(0);
  let mark = store.stats().created;
  assert!(store.live_since(mark) == 0);
  let _ = store.destroy(Some(old)).unwrap();
  let new = store.create_node(1);
  assert!(store.live_since(mark) == 1);
  assert!(store.live_since(0) == 1);
  let _ = store.destroy(Some(new)).unwrap();
  assert!(store.live_since(mark) == 0);
}

#[test]
fn test_overwrite_after_appends() {
  for n in 0 .. 8 {
    let mut store = Store::new();
    let a = store.create_node(5);
    let b = store.create_node(5);
    store.link(a, b).unwrap();
    for _ in 0 .. n { let _ = store.append(Some(a), 1); }
    let mut p = Some(a);
    while let Some(q) = p {
      store.set(q, 9).unwrap();
      p = store.next(q).unwrap();
    }
    assert!(store.len(Some(a)) == Ok(n + 2));
    assert!(store.all(Some(a), |&x| x == 9) == Ok(true));
    assert!(store.destroy(Some(a)) == Ok(n + 2));
  }
}

#[test]
fn test_use_after_free() {
  let mut store = Store::new();
  let a = store.create_node(1);
  let _ = store.append(Some(a), 2);
  let b = store.next(a).unwrap().unwrap();
  let _ = store.destroy(Some(a)).unwrap();
  assert!(! store.is_live(a));
  assert!(! store.is_live(b));
  assert!(store.get(b) == Err(Error::UseAfterFree(b)));
  assert!(store.set(a, 3) == Err(Error::UseAfterFree(a)));
  assert!(store.next(a) == Err(Error::UseAfterFree(a)));
  assert!(store.try_append(Some(a), 3) == Err(Error::UseAfterFree(a)));
  assert!(store.iter(Some(a)).is_err());
  assert!(store.stats().created == 2);
}

#[test]
fn test_slot_reuse_keeps_old_handles_dangling() {
  let mut store = Store::new();
  let a = store.create_node(1);
  let _ = store.destroy(Some(a)).unwrap();
  let b = store.create_node(2);
  expect!["Ptr(0, 1)"].assert_eq(&format!("{:?}", b));
  assert!(store.get(a) == Err(Error::UseAfterFree(a)));
  assert!(store.get(b) == Ok(&2));
  assert!(store.destroy(Some(a)) == Err(Error::DoubleFree(a)));
  assert!(store.live() == 1);
}

#[test]
fn test_invalid_ptr() {
  let mut small = Store::new();
  let mut large = Store::new();
  let _ = large.create_node(0);
  let p = large.create_node(1);
  let _ = small.create_node(0);
  assert!(small.get(p) == Err(Error::InvalidPtr(p)));
}

#[test]
fn test_destroy_requires_head() {
  let mut store = Store::new();
  let a = store.create_node(5);
  let b = store.create_node(7);
  store.link(a, b).unwrap();
  assert!(store.destroy(Some(b)) == Err(Error::NotHead(b)));
  assert!(store.live() == 2);
  assert!(store.destroy(Some(a)) == Ok(2));
}

#[test]
fn test_link_rules() {
  let mut store = Store::new();
  let a = store.create_node(1);
  let b = store.create_node(2);
  let c = store.create_node(3);
  assert!(store.link(a, a) == Err(Error::Cycle(a)));
  store.link(a, b).unwrap();
  assert!(store.link(a, c) == Err(Error::AlreadyLinked(a)));
  assert!(store.link(c, b) == Err(Error::NotHead(b)));
  assert!(store.link(b, a) == Err(Error::Cycle(a)));
  store.link(c, a).unwrap();
  assert!(store.values(Some(c)).unwrap() == [3, 1, 2]);
  assert!(store.destroy(Some(c)) == Ok(3));
}

#[test]
fn test_limit() {
  let mut store = Store::new();
  store.set_limit(Some(2));
  let a = store.create_node(1);
  let _ = store.append(Some(a), 2);
  assert!(store.try_create_node(3) == Err(Error::OutOfMemory));
  assert!(store.try_append(Some(a), 3) == Err(Error::OutOfMemory));
  assert!(store.len(Some(a)) == Ok(2));
  assert!(store.destroy(Some(a)) == Ok(2));
  assert!(store.try_create_node(3).is_ok());
}

#[test]
#[should_panic(expected = "oxlist: out of memory")]
fn test_create_node_panics_at_limit() {
  let mut store = Store::new();
  store.set_limit(Some(0));
  let _ = store.create_node(1);
}

#[test]
#[should_panic(expected = "oxlist: use of released node")]
fn test_append_panics_on_dangling_head() {
  let mut store = Store::new();
  let a = store.create_node(1);
  let _ = store.destroy(Some(a)).unwrap();
  let _ = store.append(Some(a), 2);
}

#[test]
fn test_values_are_dropped_on_destroy() {
  use std::rc::Rc;

  let token = Rc::new(());
  let mut store = Store::new();
  let mut head = None;
  for _ in 0 .. 4 { head = Some(store.append(head, Rc::clone(&token))); }
  assert!(Rc::strong_count(&token) == 5);
  let _ = store.destroy(head).unwrap();
  assert!(Rc::strong_count(&token) == 1);
}

#[test]
fn test_custom_allocator() {
  let bump = Bump::new();
  let mut store = Store::with_capacity_in(4, &bump);
  let mut head = None;
  for i in 0 .. 100_u64 { head = Some(store.append(head, i)); }
  let sum = store.iter(head).unwrap().sum::<u64>();
  expect!["4950"].assert_eq(&format!("{:?}", sum));
  assert!(store.destroy(head) == Ok(100));
}

#[test]
fn test_demo() {
  let mut store = Store::new();

  let a = store.create_node(5);
  let b = store.create_node(7);

  store.link(a, b).unwrap();

  let b = store.next(a).unwrap().unwrap();

  *store.get_mut(b).unwrap() += 1;

  expect!["[5, 8]"].assert_eq(&format!("{:?}", store.values(Some(a)).unwrap()));
  expect!["Ok(2)"].assert_eq(&format!("{:?}", store.destroy(Some(a))));
}

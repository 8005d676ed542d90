use spark_spawn::{signal, spawner, Node, RefreshPolicy, SpawnError, SpawnerOptions};
use std::cell::Cell;
use std::rc::Rc;

struct DropFlag(Rc<Cell<bool>>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.set(true);
    }
}

#[test]
fn dropping_node_drops_its_spawner() {
    let dropped = Rc::new(Cell::new(false));
    {
        let flag = DropFlag(dropped.clone());
        let parent = Node::new();
        parent.set_spawner(Some(spawner!({
            let _keep = &flag;
            Vec::new()
        })));
        parent.children().unwrap();
        assert!(!dropped.get());
    }
    assert!(dropped.get(), "spawner closure should be released with its node");
}

#[test]
fn replaced_spawner_is_released() {
    let dropped = Rc::new(Cell::new(false));
    let parent = Node::new();
    {
        let flag = DropFlag(dropped.clone());
        parent.set_spawner(Some(spawner!({
            let _keep = &flag;
            Vec::new()
        })));
    }
    parent.children().unwrap();
    parent.set_spawner(None);
    assert!(dropped.get());
}

#[test]
fn dropped_node_stops_listening() {
    let count = signal(1usize);
    {
        let parent = Node::with_options(SpawnerOptions::new().refresh(RefreshPolicy::Eager));
        parent.set_spawner(Some(spawner!(count => vec![Node::new(); count.get()])));
        parent.children().unwrap();
        assert_eq!(count.reader_count(), 1);
    }
    assert_eq!(count.reader_count(), 0);
    count.set(2);
    assert_eq!(spark_spawn::pending_refresh_count(), 0);
}

#[test]
fn snapshot_outliving_node_reports_registry_gone() {
    let snap = {
        let parent = Node::new();
        parent.set_children(vec![Node::new()]);
        parent.children().unwrap()
    };

    assert!(snap.is_stale());
    assert_eq!(
        snap.get(0).unwrap_err(),
        SpawnError::StaleSnapshot {
            taken: 1,
            current: None
        }
    );
    // Raw access still sees a complete sequence
    assert_eq!(snap.as_slice_unchecked().len(), 1);
}

#[test]
fn children_outlive_parent() {
    let kept = {
        let parent = Node::new();
        parent.set_spawner(Some(spawner!(vec![Node::labeled("survivor")])));
        parent.children().unwrap().as_slice_unchecked().to_vec()
    };
    assert_eq!(kept[0].label(), Some("survivor"));
}

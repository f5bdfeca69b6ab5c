//! Dependency graph queries over an immutable snapshot.
//!
//! Nothing here mutates; every function derives its answer from the
//! snapshot it is handed.

use crate::types::{Snapshot, Status, Task};
use std::collections::{BTreeSet, HashSet};

/// True iff the task is pending and every dependency is completed.
pub fn is_available(task: &Task, snapshot: &Snapshot) -> bool {
    task.status == Status::Pending
        && task
            .dependencies
            .iter()
            .all(|dep| snapshot.get(dep).is_some_and(|d| d.status == Status::Completed))
}

/// The available task that was created first, if any.
pub fn find_next_available(snapshot: &Snapshot) -> Option<&Task> {
    snapshot.ordered().into_iter().find(|task| is_available(task, snapshot))
}

/// Every available task, in creation order.
pub fn available(snapshot: &Snapshot) -> Vec<&Task> {
    snapshot
        .ordered()
        .into_iter()
        .filter(|task| is_available(task, snapshot))
        .collect()
}

/// Pending tasks still waiting on at least one dependency.
pub fn blocked(snapshot: &Snapshot) -> Vec<&Task> {
    snapshot
        .ordered()
        .into_iter()
        .filter(|task| task.status == Status::Pending && !is_available(task, snapshot))
        .collect()
}

/// Tasks whose dependency set contains `id`, in creation order.
pub fn dependents_of<'a>(id: &str, snapshot: &'a Snapshot) -> Vec<&'a Task> {
    snapshot
        .ordered()
        .into_iter()
        .filter(|task| task.dependencies.contains(id))
        .collect()
}

/// Pending tasks that depend on `completed_id` and are now available.
pub fn find_unlocked<'a>(completed_id: &str, snapshot: &'a Snapshot) -> Vec<&'a Task> {
    dependents_of(completed_id, snapshot)
        .into_iter()
        .filter(|task| is_available(task, snapshot))
        .collect()
}

enum Visit<'a> {
    Enter(&'a str),
    Leave(&'a str),
}

/// Check whether giving `candidate_id` the dependency set `proposed` would
/// make any task reachable from itself.
///
/// Walks existing edges depth-first from each proposed dependency. Reaching
/// `candidate_id` (including `candidate_id` listed directly) or re-entering a
/// node already on the current path counts as a cycle. Visited nodes are
/// tracked per root so a snapshot that already contains a cycle still
/// terminates.
pub fn has_cycle(candidate_id: &str, proposed: &BTreeSet<String>, snapshot: &Snapshot) -> bool {
    for root in proposed {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut path: HashSet<&str> = HashSet::new();
        let mut stack = vec![Visit::Enter(root.as_str())];

        while let Some(step) = stack.pop() {
            match step {
                Visit::Enter(node) => {
                    if node == candidate_id || path.contains(node) {
                        return true;
                    }
                    if !visited.insert(node) {
                        continue;
                    }
                    path.insert(node);
                    stack.push(Visit::Leave(node));
                    if let Some(task) = snapshot.get(node) {
                        for dep in &task.dependencies {
                            stack.push(Visit::Enter(dep.as_str()));
                        }
                    }
                }
                Visit::Leave(node) => {
                    path.remove(node);
                }
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn deps(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn task(id: &str, seq: u64, dependencies: &[&str]) -> Task {
        Task::new(id, format!("Task {}", id), deps(dependencies), seq)
    }

    fn completed(mut task: Task) -> Task {
        task.status = Status::Completed;
        task.assigned_to = Some("w1".to_string());
        task.result = Some("done".to_string());
        task.completed_at = Some(Utc::now());
        task
    }

    fn claimed(mut task: Task) -> Task {
        task.status = Status::InProgress;
        task.assigned_to = Some("w1".to_string());
        task
    }

    #[test]
    fn test_no_dependencies_is_available() {
        let snapshot: Snapshot = [task("a", 0, &[])].into_iter().collect();
        assert!(is_available(snapshot.get("a").unwrap(), &snapshot));
    }

    #[test]
    fn test_pending_dependency_blocks() {
        let snapshot: Snapshot = [task("a", 0, &[]), task("b", 1, &["a"])].into_iter().collect();
        assert!(!is_available(snapshot.get("b").unwrap(), &snapshot));
        assert_eq!(blocked(&snapshot).len(), 1);
    }

    #[test]
    fn test_in_progress_dependency_blocks() {
        let snapshot: Snapshot = [claimed(task("a", 0, &[])), task("b", 1, &["a"])]
            .into_iter()
            .collect();
        assert!(!is_available(snapshot.get("b").unwrap(), &snapshot));
        assert!(find_next_available(&snapshot).is_none());
    }

    #[test]
    fn test_claimed_task_not_available() {
        let snapshot: Snapshot = [claimed(task("a", 0, &[]))].into_iter().collect();
        assert!(!is_available(snapshot.get("a").unwrap(), &snapshot));
    }

    #[test]
    fn test_next_available_follows_creation_order() {
        // Ids sort opposite to creation order
        let snapshot: Snapshot = [task("z", 0, &[]), task("m", 1, &[]), task("a", 2, &[])]
            .into_iter()
            .collect();
        assert_eq!(find_next_available(&snapshot).unwrap().id, "z");

        let ids: Vec<&str> = available(&snapshot).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "m", "a"]);
    }

    #[test]
    fn test_next_available_skips_blocked() {
        let snapshot: Snapshot = [task("a", 0, &["c"]), task("b", 1, &[]), task("c", 2, &[])]
            .into_iter()
            .collect();
        assert_eq!(find_next_available(&snapshot).unwrap().id, "b");
    }

    #[test]
    fn test_find_unlocked_requires_all_dependencies() {
        let snapshot: Snapshot = [
            completed(task("a", 0, &[])),
            task("b", 1, &[]),
            task("only-a", 2, &["a"]),
            task("a-and-b", 3, &["a", "b"]),
            task("unrelated", 4, &[]),
        ]
        .into_iter()
        .collect();

        let ids: Vec<&str> = find_unlocked("a", &snapshot).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["only-a"]);
    }

    #[test]
    fn test_find_unlocked_ignores_non_pending() {
        let snapshot: Snapshot = [completed(task("a", 0, &[])), claimed(task("b", 1, &["a"]))]
            .into_iter()
            .collect();
        assert!(find_unlocked("a", &snapshot).is_empty());
    }

    #[test]
    fn test_dependents_of() {
        let snapshot: Snapshot = [task("a", 0, &[]), task("b", 1, &["a"]), task("c", 2, &["a", "b"])]
            .into_iter()
            .collect();
        let ids: Vec<&str> = dependents_of("a", &snapshot).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(dependents_of("c", &snapshot).is_empty());
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let snapshot: Snapshot = [task("a", 0, &[])].into_iter().collect();
        assert!(has_cycle("a", &deps(&["a"]), &snapshot));
    }

    #[test]
    fn test_cycle_at_every_depth() {
        // chain: t0 <- t1 <- ... <- tN (each depends on the previous)
        for depth in 1..=12u64 {
            let mut tasks = vec![task("t0", 0, &[])];
            for i in 1..=depth {
                let prev = format!("t{}", i - 1);
                tasks.push(task(&format!("t{}", i), i, &[prev.as_str()]));
            }
            let snapshot: Snapshot = tasks.into_iter().collect();
            let tail = format!("t{}", depth);

            // t0 depending on the tail closes the loop
            assert!(has_cycle("t0", &deps(&[tail.as_str()]), &snapshot), "depth {}", depth);
            // a fresh task depending on the tail does not
            assert!(!has_cycle("fresh", &deps(&[tail.as_str()]), &snapshot), "depth {}", depth);
        }
    }

    #[test]
    fn test_diamond_is_not_cycle() {
        let snapshot: Snapshot = [
            task("a", 0, &[]),
            task("b", 1, &["a"]),
            task("c", 2, &["a"]),
        ]
        .into_iter()
        .collect();
        assert!(!has_cycle("d", &deps(&["b", "c"]), &snapshot));
    }

    #[test]
    fn test_terminates_on_existing_cycle() {
        // Malformed snapshot: x <-> y
        let snapshot: Snapshot = [task("x", 0, &["y"]), task("y", 1, &["x"])].into_iter().collect();
        assert!(has_cycle("new", &deps(&["x"]), &snapshot));
    }

    #[test]
    fn test_unknown_dependency_does_not_panic() {
        let snapshot = Snapshot::new();
        assert!(!has_cycle("a", &deps(&["missing"]), &snapshot));
    }
}

//! In-flight load tasks
//!
//! A load task is the continuation of an asynchronous request. It owns the
//! per-request state (join barrier, partial data) and receives every
//! completion dispatched on its behalf. Tasks belong to a registry slot and
//! are cancelled with it.

use std::collections::{BTreeMap, HashMap};

use crate::asset::{AssetCompletion, Ticket};
use crate::error::ResourceResult;
use crate::handle::ResourceHandle;
use crate::resource::Resource;
use crate::system::ResourceSystem;

/// What a task wants after handling a completion
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    /// More completions are expected
    Pending,
    /// The task has finished; the resource state is final
    Done,
}

/// Continuation of an asynchronous resource build
pub trait LoadTask: Send {
    /// Handle one completion for `resource`
    ///
    /// Returning `Pending` requires at least one more dispatched load.
    fn on_complete(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        completion: AssetCompletion,
    ) -> ResourceResult<TaskStatus>;
}

/// Identifier of a spawned load task
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

struct TaskEntry {
    owner: ResourceHandle,
    /// `None` while the task is running
    task: Option<Box<dyn LoadTask>>,
    outstanding: usize,
}

#[derive(Default)]
pub(crate) struct TaskTable {
    next_task: u64,
    next_ticket: u64,
    tasks: BTreeMap<TaskId, TaskEntry>,
    tickets: HashMap<Ticket, TaskId>,
}

impl TaskTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn spawn(&mut self, owner: ResourceHandle, task: Box<dyn LoadTask>) -> TaskId {
        self.next_task += 1;
        let id = TaskId(self.next_task);
        self.tasks.insert(
            id,
            TaskEntry {
                owner,
                task: Some(task),
                outstanding: 0,
            },
        );
        id
    }

    /// Allocate a ticket routed to `task`
    pub(crate) fn issue_ticket(&mut self, task: TaskId) -> Option<Ticket> {
        let entry = self.tasks.get_mut(&task)?;
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        entry.outstanding += 1;
        self.tickets.insert(ticket, task);
        Some(ticket)
    }

    /// Consume a ticket, yielding its task and owner
    pub(crate) fn resolve_ticket(&mut self, ticket: Ticket) -> Option<(TaskId, ResourceHandle)> {
        let task = self.tickets.remove(&ticket)?;
        let entry = self.tasks.get_mut(&task)?;
        entry.outstanding = entry.outstanding.saturating_sub(1);
        Some((task, entry.owner))
    }

    /// Task and owner a ticket routes to, without consuming it
    pub(crate) fn route_of(&self, ticket: Ticket) -> Option<(TaskId, ResourceHandle)> {
        let task = *self.tickets.get(&ticket)?;
        self.tasks.get(&task).map(|e| (task, e.owner))
    }

    /// Check if a task is currently checked out
    pub(crate) fn is_running(&self, task: TaskId) -> bool {
        self.tasks.get(&task).map(|e| e.task.is_none()).unwrap_or(false)
    }

    pub(crate) fn checkout(&mut self, task: TaskId) -> Option<Box<dyn LoadTask>> {
        self.tasks.get_mut(&task)?.task.take()
    }

    /// Put a task back. Returns `false` if it was cancelled meanwhile.
    pub(crate) fn restore(&mut self, task: TaskId, body: Box<dyn LoadTask>) -> bool {
        match self.tasks.get_mut(&task) {
            Some(entry) => {
                entry.task = Some(body);
                true
            }
            None => false,
        }
    }

    pub(crate) fn outstanding(&self, task: TaskId) -> usize {
        self.tasks.get(&task).map(|e| e.outstanding).unwrap_or(0)
    }

    /// Drop a task and any tickets still routed to it
    pub(crate) fn finish(&mut self, task: TaskId) {
        if self.tasks.remove(&task).is_some() {
            self.tickets.retain(|_, t| *t != task);
        }
    }

    /// Drop every task owned by `owner`
    pub(crate) fn cancel_owner(&mut self, owner: ResourceHandle) -> usize {
        let cancelled: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|(_, e)| e.owner == owner)
            .map(|(id, _)| *id)
            .collect();
        for id in &cancelled {
            self.finish(*id);
        }
        cancelled.len()
    }

    pub(crate) fn owns(&self, owner: ResourceHandle) -> bool {
        self.tasks.values().any(|e| e.owner == owner)
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    #[cfg(test)]
    pub(crate) fn ticket_count(&self) -> usize {
        self.tickets.len()
    }

    pub(crate) fn clear(&mut self) {
        self.tasks.clear();
        self.tickets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle;

    impl LoadTask for Idle {
        fn on_complete(
            &mut self,
            _system: &mut ResourceSystem,
            _resource: &mut Resource,
            _completion: AssetCompletion,
        ) -> ResourceResult<TaskStatus> {
            Ok(TaskStatus::Done)
        }
    }

    #[test]
    fn test_ticket_routing() {
        let mut table = TaskTable::new();
        let owner = ResourceHandle::new(0, 0);
        let task = table.spawn(owner, Box::new(Idle));

        let a = table.issue_ticket(task).unwrap();
        let b = table.issue_ticket(task).unwrap();
        assert_ne!(a, b);
        assert_eq!(table.outstanding(task), 2);

        assert_eq!(table.resolve_ticket(a), Some((task, owner)));
        assert_eq!(table.resolve_ticket(a), None);
        assert_eq!(table.outstanding(task), 1);
    }

    #[test]
    fn test_cancel_owner_drops_tickets() {
        let mut table = TaskTable::new();
        let owner = ResourceHandle::new(0, 0);
        let other = ResourceHandle::new(1, 0);
        let mine = table.spawn(owner, Box::new(Idle));
        let theirs = table.spawn(other, Box::new(Idle));
        let ticket = table.issue_ticket(mine).unwrap();
        table.issue_ticket(theirs).unwrap();

        assert_eq!(table.cancel_owner(owner), 1);
        assert!(!table.owns(owner));
        assert!(table.owns(other));
        assert_eq!(table.resolve_ticket(ticket), None);
        assert_eq!(table.ticket_count(), 1);
    }

    #[test]
    fn test_restore_after_cancel() {
        let mut table = TaskTable::new();
        let owner = ResourceHandle::new(0, 0);
        let task = table.spawn(owner, Box::new(Idle));

        let body = table.checkout(task).unwrap();
        table.cancel_owner(owner);
        assert!(!table.restore(task, body));
        assert_eq!(table.len(), 0);
    }
}

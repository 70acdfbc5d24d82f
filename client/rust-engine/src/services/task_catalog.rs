use crate::models::{SavedAnswer, Submission, TaskDescriptor};
use crate::services::answer_buffer::AnswerBuffer;

/// Immutable list of task descriptors for the assigned variant, fetched
/// once per session and ordered by ascending task number.
#[derive(Debug)]
pub struct TaskCatalog {
    tasks: Vec<TaskDescriptor>,
}

impl TaskCatalog {
    pub fn new(mut tasks: Vec<TaskDescriptor>) -> Self {
        tasks.sort_by_key(|t| t.task_number);
        Self { tasks }
    }

    pub fn tasks(&self) -> &[TaskDescriptor] {
        &self.tasks
    }

    pub fn get(&self, task_number: u32) -> Option<&TaskDescriptor> {
        self.tasks.iter().find(|t| t.task_number == task_number)
    }

    pub fn contains(&self, task_number: u32) -> bool {
        self.get(task_number).is_some()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Seeds the answer buffer from a prior submission. Entries restored
    /// here are already persisted and start clean; answers for tasks no
    /// longer in the variant are dropped.
    pub fn restore_answers(&self, submission: &Submission, buffer: &mut AnswerBuffer) {
        let known: Vec<SavedAnswer> = submission
            .answers
            .iter()
            .filter(|a| self.contains(a.task_number))
            .cloned()
            .collect();

        if known.len() < submission.answers.len() {
            tracing::warn!(
                "Dropped {} restored answer(s) without a matching task",
                submission.answers.len() - known.len()
            );
        }

        buffer.restore(&known);
    }
}

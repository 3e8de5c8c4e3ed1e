use crate::{Config, MockContext, MockGroup, MockTask, Mocked, Result, TaskSpec};

/// What [`mock`](crate::mock) returns: one task or a group, depending on
/// the input.
#[derive(Debug)]
pub enum Mock {
    Task(MockTask),
    Group(MockGroup),
}

impl Mock {
    pub(crate) fn build(spec: TaskSpec, config: Config) -> Result<Self> {
        match spec {
            TaskSpec::Group(specs) => MockGroup::with_config(specs, config).map(Mock::Group),
            single => MockTask::with_config(single, config).map(Mock::Task),
        }
    }

    pub fn as_task(&self) -> Option<&MockTask> {
        match self {
            Mock::Task(task) => Some(task),
            Mock::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&MockGroup> {
        match self {
            Mock::Group(group) => Some(group),
            Mock::Task(_) => None,
        }
    }

    pub fn into_task(self) -> Option<MockTask> {
        match self {
            Mock::Task(task) => Some(task),
            Mock::Group(_) => None,
        }
    }

    pub fn into_group(self) -> Option<MockGroup> {
        match self {
            Mock::Group(group) => Some(group),
            Mock::Task(_) => None,
        }
    }
}

impl Mocked for Mock {
    fn contexts(&self) -> Vec<&MockContext> {
        match self {
            Mock::Task(task) => task.contexts(),
            Mock::Group(group) => group.contexts(),
        }
    }
}

impl From<MockTask> for Mock {
    fn from(task: MockTask) -> Self {
        Mock::Task(task)
    }
}

impl From<MockGroup> for Mock {
    fn from(group: MockGroup) -> Self {
        Mock::Group(group)
    }
}

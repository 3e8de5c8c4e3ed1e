use std::ops::Deref;

use crate::{Config, Error, MockContext, MockTask, Mocked, Result, TaskSpec};

/// Several tasks mocked side by side.
///
/// Each task gets its own trace, listeners and stubs. Configuration calls
/// made through the group apply to every task; queries concatenate the
/// per-task results in task order. Individual tasks are reachable by index,
/// since the group derefs to `[MockTask]`.
#[derive(Debug)]
pub struct MockGroup {
    tasks: Vec<MockTask>,
}

impl MockGroup {
    pub fn new<S>(specs: impl IntoIterator<Item = S>) -> Result<Self>
    where
        S: Into<TaskSpec>,
    {
        Self::with_config(specs, Config::default())
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if any member is itself a group.
    pub fn with_config<S>(specs: impl IntoIterator<Item = S>, config: Config) -> Result<Self>
    where
        S: Into<TaskSpec>,
    {
        let tasks = specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| match spec.into() {
                TaskSpec::Group(_) => Err(Error::InvalidInput(format!(
                    "group member {i} is a group; groups do not nest"
                ))),
                single => MockTask::with_config(single, config.clone()),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { tasks })
    }

    pub fn into_tasks(self) -> Vec<MockTask> {
        self.tasks
    }
}

impl Deref for MockGroup {
    type Target = [MockTask];

    fn deref(&self) -> &Self::Target {
        &self.tasks
    }
}

impl Mocked for MockGroup {
    fn contexts(&self) -> Vec<&MockContext> {
        self.tasks.iter().map(MockTask::context).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Routine, TaskSpec};
    use serde_json::Value;

    fn idle(name: &str) -> Routine {
        Routine::new(name, |_, _| async { Ok(Value::Null) })
    }

    #[test]
    fn nested_group_is_rejected() {
        let members = vec![
            TaskSpec::from(idle("a")),
            TaskSpec::Group(vec![idle("b").into()]),
        ];
        assert!(matches!(
            MockGroup::new(members),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn members_get_separate_contexts() {
        let group = MockGroup::new(vec![idle("a"), idle("b")]).unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(group[1].routine().name(), "b");
        let contexts = group.contexts();
        assert!(!contexts[0].trace().same_as(contexts[1].trace()));
    }

    #[test]
    fn empty_group_is_allowed() {
        let group = MockGroup::new(Vec::<Routine>::new()).unwrap();
        assert!(group.is_empty());
        assert_eq!(group.effect_count(), 0);
    }
}

use crate::core::error::Result;
use crate::core::time_sync::TimeSynchronizer;
use crate::model::project::Project;

/// Per-conversion values derived once from a project and handed to every parser or generator
/// step that needs them.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionContext {
    pub first_bar_length: i32,
    pub synchronizer: TimeSynchronizer,
}

impl ConversionContext {
    pub fn from_project(project: &Project) -> Result<Self> {
        project.validate()?;

        Ok(Self {
            first_bar_length: project.first_bar_length(),
            synchronizer: project.time_synchronizer()?,
        })
    }

    /// Neutral note position for a tick on the project timeline.
    pub fn to_note_ticks(&self, project_ticks: i32) -> i32 {
        project_ticks - self.first_bar_length
    }

    pub fn to_project_ticks(&self, note_ticks: i32) -> i32 {
        note_ticks + self.first_bar_length
    }
}

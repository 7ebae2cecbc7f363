use crate::{
    control_command::CommandType,
    object::RTObject,
    path::Path,
    story::Story,
    story_error::StoryError,
    value_type::ValueType,
};

/// # Tags
/// Methods to read tags.
impl Story {
    /// Get any global tags associated with the story. These are defined as
    /// hash tags defined at the very top of the story.
    pub fn get_global_tags(&self) -> Result<Vec<String>, StoryError> {
        self.tags_at_start_of_flow_container_with_path_string("")
    }

    /// Gets any tags associated with a particular knot or knot.stitch.
    /// These are defined as hash tags defined at the very top of a
    /// knot or stitch.
    pub fn tags_for_content_at_path(&self, path: &str) -> Result<Vec<String>, StoryError> {
        self.tags_at_start_of_flow_container_with_path_string(path)
    }

    fn tags_at_start_of_flow_container_with_path_string(
        &self,
        path_string: &str,
    ) -> Result<Vec<String>, StoryError> {
        let path = Path::new_with_components_string(Some(path_string));

        // Expected to be global story, knot, or stitch
        let mut flow_container = self
            .content_at_path(&path)
            .container(&self.graph)
            .ok_or_else(|| StoryError::BadArgument(format!("Content at path '{path_string}' is not a container")))?;

        // Weave structure nests the first line in containers of its own
        while let Some(first) = self
            .graph
            .get_container(flow_container)
            .and_then(|c| c.content.first().copied())
            .filter(|first| self.graph.get_container(*first).is_some())
        {
            flow_container = first;
        }

        let mut in_tag = false;
        let mut tags = Vec::new();

        let content = self
            .graph
            .get_container(flow_container)
            .map(|c| c.content.as_slice())
            .unwrap_or_default();

        for child in content {
            match self.graph.get(*child) {
                RTObject::ControlCommand(CommandType::BeginTag) => in_tag = true,
                RTObject::ControlCommand(CommandType::EndTag) => in_tag = false,
                // Tags from ink compiled before tags could hold expressions
                RTObject::Tag(tag) if !in_tag => tags.push(tag.get_text().to_owned()),
                RTObject::Value(ValueType::String(s)) if in_tag => tags.push(s.string.clone()),
                _ if in_tag => {
                    return Err(StoryError::InvalidStoryState("Tag contained non-text content. Only plain text is allowed when using globalTags or TagsAtContentPath. If you want to evaluate dynamic content, you need to use story.Continue()".to_owned()));
                }
                _ => break,
            }
        }

        Ok(tags)
    }

    /// Gets a list of tags defined with '#' in the ink source that were
    /// seen during the most recent [`cont`](Story::cont) call.
    pub fn get_current_tags(&mut self) -> Result<Vec<String>, StoryError> {
        self.if_async_we_cant("call currentTags since it's a work in progress")?;

        Ok(self.get_state_mut().get_current_tags())
    }
}

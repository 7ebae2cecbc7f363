use crate::{story::Story, story_error::StoryError};

/// # Flow
/// Methods to work with flows and the call-stack.
impl Story {
    /// Ends the current flow: tunnels, threads, functions in progress and
    /// pending choices are all dropped.
    pub fn reset_callstack(&mut self) -> Result<(), StoryError> {
        self.if_async_we_cant("ResetCallstack")?;

        self.get_state_mut().force_end();

        Ok(())
    }

    /// Changes from the current flow to the specified one, creating it
    /// when it doesn't exist yet. A new flow starts at the top of the story.
    pub fn switch_flow(&mut self, flow_name: &str) -> Result<(), StoryError> {
        self.if_async_we_cant("switch flow")?;

        self.get_state_mut().switch_flow_internal(flow_name);

        Ok(())
    }

    /// Removes the specified flow from the story.
    pub fn remove_flow(&mut self, flow_name: &str) -> Result<(), StoryError> {
        self.if_async_we_cant("remove flow")?;

        self.get_state_mut().remove_flow_internal(flow_name)
    }

    /// Switches to the default flow, keeping the current flow around for
    /// later.
    pub fn switch_to_default_flow(&mut self) -> Result<(), StoryError> {
        self.if_async_we_cant("switch to default flow")?;

        self.get_state_mut().switch_to_default_flow_internal();

        Ok(())
    }

    pub fn get_current_flow_name(&self) -> &str {
        self.get_state().get_current_flow_name()
    }

    pub fn current_flow_is_default_flow(&self) -> bool {
        self.get_state().current_flow_is_default_flow()
    }

    /// Names of the flows alive besides the default one.
    pub fn get_alive_flow_names(&self) -> Vec<String> {
        self.get_state().get_alive_flow_names()
    }
}

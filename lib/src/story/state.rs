use crate::{
    path::Path, story::Story, story_error::StoryError, story_state::StoryState,
    value_type::ValueType,
};

/// # State
/// Methods to read and write story state.
impl Story {
    /// The state of the running story: flows, variables and counts.
    #[inline]
    pub fn get_state(&self) -> &StoryState {
        &self.state
    }

    #[inline]
    pub fn get_state_mut(&mut self) -> &mut StoryState {
        &mut self.state
    }

    /// Runs the `global decl` container, which gives every global its
    /// initial value, and records those values as the defaults.
    pub(crate) fn reset_globals(&mut self) -> Result<(), StoryError> {
        let has_global_decl = self
            .graph
            .get_container(self.graph.root())
            .is_some_and(|root| root.named_content.contains_key("global decl"));

        if has_global_decl {
            let original_pointer = self.get_state().get_current_pointer();

            self.choose_path(&Path::new_with_components_string(Some("global decl")), false)?;

            // External bindings are not validated yet at load time
            self.continue_internal(0.0)?;

            self.get_state_mut().set_current_pointer(original_pointer);
        }

        self.get_state_mut()
            .variables_state
            .snapshot_default_globals();

        Ok(())
    }

    /// Set the value of a named global ink variable. The variable must be
    /// declared in the ink and the new value must be of a compatible type.
    pub fn set_variable(&mut self, variable_name: &str, value: &ValueType) -> Result<(), StoryError> {
        let changed = self
            .get_state_mut()
            .variables_state
            .set(variable_name, value.clone())?;

        // While continuing, changes are reported in a batch at the end
        if changed && !self.get_state().variables_state.is_batch_observing() {
            self.notify_variable_changed(variable_name, value);
        }

        Ok(())
    }

    /// Get the value of a named global ink variable.
    pub fn get_variable(&self, variable_name: &str) -> Option<ValueType> {
        self.get_state().variables_state.get(variable_name).cloned()
    }

    /// Goes back to the state saved at the last newline, keeping the errors
    /// raised since.
    pub(crate) fn restore_state_snapshot(&mut self) {
        let Some(snapshot) = self.state_snapshot_at_last_new_line.take() else {
            return;
        };

        let errors = self.state.take_errors();

        self.state = snapshot;
        self.state.apply_any_patch();
        self.state.append_errors(errors);
    }

    /// The current state becomes the snapshot and play goes on in a
    /// patched copy of it.
    pub(crate) fn state_snapshot(&mut self) {
        let patched = self.state.copy_and_start_patching();
        let snapshot = std::mem::replace(&mut self.state, patched);
        self.state_snapshot_at_last_new_line = Some(snapshot);
    }

    /// Keeps what happened since the snapshot.
    pub(crate) fn discard_snapshot(&mut self) {
        self.get_state_mut().apply_any_patch();
        self.state_snapshot_at_last_new_line = None;
    }

    /// Exports the current state to JSON format, in order to save the game.
    pub fn save_state(&self) -> Result<String, StoryError> {
        self.if_async_we_cant("save state")?;

        self.get_state().to_json()
    }

    /// Loads a previously saved state in JSON format.
    pub fn load_state(&mut self, json_state: &str) -> Result<(), StoryError> {
        self.if_async_we_cant("load state")?;

        self.get_state_mut().load_json(json_state)?;

        tracing::debug!(flow = self.get_state().get_current_flow_name(), "state loaded");

        Ok(())
    }

    /// Reset the Story back to its initial state as it was when it was first constructed.
    pub fn reset_state(&mut self) -> Result<(), StoryError> {
        self.if_async_we_cant("ResetState")?;

        self.state = StoryState::new(self.graph.clone(), self.list_definitions.clone());

        self.reset_globals()
    }
}

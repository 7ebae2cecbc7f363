use crate::{
    choice::Choice,
    choice_point::ChoicePoint,
    object::{ObjectId, RTObject},
    path::Path,
    story::Story,
    story_error::StoryError,
    value_type::ValueType,
};

/// # Choices
/// Methods to get and select choices.
impl Story {
    /// Chooses the [`Choice`](crate::choice::Choice) from the current
    /// choices with the given index. The story is then ready to continue
    /// from the content the choice points to.
    pub fn choose_choice_index(&mut self, choice_index: usize) -> Result<(), StoryError> {
        let choices = self.get_current_choices();
        let choice_to_choose = choices.get(choice_index).ok_or_else(|| {
            StoryError::BadArgument(format!(
                "choice out of range: {choice_index} (there are {} choices)",
                choices.len()
            ))
        })?;

        // The choice may come from a forked thread; continue from its context
        let thread = choice_to_choose.thread_at_generation.clone().ok_or_else(|| {
            StoryError::InvalidStoryState(format!(
                "Choice '{}' has no thread to continue from",
                choice_to_choose.text
            ))
        })?;
        let target_path = choice_to_choose.target_path.clone();

        tracing::debug!(index = choice_index, target = %target_path, "choice taken");

        self.get_state_mut()
            .get_callstack_mut()
            .set_current_thread(thread);

        self.choose_path(&target_path, true)
    }

    pub(crate) fn choose_path(&mut self, p: &Path, incrementing_turn_index: bool) -> Result<(), StoryError> {
        self.get_state_mut()
            .set_chosen_path(p, incrementing_turn_index)?;

        // Newly entered containers count as visited
        self.visit_changed_containers_due_to_divert()
    }

    /// Turns a choice point into a [`Choice`], consuming its text from the
    /// evaluation stack. `None` when the choice is not to be shown.
    pub(crate) fn process_choice(
        &mut self,
        choice_point: &ChoicePoint,
        own_id: ObjectId,
    ) -> Result<Option<Choice>, StoryError> {
        let mut show_choice = true;

        if choice_point.has_condition {
            let condition_value = self.get_state_mut().pop_evaluation_stack()?;
            if !self.is_truthy(&condition_value)? {
                show_choice = false;
            }
        }

        let mut start_text = String::new();
        let mut choice_only_text = String::new();
        let mut tags: Vec<String> = Vec::new();

        if choice_point.has_choice_only_content {
            choice_only_text = self.pop_choice_string_and_tags(&mut tags)?;
        }

        if choice_point.has_start_content {
            start_text = self.pop_choice_string_and_tags(&mut tags)?;
        }

        if choice_point.once_only {
            if let Some(target) = choice_point.get_choice_target(&self.graph, own_id) {
                if self.get_state().visit_count_for_container(target)? > 0 {
                    show_choice = false;
                }
            }
        }

        // The text was consumed anyway so it never reaches the output
        if !show_choice {
            return Ok(None);
        }

        start_text.push_str(&choice_only_text);

        let target_path = choice_point
            .get_path_on_choice(&self.graph, own_id)
            .ok_or_else(|| {
                StoryError::InvalidStoryState(format!(
                    "Choice target not found: {}",
                    choice_point.get_raw_path_on_choice()
                ))
            })?;

        let thread = self.get_state_mut().get_callstack_mut().fork_thread();

        Ok(Some(Choice::new(
            target_path,
            self.graph.get_path(own_id).to_string(),
            choice_point.is_invisible_default,
            tags,
            thread,
            start_text.trim().to_string(),
        )))
    }

    /// Takes the invisible default choice when it is the only thing left to
    /// choose.
    pub(crate) fn try_follow_default_invisible_choice(&mut self) -> Result<(), StoryError> {
        let all_choices = self.get_state().get_generated_choices();

        if all_choices.is_empty() || all_choices.iter().any(|c| !c.is_invisible_default) {
            return Ok(());
        }

        let choice = &all_choices[0];
        let target_path = choice.target_path.clone();
        let thread = choice.thread_at_generation.clone();

        // The invisible choice may come from another thread
        if let Some(thread) = thread {
            self.get_state_mut()
                .get_callstack_mut()
                .set_current_thread(thread);
        }

        // A rollback to the snapshot must find the choice thread intact
        if self.state_snapshot_at_last_new_line.is_some() {
            let callstack = self.get_state_mut().get_callstack_mut();
            let fork = callstack.fork_thread();
            callstack.set_current_thread(fork);
        }

        tracing::debug!(target = %target_path, "following invisible default choice");

        self.choose_path(&target_path, false)
    }

    fn pop_choice_string_and_tags(&mut self, tags: &mut Vec<String>) -> Result<String, StoryError> {
        let choice_only_str = match self.get_state_mut().pop_evaluation_stack()? {
            RTObject::Value(ValueType::String(s)) => s.string,
            other => {
                return Err(StoryError::InvalidStoryState(format!(
                    "Expected choice text on the evaluation stack, found {other}"
                )))
            }
        };

        // Tags sit below the text, popped in reverse order
        while let Some(RTObject::Tag(_)) = self.get_state().peek_evaluation_stack() {
            if let RTObject::Tag(tag) = self.get_state_mut().pop_evaluation_stack()? {
                tags.insert(0, tag.get_text().to_owned());
            }
        }

        Ok(choice_only_str)
    }
}
